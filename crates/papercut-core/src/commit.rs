//! Handing finished questions and memo answers to persistent storage.

use crate::error::PapercutError;
use crate::model::{Coordinates, ExtractedQuestion};
use crate::raster::{encode, ImageEncoding};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An encoded image blob.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub encoding: ImageEncoding,
}

/// What a sink receives for one question.
#[derive(Debug, Clone)]
pub struct QuestionRecord {
    pub question_number: u32,
    pub title: String,
    pub image: Option<EncodedImage>,
    pub marks: Decimal,
    pub order: u32,
    pub extra_text: Option<String>,
    pub page: usize,
    pub coordinates: Coordinates,
}

/// A memo answer image for an already stored question.
#[derive(Debug, Clone)]
pub struct AnswerRecord {
    pub stored_id: String,
    pub answer_number: u32,
    pub image: EncodedImage,
}

/// Storage for committed questions. Each save returns a stable identifier.
pub trait QuestionSink {
    fn save_question(&mut self, record: &QuestionRecord) -> Result<String, PapercutError>;

    fn save_answer(&mut self, record: &AnswerRecord) -> Result<String, PapercutError>;
}

/// A question as it exists in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredQuestion {
    pub id: String,
    pub title: String,
    pub order: u32,
}

/// Persist questions in output order.
///
/// `order` is assigned sequentially starting at `start_order`; callers that
/// append to an existing list pass its length plus one.
pub fn commit_questions(
    questions: &[ExtractedQuestion],
    sink: &mut dyn QuestionSink,
    start_order: u32,
    encoding: ImageEncoding,
) -> Result<Vec<StoredQuestion>, PapercutError> {
    let mut stored = Vec::with_capacity(questions.len());
    for (order, q) in (start_order..).zip(questions) {
        let image = q
            .image
            .as_ref()
            .map(|img| encode(img, encoding).map(|bytes| EncodedImage { bytes, encoding }))
            .transpose()?;
        let record = QuestionRecord {
            question_number: q.number,
            title: format!("Question {}", q.number),
            image,
            marks: q.marks,
            order,
            extra_text: Some(q.text.clone()).filter(|t| !t.is_empty()),
            page: q.page,
            coordinates: q.coordinates,
        };
        let id = sink.save_question(&record)?;
        stored.push(StoredQuestion {
            id,
            title: record.title,
            order,
        });
    }
    log::info!("committed {} question(s)", stored.len());
    Ok(stored)
}

/// An answer paired with the stored question it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerMatch {
    pub answer_index: usize,
    pub answer_number: u32,
    pub stored_id: String,
}

/// Pair extracted memo answers with stored questions.
///
/// A stored question matches answer N when its title contains
/// "question N" (any case), equals "qN", or its order is N. The first match
/// in `stored` wins. Answers without an image are skipped.
pub fn match_answers(answers: &[ExtractedQuestion], stored: &[StoredQuestion]) -> Vec<AnswerMatch> {
    answers
        .iter()
        .enumerate()
        .filter(|(_, a)| a.image.is_some())
        .filter_map(|(i, a)| {
            let n = a.number;
            let phrase = format!("question {n}");
            let short = format!("q{n}");
            stored
                .iter()
                .find(|s| {
                    let title = s.title.to_lowercase();
                    title.contains(&phrase) || title == short || s.order == n
                })
                .map(|s| AnswerMatch {
                    answer_index: i,
                    answer_number: n,
                    stored_id: s.id.clone(),
                })
        })
        .collect()
}

/// Match memo answers and store each matched image.
pub fn commit_answers(
    answers: &[ExtractedQuestion],
    stored: &[StoredQuestion],
    sink: &mut dyn QuestionSink,
    encoding: ImageEncoding,
) -> Result<Vec<AnswerMatch>, PapercutError> {
    let matches = match_answers(answers, stored);
    for m in &matches {
        let Some(img) = answers[m.answer_index].image.as_ref() else {
            continue;
        };
        sink.save_answer(&AnswerRecord {
            stored_id: m.stored_id.clone(),
            answer_number: m.answer_number,
            image: EncodedImage {
                bytes: encode(img, encoding)?,
                encoding,
            },
        })?;
    }
    let unmatched = answers.len() - matches.len();
    if unmatched > 0 {
        log::info!("{unmatched} answer(s) had no matching question or no image");
    }
    Ok(matches)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Manifest {
    questions: Vec<ManifestQuestion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    answers: Vec<ManifestAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestQuestion {
    id: String,
    question_number: u32,
    title: String,
    marks: Decimal,
    order: u32,
    page: usize,
    coordinates: Coordinates,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestAnswer {
    question_id: String,
    answer_number: u32,
    image: String,
}

/// Sink that writes images into a directory next to a `manifest.json`.
///
/// The identifier of a question is the path of its manifest entry's image,
/// or `question_<n>` when it has none.
pub struct DirectorySink {
    dir: PathBuf,
    manifest: Manifest,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PapercutError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(DirectorySink {
            dir,
            manifest: Manifest::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join("manifest.json")
    }

    fn write_image(&self, stem: &str, image: &EncodedImage) -> Result<PathBuf, PapercutError> {
        let path = self.dir.join(format!("{stem}.{}", image.encoding.extension()));
        std::fs::write(&path, &image.bytes)?;
        Ok(path)
    }

    fn write_manifest(&self) -> Result<(), PapercutError> {
        let json = serde_json::to_string_pretty(&self.manifest)?;
        std::fs::write(self.manifest_path(), json)?;
        Ok(())
    }
}

impl QuestionSink for DirectorySink {
    fn save_question(&mut self, record: &QuestionRecord) -> Result<String, PapercutError> {
        let stem = format!("question_{}", record.question_number);
        let image = record
            .image
            .as_ref()
            .map(|img| self.write_image(&stem, img))
            .transpose()?
            .map(|p| p.display().to_string());
        let id = image.clone().unwrap_or(stem);
        self.manifest.questions.push(ManifestQuestion {
            id: id.clone(),
            question_number: record.question_number,
            title: record.title.clone(),
            marks: record.marks,
            order: record.order,
            page: record.page,
            coordinates: record.coordinates,
            image,
            extra_text: record.extra_text.clone(),
        });
        self.write_manifest()?;
        Ok(id)
    }

    fn save_answer(&mut self, record: &AnswerRecord) -> Result<String, PapercutError> {
        let path = self.write_image(&format!("answer_{}", record.answer_number), &record.image)?;
        let id = path.display().to_string();
        self.manifest.answers.push(ManifestAnswer {
            question_id: record.stored_id.clone(),
            answer_number: record.answer_number,
            image: id.clone(),
        });
        self.write_manifest()?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use rust_decimal_macros::dec;

    #[derive(Default)]
    struct MemorySink {
        questions: Vec<QuestionRecord>,
        answers: Vec<AnswerRecord>,
    }

    impl QuestionSink for MemorySink {
        fn save_question(&mut self, record: &QuestionRecord) -> Result<String, PapercutError> {
            self.questions.push(record.clone());
            Ok(format!("id-{}", self.questions.len()))
        }

        fn save_answer(&mut self, record: &AnswerRecord) -> Result<String, PapercutError> {
            self.answers.push(record.clone());
            Ok(format!("ans-{}", self.answers.len()))
        }
    }

    fn extracted(number: u32, with_image: bool) -> ExtractedQuestion {
        ExtractedQuestion {
            number,
            text: format!("(Merged question {number})"),
            marks: dec!(2.5),
            image: with_image.then(|| RgbaImage::from_pixel(4, 3, Rgba([9, 9, 9, 255]))),
            source_images: Vec::new(),
            page: 1,
            coordinates: Coordinates {
                y_start: 10.0,
                y_end: 90.0,
            },
        }
    }

    fn stored(id: &str, title: &str, order: u32) -> StoredQuestion {
        StoredQuestion {
            id: id.into(),
            title: title.into(),
            order,
        }
    }

    #[test]
    fn test_commit_assigns_sequential_order() {
        let mut sink = MemorySink::default();
        let qs = vec![extracted(1, true), extracted(3, false)];
        let out = commit_questions(&qs, &mut sink, 5, ImageEncoding::Png).unwrap();

        assert_eq!(out, vec![stored("id-1", "Question 1", 5), stored("id-2", "Question 3", 6)]);
        assert_eq!(sink.questions[0].marks, dec!(2.5));
        assert!(sink.questions[1].image.is_none());
        let img = sink.questions[0].image.as_ref().unwrap();
        assert_eq!(&img.bytes[1..4], b"PNG");
    }

    #[test]
    fn test_match_answers_rules() {
        let stored = vec![
            stored("a", "Intro", 1),
            stored("b", "Long QUESTION 2 about graphs", 7),
            stored("c", "q3", 8),
        ];
        let answers = vec![
            extracted(1, true),
            extracted(2, true),
            extracted(3, true),
            extracted(4, true),
            extracted(2, false),
        ];
        let m = match_answers(&answers, &stored);
        let pairs: Vec<(u32, &str)> = m.iter().map(|m| (m.answer_number, m.stored_id.as_str())).collect();
        // 1 by order, 2 by title phrase, 3 by short title, 4 unmatched, image-less skipped
        assert_eq!(pairs, vec![(1, "a"), (2, "b"), (3, "c")]);
    }

    #[test]
    fn test_match_first_wins() {
        let stored = vec![stored("x", "Question 1", 4), stored("y", "Question 1 (b)", 1)];
        let m = match_answers(&[extracted(1, true)], &stored);
        assert_eq!(m[0].stored_id, "x");
    }

    #[test]
    fn test_commit_answers_uses_sink() {
        let mut sink = MemorySink::default();
        let stored = vec![stored("id-9", "Question 2", 2)];
        let answers = vec![extracted(2, true), extracted(5, true)];
        let m = commit_answers(&answers, &stored, &mut sink, ImageEncoding::Jpeg { quality: 90 }).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(sink.answers[0].stored_id, "id-9");
        assert_eq!(&sink.answers[0].image.bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_directory_sink_writes_images_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path().join("out")).unwrap();
        let stored = commit_questions(
            &[extracted(1, true), extracted(2, false)],
            &mut sink,
            1,
            ImageEncoding::Png,
        )
        .unwrap();

        assert!(stored[0].id.ends_with("question_1.png"));
        assert!(Path::new(&stored[0].id).exists());
        assert_eq!(stored[1].id, "question_2");

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(sink.manifest_path()).unwrap()).unwrap();
        assert_eq!(manifest["questions"].as_array().unwrap().len(), 2);
        assert_eq!(manifest["questions"][0]["marks"], "2.5");
        assert!(manifest["questions"][1].get("image").is_none());
    }
}
