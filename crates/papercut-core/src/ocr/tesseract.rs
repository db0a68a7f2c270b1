use crate::error::PapercutError;
use crate::extraction::run_tool;
use crate::ocr::{BBox, RecognizedLine, TextRecognizer};
use image::RgbaImage;
use std::path::PathBuf;
use std::process::Command;

#[derive(Debug, Clone)]
pub struct TesseractConfig {
    pub binary: PathBuf,
    /// Traineddata language code(s), e.g. "eng" or "eng+afr".
    pub language: String,
    /// Tesseract `--psm` value. 3 is fully automatic layout analysis.
    pub page_segmentation_mode: u8,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        TesseractConfig {
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            page_segmentation_mode: 3,
        }
    }
}

/// Recognition backend using the tesseract CLI in TSV mode.
pub struct TesseractRecognizer {
    config: TesseractConfig,
}

impl TesseractRecognizer {
    pub fn new(config: TesseractConfig) -> Self {
        TesseractRecognizer { config }
    }

    /// Check if tesseract is available on the system.
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new(TesseractConfig::default())
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, bitmap: &RgbaImage) -> Result<Vec<RecognizedLine>, PapercutError> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("page.png");
        bitmap.save(&input)?;

        let mut cmd = Command::new(&self.config.binary);
        cmd.arg(&input)
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language)
            .arg("--psm")
            .arg(self.config.page_segmentation_mode.to_string())
            .arg("tsv");
        let tsv = run_tool(cmd, "tesseract")?;
        Ok(parse_tsv_lines(&tsv))
    }

    fn backend_name(&self) -> &str {
        "tesseract"
    }
}

/// Word level in tesseract's TSV output.
const WORD_LEVEL: u32 = 5;

/// Aggregate word rows into lines keyed by (block, paragraph, line).
///
/// Columns: level page block par line word left top width height conf text.
fn parse_tsv_lines(tsv: &str) -> Vec<RecognizedLine> {
    let mut lines: Vec<((u32, u32, u32), RecognizedLine)> = Vec::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let num = |i: usize| cols[i].trim().parse::<f32>().ok();
        let Some(level) = cols[0].trim().parse::<u32>().ok() else {
            continue;
        };
        if level != WORD_LEVEL {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        let (Some(left), Some(top), Some(width), Some(height)) = (num(6), num(7), num(8), num(9))
        else {
            continue;
        };
        let key = (
            cols[2].trim().parse().unwrap_or(0),
            cols[3].trim().parse().unwrap_or(0),
            cols[4].trim().parse().unwrap_or(0),
        );
        let bbox = BBox {
            x0: left,
            y0: top,
            x1: left + width,
            y1: top + height,
        };

        match lines.iter_mut().find(|(k, _)| *k == key) {
            Some((_, line)) => {
                line.text.push(' ');
                line.text.push_str(text);
                line.bbox = line.bbox.union(&bbox);
            }
            None => lines.push((
                key,
                RecognizedLine {
                    text: text.to_string(),
                    bbox,
                },
            )),
        }
    }

    lines.into_iter().map(|(_, line)| line).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tsv_groups_words_into_lines() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t720\t960\t-1\t
4\t1\t1\t1\t1\t0\t30\t100\t200\t20\t-1\t
5\t1\t1\t1\t1\t1\t30\t100\t90\t20\t96.1\tQuestion
5\t1\t1\t1\t1\t2\t126\t102\t12\t18\t95.0\t1
5\t1\t1\t1\t2\t1\t30\t140\t60\t14\t91.3\tExplain
5\t1\t1\t1\t2\t2\t94\t140\t40\t14\t90.0\t
";
        let lines = parse_tsv_lines(tsv);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Question 1");
        assert_eq!(
            lines[0].bbox,
            BBox {
                x0: 30.0,
                y0: 100.0,
                x1: 138.0,
                y1: 120.0
            }
        );
        assert_eq!(lines[1].text, "Explain");
    }

    #[test]
    fn test_parse_tsv_ignores_malformed_rows() {
        let tsv = "header\n5\t1\t1\n5\tx\t1\t1\t1\t1\tl\tt\tw\th\t90\tword\n";
        assert!(parse_tsv_lines(tsv).is_empty());
    }
}
