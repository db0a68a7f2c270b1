use papercut_core::crop::{CropSession, CropTarget, CropTargetKind, Rect};
use papercut_core::error::PapercutError;
use papercut_core::extraction::poppler::PopplerOpener;
use papercut_core::extraction::DocumentOpener;
use papercut_core::model::Coordinates;
use papercut_core::raster::{encode, ImageEncoding};
use std::path::{Path, PathBuf};

pub fn run(
    input_file: PathBuf,
    page: usize,
    rects: &[String],
    out: PathBuf,
    display_width: Option<f32>,
    config: Option<PathBuf>,
) -> Result<(), PapercutError> {
    let config = super::load_settings(config.as_deref())?;
    let rects = rects
        .iter()
        .map(|r| parse_rect(r))
        .collect::<Result<Vec<_>, _>>()?;
    let Some((last, earlier)) = rects.split_last() else {
        return Err(PapercutError::Crop("at least one --rect is required".into()));
    };

    let pdf_bytes = std::fs::read(&input_file)?;
    let doc = PopplerOpener::default().open(&pdf_bytes)?;

    let target = CropTarget {
        kind: CropTargetKind::Question,
        index: 0,
    };
    let top = Coordinates {
        y_start: 0.0,
        y_end: 0.0,
    };
    let mut session = CropSession::open_at(doc.as_ref(), target, page, top, display_width, &config)?;

    for rect in earlier {
        session.set_rect(*rect);
        session.add_slice();
    }
    session.set_rect(*last);
    let outcome = session.save()?;

    let bytes = encode(&outcome.image, encoding_for(&out))?;
    std::fs::write(&out, bytes)?;
    let (w, h) = outcome.image.dimensions();
    eprintln!(
        "Wrote {}x{} image from {} slice(s) to {}",
        w,
        h,
        outcome.slices.len(),
        out.display()
    );
    Ok(())
}

/// Parse "x,y,w,h".
fn parse_rect(s: &str) -> Result<Rect, PapercutError> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|e| PapercutError::Crop(format!("invalid rectangle {s:?}: {e}")))?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(Rect {
            x: *x,
            y: *y,
            w: *w,
            h: *h,
        }),
        _ => Err(PapercutError::Crop(format!(
            "invalid rectangle {s:?}: expected x,y,w,h"
        ))),
    }
}

fn encoding_for(path: &Path) -> ImageEncoding {
    let is_jpeg = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false);
    if is_jpeg {
        ImageEncoding::Jpeg { quality: 90 }
    } else {
        ImageEncoding::Png
    }
}
