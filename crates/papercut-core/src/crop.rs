//! Operator-driven crop correction.
//!
//! A [`CropSession`] holds one rendered page, a rectangle in display
//! coordinates and the slices collected so far. It ends with either
//! [`CropSession::save`] or [`CropSession::cancel`]; both consume it.

use crate::config::SegmentConfig;
use crate::error::PapercutError;
use crate::extraction::DocumentSource;
use crate::model::{Coordinates, ExtractedQuestion};
use crate::raster::{crop_rect, render_page};
use crate::slice::stitch_vertical;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropTargetKind {
    Question,
    Answer,
}

/// Which extracted item a session edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropTarget {
    pub kind: CropTargetKind,
    pub index: usize,
}

/// Rectangle in display coordinates, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Resize handle: four edges and four corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    N,
    S,
    E,
    W,
    NE,
    NW,
    SE,
    SW,
}

impl Handle {
    fn moves_top(self) -> bool {
        matches!(self, Handle::N | Handle::NE | Handle::NW)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, Handle::S | Handle::SE | Handle::SW)
    }

    fn moves_left(self) -> bool {
        matches!(self, Handle::W | Handle::NW | Handle::SW)
    }

    fn moves_right(self) -> bool {
        matches!(self, Handle::E | Handle::NE | Handle::SE)
    }
}

/// Result of a saved session, ready to be applied to the target item.
#[derive(Debug, Clone)]
pub struct CropOutcome {
    pub target: CropTarget,
    pub page: usize,
    /// All slices stitched top to bottom.
    pub image: RgbaImage,
    pub slices: Vec<RgbaImage>,
}

pub struct CropSession {
    target: CropTarget,
    page: usize,
    page_image: RgbaImage,
    display_width: f32,
    display_height: f32,
    rect: Rect,
    slices: Vec<RgbaImage>,
    reference_scale: f32,
    min_size: f32,
    default_height: f32,
}

impl CropSession {
    /// Open a session on the page an item was found on.
    ///
    /// The page is rendered at the reference scale. `display_width` is the
    /// width the page is shown at; `None` shows it at natural size. The
    /// rectangle spans the full width and is seeded from the item's stored
    /// coordinates.
    pub fn open(
        doc: &dyn DocumentSource,
        target: CropTarget,
        item: &ExtractedQuestion,
        display_width: Option<f32>,
        config: &SegmentConfig,
    ) -> Result<Self, PapercutError> {
        Self::open_at(doc, target, item.page, item.coordinates, display_width, config)
    }

    /// Open a session on any page, seeding the rectangle from `coordinates`
    /// (scale 1.0, top-down).
    pub fn open_at(
        doc: &dyn DocumentSource,
        target: CropTarget,
        page: usize,
        coordinates: Coordinates,
        display_width: Option<f32>,
        config: &SegmentConfig,
    ) -> Result<Self, PapercutError> {
        let page_image = load_page(doc, page, config.reference_scale)?;
        let natural_w = page_image.width() as f32;
        let display_width = display_width.filter(|w| *w > 0.0).unwrap_or(natural_w);

        let mut session = CropSession {
            target,
            page,
            page_image,
            display_width,
            display_height: 0.0,
            rect: Rect {
                x: 0.0,
                y: 0.0,
                w: display_width,
                h: 0.0,
            },
            slices: Vec::new(),
            reference_scale: config.reference_scale,
            min_size: config.crop_min_size,
            default_height: config.crop_default_height,
        };
        session.display_height = session.fit_height(display_width);

        let to_display = session.display_height / session.page_image.height() as f32;
        let y = (coordinates.y_start * session.reference_scale).max(0.0);
        let h = ((coordinates.y_end - coordinates.y_start) * session.reference_scale)
            .max(config.crop_min_initial_height);
        session.rect.y = y * to_display;
        session.rect.h = h * to_display;
        session.clamp_rect();
        Ok(session)
    }

    pub fn target(&self) -> CropTarget {
        self.target
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn page_image(&self) -> &RgbaImage {
        &self.page_image
    }

    pub fn display_size(&self) -> (f32, f32) {
        (self.display_width, self.display_height)
    }

    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    /// The page is now shown at a different width. The rectangle is scaled
    /// along with it.
    pub fn set_display_width(&mut self, width: f32) {
        if width <= 0.0 || !width.is_finite() {
            return;
        }
        let k = width / self.display_width;
        self.display_width = width;
        self.display_height = self.fit_height(width);
        self.rect = Rect {
            x: self.rect.x * k,
            y: self.rect.y * k,
            w: self.rect.w * k,
            h: self.rect.h * k,
        };
        self.clamp_rect();
    }

    /// Place the rectangle directly, e.g. from typed-in coordinates. It is
    /// clamped like a drag would be.
    pub fn set_rect(&mut self, rect: Rect) {
        let w = rect.w.clamp(self.min_size.min(self.display_width), self.display_width);
        let h = rect.h.clamp(self.min_size.min(self.display_height), self.display_height);
        self.rect = Rect {
            x: rect.x,
            y: rect.y,
            w,
            h,
        };
        self.clamp_rect();
    }

    /// Move the rectangle, keeping it inside the page.
    pub fn move_by(&mut self, dx: f32, dy: f32) {
        let r = &mut self.rect;
        r.x = (r.x + dx).clamp(0.0, (self.display_width - r.w).max(0.0));
        r.y = (r.y + dy).clamp(0.0, (self.display_height - r.h).max(0.0));
    }

    /// Drag a handle to pointer position `(px, py)` in display coordinates.
    ///
    /// Each edge is clamped on its own: the rectangle stays inside the page
    /// and never gets narrower or shorter than the minimum size.
    pub fn drag(&mut self, handle: Handle, px: f32, py: f32) {
        let (page_w, page_h) = (self.display_width, self.display_height);
        let (min_w, min_h) = (self.min_size.min(page_w), self.min_size.min(page_h));
        let r = &mut self.rect;

        // The page bound is applied last so an edge never leaves the page.
        if handle.moves_top() {
            let new_y = py.min(r.y + r.h - min_h).max(0.0);
            r.h += r.y - new_y;
            r.y = new_y;
        } else if handle.moves_bottom() {
            r.h = (py - r.y).max(min_h).min(page_h - r.y);
        }

        if handle.moves_left() {
            let new_x = px.min(r.x + r.w - min_w).max(0.0);
            r.w += r.x - new_x;
            r.x = new_x;
        } else if handle.moves_right() {
            r.w = (px - r.x).max(min_w).min(page_w - r.x);
        }
    }

    /// Crop the current rectangle and keep it as a slice.
    pub fn add_slice(&mut self) {
        let slice = self.crop_current();
        self.slices.push(slice);
    }

    pub fn clear_slices(&mut self) {
        self.slices.clear();
    }

    /// Crop the current rectangle one last time and stitch every slice.
    pub fn save(mut self) -> Result<CropOutcome, PapercutError> {
        self.add_slice();
        let image = stitch_vertical(&self.slices)
            .ok_or_else(|| PapercutError::Crop("nothing to stitch".into()))?;
        log::debug!(
            "crop saved for {:?} {} from page {} ({} slice(s))",
            self.target.kind,
            self.target.index,
            self.page,
            self.slices.len()
        );
        Ok(CropOutcome {
            target: self.target,
            page: self.page,
            image,
            slices: self.slices,
        })
    }

    /// Discard the session. The target item is left untouched.
    pub fn cancel(self) -> CropTarget {
        self.target
    }

    /// Show a different page. Slices collected so far are kept and the
    /// rectangle is reset to the top of the new page.
    pub fn change_page(&mut self, doc: &dyn DocumentSource, page: usize) -> Result<(), PapercutError> {
        self.page_image = load_page(doc, page, self.reference_scale)?;
        self.page = page;
        self.display_height = self.fit_height(self.display_width);
        self.rect = Rect {
            x: 0.0,
            y: 0.0,
            w: self.display_width,
            h: self.default_height,
        };
        self.clamp_rect();
        Ok(())
    }

    /// Display height keeping the page image's aspect ratio.
    fn fit_height(&self, display_width: f32) -> f32 {
        let (w, h) = self.page_image.dimensions();
        h as f32 * display_width / w as f32
    }

    fn clamp_rect(&mut self) {
        let min_w = self.min_size.min(self.display_width);
        let min_h = self.min_size.min(self.display_height);
        let r = &mut self.rect;
        r.w = r.w.clamp(min_w, self.display_width);
        r.h = r.h.clamp(min_h, self.display_height);
        r.x = r.x.clamp(0.0, (self.display_width - r.w).max(0.0));
        r.y = r.y.clamp(0.0, (self.display_height - r.h).max(0.0));
    }

    /// Crop the rectangle from the full-resolution page.
    fn crop_current(&self) -> RgbaImage {
        let sx = self.page_image.width() as f32 / self.display_width;
        let sy = self.page_image.height() as f32 / self.display_height;
        let r = self.rect;
        crop_rect(&self.page_image, r.x * sx, r.y * sy, r.w * sx, r.h * sy)
    }
}

fn load_page(doc: &dyn DocumentSource, page: usize, scale: f32) -> Result<RgbaImage, PapercutError> {
    if page == 0 || page > doc.page_count() {
        return Err(PapercutError::Crop(format!(
            "page {page} out of range (document has {} pages)",
            doc.page_count()
        )));
    }
    render_page(doc, page, scale)
}

/// Replace the target item's image with a saved crop.
pub fn apply_crop(
    questions: &mut [ExtractedQuestion],
    answers: &mut [ExtractedQuestion],
    outcome: CropOutcome,
) -> Result<(), PapercutError> {
    let items = match outcome.target.kind {
        CropTargetKind::Question => questions,
        CropTargetKind::Answer => answers,
    };
    let len = items.len();
    let item = items.get_mut(outcome.target.index).ok_or_else(|| {
        PapercutError::Crop(format!(
            "{:?} index {} out of range ({} item(s))",
            outcome.target.kind, outcome.target.index, len
        ))
    })?;
    item.image = Some(outcome.image);
    item.source_images = outcome.slices;
    Ok(())
}
