//! Editor configuration.
//!
//! Everything the underlying canvas library would otherwise hard-code lives
//! here and is passed at construction. Deserializes from camelCase JSON with
//! every field optional.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// The printable region of the canvas, in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrintArea {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub corner_radius: f64,
}

impl Default for PrintArea {
    fn default() -> Self {
        Self {
            left: 50.0,
            top: 100.0,
            width: 300.0,
            height: 600.0,
            corner_radius: 36.0,
        }
    }
}

impl PrintArea {
    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    pub fn rect(&self) -> Rect {
        Rect::new(
            self.left,
            self.top,
            self.left + self.width,
            self.top + self.height,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub print_area: PrintArea,
    /// Maximum number of undo snapshots.
    pub history_cap: usize,
    pub autosave_debounce_ms: u64,
    /// Drafts larger than this are not written.
    pub draft_max_bytes: usize,
    pub preview_multiplier: f64,
    pub print_multiplier: f64,
    pub fallback_base_color: String,
    pub fallback_mask_color: String,
    pub fallback_mask_opacity: f64,
    /// Share of the print area a new frame is fitted into.
    pub frame_fit: f64,
    /// Share of the print area a new photo is fitted into.
    pub image_fit: f64,
    /// Share of the print area a new sticker is fitted into.
    pub sticker_fit: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            canvas_width: 400.0,
            canvas_height: 800.0,
            print_area: PrintArea::default(),
            history_cap: 50,
            autosave_debounce_ms: 800,
            draft_max_bytes: 4 * 1024 * 1024,
            preview_multiplier: 2.0,
            print_multiplier: 4.0,
            fallback_base_color: pcase_core::classify::LEGACY_BASE_FILL.to_string(),
            fallback_mask_color: pcase_core::classify::LEGACY_MASK_FILL.to_string(),
            fallback_mask_opacity: 0.35,
            frame_fit: 0.8,
            image_fit: 0.8,
            sticker_fit: 0.35,
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
