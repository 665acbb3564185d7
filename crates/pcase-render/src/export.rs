//! Export seam: what to include and at what resolution, independent of the
//! backend that actually produces pixels.

use pcase_core::{Scene, SceneObject};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot export a {width}×{height} canvas at multiplier {multiplier}")]
    InvalidSize {
        width: f64,
        height: f64,
        multiplier: f64,
    },

    #[error("rasterizer failed: {0}")]
    Backend(String),
}

/// The two export flavors the editor offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// On-screen mockup: template layers and canvas background included.
    Preview,
    /// Print file: template layers hidden, transparent background.
    Print,
}

/// Resolved export settings handed to a [`Rasterizer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportOptions {
    pub multiplier: f64,
    pub include_system: bool,
    pub transparent_background: bool,
}

impl ExportOptions {
    pub fn preview(multiplier: f64) -> Self {
        Self {
            multiplier,
            include_system: true,
            transparent_background: false,
        }
    }

    pub fn print(multiplier: f64) -> Self {
        Self {
            multiplier,
            include_system: false,
            transparent_background: true,
        }
    }

    pub fn for_kind(kind: ExportKind, multiplier: f64) -> Self {
        match kind {
            ExportKind::Preview => Self::preview(multiplier),
            ExportKind::Print => Self::print(multiplier),
        }
    }

    /// Whether `obj` is painted under these settings.
    pub fn includes(&self, obj: &SceneObject) -> bool {
        obj.visible && (self.include_system || !obj.is_system())
    }

    /// Output size in device pixels.
    pub fn pixel_size(&self, scene: &Scene) -> Result<(u32, u32), RenderError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(scene.width) || !valid(scene.height) || !valid(self.multiplier) {
            return Err(RenderError::InvalidSize {
                width: scene.width,
                height: scene.height,
                multiplier: self.multiplier,
            });
        }
        Ok((
            (scene.width * self.multiplier).round() as u32,
            (scene.height * self.multiplier).round() as u32,
        ))
    }
}

/// Turns a scene into an image URI.
///
/// Implemented by [`crate::svg::SvgRasterizer`]; hosts with a real canvas
/// backend plug in their own.
pub trait Rasterizer {
    fn rasterize(&self, scene: &Scene, options: &ExportOptions) -> Result<String, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcase_core::{Content, ObjectId, Role, SystemLayer};

    #[test]
    fn kinds_resolve_flags() {
        let preview = ExportOptions::for_kind(ExportKind::Preview, 2.0);
        let print = ExportOptions::for_kind(ExportKind::Print, 4.0);
        assert_eq!(preview.multiplier, 2.0);
        assert_eq!(print.multiplier, 4.0);
        assert!(preview.include_system && !preview.transparent_background);
        assert!(!print.include_system && print.transparent_background);
    }

    #[test]
    fn print_skips_system_and_hidden() {
        let base = SceneObject::new(
            ObjectId::intern("exp_base"),
            Role::System(SystemLayer::Base),
            Content::Image { src: "b.png".into() },
            1.0,
            1.0,
        );
        let mut hidden = SceneObject::new(
            ObjectId::intern("exp_hidden"),
            Role::Sticker,
            Content::Image { src: "s.png".into() },
            1.0,
            1.0,
        );
        hidden.visible = false;

        let print = ExportOptions::for_kind(ExportKind::Print, 4.0);
        let preview = ExportOptions::for_kind(ExportKind::Preview, 2.0);
        assert!(!print.includes(&base));
        assert!(preview.includes(&base));
        assert!(!preview.includes(&hidden));
    }

    #[test]
    fn pixel_size_rejects_empty_canvas() {
        let opts = ExportOptions::for_kind(ExportKind::Print, 4.0);
        assert_eq!(opts.pixel_size(&Scene::new(300.0, 600.0)).unwrap(), (1200, 2400));
        assert!(opts.pixel_size(&Scene::new(0.0, 600.0)).is_err());
    }
}
