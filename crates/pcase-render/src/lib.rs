pub mod export;
pub mod svg;

pub use export::{ExportKind, ExportOptions, Rasterizer, RenderError};
pub use svg::{SvgRasterizer, render_svg};
