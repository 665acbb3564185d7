use crate::export::{ExportOptions, Rasterizer, RenderError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use kurbo::Affine;
use pcase_core::{CanvasBackground, ClipRegion, ClipShape, Content, PathCmd, Scene, SceneObject};
use std::fmt::Write;

/// Rasterizer that emits an SVG document as a base64 data URI.
///
/// Clip regions become `<clipPath>` defs in canvas space; nested clips
/// become nested groups so both masks apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgRasterizer;

impl Rasterizer for SvgRasterizer {
    fn rasterize(&self, scene: &Scene, options: &ExportOptions) -> Result<String, RenderError> {
        let svg = render_svg(scene, options)?;
        Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg)))
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn matrix(a: Affine) -> String {
    let [m11, m21, m12, m22, e, f] = a.as_coeffs();
    format!("matrix({m11} {m21} {m12} {m22} {e} {f})")
}

fn path_data(commands: &[PathCmd]) -> String {
    let mut d = String::new();
    for cmd in commands {
        let _ = match cmd {
            PathCmd::MoveTo(x, y) => write!(d, "M {x} {y} "),
            PathCmd::LineTo(x, y) => write!(d, "L {x} {y} "),
            PathCmd::CubicTo(c1x, c1y, c2x, c2y, x, y) => {
                write!(d, "C {c1x} {c1y} {c2x} {c2y} {x} {y} ")
            }
            PathCmd::Close => write!(d, "Z "),
        };
    }
    d.trim_end().to_string()
}

fn clip_element(shape: &ClipShape, transform: Affine) -> String {
    let t = matrix(transform);
    match shape {
        ClipShape::Rect { width, height, rx } => format!(
            "<rect x=\"{}\" y=\"{}\" width=\"{width}\" height=\"{height}\" rx=\"{rx}\" transform=\"{t}\"/>",
            -width / 2.0,
            -height / 2.0,
        ),
        ClipShape::Circle { radius } => {
            format!("<circle cx=\"0\" cy=\"0\" r=\"{radius}\" transform=\"{t}\"/>")
        }
        ClipShape::Polygon { points } => {
            let pts: Vec<String> = points.iter().map(|p| format!("{},{}", p.x, p.y)).collect();
            format!("<polygon points=\"{}\" transform=\"{t}\"/>", pts.join(" "))
        }
        ClipShape::Path { commands } => {
            format!("<path d=\"{}\" transform=\"{t}\"/>", path_data(commands))
        }
    }
}

struct Writer {
    defs: String,
    body: String,
    next_clip: usize,
}

impl Writer {
    /// Emit a clipPath def and return its id. Clip coordinates are canvas space.
    fn clip_def(&mut self, clip: &ClipRegion, owner: Affine) -> String {
        let id = format!("clip{}", self.next_clip);
        self.next_clip += 1;
        let _ = writeln!(
            self.defs,
            "  <clipPath id=\"{id}\" clipPathUnits=\"userSpaceOnUse\">{}</clipPath>",
            clip_element(&clip.shape, clip.world_affine(owner))
        );
        id
    }

    fn object(&mut self, obj: &SceneObject) {
        let owner = obj.affine();
        // Outermost clip first; each nested clip opens one more group.
        let mut opened = 0;
        let mut clip = obj.clip.as_ref();
        while let Some(c) = clip {
            let id = self.clip_def(c, owner);
            let _ = writeln!(self.body, "<g clip-path=\"url(#{id})\">");
            opened += 1;
            clip = c.inner.as_deref();
        }

        let _ = writeln!(
            self.body,
            "<g transform=\"{}\" opacity=\"{}\">",
            matrix(owner),
            obj.opacity
        );
        let (w, h) = (obj.width, obj.height);
        let fill = obj.fill.as_deref().map(escape).unwrap_or_else(|| "none".into());
        let stroke = obj.stroke.as_deref().map(escape).unwrap_or_else(|| "none".into());
        let _ = match &obj.content {
            Content::Image { src } => writeln!(
                self.body,
                "  <image href=\"{}\" x=\"{}\" y=\"{}\" width=\"{w}\" height=\"{h}\" preserveAspectRatio=\"none\"/>",
                escape(src),
                -w / 2.0,
                -h / 2.0,
            ),
            Content::Rect { rx } => writeln!(
                self.body,
                "  <rect x=\"{}\" y=\"{}\" width=\"{w}\" height=\"{h}\" rx=\"{rx}\" fill=\"{fill}\" stroke=\"{stroke}\" stroke-width=\"{}\"/>",
                -w / 2.0,
                -h / 2.0,
                obj.stroke_width,
            ),
            Content::Text(t) => {
                let text_fill = obj.fill.as_deref().map(escape).unwrap_or_else(|| "#000000".into());
                writeln!(
                    self.body,
                    "  <text x=\"0\" y=\"0\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{}\" font-weight=\"{}\" fill=\"{text_fill}\">{}</text>",
                    escape(&t.font_family),
                    t.font_size,
                    t.font_weight,
                    escape(&t.text),
                )
            }
        };
        self.body.push_str("</g>\n");
        for _ in 0..opened {
            self.body.push_str("</g>\n");
        }
    }
}

/// Render the scene to an SVG document.
pub fn render_svg(scene: &Scene, options: &ExportOptions) -> Result<String, RenderError> {
    let (px_w, px_h) = options.pixel_size(scene)?;
    let mut w = Writer {
        defs: String::new(),
        body: String::new(),
        next_clip: 0,
    };

    if !options.transparent_background {
        let _ = match &scene.background {
            CanvasBackground::None => Ok(()),
            CanvasBackground::Color(c) => writeln!(
                w.body,
                "<rect x=\"0\" y=\"0\" width=\"{}\" height=\"{}\" fill=\"{}\"/>",
                scene.width,
                scene.height,
                escape(c)
            ),
            CanvasBackground::Image(src) => writeln!(
                w.body,
                "<image href=\"{}\" x=\"0\" y=\"0\" width=\"{}\" height=\"{}\" preserveAspectRatio=\"xMidYMid slice\"/>",
                escape(src),
                scene.width,
                scene.height
            ),
        };
    }

    let mut painted = 0usize;
    for obj in scene.objects.iter().filter(|o| options.includes(o)) {
        w.object(obj);
        painted += 1;
    }
    log::debug!(
        "svg export: {painted}/{} objects at {px_w}×{px_h}",
        scene.objects.len()
    );

    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{px_w}\" height=\"{px_h}\" viewBox=\"0 0 {} {}\">\n",
        scene.width, scene.height
    );
    if !w.defs.is_empty() {
        svg.push_str("<defs>\n");
        svg.push_str(&w.defs);
        svg.push_str("</defs>\n");
    }
    svg.push_str(&w.body);
    svg.push_str("</svg>");
    Ok(svg)
}
