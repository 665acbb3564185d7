//! Pure geometry helpers: parametric crop shapes, centroids, and affine
//! compose/decompose for center-based placements.
//!
//! Angles are degrees, clockwise on screen (y grows downward).

use crate::model::PathCmd;
use kurbo::{Affine, Point, Vec2};
use smallvec::SmallVec;

/// Inner/outer radius ratio of the classic five-pointed star.
pub const STAR_RATIO_SHARP: f64 = 0.382;
/// Inner/outer radius ratio at which the star is nearly a pentagon.
pub const STAR_RATIO_SOFT: f64 = 0.809;
/// Heart roundness at param 0 (sharpest).
pub const HEART_T_SHARPEST: f64 = -1.2;
/// Heart roundness at param ≥ 50 (roundest).
pub const HEART_T_ROUNDEST: f64 = 1.0;

/// Clamp a crop slider value into `[0, 100]`; NaN becomes 0.
pub fn clamp_param(param: f64) -> f64 {
    if param.is_nan() { 0.0 } else { param.clamp(0.0, 100.0) }
}

/// Rotate a vector by `deg` degrees.
pub fn rotate_vec(v: Vec2, deg: f64) -> Vec2 {
    let (sin, cos) = deg.to_radians().sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Rotate `p` about `center` by `deg` degrees.
pub fn rotate_about(p: Point, center: Point, deg: f64) -> Point {
    center + rotate_vec(p - center, deg)
}

/// translate(center) · rotate(angle) · scale(sx, sy).
pub fn compose(center: Point, angle: f64, scale_x: f64, scale_y: f64) -> Affine {
    Affine::translate(center.to_vec2())
        * Affine::rotate(angle.to_radians())
        * Affine::scale_non_uniform(scale_x, scale_y)
}

/// Result of splitting an affine into translation, rotation and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposed {
    pub translation: Vec2,
    pub angle: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

/// Inverse of [`compose`]. Skew, if any, is folded into `scale_y`.
pub fn decompose(a: Affine) -> Decomposed {
    let [m11, m21, m12, m22, e, f] = a.as_coeffs();
    let scale_x = m11.hypot(m21);
    let angle = m21.atan2(m11).to_degrees();
    let det = m11 * m22 - m21 * m12;
    let scale_y = if scale_x.abs() > f64::EPSILON { det / scale_x } else { 0.0 };
    Decomposed {
        translation: Vec2::new(e, f),
        angle,
        scale_x,
        scale_y,
    }
}

/// True when every coefficient of `a` and `b` differs by at most `eps`.
pub fn affine_approx_eq(a: Affine, b: Affine, eps: f64) -> bool {
    a.as_coeffs()
        .iter()
        .zip(b.as_coeffs().iter())
        .all(|(x, y)| (x - y).abs() <= eps)
}

/// Area centroid of a simple polygon. Falls back to the vertex average when
/// the polygon is degenerate.
pub fn polygon_centroid(points: &[Point]) -> Point {
    if points.is_empty() {
        return Point::ZERO;
    }
    let mut area2 = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        let cross = p.x * q.y - q.x * p.y;
        area2 += cross;
        cx += (p.x + q.x) * cross;
        cy += (p.y + q.y) * cross;
    }
    if area2.abs() < 1e-9 {
        let n = points.len() as f64;
        let sum = points.iter().fold(Vec2::ZERO, |acc, p| acc + p.to_vec2());
        return (sum / n).to_point();
    }
    Point::new(cx / (3.0 * area2), cy / (3.0 * area2))
}

/// Inner/outer ratio for a star slider value.
pub fn star_ratio(param: f64) -> f64 {
    STAR_RATIO_SHARP + (STAR_RATIO_SOFT - STAR_RATIO_SHARP) * clamp_param(param) / 100.0
}

/// Ten alternating outer/inner vertices, starting point-up at −90°.
pub fn star_points(outer: f64, ratio: f64) -> SmallVec<[Point; 10]> {
    let inner = outer * ratio;
    (0..10)
        .map(|i| {
            let r = if i % 2 == 0 { outer } else { inner };
            let theta = (-90.0 + 36.0 * i as f64).to_radians();
            Point::new(r * theta.cos(), r * theta.sin())
        })
        .collect()
}

/// Heart roundness factor for a slider value.
///
/// The lower half of the slider sweeps the sharp range; the upper half is
/// pinned at the roundest form.
pub fn heart_t(param: f64) -> f64 {
    let p = clamp_param(param);
    if p < 50.0 {
        HEART_T_SHARPEST + (p / 50.0) * (HEART_T_ROUNDEST - HEART_T_SHARPEST)
    } else {
        HEART_T_ROUNDEST
    }
}

/// Cubic-bezier heart outline of the given size, centered on the origin.
pub fn heart_path(size: f64, t: f64) -> Vec<PathCmd> {
    let r = size / 2.0;
    // 0 at the sharpest form, 1 at the roundest.
    let k = ((t - HEART_T_SHARPEST) / (HEART_T_ROUNDEST - HEART_T_SHARPEST)).clamp(0.0, 1.0);
    let dip = -r * (0.35 + 0.2 * k);
    let side = -0.3 * r;
    let lower1 = r * (0.05 + 0.25 * k);
    let lower2x = r * (0.15 + 0.35 * k);
    let lower2y = r * (0.55 + 0.25 * k);
    vec![
        PathCmd::MoveTo(0.0, dip),
        PathCmd::CubicTo(0.15 * r, -1.05 * r, r, -1.05 * r, r, side),
        PathCmd::CubicTo(r, lower1, lower2x, lower2y, 0.0, r),
        PathCmd::CubicTo(-lower2x, lower2y, -r, lower1, -r, side),
        PathCmd::CubicTo(-r, -1.05 * r, -0.15 * r, -1.05 * r, 0.0, dip),
        PathCmd::Close,
    ]
}
