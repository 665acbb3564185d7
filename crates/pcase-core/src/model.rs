//! Core scene model for the print-area canvas.
//!
//! A `Scene` is an ordered list of `SceneObject`s: index 0 is painted first
//! (back-most), the last index is painted last (front-most). Two of those
//! objects are the product template's system layers (base and mask); every
//! other object is user content. Geometry is expressed in canvas units with
//! Fabric-style placement: `left`/`top` locate the origin anchor, and the
//! object is scaled then rotated about its center.

use crate::id::ObjectId;
use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ─── Colors ──────────────────────────────────────────────────────────────

/// RGBA color. Stored as 4 × f32 [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA`. The `#` is optional.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();
        let pair = |i: usize| -> Option<f32> {
            Some((hex_val(bytes[i])? << 4 | hex_val(bytes[i + 1])?) as f32 / 255.0)
        };

        match bytes.len() {
            3 => {
                let r = hex_val(bytes[0])?;
                let g = hex_val(bytes[1])?;
                let b = hex_val(bytes[2])?;
                Some(Self::rgba(
                    (r * 17) as f32 / 255.0,
                    (g * 17) as f32 / 255.0,
                    (b * 17) as f32 / 255.0,
                    1.0,
                ))
            }
            6 => Some(Self::rgba(pair(0)?, pair(2)?, pair(4)?, 1.0)),
            8 => Some(Self::rgba(pair(0)?, pair(2)?, pair(4)?, pair(6)?)),
            _ => None,
        }
    }

    /// Emit as `#rrggbb` (lowercase), or `#rrggbbaa` when translucent.
    pub fn to_hex(&self) -> String {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        let (r, g, b, a) = (c(self.r), c(self.g), c(self.b), c(self.a));
        if a == 255 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

// ─── Path data ───────────────────────────────────────────────────────────

/// A single path command (SVG-like but simplified), in clip-local units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathCmd {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    CubicTo(f64, f64, f64, f64, f64, f64), // c1, c2, end
    Close,
}

// ─── Roles ───────────────────────────────────────────────────────────────

/// The two template layers the product supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemLayer {
    Base,
    Mask,
}

impl SystemLayer {
    pub const BASE_ID: &'static str = "system_base_image";
    pub const MASK_ID: &'static str = "system_mask_image";

    pub fn system_id(self) -> &'static str {
        match self {
            SystemLayer::Base => Self::BASE_ID,
            SystemLayer::Mask => Self::MASK_ID,
        }
    }

    pub fn from_system_id(s: &str) -> Option<Self> {
        match s {
            Self::BASE_ID => Some(SystemLayer::Base),
            Self::MASK_ID => Some(SystemLayer::Mask),
            _ => None,
        }
    }
}

/// What an object is for. Closed set; legacy records are mapped onto it by
/// [`crate::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    System(SystemLayer),
    Image,
    Text,
    Frame,
    Barcode,
    Sticker,
    Background,
    Shape,
}

impl Role {
    pub fn is_system(self) -> bool {
        matches!(self, Role::System(_))
    }

    /// The `data.kind` tag written into records.
    pub fn kind_tag(self) -> &'static str {
        match self {
            Role::System(_) => "system",
            Role::Image => "image",
            Role::Text => "text",
            Role::Frame => "frame",
            Role::Barcode => "barcode",
            Role::Sticker => "sticker",
            Role::Background => "background",
            Role::Shape => "shape",
        }
    }

    /// Human label for the layer list.
    pub fn label(self) -> &'static str {
        match self {
            Role::System(SystemLayer::Base) => "Base",
            Role::System(SystemLayer::Mask) => "Mask",
            Role::Image => "Photo",
            Role::Text => "Text",
            Role::Frame => "Frame",
            Role::Barcode => "Barcode",
            Role::Sticker => "Sticker",
            Role::Background => "Background",
            Role::Shape => "Shape",
        }
    }
}

// ─── Content ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
    pub font_family: String,
    pub font_size: f64,
    pub font_weight: u16, // 100..900
}

impl Default for TextContent {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_family: "Inter".into(),
            font_size: 32.0,
            font_weight: 400,
        }
    }
}

/// Type-specific payload of a drawable object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Content {
    Image { src: String },
    Text(TextContent),
    Rect { rx: f64 },
}

impl Content {
    /// The record `type` discriminator.
    pub fn type_name(&self) -> &'static str {
        match self {
            Content::Image { .. } => "image",
            Content::Text(_) => "text",
            Content::Rect { .. } => "rect",
        }
    }

    pub fn src(&self) -> Option<&str> {
        match self {
            Content::Image { src } => Some(src),
            _ => None,
        }
    }
}

/// Horizontal origin anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginX {
    Left,
    #[default]
    Center,
    Right,
}

/// Vertical origin anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginY {
    Top,
    #[default]
    Center,
    Bottom,
}

impl OriginX {
    fn factor(self) -> f64 {
        match self {
            OriginX::Left => 0.0,
            OriginX::Center => 0.5,
            OriginX::Right => 1.0,
        }
    }
}

impl OriginY {
    fn factor(self) -> f64 {
        match self {
            OriginY::Top => 0.0,
            OriginY::Center => 0.5,
            OriginY::Bottom => 1.0,
        }
    }
}

// ─── Crop ────────────────────────────────────────────────────────────────

/// Crop shapes offered by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropShape {
    #[default]
    None,
    Circle,
    Rounded,
    Heart,
    Star,
}

impl CropShape {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(CropShape::None),
            "circle" => Some(CropShape::Circle),
            "rounded" => Some(CropShape::Rounded),
            "heart" => Some(CropShape::Heart),
            "star" => Some(CropShape::Star),
            _ => None,
        }
    }
}

/// Remembered crop parameters, so a later slider change can regenerate the
/// geometry without re-deriving it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropSpec {
    #[serde(rename = "type")]
    pub shape: CropShape,
    pub param: f64,
}

// ─── Clip regions ────────────────────────────────────────────────────────

/// Geometry of a clip region in its own local space, centered on (0, 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClipShape {
    Rect { width: f64, height: f64, rx: f64 },
    Circle { radius: f64 },
    Polygon { points: SmallVec<[Point; 10]> },
    Path { commands: Vec<PathCmd> },
}

/// A geometric mask attached to an object.
///
/// Placement is center-based. A relative clip is expressed in the owner's
/// local (pre-transform) space; an absolute clip is in canvas space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipRegion {
    pub shape: ClipShape,
    pub left: f64,
    pub top: f64,
    pub angle: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub absolute: bool,
    /// Marks the print-area boundary clip. Its `inner` clip is the user shape.
    pub boundary: bool,
    pub inner: Option<Box<ClipRegion>>,
}

impl ClipRegion {
    /// A relative clip centered on its owner.
    pub fn new(shape: ClipShape) -> Self {
        Self {
            shape,
            left: 0.0,
            top: 0.0,
            angle: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            absolute: false,
            boundary: false,
            inner: None,
        }
    }

    /// Own placement transform (clip-local → parent space).
    pub fn affine(&self) -> Affine {
        crate::geometry::compose(
            Point::new(self.left, self.top),
            self.angle,
            self.scale_x,
            self.scale_y,
        )
    }

    /// Clip-local → canvas transform, given the owner's transform.
    pub fn world_affine(&self, owner: Affine) -> Affine {
        if self.absolute {
            self.affine()
        } else {
            owner * self.affine()
        }
    }

    /// Overwrite placement from an affine (skew is dropped).
    pub fn set_affine(&mut self, a: Affine) {
        let d = crate::geometry::decompose(a);
        self.left = d.translation.x;
        self.top = d.translation.y;
        self.angle = d.angle;
        self.scale_x = d.scale_x;
        self.scale_y = d.scale_y;
    }
}

// ─── Scene objects ───────────────────────────────────────────────────────

/// Center-based placement snapshot used for delta synchronization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub center: Point,
    pub angle: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

/// Frame decoration data: the content hole and the photo it holds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameSpec {
    /// Hole outline in frame-local units (relative to the frame center).
    pub hole: Option<Vec<Point>>,
    pub photo: Option<ObjectId>,
}

impl FrameSpec {
    /// Offset of the hole's centroid from the frame center.
    pub fn hole_offset(&self) -> Vec2 {
        match &self.hole {
            Some(points) if points.len() >= 3 => {
                crate::geometry::polygon_centroid(points).to_vec2()
            }
            _ => Vec2::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarcodeSpec {
    pub value: String,
    pub format: String,
}

/// A single drawable object.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub id: ObjectId,
    pub role: Role,
    pub content: Content,

    pub left: f64,
    pub top: f64,
    /// Intrinsic (unscaled) size.
    pub width: f64,
    pub height: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Degrees, clockwise.
    pub angle: f64,
    pub origin_x: OriginX,
    pub origin_y: OriginY,

    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: f64,

    pub opacity: f64,
    pub visible: bool,
    pub selectable: bool,
    pub evented: bool,

    pub clip: Option<ClipRegion>,
    pub crop: Option<CropSpec>,
    pub crop_locked: bool,

    /// Set on frame decorations.
    pub frame: Option<FrameSpec>,
    /// Set on a photo held by a frame.
    pub in_frame: Option<ObjectId>,
    pub barcode: Option<BarcodeSpec>,
}

impl SceneObject {
    pub fn new(id: ObjectId, role: Role, content: Content, width: f64, height: f64) -> Self {
        Self {
            id,
            role,
            content,
            left: 0.0,
            top: 0.0,
            width,
            height,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            origin_x: OriginX::Center,
            origin_y: OriginY::Center,
            fill: None,
            stroke: None,
            stroke_width: 0.0,
            opacity: 1.0,
            visible: true,
            selectable: true,
            evented: true,
            clip: None,
            crop: None,
            crop_locked: false,
            frame: None,
            in_frame: None,
            barcode: None,
        }
    }

    pub fn is_system(&self) -> bool {
        self.role.is_system()
    }

    pub fn system_layer(&self) -> Option<SystemLayer> {
        match self.role {
            Role::System(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn scaled_size(&self) -> Vec2 {
        Vec2::new(self.width * self.scale_x.abs(), self.height * self.scale_y.abs())
    }

    /// Vector from the origin anchor to the center, in unrotated scaled units.
    fn anchor_to_center(&self) -> Vec2 {
        Vec2::new(
            (0.5 - self.origin_x.factor()) * self.width * self.scale_x,
            (0.5 - self.origin_y.factor()) * self.height * self.scale_y,
        )
    }

    /// Center point in canvas space.
    pub fn center(&self) -> Point {
        let offset = crate::geometry::rotate_vec(self.anchor_to_center(), self.angle);
        Point::new(self.left, self.top) + offset
    }

    /// Move so the center lands on `p`, keeping the origin anchor.
    pub fn set_center(&mut self, p: Point) {
        let offset = crate::geometry::rotate_vec(self.anchor_to_center(), self.angle);
        let anchor = p - offset;
        self.left = anchor.x;
        self.top = anchor.y;
    }

    /// Object-local (centered, unscaled) → canvas transform.
    pub fn affine(&self) -> Affine {
        crate::geometry::compose(self.center(), self.angle, self.scale_x, self.scale_y)
    }

    pub fn placement(&self) -> Placement {
        Placement {
            center: self.center(),
            angle: self.angle,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
        }
    }

    /// Apply a placement, keeping the origin anchor semantics.
    pub fn set_placement(&mut self, p: Placement) {
        self.angle = p.angle;
        self.scale_x = p.scale_x;
        self.scale_y = p.scale_y;
        self.set_center(p.center);
    }

    /// The user / frame clip, looking through a print-area boundary.
    pub fn shape_clip(&self) -> Option<&ClipRegion> {
        match &self.clip {
            Some(c) if c.boundary => c.inner.as_deref(),
            other => other.as_ref(),
        }
    }

    pub fn shape_clip_mut(&mut self) -> Option<&mut ClipRegion> {
        if self.boundary_clip().is_some() {
            self.clip.as_mut()?.inner.as_deref_mut()
        } else {
            self.clip.as_mut()
        }
    }

    /// Replace the user / frame clip, keeping any boundary around it.
    pub fn set_shape_clip(&mut self, shape: Option<ClipRegion>) {
        match self.clip.as_mut().filter(|c| c.boundary) {
            Some(boundary) => boundary.inner = shape.map(Box::new),
            None => self.clip = shape,
        }
    }

    pub fn boundary_clip(&self) -> Option<&ClipRegion> {
        self.clip.as_ref().filter(|c| c.boundary)
    }

    /// Replace only the outer boundary, preserving the inner shape clip.
    pub fn set_boundary(&mut self, boundary: Option<ClipRegion>) {
        let shape = self.shape_clip().cloned();
        match boundary {
            Some(mut b) => {
                b.boundary = true;
                b.absolute = true;
                b.inner = shape.map(Box::new);
                self.clip = Some(b);
            }
            None => self.clip = shape,
        }
    }
}

// ─── Scene ───────────────────────────────────────────────────────────────

/// Canvas-level background.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CanvasBackground {
    #[default]
    None,
    Color(String),
    Image(String),
}

/// Pan / zoom of the editing viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportState {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

/// The retained scene: ordered objects plus canvas-level state.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub background: CanvasBackground,
    pub viewport: ViewportState,
    pub width: f64,
    pub height: f64,
}

impl Scene {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            objects: Vec::new(),
            background: CanvasBackground::None,
            viewport: ViewportState::default(),
            width,
            height,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn index_of(&self, id: ObjectId) -> Option<usize> {
        self.objects.iter().position(|o| o.id == id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    /// Append at the front of the z-order.
    pub fn push(&mut self, obj: SceneObject) {
        self.objects.push(obj);
    }

    /// Insert at `index` (clamped to the list length).
    pub fn insert(&mut self, index: usize, obj: SceneObject) {
        let index = index.min(self.objects.len());
        self.objects.insert(index, obj);
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        let idx = self.index_of(id)?;
        Some(self.objects.remove(idx))
    }

    /// Remove every object matching `pred`, returning them in z-order.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&SceneObject) -> bool) -> Vec<SceneObject> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.objects.len());
        for obj in self.objects.drain(..) {
            if pred(&obj) {
                removed.push(obj);
            } else {
                kept.push(obj);
            }
        }
        self.objects = kept;
        removed
    }

    pub fn system_objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(|o| o.is_system())
    }

    pub fn user_objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(|o| !o.is_system())
    }

    /// All objects carrying the given system layer tag.
    pub fn layer_objects(&self, layer: SystemLayer) -> impl Iterator<Item = &SceneObject> {
        self.objects
            .iter()
            .filter(move |o| o.system_layer() == Some(layer))
    }

    /// The single base/mask object, if exactly one exists.
    pub fn system_layer(&self, layer: SystemLayer) -> Option<&SceneObject> {
        let mut it = self.layer_objects(layer);
        let first = it.next()?;
        if it.next().is_some() { None } else { Some(first) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: &str, w: f64, h: f64) -> SceneObject {
        SceneObject::new(
            ObjectId::intern(id),
            Role::Image,
            Content::Image {
                src: format!("https://cdn.test/{id}.png"),
            },
            w,
            h,
        )
    }

    #[test]
    fn color_hex_roundtrip() {
        let c = Color::from_hex("#E5E7EB").unwrap();
        assert_eq!(c.to_hex(), "#e5e7eb");
        assert_eq!(Color::from_hex("fff").unwrap().to_hex(), "#ffffff");

        let c2 = Color::from_hex("#FF000080").unwrap();
        assert!((c2.a - 128.0 / 255.0).abs() < 0.01);
        assert_eq!(c2.to_hex().len(), 9);
        assert!(Color::from_hex("#12").is_none());
    }

    #[test]
    fn center_respects_origin_anchor() {
        let mut obj = image("anchored", 100.0, 50.0);
        obj.origin_x = OriginX::Left;
        obj.origin_y = OriginY::Top;
        obj.left = 10.0;
        obj.top = 20.0;
        let c = obj.center();
        assert!((c.x - 60.0).abs() < 1e-9);
        assert!((c.y - 45.0).abs() < 1e-9);

        obj.set_center(Point::new(200.0, 200.0));
        assert!((obj.left - 150.0).abs() < 1e-9);
        assert!((obj.top - 175.0).abs() < 1e-9);
    }

    #[test]
    fn center_of_rotated_top_left_anchor() {
        let mut obj = image("rotated", 100.0, 0.0);
        obj.origin_x = OriginX::Left;
        obj.angle = 90.0;
        let c = obj.center();
        // Half the width, rotated a quarter turn clockwise, points down.
        assert!(c.x.abs() < 1e-9);
        assert!((c.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn boundary_wraps_shape_clip() {
        let mut obj = image("clipped", 100.0, 100.0);
        obj.set_shape_clip(Some(ClipRegion::new(ClipShape::Circle { radius: 50.0 })));
        assert!(obj.boundary_clip().is_none());

        let boundary = ClipRegion::new(ClipShape::Rect {
            width: 300.0,
            height: 600.0,
            rx: 0.0,
        });
        obj.set_boundary(Some(boundary));
        assert!(obj.boundary_clip().is_some());
        assert_eq!(
            obj.shape_clip().map(|c| &c.shape),
            Some(&ClipShape::Circle { radius: 50.0 })
        );

        // Replacing the shape keeps the boundary.
        obj.set_shape_clip(None);
        assert!(obj.boundary_clip().is_some());
        assert!(obj.shape_clip().is_none());

        obj.set_boundary(None);
        assert!(obj.clip.is_none());
    }

    #[test]
    fn shape_clip_mut_reaches_through_boundary() {
        let mut obj = image("clip_mut", 100.0, 100.0);
        assert!(obj.shape_clip_mut().is_none());

        obj.set_shape_clip(Some(ClipRegion::new(ClipShape::Circle { radius: 20.0 })));
        if let Some(clip) = obj.shape_clip_mut() {
            clip.left = 5.0;
        }
        assert_eq!(obj.clip.as_ref().map(|c| c.left), Some(5.0));

        obj.set_boundary(Some(ClipRegion::new(ClipShape::Rect {
            width: 300.0,
            height: 600.0,
            rx: 0.0,
        })));
        if let Some(clip) = obj.shape_clip_mut() {
            clip.shape = ClipShape::Circle { radius: 30.0 };
        }
        assert_eq!(
            obj.shape_clip().map(|c| &c.shape),
            Some(&ClipShape::Circle { radius: 30.0 })
        );
        assert!(obj.boundary_clip().is_some());
    }

    #[test]
    fn remove_where_keeps_order() {
        let mut scene = Scene::new(800.0, 600.0);
        for id in ["r1", "r2", "r3", "r4"] {
            scene.push(image(id, 1.0, 1.0));
        }
        let removed = scene.remove_where(|o| o.id.as_str().ends_with('2') || o.id.as_str() == "r4");
        assert_eq!(removed.len(), 2);
        let left: Vec<&str> = scene.objects.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(left, vec!["r1", "r3"]);
    }
}
