//! Scene wire format.
//!
//! `ObjectRecord` is the loose, camelCase JSON shape shared by undo
//! snapshots, drafts and export. It mirrors what a retained-mode canvas
//! library serializes (`left`, `scaleX`, `clipPath`, `data.*` tags) and is
//! deliberately permissive on input: unknown fields are ignored and legacy
//! records without role tags are classified by [`crate::classify`].

use crate::classify::classify;
use crate::error::{SceneError, SceneResult};
use crate::id::ObjectId;
use crate::model::*;
use kurbo::Point;
use serde::{Deserialize, Deserializer, Serialize};

/// Current scene format version.
pub const SCENE_VERSION: u32 = 1;

fn one() -> f64 {
    1.0
}

fn yes() -> bool {
    true
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

/// Accept `400`, `"400"`, `"bold"` or `"normal"`.
fn de_font_weight<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u16>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Weight {
        Num(f64),
        Name(String),
    }
    Ok(match Option::<Weight>::deserialize(d)? {
        None => None,
        Some(Weight::Num(n)) => Some(n.clamp(100.0, 900.0) as u16),
        Some(Weight::Name(s)) => match s.as_str() {
            "bold" => Some(700),
            "normal" => Some(400),
            other => other.parse::<u16>().ok(),
        },
    })
}

/// Role tags and editor metadata carried in a record's `data` bag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_system: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropSpec>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub crop_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hole: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<BarcodeSpec>,
}

/// Serialized clip region. Nests through `clipPath` like its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "one")]
    pub scale_x: f64,
    #[serde(default = "one")]
    pub scale_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathCmd>>,
    #[serde(default)]
    pub absolute_positioned: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub boundary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_path: Option<Box<ClipRecord>>,
}

/// One drawable object on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default = "one")]
    pub scale_x: f64,
    #[serde(default = "one")]
    pub scale_y: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default)]
    pub origin_x: OriginX,
    #[serde(default)]
    pub origin_y: OriginY,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub stroke_width: f64,
    #[serde(default = "one")]
    pub opacity: f64,
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default = "yes")]
    pub selectable: bool,
    #[serde(default = "yes")]
    pub evented: bool,
    #[serde(default)]
    pub data: RecordData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_path: Option<Box<ClipRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(
        default,
        deserialize_with = "de_font_weight",
        skip_serializing_if = "Option::is_none"
    )]
    pub font_weight: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx: Option<f64>,
}

/// A whole scene on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRecord {
    #[serde(default = "default_version")]
    pub version: u32,
    pub objects: Vec<ObjectRecord>,
    #[serde(default)]
    pub background: CanvasBackground,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<ViewportState>,
}

fn default_version() -> u32 {
    SCENE_VERSION
}

impl SceneRecord {
    /// Parse a scene payload. Blank input is reported as [`SceneError::Empty`].
    pub fn from_json(s: &str) -> SceneResult<Self> {
        if s.trim().is_empty() {
            return Err(SceneError::Empty);
        }
        let record: SceneRecord = serde_json::from_str(s)?;
        if record.version > SCENE_VERSION {
            return Err(SceneError::Version(record.version));
        }
        Ok(record)
    }

    pub fn to_json(&self) -> SceneResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Which objects a serialization includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFilter {
    /// Every object, template layers included (preview / full scene JSON).
    All,
    /// User content only (history snapshots, drafts).
    UserOnly,
}

// ─── Clip conversion ─────────────────────────────────────────────────────

impl ClipRegion {
    pub fn to_record(&self) -> ClipRecord {
        let mut rec = ClipRecord {
            kind: String::new(),
            left: self.left,
            top: self.top,
            angle: self.angle,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            width: None,
            height: None,
            rx: None,
            radius: None,
            points: None,
            path: None,
            absolute_positioned: self.absolute,
            boundary: self.boundary,
            clip_path: self.inner.as_ref().map(|c| Box::new(c.to_record())),
        };
        match &self.shape {
            ClipShape::Rect { width, height, rx } => {
                rec.kind = "rect".into();
                rec.width = Some(*width);
                rec.height = Some(*height);
                rec.rx = Some(*rx);
            }
            ClipShape::Circle { radius } => {
                rec.kind = "circle".into();
                rec.radius = Some(*radius);
            }
            ClipShape::Polygon { points } => {
                rec.kind = "polygon".into();
                rec.points = Some(points.to_vec());
            }
            ClipShape::Path { commands } => {
                rec.kind = "path".into();
                rec.path = Some(commands.clone());
            }
        }
        rec
    }

    pub fn from_record(rec: &ClipRecord) -> SceneResult<Self> {
        let missing = || SceneError::UnsupportedType(format!("clip `{}`", rec.kind));
        let shape = match rec.kind.as_str() {
            "rect" => ClipShape::Rect {
                width: rec.width.ok_or_else(missing)?,
                height: rec.height.ok_or_else(missing)?,
                rx: rec.rx.unwrap_or(0.0),
            },
            "circle" => ClipShape::Circle {
                radius: rec.radius.ok_or_else(missing)?,
            },
            "polygon" => ClipShape::Polygon {
                points: rec.points.as_deref().ok_or_else(missing)?.iter().copied().collect(),
            },
            "path" => ClipShape::Path {
                commands: rec.path.clone().ok_or_else(missing)?,
            },
            _ => return Err(missing()),
        };
        let inner = match &rec.clip_path {
            Some(inner) => Some(Box::new(ClipRegion::from_record(inner)?)),
            None => None,
        };
        Ok(ClipRegion {
            shape,
            left: rec.left,
            top: rec.top,
            angle: rec.angle,
            scale_x: rec.scale_x,
            scale_y: rec.scale_y,
            absolute: rec.absolute_positioned,
            boundary: rec.boundary,
            inner,
        })
    }
}

// ─── Object conversion ───────────────────────────────────────────────────

impl SceneObject {
    pub fn to_record(&self) -> ObjectRecord {
        let mut data = RecordData {
            kind: Some(self.role.kind_tag().to_string()),
            crop: self.crop,
            crop_locked: self.crop_locked,
            frame_id: self.in_frame.map(|id| id.as_str().to_string()),
            barcode: self.barcode.clone(),
            ..Default::default()
        };
        if let Role::System(layer) = self.role {
            data.role = Some(
                match layer {
                    SystemLayer::Base => "base",
                    SystemLayer::Mask => "mask",
                }
                .to_string(),
            );
            data.system_id = Some(layer.system_id().to_string());
            data.is_system = Some(true);
        }
        if let Some(frame) = &self.frame {
            data.photo_id = frame.photo.map(|id| id.as_str().to_string());
            data.hole = frame.hole.clone();
        }

        let mut rec = ObjectRecord {
            id: Some(self.id.as_str().to_string()),
            kind: self.content.type_name().to_string(),
            left: self.left,
            top: self.top,
            width: self.width,
            height: self.height,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            angle: self.angle,
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            fill: self.fill.clone(),
            stroke: self.stroke.clone(),
            stroke_width: self.stroke_width,
            opacity: self.opacity,
            visible: self.visible,
            selectable: self.selectable,
            evented: self.evented,
            data,
            clip_path: self.clip.as_ref().map(|c| Box::new(c.to_record())),
            src: None,
            text: None,
            font_family: None,
            font_size: None,
            font_weight: None,
            rx: None,
        };
        match &self.content {
            Content::Image { src } => rec.src = Some(src.clone()),
            Content::Text(t) => {
                rec.text = Some(t.text.clone());
                rec.font_family = Some(t.font_family.clone());
                rec.font_size = Some(t.font_size);
                rec.font_weight = Some(t.font_weight);
            }
            Content::Rect { rx } => rec.rx = Some(*rx),
        }
        rec
    }

    /// Build a typed object from a record, classifying its role.
    ///
    /// Records without an id get a fresh one.
    pub fn from_record(rec: &ObjectRecord) -> SceneResult<Self> {
        let content = match rec.kind.as_str() {
            "image" => Content::Image {
                src: rec.src.clone().unwrap_or_default(),
            },
            "text" | "textbox" | "i-text" => {
                let defaults = TextContent::default();
                Content::Text(TextContent {
                    text: rec.text.clone().unwrap_or_default(),
                    font_family: rec.font_family.clone().unwrap_or(defaults.font_family),
                    font_size: rec.font_size.unwrap_or(defaults.font_size),
                    font_weight: rec.font_weight.unwrap_or(defaults.font_weight),
                })
            }
            "rect" => Content::Rect {
                rx: rec.rx.unwrap_or(0.0),
            },
            other => return Err(SceneError::UnsupportedType(other.to_string())),
        };
        let role = classify(rec);
        let id = match rec.id.as_deref() {
            Some(id) if !id.is_empty() => ObjectId::intern(id),
            _ => ObjectId::with_prefix(role.kind_tag()),
        };

        let mut obj = SceneObject::new(id, role, content, rec.width, rec.height);
        obj.left = rec.left;
        obj.top = rec.top;
        obj.scale_x = rec.scale_x;
        obj.scale_y = rec.scale_y;
        obj.angle = rec.angle;
        obj.origin_x = rec.origin_x;
        obj.origin_y = rec.origin_y;
        obj.fill = rec.fill.clone();
        obj.stroke = rec.stroke.clone();
        obj.stroke_width = rec.stroke_width;
        obj.opacity = rec.opacity;
        obj.visible = rec.visible;
        obj.selectable = rec.selectable;
        obj.evented = rec.evented;
        obj.clip = match &rec.clip_path {
            Some(c) => Some(ClipRegion::from_record(c)?),
            None => None,
        };
        obj.crop = rec.data.crop.filter(|c| c.shape != CropShape::None);
        obj.crop_locked = rec.data.crop_locked;
        obj.in_frame = rec.data.frame_id.as_deref().map(ObjectId::intern);
        obj.barcode = rec.data.barcode.clone();
        if role == Role::Frame {
            obj.frame = Some(FrameSpec {
                hole: rec.data.hole.clone(),
                photo: rec.data.photo_id.as_deref().map(ObjectId::intern),
            });
        }
        Ok(obj)
    }
}

/// Convert records to objects, skipping (and logging) ones that cannot be read.
pub fn objects_from_records(records: &[ObjectRecord]) -> Vec<SceneObject> {
    records
        .iter()
        .filter_map(|rec| match SceneObject::from_record(rec) {
            Ok(obj) => Some(obj),
            Err(e) => {
                log::warn!("skipping unreadable record {:?}: {e}", rec.id);
                None
            }
        })
        .collect()
}

impl Scene {
    pub fn to_record(&self, filter: RecordFilter) -> SceneRecord {
        let objects = self
            .objects
            .iter()
            .filter(|o| filter == RecordFilter::All || !o.is_system())
            .map(SceneObject::to_record)
            .collect();
        SceneRecord {
            version: SCENE_VERSION,
            objects,
            background: self.background.clone(),
            viewport: Some(self.viewport),
        }
    }

    pub fn to_json(&self, filter: RecordFilter) -> SceneResult<String> {
        self.to_record(filter).to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn legacy_fabric_record_parses() {
        let json = r##"{
            "type": "textbox", "left": 10, "top": 20, "width": 200, "height": 40,
            "fontWeight": "bold", "text": "Hi", "fill": "#000000",
            "shadow": null, "charSpacing": 0
        }"##;
        let rec: ObjectRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.font_weight, Some(700));
        assert_eq!(rec.scale_x, 1.0);
        assert!(rec.visible);

        let obj = SceneObject::from_record(&rec).unwrap();
        assert_eq!(obj.role, Role::Text);
        assert!(obj.id.as_str().starts_with("text_"));
    }

    #[test]
    fn nested_clip_roundtrip() {
        let mut obj = SceneObject::new(
            ObjectId::intern("nested_clip"),
            Role::Image,
            Content::Image { src: "a.png".into() },
            100.0,
            80.0,
        );
        obj.set_shape_clip(Some(ClipRegion::new(ClipShape::Path {
            commands: crate::geometry::heart_path(72.0, 1.0),
        })));
        obj.set_boundary(Some(ClipRegion::new(ClipShape::Rect {
            width: 300.0,
            height: 600.0,
            rx: 24.0,
        })));
        obj.crop = Some(CropSpec {
            shape: CropShape::Heart,
            param: 50.0,
        });

        let rec = obj.to_record();
        let json = serde_json::to_string(&rec).unwrap();
        let back: ObjectRecord = serde_json::from_str(&json).unwrap();
        let restored = SceneObject::from_record(&back).unwrap();
        assert_eq!(restored, obj);
        assert_eq!(restored.to_record(), rec);
    }

    #[test]
    fn unknown_type_is_rejected_and_skipped() {
        let recs: Vec<ObjectRecord> = serde_json::from_str(
            r#"[{"type":"group","id":"g1"},{"type":"rect","id":"r1","width":4,"height":4}]"#,
        )
        .unwrap();
        assert!(SceneObject::from_record(&recs[0]).is_err());
        let objs = objects_from_records(&recs);
        assert_eq!(objs.len(), 1);
        assert_eq!(objs[0].id.as_str(), "r1");
    }

    #[test]
    fn empty_and_future_payloads() {
        assert!(matches!(SceneRecord::from_json("  "), Err(SceneError::Empty)));
        assert!(matches!(
            SceneRecord::from_json(r#"{"version": 99, "objects": []}"#),
            Err(SceneError::Version(99))
        ));
        assert!(matches!(
            SceneRecord::from_json("{not json"),
            Err(SceneError::Json(_))
        ));
    }

    #[test]
    fn user_only_filter_drops_system_layers() {
        let mut scene = Scene::new(400.0, 700.0);
        scene.push(SceneObject::new(
            ObjectId::intern("sys_base_rec"),
            Role::System(SystemLayer::Base),
            Content::Image { src: "b.png".into() },
            10.0,
            10.0,
        ));
        scene.push(SceneObject::new(
            ObjectId::intern("user_rec"),
            Role::Sticker,
            Content::Image { src: "s.png".into() },
            10.0,
            10.0,
        ));
        let all = scene.to_record(RecordFilter::All);
        let user = scene.to_record(RecordFilter::UserOnly);
        assert_eq!(all.objects.len(), 2);
        assert_eq!(user.objects.len(), 1);
        assert_eq!(all.objects[0].data.system_id.as_deref(), Some("system_base_image"));
        assert_eq!(user.objects[0].data.kind.as_deref(), Some("sticker"));
    }
}
