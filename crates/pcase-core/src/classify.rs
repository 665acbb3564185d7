//! Object classification: record tags → [`Role`].
//!
//! Tagged records (`data.systemId`, `data.kind`, `data.role`) are mapped
//! directly. Records written before tagging existed go through
//! [`classify_legacy`], which is best-effort and kept only for compatibility.

use crate::model::{Color, Role, SceneObject, SystemLayer};
use crate::record::{ObjectRecord, RecordData};

/// Fill of the grey placeholder that legacy scenes used as the base layer.
pub const LEGACY_BASE_FILL: &str = "#e5e7eb";
/// Fill of the dark placeholder that legacy scenes used as the mask layer.
pub const LEGACY_MASK_FILL: &str = "#4b5563";

/// Classify a record, preferring explicit tags over heuristics.
pub fn classify(rec: &ObjectRecord) -> Role {
    if let Some(layer) = system_layer_from_tags(&rec.data) {
        return Role::System(layer);
    }
    if let Some(role) = role_from_tags(&rec.data) {
        return role;
    }
    classify_legacy(rec)
}

fn system_layer_from_tags(data: &RecordData) -> Option<SystemLayer> {
    if let Some(layer) = data.system_id.as_deref().and_then(SystemLayer::from_system_id) {
        return Some(layer);
    }
    let tagged_system = data.is_system == Some(true) || data.kind.as_deref() == Some("system");
    if !tagged_system {
        return None;
    }
    match data.role.as_deref() {
        Some("base") | Some("system_base") => Some(SystemLayer::Base),
        Some("mask") | Some("system_mask") => Some(SystemLayer::Mask),
        _ => None,
    }
}

fn role_from_tag(tag: &str) -> Option<Role> {
    Some(match tag {
        "image" | "photo" | "user_image" | "userImage" => Role::Image,
        "text" => Role::Text,
        "frame" => Role::Frame,
        "barcode" => Role::Barcode,
        "sticker" => Role::Sticker,
        "background" | "bg" => Role::Background,
        "shape" => Role::Shape,
        _ => return None,
    })
}

fn role_from_tags(data: &RecordData) -> Option<Role> {
    data.kind
        .as_deref()
        .and_then(role_from_tag)
        .or_else(|| data.role.as_deref().and_then(role_from_tag))
}

fn same_color(fill: Option<&str>, expected: &str) -> bool {
    match (fill.and_then(Color::from_hex), Color::from_hex(expected)) {
        (Some(a), Some(b)) => a.to_hex() == b.to_hex(),
        _ => false,
    }
}

/// Best-effort role for untagged legacy records.
///
/// Placeholder rectangles are recognized by their exact fill color; images
/// by the asset folder in their URL. Anything else falls back to a plain
/// photo, text or shape by record type.
pub fn classify_legacy(rec: &ObjectRecord) -> Role {
    match rec.kind.as_str() {
        "rect" if same_color(rec.fill.as_deref(), LEGACY_BASE_FILL) => {
            Role::System(SystemLayer::Base)
        }
        "rect" if same_color(rec.fill.as_deref(), LEGACY_MASK_FILL) => {
            Role::System(SystemLayer::Mask)
        }
        "rect" => Role::Shape,
        "text" | "textbox" | "i-text" => Role::Text,
        "image" => {
            if rec.data.barcode.is_some() {
                return Role::Barcode;
            }
            let src = rec.src.as_deref().unwrap_or_default();
            if src.contains("/stickers/") {
                Role::Sticker
            } else if src.contains("/frames/") {
                Role::Frame
            } else if src.contains("/backgrounds/") {
                Role::Background
            } else if src.contains("/barcodes/") {
                Role::Barcode
            } else {
                Role::Image
            }
        }
        _ => Role::Shape,
    }
}

// ─── Predicates on live objects ──────────────────────────────────────────

pub fn is_system(obj: &SceneObject) -> bool {
    obj.role.is_system()
}

pub fn is_base(obj: &SceneObject) -> bool {
    obj.role == Role::System(SystemLayer::Base)
}

pub fn is_mask(obj: &SceneObject) -> bool {
    obj.role == Role::System(SystemLayer::Mask)
}

/// A user photo (the only role that can sit inside a frame or be AI-replaced).
pub fn is_user_image(obj: &SceneObject) -> bool {
    obj.role == Role::Image
}

pub fn is_background(obj: &SceneObject) -> bool {
    obj.role == Role::Background
}

pub fn is_frame(obj: &SceneObject) -> bool {
    obj.role == Role::Frame
}

pub fn is_sticker(obj: &SceneObject) -> bool {
    obj.role == Role::Sticker
}

pub fn is_barcode(obj: &SceneObject) -> bool {
    obj.role == Role::Barcode
}
