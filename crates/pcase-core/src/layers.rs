//! Layer synthesis: z-order rules for template layers and the print-area
//! boundary clip that every user object carries.
//!
//! Order rule, back to front:
//!
//! | band | contents |
//! |------|----------|
//! | 0 | the base template layer |
//! | 1 | user backgrounds |
//! | 2 | all other user content, relative order preserved |
//! | 3 | the mask template layer |

use crate::id::ObjectId;
use crate::model::{ClipRegion, ClipShape, Role, Scene, SceneObject, SystemLayer};
use thiserror::Error;

/// A broken layering invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayerViolation {
    #[error("expected exactly one {layer:?} layer, found {count}")]
    LayerCount { layer: SystemLayer, count: usize },
    #[error("base layer is at index {0}, expected 0")]
    BaseNotAtBack(usize),
    #[error("mask layer is at index {index}, expected {expected}")]
    MaskNotAtFront { index: usize, expected: usize },
}

fn band(obj: &SceneObject) -> u8 {
    match obj.role {
        Role::System(SystemLayer::Base) => 0,
        Role::Background => 1,
        Role::System(SystemLayer::Mask) => 3,
        _ => 2,
    }
}

/// Force system objects to be non-interactive.
pub fn lock_system_objects(scene: &mut Scene) {
    for obj in scene.objects.iter_mut().filter(|o| o.is_system()) {
        obj.selectable = false;
        obj.evented = false;
    }
}

/// Enforce the band order. Returns true if anything moved.
pub fn reorder(scene: &mut Scene) -> bool {
    let before: Vec<ObjectId> = scene.objects.iter().map(|o| o.id).collect();
    // Stable sort keeps relative order inside each band.
    scene.objects.sort_by_key(band);
    lock_system_objects(scene);
    let changed = scene.objects.iter().map(|o| o.id).ne(before.iter().copied());
    if changed {
        log::debug!("layer order re-synthesized ({} objects)", scene.objects.len());
    }
    changed
}

/// True when exactly one base and one mask exist.
pub fn has_single_pair(scene: &Scene) -> bool {
    scene.layer_objects(SystemLayer::Base).count() == 1
        && scene.layer_objects(SystemLayer::Mask).count() == 1
}

/// Verify the layering invariant: one base at index 0, one mask at the end.
pub fn check_layering(scene: &Scene) -> Result<(), LayerViolation> {
    for layer in [SystemLayer::Base, SystemLayer::Mask] {
        let count = scene.layer_objects(layer).count();
        if count != 1 {
            return Err(LayerViolation::LayerCount { layer, count });
        }
    }
    let base_idx = scene
        .objects
        .iter()
        .position(|o| o.system_layer() == Some(SystemLayer::Base))
        .unwrap_or_default();
    if base_idx != 0 {
        return Err(LayerViolation::BaseNotAtBack(base_idx));
    }
    let expected = scene.objects.len() - 1;
    let mask_idx = scene
        .objects
        .iter()
        .position(|o| o.system_layer() == Some(SystemLayer::Mask))
        .unwrap_or_default();
    if mask_idx != expected {
        return Err(LayerViolation::MaskNotAtFront {
            index: mask_idx,
            expected,
        });
    }
    Ok(())
}

/// Move a user object to position `to` among the user objects (0 = back).
///
/// System objects are never moved by this; the band order is re-applied
/// afterwards, so a background cannot be dragged above photos.
pub fn move_user_layer(scene: &mut Scene, id: ObjectId, to: usize) -> bool {
    let Some(obj) = scene.get(id) else {
        return false;
    };
    if obj.is_system() {
        log::warn!("refusing to reorder system layer {id}");
        return false;
    }
    let before: Vec<ObjectId> = scene.objects.iter().map(|o| o.id).collect();

    let (system, mut user): (Vec<SceneObject>, Vec<SceneObject>) =
        scene.objects.drain(..).partition(|o| o.is_system());
    if let Some(from) = user.iter().position(|o| o.id == id) {
        let moved = user.remove(from);
        let to = to.min(user.len());
        user.insert(to, moved);
    }
    scene.objects = system;
    scene.objects.extend(user);
    reorder(scene);

    scene.objects.iter().map(|o| o.id).ne(before.iter().copied())
}

/// Print-area boundary clip derived from the base layer's current geometry.
///
/// `corner_radius` is in canvas units and converted into the base layer's
/// local space.
pub fn boundary_from_base(base: &SceneObject, corner_radius: f64) -> ClipRegion {
    let scale = base.scale_x.abs().min(base.scale_y.abs()).max(f64::EPSILON);
    let center = base.center();
    ClipRegion {
        shape: ClipShape::Rect {
            width: base.width,
            height: base.height,
            rx: corner_radius / scale,
        },
        left: center.x,
        top: center.y,
        angle: base.angle,
        scale_x: base.scale_x,
        scale_y: base.scale_y,
        absolute: true,
        boundary: true,
        inner: None,
    }
}

/// Re-derive every user object's outer boundary from the base layer.
///
/// Inner shape clips (crop shapes, frame holes) are preserved. Does nothing
/// and returns false when there is no single base layer.
pub fn refresh_boundaries(scene: &mut Scene, corner_radius: f64) -> bool {
    let Some(base) = scene.system_layer(SystemLayer::Base) else {
        log::debug!("no single base layer; boundaries left as-is");
        return false;
    };
    let boundary = boundary_from_base(base, corner_radius);
    for obj in scene.objects.iter_mut().filter(|o| !o.is_system()) {
        obj.set_boundary(Some(boundary.clone()));
    }
    true
}
