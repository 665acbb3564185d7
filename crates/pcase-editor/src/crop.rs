//! Parametric crop shapes.
//!
//! A crop is a shape clip in the owner's intrinsic box, sized from
//! `min(width, height)`. Unlocked crops are relative and move with the
//! object; locked crops are absolute and stay put while the object pans
//! underneath.

use crate::error::{EditorError, EditorResult};
use pcase_core::geometry::{clamp_param, heart_path, heart_t, star_points, star_ratio};
use pcase_core::{ClipRegion, ClipShape, CropShape, CropSpec, SceneObject};

/// Outer star radius as a share of the base dimension.
pub const STAR_OUTER: f64 = 0.45;
/// Heart size as a share of the base dimension.
pub const HEART_SIZE: f64 = 0.9;

/// Clip geometry for a crop shape on a `width` × `height` box.
pub fn crop_shape(shape: CropShape, param: f64, width: f64, height: f64) -> Option<ClipShape> {
    let size = width.min(height);
    let param = clamp_param(param);
    Some(match shape {
        CropShape::None => return None,
        CropShape::Circle => ClipShape::Circle { radius: size / 2.0 },
        CropShape::Rounded => ClipShape::Rect {
            width,
            height,
            rx: param / 100.0 * size / 2.0,
        },
        CropShape::Star => ClipShape::Polygon {
            points: star_points(STAR_OUTER * size, star_ratio(param)),
        },
        CropShape::Heart => ClipShape::Path {
            commands: heart_path(HEART_SIZE * size, heart_t(param)),
        },
    })
}

fn check_croppable(obj: &SceneObject) -> EditorResult<()> {
    if obj.is_system() {
        return Err(EditorError::SystemObject(obj.id));
    }
    if obj.in_frame.is_some() {
        return Err(EditorError::FrameLinked(obj.id));
    }
    Ok(())
}

/// Apply (or with [`CropShape::None`], clear) a crop on `obj`.
///
/// Keeps the current lock state: a locked object gets an absolute clip at
/// its current transform.
pub fn apply_crop(obj: &mut SceneObject, shape: CropShape, param: f64) -> EditorResult<()> {
    if shape == CropShape::None && obj.in_frame.is_some() {
        return Ok(());
    }
    check_croppable(obj)?;

    let Some(geometry) = crop_shape(shape, param, obj.width, obj.height) else {
        obj.set_shape_clip(None);
        obj.crop = None;
        return Ok(());
    };
    let mut clip = ClipRegion::new(geometry);
    if obj.crop_locked {
        clip.set_affine(obj.affine() * clip.affine());
        clip.absolute = true;
    }
    obj.set_shape_clip(Some(clip));
    obj.crop = Some(CropSpec {
        shape,
        param: clamp_param(param),
    });
    Ok(())
}

/// Regenerate the crop geometry from the stored shape with a new param.
///
/// The clip's placement is kept, so a locked crop does not jump.
pub fn update_crop_param(obj: &mut SceneObject, param: f64) -> EditorResult<()> {
    check_croppable(obj)?;
    let Some(spec) = obj.crop else {
        return Err(EditorError::NoCrop(obj.id));
    };
    let (width, height) = (obj.width, obj.height);
    let Some(geometry) = crop_shape(spec.shape, param, width, height) else {
        return Err(EditorError::NoCrop(obj.id));
    };
    match obj.shape_clip_mut() {
        Some(clip) => clip.shape = geometry,
        None => return apply_crop(obj, spec.shape, param),
    }
    obj.crop = Some(CropSpec {
        shape: spec.shape,
        param: clamp_param(param),
    });
    Ok(())
}

/// Flip the crop lock, converting the clip between relative and absolute
/// so the rendered mask does not move. Returns the new lock state.
///
/// Frame-linked photos only flip the flag; their clip belongs to the frame.
pub fn toggle_crop_lock(obj: &mut SceneObject) -> EditorResult<bool> {
    if obj.is_system() {
        return Err(EditorError::SystemObject(obj.id));
    }
    obj.crop_locked = !obj.crop_locked;
    if obj.in_frame.is_some() {
        return Ok(obj.crop_locked);
    }

    let owner = obj.affine();
    let locked = obj.crop_locked;
    if let Some(clip) = obj.shape_clip_mut() {
        if locked && !clip.absolute {
            clip.set_affine(owner * clip.affine());
            clip.absolute = true;
        } else if !locked && clip.absolute {
            clip.set_affine(owner.inverse() * clip.affine());
            clip.absolute = false;
        }
    }
    Ok(locked)
}
