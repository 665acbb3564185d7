//! Frame links: a frame decoration holding exactly one photo.
//!
//! The photo's shape clip is absolute and always equals the frame's
//! transform composed with the link's fixed hole offset. Links are persisted
//! on the objects themselves (`FrameSpec::photo`, `SceneObject::in_frame`)
//! and rebuilt into [`FrameLinks`] after every restore.

use crate::config::PrintArea;
use crate::error::{EditorError, EditorResult};
use kurbo::{Affine, Point, Vec2};
use pcase_core::geometry::{compose, decompose, polygon_centroid};
use pcase_core::{ClipRegion, ClipShape, FrameSpec, ObjectId, Placement, Role, Scene, SceneObject};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLink {
    pub frame: ObjectId,
    pub photo: ObjectId,
    /// Hole centroid relative to the frame center, in frame-local units.
    pub offset: Vec2,
}

/// Explicit relation table plus the last-seen placement of every linked
/// object, used to derive per-event deltas.
#[derive(Debug, Default)]
pub struct FrameLinks {
    links: Vec<FrameLink>,
    placements: HashMap<ObjectId, Placement>,
}

fn placement_affine(p: &Placement) -> Affine {
    compose(p.center, p.angle, p.scale_x, p.scale_y)
}

fn degenerate(p: &Placement) -> bool {
    p.scale_x.abs() < f64::EPSILON || p.scale_y.abs() < f64::EPSILON
}

/// Move `obj` by the canvas-space change from `prev` to `cur`.
fn carry(obj: &mut SceneObject, prev: &Placement, cur: &Placement) {
    if prev.angle == cur.angle && prev.scale_x == cur.scale_x && prev.scale_y == cur.scale_y {
        let c = obj.center() + (cur.center - prev.center);
        obj.set_center(c);
        return;
    }
    let delta = placement_affine(cur) * placement_affine(prev).inverse();
    let d = decompose(delta * obj.affine());
    obj.set_placement(Placement {
        center: d.translation.to_point(),
        angle: d.angle,
        scale_x: d.scale_x,
        scale_y: d.scale_y,
    });
}

/// The absolute clip a frame imposes on its photo.
pub fn frame_clip(frame: &SceneObject, offset: Vec2) -> ClipRegion {
    let shape = match frame.frame.as_ref().and_then(|f| f.hole.as_ref()) {
        Some(hole) if hole.len() >= 3 => {
            let c = polygon_centroid(hole).to_vec2();
            ClipShape::Polygon {
                points: hole.iter().map(|p| *p - c).collect(),
            }
        }
        _ => ClipShape::Rect {
            width: frame.width,
            height: frame.height,
            rx: 0.0,
        },
    };
    let mut clip = ClipRegion::new(shape);
    clip.set_affine(frame.affine() * Affine::translate(offset));
    clip.absolute = true;
    clip
}

/// Size of the frame's hole in frame-local units (full box when no hole).
pub fn hole_size(frame: &SceneObject) -> Vec2 {
    match frame.frame.as_ref().and_then(|f| f.hole.as_ref()) {
        Some(hole) if hole.len() >= 3 => {
            let (mut min, mut max) = (Point::new(f64::MAX, f64::MAX), Point::new(f64::MIN, f64::MIN));
            for p in hole {
                min = Point::new(min.x.min(p.x), min.y.min(p.y));
                max = Point::new(max.x.max(p.x), max.y.max(p.y));
            }
            max - min
        }
        _ => Vec2::new(frame.width, frame.height),
    }
}

/// Center the frame on the print area, scaled to fit `fit` of it.
pub fn fit_frame(frame: &mut SceneObject, area: &PrintArea, fit: f64) {
    if frame.width <= 0.0 || frame.height <= 0.0 {
        return;
    }
    let s = (area.width * fit / frame.width).min(area.height * fit / frame.height);
    frame.set_placement(Placement {
        center: area.center(),
        angle: 0.0,
        scale_x: s,
        scale_y: s,
    });
}

/// Center the photo on the frame's hole, scaled to cover it.
pub fn cover_photo(photo: &mut SceneObject, frame: &SceneObject, offset: Vec2) {
    if photo.width <= 0.0 || photo.height <= 0.0 {
        return;
    }
    let hole = hole_size(frame);
    let (hw, hh) = (hole.x * frame.scale_x.abs(), hole.y * frame.scale_y.abs());
    let s = (hw / photo.width).max(hh / photo.height);
    photo.set_placement(Placement {
        center: frame.affine() * offset.to_point(),
        angle: frame.angle,
        scale_x: s,
        scale_y: s,
    });
}

impl FrameLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameLink> {
        self.links.iter()
    }

    /// The link `id` takes part in, as frame or as photo.
    pub fn find(&self, id: ObjectId) -> Option<&FrameLink> {
        self.links.iter().find(|l| l.frame == id || l.photo == id)
    }

    pub fn clear(&mut self) {
        self.links.clear();
        self.placements.clear();
    }

    /// Rebuild the table from link fields on the objects.
    ///
    /// One-sided or dangling links are dropped from both ends.
    pub fn rebuild(&mut self, scene: &mut Scene) -> usize {
        self.clear();
        let claims: Vec<(ObjectId, ObjectId, Vec2)> = scene
            .objects
            .iter()
            .filter(|o| o.role == Role::Frame)
            .filter_map(|o| {
                let spec = o.frame.as_ref()?;
                Some((o.id, spec.photo?, spec.hole_offset()))
            })
            .collect();

        for (frame, photo, offset) in claims {
            let mutual = scene
                .get(photo)
                .is_some_and(|p| p.in_frame == Some(frame) && p.role == Role::Image);
            let taken = self.links.iter().any(|l| l.photo == photo);
            if mutual && !taken {
                self.links.push(FrameLink {
                    frame,
                    photo,
                    offset,
                });
            } else {
                log::debug!("dropping dangling frame link {frame} -> {photo}");
                if let Some(spec) = scene.get_mut(frame).and_then(|f| f.frame.as_mut()) {
                    spec.photo = None;
                }
            }
        }

        for obj in scene.objects.iter_mut() {
            if let Some(frame) = obj.in_frame {
                if !self.links.iter().any(|l| l.photo == obj.id && l.frame == frame) {
                    obj.in_frame = None;
                }
            }
        }
        self.remember(scene);
        self.links.len()
    }

    /// Link `photo` into `frame`, replacing any previous link of either.
    pub fn link(&mut self, scene: &mut Scene, frame: ObjectId, photo: ObjectId) -> EditorResult<()> {
        if !scene.get(frame).is_some_and(|f| f.role == Role::Frame) {
            return Err(EditorError::NotFound(frame));
        }
        match scene.get(photo) {
            Some(p) if p.role == Role::Image => {}
            Some(_) => return Err(EditorError::NotAnImage(photo)),
            None => return Err(EditorError::NotFound(photo)),
        }
        self.unlink(scene, frame);
        self.unlink(scene, photo);

        let offset = {
            let Some(f) = scene.get_mut(frame) else {
                return Err(EditorError::NotFound(frame));
            };
            let spec = f.frame.get_or_insert_with(FrameSpec::default);
            spec.photo = Some(photo);
            spec.hole_offset()
        };
        let clip = match scene.get(frame) {
            Some(f) => frame_clip(f, offset),
            None => return Err(EditorError::NotFound(frame)),
        };
        if let Some(p) = scene.get_mut(photo) {
            p.in_frame = Some(frame);
            p.crop = None;
            p.set_shape_clip(Some(clip));
        }
        self.links.push(FrameLink {
            frame,
            photo,
            offset,
        });
        self.remember(scene);
        log::debug!("linked {photo} into frame {frame}");
        Ok(())
    }

    /// Remove the link `id` takes part in and strip the photo's frame clip.
    pub fn unlink(&mut self, scene: &mut Scene, id: ObjectId) -> Option<FrameLink> {
        let idx = self.links.iter().position(|l| l.frame == id || l.photo == id)?;
        let link = self.links.remove(idx);
        if let Some(p) = scene.get_mut(link.photo) {
            p.in_frame = None;
            p.set_shape_clip(None);
        }
        if let Some(spec) = scene.get_mut(link.frame).and_then(|f| f.frame.as_mut()) {
            spec.photo = None;
        }
        self.placements.remove(&link.frame);
        self.placements.remove(&link.photo);
        Some(link)
    }

    /// Snapshot the current placement of every linked object.
    pub fn remember(&mut self, scene: &Scene) {
        self.placements.clear();
        for link in &self.links {
            for id in [link.frame, link.photo] {
                if let Some(obj) = scene.get(id) {
                    self.placements.insert(id, obj.placement());
                }
            }
        }
    }

    /// Re-derive every linked photo's clip from its frame.
    pub fn resync_clips(&self, scene: &mut Scene) {
        for link in &self.links {
            let Some(clip) = scene.get(link.frame).map(|f| frame_clip(f, link.offset)) else {
                continue;
            };
            if let Some(p) = scene.get_mut(link.photo) {
                p.set_shape_clip(Some(clip));
            }
        }
    }

    /// Propagate a transform change of `moved` across its link.
    ///
    /// Frame moved: the photo is carried by the same delta. Locked photo
    /// moved: the frame follows. Unlocked photo moved: the clip stays pinned
    /// so the photo pans inside the hole. Returns true if a partner moved.
    pub fn sync(&mut self, scene: &mut Scene, moved: ObjectId) -> bool {
        let Some(link) = self.find(moved).copied() else {
            return false;
        };
        let (Some(prev), Some(cur)) = (
            self.placements.get(&moved).copied(),
            scene.get(moved).map(SceneObject::placement),
        ) else {
            self.remember(scene);
            return false;
        };
        if prev == cur || degenerate(&prev) {
            self.remember(scene);
            return false;
        }

        let partner = if moved == link.frame {
            Some(link.photo)
        } else if scene.get(link.photo).is_some_and(|p| p.crop_locked) {
            Some(link.frame)
        } else {
            None
        };

        if let Some(partner) = partner {
            if let Some(obj) = scene.get_mut(partner) {
                carry(obj, &prev, &cur);
            }
            if let Some(clip) = scene.get(link.frame).map(|f| frame_clip(f, link.offset)) {
                if let Some(p) = scene.get_mut(link.photo) {
                    p.set_shape_clip(Some(clip));
                }
            }
        }
        self.remember(scene);
        partner.is_some()
    }
}
