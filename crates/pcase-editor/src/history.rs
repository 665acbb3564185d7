//! Snapshot undo/redo history.
//!
//! Every state is the serialized user portion of the scene (template layers
//! excluded), kept in a bounded array with a cursor. Mutations inside a
//! transaction are applied live but recorded as one snapshot when the
//! outermost transaction commits.
//!
//! Restoring a snapshot re-inserts the current template layers, re-applies
//! the layering rules, rebuilds frame links and re-derives every clip that
//! depends on another object.

use crate::frame::FrameLinks;
use pcase_core::layers::{refresh_boundaries, reorder};
use pcase_core::record::{RecordFilter, SceneRecord, objects_from_records};
use pcase_core::{Scene, SceneObject, SceneResult};

pub const DEFAULT_CAP: usize = 50;

pub struct History {
    snapshots: Vec<String>,
    cursor: usize,
    cap: usize,
    /// Transaction nesting depth (0 = not batching).
    tx_depth: usize,
    /// External suppression depth (template application).
    suppressed: usize,
    restoring: bool,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAP)
    }
}

impl History {
    pub fn new(cap: usize) -> Self {
        Self {
            snapshots: Vec::with_capacity(cap),
            cursor: 0,
            cap: cap.max(1),
            tx_depth: 0,
            suppressed: 0,
            restoring: false,
        }
    }

    /// Reset the timeline to a single snapshot of `scene`.
    pub fn init(&mut self, scene: &Scene) {
        self.snapshots.clear();
        self.cursor = 0;
        match snapshot(scene) {
            Ok(snap) => self.snapshots.push(snap),
            Err(e) => log::warn!("history init failed: {e}"),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&str> {
        self.snapshots.get(self.cursor).map(String::as_str)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0 && !self.restoring
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len() && !self.restoring
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    pub fn in_transaction(&self) -> bool {
        self.tx_depth > 0
    }

    /// True while `record` would be ignored.
    pub fn is_suppressed(&self) -> bool {
        self.restoring || self.tx_depth > 0 || self.suppressed > 0
    }

    /// Stop recording until the matching [`History::resume`].
    pub fn suppress(&mut self) {
        self.suppressed += 1;
    }

    pub fn resume(&mut self) {
        self.suppressed = self.suppressed.saturating_sub(1);
    }

    /// Snapshot the scene. Returns true if a new state was pushed.
    ///
    /// Skipped while suppressed and when the scene serializes identically to
    /// the state under the cursor. Truncates the redo tail and evicts the
    /// oldest state past the cap.
    pub fn record(&mut self, scene: &Scene) -> bool {
        if self.is_suppressed() {
            return false;
        }
        let snap = match snapshot(scene) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("history snapshot failed: {e}");
                return false;
            }
        };
        if self.current() == Some(snap.as_str()) {
            return false;
        }
        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.cursor + 1);
        }
        self.snapshots.push(snap);
        if self.snapshots.len() > self.cap {
            self.snapshots.remove(0);
        }
        self.cursor = self.snapshots.len() - 1;
        true
    }

    pub fn begin_transaction(&mut self) {
        self.tx_depth += 1;
    }

    /// Close a transaction. The outermost commit records exactly once.
    pub fn commit_transaction(&mut self, scene: &Scene) -> bool {
        if self.tx_depth == 0 {
            return false;
        }
        self.tx_depth -= 1;
        if self.tx_depth == 0 {
            self.record(scene)
        } else {
            false
        }
    }

    /// Run `f` on the scene as one undo step.
    pub fn with_transaction<R>(&mut self, scene: &mut Scene, f: impl FnOnce(&mut Scene) -> R) -> R {
        self.begin_transaction();
        let out = f(scene);
        self.commit_transaction(scene);
        out
    }

    pub fn undo(&mut self, scene: &mut Scene, links: &mut FrameLinks, corner_radius: f64) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.step_to(self.cursor - 1, scene, links, corner_radius)
    }

    pub fn redo(&mut self, scene: &mut Scene, links: &mut FrameLinks, corner_radius: f64) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.step_to(self.cursor + 1, scene, links, corner_radius)
    }

    fn step_to(
        &mut self,
        target: usize,
        scene: &mut Scene,
        links: &mut FrameLinks,
        corner_radius: f64,
    ) -> bool {
        let Some(snap) = self.snapshots.get(target) else {
            return false;
        };
        let record = match SceneRecord::from_json(snap) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("ignoring unusable history state {target}: {e}");
                return false;
            }
        };
        self.restoring = true;
        restore_user_content(scene, &record, links, corner_radius);
        self.restoring = false;
        self.cursor = target;
        log::debug!("history moved to {target}/{}", self.snapshots.len());
        true
    }
}

/// Replace the scene's user content with `record`, keeping the live
/// template layers, then re-establish every derived invariant.
///
/// Template records inside `record` are ignored; the canvas viewport is
/// left as-is.
pub fn restore_user_content(
    scene: &mut Scene,
    record: &SceneRecord,
    links: &mut FrameLinks,
    corner_radius: f64,
) {
    let system: Vec<SceneObject> = scene.remove_where(SceneObject::is_system);
    scene.objects = objects_from_records(&record.objects);
    scene.objects.retain(|o| !o.is_system());
    scene.objects.extend(system);
    scene.background = record.background.clone();

    reorder(scene);
    links.rebuild(scene);
    refresh_boundaries(scene, corner_radius);
    links.resync_clips(scene);
}

/// Serialize the undoable part of the scene: user objects and canvas
/// background. Pan and zoom are not undoable.
pub fn snapshot(scene: &Scene) -> SceneResult<String> {
    let mut record = scene.to_record(RecordFilter::UserOnly);
    record.viewport = None;
    record.to_json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcase_core::{Content, ObjectId, Role, SystemLayer};
    use pretty_assertions::assert_eq;

    fn sticker(id: &str) -> SceneObject {
        SceneObject::new(
            ObjectId::intern(id),
            Role::Sticker,
            Content::Image {
                src: format!("{id}.png"),
            },
            10.0,
            10.0,
        )
    }

    fn ids(scene: &Scene) -> Vec<&str> {
        scene.objects.iter().map(|o| o.id.as_str()).collect()
    }

    fn with_template() -> Scene {
        let mut scene = Scene::new(400.0, 800.0);
        scene.push(sticker("h_base_src"));
        scene.objects[0].role = Role::System(SystemLayer::Base);
        scene.push(sticker("h_mask_src"));
        scene.objects[1].role = Role::System(SystemLayer::Mask);
        scene
    }

    #[test]
    fn record_skips_identical_state() {
        let mut scene = with_template();
        let mut h = History::new(50);
        h.init(&scene);
        assert!(!h.record(&scene));
        scene.insert(1, sticker("h_a"));
        assert!(h.record(&scene));
        assert_eq!((h.len(), h.cursor()), (2, 1));
    }

    #[test]
    fn template_layers_stay_out_of_the_timeline() {
        let mut scene = with_template();
        let mut h = History::new(50);
        h.init(&scene);
        scene.insert(1, sticker("h_b"));
        h.record(&scene);

        // Swap template layers; that is not an undoable change.
        scene.objects[0].content = Content::Image { src: "other.png".into() };
        assert!(!h.record(&scene));

        let mut links = FrameLinks::new();
        assert!(h.undo(&mut scene, &mut links, 0.0));
        assert_eq!(ids(&scene), vec!["h_base_src", "h_mask_src"]);
        assert_eq!(scene.objects[0].content.src(), Some("other.png"));

        assert!(h.redo(&mut scene, &mut links, 0.0));
        assert_eq!(ids(&scene), vec!["h_base_src", "h_b", "h_mask_src"]);
        assert!(!h.redo(&mut scene, &mut links, 0.0));
    }

    #[test]
    fn record_truncates_redo_tail() {
        let mut scene = with_template();
        let mut h = History::new(50);
        let mut links = FrameLinks::new();
        h.init(&scene);
        scene.insert(1, sticker("h_c"));
        h.record(&scene);
        scene.insert(1, sticker("h_d"));
        h.record(&scene);
        h.undo(&mut scene, &mut links, 0.0);
        assert!(h.can_redo());

        scene.insert(1, sticker("h_e"));
        h.record(&scene);
        assert!(!h.can_redo());
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn nested_transactions_record_once() {
        let mut scene = with_template();
        let mut h = History::new(50);
        h.init(&scene);
        h.begin_transaction();
        scene.insert(1, sticker("h_t1"));
        assert!(!h.record(&scene));
        h.with_transaction(&mut scene, |s| s.insert(1, sticker("h_t2")));
        assert_eq!(h.len(), 1);
        assert!(h.commit_transaction(&scene));
        assert_eq!(h.len(), 2);
        assert!(!h.commit_transaction(&scene));
    }

    #[test]
    fn malformed_state_leaves_cursor() {
        let mut scene = with_template();
        let mut h = History::new(50);
        let mut links = FrameLinks::new();
        h.init(&scene);
        scene.insert(1, sticker("h_m"));
        h.record(&scene);

        h.snapshots[0] = "{ broken".into();
        assert!(!h.undo(&mut scene, &mut links, 0.0));
        assert_eq!(h.cursor(), 1);

        h.snapshots[0] = String::new();
        assert!(!h.undo(&mut scene, &mut links, 0.0));
        assert_eq!(h.cursor(), 1);
        assert_eq!(scene.len(), 3);
    }

    #[test]
    fn suppression_blocks_recording() {
        let mut scene = with_template();
        let mut h = History::new(50);
        h.init(&scene);
        h.suppress();
        scene.insert(1, sticker("h_s"));
        assert!(!h.record(&scene));
        h.resume();
        assert!(h.record(&scene));
    }
}
