//! Draft autosave.
//!
//! Saves are deadline-based: every mutation pushes the deadline out by the
//! debounce interval, and the host's periodic [`DraftBridge::tick`] writes
//! the draft once the deadline passes. Only user content is stored.

use crate::template::TemplateContext;
use pcase_core::layers::has_single_pair;
use pcase_core::record::{RecordFilter, SceneRecord};
use pcase_core::{Scene, ViewportState};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

pub const KEY_PREFIX: &str = "pcase:draft";

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("draft store rejected the write: {0}")]
    Store(String),

    #[error("draft JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key-value storage for drafts (browser local storage, a file, memory).
pub trait DraftStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), DraftError>;
    fn remove(&mut self, key: &str);
}

#[derive(Debug, Default, Clone)]
pub struct MemoryDraftStore {
    entries: HashMap<String, String>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl DraftStore for MemoryDraftStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), DraftError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// A persisted draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub scene: SceneRecord,
    pub viewport: ViewportState,
    /// Milliseconds since the epoch, as supplied by the host clock.
    pub saved_at: u64,
}

impl Draft {
    pub fn from_json(json: &str) -> Result<Self, DraftError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// First 12 hex digits of SHA-256(`base|mask`).
pub fn template_revision(base_url: &str, mask_url: &str) -> String {
    let digest = Sha256::digest(format!("{base_url}|{mask_url}").as_bytes());
    digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
}

/// Storage key for a product/variant context.
pub fn draft_key(ctx: &TemplateContext) -> String {
    let part = |v: Option<&str>| match v {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => "n/a".to_string(),
    };
    let revision = match ctx.revision.as_deref() {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => template_revision(&ctx.base_url, &ctx.mask_url),
    };
    format!(
        "{KEY_PREFIX}:{}:{}:{}:{}:{revision}",
        part(Some(&ctx.product_id)),
        part(ctx.variant_id.as_deref()),
        part(ctx.color.as_deref()),
        part(ctx.size.as_deref()),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoContext,
    Restoring,
    TemplateLoading,
    LayeringInvalid,
    TooLarge,
    StoreFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { bytes: usize },
    Skipped(SkipReason),
    /// Only reported for forced saves so the user can be warned.
    TooLarge { bytes: usize, limit: usize },
}

/// Ticket for one draft restore; stale once a newer restore begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftTicket(u64);

pub struct DraftBridge {
    key: Option<String>,
    deadline: Option<u64>,
    debounce_ms: u64,
    max_bytes: usize,
    restore_seq: Rc<Cell<u64>>,
    restoring: bool,
}

impl DraftBridge {
    pub fn new(debounce_ms: u64, max_bytes: usize) -> Self {
        Self {
            key: None,
            deadline: None,
            debounce_ms,
            max_bytes,
            restore_seq: Rc::new(Cell::new(0)),
            restoring: false,
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Switch to another draft context. A pending save for the old one is dropped.
    pub fn set_key(&mut self, key: Option<String>) {
        self.deadline = None;
        self.key = key;
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    /// Push the save deadline to `now_ms` + debounce.
    pub fn schedule_save(&mut self, now_ms: u64) {
        self.deadline = Some(now_ms.saturating_add(self.debounce_ms));
    }

    pub fn cancel_pending(&mut self) {
        self.deadline = None;
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.deadline.is_some_and(|d| now_ms >= d)
    }

    pub fn begin_restore(&mut self) -> DraftTicket {
        self.restore_seq.set(self.restore_seq.get() + 1);
        self.restoring = true;
        self.deadline = None;
        DraftTicket(self.restore_seq.get())
    }

    pub fn is_current(&self, ticket: DraftTicket) -> bool {
        self.restore_seq.get() == ticket.0
    }

    /// End a restore. A superseded ticket leaves the newer restore running.
    pub fn finish_restore(&mut self, ticket: DraftTicket) {
        if self.is_current(ticket) {
            self.restoring = false;
        }
    }

    /// Read the draft for the current key. Unreadable drafts are logged and ignored.
    pub fn load(&self, store: &dyn DraftStore) -> Option<Draft> {
        let key = self.key.as_deref()?;
        let json = store.get(key)?;
        match Draft::from_json(&json) {
            Ok(draft) => Some(draft),
            Err(e) => {
                log::warn!("ignoring unreadable draft `{key}`: {e}");
                None
            }
        }
    }

    pub fn discard(&mut self, store: &mut dyn DraftStore) {
        self.deadline = None;
        if let Some(key) = self.key.as_deref() {
            store.remove(key);
        }
    }

    /// Write the draft now, subject to the gates.
    ///
    /// A blocked save is dropped, never queued.
    pub fn save_now(
        &mut self,
        store: &mut dyn DraftStore,
        scene: &Scene,
        template_loading: bool,
        forced: bool,
        now_ms: u64,
    ) -> SaveOutcome {
        self.deadline = None;
        let Some(key) = self.key.as_deref() else {
            return SaveOutcome::Skipped(SkipReason::NoContext);
        };
        if self.restoring {
            return SaveOutcome::Skipped(SkipReason::Restoring);
        }
        if template_loading {
            return SaveOutcome::Skipped(SkipReason::TemplateLoading);
        }
        if !has_single_pair(scene) {
            log::warn!("draft save skipped: template layers are not in a stable state");
            return SaveOutcome::Skipped(SkipReason::LayeringInvalid);
        }

        let mut record = scene.to_record(RecordFilter::UserOnly);
        record.viewport = None;
        let draft = Draft {
            scene: record,
            viewport: scene.viewport,
            saved_at: now_ms,
        };
        let json = match serde_json::to_string(&draft) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("draft serialization failed: {e}");
                return SaveOutcome::Skipped(SkipReason::StoreFailed);
            }
        };
        let bytes = json.len();
        if bytes > self.max_bytes {
            log::warn!("draft of {bytes} bytes exceeds {} byte limit", self.max_bytes);
            return if forced {
                SaveOutcome::TooLarge {
                    bytes,
                    limit: self.max_bytes,
                }
            } else {
                SaveOutcome::Skipped(SkipReason::TooLarge)
            };
        }
        match store.set(key, &json) {
            Ok(()) => {
                log::debug!("draft saved to `{key}` ({bytes} bytes)");
                SaveOutcome::Saved { bytes }
            }
            Err(e) => {
                log::warn!("draft save failed: {e}");
                SaveOutcome::Skipped(SkipReason::StoreFailed)
            }
        }
    }

    /// Fire the debounced save if its deadline has passed.
    pub fn tick(
        &mut self,
        store: &mut dyn DraftStore,
        scene: &Scene,
        template_loading: bool,
        now_ms: u64,
    ) -> Option<SaveOutcome> {
        if !self.is_due(now_ms) {
            return None;
        }
        Some(self.save_now(store, scene, template_loading, false, now_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcase_core::{Content, ObjectId, Role, SceneObject, SystemLayer};
    use pretty_assertions::assert_eq;

    fn ctx() -> TemplateContext {
        TemplateContext {
            product_id: "case-x".into(),
            variant_id: Some("v2".into()),
            base_url: "https://cdn/base.png".into(),
            mask_url: "https://cdn/mask.png".into(),
            ..Default::default()
        }
    }

    fn layered_scene() -> Scene {
        let mut scene = Scene::new(400.0, 800.0);
        for (id, role) in [
            ("d_base", Role::System(SystemLayer::Base)),
            ("d_photo", Role::Image),
            ("d_mask", Role::System(SystemLayer::Mask)),
        ] {
            scene.push(SceneObject::new(
                ObjectId::intern(id),
                role,
                Content::Image {
                    src: format!("{id}.png"),
                },
                10.0,
                10.0,
            ));
        }
        scene
    }

    #[test]
    fn key_defaults_and_revision() {
        let key = draft_key(&ctx());
        let rev = template_revision("https://cdn/base.png", "https://cdn/mask.png");
        assert_eq!(rev.len(), 12);
        assert!(rev.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, format!("pcase:draft:case-x:v2:n/a:n/a:{rev}"));

        let explicit = TemplateContext {
            revision: Some("r9".into()),
            ..ctx()
        };
        assert!(draft_key(&explicit).ends_with(":r9"));
    }

    #[test]
    fn debounce_fires_once_after_last_mutation() {
        let mut store = MemoryDraftStore::new();
        let scene = layered_scene();
        let mut bridge = DraftBridge::new(800, 1024 * 1024);
        bridge.set_key(Some(draft_key(&ctx())));

        bridge.schedule_save(1_000);
        bridge.schedule_save(1_500);
        assert_eq!(bridge.tick(&mut store, &scene, false, 2_000), None);
        let out = bridge.tick(&mut store, &scene, false, 2_300);
        assert!(matches!(out, Some(SaveOutcome::Saved { .. })));
        assert_eq!(bridge.tick(&mut store, &scene, false, 5_000), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn gates_drop_the_save() {
        let mut store = MemoryDraftStore::new();
        let scene = layered_scene();
        let mut bridge = DraftBridge::new(800, 1024 * 1024);
        assert_eq!(
            bridge.save_now(&mut store, &scene, false, true, 0),
            SaveOutcome::Skipped(SkipReason::NoContext)
        );
        bridge.set_key(Some("k".into()));
        assert_eq!(
            bridge.save_now(&mut store, &scene, true, true, 0),
            SaveOutcome::Skipped(SkipReason::TemplateLoading)
        );
        let ticket = bridge.begin_restore();
        assert_eq!(
            bridge.save_now(&mut store, &scene, false, true, 0),
            SaveOutcome::Skipped(SkipReason::Restoring)
        );
        bridge.finish_restore(ticket);

        let mut broken = scene.clone();
        broken.objects.remove(0);
        assert_eq!(
            bridge.save_now(&mut store, &broken, false, true, 0),
            SaveOutcome::Skipped(SkipReason::LayeringInvalid)
        );
        assert!(store.is_empty());
    }

    #[test]
    fn oversized_draft() {
        let mut store = MemoryDraftStore::new();
        let scene = layered_scene();
        let mut bridge = DraftBridge::new(800, 64);
        bridge.set_key(Some("k".into()));
        assert!(matches!(
            bridge.save_now(&mut store, &scene, false, true, 0),
            SaveOutcome::TooLarge { limit: 64, .. }
        ));
        assert_eq!(
            bridge.save_now(&mut store, &scene, false, false, 0),
            SaveOutcome::Skipped(SkipReason::TooLarge)
        );
        assert!(store.is_empty());
    }

    #[test]
    fn saved_draft_has_no_template_layers() {
        let mut store = MemoryDraftStore::new();
        let scene = layered_scene();
        let mut bridge = DraftBridge::new(800, 1024 * 1024);
        bridge.set_key(Some("k".into()));
        bridge.save_now(&mut store, &scene, false, true, 42);

        let draft = bridge.load(&store).unwrap();
        assert_eq!(draft.saved_at, 42);
        assert_eq!(draft.scene.objects.len(), 1);
        assert_eq!(draft.scene.objects[0].id.as_deref(), Some("d_photo"));
    }

    #[test]
    fn unreadable_draft_is_a_json_error() {
        assert!(matches!(Draft::from_json("{\"scene\": 3}"), Err(DraftError::Json(_))));
        let mut store = MemoryDraftStore::new();
        store.set("k", "not a draft").unwrap();
        let mut bridge = DraftBridge::new(800, 1024);
        bridge.set_key(Some("k".into()));
        assert!(bridge.load(&store).is_none());
    }

    #[test]
    fn superseded_restore_ticket() {
        let mut bridge = DraftBridge::new(800, 1024);
        let first = bridge.begin_restore();
        let second = bridge.begin_restore();
        assert!(!bridge.is_current(first));
        bridge.finish_restore(first);
        assert!(bridge.is_restoring());
        bridge.finish_restore(second);
        assert!(!bridge.is_restoring());
    }
}
