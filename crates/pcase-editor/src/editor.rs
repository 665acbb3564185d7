//! The editor façade: owns the scene and every engine that keeps it
//! consistent, and exposes the operations the UI calls.
//!
//! Each user-visible mutation ends in [`Editor::changed`], which snapshots
//! history and pushes the draft deadline out. Multi-step operations run in
//! a transaction so they undo as one step.

use crate::ai::{AiError, AiJob, AiService, AiStyle};
use crate::config::EditorConfig;
use crate::crop;
use crate::draft::{DraftBridge, DraftStore, DraftTicket, MemoryDraftStore, SaveOutcome, draft_key};
use crate::error::{EditorError, EditorResult};
use crate::frame::{FrameLinks, cover_photo, fit_frame};
use crate::history::{History, restore_user_content};
use crate::host::{EditorHost, LoadedImage};
use crate::template::{
    FetchedTemplate, InstallOutcome, TemplateContext, TemplateLoader, TemplateSkip, TemplateTicket, fetch,
};
use kurbo::Point;
use pcase_core::layers::{move_user_layer, refresh_boundaries, reorder};
use pcase_core::record::{ObjectRecord, RecordFilter, SceneRecord, objects_from_records};
use pcase_core::{
    BarcodeSpec, CanvasBackground, Content, CropShape, FrameSpec, ObjectId, Placement, Role, Scene,
    SceneObject, TextContent,
};
use pcase_render::{ExportKind, ExportOptions, Rasterizer, SvgRasterizer};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Longest barcode value accepted (CODE128 practical limit).
pub const MAX_BARCODE_LEN: usize = 80;

/// Opacity of a photo while its AI replacement is running.
const AI_PENDING_OPACITY: f64 = 0.5;

/// One row of the layer list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerInfo {
    pub id: String,
    pub kind: &'static str,
    pub label: &'static str,
    pub visible: bool,
    pub crop_locked: bool,
    pub in_frame: bool,
}

/// A frame decoration as offered by the asset picker.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameAsset {
    pub src: String,
    /// Content hole outline, relative to the frame image center.
    pub hole: Option<Vec<Point>>,
}

#[derive(Deserialize)]
struct DesignObjects {
    #[serde(default)]
    objects: Vec<ObjectRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CanvasData {
    Inline(DesignObjects),
    Encoded(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DesignPayload {
    #[serde(default)]
    canvas_data: Option<CanvasData>,
    #[serde(default)]
    objects: Vec<ObjectRecord>,
}

/// Barcode values must be printable ASCII, 1 to [`MAX_BARCODE_LEN`] chars.
pub fn validate_barcode(value: &str) -> EditorResult<()> {
    if value.is_empty() {
        return Err(EditorError::InvalidBarcode("value is empty".into()));
    }
    if value.len() > MAX_BARCODE_LEN {
        return Err(EditorError::InvalidBarcode(format!(
            "{} characters, at most {MAX_BARCODE_LEN} allowed",
            value.len()
        )));
    }
    if let Some(c) = value.chars().find(|c| !(' '..='~').contains(c)) {
        return Err(EditorError::InvalidBarcode(format!("unsupported character {c:?}")));
    }
    Ok(())
}

pub struct Editor {
    scene: Scene,
    config: EditorConfig,
    history: History,
    links: FrameLinks,
    loader: TemplateLoader,
    drafts: DraftBridge,
    store: Box<dyn DraftStore>,
    rasterizer: Box<dyn Rasterizer>,
    context: Option<TemplateContext>,
    /// Photos dimmed by a running AI replacement, with their real opacity.
    ai_pending: HashMap<ObjectId, f64>,
    now_ms: u64,
}

impl Editor {
    pub fn new(config: EditorConfig, store: Box<dyn DraftStore>) -> Self {
        let scene = Scene::new(config.canvas_width, config.canvas_height);
        let mut history = History::new(config.history_cap);
        history.init(&scene);
        Self {
            scene,
            history,
            links: FrameLinks::new(),
            loader: TemplateLoader::new(),
            drafts: DraftBridge::new(config.autosave_debounce_ms, config.draft_max_bytes),
            store,
            rasterizer: Box::new(SvgRasterizer),
            context: None,
            ai_pending: HashMap::new(),
            now_ms: 0,
            config,
        }
    }

    /// An editor with an in-memory draft store.
    pub fn in_memory(config: EditorConfig) -> Self {
        Self::new(config, Box::new(MemoryDraftStore::new()))
    }

    pub fn with_rasterizer(mut self, rasterizer: Box<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn links(&self) -> &FrameLinks {
        &self.links
    }

    pub fn loader(&self) -> &TemplateLoader {
        &self.loader
    }

    pub fn drafts(&self) -> &DraftBridge {
        &self.drafts
    }

    pub fn store(&self) -> &dyn DraftStore {
        self.store.as_ref()
    }

    pub fn context(&self) -> Option<&TemplateContext> {
        self.context.as_ref()
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.scene.get(id)
    }

    // ─── Change plumbing ─────────────────────────────────────────────────

    /// Re-apply layering, boundaries and frame clips.
    fn settle(&mut self) {
        reorder(&mut self.scene);
        refresh_boundaries(&mut self.scene, self.config.print_area.corner_radius);
        self.links.resync_clips(&mut self.scene);
        self.links.remember(&self.scene);
    }

    /// Change notification: snapshot history and schedule a draft save.
    pub fn changed(&mut self) {
        self.undimmed(|ed| ed.history.record(&ed.scene));
        self.drafts.schedule_save(self.now_ms);
    }

    /// Run `f` as one undo step.
    pub fn with_transaction<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.history.begin_transaction();
        let out = f(self);
        self.undimmed(|ed| ed.history.commit_transaction(&ed.scene));
        self.drafts.schedule_save(self.now_ms);
        out
    }

    /// Run `f` with AI-pending photos at their real opacity, so the dim
    /// never reaches history or drafts.
    fn undimmed<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        if self.ai_pending.is_empty() {
            return f(self);
        }
        for (id, opacity) in &self.ai_pending {
            if let Some(obj) = self.scene.get_mut(*id) {
                obj.opacity = *opacity;
            }
        }
        let out = f(self);
        self.redim();
        out
    }

    fn redim(&mut self) {
        for id in self.ai_pending.keys() {
            if let Some(obj) = self.scene.get_mut(*id) {
                obj.opacity = AI_PENDING_OPACITY;
            }
        }
    }

    fn user_object_mut(&mut self, id: ObjectId) -> EditorResult<&mut SceneObject> {
        match self.scene.get_mut(id) {
            Some(obj) if obj.is_system() => Err(EditorError::SystemObject(id)),
            Some(obj) => Ok(obj),
            None => Err(EditorError::NotFound(id)),
        }
    }

    // ─── Insertion ───────────────────────────────────────────────────────

    fn place_fitted(&self, obj: &mut SceneObject, fit: f64, cover: bool) {
        let area = &self.config.print_area;
        if obj.width > 0.0 && obj.height > 0.0 {
            let sx = area.width * fit / obj.width;
            let sy = area.height * fit / obj.height;
            let s = if cover { sx.max(sy) } else { sx.min(sy) };
            obj.scale_x = s;
            obj.scale_y = s;
        }
        obj.set_center(area.center());
    }

    fn insert(&mut self, obj: SceneObject) -> ObjectId {
        let id = obj.id;
        self.scene.push(obj);
        self.settle();
        self.changed();
        log::debug!("inserted {id}");
        id
    }

    /// Insert an already loaded image as a photo, sticker or background.
    pub fn insert_image(&mut self, role: Role, image: LoadedImage) -> EditorResult<ObjectId> {
        let (prefix, fit, cover) = match role {
            Role::Image => ("img", self.config.image_fit, false),
            Role::Sticker => ("sticker", self.config.sticker_fit, false),
            Role::Background => ("bg", 1.0, true),
            other => return Err(EditorError::NotInsertable(other)),
        };
        let mut obj = SceneObject::new(
            ObjectId::with_prefix(prefix),
            role,
            Content::Image { src: image.src },
            image.width,
            image.height,
        );
        self.place_fitted(&mut obj, fit, cover);
        Ok(self.insert(obj))
    }

    pub async fn add_image<H: EditorHost>(&mut self, host: &H, role: Role, url: &str) -> EditorResult<ObjectId> {
        let image = host.load_image(url).await?;
        self.insert_image(role, image)
    }

    pub fn add_text(&mut self, text: &str) -> ObjectId {
        let content = TextContent {
            text: text.to_string(),
            ..Default::default()
        };
        // Rough box until the renderer measures the glyphs.
        let chars = text.chars().count().max(1) as f64;
        let (w, h) = (chars * content.font_size * 0.6, content.font_size * 1.2);
        let mut obj = SceneObject::new(ObjectId::with_prefix("text"), Role::Text, Content::Text(content), w, h);
        obj.fill = Some("#000000".into());
        obj.set_center(self.config.print_area.center());
        self.insert(obj)
    }

    /// Insert a barcode rendered by the host. The value is validated first.
    pub fn add_barcode(&mut self, value: &str, format: &str, image: LoadedImage) -> EditorResult<ObjectId> {
        validate_barcode(value)?;
        let mut obj = SceneObject::new(
            ObjectId::with_prefix("barcode"),
            Role::Barcode,
            Content::Image { src: image.src },
            image.width,
            image.height,
        );
        obj.barcode = Some(BarcodeSpec {
            value: value.to_string(),
            format: format.to_string(),
        });
        self.place_fitted(&mut obj, self.config.sticker_fit, false);
        Ok(self.insert(obj))
    }

    /// Set the canvas-level background.
    pub fn set_canvas_background(&mut self, background: CanvasBackground) {
        self.scene.background = background;
        self.changed();
    }

    /// Insert a frame, optionally wrapping an existing photo, as one undo step.
    pub fn insert_frame(
        &mut self,
        image: LoadedImage,
        hole: Option<Vec<Point>>,
        photo: Option<ObjectId>,
    ) -> EditorResult<ObjectId> {
        if let Some(p) = photo {
            match self.scene.get(p) {
                Some(obj) if obj.role == Role::Image => {}
                Some(_) => return Err(EditorError::NotAnImage(p)),
                None => return Err(EditorError::NotFound(p)),
            }
        }
        self.with_transaction(|ed| -> EditorResult<ObjectId> {
            let id = ObjectId::with_prefix("frame");
            let mut frame = SceneObject::new(
                id,
                Role::Frame,
                Content::Image { src: image.src },
                image.width,
                image.height,
            );
            frame.frame = Some(FrameSpec { hole, photo: None });
            fit_frame(&mut frame, &ed.config.print_area, ed.config.frame_fit);
            let offset = frame.frame.as_ref().map(FrameSpec::hole_offset).unwrap_or_default();

            if let Some(p) = photo {
                if let Some(obj) = ed.scene.get_mut(p) {
                    cover_photo(obj, &frame, offset);
                }
            }
            ed.scene.push(frame);

            if let Some(p) = photo {
                // Photo directly behind its frame.
                if let Some(obj) = ed.scene.remove(p) {
                    let at = ed.scene.index_of(id).unwrap_or(ed.scene.len());
                    ed.scene.insert(at, obj);
                }
                ed.links.link(&mut ed.scene, id, p)?;
            }
            ed.settle();
            Ok(id)
        })
    }

    pub async fn add_frame<H: EditorHost>(
        &mut self,
        host: &H,
        asset: FrameAsset,
        photo: Option<ObjectId>,
    ) -> EditorResult<ObjectId> {
        let image = host.load_image(&asset.src).await?;
        self.insert_frame(image, asset.hole, photo)
    }

    /// Insert a saved design's objects as user layers, as one undo step.
    ///
    /// Template records are ignored and colliding ids are regenerated.
    pub fn add_design_layers(&mut self, json: &str) -> EditorResult<Vec<ObjectId>> {
        let payload: DesignPayload =
            serde_json::from_str(json).map_err(|e| EditorError::DesignLayers(e.to_string()))?;
        let records = match payload.canvas_data {
            Some(CanvasData::Inline(d)) => d.objects,
            Some(CanvasData::Encoded(s)) => {
                serde_json::from_str::<DesignObjects>(&s)
                    .map_err(|e| EditorError::DesignLayers(e.to_string()))?
                    .objects
            }
            None => payload.objects,
        };

        let mut objects: Vec<SceneObject> = objects_from_records(&records);
        objects.retain(|o| {
            if o.is_system() {
                log::debug!("design set: ignoring template record {}", o.id);
            }
            !o.is_system()
        });

        let mut taken: HashSet<ObjectId> = self.scene.objects.iter().map(|o| o.id).collect();
        let mut renamed: HashMap<ObjectId, ObjectId> = HashMap::new();
        for obj in &mut objects {
            if !taken.insert(obj.id) {
                let fresh = ObjectId::with_prefix(obj.role.kind_tag());
                renamed.insert(obj.id, fresh);
                obj.id = fresh;
                taken.insert(fresh);
            }
        }
        for obj in &mut objects {
            if let Some(f) = obj.in_frame.and_then(|f| renamed.get(&f)) {
                obj.in_frame = Some(*f);
            }
            if let Some(spec) = obj.frame.as_mut() {
                if let Some(p) = spec.photo.and_then(|p| renamed.get(&p)) {
                    spec.photo = Some(*p);
                }
            }
        }

        let ids: Vec<ObjectId> = objects.iter().map(|o| o.id).collect();
        self.with_transaction(|ed| {
            ed.scene.objects.extend(objects);
            ed.links.rebuild(&mut ed.scene);
            ed.settle();
        });
        log::info!("added {} design layers", ids.len());
        Ok(ids)
    }

    // ─── Crop ────────────────────────────────────────────────────────────

    pub fn apply_crop(&mut self, id: ObjectId, shape: CropShape, param: f64) -> EditorResult<()> {
        crop::apply_crop(self.user_object_mut(id)?, shape, param)?;
        self.changed();
        Ok(())
    }

    pub fn update_crop_param(&mut self, id: ObjectId, param: f64) -> EditorResult<()> {
        crop::update_crop_param(self.user_object_mut(id)?, param)?;
        self.changed();
        Ok(())
    }

    pub fn toggle_crop_lock(&mut self, id: ObjectId) -> EditorResult<bool> {
        let locked = crop::toggle_crop_lock(self.user_object_mut(id)?)?;
        self.links.remember(&self.scene);
        self.changed();
        Ok(locked)
    }

    // ─── Removal and ordering ────────────────────────────────────────────

    /// Remove every user object and the canvas background.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.scene.remove_where(|o| !o.is_system());
        self.scene.background = CanvasBackground::None;
        self.links.clear();
        self.settle();
        self.changed();
        removed.len()
    }

    /// Remove one user object; a frame releases its photo and vice versa.
    pub fn remove(&mut self, id: ObjectId) -> EditorResult<()> {
        self.user_object_mut(id)?;
        self.links.unlink(&mut self.scene, id);
        self.scene.remove(id);
        self.settle();
        self.changed();
        Ok(())
    }

    /// Remove every user object matching `pred`, as one undo step.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&SceneObject) -> bool) -> usize {
        let ids: Vec<ObjectId> = self
            .scene
            .user_objects()
            .filter(|o| pred(o))
            .map(|o| o.id)
            .collect();
        if ids.is_empty() {
            return 0;
        }
        self.with_transaction(|ed| {
            for id in &ids {
                ed.links.unlink(&mut ed.scene, *id);
                ed.scene.remove(*id);
            }
            ed.settle();
        });
        ids.len()
    }

    /// User layers, front-most first.
    pub fn user_layers(&self) -> Vec<LayerInfo> {
        self.scene
            .objects
            .iter()
            .rev()
            .filter(|o| !o.is_system())
            .map(|o| LayerInfo {
                id: o.id.to_string(),
                kind: o.role.kind_tag(),
                label: o.role.label(),
                visible: o.visible,
                crop_locked: o.crop_locked,
                in_frame: o.in_frame.is_some(),
            })
            .collect()
    }

    /// Move a layer to `index` in the [`Editor::user_layers`] list (0 = front).
    pub fn move_layer(&mut self, id: ObjectId, index: usize) -> EditorResult<bool> {
        self.user_object_mut(id)?;
        let count = self.scene.user_objects().count();
        let back_index = count.saturating_sub(1).saturating_sub(index.min(count.saturating_sub(1)));
        let moved = move_user_layer(&mut self.scene, id, back_index);
        if moved {
            self.settle();
            self.changed();
        }
        Ok(moved)
    }

    // ─── Transforms ──────────────────────────────────────────────────────

    /// Live transform during a gesture. Linked frames and photos follow;
    /// nothing is recorded until [`Editor::commit_transform`].
    pub fn transform_object(&mut self, id: ObjectId, placement: Placement) -> EditorResult<()> {
        self.user_object_mut(id)?.set_placement(placement);
        self.links.sync(&mut self.scene, id);
        Ok(())
    }

    /// End of a gesture.
    pub fn commit_transform(&mut self) {
        self.changed();
    }

    // ─── History ─────────────────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        if self.loader.is_loading() {
            return false;
        }
        let moved = self
            .history
            .undo(&mut self.scene, &mut self.links, self.config.print_area.corner_radius);
        if moved {
            self.redim();
            self.drafts.schedule_save(self.now_ms);
        }
        moved
    }

    pub fn redo(&mut self) -> bool {
        if self.loader.is_loading() {
            return false;
        }
        let moved = self
            .history
            .redo(&mut self.scene, &mut self.links, self.config.print_area.corner_radius);
        if moved {
            self.redim();
            self.drafts.schedule_save(self.now_ms);
        }
        moved
    }

    // ─── Scene JSON and export ───────────────────────────────────────────

    pub fn to_json(&self, filter: RecordFilter) -> EditorResult<String> {
        Ok(self.scene.to_json(filter)?)
    }

    /// Replace user content from scene JSON. Template records are ignored.
    pub fn load_json(&mut self, json: &str) -> EditorResult<()> {
        let record = SceneRecord::from_json(json)?;
        restore_user_content(
            &mut self.scene,
            &record,
            &mut self.links,
            self.config.print_area.corner_radius,
        );
        if let Some(viewport) = record.viewport {
            self.scene.viewport = viewport;
        }
        self.links.remember(&self.scene);
        self.changed();
        Ok(())
    }

    pub fn export(&self, kind: ExportKind) -> EditorResult<String> {
        let multiplier = match kind {
            ExportKind::Preview => self.config.preview_multiplier,
            ExportKind::Print => self.config.print_multiplier,
        };
        let options = ExportOptions::for_kind(kind, multiplier);
        Ok(self.rasterizer.rasterize(&self.scene, &options)?)
    }

    // ─── AI replacement ──────────────────────────────────────────────────

    /// Dim the photo and capture what is needed to finish or roll back.
    /// One replacement per photo at a time.
    pub fn begin_ai(&mut self, id: ObjectId, style: AiStyle) -> EditorResult<AiJob> {
        if self.ai_pending.contains_key(&id) {
            return Err(EditorError::AiPending(id));
        }
        let obj = self.user_object_mut(id)?;
        let src = match (&obj.role, &obj.content) {
            (Role::Image | Role::Sticker, Content::Image { src }) => src.clone(),
            _ => return Err(EditorError::NotAnImage(id)),
        };
        let job = AiJob {
            id,
            src,
            style,
            opacity: obj.opacity,
        };
        obj.opacity = AI_PENDING_OPACITY;
        self.ai_pending.insert(id, job.opacity);
        Ok(job)
    }

    /// Swap in the replacement image, keeping transform, clip, crop and
    /// links. On failure the photo's opacity is restored.
    pub fn finish_ai(&mut self, job: AiJob, result: Result<String, AiError>) -> EditorResult<()> {
        self.ai_pending.remove(&job.id);
        let url = match result {
            Ok(url) if !url.is_empty() => url,
            Ok(_) => return Err(self.rollback_ai(&job, AiError::EmptyResult)),
            Err(e) => return Err(self.rollback_ai(&job, e)),
        };
        self.with_transaction(|ed| -> EditorResult<()> {
            let obj = ed.scene.get_mut(job.id).ok_or(EditorError::NotFound(job.id))?;
            obj.content = Content::Image { src: url };
            obj.opacity = job.opacity;
            Ok(())
        })
    }

    fn rollback_ai(&mut self, job: &AiJob, err: AiError) -> EditorError {
        log::warn!("AI {} replacement of {} failed: {err}", job.style, job.id);
        if let Some(obj) = self.scene.get_mut(job.id) {
            obj.opacity = job.opacity;
        }
        EditorError::Ai(err)
    }

    pub async fn replace_with_ai<S: AiService>(&mut self, service: &S, id: ObjectId, style: AiStyle) -> EditorResult<()> {
        let job = self.begin_ai(id, style)?;
        let result = service.transform(&job.src, job.style).await;
        self.finish_ai(job, result)
    }

    // ─── Templates ───────────────────────────────────────────────────────

    pub fn begin_template(&mut self, ctx: &TemplateContext) -> Result<TemplateTicket, TemplateSkip> {
        let ticket = self.loader.begin(&self.scene, ctx)?;
        self.context = Some(ctx.clone());
        Ok(ticket)
    }

    /// Template swaps are not undoable.
    pub fn install_template(&mut self, fetched: FetchedTemplate) -> InstallOutcome {
        self.history.suppress();
        let outcome = self.loader.install(&mut self.scene, fetched, &self.config);
        if outcome == InstallOutcome::Installed {
            self.links.resync_clips(&mut self.scene);
            self.links.remember(&self.scene);
        }
        self.history.resume();
        outcome
    }

    pub fn reveal_template(&mut self, seq: u64) -> bool {
        self.loader.reveal(&mut self.scene, seq)
    }

    /// Abandon a running template load.
    pub fn cancel_template(&mut self) {
        self.loader.invalidate();
    }

    /// Load and apply a template. `None` when the request was skipped.
    pub async fn apply_template<H: EditorHost>(&mut self, host: &H, ctx: &TemplateContext) -> Option<InstallOutcome> {
        let ticket = self.begin_template(ctx).ok()?;
        let seq = ticket.seq;
        let fetched = fetch(host, ticket).await;
        if self.install_template(fetched) == InstallOutcome::Stale {
            return Some(InstallOutcome::Stale);
        }
        host.next_frame().await;
        Some(if self.reveal_template(seq) {
            InstallOutcome::Installed
        } else {
            InstallOutcome::Stale
        })
    }

    // ─── Drafts ──────────────────────────────────────────────────────────

    /// Switch the draft context and start a restore.
    pub fn begin_draft_restore(&mut self, ctx: &TemplateContext) -> DraftTicket {
        self.drafts.set_key(Some(draft_key(ctx)));
        self.drafts.begin_restore()
    }

    /// Restore the stored draft for the current context, if the ticket is
    /// still current. The undo timeline restarts at the restored state.
    pub fn restore_draft(&mut self, ticket: DraftTicket) -> bool {
        if !self.drafts.is_current(ticket) {
            log::debug!("draft restore superseded");
            return false;
        }
        let restored = match self.drafts.load(self.store.as_ref()) {
            Some(draft) => {
                restore_user_content(
                    &mut self.scene,
                    &draft.scene,
                    &mut self.links,
                    self.config.print_area.corner_radius,
                );
                self.scene.viewport = draft.viewport;
                self.links.remember(&self.scene);
                self.history.init(&self.scene);
                log::info!("draft restored ({} objects)", self.scene.user_objects().count());
                true
            }
            None => false,
        };
        self.drafts.finish_restore(ticket);
        restored
    }

    /// Start switching to `ctx`. A template load still running for the
    /// previous context is abandoned so the new one can begin.
    pub fn begin_context(&mut self, ctx: &TemplateContext) -> DraftTicket {
        if self.loader.is_loading() {
            log::debug!("switching to `{}`: abandoning running template load", ctx.product_id);
            self.cancel_template();
        }
        self.begin_draft_restore(ctx)
    }

    /// Enter a product context: apply its template, then restore its draft.
    pub async fn enter_context<H: EditorHost>(&mut self, host: &H, ctx: &TemplateContext) -> bool {
        let ticket = self.begin_context(ctx);
        self.apply_template(host, ctx).await;
        self.restore_draft(ticket)
    }

    pub fn save_draft(&mut self, forced: bool) -> SaveOutcome {
        let loading = self.loader.is_loading();
        let now = self.now_ms;
        self.undimmed(|ed| ed.drafts.save_now(ed.store.as_mut(), &ed.scene, loading, forced, now))
    }

    pub fn discard_draft(&mut self) {
        self.drafts.discard(self.store.as_mut());
    }

    /// Advance the host clock; fires a due draft save.
    pub fn tick(&mut self, now_ms: u64) -> Option<SaveOutcome> {
        self.now_ms = now_ms;
        let loading = self.loader.is_loading();
        self.undimmed(|ed| ed.drafts.tick(ed.store.as_mut(), &ed.scene, loading, now_ms))
    }

    /// Flush a pending save before the page goes away. The write is forced,
    /// so an oversized draft is reported rather than skipped.
    pub fn on_page_hide(&mut self) -> Option<SaveOutcome> {
        self.drafts.deadline()?;
        Some(self.save_draft(true))
    }

    /// Stop timers and abandon loads.
    pub fn teardown(&mut self) {
        self.drafts.cancel_pending();
        self.loader.invalidate();
    }
}
