//! WASM bridge for PCase: exposes the editor to the storefront UI.
//!
//! Compiled via `wasm-pack build --target web`. Complex values cross the
//! boundary as JSON strings; async operations return promises.

mod host;

use host::{JsAiService, JsHost, LocalDraftStore};
use pcase_core::{CropShape, ObjectId, Placement, Point, RecordFilter, Role};
use pcase_editor::draft::{DraftStore, SaveOutcome};
use pcase_editor::template::fetch;
use pcase_editor::{
    AiService, AiStyle, Editor, EditorConfig, EditorHost, FrameAsset, InstallOutcome, MemoryDraftStore, TemplateContext,
};
use pcase_render::ExportKind;
use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

fn js_err(e: impl Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn insert_role(kind: &str) -> Result<Role, JsValue> {
    match kind {
        "image" => Ok(Role::Image),
        "sticker" => Ok(Role::Sticker),
        "background" => Ok(Role::Background),
        other => Err(js_err(format!("unknown image role `{other}`"))),
    }
}

fn outcome_name(outcome: Option<InstallOutcome>) -> &'static str {
    match outcome {
        Some(InstallOutcome::Installed) => "installed",
        Some(InstallOutcome::Stale) => "stale",
        None => "skipped",
    }
}

fn save_json(outcome: SaveOutcome) -> String {
    let value = match outcome {
        SaveOutcome::Saved { bytes } => serde_json::json!({ "status": "saved", "bytes": bytes }),
        SaveOutcome::Skipped(reason) => {
            serde_json::json!({ "status": "skipped", "reason": format!("{reason:?}") })
        }
        SaveOutcome::TooLarge { bytes, limit } => {
            serde_json::json!({ "status": "tooLarge", "bytes": bytes, "limit": limit })
        }
    };
    value.to_string()
}

/// Template phases with the editor borrowed only between awaits.
async fn run_template(editor: &Rc<RefCell<Editor>>, host: &JsHost, ctx: &TemplateContext) -> Option<InstallOutcome> {
    let ticket = editor.borrow_mut().begin_template(ctx).ok()?;
    let seq = ticket.seq;
    let fetched = fetch(host, ticket).await;
    if editor.borrow_mut().install_template(fetched) == InstallOutcome::Stale {
        return Some(InstallOutcome::Stale);
    }
    host.next_frame().await;
    Some(if editor.borrow_mut().reveal_template(seq) {
        InstallOutcome::Installed
    } else {
        InstallOutcome::Stale
    })
}

/// The WASM-facing editor controller. All calls from the page go through
/// this struct.
#[wasm_bindgen]
pub struct PrintCanvas {
    editor: Rc<RefCell<Editor>>,
    host: JsHost,
    ai: Option<JsAiService>,
}

#[wasm_bindgen]
impl PrintCanvas {
    /// `config_json` may be empty for defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str, load_image: js_sys::Function, next_frame: js_sys::Function) -> Result<PrintCanvas, JsValue> {
        console_error_panic_hook_setup();

        let config = if config_json.trim().is_empty() {
            EditorConfig::default()
        } else {
            EditorConfig::from_json(config_json).map_err(js_err)?
        };
        let store: Box<dyn DraftStore> = match LocalDraftStore::open() {
            Some(store) => Box::new(store),
            None => {
                log::warn!("localStorage unavailable; drafts are kept in memory");
                Box::new(MemoryDraftStore::new())
            }
        };
        Ok(Self {
            editor: Rc::new(RefCell::new(Editor::new(config, store))),
            host: JsHost::new(load_image, next_frame),
            ai: None,
        })
    }

    /// `transform(url, style)` must resolve to the replacement image URL.
    pub fn set_ai_service(&mut self, transform: js_sys::Function) {
        self.ai = Some(JsAiService::new(transform));
    }

    // ─── Scene ───────────────────────────────────────────────────────────

    /// Scene JSON; `include_template` adds the base and mask layers.
    pub fn scene_json(&self, include_template: bool) -> Result<String, JsValue> {
        let filter = if include_template {
            RecordFilter::All
        } else {
            RecordFilter::UserOnly
        };
        self.editor.borrow().to_json(filter).map_err(js_err)
    }

    pub fn load_json(&self, json: &str) -> Result<(), JsValue> {
        self.editor.borrow_mut().load_json(json).map_err(js_err)
    }

    pub fn layers_json(&self) -> String {
        serde_json::to_string(&self.editor.borrow().user_layers()).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn export_preview(&self) -> Result<String, JsValue> {
        self.editor.borrow().export(ExportKind::Preview).map_err(js_err)
    }

    pub fn export_print(&self) -> Result<String, JsValue> {
        self.editor.borrow().export(ExportKind::Print).map_err(js_err)
    }

    // ─── Insertion ───────────────────────────────────────────────────────

    pub fn add_text(&self, text: &str) -> String {
        self.editor.borrow_mut().add_text(text).to_string()
    }

    /// Resolves to the new object id. `role` is `image`, `sticker` or `background`.
    pub fn add_image(&self, role: &str, url: String) -> Result<js_sys::Promise, JsValue> {
        let role = insert_role(role)?;
        let editor = self.editor.clone();
        let host = self.host.clone();
        Ok(future_to_promise(async move {
            let image = host.load_image(&url).await.map_err(js_err)?;
            let id = editor.borrow_mut().insert_image(role, image).map_err(js_err)?;
            Ok(JsValue::from_str(id.as_str()))
        }))
    }

    /// `image_url` is the barcode rendered by the page.
    pub fn add_barcode(&self, value: String, format: String, image_url: String) -> Result<js_sys::Promise, JsValue> {
        pcase_editor::validate_barcode(&value).map_err(js_err)?;
        let editor = self.editor.clone();
        let host = self.host.clone();
        Ok(future_to_promise(async move {
            let image = host.load_image(&image_url).await.map_err(js_err)?;
            let id = editor
                .borrow_mut()
                .add_barcode(&value, &format, image)
                .map_err(js_err)?;
            Ok(JsValue::from_str(id.as_str()))
        }))
    }

    /// `asset_json` is `{ src, hole? }`. An optional photo is placed inside.
    pub fn add_frame(&self, asset_json: &str, photo_id: Option<String>) -> Result<js_sys::Promise, JsValue> {
        let asset: FrameAsset = serde_json::from_str(asset_json).map_err(js_err)?;
        let photo = photo_id.as_deref().map(ObjectId::intern);
        let editor = self.editor.clone();
        let host = self.host.clone();
        Ok(future_to_promise(async move {
            let image = host.load_image(&asset.src).await.map_err(js_err)?;
            let id = editor
                .borrow_mut()
                .insert_frame(image, asset.hole, photo)
                .map_err(js_err)?;
            Ok(JsValue::from_str(id.as_str()))
        }))
    }

    /// Returns the inserted ids as a JSON array.
    pub fn add_design_layers(&self, json: &str) -> Result<String, JsValue> {
        let ids = self.editor.borrow_mut().add_design_layers(json).map_err(js_err)?;
        let ids: Vec<&str> = ids.iter().map(ObjectId::as_str).collect();
        serde_json::to_string(&ids).map_err(js_err)
    }

    // ─── Editing ─────────────────────────────────────────────────────────

    pub fn apply_crop(&self, id: &str, shape: &str, param: f64) -> Result<(), JsValue> {
        let shape = CropShape::parse(shape).ok_or_else(|| js_err(format!("unknown crop shape `{shape}`")))?;
        self.editor
            .borrow_mut()
            .apply_crop(ObjectId::intern(id), shape, param)
            .map_err(js_err)
    }

    pub fn update_crop_param(&self, id: &str, param: f64) -> Result<(), JsValue> {
        self.editor
            .borrow_mut()
            .update_crop_param(ObjectId::intern(id), param)
            .map_err(js_err)
    }

    pub fn toggle_crop_lock(&self, id: &str) -> Result<bool, JsValue> {
        self.editor
            .borrow_mut()
            .toggle_crop_lock(ObjectId::intern(id))
            .map_err(js_err)
    }

    pub fn remove(&self, id: &str) -> Result<(), JsValue> {
        self.editor.borrow_mut().remove(ObjectId::intern(id)).map_err(js_err)
    }

    pub fn clear_all(&self) -> u32 {
        self.editor.borrow_mut().clear_all() as u32
    }

    /// `index` counts from the front of the layer list.
    pub fn move_layer(&self, id: &str, index: u32) -> Result<bool, JsValue> {
        self.editor
            .borrow_mut()
            .move_layer(ObjectId::intern(id), index as usize)
            .map_err(js_err)
    }

    /// Live transform during a drag; linked frames and photos follow.
    pub fn transform_object(
        &self,
        id: &str,
        center_x: f64,
        center_y: f64,
        angle: f64,
        scale_x: f64,
        scale_y: f64,
    ) -> Result<(), JsValue> {
        let placement = Placement {
            center: Point::new(center_x, center_y),
            angle,
            scale_x,
            scale_y,
        };
        self.editor
            .borrow_mut()
            .transform_object(ObjectId::intern(id), placement)
            .map_err(js_err)
    }

    pub fn commit_transform(&self) {
        self.editor.borrow_mut().commit_transform();
    }

    pub fn undo(&self) -> bool {
        self.editor.borrow_mut().undo()
    }

    pub fn redo(&self) -> bool {
        self.editor.borrow_mut().redo()
    }

    pub fn can_undo(&self) -> bool {
        let editor = self.editor.borrow();
        editor.history().can_undo() && !editor.loader().is_loading()
    }

    pub fn can_redo(&self) -> bool {
        let editor = self.editor.borrow();
        editor.history().can_redo() && !editor.loader().is_loading()
    }

    /// Resolves once the replacement is in place; rejects on failure with
    /// the photo restored.
    pub fn replace_with_ai(&self, id: &str, style: &str) -> Result<js_sys::Promise, JsValue> {
        let service = self
            .ai
            .clone()
            .ok_or_else(|| js_err("no AI service configured"))?;
        let style = AiStyle::parse(style).map_err(js_err)?;
        let job = self
            .editor
            .borrow_mut()
            .begin_ai(ObjectId::intern(id), style)
            .map_err(js_err)?;
        let editor = self.editor.clone();
        Ok(future_to_promise(async move {
            let result = service.transform(&job.src, job.style).await;
            editor.borrow_mut().finish_ai(job, result).map_err(js_err)?;
            Ok(JsValue::TRUE)
        }))
    }

    // ─── Templates and drafts ────────────────────────────────────────────

    /// Resolves to `installed`, `stale` or `skipped`.
    pub fn apply_template(&self, ctx_json: &str) -> Result<js_sys::Promise, JsValue> {
        let ctx: TemplateContext = serde_json::from_str(ctx_json).map_err(js_err)?;
        let editor = self.editor.clone();
        let host = self.host.clone();
        Ok(future_to_promise(async move {
            let outcome = run_template(&editor, &host, &ctx).await;
            Ok(JsValue::from_str(outcome_name(outcome)))
        }))
    }

    /// Switch product context: apply its template, then restore its draft.
    /// Resolves to whether a draft was restored.
    pub fn enter_context(&self, ctx_json: &str) -> Result<js_sys::Promise, JsValue> {
        let ctx: TemplateContext = serde_json::from_str(ctx_json).map_err(js_err)?;
        let editor = self.editor.clone();
        let host = self.host.clone();
        Ok(future_to_promise(async move {
            let ticket = editor.borrow_mut().begin_context(&ctx);
            let outcome = run_template(&editor, &host, &ctx).await;
            log::debug!("context template {}", outcome_name(outcome));
            let restored = editor.borrow_mut().restore_draft(ticket);
            Ok(JsValue::from_bool(restored))
        }))
    }

    /// Drive the autosave debounce from the page clock.
    pub fn tick(&self, now_ms: f64) -> Option<String> {
        self.editor.borrow_mut().tick(now_ms.max(0.0) as u64).map(save_json)
    }

    pub fn save_draft(&self, forced: bool) -> String {
        save_json(self.editor.borrow_mut().save_draft(forced))
    }

    pub fn discard_draft(&self) {
        self.editor.borrow_mut().discard_draft();
    }

    pub fn on_page_hide(&self) -> Option<String> {
        self.editor.borrow_mut().on_page_hide().map(save_json)
    }

    pub fn dispose(&self) {
        self.editor.borrow_mut().teardown();
    }
}

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("PCase WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn roles_from_picker_names() {
        assert_eq!(insert_role("sticker").ok(), Some(Role::Sticker));
        assert_eq!(insert_role("background").ok(), Some(Role::Background));
    }

    #[test]
    fn save_outcomes_as_json() {
        assert_eq!(save_json(SaveOutcome::Saved { bytes: 12 }), r#"{"bytes":12,"status":"saved"}"#);
        assert_eq!(outcome_name(None), "skipped");
    }
}
