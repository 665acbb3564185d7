//! Integration tests: editor flows across history, templates, drafts,
//! crops and frame links.
//!
//! A mock host serves images from a size table; unknown URLs fail.

use kurbo::{Point, Vec2};
use pcase_core::geometry::affine_approx_eq;
use pcase_core::layers::check_layering;
use pcase_core::{ClipShape, Content, CropShape, ObjectId, RecordFilter, Role, SystemLayer};
use pcase_editor::draft::{Draft, DraftStore, SaveOutcome, SkipReason};
use pcase_editor::frame::frame_clip;
use pcase_editor::template::fetch;
use pcase_editor::*;
use pcase_render::ExportKind;
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::collections::HashMap;

// ─── Helpers ─────────────────────────────────────────────────────────────

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
struct MockHost {
    sizes: HashMap<String, (f64, f64)>,
    frames: Cell<u32>,
}

impl MockHost {
    fn with(images: &[(&str, f64, f64)]) -> Self {
        Self {
            sizes: images
                .iter()
                .map(|(url, w, h)| (url.to_string(), (*w, *h)))
                .collect(),
            frames: Cell::new(0),
        }
    }
}

impl EditorHost for MockHost {
    async fn load_image(&self, url: &str) -> Result<LoadedImage, LoadError> {
        match self.sizes.get(url) {
            Some(&(width, height)) => Ok(LoadedImage {
                src: url.to_string(),
                width,
                height,
            }),
            None => Err(LoadError::Network {
                url: url.to_string(),
                reason: "404".into(),
            }),
        }
    }

    async fn next_frame(&self) {
        self.frames.set(self.frames.get() + 1);
    }
}

fn host() -> MockHost {
    MockHost::with(&[
        ("a.png", 600.0, 1200.0),
        ("a_mask.png", 600.0, 1200.0),
        ("b.png", 300.0, 600.0),
        ("b_mask.png", 300.0, 600.0),
        ("photo.png", 300.0, 200.0),
        ("frame.png", 400.0, 400.0),
    ])
}

fn product(id: &str, base: &str, mask: &str) -> TemplateContext {
    TemplateContext {
        product_id: id.into(),
        variant_id: Some("black".into()),
        base_url: base.into(),
        mask_url: mask.into(),
        ..Default::default()
    }
}

fn template_srcs(ed: &Editor, layer: SystemLayer) -> Vec<String> {
    ed.scene()
        .layer_objects(layer)
        .filter_map(|o| o.content.src().map(str::to_string))
        .collect()
}

fn assert_frame_clip_synced(ed: &Editor, frame: ObjectId) {
    let link = *ed.links().find(frame).expect("frame is linked");
    let frame_obj = ed.get(link.frame).expect("frame exists");
    let photo = ed.get(link.photo).expect("photo exists");
    let expected = frame_clip(frame_obj, link.offset);
    let actual = photo.shape_clip().expect("photo carries the frame clip");
    assert!(actual.absolute);
    assert!(
        affine_approx_eq(expected.affine(), actual.affine(), 1e-6),
        "clip {:?} drifted from frame {:?}",
        actual.affine(),
        expected.affine()
    );
}

// ─── Crop ────────────────────────────────────────────────────────────────

#[test]
fn star_crop_on_square_image() {
    let mut ed = Editor::in_memory(EditorConfig::default());
    let id = ed
        .insert_image(
            Role::Image,
            LoadedImage {
                src: "sq.png".into(),
                width: 200.0,
                height: 200.0,
            },
        )
        .unwrap();
    ed.apply_crop(id, CropShape::Star, 0.0).unwrap();

    let clip = ed.get(id).unwrap().shape_clip().unwrap();
    let ClipShape::Polygon { points } = &clip.shape else {
        panic!("star crop must be a polygon, got {:?}", clip.shape);
    };
    assert_eq!(points.len(), 10);
    assert!((points[0].x).abs() < 1e-9);
    assert!((points[0].y + 90.0).abs() < 1e-9);
    let inner = points[1].to_vec2().hypot();
    assert!((inner - 90.0 * 0.382).abs() < 0.1, "inner radius {inner}");
}

#[test]
fn crop_param_update_is_undoable() {
    let mut ed = Editor::in_memory(EditorConfig::default());
    let id = ed.add_text("x");
    let photo = ed
        .insert_image(
            Role::Image,
            LoadedImage {
                src: "p.png".into(),
                width: 100.0,
                height: 100.0,
            },
        )
        .unwrap();
    assert!(matches!(
        ed.update_crop_param(photo, 10.0),
        Err(EditorError::NoCrop(_))
    ));
    ed.apply_crop(photo, CropShape::Rounded, 20.0).unwrap();
    ed.update_crop_param(photo, 80.0).unwrap();
    assert_eq!(ed.get(photo).unwrap().crop.unwrap().param, 80.0);

    assert!(ed.undo());
    assert_eq!(ed.get(photo).unwrap().crop.unwrap().param, 20.0);
    assert!(ed.get(id).is_some());
}

// ─── History ─────────────────────────────────────────────────────────────

#[test]
fn undo_at_start_changes_nothing() {
    let mut ed = Editor::in_memory(EditorConfig::default());
    let before = ed.to_json(RecordFilter::All).unwrap();
    assert!(!ed.undo());
    assert_eq!(ed.history().cursor(), 0);
    assert_eq!(ed.to_json(RecordFilter::All).unwrap(), before);
}

#[test]
fn history_is_capped() {
    let mut ed = Editor::in_memory(EditorConfig::default());
    for i in 0..60 {
        ed.add_text(&format!("line {i}"));
    }
    assert_eq!(ed.history().len(), 50);
    assert_eq!(ed.history().cursor(), 49);

    let mut steps = 0;
    while ed.undo() {
        steps += 1;
    }
    assert_eq!(steps, 49);
    // The oldest surviving state already holds eleven lines.
    assert_eq!(ed.scene().user_objects().count(), 11);
}

#[test]
fn transaction_records_one_step() {
    let mut ed = Editor::in_memory(EditorConfig::default());
    let before = ed.history().len();
    ed.with_transaction(|ed| {
        for word in ["one", "two", "three", "four", "five"] {
            ed.add_text(word);
        }
    });
    assert_eq!(ed.history().len(), before + 1);
    assert!(ed.undo());
    assert_eq!(ed.scene().user_objects().count(), 0);
    assert!(ed.redo());
    assert_eq!(ed.scene().user_objects().count(), 5);
}

#[test]
fn new_change_truncates_redo() {
    let mut ed = Editor::in_memory(EditorConfig::default());
    ed.add_text("a");
    ed.add_text("b");
    assert!(ed.undo());
    assert!(ed.history().can_redo());
    ed.add_text("c");
    assert!(!ed.history().can_redo());
    assert!(!ed.redo());
}

// ─── Templates ───────────────────────────────────────────────────────────

#[tokio::test]
async fn template_switch_leaves_one_pair() {
    init_logging();
    let host = host();
    let mut ed = Editor::in_memory(EditorConfig::default());
    let text = ed.add_text("keep me");

    let a = product("case-a", "a.png", "a_mask.png");
    let b = product("case-b", "b.png", "b_mask.png");
    assert_eq!(ed.apply_template(&host, &a).await, Some(InstallOutcome::Installed));
    assert_eq!(ed.apply_template(&host, &b).await, Some(InstallOutcome::Installed));

    assert_eq!(template_srcs(&ed, SystemLayer::Base), vec!["b.png".to_string()]);
    assert_eq!(template_srcs(&ed, SystemLayer::Mask), vec!["b_mask.png".to_string()]);
    assert_eq!(check_layering(ed.scene()), Ok(()));
    assert!(ed.get(text).is_some());
    assert!(!ed.loader().is_loading());
    assert_eq!(host.frames.get(), 2);

    let base = ed.scene().system_layer(SystemLayer::Base).unwrap();
    assert_eq!(base.opacity, 1.0);
    assert!(!base.selectable);
}

#[tokio::test]
async fn same_template_is_not_reloaded() {
    let host = host();
    let mut ed = Editor::in_memory(EditorConfig::default());
    let a = product("case-a", "a.png", "a_mask.png");
    assert!(ed.apply_template(&host, &a).await.is_some());
    assert_eq!(ed.apply_template(&host, &a).await, None);
    assert_eq!(host.frames.get(), 1);
}

#[tokio::test]
async fn templates_are_not_undoable() {
    let host = host();
    let mut ed = Editor::in_memory(EditorConfig::default());
    ed.add_text("hi");
    let len = ed.history().len();
    ed.apply_template(&host, &product("case-a", "a.png", "a_mask.png"))
        .await;
    assert_eq!(ed.history().len(), len);

    assert!(ed.undo());
    assert_eq!(template_srcs(&ed, SystemLayer::Base), vec!["a.png".to_string()]);
    assert_eq!(ed.scene().user_objects().count(), 0);
}

#[tokio::test]
async fn cancelled_template_load_is_dropped() {
    let host = host();
    let mut ed = Editor::in_memory(EditorConfig::default());
    let ticket = ed
        .begin_template(&product("case-a", "a.png", "a_mask.png"))
        .unwrap();
    assert!(ed.loader().is_loading());
    assert!(!ed.undo());

    let fetched = fetch(&host, ticket).await;
    ed.cancel_template();
    assert_eq!(ed.install_template(fetched), InstallOutcome::Stale);
    assert_eq!(ed.scene().system_objects().count(), 0);
    assert!(!ed.loader().is_loading());
}

#[tokio::test]
async fn failed_mask_falls_back_to_placeholder() {
    let host = host();
    let mut ed = Editor::in_memory(EditorConfig::default());
    let ctx = product("case-a", "a.png", "missing_mask.png");
    assert_eq!(ed.apply_template(&host, &ctx).await, Some(InstallOutcome::Installed));

    let mask = ed.scene().system_layer(SystemLayer::Mask).unwrap();
    assert!(matches!(mask.content, Content::Rect { .. }));
    assert_eq!(mask.fill.as_deref(), Some(ed.config().fallback_mask_color.as_str()));
    assert_eq!(mask.opacity, ed.config().fallback_mask_opacity);
    assert_eq!(check_layering(ed.scene()), Ok(()));
}

#[tokio::test]
async fn context_switch_supersedes_running_load() {
    let host = host();
    let mut ed = Editor::in_memory(EditorConfig::default());
    let a = product("case-a", "a.png", "a_mask.png");
    let b = product("case-b", "b.png", "b_mask.png");
    let slow = ed.begin_template(&a).unwrap();

    assert!(!ed.enter_context(&host, &b).await);
    assert_eq!(template_srcs(&ed, SystemLayer::Base), vec!["b.png".to_string()]);
    assert_eq!(ed.context().map(|c| c.product_id.as_str()), Some("case-b"));
    assert!(ed.drafts().key().unwrap().contains(":case-b:"));

    let fetched = fetch(&host, slow).await;
    assert_eq!(ed.install_template(fetched), InstallOutcome::Stale);
    assert_eq!(template_srcs(&ed, SystemLayer::Base), vec!["b.png".to_string()]);
    assert!(!ed.loader().is_loading());
}

// ─── Drafts ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn no_draft_write_while_template_loads() {
    let mut ed = Editor::in_memory(EditorConfig::default());
    let ctx = product("case-a", "a.png", "a_mask.png");
    let ticket = ed.begin_draft_restore(&ctx);
    assert!(!ed.restore_draft(ticket));

    let _load = ed.begin_template(&ctx).unwrap();
    ed.add_text("typed during load");
    assert_eq!(
        ed.save_draft(true),
        SaveOutcome::Skipped(SkipReason::TemplateLoading)
    );
    ed.add_text("still loading");
    assert_eq!(ed.tick(10_000), Some(SaveOutcome::Skipped(SkipReason::TemplateLoading)));
    let key = ed.drafts().key().unwrap().to_string();
    assert_eq!(ed.store().get(&key), None);
}

#[tokio::test]
async fn draft_saves_after_debounce_and_restores() {
    init_logging();
    let host = host();
    let ctx = product("case-a", "a.png", "a_mask.png");

    let mut ed = Editor::in_memory(EditorConfig::default());
    assert!(!ed.enter_context(&host, &ctx).await);
    ed.tick(1_000);
    ed.add_text("saved line");
    assert_eq!(ed.tick(1_500), None);
    let saved = ed.tick(1_800);
    assert!(matches!(saved, Some(SaveOutcome::Saved { .. })), "{saved:?}");
    assert_eq!(ed.tick(5_000), None);

    let key = ed.drafts().key().unwrap().to_string();
    let json = ed.store().get(&key).unwrap();
    assert!(!json.contains("system_base_image"));

    let mut store = MemoryDraftStore::new();
    store.set(&key, &json).unwrap();
    let mut fresh = Editor::new(EditorConfig::default(), Box::new(store));
    assert!(fresh.enter_context(&host, &ctx).await);
    let texts: Vec<_> = fresh
        .scene()
        .user_objects()
        .filter_map(|o| match &o.content {
            Content::Text(t) => Some(t.text.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["saved line".to_string()]);
    assert_eq!(check_layering(fresh.scene()), Ok(()));
    // Restored state is the start of the undo timeline.
    assert!(!fresh.undo());
}

#[test]
fn superseded_restore_is_ignored() {
    let mut ed = Editor::in_memory(EditorConfig::default());
    let ctx = product("case-a", "a.png", "a_mask.png");
    let first = ed.begin_draft_restore(&ctx);
    let second = ed.begin_draft_restore(&ctx);
    assert!(!ed.restore_draft(first));
    assert!(ed.drafts().is_restoring());
    ed.restore_draft(second);
    assert!(!ed.drafts().is_restoring());
}

#[test]
fn page_hide_flushes_only_pending_saves() {
    let mut ed = Editor::in_memory(EditorConfig::default());
    assert_eq!(ed.on_page_hide(), None);
    ed.add_text("x");
    assert_eq!(ed.on_page_hide(), Some(SaveOutcome::Skipped(SkipReason::NoContext)));
    assert_eq!(ed.drafts().deadline(), None);
}

#[tokio::test]
async fn page_hide_reports_oversized_draft() {
    let host = host();
    let config = EditorConfig {
        draft_max_bytes: 64,
        ..Default::default()
    };
    let mut ed = Editor::in_memory(config);
    ed.enter_context(&host, &product("case-a", "a.png", "a_mask.png"))
        .await;
    ed.add_text("far too much for sixty-four bytes");

    let outcome = ed.on_page_hide();
    assert!(
        matches!(outcome, Some(SaveOutcome::TooLarge { limit: 64, .. })),
        "{outcome:?}"
    );
    let key = ed.drafts().key().unwrap().to_string();
    assert_eq!(ed.store().get(&key), None);
}

#[tokio::test]
async fn ai_dim_is_not_saved_in_drafts() {
    let host = host();
    let mut ed = Editor::in_memory(EditorConfig::default());
    ed.enter_context(&host, &product("case-a", "a.png", "a_mask.png"))
        .await;
    let photo = ed.add_image(&host, Role::Image, "photo.png").await.unwrap();
    let job = ed.begin_ai(photo, AiStyle::default()).unwrap();

    let saved = ed.save_draft(true);
    assert!(matches!(saved, SaveOutcome::Saved { .. }), "{saved:?}");
    let key = ed.drafts().key().unwrap().to_string();
    let draft = Draft::from_json(&ed.store().get(&key).unwrap()).unwrap();
    let record = draft
        .scene
        .objects
        .iter()
        .find(|r| r.id.as_deref() == Some(photo.as_str()))
        .unwrap();
    assert_eq!(record.opacity, 1.0);
    assert_eq!(ed.get(photo).unwrap().opacity, 0.5);

    ed.finish_ai(job, Ok("https://ai/out.png".into())).unwrap();
    assert_eq!(ed.get(photo).unwrap().opacity, 1.0);
}

// ─── Frames ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn frame_clip_follows_through_undo_and_redo() {
    init_logging();
    let host = host();
    let mut ed = Editor::in_memory(EditorConfig::default());
    let photo = ed.add_image(&host, Role::Image, "photo.png").await.unwrap();
    let hole = vec![
        Point::new(-100.0, -120.0),
        Point::new(140.0, -120.0),
        Point::new(140.0, 100.0),
        Point::new(-100.0, 100.0),
    ];
    let asset = FrameAsset {
        src: "frame.png".into(),
        hole: Some(hole),
    };
    let steps = ed.history().len();
    let frame = ed.add_frame(&host, asset, Some(photo)).await.unwrap();
    assert_eq!(ed.history().len(), steps + 1);

    assert_eq!(ed.get(photo).unwrap().in_frame, Some(frame));
    assert_eq!(
        ed.scene().index_of(photo).unwrap() + 1,
        ed.scene().index_of(frame).unwrap()
    );
    assert_frame_clip_synced(&ed, frame);
    assert!(matches!(
        ed.apply_crop(photo, CropShape::Circle, 0.0),
        Err(EditorError::FrameLinked(_))
    ));

    let photo_center = ed.get(photo).unwrap().center();
    let mut placement = ed.get(frame).unwrap().placement();
    placement.center += Vec2::new(30.0, -20.0);
    ed.transform_object(frame, placement).unwrap();
    ed.commit_transform();

    let moved = ed.get(photo).unwrap().center();
    assert!((moved - (photo_center + Vec2::new(30.0, -20.0))).hypot() < 1e-9);
    assert_frame_clip_synced(&ed, frame);

    assert!(ed.undo());
    assert!((ed.get(photo).unwrap().center() - photo_center).hypot() < 1e-6);
    assert_frame_clip_synced(&ed, frame);

    assert!(ed.redo());
    assert_frame_clip_synced(&ed, frame);

    assert!(ed.undo());
    assert!(ed.undo());
    assert!(ed.links().is_empty());
    assert!(ed.get(photo).unwrap().in_frame.is_none());
}

#[tokio::test]
async fn removing_a_frame_releases_its_photo() {
    let host = host();
    let mut ed = Editor::in_memory(EditorConfig::default());
    let photo = ed.add_image(&host, Role::Image, "photo.png").await.unwrap();
    let frame = ed
        .add_frame(
            &host,
            FrameAsset {
                src: "frame.png".into(),
                hole: None,
            },
            Some(photo),
        )
        .await
        .unwrap();
    ed.remove(frame).unwrap();
    let obj = ed.get(photo).unwrap();
    assert!(obj.in_frame.is_none());
    assert!(obj.shape_clip().is_none());
    assert!(ed.links().is_empty());
}

#[tokio::test]
async fn missing_frame_image_is_an_error() {
    let host = host();
    let mut ed = Editor::in_memory(EditorConfig::default());
    let err = ed
        .add_frame(&host, FrameAsset::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EditorError::Load(LoadError::Network { .. })));
    assert_eq!(ed.scene().len(), 0);
}

// ─── Design layers and export ────────────────────────────────────────────

#[test]
fn design_layers_get_fresh_ids_on_collision() {
    let mut source = Editor::in_memory(EditorConfig::default());
    source.add_text("from the gallery");
    let json = source.to_json(RecordFilter::UserOnly).unwrap();

    let mut ed = Editor::in_memory(EditorConfig::default());
    let first = ed.add_design_layers(&json).unwrap();
    let wrapped = format!(
        r#"{{"canvasData": {}}}"#,
        serde_json::to_string(&json).unwrap()
    );
    let second = ed.add_design_layers(&wrapped).unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_ne!(first[0], second[0]);
    assert_eq!(ed.scene().user_objects().count(), 2);
    assert_eq!(ed.history().len(), 3);
    assert!(matches!(
        ed.add_design_layers("not json"),
        Err(EditorError::DesignLayers(_))
    ));
}

#[tokio::test]
async fn exports_are_svg_data_uris() {
    let host = host();
    let mut ed = Editor::in_memory(EditorConfig::default());
    ed.apply_template(&host, &product("case-a", "a.png", "a_mask.png"))
        .await;
    ed.add_text("print me");
    for kind in [ExportKind::Preview, ExportKind::Print] {
        let uri = ed.export(kind).unwrap();
        assert!(uri.starts_with("data:image/svg+xml;base64,"), "{uri}");
    }
}

#[tokio::test]
async fn clear_all_keeps_the_template() {
    let host = host();
    let mut ed = Editor::in_memory(EditorConfig::default());
    ed.apply_template(&host, &product("case-a", "a.png", "a_mask.png"))
        .await;
    ed.add_text("a");
    ed.add_image(&host, Role::Sticker, "photo.png").await.unwrap();
    assert_eq!(ed.clear_all(), 2);
    assert_eq!(ed.scene().user_objects().count(), 0);
    assert_eq!(ed.scene().system_objects().count(), 2);
    assert_eq!(check_layering(ed.scene()), Ok(()));
}
