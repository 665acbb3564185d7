//! Product template loading.
//!
//! A template is a base image painted under all user content and a mask
//! image painted over it. Loading is split into phases so a host that keeps
//! the editor behind `Rc<RefCell<_>>` never holds a borrow across an await:
//!
//! 1. [`TemplateLoader::begin`]: re-entrancy and idempotence checks, issues a ticket;
//! 2. [`fetch`]: loads both images in parallel, touches no editor state;
//! 3. [`TemplateLoader::install`]: swaps the template layers in, invisible;
//! 4. [`TemplateLoader::reveal`]: on the next render frame, makes them visible.
//!
//! Every phase after `begin` checks the ticket's sequence number and turns
//! into a no-op once a newer load or [`TemplateLoader::invalidate`] superseded it.

use crate::config::EditorConfig;
use crate::host::{EditorHost, LoadError, LoadedImage};
use pcase_core::layers::{refresh_boundaries, reorder};
use pcase_core::{Content, ObjectId, Role, Scene, SceneObject, SystemLayer};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;

/// Product / variant selection plus the template image URLs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateContext {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub base_url: String,
    pub mask_url: String,
    /// Template revision; also used to cache-bust the image URLs.
    pub revision: Option<String>,
}

/// Append `v=<revision>` to a URL. `data:` and `blob:` URLs are returned as-is.
pub fn cache_bust(url: &str, revision: Option<&str>) -> String {
    let Some(rev) = revision.filter(|r| !r.is_empty()) else {
        return url.to_string();
    };
    if url.starts_with("data:") || url.starts_with("blob:") {
        return url.to_string();
    }
    let (head, fragment) = match url.find('#') {
        Some(i) => url.split_at(i),
        None => (url, ""),
    };
    let sep = if head.contains('?') { '&' } else { '?' };
    format!("{head}{sep}v={rev}{fragment}")
}

/// Why a template request did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSkip {
    /// Another load is still running.
    InFlight,
    /// The same product and images are already on the canvas.
    AlreadyApplied,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateTicket {
    pub seq: u64,
    key: String,
    pub base_url: String,
    pub mask_url: String,
}

/// Results of [`fetch`], ready to be installed.
#[derive(Debug)]
pub struct FetchedTemplate {
    pub ticket: TemplateTicket,
    pub base: Result<LoadedImage, LoadError>,
    pub mask: Result<LoadedImage, LoadError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    Stale,
}

#[derive(Debug)]
struct PendingReveal {
    seq: u64,
    key: String,
    base_opacity: f64,
    mask_opacity: f64,
}

/// Load both template images in parallel.
pub async fn fetch<H: EditorHost>(host: &H, ticket: TemplateTicket) -> FetchedTemplate {
    let (base, mask) = futures::join!(
        host.load_image(&ticket.base_url),
        host.load_image(&ticket.mask_url)
    );
    FetchedTemplate { ticket, base, mask }
}

pub struct TemplateLoader {
    seq: Rc<Cell<u64>>,
    in_flight: bool,
    last_key: Option<String>,
    pending: Option<PendingReveal>,
}

impl Default for TemplateLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateLoader {
    pub fn new() -> Self {
        Self {
            seq: Rc::new(Cell::new(0)),
            in_flight: false,
            last_key: None,
            pending: None,
        }
    }

    /// Shared handle to the sequence counter; bumping it cancels the
    /// running load.
    pub fn sequence(&self) -> Rc<Cell<u64>> {
        Rc::clone(&self.seq)
    }

    pub fn is_current(&self, seq: u64) -> bool {
        self.seq.get() == seq
    }

    /// True from `begin` until `reveal` (or cancellation).
    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    pub fn last_key(&self) -> Option<&str> {
        self.last_key.as_deref()
    }

    /// Abandon any running load.
    pub fn invalidate(&mut self) {
        self.seq.set(self.seq.get() + 1);
        self.in_flight = false;
        self.pending = None;
    }

    /// Forget the applied template so the next request always reloads.
    pub fn reset(&mut self) {
        self.invalidate();
        self.last_key = None;
    }

    pub fn begin(&mut self, scene: &Scene, ctx: &TemplateContext) -> Result<TemplateTicket, TemplateSkip> {
        if self.in_flight {
            log::warn!("template load for `{}` rejected: another load is running", ctx.product_id);
            return Err(TemplateSkip::InFlight);
        }
        let revision = ctx.revision.as_deref();
        let base_url = cache_bust(&ctx.base_url, revision);
        let mask_url = cache_bust(&ctx.mask_url, revision);
        let key = format!("{}|{base_url}|{mask_url}", ctx.product_id);

        let in_place = |layer: SystemLayer, url: &str| {
            scene
                .system_layer(layer)
                .is_some_and(|o| o.content.src() == Some(url))
        };
        if self.last_key.as_deref() == Some(key.as_str())
            && in_place(SystemLayer::Base, &base_url)
            && in_place(SystemLayer::Mask, &mask_url)
        {
            log::debug!("template `{}` already applied", ctx.product_id);
            return Err(TemplateSkip::AlreadyApplied);
        }

        self.seq.set(self.seq.get() + 1);
        self.in_flight = true;
        self.pending = None;
        Ok(TemplateTicket {
            seq: self.seq.get(),
            key,
            base_url,
            mask_url,
        })
    }

    /// Replace the template layers with the fetched images (or placeholders).
    ///
    /// User content is never touched. The new layers start transparent.
    pub fn install(&mut self, scene: &mut Scene, fetched: FetchedTemplate, config: &EditorConfig) -> InstallOutcome {
        let FetchedTemplate { ticket, base, mask } = fetched;
        if !self.is_current(ticket.seq) {
            log::debug!("dropping stale template load #{}", ticket.seq);
            return InstallOutcome::Stale;
        }

        let removed = scene.remove_where(SceneObject::is_system);
        log::debug!("removed {} template layers", removed.len());

        let (base_obj, base_opacity) = build_layer(SystemLayer::Base, base, config);
        let (mask_obj, mask_opacity) = build_layer(SystemLayer::Mask, mask, config);
        scene.insert(0, base_obj);
        scene.push(mask_obj);
        reorder(scene);
        refresh_boundaries(scene, config.print_area.corner_radius);

        self.pending = Some(PendingReveal {
            seq: ticket.seq,
            key: ticket.key,
            base_opacity,
            mask_opacity,
        });
        InstallOutcome::Installed
    }

    /// Make installed layers visible and record the applied key.
    pub fn reveal(&mut self, scene: &mut Scene, seq: u64) -> bool {
        if !self.is_current(seq) {
            return false;
        }
        let Some(pending) = self.pending.take().filter(|p| p.seq == seq) else {
            return false;
        };
        for (layer, opacity) in [
            (SystemLayer::Base, pending.base_opacity),
            (SystemLayer::Mask, pending.mask_opacity),
        ] {
            let id = ObjectId::intern(layer.system_id());
            if let Some(obj) = scene.get_mut(id) {
                obj.opacity = opacity;
            }
        }
        self.last_key = Some(pending.key);
        self.in_flight = false;
        log::info!("template #{seq} applied");
        true
    }
}

/// Build a template layer scaled to fill the print area, or its placeholder.
fn build_layer(
    layer: SystemLayer,
    image: Result<LoadedImage, LoadError>,
    config: &EditorConfig,
) -> (SceneObject, f64) {
    let area = &config.print_area;
    let id = ObjectId::intern(layer.system_id());
    let (mut obj, opacity) = match image {
        Ok(img) if img.width > 0.0 && img.height > 0.0 => {
            let mut obj = SceneObject::new(
                id,
                Role::System(layer),
                Content::Image { src: img.src },
                img.width,
                img.height,
            );
            obj.scale_x = area.width / img.width;
            obj.scale_y = area.height / img.height;
            (obj, 1.0)
        }
        other => {
            match other {
                Err(e) => log::warn!("{layer:?} template image failed, using placeholder: {e}"),
                Ok(img) => log::warn!("{layer:?} template image `{}` is empty, using placeholder", img.src),
            }
            let (fill, opacity) = match layer {
                SystemLayer::Base => (&config.fallback_base_color, 1.0),
                SystemLayer::Mask => (&config.fallback_mask_color, config.fallback_mask_opacity),
            };
            let mut obj = SceneObject::new(
                id,
                Role::System(layer),
                Content::Rect {
                    rx: area.corner_radius,
                },
                area.width,
                area.height,
            );
            obj.fill = Some(fill.clone());
            (obj, opacity)
        }
    };
    obj.set_center(area.center());
    obj.opacity = 0.0;
    obj.selectable = false;
    obj.evented = false;
    (obj, opacity)
}
