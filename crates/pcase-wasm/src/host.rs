//! JavaScript-backed services: image loading, frame scheduling, AI
//! transformation and local-storage drafts.

use js_sys::{Function, Promise, Reflect};
use pcase_editor::draft::{DraftError, DraftStore};
use pcase_editor::{AiError, AiService, AiStyle, EditorHost, LoadError, LoadedImage};
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;

pub(crate) fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

/// Call `f` and await its result, whether or not it returned a promise.
async fn call_async(f: &Function, args: &[&JsValue]) -> Result<JsValue, JsValue> {
    let ret = match args {
        [] => f.call0(&JsValue::NULL)?,
        [a] => f.call1(&JsValue::NULL, a)?,
        [a, b, ..] => f.call2(&JsValue::NULL, a, b)?,
    };
    JsFuture::from(Promise::resolve(&ret)).await
}

fn number_field(obj: &JsValue, name: &str) -> Option<f64> {
    Reflect::get(obj, &JsValue::from_str(name)).ok()?.as_f64()
}

/// Host callbacks supplied by the page.
///
/// `load_image(url)` resolves to `{ src, width, height }`;
/// `next_frame()` resolves on the next animation frame.
#[derive(Clone)]
pub struct JsHost {
    load_image: Function,
    next_frame: Function,
}

impl JsHost {
    pub fn new(load_image: Function, next_frame: Function) -> Self {
        Self {
            load_image,
            next_frame,
        }
    }
}

impl EditorHost for JsHost {
    async fn load_image(&self, url: &str) -> Result<LoadedImage, LoadError> {
        let value = call_async(&self.load_image, &[&JsValue::from_str(url)])
            .await
            .map_err(|e| LoadError::Network {
                url: url.to_string(),
                reason: describe(&e),
            })?;
        let (Some(width), Some(height)) = (number_field(&value, "width"), number_field(&value, "height")) else {
            return Err(LoadError::Decode(url.to_string()));
        };
        let src = Reflect::get(&value, &JsValue::from_str("src"))
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_else(|| url.to_string());
        Ok(LoadedImage { src, width, height })
    }

    async fn next_frame(&self) {
        if let Err(e) = call_async(&self.next_frame, &[]).await {
            log::warn!("next_frame callback failed: {}", describe(&e));
        }
    }
}

/// `transform(url, style)` resolving to the replacement image URL.
#[derive(Clone)]
pub struct JsAiService {
    transform: Function,
}

impl JsAiService {
    pub fn new(transform: Function) -> Self {
        Self { transform }
    }
}

impl AiService for JsAiService {
    async fn transform(&self, image_url: &str, style: AiStyle) -> Result<String, AiError> {
        let value = call_async(
            &self.transform,
            &[&JsValue::from_str(image_url), &JsValue::from_str(style.as_str())],
        )
        .await
        .map_err(|e| AiError::Service(describe(&e)))?;
        Ok(value.as_string().unwrap_or_default())
    }
}

/// Drafts in `window.localStorage`.
pub struct LocalDraftStore {
    storage: web_sys::Storage,
}

impl LocalDraftStore {
    /// `None` outside a browser or when storage is disabled.
    pub fn open() -> Option<Self> {
        let storage = web_sys::window()?.local_storage().ok()??;
        Some(Self { storage })
    }
}

impl DraftStore for LocalDraftStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), DraftError> {
        self.storage
            .set_item(key, value)
            .map_err(|e| DraftError::Store(describe(&e)))
    }

    fn remove(&mut self, key: &str) {
        if let Err(e) = self.storage.remove_item(key) {
            log::warn!("could not remove draft `{key}`: {}", describe(&e));
        }
    }
}
