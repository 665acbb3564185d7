pub mod ai;
pub mod config;
pub mod crop;
pub mod draft;
pub mod editor;
pub mod error;
pub mod frame;
pub mod history;
pub mod host;
pub mod template;

pub use ai::{AiError, AiJob, AiService, AiStyle};
pub use config::{EditorConfig, PrintArea};
pub use draft::{Draft, DraftBridge, DraftStore, DraftTicket, MemoryDraftStore, SaveOutcome, SkipReason, draft_key};
pub use editor::{Editor, FrameAsset, LayerInfo, validate_barcode};
pub use error::{EditorError, EditorResult};
pub use frame::{FrameLink, FrameLinks};
pub use history::History;
pub use host::{EditorHost, LoadError, LoadedImage};
pub use template::{InstallOutcome, TemplateContext, TemplateLoader, TemplateSkip};
