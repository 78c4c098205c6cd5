//! Folio engine: network streaming, document download, rasterization and
//! storage behind a command/event channel.
mod answer;
mod document;
mod encode;
mod engine;
mod persist;
mod render;
mod types;

pub use answer::{AnswerClient, AnswerRequest, AnswerSettings, ReqwestAnswerClient, DEFAULT_ENDPOINT};
pub use document::{DocumentFetcher, DocumentSettings, ReqwestDocumentFetcher};
pub use encode::{decode_png_data_url, PngDataUrlEncoder};
pub use engine::{EngineHandle, EngineSettings};
pub use persist::{ensure_storage_dir, AtomicFileWriter, FileBookmarkStorage, KeyValueDir, PersistError};
pub use render::{default_backend, BackendFactory, RasterBackend, RenderError, UnsupportedBackend};
pub use types::{ChannelEventSink, EngineEvent, EventSink, FailureKind, FetchError};
