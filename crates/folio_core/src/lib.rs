//! Folio core: pure state machines for the document workspace, coupled only
//! through the event bus.
mod answer;
mod bookmarks;
mod bus;
mod canvas;
mod geometry;
mod ids;
mod pages;
mod protocol;
mod raster;
mod snippet;
mod storage;
mod transcript;

pub use answer::{
    submit_enabled, CiteRejected, QuerySeq, QueryTicket, StreamingAnswer, SubmitRejected,
};
pub use bookmarks::{
    decode_tree, encode_tree, BookmarkError, BookmarkNode, BookmarkStore, Folder, BOOKMARKS_KEY,
};
pub use bus::{BusEvent, EventBus, Subscriber, MAX_DISPATCH_ROUNDS};
pub use canvas::{CanvasBoard, CanvasItem, Tool};
pub use geometry::{to_native_pixels, wrapper_point, PixelRect, Point, Rect, Size};
pub use ids::{IdGenerator, MillisClock};
pub use pages::{
    LoadGeneration, LoadTicket, PageRejected, PageScheduler, RenderRequest, ViewerEffect,
    ViewerPhase, DEFAULT_SCALE, MAX_SCALE, MIN_SCALE,
};
pub use protocol::{MetaEvent, NdjsonDecoder, StreamEvent};
pub use raster::RasterSurface;
pub use snippet::{
    EncodeError, Snippet, SnippetEncoder, SnippetExtractor, ViewerGeometry, MIN_SELECTION_PX,
};
pub use storage::{BookmarkStorage, MemoryStorage, StorageError};
pub use transcript::{Message, Role, Transcript};
