use folio_core::{LoadTicket, QueryTicket, RenderRequest, ViewerEffect};
use folio_engine::EngineHandle;
use folio_logging::folio_info;

/// The engine operations the workspace drives. `EngineHandle` in the app,
/// a recorder in tests.
pub trait EngineRequests {
    fn ask(&self, ticket: &QueryTicket);
    fn cancel(&self, seq: u64);
    fn load_document(&self, ticket: &LoadTicket);
    fn render(&self, request: RenderRequest);
}

impl EngineRequests for EngineHandle {
    fn ask(&self, ticket: &QueryTicket) {
        EngineHandle::ask(self, ticket.seq, &ticket.doc_id, &ticket.question);
    }

    fn cancel(&self, seq: u64) {
        EngineHandle::cancel(self, seq);
    }

    fn load_document(&self, ticket: &LoadTicket) {
        EngineHandle::load_document(self, ticket);
    }

    fn render(&self, request: RenderRequest) {
        EngineHandle::render(self, request);
    }
}

/// Hands the viewer's queued work to the engine.
pub fn run_viewer_effects(effects: Vec<ViewerEffect>, engine: &dyn EngineRequests) {
    for effect in effects {
        match effect {
            ViewerEffect::Load(ticket) => {
                folio_info!(
                    "LoadDocument generation={} url_len={} url={}",
                    ticket.generation,
                    ticket.url.len(),
                    ticket.url
                );
                engine.load_document(&ticket);
            }
            ViewerEffect::Render(request) => engine.render(request),
        }
    }
}
