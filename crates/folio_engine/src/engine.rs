use std::io;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use folio_core::{LoadGeneration, LoadTicket, QuerySeq, RenderRequest};
use folio_logging::{folio_debug, folio_info, folio_warn};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::answer::{AnswerClient, AnswerRequest, AnswerSettings, ReqwestAnswerClient};
use crate::document::{DocumentFetcher, DocumentSettings, ReqwestDocumentFetcher};
use crate::render::{spawn_render_worker, BackendFactory, RenderCommand};
use crate::types::{ChannelEventSink, EngineEvent, EventSink, FetchError};

#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub answer: AnswerSettings,
    pub document: DocumentSettings,
}

enum EngineCommand {
    Ask { seq: QuerySeq, request: AnswerRequest },
    Cancel { seq: QuerySeq },
    LoadDocument { generation: LoadGeneration, url: String },
    Render(RenderRequest),
}

/// Front door to the IO side. Commands go in over a channel; results come
/// back as [`EngineEvent`]s for the driver to poll.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: EngineSettings, backend: BackendFactory) -> io::Result<Self> {
        Self::with_services(
            Arc::new(ReqwestAnswerClient::new(settings.answer)),
            Arc::new(ReqwestDocumentFetcher::new(settings.document)),
            backend,
        )
    }

    pub fn with_services(
        answers: Arc<dyn AnswerClient>,
        documents: Arc<dyn DocumentFetcher>,
        backend: BackendFactory,
    ) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("folio-engine")
            .enable_all()
            .build()?;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let sink: Arc<dyn EventSink> = Arc::new(ChannelEventSink::new(event_tx));
        let render_tx = spawn_render_worker(backend, sink.clone());

        thread::spawn(move || {
            let mut dispatcher = Dispatcher {
                runtime,
                answers,
                documents,
                sink,
                render_tx,
                active_answer: None,
                active_load: None,
            };
            while let Ok(command) = cmd_rx.recv() {
                dispatcher.handle(command);
            }
            dispatcher.cancel_all();
            folio_debug!("engine dispatcher stopped");
        });

        Ok(Self { cmd_tx, event_rx })
    }

    /// Starts streaming an answer, cancelling whatever stream was running.
    pub fn ask(&self, seq: QuerySeq, doc_id: &str, question: &str) {
        let _ = self.cmd_tx.send(EngineCommand::Ask {
            seq,
            request: AnswerRequest {
                doc_id: doc_id.to_string(),
                question: question.to_string(),
            },
        });
    }

    pub fn cancel(&self, seq: QuerySeq) {
        let _ = self.cmd_tx.send(EngineCommand::Cancel { seq });
    }

    /// Downloads and opens a document; an older load still running is abandoned.
    pub fn load_document(&self, ticket: &LoadTicket) {
        let _ = self.cmd_tx.send(EngineCommand::LoadDocument {
            generation: ticket.generation,
            url: ticket.url.clone(),
        });
    }

    pub fn render(&self, request: RenderRequest) {
        let _ = self.cmd_tx.send(EngineCommand::Render(request));
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

struct Dispatcher {
    runtime: Runtime,
    answers: Arc<dyn AnswerClient>,
    documents: Arc<dyn DocumentFetcher>,
    sink: Arc<dyn EventSink>,
    render_tx: mpsc::Sender<RenderCommand>,
    active_answer: Option<(QuerySeq, CancellationToken)>,
    active_load: Option<CancellationToken>,
}

impl Dispatcher {
    fn handle(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Ask { seq, request } => self.start_answer(seq, request),
            EngineCommand::Cancel { seq } => {
                if let Some((active, token)) = &self.active_answer {
                    if *active == seq {
                        folio_info!("cancelling answer stream {}", seq);
                        token.cancel();
                        self.active_answer = None;
                    }
                }
            }
            EngineCommand::LoadDocument { generation, url } => self.start_load(generation, url),
            EngineCommand::Render(request) => {
                let _ = self.render_tx.send(RenderCommand::Render(request));
            }
        }
    }

    fn start_answer(&mut self, seq: QuerySeq, request: AnswerRequest) {
        if let Some((previous, token)) = self.active_answer.take() {
            folio_debug!("answer stream {} superseded by {}", previous, seq);
            token.cancel();
        }
        let token = CancellationToken::new();
        self.active_answer = Some((seq, token.clone()));

        let answers = self.answers.clone();
        let sink = self.sink.clone();
        self.runtime.spawn(async move {
            let event = match answers.ask(seq, &request, sink.as_ref(), &token).await {
                Ok(bytes) => EngineEvent::AnswerFinished { seq, bytes },
                Err(err) if err.is_cancelled() => EngineEvent::AnswerCancelled { seq },
                Err(error) => {
                    folio_warn!("answer stream {} failed: {}", seq, error.message);
                    EngineEvent::AnswerFailed { seq, error }
                }
            };
            sink.emit(event);
        });
    }

    fn start_load(&mut self, generation: LoadGeneration, url: String) {
        if let Some(token) = self.active_load.take() {
            token.cancel();
        }
        let token = CancellationToken::new();
        self.active_load = Some(token.clone());

        let documents = self.documents.clone();
        let sink = self.sink.clone();
        let render_tx = self.render_tx.clone();
        self.runtime.spawn(async move {
            let fetched: Result<Vec<u8>, FetchError> = tokio::select! {
                _ = token.cancelled() => {
                    folio_debug!("document load {} abandoned", generation);
                    return;
                }
                fetched = documents.fetch(&url) => fetched,
            };
            match fetched {
                Ok(bytes) => {
                    let _ = render_tx.send(RenderCommand::Open { generation, bytes });
                }
                Err(err) => {
                    folio_warn!("could not download {}: {}", url, err.message);
                    sink.emit(EngineEvent::DocumentFailed {
                        generation,
                        reason: err.to_string(),
                    });
                }
            }
        });
    }

    fn cancel_all(&mut self) {
        if let Some((_, token)) = self.active_answer.take() {
            token.cancel();
        }
        if let Some(token) = self.active_load.take() {
            token.cancel();
        }
    }
}
