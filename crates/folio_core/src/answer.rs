use folio_logging::{folio_debug, folio_info, folio_warn, set_query_seq};

use crate::bus::{BusEvent, EventBus};
use crate::protocol::{MetaEvent, NdjsonDecoder, StreamEvent};
use crate::transcript::{page_summary, Transcript};

/// Identifies one submission. Strictly increasing per renderer.
pub type QuerySeq = u64;

/// What the driver must send to the backend for an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTicket {
    pub seq: QuerySeq,
    pub doc_id: String,
    pub question: String,
    /// Stream that was still running and must be aborted first.
    pub superseded: Option<QuerySeq>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitRejected {
    #[error("no document selected")]
    MissingDocument,
    #[error("question is empty")]
    EmptyQuestion,
}

/// Why a page citation could not be followed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CiteRejected {
    #[error("no answer has cited any pages yet")]
    NoCitations,
    #[error("page {0} is not among the cited pages")]
    NotCited(u32),
}

/// Whether the submit control is enabled for the observed inputs.
pub fn submit_enabled(selected_document: Option<&str>, question: &str) -> bool {
    selected_document.is_some_and(|doc| !doc.trim().is_empty()) && !question.trim().is_empty()
}

#[derive(Debug)]
struct ActiveStream {
    seq: QuerySeq,
    message: usize,
    decoder: NdjsonDecoder,
}

/// Issues questions and folds the streamed answer into the transcript.
#[derive(Debug, Default)]
pub struct StreamingAnswer {
    transcript: Transcript,
    selected_document: Option<String>,
    question_input: String,
    last_seq: QuerySeq,
    active: Option<ActiveStream>,
}

impl StreamingAnswer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn selected_document(&self) -> Option<&str> {
        self.selected_document.as_deref()
    }

    pub fn question_input(&self) -> &str {
        &self.question_input
    }

    pub fn select_document(&mut self, doc_id: Option<String>) {
        self.selected_document = doc_id.filter(|doc| !doc.trim().is_empty());
    }

    pub fn set_question(&mut self, text: impl Into<String>) {
        self.question_input = text.into();
    }

    pub fn can_submit(&self) -> bool {
        submit_enabled(self.selected_document.as_deref(), &self.question_input)
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_seq(&self) -> Option<QuerySeq> {
        self.active.as_ref().map(|active| active.seq)
    }

    /// Submits the question field against the selected document and clears the field.
    pub fn submit_current(&mut self) -> Result<QueryTicket, SubmitRejected> {
        let doc_id = self
            .selected_document
            .clone()
            .ok_or(SubmitRejected::MissingDocument)?;
        let question = self.question_input.clone();
        let ticket = self.submit(&doc_id, &question)?;
        self.question_input.clear();
        Ok(ticket)
    }

    /// Starts a new exchange, superseding any stream still running.
    pub fn submit(&mut self, doc_id: &str, question: &str) -> Result<QueryTicket, SubmitRejected> {
        let doc_id = doc_id.trim();
        let question = question.trim();
        if doc_id.is_empty() {
            return Err(SubmitRejected::MissingDocument);
        }
        if question.is_empty() {
            return Err(SubmitRejected::EmptyQuestion);
        }

        let superseded = self.cancel();
        self.last_seq += 1;
        let seq = self.last_seq;
        set_query_seq(seq);

        let message = self.transcript.open_exchange(question);
        self.active = Some(ActiveStream {
            seq,
            message,
            decoder: NdjsonDecoder::new(),
        });
        folio_info!("submitting question for {} ({} chars)", doc_id, question.len());

        Ok(QueryTicket {
            seq,
            doc_id: doc_id.to_string(),
            question: question.to_string(),
            superseded,
        })
    }

    /// Aborts the running stream, if any. An abort leaves no error text.
    pub fn cancel(&mut self) -> Option<QuerySeq> {
        let active = self.active.take()?;
        if let Some(message) = self.transcript.get_mut(active.message) {
            message.pending = false;
        }
        folio_debug!("cancelled stream q{}", active.seq);
        Some(active.seq)
    }

    /// Feeds a transport chunk of stream `seq`. Chunks of any other stream are dropped.
    pub fn on_chunk(&mut self, seq: QuerySeq, chunk: &[u8], bus: &mut EventBus) {
        let Some(active) = self.active.as_mut().filter(|active| active.seq == seq) else {
            folio_debug!("ignoring {} bytes from stale stream q{}", chunk.len(), seq);
            return;
        };
        let events = active.decoder.push(chunk);
        let message = active.message;
        self.apply_events(message, events, bus);
    }

    /// Stream `seq` ended normally.
    pub fn on_finished(&mut self, seq: QuerySeq, bus: &mut EventBus) {
        let Some(mut active) = self.take_active(seq) else {
            return;
        };
        let events = active.decoder.finish();
        self.apply_events(active.message, events, bus);
        if let Some(message) = self.transcript.get_mut(active.message) {
            message.pending = false;
        }
        folio_info!(
            "stream q{} finished ({} malformed lines dropped)",
            seq,
            active.decoder.skipped()
        );
    }

    /// Stream `seq` failed; the reason is shown inline and not retried.
    pub fn on_failed(&mut self, seq: QuerySeq, reason: &str) {
        let Some(active) = self.take_active(seq) else {
            return;
        };
        folio_warn!("stream q{} failed: {}", seq, reason);
        if let Some(message) = self.transcript.get_mut(active.message) {
            message.pending = false;
            message.error = Some(format!(" [Error: {reason}]"));
        }
    }

    /// The transport acknowledged an abort of stream `seq`.
    pub fn on_cancelled(&mut self, seq: QuerySeq) {
        if let Some(active) = self.take_active(seq) {
            if let Some(message) = self.transcript.get_mut(active.message) {
                message.pending = false;
            }
        }
    }

    /// Follows a page reference of the latest answer that cited pages by
    /// broadcasting `jump-to-page`.
    pub fn cite(&self, page: u32, bus: &mut EventBus) -> Result<(), CiteRejected> {
        let cited = self
            .transcript
            .messages()
            .iter()
            .rev()
            .find_map(|message| message.page_meta.as_ref())
            .ok_or(CiteRejected::NoCitations)?;
        if !cited.contains(&page) {
            return Err(CiteRejected::NotCited(page));
        }
        folio_debug!("following citation of page {}", page);
        bus.emit(BusEvent::JumpToPage { page });
        Ok(())
    }

    fn take_active(&mut self, seq: QuerySeq) -> Option<ActiveStream> {
        if self.active_seq() == Some(seq) {
            self.active.take()
        } else {
            None
        }
    }

    fn apply_events(&mut self, message: usize, events: Vec<StreamEvent>, bus: &mut EventBus) {
        for event in events {
            match event {
                StreamEvent::Meta(meta) => self.apply_meta(message, meta, bus),
                StreamEvent::Token { content } => {
                    if let Some(target) = self.transcript.get_mut(message) {
                        target.text.push_str(&content);
                    }
                }
            }
        }
    }

    fn apply_meta(&mut self, message: usize, meta: MetaEvent, bus: &mut EventBus) {
        let first_page = meta.start_page();
        if let Some(target) = self.transcript.get_mut(message) {
            target.summary = Some(page_summary(&meta.pages));
            target.page_meta = Some(meta.pages.clone());
        }
        if meta.pdf_url.is_empty() {
            folio_warn!("meta event without pdf_url; page viewer not notified");
            return;
        }
        bus.emit(BusEvent::RagMeta {
            pages: meta.pages,
            pdf_url: meta.pdf_url,
            first_page,
            doc_label: meta.doc_label,
        });
    }
}
