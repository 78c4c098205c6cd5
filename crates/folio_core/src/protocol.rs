use folio_logging::{folio_trace, folio_warn};
use serde::Deserialize;

/// Page metadata announced at the start of an answer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetaEvent {
    #[serde(default)]
    pub pages: Vec<u32>,
    #[serde(default)]
    pub pdf_url: String,
    #[serde(default)]
    pub first_page: Option<u32>,
    #[serde(default)]
    pub doc_label: String,
}

impl MetaEvent {
    /// The page to open first: the announced one, else the first cited page, else 1.
    pub fn start_page(&self) -> u32 {
        self.first_page
            .or_else(|| self.pages.first().copied())
            .unwrap_or(1)
            .max(1)
    }
}

/// One decoded line of the answer stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Meta(MetaEvent),
    Token { content: String },
}

/// Incremental NDJSON decoder.
///
/// Splits on the `\n` byte before any text decoding, so a chunk boundary may
/// fall anywhere, including inside a multi-byte character.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
    skipped: usize,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one transport chunk and returns the events of every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);
        let Some(last_newline) = self.buffer.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete
            .split(|b| *b == b'\n')
            .filter_map(|line| self.decode_line(line))
            .collect()
    }

    /// Flushes an unterminated trailing line at end of stream.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let tail = std::mem::take(&mut self.buffer);
        self.decode_line(&tail).into_iter().collect()
    }

    /// Bytes held back waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Number of malformed lines dropped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<StreamEvent> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let text = match std::str::from_utf8(raw) {
            Ok(text) => text,
            Err(err) => {
                self.skipped += 1;
                folio_warn!("dropping stream line with invalid utf-8: {}", err);
                return None;
            }
        };
        if text.trim().is_empty() {
            return None;
        }
        match serde_json::from_str::<StreamEvent>(text) {
            Ok(event) => {
                folio_trace!("stream line decoded ({} bytes)", raw.len());
                Some(event)
            }
            Err(err) => {
                self.skipped += 1;
                folio_warn!("dropping malformed stream line: {}", err);
                None
            }
        }
    }
}
