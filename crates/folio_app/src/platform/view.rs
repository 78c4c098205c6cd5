use std::io::{self, Write};

use folio_core::{BookmarkNode, BusEvent, CanvasBoard, Message, QuerySeq, Snippet};
use folio_engine::decode_png_data_url;

/// Echoes the streaming answer as it grows, printing only what is new.
#[derive(Debug, Default)]
pub struct AnswerPrinter {
    seq: Option<QuerySeq>,
    summary_shown: bool,
    printed: usize,
}

impl AnswerPrinter {
    pub fn start(&mut self, seq: QuerySeq) {
        self.seq = Some(seq);
        self.summary_shown = false;
        self.printed = 0;
    }

    pub fn update(&mut self, seq: QuerySeq, message: &Message, out: &mut dyn Write) -> io::Result<()> {
        if self.seq != Some(seq) {
            return Ok(());
        }
        if !self.summary_shown {
            if let Some(summary) = &message.summary {
                writeln!(out, "[{summary}]")?;
                self.summary_shown = true;
            }
        }
        if let Some(new_text) = message.text.get(self.printed..).filter(|t| !t.is_empty()) {
            write!(out, "{new_text}")?;
            self.printed = message.text.len();
        }
        out.flush()
    }

    pub fn finish(&mut self, seq: QuerySeq, message: &Message, out: &mut dyn Write) -> io::Result<()> {
        if self.seq != Some(seq) {
            return Ok(());
        }
        self.update(seq, message, out)?;
        if let Some(error) = &message.error {
            write!(out, "{error}")?;
        }
        writeln!(out)?;
        self.seq = None;
        Ok(())
    }

    /// Stops echoing without an error marker.
    pub fn abandon(&mut self, out: &mut dyn Write) -> io::Result<()> {
        if self.seq.take().is_some() {
            writeln!(out, " (cancelled)")?;
        }
        Ok(())
    }
}

pub fn render_tree(tree: &[BookmarkNode], out: &mut dyn Write) -> io::Result<()> {
    if tree.is_empty() {
        return writeln!(out, "(no bookmarks)");
    }
    for node in tree {
        match node {
            BookmarkNode::Folder(folder) => {
                writeln!(out, "[{}] {}/", folder.id, folder.name)?;
                for child in &folder.children {
                    writeln!(out, "    {}", snippet_line(child))?;
                }
            }
            BookmarkNode::Snippet(snippet) => writeln!(out, "{}", snippet_line(snippet))?,
        }
    }
    Ok(())
}

fn snippet_line(snippet: &Snippet) -> String {
    let image = match decode_png_data_url(&snippet.data_url) {
        Ok(image) => format!("{}x{}", image.width(), image.height()),
        Err(_) => "unreadable image".to_string(),
    };
    format!(
        "{} [{}] {} (page {}, {})",
        if snippet.is_active { "*" } else { "-" },
        snippet.id,
        snippet.name,
        snippet.source_page,
        image
    )
}

pub fn render_canvas(canvas: &CanvasBoard, out: &mut dyn Write) -> io::Result<()> {
    writeln!(
        out,
        "tool {:?}, {} strokes, {} notes",
        canvas.tool(),
        canvas.strokes(),
        canvas.notes()
    )?;
    if canvas.items().is_empty() {
        return writeln!(out, "(canvas empty)");
    }
    for item in canvas.items() {
        writeln!(
            out,
            "  {} at ({:.0}, {:.0})",
            item.snippet.name, item.position.x, item.position.y
        )?;
    }
    Ok(())
}

/// One-line notice for bus traffic the user should see.
pub fn describe_event(event: &BusEvent) -> Option<String> {
    match event {
        BusEvent::RagMeta {
            doc_label,
            first_page,
            ..
        } => Some(format!("viewer: {doc_label} at page {first_page}")),
        BusEvent::JumpToPage { page } => Some(format!("viewer: jump to page {page}")),
        BusEvent::SnippetCreated { id, name, .. } => Some(format!("bookmarked {name} as {id}")),
        BusEvent::AddToCanvas { snippet } => Some(format!("canvas: + {}", snippet.name)),
        BusEvent::RemoveFromCanvas { id } => Some(format!("canvas: - {id}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{EventBus, StreamingAnswer};

    #[test]
    fn printer_emits_only_the_new_suffix() {
        let mut answer = StreamingAnswer::new();
        let mut bus = EventBus::new();
        let ticket = answer.submit("doc", "q").unwrap();
        let mut printer = AnswerPrinter::default();
        let mut out = Vec::new();
        printer.start(ticket.seq);

        answer.on_chunk(
            ticket.seq,
            b"{\"type\":\"meta\",\"pages\":[1,4]}\n{\"type\":\"token\",\"content\":\"Hel\"}\n",
            &mut bus,
        );
        printer
            .update(ticket.seq, answer.transcript().last().unwrap(), &mut out)
            .unwrap();
        answer.on_chunk(ticket.seq, b"{\"type\":\"token\",\"content\":\"lo\"}\n", &mut bus);
        answer.on_failed(ticket.seq, "network error");
        printer
            .finish(ticket.seq, answer.transcript().last().unwrap(), &mut out)
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[Answer found on pages: 1, 4]\nHello [Error: network error]\n"
        );
    }
}
