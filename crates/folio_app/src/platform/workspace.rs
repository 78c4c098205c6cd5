use std::io::{self, Write};

use folio_core::{
    BookmarkError, BookmarkStorage, BookmarkStore, CanvasBoard, EventBus, PageScheduler, Point,
    SnippetEncoder, SnippetExtractor, StreamingAnswer, Subscriber, ViewerGeometry,
};
use folio_engine::EngineEvent;
use folio_logging::folio_debug;

use super::commands::{parse_command, Command, ParseError, HELP};
use super::effects::{run_viewer_effects, EngineRequests};
use super::view::{describe_event, render_canvas, render_tree, AnswerPrinter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// All client components plus the bus that couples them. Input lines and
/// engine events go in; text for the console comes out.
pub struct Workspace<S: BookmarkStorage> {
    answer: StreamingAnswer,
    viewer: PageScheduler,
    extractor: SnippetExtractor,
    bookmarks: BookmarkStore<S>,
    canvas: CanvasBoard,
    bus: EventBus,
    encoder: Box<dyn SnippetEncoder>,
    printer: AnswerPrinter,
    pending_delete: Option<(String, Option<String>)>,
}

impl<S: BookmarkStorage> Workspace<S> {
    pub fn new(
        viewer: PageScheduler,
        extractor: SnippetExtractor,
        bookmarks: BookmarkStore<S>,
        encoder: Box<dyn SnippetEncoder>,
    ) -> Self {
        Self {
            answer: StreamingAnswer::new(),
            viewer,
            extractor,
            bookmarks,
            canvas: CanvasBoard::new(),
            bus: EventBus::new(),
            encoder,
            printer: AnswerPrinter::default(),
            pending_delete: None,
        }
    }

    pub fn handle_line(
        &mut self,
        line: &str,
        engine: &dyn EngineRequests,
        out: &mut dyn Write,
    ) -> io::Result<Flow> {
        if let Some((id, parent)) = self.pending_delete.take() {
            let confirmed = line.trim().eq_ignore_ascii_case("y");
            match self
                .bookmarks
                .delete(&id, parent.as_deref(), confirmed, &mut self.bus)
            {
                Ok(node) => writeln!(out, "deleted {}", node.name())?,
                Err(BookmarkError::NotConfirmed) => writeln!(out, "kept {id}")?,
                Err(err) => writeln!(out, "{err}")?,
            }
            self.settle(engine, out)?;
            return Ok(Flow::Continue);
        }

        let command = match parse_command(line) {
            Ok(command) => command,
            Err(ParseError::Empty) => return Ok(Flow::Continue),
            Err(err) => {
                writeln!(out, "{err}")?;
                return Ok(Flow::Continue);
            }
        };
        if command == Command::Quit {
            return Ok(Flow::Quit);
        }
        self.run_command(command, engine, out)?;
        self.settle(engine, out)?;
        Ok(Flow::Continue)
    }

    fn run_command(
        &mut self,
        command: Command,
        engine: &dyn EngineRequests,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        match command {
            Command::SelectDocument(id) => {
                writeln!(out, "document: {id}")?;
                self.answer.select_document(Some(id));
            }
            Command::Ask(question) => {
                self.answer.set_question(question);
                match self.answer.submit_current() {
                    Ok(ticket) => {
                        if let Some(previous) = ticket.superseded {
                            engine.cancel(previous);
                            self.printer.abandon(out)?;
                        }
                        writeln!(out, "> {}", ticket.question)?;
                        self.printer.start(ticket.seq);
                        engine.ask(&ticket);
                    }
                    Err(err) => writeln!(out, "cannot ask: {err}")?,
                }
            }
            Command::Cancel => {
                if let Some(seq) = self.answer.cancel() {
                    engine.cancel(seq);
                    self.printer.abandon(out)?;
                }
            }
            Command::Page(text) => {
                if let Err(err) = self.viewer.go_to_page_text(&text) {
                    writeln!(out, "{err}; {}", self.viewer.status_line())?;
                }
            }
            Command::Cite(page) => {
                if let Err(err) = self.answer.cite(page, &mut self.bus) {
                    writeln!(out, "{err}")?;
                }
            }
            Command::Next => self.viewer.next(),
            Command::Prev => self.viewer.previous(),
            Command::ZoomIn => self.viewer.zoom_in(),
            Command::ZoomOut => self.viewer.zoom_out(),
            Command::Snip(on) => {
                self.extractor.set_enabled(on);
                writeln!(out, "snippet tool {}", if on { "armed" } else { "off" })?;
            }
            Command::Drag { from, to } => self.drag(from, to, out)?,
            Command::Folder(name) => match self.bookmarks.create_folder(&name) {
                Ok(id) => writeln!(out, "folder {id}")?,
                Err(err) => writeln!(out, "{err}")?,
            },
            Command::Move { id, folder, from } => {
                match self.bookmarks.move_to_folder(&id, from.as_deref(), &folder) {
                    Ok(true) => writeln!(out, "moved {id} into {folder}")?,
                    Ok(false) => writeln!(out, "{id} is already in {folder}")?,
                    Err(err) => writeln!(out, "{err}")?,
                }
            }
            Command::Unfile { id, from } => match self.bookmarks.move_to_root(&id, &from) {
                Ok(()) => writeln!(out, "moved {id} to the top level")?,
                Err(err) => writeln!(out, "{err}")?,
            },
            Command::Toggle { id, parent } => {
                if let Err(err) = self
                    .bookmarks
                    .toggle_active(&id, parent.as_deref(), &mut self.bus)
                {
                    writeln!(out, "{err}")?;
                }
            }
            Command::Rename { id, name, parent } => {
                match self.bookmarks.rename(&id, parent.as_deref(), Some(&name)) {
                    Ok(_) => writeln!(out, "renamed {id}")?,
                    Err(err) => writeln!(out, "{err}")?,
                }
            }
            Command::Remove { id, parent } => {
                if self.bookmarks.contains(&id) {
                    writeln!(out, "delete {id}? [y/N]")?;
                    self.pending_delete = Some((id, parent));
                } else {
                    writeln!(out, "{}", BookmarkError::NotFound(id))?;
                }
            }
            Command::Tool(tool) => {
                self.canvas.set_tool(tool);
                writeln!(out, "canvas tool {tool:?}")?;
            }
            Command::Mark => self.canvas.commit_gesture(),
            Command::ClearCanvas => {
                self.canvas.clear_annotations();
                writeln!(out, "annotations cleared")?;
            }
            Command::Tree => render_tree(&self.bookmarks.snapshot(), out)?,
            Command::Canvas => render_canvas(&self.canvas, out)?,
            Command::Status => {
                writeln!(out, "{}", self.viewer.status_line())?;
                writeln!(
                    out,
                    "document: {}, snippet tool: {}, answering: {}",
                    self.answer.selected_document().unwrap_or("(none)"),
                    if self.extractor.is_enabled() { "armed" } else { "off" },
                    self.answer.is_streaming()
                )?;
            }
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => {}
        }
        Ok(())
    }

    /// Synthetic pointer drag over the displayed page, which the console
    /// shows unscrolled at one CSS pixel per surface pixel.
    fn drag(&mut self, from: Point, to: Point, out: &mut dyn Write) -> io::Result<()> {
        let Some(size) = self.viewer.surface().map(|surface| surface.size()) else {
            return writeln!(out, "no page is rendered");
        };
        let geometry = ViewerGeometry {
            displayed_size: size,
            ..ViewerGeometry::default()
        };
        if !self.extractor.begin_selection(from, &geometry) {
            return writeln!(out, "snippet tool is off; use `snip on`");
        }
        self.extractor.update_selection(to, &geometry);
        let surface = self.viewer.surface().zip(self.viewer.surface_page());
        let snippet = self.extractor.end_selection(
            to,
            &geometry,
            surface,
            self.encoder.as_ref(),
            &mut self.bus,
        );
        if snippet.is_none() {
            writeln!(out, "no snippet taken")?;
        }
        Ok(())
    }

    pub fn handle_engine_event(
        &mut self,
        event: EngineEvent,
        engine: &dyn EngineRequests,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        match event {
            EngineEvent::AnswerChunk { seq, chunk } => {
                self.answer.on_chunk(seq, &chunk, &mut self.bus);
                if let Some(message) = self.answer.transcript().last() {
                    self.printer.update(seq, message, out)?;
                }
            }
            EngineEvent::AnswerFinished { seq, bytes } => {
                folio_debug!("stream q{} delivered {} bytes", seq, bytes);
                self.answer.on_finished(seq, &mut self.bus);
                if let Some(message) = self.answer.transcript().last() {
                    self.printer.finish(seq, message, out)?;
                }
            }
            EngineEvent::AnswerFailed { seq, error } => {
                self.answer.on_failed(seq, &error.to_string());
                if let Some(message) = self.answer.transcript().last() {
                    self.printer.finish(seq, message, out)?;
                }
            }
            EngineEvent::AnswerCancelled { seq } => self.answer.on_cancelled(seq),
            EngineEvent::DocumentLoaded {
                generation,
                total_pages,
            } => {
                self.viewer.load_succeeded(generation, total_pages);
                writeln!(out, "{}", self.viewer.status_line())?;
            }
            EngineEvent::DocumentFailed { generation, reason } => {
                let before = self.viewer.generation();
                self.viewer.load_failed(generation, &reason);
                if generation == before {
                    writeln!(out, "{}", self.viewer.status_line())?;
                }
            }
            EngineEvent::PageRendered {
                generation,
                page,
                surface,
            } => {
                self.viewer.render_finished(generation, page, surface);
                if self.viewer.surface_page() == Some(page) && !self.viewer.is_rendering() {
                    writeln!(out, "{}", self.viewer.status_line())?;
                }
            }
            EngineEvent::RenderFailed {
                generation,
                page,
                reason,
            } => self.viewer.render_failed(generation, page, &reason),
        }
        self.settle(engine, out)
    }

    /// Delivers bus traffic, then hands any viewer work to the engine.
    fn settle(&mut self, engine: &dyn EngineRequests, out: &mut dyn Write) -> io::Result<()> {
        let subscribers: &mut [&mut dyn Subscriber] =
            &mut [&mut self.viewer, &mut self.bookmarks, &mut self.canvas];
        for event in self.bus.dispatch(subscribers) {
            if let Some(line) = describe_event(&event) {
                writeln!(out, "{line}")?;
            }
        }
        run_viewer_effects(self.viewer.take_effects(), engine);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use folio_core::{
        IdGenerator, LoadTicket, MemoryStorage, QueryTicket, RasterSurface, RenderRequest,
    };
    use folio_engine::PngDataUrlEncoder;
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Default)]
    struct RecordingEngine {
        log: RefCell<Vec<String>>,
    }

    impl RecordingEngine {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.log.borrow_mut())
        }
    }

    impl EngineRequests for RecordingEngine {
        fn ask(&self, ticket: &QueryTicket) {
            self.log.borrow_mut().push(format!(
                "ask {} {} {}",
                ticket.seq, ticket.doc_id, ticket.question
            ));
        }

        fn cancel(&self, seq: u64) {
            self.log.borrow_mut().push(format!("cancel {seq}"));
        }

        fn load_document(&self, ticket: &LoadTicket) {
            self.log
                .borrow_mut()
                .push(format!("load {} {}", ticket.generation, ticket.url));
        }

        fn render(&self, request: RenderRequest) {
            self.log
                .borrow_mut()
                .push(format!("render {} page {}", request.generation, request.page));
        }
    }

    fn workspace() -> Workspace<MemoryStorage> {
        folio_logging::initialize_for_tests();
        Workspace::new(
            PageScheduler::new(1.0),
            SnippetExtractor::new(IdGenerator::new("snip", || 5_i64)),
            BookmarkStore::open(MemoryStorage::new(), IdGenerator::new("folder", || 6_i64)),
            Box::new(PngDataUrlEncoder),
        )
    }

    fn run(ws: &mut Workspace<MemoryStorage>, engine: &RecordingEngine, line: &str) -> String {
        let mut out = Vec::new();
        ws.handle_line(line, engine, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn deliver(ws: &mut Workspace<MemoryStorage>, engine: &RecordingEngine, event: EngineEvent) -> String {
        let mut out = Vec::new();
        ws.handle_engine_event(event, engine, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    const ANSWER: &[u8] = b"{\"type\":\"meta\",\"pages\":[4,2],\"pdf_url\":\"https://blob.example/q3.pdf\",\"doc_label\":\"Q3\"}\n{\"type\":\"token\",\"content\":\"See page 4.\"}\n";

    #[test]
    fn answer_stream_opens_the_cited_document() {
        let mut ws = workspace();
        let engine = RecordingEngine::default();

        assert!(run(&mut ws, &engine, "ask What changed?").starts_with("cannot ask"));
        run(&mut ws, &engine, "doc q3");
        run(&mut ws, &engine, "ask What changed?");
        assert_eq!(engine.take(), vec!["ask 1 q3 What changed?"]);

        let out = deliver(
            &mut ws,
            &engine,
            EngineEvent::AnswerChunk {
                seq: 1,
                chunk: ANSWER.to_vec().into(),
            },
        );
        assert!(out.contains("See page 4."));
        assert!(out.contains("viewer: Q3 at page 4"));
        assert_eq!(engine.take(), vec!["load 1 https://blob.example/q3.pdf"]);

        let out = deliver(&mut ws, &engine, EngineEvent::AnswerFinished { seq: 1, bytes: 90 });
        assert_eq!(out, "\n");

        let out = deliver(
            &mut ws,
            &engine,
            EngineEvent::DocumentLoaded {
                generation: 1,
                total_pages: 9,
            },
        );
        assert_eq!(out, "Page 4 of 9\n");
        assert_eq!(engine.take(), vec!["render 1 page 4"]);

        deliver(
            &mut ws,
            &engine,
            EngineEvent::PageRendered {
                generation: 1,
                page: 4,
                surface: RasterSurface::blank(2, 2),
            },
        );
        assert_eq!(run(&mut ws, &engine, "cite 2"), "viewer: jump to page 2\n");
        assert_eq!(engine.take(), vec!["render 1 page 2"]);
        assert_eq!(
            run(&mut ws, &engine, "cite 9"),
            "page 9 is not among the cited pages\n"
        );
        assert!(engine.take().is_empty());
    }

    #[test]
    fn superseded_and_cancelled_questions_reach_the_engine() {
        let mut ws = workspace();
        let engine = RecordingEngine::default();
        run(&mut ws, &engine, "doc q3");
        run(&mut ws, &engine, "ask first");
        let out = run(&mut ws, &engine, "ask second");
        assert!(out.starts_with(" (cancelled)\n"));
        let out = run(&mut ws, &engine, "cancel");
        assert_eq!(out, " (cancelled)\n");
        assert_eq!(
            engine.take(),
            vec!["ask 1 q3 first", "cancel 1", "ask 2 q3 second", "cancel 2"]
        );

        // A late chunk of the cancelled stream prints nothing.
        let out = deliver(
            &mut ws,
            &engine,
            EngineEvent::AnswerChunk {
                seq: 2,
                chunk: ANSWER.to_vec().into(),
            },
        );
        assert_eq!(out, "");
        assert!(engine.take().is_empty());

        let mut sink = Vec::new();
        assert_eq!(ws.handle_line("quit", &engine, &mut sink).unwrap(), Flow::Quit);
    }

    #[test]
    fn dragged_snippet_is_bookmarked_and_toggled_onto_the_canvas() {
        let mut ws = workspace();
        let engine = RecordingEngine::default();

        assert_eq!(run(&mut ws, &engine, "drag 10 10 50 40"), "no page is rendered\n");

        ws.viewer.load_document("https://blob.example/a.pdf", 1, "A");
        deliver(
            &mut ws,
            &engine,
            EngineEvent::DocumentLoaded {
                generation: 1,
                total_pages: 3,
            },
        );
        deliver(
            &mut ws,
            &engine,
            EngineEvent::PageRendered {
                generation: 1,
                page: 1,
                surface: RasterSurface::blank(200, 100),
            },
        );
        assert_eq!(
            engine.take(),
            vec!["load 1 https://blob.example/a.pdf", "render 1 page 1"]
        );

        assert_eq!(
            run(&mut ws, &engine, "drag 10 10 50 40"),
            "snippet tool is off; use `snip on`\n"
        );
        run(&mut ws, &engine, "snip on");
        let out = run(&mut ws, &engine, "drag 10 10 50 40");
        assert_eq!(out, "bookmarked Snippet 1 as snip-5-0\n");
        assert!(!ws.extractor.is_enabled());
        assert_eq!(
            run(&mut ws, &engine, "tree"),
            "- [snip-5-0] Snippet 1 (page 1, 40x30)\n"
        );

        assert_eq!(run(&mut ws, &engine, "toggle snip-5-0"), "canvas: + Snippet 1\n");
        assert!(ws.canvas.contains("snip-5-0"));

        assert_eq!(run(&mut ws, &engine, "rm snip-5-0"), "delete snip-5-0? [y/N]\n");
        assert_eq!(run(&mut ws, &engine, "n"), "kept snip-5-0\n");
        run(&mut ws, &engine, "rm snip-5-0");
        assert_eq!(
            run(&mut ws, &engine, "y"),
            "deleted Snippet 1\ncanvas: - snip-5-0\n"
        );
        assert!(ws.canvas.items().is_empty());
        assert_eq!(run(&mut ws, &engine, "tree"), "(no bookmarks)\n");
    }

    #[test]
    fn bad_input_is_reported_without_side_effects() {
        let mut ws = workspace();
        let engine = RecordingEngine::default();
        assert_eq!(run(&mut ws, &engine, ""), "");
        assert_eq!(
            run(&mut ws, &engine, "fly away"),
            "unknown command \"fly\"; try `help`\n"
        );
        assert_eq!(
            run(&mut ws, &engine, "page 3"),
            format!("{}; No document\n", ws.viewer.go_to_page_text("3").unwrap_err())
        );
        assert_eq!(run(&mut ws, &engine, "rm ghost"), "bookmark ghost not found\n");
        assert!(engine.take().is_empty());
    }

    #[test]
    fn canvas_tools_count_annotations() {
        let mut ws = workspace();
        let engine = RecordingEngine::default();
        assert_eq!(run(&mut ws, &engine, "tool draw"), "canvas tool Draw\n");
        run(&mut ws, &engine, "mark");
        run(&mut ws, &engine, "mark");
        run(&mut ws, &engine, "tool note");
        run(&mut ws, &engine, "mark");
        run(&mut ws, &engine, "tool erase");
        run(&mut ws, &engine, "mark");
        assert_eq!(
            run(&mut ws, &engine, "canvas"),
            "tool Erase, 1 strokes, 1 notes\n(canvas empty)\n"
        );
        assert_eq!(run(&mut ws, &engine, "clear"), "annotations cleared\n");
        assert_eq!((ws.canvas.strokes(), ws.canvas.notes()), (0, 0));
    }
}
