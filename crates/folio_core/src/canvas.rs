use folio_logging::folio_debug;

use crate::bus::{BusEvent, EventBus, Subscriber};
use crate::geometry::Point;
use crate::snippet::Snippet;

const PLACEMENT_ORIGIN: Point = Point::new(40.0, 40.0);
const PLACEMENT_STEP: f64 = 24.0;
const PLACEMENT_WRAP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    Draw,
    Note,
    Erase,
}

/// A snippet placed on the board.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasItem {
    pub snippet: Snippet,
    pub position: Point,
}

/// Annotation surface state: which snippets are placed, the active tool,
/// and how many strokes and notes were made.
#[derive(Debug, Default)]
pub struct CanvasBoard {
    items: Vec<CanvasItem>,
    tool: Tool,
    strokes: usize,
    notes: usize,
    placements: usize,
}

impl CanvasBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CanvasItem] {
        &self.items
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.snippet.id == id)
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn strokes(&self) -> usize {
        self.strokes
    }

    pub fn notes(&self) -> usize {
        self.notes
    }

    /// Records a finished pointer gesture with the current tool.
    pub fn commit_gesture(&mut self) {
        match self.tool {
            Tool::Draw => self.strokes += 1,
            Tool::Note => self.notes += 1,
            Tool::Erase => self.strokes = self.strokes.saturating_sub(1),
            Tool::Select => {}
        }
    }

    pub fn clear_annotations(&mut self) {
        self.strokes = 0;
        self.notes = 0;
    }

    fn place(&mut self, snippet: &Snippet) {
        if self.contains(&snippet.id) {
            return;
        }
        let step = (self.placements % PLACEMENT_WRAP) as f64 * PLACEMENT_STEP;
        self.placements += 1;
        self.items.push(CanvasItem {
            snippet: snippet.clone(),
            position: Point::new(PLACEMENT_ORIGIN.x + step, PLACEMENT_ORIGIN.y + step),
        });
        folio_debug!("canvas: placed {}", snippet.id);
    }

    fn unplace(&mut self, id: &str) {
        self.items.retain(|item| item.snippet.id != id);
    }
}

impl Subscriber for CanvasBoard {
    fn on_event(&mut self, event: &BusEvent, _bus: &mut EventBus) {
        match event {
            BusEvent::AddToCanvas { snippet } => self.place(snippet),
            BusEvent::RemoveFromCanvas { id } => self.unplace(id),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet(id: &str) -> Snippet {
        Snippet {
            id: id.to_string(),
            name: "Snippet 1".to_string(),
            data_url: "data:image/png;base64,".to_string(),
            source_page: 1,
            is_active: true,
        }
    }

    #[test]
    fn add_and_remove_follow_bus_events() {
        let mut board = CanvasBoard::new();
        let mut bus = EventBus::new();
        bus.emit(BusEvent::AddToCanvas {
            snippet: snippet("a"),
        });
        bus.emit(BusEvent::AddToCanvas {
            snippet: snippet("a"),
        });
        bus.emit(BusEvent::AddToCanvas {
            snippet: snippet("b"),
        });
        bus.emit(BusEvent::RemoveFromCanvas { id: "a".into() });
        bus.emit(BusEvent::RemoveFromCanvas { id: "zzz".into() });
        bus.dispatch(&mut [&mut board]);

        let ids: Vec<_> = board.items().iter().map(|i| i.snippet.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
        assert_eq!(board.items()[0].position, Point::new(64.0, 64.0));
    }

    #[test]
    fn gestures_count_per_tool() {
        let mut board = CanvasBoard::new();
        board.commit_gesture();
        board.set_tool(Tool::Draw);
        board.commit_gesture();
        board.commit_gesture();
        board.set_tool(Tool::Note);
        board.commit_gesture();
        board.set_tool(Tool::Erase);
        board.commit_gesture();
        assert_eq!((board.strokes(), board.notes()), (1, 1));
        board.clear_annotations();
        assert_eq!((board.strokes(), board.notes()), (0, 0));
    }
}
