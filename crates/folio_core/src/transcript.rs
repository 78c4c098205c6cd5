#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry. Assistant text grows in place as tokens arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub page_meta: Option<Vec<u32>>,
    /// One-line page summary rendered above the answer body.
    pub summary: Option<String>,
    /// Inline failure marker, shown after the text.
    pub error: Option<String>,
    pub pending: bool,
}

impl Message {
    fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            page_meta: None,
            summary: None,
            error: None,
            pending: false,
        }
    }

    fn pending_assistant() -> Self {
        Self {
            role: Role::Assistant,
            text: String::new(),
            page_meta: None,
            summary: None,
            error: None,
            pending: true,
        }
    }

    /// Text as displayed: summary line, body, then any error marker.
    pub fn display_text(&self) -> String {
        let mut out = String::new();
        if let Some(summary) = &self.summary {
            out.push_str(summary);
            out.push('\n');
        }
        out.push_str(&self.text);
        if let Some(error) = &self.error {
            out.push_str(error);
        }
        out
    }
}

/// Session-lived ordered list of messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Appends the question and an empty pending answer; returns the answer's index.
    pub(crate) fn open_exchange(&mut self, question: &str) -> usize {
        self.messages.push(Message::user(question));
        self.messages.push(Message::pending_assistant());
        self.messages.len() - 1
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Message> {
        self.messages.get_mut(index)
    }
}

pub(crate) fn page_summary(pages: &[u32]) -> String {
    if pages.is_empty() {
        return "No specific pages referenced.".to_string();
    }
    let list = pages
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("Answer found on pages: {list}")
}
