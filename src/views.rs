use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Local};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Assistant",
        }
    }
}

/// One entry in the transcript. Never mutated after it is appended.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Local>,
}

/// Append-only view over the conversation.
pub trait MessageLog: Send + Sync {
    /// Append a turn and bring it into view.
    fn append(&self, text: &str, role: Role);
}

/// View over the documents the server has processed.
pub trait DocumentRegistry: Send + Sync {
    /// Drop whatever is shown and show exactly `names`, in order.
    fn replace_all(&self, names: &[String]);
}

struct TranscriptState {
    turns: Vec<ChatTurn>,
    // Lines scrolled up from the newest turn; 0 keeps the newest turn visible.
    offset_from_bottom: u16,
    auto_scroll: bool,
}

/// In-memory transcript shared between the controller and a front-end.
pub struct Transcript {
    state: Mutex<TranscriptState>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::with_auto_scroll(true)
    }

    pub fn with_auto_scroll(auto_scroll: bool) -> Self {
        Self {
            state: Mutex::new(TranscriptState {
                turns: Vec::new(),
                offset_from_bottom: 0,
                auto_scroll,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, TranscriptState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn turns(&self) -> Vec<ChatTurn> {
        self.state().turns.clone()
    }

    /// Turns appended at or after `index`, for front-ends that print incrementally.
    pub fn turns_since(&self, index: usize) -> Vec<ChatTurn> {
        self.state().turns.iter().skip(index).cloned().collect()
    }

    pub fn last(&self) -> Option<ChatTurn> {
        self.state().turns.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.state().turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().turns.is_empty()
    }

    pub fn offset_from_bottom(&self) -> u16 {
        self.state().offset_from_bottom
    }

    pub fn scroll_up(&self, lines: u16) {
        let mut state = self.state();
        state.offset_from_bottom = state.offset_from_bottom.saturating_add(lines);
    }

    pub fn scroll_down(&self, lines: u16) {
        let mut state = self.state();
        state.offset_from_bottom = state.offset_from_bottom.saturating_sub(lines);
    }

    pub fn scroll_to_newest(&self) {
        self.state().offset_from_bottom = 0;
    }

    pub fn auto_scroll(&self) -> bool {
        self.state().auto_scroll
    }

    pub fn toggle_auto_scroll(&self) -> bool {
        let mut state = self.state();
        state.auto_scroll = !state.auto_scroll;
        if state.auto_scroll {
            state.offset_from_bottom = 0;
        }
        state.auto_scroll
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageLog for Transcript {
    fn append(&self, text: &str, role: Role) {
        let mut state = self.state();
        state.turns.push(ChatTurn {
            role,
            text: text.to_string(),
            at: Local::now(),
        });
        if state.auto_scroll {
            state.offset_from_bottom = 0;
        }
    }
}

/// In-memory list of processed document names.
#[derive(Default)]
pub struct DocumentList {
    names: Mutex<Vec<String>>,
}

impl DocumentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<String> {
        self.names
            .lock()
            .map(|names| names.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }
}

impl DocumentRegistry for DocumentList {
    fn replace_all(&self, names: &[String]) {
        let mut shown = self.names.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *shown = names.to_vec();
    }
}
