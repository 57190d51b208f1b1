use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

struct InputState {
    value: String,
    enabled: bool,
    focused: bool,
}

/// The chat text field. User edits are dropped while it is disabled.
pub struct ChatInput {
    state: Mutex<InputState>,
}

impl ChatInput {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InputState {
                value: String::new(),
                enabled: true,
                focused: true,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, InputState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn value(&self) -> String {
        self.state().value.clone()
    }

    /// Replace the text as the user would. Returns false if the field is disabled.
    pub fn set_value(&self, value: &str) -> bool {
        let mut state = self.state();
        if !state.enabled {
            return false;
        }
        state.value = value.to_string();
        true
    }

    pub fn type_char(&self, c: char) -> bool {
        let mut state = self.state();
        if !state.enabled {
            return false;
        }
        state.value.push(c);
        true
    }

    pub fn backspace(&self) -> bool {
        let mut state = self.state();
        if !state.enabled {
            return false;
        }
        state.value.pop();
        true
    }

    pub fn clear(&self) {
        self.state().value.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state().enabled = enabled;
    }

    pub fn is_focused(&self) -> bool {
        self.state().focused
    }

    pub fn focus(&self) {
        self.state().focused = true;
    }

    pub fn blur(&self) {
        self.state().focused = false;
    }
}

impl Default for ChatInput {
    fn default() -> Self {
        Self::new()
    }
}

struct SelectorState {
    value: String,
    enabled: bool,
}

/// Native stand-in for a file picker: the paths the user has typed so far.
/// Locked while its own upload is in flight.
pub struct FileSelector {
    state: Mutex<SelectorState>,
}

impl FileSelector {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SelectorState {
                value: String::new(),
                enabled: true,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SelectorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn value(&self) -> String {
        self.state().value.clone()
    }

    /// Returns false if the selector is locked.
    pub fn set_value(&self, value: &str) -> bool {
        let mut state = self.state();
        if !state.enabled {
            return false;
        }
        state.value = value.to_string();
        true
    }

    pub fn type_char(&self, c: char) -> bool {
        let mut state = self.state();
        if !state.enabled {
            return false;
        }
        state.value.push(c);
        true
    }

    pub fn backspace(&self) -> bool {
        let mut state = self.state();
        if !state.enabled {
            return false;
        }
        state.value.pop();
        true
    }

    /// Whitespace-separated paths currently selected.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.state().value.split_whitespace().map(PathBuf::from).collect()
    }

    /// Clear the selection so the same files can be picked again.
    pub fn reset(&self) {
        self.state().value.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state().enabled = enabled;
    }
}

impl Default for FileSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
pub struct LoadingIndicator {
    visible: AtomicBool,
}

impl LoadingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self) {
        self.visible.store(true, Ordering::SeqCst);
    }

    pub fn hide(&self) {
        self.visible.store(false, Ordering::SeqCst);
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }
}

enum Release {
    Chat(Arc<ChatInput>),
    Upload(Arc<FileSelector>),
}

/// Pending-request state for one flow. Dropping it hides the loading
/// indicator (if this flow showed it) and hands the flow's own control back
/// to the user.
pub struct PendingGuard {
    loading: Arc<LoadingIndicator>,
    showed_loading: AtomicBool,
    release: Release,
}

impl PendingGuard {
    /// Disables the chat input until the guard is dropped.
    pub fn chat(loading: Arc<LoadingIndicator>, input: Arc<ChatInput>) -> Self {
        input.set_enabled(false);
        Self {
            loading,
            showed_loading: AtomicBool::new(false),
            release: Release::Chat(input),
        }
    }

    /// Locks the file selector until the guard is dropped.
    pub fn upload(loading: Arc<LoadingIndicator>, selector: Arc<FileSelector>) -> Self {
        selector.set_enabled(false);
        Self {
            loading,
            showed_loading: AtomicBool::new(false),
            release: Release::Upload(selector),
        }
    }

    pub fn show_loading(&self) {
        self.showed_loading.store(true, Ordering::SeqCst);
        self.loading.show();
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.showed_loading.load(Ordering::SeqCst) {
            self.loading.hide();
        }
        match &self.release {
            Release::Chat(input) => {
                input.set_enabled(true);
                input.focus();
            }
            Release::Upload(selector) => {
                selector.reset();
                selector.set_enabled(true);
            }
        }
    }
}
