use crate::session::{ChatOutcome, UploadOutcome};

/// Which control receives typed characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusedField {
    Chat,
    Files,
}

/// Results sent back to the render loop by spawned flows.
#[derive(Clone, Debug)]
pub enum AppMessage {
    ChatSettled(ChatOutcome),
    UploadSettled(UploadOutcome),
    DocumentsRefreshed(bool),
    UnreadableFiles(usize),
}
