use std::sync::Arc;

use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::mpsc;

use crate::config::TuiConfig;
use crate::files;
use crate::session::{ChatOutcome, SessionController, UploadOutcome};
use crate::views::{DocumentList, Role, Transcript};

use super::types::{AppMessage, FocusedField};

const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];
const PAGE_LINES: u16 = 10;

pub struct App {
    // Shared with the controller
    pub controller: Arc<SessionController>,
    pub transcript: Arc<Transcript>,
    pub documents: Arc<DocumentList>,

    // UI state
    pub status_message: String,
    pub current_time: String,
    pub server_url: String,
    pub show_documents: bool,
    pub spinner_frame: usize,

    // Message channel
    pub tx: mpsc::UnboundedSender<AppMessage>,
    pub rx: Option<mpsc::UnboundedReceiver<AppMessage>>,

    pub should_quit: bool,
}

impl App {
    pub fn new(
        controller: Arc<SessionController>,
        transcript: Arc<Transcript>,
        documents: Arc<DocumentList>,
        server_url: &str,
        config: &TuiConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            controller,
            transcript,
            documents,
            status_message: "Ready - Enter to send, Tab for files, Esc to quit".to_string(),
            current_time: Local::now().format("%H:%M:%S").to_string(),
            server_url: server_url.to_string(),
            show_documents: config.show_documents,
            spinner_frame: 0,
            tx,
            rx: Some(rx),
            should_quit: false,
        }
    }

    pub fn update_time(&mut self) {
        self.current_time = Local::now().format("%H:%M:%S").to_string();
    }

    pub fn is_loading(&self) -> bool {
        self.controller.session().loading.is_visible()
    }

    pub fn tick_spinner(&mut self) {
        if self.is_loading() {
            self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
        }
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER_FRAMES[self.spinner_frame]
    }

    /// Keys go to the chat input whenever it holds focus. Settling a chat
    /// hands focus back to it.
    pub fn focused(&self) -> FocusedField {
        if self.controller.session().chat_input.is_focused() {
            FocusedField::Chat
        } else {
            FocusedField::Files
        }
    }

    pub fn focus_next_field(&mut self) {
        let chat_input = &self.controller.session().chat_input;
        match self.focused() {
            FocusedField::Chat => chat_input.blur(),
            FocusedField::Files => chat_input.focus(),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => self.should_quit = true,
                KeyCode::Char('n') => {
                    self.controller.new_conversation();
                    self.status_message = "Started a new conversation".to_string();
                }
                KeyCode::Char('r') => self.spawn_refresh(),
                KeyCode::Char('a') => {
                    let on = self.transcript.toggle_auto_scroll();
                    self.status_message = format!("Auto-scroll: {}", if on { "ON" } else { "OFF" });
                }
                _ => {}
            }
            return;
        }

        let session = self.controller.session().clone();
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::BackTab => self.focus_next_field(),
            KeyCode::Enter => self.submit_focused(),
            KeyCode::Backspace => {
                match self.focused() {
                    FocusedField::Chat => session.chat_input.backspace(),
                    FocusedField::Files => session.file_selector.backspace(),
                };
            }
            KeyCode::Char(c) => {
                match self.focused() {
                    FocusedField::Chat => session.chat_input.type_char(c),
                    FocusedField::Files => session.file_selector.type_char(c),
                };
            }
            KeyCode::PageUp => self.transcript.scroll_up(PAGE_LINES),
            KeyCode::PageDown => self.transcript.scroll_down(PAGE_LINES),
            KeyCode::Up => self.transcript.scroll_up(1),
            KeyCode::Down => self.transcript.scroll_down(1),
            KeyCode::End => self.transcript.scroll_to_newest(),
            _ => {}
        }
    }

    pub fn submit_focused(&mut self) {
        match self.focused() {
            FocusedField::Chat => self.submit_chat(),
            FocusedField::Files => self.submit_files(),
        }
    }

    fn submit_chat(&mut self) {
        // The input is taken and locked here, before anything else is handled.
        let Some(pending) = self.controller.begin_chat() else {
            return;
        };
        self.status_message = "Waiting for the assistant...".to_string();

        let controller = self.controller.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = controller.finish_chat(pending).await;
            let _ = tx.send(AppMessage::ChatSettled(outcome));
        });
    }

    fn submit_files(&mut self) {
        // Locked here so a second Enter cannot send the same files again.
        let Some(pending) = self.controller.begin_upload() else {
            return;
        };
        self.status_message = format!("Reading {} files...", pending.paths.len());

        let controller = self.controller.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let (selected, failures) = files::read_selection(&pending.paths).await;
            let log = &controller.session().log;
            for (path, e) in &failures {
                log.append(&format!("Could not read {}: {:#}", path.display(), e), Role::Assistant);
            }
            if selected.is_empty() {
                drop(pending);
                let _ = tx.send(AppMessage::UnreadableFiles(failures.len()));
                return;
            }
            if !failures.is_empty() {
                let _ = tx.send(AppMessage::UnreadableFiles(failures.len()));
            }

            let outcome = controller.finish_upload(pending, selected).await;
            let _ = tx.send(AppMessage::UploadSettled(outcome));
        });
    }

    pub fn spawn_refresh(&mut self) {
        self.status_message = "Refreshing documents...".to_string();
        let controller = self.controller.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let refreshed = controller.refresh_documents().await;
            let _ = tx.send(AppMessage::DocumentsRefreshed(refreshed));
        });
    }

    pub fn handle_message(&mut self, message: AppMessage) {
        self.status_message = match message {
            AppMessage::ChatSettled(outcome) => match outcome {
                ChatOutcome::Answered => "Ready".to_string(),
                ChatOutcome::Ignored => return,
                ChatOutcome::SoftFailure => "The assistant could not answer".to_string(),
                ChatOutcome::TransportFailure => "Chat request failed - see log".to_string(),
            },
            AppMessage::UploadSettled(outcome) => match outcome {
                UploadOutcome::Uploaded => "Upload complete".to_string(),
                UploadOutcome::Rejected => "Only PDF files can be uploaded".to_string(),
                UploadOutcome::Refused => "The server refused the upload".to_string(),
                UploadOutcome::TransportFailure => "Upload failed - see log".to_string(),
                UploadOutcome::Ignored => return,
            },
            AppMessage::DocumentsRefreshed(true) => format!("{} documents on server", self.documents.len()),
            AppMessage::DocumentsRefreshed(false) => "Could not refresh documents - see log".to_string(),
            AppMessage::UnreadableFiles(count) => format!("{} files could not be read", count),
        };
    }
}
