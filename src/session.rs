use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::api::{ChatRequest, DocChatApi};
use crate::controls::{ChatInput, FileSelector, LoadingIndicator, PendingGuard};
use crate::files::SelectedFile;
use crate::views::{DocumentRegistry, MessageLog, Role};

pub const CHAT_SOFT_FAILURE: &str =
    "I apologize, but I encountered an issue processing your request. Could you please rephrase your question?";
pub const CHAT_TRANSPORT_FAILURE: &str =
    "I apologize, but I encountered a technical issue. Please try again in a moment.";
pub const PDF_ONLY: &str = "Please select PDF files only.";
pub const UPLOAD_STARTED: &str = "Uploading and processing files...";
pub const UPLOAD_FAILED_PREFIX: &str = "Sorry, there was an error uploading the files: ";
pub const UPLOAD_DONE_PREFIX: &str = "Files uploaded and processed: ";
pub const UPLOAD_REFUSED_PREFIX: &str = "Error: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    /// Nothing to send.
    Ignored,
    Answered,
    /// The server replied without an answer.
    SoftFailure,
    TransportFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Ignored,
    /// No PDF in the selection; nothing was sent.
    Rejected,
    Uploaded,
    /// The server answered with `success: false`.
    Refused,
    TransportFailure,
}

/// Handles to everything a flow reads or writes, built once at startup.
#[derive(Clone)]
pub struct Session {
    pub log: Arc<dyn MessageLog>,
    pub registry: Arc<dyn DocumentRegistry>,
    pub chat_input: Arc<ChatInput>,
    pub file_selector: Arc<FileSelector>,
    pub loading: Arc<LoadingIndicator>,
}

impl Session {
    pub fn new(log: Arc<dyn MessageLog>, registry: Arc<dyn DocumentRegistry>) -> Self {
        Self {
            log,
            registry,
            chat_input: Arc::new(ChatInput::new()),
            file_selector: Arc::new(FileSelector::new()),
            loading: Arc::new(LoadingIndicator::new()),
        }
    }
}

/// A chat message that has been taken from the input but not yet answered.
/// The input stays disabled until this is dropped.
pub struct PendingChat {
    pub request: ChatRequest,
    _guard: PendingGuard,
}

/// A file selection taken from the selector. The selector stays locked until
/// this is dropped or handed to `finish_upload`.
pub struct PendingUpload {
    pub paths: Vec<PathBuf>,
    guard: PendingGuard,
}

pub struct SessionController {
    api: Arc<dyn DocChatApi>,
    session: Session,
    resume_conversation: bool,
    conversation_id: Mutex<Option<String>>,
}

impl SessionController {
    pub fn new(api: Arc<dyn DocChatApi>, session: Session, resume_conversation: bool) -> Self {
        Self {
            api,
            session,
            resume_conversation,
            conversation_id: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.conversation_id
            .lock()
            .map(|id| id.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Forget the server-side conversation; the transcript stays as it is.
    pub fn new_conversation(&self) {
        let mut id = self.conversation_id.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(old) = id.take() {
            info!("Leaving conversation {}", old);
        }
    }

    fn remember_conversation(&self, id: Option<String>) {
        if !self.resume_conversation {
            return;
        }
        if let Some(id) = id {
            let mut current = self.conversation_id.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if current.as_deref() != Some(id.as_str()) {
                debug!("Conversation id is now {}", id);
                *current = Some(id);
            }
        }
    }

    /// Initial registry load.
    pub async fn start(&self) {
        self.refresh_documents().await;
    }

    /// Type `text` into the chat input and submit it.
    pub async fn submit_text(&self, text: &str) -> ChatOutcome {
        if !self.session.chat_input.set_value(text) {
            return ChatOutcome::Ignored;
        }
        self.submit_chat().await
    }

    /// Send whatever is in the chat input.
    pub async fn submit_chat(&self) -> ChatOutcome {
        match self.begin_chat() {
            Some(pending) => self.finish_chat(pending).await,
            None => ChatOutcome::Ignored,
        }
    }

    /// Everything the chat flow does before it first waits on the network:
    /// take the input, lock it, record the user turn and show the indicator.
    pub fn begin_chat(&self) -> Option<PendingChat> {
        let message = self.session.chat_input.value().trim().to_string();
        if message.is_empty() {
            return None;
        }

        let guard = PendingGuard::chat(self.session.loading.clone(), self.session.chat_input.clone());
        self.session.log.append(&message, Role::User);
        self.session.chat_input.clear();
        guard.show_loading();

        let conversation_id = if self.resume_conversation {
            self.conversation_id()
        } else {
            None
        };

        Some(PendingChat {
            request: ChatRequest {
                message,
                conversation_id,
            },
            _guard: guard,
        })
    }

    /// Send a chat started by `begin_chat` and render the reply.
    pub async fn finish_chat(&self, pending: PendingChat) -> ChatOutcome {
        let request = &pending.request;

        info!("Sending chat message ({} chars)", request.message.len());
        let outcome = match self.api.chat(request).await {
            Ok(reply) => {
                self.remember_conversation(reply.conversation_id);
                match reply.response.filter(|text| !text.is_empty()) {
                    Some(text) => {
                        self.session.log.append(&text, Role::Assistant);
                        ChatOutcome::Answered
                    }
                    None => {
                        warn!("Chat reply had no response field");
                        self.session.log.append(CHAT_SOFT_FAILURE, Role::Assistant);
                        ChatOutcome::SoftFailure
                    }
                }
            }
            Err(e) => {
                error!("Chat request failed: {}", e);
                self.session.log.append(CHAT_TRANSPORT_FAILURE, Role::Assistant);
                ChatOutcome::TransportFailure
            }
        };

        drop(pending);
        outcome
    }

    /// Take the paths typed into the file selector and lock it. Returns None
    /// if there is nothing to take or an upload is already in flight.
    pub fn begin_upload(&self) -> Option<PendingUpload> {
        let selector = &self.session.file_selector;
        if !selector.is_enabled() {
            return None;
        }
        let paths = selector.paths();
        if paths.is_empty() {
            return None;
        }

        Some(PendingUpload {
            paths,
            guard: PendingGuard::upload(self.session.loading.clone(), selector.clone()),
        })
    }

    /// Upload the files read for a selection started by `begin_upload`.
    pub async fn finish_upload(&self, pending: PendingUpload, files: Vec<SelectedFile>) -> UploadOutcome {
        self.upload(pending.guard, files).await
    }

    /// Upload the PDF part of a file selection.
    pub async fn select_files(&self, files: Vec<SelectedFile>) -> UploadOutcome {
        if files.is_empty() {
            return UploadOutcome::Ignored;
        }
        let guard = PendingGuard::upload(self.session.loading.clone(), self.session.file_selector.clone());
        self.upload(guard, files).await
    }

    async fn upload(&self, pending: PendingGuard, files: Vec<SelectedFile>) -> UploadOutcome {
        if files.is_empty() {
            return UploadOutcome::Ignored;
        }

        let selected = files.len();
        let pdfs: Vec<SelectedFile> = files.into_iter().filter(SelectedFile::is_pdf).collect();
        if pdfs.is_empty() {
            self.session.log.append(PDF_ONLY, Role::Assistant);
            return UploadOutcome::Rejected;
        }
        if pdfs.len() < selected {
            debug!("Dropped {} non-PDF files from selection", selected - pdfs.len());
        }

        pending.show_loading();
        self.session.log.append(UPLOAD_STARTED, Role::Assistant);

        info!("Uploading {} files", pdfs.len());
        let (outcome, refresh) = match self.api.upload(&pdfs).await {
            Ok(reply) if reply.success => {
                if let Some(names) = &reply.files {
                    self.session.registry.replace_all(names);
                }
                let message = reply.message.unwrap_or_default();
                self.session
                    .log
                    .append(&format!("{}{}", UPLOAD_DONE_PREFIX, message), Role::Assistant);
                (UploadOutcome::Uploaded, true)
            }
            Ok(reply) => {
                let reason = reply.error.unwrap_or_else(|| "unknown error".to_string());
                warn!("Server refused upload: {}", reason);
                self.session
                    .log
                    .append(&format!("{}{}", UPLOAD_REFUSED_PREFIX, reason), Role::Assistant);
                (UploadOutcome::Refused, false)
            }
            Err(e) => {
                error!("Upload failed: {}", e);
                self.session
                    .log
                    .append(&format!("{}{}", UPLOAD_FAILED_PREFIX, e), Role::Assistant);
                (UploadOutcome::TransportFailure, false)
            }
        };

        // The re-fetch runs after the pending state is released.
        drop(pending);
        if refresh {
            self.refresh_documents().await;
        }

        outcome
    }

    /// Replace the registry with the server's list. Failures only reach the log.
    pub async fn refresh_documents(&self) -> bool {
        match self.api.documents().await {
            Ok(reply) => {
                debug!("Server reports {} processed documents", reply.files.len());
                self.session.registry.replace_all(&reply.files);
                true
            }
            Err(e) => {
                error!("Error fetching documents: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChatReply, DocumentsReply, HttpApi, TransportError, UploadReply};
    use crate::views::{DocumentList, Transcript};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::time::Duration;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    type Scripted<T> = Mutex<VecDeque<Result<T, TransportError>>>;

    /// Replays queued results and records what it was asked.
    #[derive(Default)]
    struct FakeApi {
        chat_replies: Scripted<ChatReply>,
        upload_replies: Scripted<UploadReply>,
        document_replies: Scripted<DocumentsReply>,
        chat_requests: Mutex<Vec<ChatRequest>>,
        uploads: Mutex<Vec<Vec<String>>>,
        document_calls: Mutex<usize>,
        loading_seen: Mutex<Vec<bool>>,
        loading: Mutex<Option<Arc<LoadingIndicator>>>,
    }

    impl FakeApi {
        fn observe_loading(&self) {
            if let Some(loading) = self.loading.lock().unwrap().as_ref() {
                self.loading_seen.lock().unwrap().push(loading.is_visible());
            }
        }
    }

    fn network_down() -> TransportError {
        TransportError::Decode(serde_json::from_str::<serde_json::Value>("{").unwrap_err())
    }

    #[async_trait]
    impl DocChatApi for FakeApi {
        async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, TransportError> {
            self.observe_loading();
            self.chat_requests.lock().unwrap().push(request.clone());
            self.chat_replies.lock().unwrap().pop_front().unwrap_or_else(|| Err(network_down()))
        }

        async fn upload(&self, files: &[SelectedFile]) -> Result<UploadReply, TransportError> {
            self.observe_loading();
            self.uploads
                .lock()
                .unwrap()
                .push(files.iter().map(|f| f.name.clone()).collect());
            self.upload_replies.lock().unwrap().pop_front().unwrap_or_else(|| Err(network_down()))
        }

        async fn documents(&self) -> Result<DocumentsReply, TransportError> {
            *self.document_calls.lock().unwrap() += 1;
            self.document_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(network_down()))
        }
    }

    struct Harness {
        api: Arc<FakeApi>,
        transcript: Arc<Transcript>,
        documents: Arc<DocumentList>,
        controller: SessionController,
    }

    fn harness(resume_conversation: bool) -> Harness {
        let api = Arc::new(FakeApi::default());
        let transcript = Arc::new(Transcript::new());
        let documents = Arc::new(DocumentList::new());
        let session = Session::new(transcript.clone(), documents.clone());
        *api.loading.lock().unwrap() = Some(session.loading.clone());
        let controller = SessionController::new(api.clone(), session, resume_conversation);
        Harness {
            api,
            transcript,
            documents,
            controller,
        }
    }

    fn texts(transcript: &Transcript) -> Vec<(Role, String)> {
        transcript.turns().into_iter().map(|t| (t.role, t.text)).collect()
    }

    fn pdf(name: &str) -> SelectedFile {
        SelectedFile::new(name, "application/pdf", b"%PDF".to_vec())
    }

    fn assert_idle(h: &Harness) {
        let session = h.controller.session();
        assert!(session.chat_input.is_enabled());
        assert!(session.chat_input.is_focused());
        assert!(!session.loading.is_visible());
    }

    #[tokio::test]
    async fn test_chat_answered() {
        let h = harness(true);
        h.api.chat_replies.lock().unwrap().push_back(Ok(ChatReply {
            response: Some("hi there".to_string()),
            conversation_id: None,
        }));

        let outcome = h.controller.submit_text("  hello  ").await;

        assert_eq!(outcome, ChatOutcome::Answered);
        assert_eq!(
            texts(&h.transcript),
            vec![(Role::User, "hello".to_string()), (Role::Assistant, "hi there".to_string())]
        );
        assert_eq!(h.api.chat_requests.lock().unwrap()[0].message, "hello");
        assert_eq!(h.controller.session().chat_input.value(), "");
        assert_eq!(*h.api.loading_seen.lock().unwrap(), vec![true]);
        assert_idle(&h);
    }

    #[tokio::test]
    async fn test_begin_chat_locks_input_until_finished() {
        let h = harness(true);
        h.api.chat_replies.lock().unwrap().push_back(Ok(ChatReply {
            response: Some("done".to_string()),
            conversation_id: None,
        }));
        let input = h.controller.session().chat_input.clone();
        input.set_value("question");

        let pending = h.controller.begin_chat().unwrap();
        assert_eq!(pending.request.message, "question");
        assert!(!input.is_enabled());
        assert!(!input.type_char('x'));
        assert_eq!(input.value(), "");
        assert!(h.controller.session().loading.is_visible());
        assert_eq!(texts(&h.transcript), vec![(Role::User, "question".to_string())]);

        assert_eq!(h.controller.finish_chat(pending).await, ChatOutcome::Answered);
        assert_idle(&h);
    }

    #[tokio::test]
    async fn test_chat_without_response_field() {
        let h = harness(true);
        h.api.chat_replies.lock().unwrap().push_back(Ok(ChatReply::default()));

        let outcome = h.controller.submit_text("hello").await;

        assert_eq!(outcome, ChatOutcome::SoftFailure);
        let turns = texts(&h.transcript);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1], (Role::Assistant, CHAT_SOFT_FAILURE.to_string()));
        assert_idle(&h);
    }

    #[tokio::test]
    async fn test_chat_empty_response_is_soft_failure() {
        let h = harness(true);
        h.api.chat_replies.lock().unwrap().push_back(Ok(ChatReply {
            response: Some(String::new()),
            conversation_id: None,
        }));

        assert_eq!(h.controller.submit_text("hello").await, ChatOutcome::SoftFailure);
        assert_eq!(h.transcript.last().unwrap().text, CHAT_SOFT_FAILURE);
    }

    #[tokio::test]
    async fn test_chat_transport_failure() {
        let h = harness(true);
        h.api.chat_replies.lock().unwrap().push_back(Err(TransportError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        }));

        let outcome = h.controller.submit_text("hello").await;

        assert_eq!(outcome, ChatOutcome::TransportFailure);
        let turns = texts(&h.transcript);
        assert_eq!(turns[0], (Role::User, "hello".to_string()));
        assert_eq!(turns[1], (Role::Assistant, CHAT_TRANSPORT_FAILURE.to_string()));
        assert!(!turns[1].1.contains("502"));
        assert_idle(&h);
    }

    #[tokio::test]
    async fn test_blank_chat_is_ignored() {
        let h = harness(true);
        h.controller.session().chat_input.blur();

        for input in ["", "   ", "\n\t "] {
            assert_eq!(h.controller.submit_text(input).await, ChatOutcome::Ignored);
        }

        assert!(h.transcript.is_empty());
        assert!(h.api.chat_requests.lock().unwrap().is_empty());
        // No observable effect, focus included.
        assert!(!h.controller.session().chat_input.is_focused());
    }

    #[tokio::test]
    async fn test_each_chat_adds_exactly_two_turns() {
        let h = harness(true);
        {
            let mut replies = h.api.chat_replies.lock().unwrap();
            replies.push_back(Ok(ChatReply {
                response: Some("one".to_string()),
                conversation_id: None,
            }));
            replies.push_back(Ok(ChatReply::default()));
            replies.push_back(Err(network_down()));
        }

        for (i, message) in ["first", "second", "third"].iter().enumerate() {
            h.controller.submit_text(message).await;
            assert_eq!(h.transcript.len(), (i + 1) * 2);
            assert_eq!(h.transcript.turns()[i * 2].role, Role::User);
            assert_eq!(h.transcript.turns()[i * 2 + 1].role, Role::Assistant);
        }
        assert_idle(&h);
    }

    #[tokio::test]
    async fn test_conversation_id_is_carried_forward() {
        let h = harness(true);
        {
            let mut replies = h.api.chat_replies.lock().unwrap();
            replies.push_back(Ok(ChatReply {
                response: Some("welcome".to_string()),
                conversation_id: Some("conv-7".to_string()),
            }));
            replies.push_back(Ok(ChatReply {
                response: Some("again".to_string()),
                conversation_id: Some("conv-7".to_string()),
            }));
            replies.push_back(Ok(ChatReply {
                response: Some("fresh".to_string()),
                conversation_id: Some("conv-8".to_string()),
            }));
        }

        h.controller.submit_text("first").await;
        h.controller.submit_text("second").await;
        h.controller.new_conversation();
        assert_eq!(h.controller.conversation_id(), None);
        h.controller.submit_text("third").await;

        let requests = h.api.chat_requests.lock().unwrap();
        assert_eq!(requests[0].conversation_id, None);
        assert_eq!(requests[1].conversation_id.as_deref(), Some("conv-7"));
        assert_eq!(requests[2].conversation_id, None);
        assert_eq!(h.controller.conversation_id().as_deref(), Some("conv-8"));
    }

    #[tokio::test]
    async fn test_reply_without_response_still_sets_conversation() {
        let h = harness(true);
        {
            let mut replies = h.api.chat_replies.lock().unwrap();
            replies.push_back(Ok(ChatReply {
                response: None,
                conversation_id: Some("conv-3".to_string()),
            }));
            replies.push_back(Ok(ChatReply {
                response: Some("ok".to_string()),
                conversation_id: None,
            }));
        }

        assert_eq!(h.controller.submit_text("first").await, ChatOutcome::SoftFailure);
        assert_eq!(h.controller.conversation_id().as_deref(), Some("conv-3"));

        h.controller.submit_text("second").await;
        let requests = h.api.chat_requests.lock().unwrap();
        assert_eq!(requests[1].conversation_id.as_deref(), Some("conv-3"));
    }

    #[tokio::test]
    async fn test_conversation_not_resumed_when_disabled() {
        let h = harness(false);
        for _ in 0..2 {
            h.api.chat_replies.lock().unwrap().push_back(Ok(ChatReply {
                response: Some("ok".to_string()),
                conversation_id: Some("conv-1".to_string()),
            }));
        }

        h.controller.submit_text("a").await;
        h.controller.submit_text("b").await;

        let requests = h.api.chat_requests.lock().unwrap();
        assert!(requests.iter().all(|r| r.conversation_id.is_none()));
    }

    #[tokio::test]
    async fn test_empty_selection_is_ignored() {
        let h = harness(true);
        h.controller.session().file_selector.set_value("nothing-yet");

        assert_eq!(h.controller.select_files(Vec::new()).await, UploadOutcome::Ignored);
        assert!(h.transcript.is_empty());
        assert_eq!(h.controller.session().file_selector.value(), "nothing-yet");
    }

    #[tokio::test]
    async fn test_non_pdf_selection_is_rejected() {
        let h = harness(true);
        h.controller.session().file_selector.set_value("notes.txt");

        let outcome = h
            .controller
            .select_files(vec![SelectedFile::new("notes.txt", "text/plain", b"hi".to_vec())])
            .await;

        assert_eq!(outcome, UploadOutcome::Rejected);
        assert_eq!(texts(&h.transcript), vec![(Role::Assistant, PDF_ONLY.to_string())]);
        assert!(h.api.uploads.lock().unwrap().is_empty());
        assert_eq!(h.controller.session().file_selector.value(), "");
        assert!(!h.controller.session().loading.is_visible());
    }

    #[tokio::test]
    async fn test_upload_success_replaces_registry_and_refetches() {
        let h = harness(true);
        h.documents.replace_all(&["stale.pdf".to_string()]);
        h.api.upload_replies.lock().unwrap().push_back(Ok(UploadReply {
            success: true,
            message: Some("2 files".to_string()),
            error: None,
            files: Some(vec!["a.pdf".to_string(), "b.pdf".to_string()]),
        }));
        h.api.document_replies.lock().unwrap().push_back(Ok(DocumentsReply {
            files: vec!["a.pdf".to_string(), "b.pdf".to_string()],
        }));
        h.controller.session().file_selector.set_value("a.pdf b.pdf");

        let outcome = h.controller.select_files(vec![pdf("a.pdf"), pdf("b.pdf")]).await;

        assert_eq!(outcome, UploadOutcome::Uploaded);
        assert_eq!(h.documents.names(), vec!["a.pdf", "b.pdf"]);
        assert_eq!(
            texts(&h.transcript),
            vec![
                (Role::Assistant, UPLOAD_STARTED.to_string()),
                (Role::Assistant, "Files uploaded and processed: 2 files".to_string()),
            ]
        );
        assert_eq!(*h.api.document_calls.lock().unwrap(), 1);
        assert_eq!(*h.api.loading_seen.lock().unwrap(), vec![true]);
        assert_eq!(h.controller.session().file_selector.value(), "");
        assert!(!h.controller.session().loading.is_visible());
    }

    #[tokio::test]
    async fn test_upload_sends_only_pdfs() {
        let h = harness(true);
        h.api.upload_replies.lock().unwrap().push_back(Ok(UploadReply {
            success: true,
            message: Some("1 file".to_string()),
            error: None,
            files: Some(vec!["lease.pdf".to_string()]),
        }));

        h.controller
            .select_files(vec![
                SelectedFile::new("photo.png", "image/png", Vec::new()),
                pdf("lease.pdf"),
                SelectedFile::new("notes.txt", "text/plain", Vec::new()),
            ])
            .await;

        assert_eq!(*h.api.uploads.lock().unwrap(), vec![vec!["lease.pdf".to_string()]]);
    }

    #[tokio::test]
    async fn test_upload_refused_by_server() {
        let h = harness(true);
        h.documents.replace_all(&["kept.pdf".to_string()]);
        h.api.upload_replies.lock().unwrap().push_back(Ok(UploadReply {
            success: false,
            message: None,
            error: Some("File too large".to_string()),
            files: None,
        }));

        let outcome = h.controller.select_files(vec![pdf("huge.pdf")]).await;

        assert_eq!(outcome, UploadOutcome::Refused);
        assert_eq!(h.transcript.last().unwrap().text, "Error: File too large");
        assert_eq!(h.documents.names(), vec!["kept.pdf"]);
        assert_eq!(*h.api.document_calls.lock().unwrap(), 0);
        assert!(!h.controller.session().loading.is_visible());
    }

    #[tokio::test]
    async fn test_upload_success_without_files_or_message() {
        let h = harness(true);
        h.documents.replace_all(&["stale.pdf".to_string()]);
        h.api.upload_replies.lock().unwrap().push_back(Ok(UploadReply {
            success: true,
            message: None,
            error: None,
            files: None,
        }));
        // The re-fetch fails, so whatever the list shows afterwards was not
        // touched by the upload reply itself.
        h.api.document_replies.lock().unwrap().push_back(Err(network_down()));

        let outcome = h.controller.select_files(vec![pdf("a.pdf")]).await;

        assert_eq!(outcome, UploadOutcome::Uploaded);
        assert_eq!(h.transcript.last().unwrap().text, UPLOAD_DONE_PREFIX);
        assert_eq!(h.documents.names(), vec!["stale.pdf"]);
        assert_eq!(*h.api.document_calls.lock().unwrap(), 1);
        assert!(!h.controller.session().loading.is_visible());
    }

    #[tokio::test]
    async fn test_upload_success_without_files_still_refetches() {
        let h = harness(true);
        h.api.upload_replies.lock().unwrap().push_back(Ok(UploadReply {
            success: true,
            message: Some("1 file".to_string()),
            error: None,
            files: None,
        }));
        h.api.document_replies.lock().unwrap().push_back(Ok(DocumentsReply {
            files: vec!["a.pdf".to_string()],
        }));

        h.controller.select_files(vec![pdf("a.pdf")]).await;

        assert_eq!(h.documents.names(), vec!["a.pdf"]);
    }

    #[tokio::test]
    async fn test_begin_upload_locks_selector_until_finished() {
        let h = harness(true);
        h.api.upload_replies.lock().unwrap().push_back(Ok(UploadReply {
            success: false,
            message: None,
            error: None,
            files: None,
        }));
        let selector = h.controller.session().file_selector.clone();
        selector.set_value("a.pdf  b.pdf");

        let pending = h.controller.begin_upload().unwrap();
        assert_eq!(pending.paths, vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")]);
        assert!(!selector.is_enabled());
        assert!(!selector.type_char('x'));
        // A second submit while the first is pending takes nothing.
        assert!(h.controller.begin_upload().is_none());

        let outcome = h.controller.finish_upload(pending, vec![pdf("a.pdf"), pdf("b.pdf")]).await;

        assert_eq!(outcome, UploadOutcome::Refused);
        assert_eq!(h.transcript.last().unwrap().text, "Error: unknown error");
        assert_eq!(h.api.uploads.lock().unwrap().len(), 1);
        assert!(selector.is_enabled());
        assert_eq!(selector.value(), "");
    }

    #[tokio::test]
    async fn test_begin_upload_with_no_paths() {
        let h = harness(true);
        h.controller.session().file_selector.set_value("   ");

        assert!(h.controller.begin_upload().is_none());
        assert!(h.controller.session().file_selector.is_enabled());
    }

    #[tokio::test]
    async fn test_rejected_selection_unlocks_selector() {
        let h = harness(true);
        h.controller.session().file_selector.set_value("notes.txt");
        let pending = h.controller.begin_upload().unwrap();

        let outcome = h
            .controller
            .finish_upload(pending, vec![SelectedFile::new("notes.txt", "text/plain", Vec::new())])
            .await;

        assert_eq!(outcome, UploadOutcome::Rejected);
        assert!(h.api.uploads.lock().unwrap().is_empty());
        let selector = &h.controller.session().file_selector;
        assert!(selector.is_enabled());
        assert_eq!(selector.value(), "");
    }

    #[tokio::test]
    async fn test_upload_transport_failure_shows_reason() {
        let h = harness(true);
        h.api.upload_replies.lock().unwrap().push_back(Err(TransportError::Status {
            status: 413,
            body: String::new(),
        }));

        let outcome = h.controller.select_files(vec![pdf("a.pdf")]).await;

        assert_eq!(outcome, UploadOutcome::TransportFailure);
        assert_eq!(
            h.transcript.last().unwrap().text,
            "Sorry, there was an error uploading the files: HTTP error! status: 413"
        );
        assert!(!h.controller.session().loading.is_visible());
        assert_eq!(h.controller.session().file_selector.value(), "");
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous_list() {
        let h = harness(true);
        h.documents.replace_all(&["a.pdf".to_string()]);
        h.api.document_replies.lock().unwrap().push_back(Err(network_down()));

        assert!(!h.controller.refresh_documents().await);
        assert_eq!(h.documents.names(), vec!["a.pdf"]);
        assert!(h.transcript.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_shows_latest_list_in_order() {
        let h = harness(true);
        {
            let mut replies = h.api.document_replies.lock().unwrap();
            replies.push_back(Ok(DocumentsReply {
                files: vec!["c.pdf".to_string(), "a.pdf".to_string(), "b.pdf".to_string()],
            }));
            replies.push_back(Ok(DocumentsReply { files: Vec::new() }));
        }

        h.controller.start().await;
        assert_eq!(h.documents.names(), vec!["c.pdf", "a.pdf", "b.pdf"]);

        assert!(h.controller.refresh_documents().await);
        assert!(h.documents.is_empty());
    }

    #[tokio::test]
    async fn test_chat_and_upload_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": ["a.pdf", "b.pdf"]})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "hi there"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "2 files",
                "files": ["a.pdf", "b.pdf"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = HttpApi::new(&server.uri(), Duration::from_secs(5), Duration::from_secs(5)).unwrap();
        let transcript = Arc::new(Transcript::new());
        let documents = Arc::new(DocumentList::new());
        let controller = SessionController::new(
            Arc::new(api),
            Session::new(transcript.clone(), documents.clone()),
            true,
        );

        assert_eq!(controller.submit_text("hello").await, ChatOutcome::Answered);
        assert_eq!(
            controller.select_files(vec![pdf("a.pdf"), pdf("b.pdf")]).await,
            UploadOutcome::Uploaded
        );

        assert_eq!(documents.names(), vec!["a.pdf", "b.pdf"]);
        assert_eq!(
            texts(&transcript),
            vec![
                (Role::User, "hello".to_string()),
                (Role::Assistant, "hi there".to_string()),
                (Role::Assistant, UPLOAD_STARTED.to_string()),
                (Role::Assistant, "Files uploaded and processed: 2 files".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_chat_against_dead_server_recovers() {
        let api = HttpApi::new("http://127.0.0.1:9", Duration::from_secs(2), Duration::from_secs(2)).unwrap();
        let transcript = Arc::new(Transcript::new());
        let session = Session::new(transcript.clone(), Arc::new(DocumentList::new()));
        let controller = SessionController::new(Arc::new(api), session, true);

        assert_eq!(controller.submit_text("hello").await, ChatOutcome::TransportFailure);
        assert_eq!(transcript.last().unwrap().text, CHAT_TRANSPORT_FAILURE);
        assert!(controller.session().chat_input.is_enabled());
        assert!(!controller.session().loading.is_visible());
    }
}
