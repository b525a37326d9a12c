//! The edit session: one canonical document, one selection, one action in flight.
//!
//! An action is split in two synchronous halves around the network call.
//! [`EditSession::begin`] checks the inputs, flips the state machine to
//! `Busy` and snapshots everything the merge will need (document version,
//! selection offsets). [`EditSession::settle`] merges the result and returns
//! to `Idle`. [`run_action`] drives both halves without holding a borrow of
//! the session across the await, so the view can keep reading it.

use crate::action::{ActionKind, ActionState, InputMethod};
use crate::document::{slice_chars, splice, DocumentSnapshot, DocumentStore};
use crate::generation::{GenerationClient, GenerationError, GenerationRequest};
use crate::media::{read_attachment, MediaAttachment, MediaError, MediaKind};
use crate::selection::{Highlight, ScrollOffset, Selection, SelectionTracker};
use std::cell::RefCell;
use std::path::Path;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum ActionError {
    /// Local precondition failure; nothing was sent.
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("Another action ({0}) is already in progress.")]
    Busy(ActionKind),
    #[error("The document changed while the request was in flight; the result was discarded. Please try again.")]
    Conflict,
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl ActionError {
    fn user_message(&self, kind: ActionKind) -> String {
        match self {
            ActionError::InvalidInput(msg) => msg.clone(),
            ActionError::Generation(e) if e.is_configuration_missing() => e.to_string(),
            other => format!("{}: {}", kind.failure_prefix(), other),
        }
    }
}

/// An attachment waiting to be used, with the prompt typed next to it.
#[derive(Debug, Default)]
struct MediaSlot {
    attachment: Option<MediaAttachment>,
    prompt: String,
}

impl MediaSlot {
    fn clear(&mut self) {
        self.attachment = None;
        self.prompt.clear();
    }
}

/// Everything captured when an action was launched.
#[derive(Debug)]
pub struct PendingAction {
    request: GenerationRequest,
    version: u64,
    range: Option<(usize, usize)>,
    cancel: CancellationToken,
}

impl PendingAction {
    pub fn kind(&self) -> ActionKind {
        self.request.kind
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    /// Awaits the model, or the cancellation of this action, whichever comes first.
    pub async fn run(&self, client: &GenerationClient) -> Result<String, GenerationError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(GenerationError::Cancelled),
            result = client.generate(&self.request) => result,
        }
    }
}

/// Puts the session back to `Idle` if the future driving an action is
/// dropped before it reaches [`EditSession::settle`].
pub struct AbandonGuard<'a> {
    session: &'a RefCell<EditSession>,
    armed: bool,
}

impl<'a> AbandonGuard<'a> {
    pub fn new(session: &'a RefCell<EditSession>) -> Self {
        Self {
            session,
            armed: true,
        }
    }

    /// Call right before settling; the action no longer needs rescuing.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.session.try_borrow_mut() {
            Ok(mut session) => session.abandon(),
            Err(_) => tracing::error!("Could not reset an abandoned action: session is borrowed"),
        }
    }
}

pub struct EditSession {
    document: DocumentStore,
    selection: SelectionTracker,
    state: ActionState,
    error: Option<String>,
    instruction: String,
    input_method: InputMethod,
    image: MediaSlot,
    pdf: MediaSlot,
    active_cancel: Option<CancellationToken>,
}

impl EditSession {
    pub fn new(initial_document: impl Into<String>) -> Self {
        Self {
            document: DocumentStore::new(initial_document),
            selection: SelectionTracker::new(),
            state: ActionState::Idle,
            error: None,
            instruction: String::new(),
            input_method: InputMethod::Prompt,
            image: MediaSlot::default(),
            pdf: MediaSlot::default(),
            active_cancel: None,
        }
    }

    // ---- document ---------------------------------------------------------

    pub fn document(&self) -> &str {
        self.document.document()
    }

    pub fn document_version(&self) -> u64 {
        self.document.version()
    }

    pub fn subscribe(&self) -> watch::Receiver<DocumentSnapshot> {
        self.document.subscribe()
    }

    /// Applies a direct user edit. Returns `false` when the text is unchanged
    /// (an echo of what the store already holds).
    ///
    /// Edits are never blocked, even while an action is in flight; the
    /// pending result is then discarded at settle time instead.
    pub fn edit_document(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text == self.document.document() {
            return false;
        }
        self.document.set_document(text);
        self.selection.clear();
        true
    }

    // ---- selection --------------------------------------------------------

    pub fn select(&mut self, anchor: usize, head: usize) -> Option<&Selection> {
        self.selection.capture(self.document.document(), anchor, head)
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.current()
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn set_editor_focused(&mut self, focused: bool) {
        self.selection.set_focused(focused);
    }

    pub fn sync_scroll(&mut self, offset: ScrollOffset) {
        self.selection.sync_scroll(offset);
    }

    pub fn highlight(&self) -> Option<Highlight<'_>> {
        self.selection.highlight(self.document.document())
    }

    // ---- inputs -----------------------------------------------------------

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn set_instruction(&mut self, instruction: impl Into<String>) {
        self.instruction = instruction.into();
    }

    pub fn input_method(&self) -> InputMethod {
        self.input_method
    }

    pub fn set_input_method(&mut self, method: InputMethod) {
        self.input_method = method;
    }

    /// Stores an attachment in the slot for its kind, replacing any previous one.
    pub fn attach(&mut self, attachment: MediaAttachment) {
        self.error = None;
        match attachment.kind {
            MediaKind::Image => self.image.attachment = Some(attachment),
            MediaKind::Pdf => self.pdf.attachment = Some(attachment),
        }
    }

    pub fn attachment(&self, kind: MediaKind) -> Option<&MediaAttachment> {
        self.slot(kind).attachment.as_ref()
    }

    pub fn media_prompt(&self, kind: MediaKind) -> &str {
        &self.slot(kind).prompt
    }

    pub fn set_media_prompt(&mut self, kind: MediaKind, prompt: impl Into<String>) {
        self.slot_mut(kind).prompt = prompt.into();
    }

    /// Drops the attachment and its prompt.
    pub fn clear_media(&mut self, kind: MediaKind) {
        self.slot_mut(kind).clear();
    }

    fn slot(&self, kind: MediaKind) -> &MediaSlot {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Pdf => &self.pdf,
        }
    }

    fn slot_mut(&mut self, kind: MediaKind) -> &mut MediaSlot {
        match kind {
            MediaKind::Image => &mut self.image,
            MediaKind::Pdf => &mut self.pdf,
        }
    }

    // ---- status -----------------------------------------------------------

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Records a failure that happened outside an action (e.g. a bad file pick).
    pub fn report_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Trips the cancellation token of the in-flight action, if any.
    pub fn cancel_active(&self) -> bool {
        match &self.active_cancel {
            Some(token) => {
                tracing::info!("Cancelling {:?}", self.state.active());
                token.cancel();
                true
            }
            None => false,
        }
    }

    // ---- protocol ---------------------------------------------------------

    /// Validates inputs and moves `Idle -> Busy(kind)`.
    ///
    /// While busy this is a no-op returning [`ActionError::Busy`]: the
    /// document, selection, error and pending action are left exactly as
    /// they were. Local input errors are recorded as the current error and
    /// the state stays `Idle`.
    pub fn begin(&mut self, kind: ActionKind) -> Result<PendingAction, ActionError> {
        if let ActionState::Busy(active) = self.state {
            tracing::debug!("Ignoring {} request while {} is in flight", kind, active);
            return Err(ActionError::Busy(active));
        }

        let (request, range) = match self.prepare(kind) {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::warn!("{} rejected locally: {}", kind, e);
                self.error = Some(e.user_message(kind));
                return Err(e);
            }
        };

        if !self.state.try_start(kind) {
            return Err(ActionError::Busy(kind));
        }
        self.error = None;
        if kind.replaces_document() {
            self.selection.clear();
        }

        let cancel = CancellationToken::new();
        self.active_cancel = Some(cancel.clone());
        Ok(PendingAction {
            request,
            version: self.document.version(),
            range,
            cancel,
        })
    }

    fn prepare(
        &mut self,
        kind: ActionKind,
    ) -> Result<(GenerationRequest, Option<(usize, usize)>), ActionError> {
        let document = self.document.document().to_string();
        match kind {
            ActionKind::WholeDocumentUpdate => {
                if self.instruction.trim().is_empty() {
                    return Err(ActionError::InvalidInput(
                        "Please enter a prompt to update the presentation.".to_string(),
                    ));
                }
                Ok((
                    GenerationRequest {
                        kind,
                        document,
                        instruction: self.instruction.clone(),
                        snippet: None,
                        media: None,
                    },
                    None,
                ))
            }
            ActionKind::SelectionRewrite => {
                let Some(selection) = self.selection.current().filter(|s| !s.is_empty()) else {
                    return Err(ActionError::InvalidInput(
                        "No text selected to modify.".to_string(),
                    ));
                };
                if slice_chars(&document, selection.start, selection.end)
                    != Some(selection.text.as_str())
                {
                    self.selection.clear();
                    return Err(ActionError::InvalidInput(
                        "The selection no longer matches the document. Please select the text again."
                            .to_string(),
                    ));
                }
                if self.instruction.trim().is_empty() {
                    return Err(ActionError::InvalidInput(
                        "Please enter a prompt describing how to modify the selected text."
                            .to_string(),
                    ));
                }
                let range = (selection.start, selection.end);
                Ok((
                    GenerationRequest {
                        kind,
                        document,
                        instruction: self.instruction.clone(),
                        snippet: Some(selection.text.clone()),
                        media: None,
                    },
                    Some(range),
                ))
            }
            ActionKind::ImageGeneration | ActionKind::PdfGeneration => {
                let media_kind = if kind == ActionKind::ImageGeneration {
                    MediaKind::Image
                } else {
                    MediaKind::Pdf
                };
                let slot = self.slot(media_kind);
                let Some(attachment) = slot.attachment.as_ref() else {
                    let msg = match media_kind {
                        MediaKind::Image => "Please provide an image.",
                        MediaKind::Pdf => "Please select a PDF file.",
                    };
                    return Err(ActionError::InvalidInput(msg.to_string()));
                };
                let media = attachment.payload()?;
                Ok((
                    GenerationRequest {
                        kind,
                        document,
                        instruction: slot.prompt.clone(),
                        snippet: None,
                        media: Some(media),
                    },
                    None,
                ))
            }
        }
    }

    /// Merges the outcome of `pending` and moves back to `Idle`.
    ///
    /// On success the document is replaced (or spliced, for rewrites) and the
    /// inputs that produced it are cleared. On failure nothing is merged and
    /// the inputs, including the selection, are kept for a retry.
    pub fn settle(
        &mut self,
        pending: PendingAction,
        outcome: Result<String, GenerationError>,
    ) -> Result<(), ActionError> {
        let kind = pending.kind();
        self.state.finish();
        self.active_cancel = None;

        let result = outcome
            .map_err(ActionError::from)
            .and_then(|text| self.merge(&pending, text));

        match &result {
            Ok(()) => {
                self.error = None;
                // The document was rewritten; any tracked offsets are stale.
                self.selection.clear();
                match kind {
                    ActionKind::WholeDocumentUpdate | ActionKind::SelectionRewrite => {
                        self.instruction.clear()
                    }
                    ActionKind::ImageGeneration => self.image.clear(),
                    ActionKind::PdfGeneration => self.pdf.clear(),
                }
            }
            Err(e) => {
                tracing::error!("{} failed: {}", kind, e);
                self.error = Some(e.user_message(kind));
            }
        }
        result
    }

    /// Drops the in-flight action without merging anything. Inputs and the
    /// current error are left as they are.
    pub fn abandon(&mut self) {
        let Some(active) = self.state.active() else {
            return;
        };
        tracing::warn!("{} abandoned before it settled", active);
        if let Some(token) = self.active_cancel.take() {
            token.cancel();
        }
        self.state.finish();
    }

    fn merge(&mut self, pending: &PendingAction, text: String) -> Result<(), ActionError> {
        if self.document.version() != pending.version {
            tracing::warn!(
                "Discarding {} result: document moved from version {} to {}",
                pending.kind(),
                pending.version,
                self.document.version()
            );
            return Err(ActionError::Conflict);
        }

        let previous_len = self.document.document().len();
        let merged = match pending.range {
            Some((start, end)) => {
                splice(self.document.document(), start, end, &text).ok_or(ActionError::Conflict)?
            }
            None => text,
        };
        tracing::info!(
            "AI Assistant: {} applied. Original: {} bytes, New: {} bytes",
            pending.kind(),
            previous_len,
            merged.len()
        );
        self.document.set_document(merged);
        Ok(())
    }
}

/// Runs one action end to end: begin, generate (racing cancellation), settle.
pub async fn run_action(
    session: &RefCell<EditSession>,
    client: &GenerationClient,
    kind: ActionKind,
) -> Result<(), ActionError> {
    let pending = session.borrow_mut().begin(kind)?;
    let guard = AbandonGuard::new(session);
    let outcome = pending.run(client).await;
    guard.disarm();
    session.borrow_mut().settle(pending, outcome)
}

/// Reads a file into the slot for `kind`.
///
/// Refused while an action is in flight, like any other action trigger.
/// Read or type failures become the current error.
pub async fn load_attachment(
    session: &RefCell<EditSession>,
    path: &Path,
    kind: MediaKind,
) -> Result<(), ActionError> {
    if let Some(active) = session.borrow().state().active() {
        return Err(ActionError::Busy(active));
    }

    let loaded = read_attachment(path, kind).await;
    store_attachment(session, loaded)
}

/// Stores media that was produced without a file read, such as a pasted
/// clipboard image. Same busy rule and error reporting as [`load_attachment`].
pub fn store_attachment(
    session: &RefCell<EditSession>,
    loaded: Result<MediaAttachment, MediaError>,
) -> Result<(), ActionError> {
    let mut session = session.borrow_mut();
    if let Some(active) = session.state().active() {
        return Err(ActionError::Busy(active));
    }
    match loaded {
        Ok(attachment) => {
            session.attach(attachment);
            Ok(())
        }
        Err(e) => {
            session.report_error(e.to_string());
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::constants::PDF_MIME_TYPE;
    use crate::test_support::ScriptedProvider;
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn client(provider: &Arc<ScriptedProvider>) -> GenerationClient {
        GenerationClient::new(provider.clone())
    }

    fn image() -> MediaAttachment {
        MediaAttachment::from_data_uri(
            MediaKind::Image,
            "data:image/png;base64,iVBORw0KGgo=",
            "image/png",
            Some("slide.png".into()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_whole_document_update_replaces_document() {
        let provider = Arc::new(ScriptedProvider::new().reply(
            "```latex\n\\begin{document}\\title{T}X\\end{document}\n```",
        ));
        let session = RefCell::new(EditSession::new("\\begin{document}X\\end{document}"));
        session.borrow_mut().set_instruction("add a title");
        session.borrow_mut().select(0, 5);

        run_action(&session, &client(&provider), ActionKind::WholeDocumentUpdate)
            .await
            .unwrap();

        let s = session.borrow();
        assert_eq!(s.document(), "\\begin{document}\\title{T}X\\end{document}");
        assert_eq!(s.error(), None);
        assert_eq!(s.state(), ActionState::Idle);
        assert_eq!(s.instruction(), "");
        assert!(s.selection().is_none());
    }

    #[tokio::test]
    async fn test_selection_rewrite_splices_in_place() {
        let doc = "\\begin{frame}\\frametitle{OLD}\\end{frame}";
        let start = doc.find("OLD").unwrap();
        let provider = Arc::new(ScriptedProvider::new().reply("\\guj{નવું}"));
        let session = RefCell::new(EditSession::new(doc));
        {
            let mut s = session.borrow_mut();
            assert_eq!(s.select(start, start + 3).unwrap().text, "OLD");
            s.set_instruction("translate to Gujarati");
        }

        run_action(&session, &client(&provider), ActionKind::SelectionRewrite)
            .await
            .unwrap();

        let s = session.borrow();
        assert_eq!(s.document(), "\\begin{frame}\\frametitle{\\guj{નવું}}\\end{frame}");
        assert!(s.selection().is_none());
        assert_eq!(s.instruction(), "");

        let sent = &provider.calls()[0];
        assert!(sent.user.contains("Selected LaTeX snippet to modify:\nOLD"));
        assert!(sent.user.contains(doc));
    }

    #[tokio::test]
    async fn test_selection_rewrite_after_multibyte_prefix() {
        let doc = "\\guj{નમસ્તે} OLD tail";
        let start = doc.chars().position(|c| c == 'O').unwrap();
        let provider = Arc::new(ScriptedProvider::new().reply("NEW"));
        let session = RefCell::new(EditSession::new(doc));
        session.borrow_mut().select(start, start + 3);
        session.borrow_mut().set_instruction("rename");

        run_action(&session, &client(&provider), ActionKind::SelectionRewrite)
            .await
            .unwrap();
        assert_eq!(session.borrow().document(), "\\guj{નમસ્તે} NEW tail");
    }

    #[tokio::test]
    async fn test_selection_rewrite_empty_snippet_deletes() {
        let provider = Arc::new(ScriptedProvider::new().reply("```latex\n```"));
        let session = RefCell::new(EditSession::new("keep DROP keep"));
        session.borrow_mut().select(4, 9);
        session.borrow_mut().set_instruction("delete this");

        run_action(&session, &client(&provider), ActionKind::SelectionRewrite)
            .await
            .unwrap();
        assert_eq!(session.borrow().document(), "keep keep");
    }

    #[tokio::test]
    async fn test_selection_rewrite_identity_reproduces_document() {
        let doc = "a \\textbf{b} c";
        let provider = Arc::new(ScriptedProvider::new().reply("\\textbf{b}"));
        let session = RefCell::new(EditSession::new(doc));
        session.borrow_mut().select(2, 12);
        session.borrow_mut().set_instruction("leave it");

        run_action(&session, &client(&provider), ActionKind::SelectionRewrite)
            .await
            .unwrap();
        assert_eq!(session.borrow().document(), doc);
    }

    #[tokio::test]
    async fn test_rewrite_preconditions_are_local() {
        let provider = Arc::new(ScriptedProvider::new());
        let session = RefCell::new(EditSession::new("abc"));
        session.borrow_mut().set_instruction("x");

        let err = run_action(&session, &client(&provider), ActionKind::SelectionRewrite)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidInput(_)));
        assert_eq!(session.borrow().error(), Some("No text selected to modify."));

        session.borrow_mut().select(0, 2);
        session.borrow_mut().set_instruction("   ");
        let err = run_action(&session, &client(&provider), ActionKind::SelectionRewrite)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidInput(_)));
        assert!(session.borrow().selection().is_some());
        assert_eq!(session.borrow().state(), ActionState::Idle);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_update_requires_instruction() {
        let provider = Arc::new(ScriptedProvider::new());
        let session = RefCell::new(EditSession::new("doc"));
        session.borrow_mut().set_instruction(" \n\t");
        let err = run_action(&session, &client(&provider), ActionKind::WholeDocumentUpdate)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidInput(_)));
        assert_eq!(
            session.borrow().error(),
            Some("Please enter a prompt to update the presentation.")
        );
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_image_generation_without_attachment() {
        let provider = Arc::new(ScriptedProvider::new());
        let session = RefCell::new(EditSession::new("doc"));
        let err = run_action(&session, &client(&provider), ActionKind::ImageGeneration)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidInput(_)));
        assert_eq!(session.borrow().error(), Some("Please provide an image."));
        assert!(!session.borrow().is_busy());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_media_data_never_reaches_network() {
        let provider = Arc::new(ScriptedProvider::new());
        let session = RefCell::new(EditSession::new("doc"));
        let broken = MediaAttachment::from_data_uri(
            MediaKind::Pdf,
            "data:application/pdf;base64",
            PDF_MIME_TYPE,
            None,
        )
        .unwrap();
        session.borrow_mut().attach(broken);

        let err = run_action(&session, &client(&provider), ActionKind::PdfGeneration)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Media(MediaError::InvalidData(MediaKind::Pdf))));
        assert_eq!(
            session.borrow().error(),
            Some("Failed to generate from PDF: Invalid PDF data format.")
        );
        assert_eq!(provider.call_count(), 0);
        assert!(session.borrow().attachment(MediaKind::Pdf).is_some());
    }

    #[tokio::test]
    async fn test_image_generation_clears_slot_on_success() {
        let provider = Arc::new(ScriptedProvider::new().reply("\\documentclass{beamer}NEW"));
        let session = RefCell::new(EditSession::new("OLD"));
        {
            let mut s = session.borrow_mut();
            s.attach(image());
            s.set_media_prompt(MediaKind::Image, "describe the chart");
            s.select(0, 2);
        }

        run_action(&session, &client(&provider), ActionKind::ImageGeneration)
            .await
            .unwrap();

        let s = session.borrow();
        assert_eq!(s.document(), "\\documentclass{beamer}NEW");
        assert!(s.attachment(MediaKind::Image).is_none());
        assert_eq!(s.media_prompt(MediaKind::Image), "");
        assert!(s.selection().is_none());

        let sent = &provider.calls()[0];
        assert_eq!(sent.media.as_ref().unwrap().data, "iVBORw0KGgo=");
        assert!(sent.user.ends_with("describe the chart"));
    }

    #[tokio::test]
    async fn test_quota_error_is_classified_and_document_untouched() {
        let provider = Arc::new(
            ScriptedProvider::new().fail(ApiError::Response("quota exhausted for today".into())),
        );
        let session = RefCell::new(EditSession::new("original"));
        session.borrow_mut().set_instruction("expand");

        let err = run_action(&session, &client(&provider), ActionKind::WholeDocumentUpdate)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ActionError::Generation(GenerationError::QuotaExceeded)
        ));
        let s = session.borrow();
        assert_eq!(s.document(), "original");
        assert_eq!(s.document_version(), 0);
        assert_eq!(
            s.error(),
            Some("Failed to update presentation: API Quota Exceeded. Please check your API usage and limits.")
        );
        assert_eq!(s.instruction(), "expand");
        assert_eq!(s.state(), ActionState::Idle);
    }

    #[tokio::test]
    async fn test_failed_rewrite_keeps_selection_and_instruction() {
        let provider =
            Arc::new(ScriptedProvider::new().fail(ApiError::Blocked("SAFETY".into())));
        let session = RefCell::new(EditSession::new("abc def"));
        session.borrow_mut().select(4, 7);
        session.borrow_mut().set_instruction("rewrite");

        let err = run_action(&session, &client(&provider), ActionKind::SelectionRewrite)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ActionError::Generation(GenerationError::ContentPolicyBlocked)
        ));
        let s = session.borrow();
        assert_eq!(s.document(), "abc def");
        assert_eq!(s.selection().unwrap().text, "def");
        assert_eq!(s.instruction(), "rewrite");
    }

    #[tokio::test]
    async fn test_missing_credential_message_is_verbatim() {
        let provider = Arc::new(
            ScriptedProvider::new().fail(ApiError::MissingCredential("API_KEY".into())),
        );
        let session = RefCell::new(EditSession::new("doc"));
        session.borrow_mut().set_instruction("x");
        let _ = run_action(&session, &client(&provider), ActionKind::WholeDocumentUpdate).await;
        assert!(session
            .borrow()
            .error()
            .unwrap()
            .starts_with("API_KEY_MISSING:"));
    }

    #[tokio::test]
    async fn test_unusable_provider_config_is_a_setup_error() {
        let provider = Arc::new(ScriptedProvider::new().fail(ApiError::Config(
            "No API key environment variable configured for this provider".into(),
        )));
        let session = RefCell::new(EditSession::new("doc"));
        session.borrow_mut().set_instruction("x");
        let _ = run_action(&session, &client(&provider), ActionKind::WholeDocumentUpdate).await;

        let s = session.borrow();
        let message = s.error().unwrap();
        assert!(message.starts_with("API_KEY_MISSING:"));
        assert!(!message.contains("AI generation failed"));
        assert_eq!(s.document(), "doc");
    }

    #[tokio::test]
    async fn test_dropped_action_returns_session_to_idle() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(ScriptedProvider::new().reply("NEW").gated(gate.clone()));
        let client = client(&provider);
        let session = RefCell::new(EditSession::new("doc"));
        session.borrow_mut().set_instruction("x");

        {
            let action = run_action(&session, &client, ActionKind::WholeDocumentUpdate);
            tokio::pin!(action);
            assert!(futures::poll!(action.as_mut()).is_pending());
            assert!(session.borrow().is_busy());
        }

        {
            let s = session.borrow();
            assert!(!s.is_busy());
            assert!(!s.cancel_active());
            assert_eq!(s.document(), "doc");
            assert_eq!(s.instruction(), "x");
        }

        gate.notify_one();
        run_action(&session, &client, ActionKind::WholeDocumentUpdate)
            .await
            .unwrap();
        assert_eq!(session.borrow().document(), "NEW");
    }

    #[tokio::test]
    async fn test_new_attempt_clears_previous_error() {
        let provider = Arc::new(ScriptedProvider::new().reply("fresh"));
        let session = RefCell::new(EditSession::new("doc"));
        session.borrow_mut().report_error("stale failure");
        session.borrow_mut().set_instruction("x");
        run_action(&session, &client(&provider), ActionKind::WholeDocumentUpdate)
            .await
            .unwrap();
        assert_eq!(session.borrow().error(), None);
    }

    #[tokio::test]
    async fn test_second_action_while_busy_is_ignored() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(
            ScriptedProvider::new()
                .reply("\\begin{document}NEW\\end{document}")
                .gated(gate.clone()),
        );
        let client = client(&provider);
        let session = RefCell::new(EditSession::new("abc def"));
        session.borrow_mut().set_instruction("first");

        let first = run_action(&session, &client, ActionKind::WholeDocumentUpdate);
        let second = async {
            tokio::task::yield_now().await;
            assert_eq!(
                session.borrow().state(),
                ActionState::Busy(ActionKind::WholeDocumentUpdate)
            );
            let version = session.borrow().document_version();
            session.borrow_mut().select(0, 3);
            let err = run_action(&session, &client, ActionKind::SelectionRewrite)
                .await
                .unwrap_err();
            assert!(matches!(err, ActionError::Busy(ActionKind::WholeDocumentUpdate)));
            {
                let s = session.borrow();
                assert_eq!(s.document(), "abc def");
                assert_eq!(s.document_version(), version);
                assert_eq!(s.error(), None);
                assert_eq!(s.state(), ActionState::Busy(ActionKind::WholeDocumentUpdate));
            }
            gate.notify_one();
        };

        let (first, ()) = tokio::join!(first, second);
        first.unwrap();
        assert_eq!(provider.call_count(), 1);
        let s = session.borrow();
        assert_eq!(s.document(), "\\begin{document}NEW\\end{document}");
        // Captured against the old text while busy; dropped by the merge.
        assert!(s.selection().is_none());
    }

    #[tokio::test]
    async fn test_user_edit_during_flight_discards_result() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(ScriptedProvider::new().reply("SPLICED").gated(gate.clone()));
        let client = client(&provider);
        let session = RefCell::new(EditSession::new("hello world"));
        session.borrow_mut().select(6, 11);
        session.borrow_mut().set_instruction("shout");

        let first = run_action(&session, &client, ActionKind::SelectionRewrite);
        let second = async {
            tokio::task::yield_now().await;
            assert!(session.borrow_mut().edit_document("hi world"));
            gate.notify_one();
        };

        let (result, ()) = tokio::join!(first, second);
        assert!(matches!(result, Err(ActionError::Conflict)));
        let s = session.borrow();
        assert_eq!(s.document(), "hi world");
        assert_eq!(s.state(), ActionState::Idle);
        assert!(s.error().unwrap().starts_with("Failed to modify selected code:"));
    }

    #[tokio::test]
    async fn test_cancel_active_settles_without_merging() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(ScriptedProvider::new().reply("never").gated(gate));
        let client = client(&provider);
        let session = RefCell::new(EditSession::new("doc"));
        session.borrow_mut().set_instruction("slow one");
        assert!(!session.borrow().cancel_active());

        let first = run_action(&session, &client, ActionKind::WholeDocumentUpdate);
        let second = async {
            tokio::task::yield_now().await;
            assert!(session.borrow().cancel_active());
        };

        let (result, ()) = tokio::join!(first, second);
        assert!(matches!(
            result,
            Err(ActionError::Generation(GenerationError::Cancelled))
        ));
        let s = session.borrow();
        assert_eq!(s.document(), "doc");
        assert_eq!(s.instruction(), "slow one");
        assert!(!s.is_busy());
        assert!(!s.cancel_active());
    }

    #[test]
    fn test_user_edit_clears_selection_and_ignores_echo() {
        let mut s = EditSession::new("abc");
        s.select(0, 2);
        assert!(!s.edit_document("abc"));
        assert!(s.selection().is_some());
        assert!(s.edit_document("abcd"));
        assert!(s.selection().is_none());
        assert_eq!(s.document_version(), 1);
    }

    #[test]
    fn test_stale_selection_is_refused() {
        let mut s = EditSession::new("abc def");
        s.select(4, 7);
        // Bypass edit_document so the tracker is not cleared.
        s.document.set_document("abc XYZ");
        s.set_instruction("x");
        let err = s.begin(ActionKind::SelectionRewrite).unwrap_err();
        assert!(matches!(err, ActionError::InvalidInput(_)));
        assert!(s.selection().is_none());
        assert!(!s.is_busy());
    }

    #[test]
    fn test_highlight_follows_canonical_document() {
        let mut s = EditSession::new("hello world");
        s.select(6, 11);
        s.set_editor_focused(false);
        s.sync_scroll(ScrollOffset { top: 40.0, left: 2.0 });
        let hl = s.highlight().unwrap();
        assert_eq!(hl.selected, "world");
        assert_eq!(hl.scroll, ScrollOffset { top: 40.0, left: 2.0 });
    }

    #[tokio::test]
    async fn test_load_attachment_reports_bad_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.tex");
        std::fs::write(&path, "x").unwrap();
        let session = RefCell::new(EditSession::new("doc"));

        let err = load_attachment(&session, &path, MediaKind::Image).await.unwrap_err();
        assert!(matches!(err, ActionError::Media(MediaError::NotAnImage(_))));
        assert!(session.borrow().error().unwrap().contains("Please select an image"));

        let pdf = dir.path().join("notes.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        load_attachment(&session, &pdf, MediaKind::Pdf).await.unwrap();
        let s = session.borrow();
        assert_eq!(s.error(), None);
        assert_eq!(
            s.attachment(MediaKind::Pdf).unwrap().file_name.as_deref(),
            Some("notes.pdf")
        );
    }

    #[test]
    fn test_pasted_image_follows_busy_rule() {
        let session = RefCell::new(EditSession::new("doc"));
        session.borrow_mut().set_instruction("x");
        let pending = session
            .borrow_mut()
            .begin(ActionKind::WholeDocumentUpdate)
            .unwrap();

        let pasted = MediaAttachment::from_bytes(MediaKind::Image, b"png", "image/png", None);
        let err = store_attachment(&session, pasted).unwrap_err();
        assert!(matches!(err, ActionError::Busy(ActionKind::WholeDocumentUpdate)));
        assert!(session.borrow().attachment(MediaKind::Image).is_none());

        session
            .borrow_mut()
            .settle(pending, Err(GenerationError::Cancelled))
            .unwrap_err();
        let pasted = MediaAttachment::from_bytes(MediaKind::Image, b"png", "image/png", None);
        store_attachment(&session, pasted).unwrap();
        let s = session.borrow();
        let attachment = s.attachment(MediaKind::Image).unwrap();
        assert!(attachment.data_uri.starts_with("data:image/png;base64,"));
        assert_eq!(attachment.file_name, None);
    }
}
