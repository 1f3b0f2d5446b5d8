//! Application state.
//!
//! The app owns the [`StreamController`] and the [`Transcript`] it writes into, and
//! glues them to the credential provider and the conversation store. Store calls run
//! in spawned tasks that post an [`AppEvent`] back to the event loop; every such
//! event carries the [`ContextEpoch`] it was started in and is ignored once the user
//! has moved on.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use streamchat_auth::{AuthError, CredentialProvider};
use streamchat_core::{AccessToken, Conversation, ConversationId, Message};
use streamchat_store::{ConversationStore, IngestReport, StoreError, DEFAULT_HISTORY_LIMIT};
use streamchat_stream::{
    ConnectionStatus, ContextEpoch, Dialer, EventOutcome, SendOutcome, StreamConfig,
    StreamController, StreamEvent, Transcript,
};

use crate::auth_form::{AuthForm, Submission};
use crate::input::LineEditor;

/// Title of conversations created without one.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New conversation";

/// Shown when a send finds the connection closed.
pub const RECONNECTING_NOTICE: &str = "Connection closed. Reconnecting…";

/// Shown when the active conversation was deleted and none is left.
pub const DELETED_NOTICE: &str = "Conversation deleted. Press Esc then n for a new one.";

/// Builds the store for a freshly obtained token.
pub type StoreFactory =
    Box<dyn Fn(AccessToken) -> Result<Arc<dyn ConversationStore>, StoreError> + Send + Sync>;

// =============================================================================
// Events
// =============================================================================

/// Why the conversation list was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListIntent {
    /// First load after login: open the newest conversation or create one.
    Bootstrap,
    /// Metadata refresh after a stream completed.
    Refresh,
    /// Reload after a deletion.
    AfterDelete {
        /// Whether the deleted conversation was the open one.
        was_current: bool,
    },
}

/// Completion of a background store call.
#[derive(Debug)]
pub enum AppEvent {
    /// Conversations were listed.
    Conversations {
        /// Context the call was started in.
        epoch: ContextEpoch,
        /// What to do with the list.
        intent: ListIntent,
        /// Store result.
        result: Result<Vec<Conversation>, StoreError>,
    },
    /// A conversation was created.
    Created {
        /// Context the call was started in.
        epoch: ContextEpoch,
        /// Store result.
        result: Result<Conversation, StoreError>,
    },
    /// A conversation was deleted.
    Deleted {
        /// Context the call was started in.
        epoch: ContextEpoch,
        /// Deleted conversation.
        id: ConversationId,
        /// Whether it was the open one.
        was_current: bool,
        /// Store result.
        result: Result<(), StoreError>,
    },
    /// History of a conversation was loaded.
    History {
        /// Context the call was started in.
        epoch: ContextEpoch,
        /// Conversation the history belongs to.
        conversation: ConversationId,
        /// Store result.
        result: Result<Vec<Message>, StoreError>,
    },
    /// A document upload finished.
    ///
    /// Uploads outlive conversation switches, so they are tagged with the login
    /// session rather than the context epoch.
    Uploaded {
        /// Session the upload was started in.
        session: u64,
        /// Store result.
        result: Result<IngestReport, StoreError>,
    },
}

// =============================================================================
// UI state
// =============================================================================

/// Top-level screen.
#[derive(Debug, Clone)]
pub enum Screen {
    /// Login or registration.
    Auth(AuthForm),
    /// Conversations and transcript.
    Chat,
}

/// Which column has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    /// Conversation list.
    Conversations,
    /// Transcript and input.
    #[default]
    Chat,
}

impl Focus {
    /// Toggle to the other column.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Conversations => Self::Chat,
            Self::Chat => Self::Conversations,
        }
    }
}

/// Modal dialogs on the chat screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// No dialog.
    #[default]
    Normal,
    /// Prompting for a conversation title.
    NewConversation,
    /// Confirming deletion of the highlighted conversation.
    ConfirmDelete,
    /// Prompting for a PDF path.
    Upload,
}

// =============================================================================
// App
// =============================================================================

/// Application state.
pub struct App<D: Dialer> {
    credentials: Arc<dyn CredentialProvider>,
    make_store: StoreFactory,
    store: Option<Arc<dyn ConversationStore>>,
    controller: StreamController<D>,
    connection: watch::Receiver<ConnectionStatus>,
    events: mpsc::UnboundedSender<AppEvent>,
    history_limit: usize,
    session: u64,

    /// Current screen.
    pub screen: Screen,
    /// Email of the logged-in user.
    pub user_email: Option<String>,
    /// Conversations, newest first.
    pub conversations: Vec<Conversation>,
    /// Highlighted row of the conversation list.
    pub selected: Option<usize>,
    /// Rendered messages of the open conversation.
    pub transcript: Transcript,
    /// Message being typed.
    pub input: LineEditor,
    /// Text of the open dialog.
    pub dialog: LineEditor,
    /// Open dialog.
    pub input_mode: InputMode,
    /// Focused column.
    pub focus: Focus,
    /// Single-key commands instead of typing (toggled with Esc).
    pub command_mode: bool,
    /// Lines scrolled up from the bottom of the transcript.
    pub chat_scroll: usize,
    /// Status line message.
    pub status_message: Option<String>,
    /// Error line message.
    pub error_message: Option<String>,
    /// Set when the user asked to quit.
    pub should_quit: bool,
    /// Animation frame counter for the pending indicator.
    pub animation_frame: usize,
}

impl<D: Dialer> App<D> {
    /// Create the app, returning it with the receivers the event loop must drain.
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        make_store: StoreFactory,
        dialer: D,
        stream_config: StreamConfig,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<StreamEvent>,
        mpsc::UnboundedReceiver<AppEvent>,
    ) {
        let (controller, stream_events) = StreamController::new(stream_config, dialer);
        let (events, app_events) = mpsc::unbounded_channel();
        let app = Self {
            credentials,
            make_store,
            store: None,
            connection: controller.subscribe_status(),
            controller,
            events,
            history_limit: DEFAULT_HISTORY_LIMIT,
            session: 0,
            screen: Screen::Auth(AuthForm::default()),
            user_email: None,
            conversations: Vec::new(),
            selected: None,
            transcript: Transcript::new(),
            input: LineEditor::new(),
            dialog: LineEditor::new(),
            input_mode: InputMode::Normal,
            focus: Focus::Chat,
            command_mode: false,
            chat_scroll: 0,
            status_message: None,
            error_message: None,
            should_quit: false,
            animation_frame: 0,
        };
        (app, stream_events, app_events)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The stream controller.
    #[must_use]
    pub const fn controller(&self) -> &StreamController<D> {
        &self.controller
    }

    /// Connection status as last published.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        *self.connection.borrow()
    }

    /// Returns `true` while the chat connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_status().is_open()
    }

    /// Returns `true` while an answer is streaming.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        self.controller.is_streaming()
    }

    /// The open conversation.
    #[must_use]
    pub fn current_conversation(&self) -> Option<&Conversation> {
        let id = self.controller.conversation()?;
        self.conversations.iter().find(|c| c.id == *id)
    }

    /// The highlighted conversation.
    #[must_use]
    pub fn selected_conversation(&self) -> Option<&Conversation> {
        self.selected.and_then(|i| self.conversations.get(i))
    }

    /// Advance the animation frame.
    pub fn tick_animation(&mut self) {
        self.animation_frame = self.animation_frame.wrapping_add(1);
    }

    /// Spinner glyph for the current frame.
    #[must_use]
    pub fn spinner_char(&self) -> &'static str {
        const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        SPINNER[self.animation_frame % SPINNER.len()]
    }

    /// Set the status message and clear any error.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.error_message = None;
    }

    /// Set the error message.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }

    /// Clear the error message.
    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Move the highlight up, wrapping around.
    pub fn select_prev(&mut self) {
        if self.conversations.is_empty() {
            return;
        }
        self.selected = Some(match self.selected {
            Some(0) | None => self.conversations.len() - 1,
            Some(i) => i - 1,
        });
    }

    /// Move the highlight down, wrapping around.
    pub fn select_next(&mut self) {
        if self.conversations.is_empty() {
            return;
        }
        self.selected = Some(match self.selected {
            Some(i) if i + 1 < self.conversations.len() => i + 1,
            _ => 0,
        });
    }

    /// Scroll the transcript towards older lines.
    pub fn scroll_up(&mut self, amount: usize) {
        self.chat_scroll = self.chat_scroll.saturating_add(amount);
    }

    /// Scroll the transcript towards newer lines.
    pub fn scroll_down(&mut self, amount: usize) {
        self.chat_scroll = self.chat_scroll.saturating_sub(amount);
    }

    /// Open a dialog.
    pub fn open_dialog(&mut self, mode: InputMode) {
        self.dialog.clear();
        self.input_mode = mode;
    }

    /// Close the open dialog.
    pub fn close_dialog(&mut self) {
        self.dialog.clear();
        self.input_mode = InputMode::Normal;
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Submit the login or registration form.
    pub async fn submit_auth(&mut self) {
        let Screen::Auth(form) = &mut self.screen else {
            return;
        };
        let submission = match form.submit() {
            Ok(submission) => submission,
            Err(message) => {
                form.message = Some(message);
                return;
            }
        };

        match submission {
            Submission::Login(req) => {
                let email = req.email.clone();
                match self.credentials.login(req).await {
                    Ok(token) => {
                        if let Err(e) = self.start_session(email, token) {
                            self.auth_message(format!("Could not open session: {e}"));
                        }
                    }
                    Err(AuthError::InvalidCredentials(_)) => {
                        self.auth_message("Incorrect email or password.");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Login failed");
                        self.auth_message(format!("Login failed: {e}"));
                    }
                }
            }
            Submission::Register(req) => {
                let email = req.email.clone();
                match self.credentials.register(req).await {
                    Ok(_) => {
                        tracing::info!("Account created");
                        let mut form = AuthForm::login(Some(&email));
                        form.message = Some("Account created. Log in.".to_string());
                        self.screen = Screen::Auth(form);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Registration failed");
                        self.auth_message(format!("Registration failed: {e}"));
                    }
                }
            }
        }
    }

    fn auth_message(&mut self, message: impl Into<String>) {
        if let Screen::Auth(form) = &mut self.screen {
            form.message = Some(message.into());
        }
    }

    /// Enter the chat screen with a token and start loading conversations.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be built for the token.
    pub fn start_session(&mut self, email: String, token: AccessToken) -> Result<(), StoreError> {
        let store = (self.make_store)(token.clone())?;
        self.store = Some(store);
        self.controller.authenticate(token);
        tracing::info!(email = %email, "Logged in");

        self.user_email = Some(email);
        self.screen = Screen::Chat;
        self.focus = Focus::Chat;
        self.command_mode = false;
        self.spawn_list(ListIntent::Bootstrap);
        Ok(())
    }

    /// Log out and return to the login form.
    pub fn logout(&mut self) {
        self.controller.logout(&mut self.transcript);
        self.session += 1;
        self.store = None;
        self.conversations.clear();
        self.selected = None;
        self.transcript.clear();
        self.input.clear();
        self.close_dialog();
        self.status_message = None;
        self.error_message = None;
        self.screen = Screen::Auth(AuthForm::login(self.user_email.take().as_deref()));
        tracing::info!("Logged out");
    }

    // =========================================================================
    // Conversations
    // =========================================================================

    /// Open a conversation: reset streaming, clear the transcript and load history.
    /// The connection is opened once the history has arrived.
    pub fn open_conversation(&mut self, id: ConversationId) {
        let epoch = self
            .controller
            .switch_conversation(&mut self.transcript, Some(id.clone()));
        self.transcript.clear();
        self.chat_scroll = 0;
        self.selected = self.conversations.iter().position(|c| c.id == id);

        let limit = self.history_limit;
        self.spawn_store(move |store| async move {
            let result = store.list_messages(&id, limit).await;
            AppEvent::History {
                epoch,
                conversation: id,
                result,
            }
        });
    }

    /// Open the highlighted conversation, or reconnect it if it is already open.
    pub fn open_selected(&mut self) {
        let Some(id) = self.selected_conversation().map(|c| c.id.clone()) else {
            return;
        };
        if self.controller.conversation() == Some(&id) {
            if !self.is_connected() {
                self.reconnect();
            }
        } else {
            self.open_conversation(id);
        }
    }

    /// Create a conversation and open it once created.
    pub fn create_conversation(&mut self, title: &str) {
        let title = match title.trim() {
            "" => DEFAULT_CONVERSATION_TITLE.to_string(),
            t => t.to_string(),
        };
        let epoch = self.controller.epoch();
        self.spawn_store(move |store| async move {
            let result = store.create_conversation(&title).await;
            AppEvent::Created { epoch, result }
        });
    }

    /// Delete the highlighted conversation.
    ///
    /// Deleting the open conversation resets streaming and closes the connection
    /// before the request is made.
    pub fn delete_selected(&mut self) {
        let Some(id) = self.selected_conversation().map(|c| c.id.clone()) else {
            return;
        };
        let was_current = self.controller.conversation() == Some(&id);
        if was_current {
            self.controller.switch_conversation(&mut self.transcript, None);
            self.transcript.clear();
        }

        let epoch = self.controller.epoch();
        self.spawn_store(move |store| async move {
            let result = store.delete_conversation(&id).await;
            AppEvent::Deleted {
                epoch,
                id,
                was_current,
                result,
            }
        });
    }

    /// Upload a document for ingestion.
    pub fn start_upload(&mut self, path: &str) {
        let path = PathBuf::from(path.trim());
        if path.as_os_str().is_empty() {
            self.set_error("Choose a file first.");
            return;
        }
        self.set_status(format!("Indexing {}…", path.display()));
        let session = self.session;
        self.spawn_store(move |store| async move {
            let result = store.ingest_document(&path).await;
            AppEvent::Uploaded { session, result }
        });
    }

    fn spawn_list(&self, intent: ListIntent) {
        let epoch = self.controller.epoch();
        self.spawn_store(move |store| async move {
            let result = store.list_conversations().await;
            AppEvent::Conversations {
                epoch,
                intent,
                result,
            }
        });
    }

    fn spawn_store<F, Fut>(&self, call: F)
    where
        F: FnOnce(Arc<dyn ConversationStore>) -> Fut,
        Fut: Future<Output = AppEvent> + Send + 'static,
    {
        let Some(store) = self.store.clone() else {
            tracing::debug!("No session, store call skipped");
            return;
        };
        let events = self.events.clone();
        let call = call(store);
        tokio::spawn(async move {
            // The receiver is gone only during shutdown.
            let _ = events.send(call.await);
        });
    }

    fn set_conversations(&mut self, conversations: Vec<Conversation>) {
        let highlighted = self.selected_conversation().map(|c| c.id.clone());
        self.conversations = conversations;
        self.selected = highlighted
            .as_ref()
            .or(self.controller.conversation())
            .and_then(|id| self.conversations.iter().position(|c| c.id == *id))
            .or_else(|| (!self.conversations.is_empty()).then_some(0));
    }

    // =========================================================================
    // Chat
    // =========================================================================

    /// Send the typed message.
    pub fn submit_message(&mut self) {
        let text = self.input.take();
        match self
            .controller
            .send(&mut self.transcript, &text, Instant::now())
        {
            SendOutcome::Sent { .. } => {
                self.chat_scroll = 0;
            }
            SendOutcome::Reconnecting => {
                self.transcript.push_notice(RECONNECTING_NOTICE);
            }
            SendOutcome::Empty => {}
            SendOutcome::NoConversation => {
                self.set_error("Open or create a conversation first.");
            }
            SendOutcome::Dropped => {
                self.set_error("Message could not be sent.");
            }
        }
    }

    /// Reconnect the open conversation.
    pub fn reconnect(&mut self) {
        if self.controller.reconnect().is_some() {
            self.set_status("Reconnecting…");
        } else {
            self.set_error("No conversation to reconnect.");
        }
    }

    /// Close the connection, keeping the context.
    pub fn disconnect(&mut self) {
        self.controller.disconnect();
    }

    /// Apply an event from the stream controller's receiver.
    pub fn handle_stream_event(&mut self, event: StreamEvent) -> EventOutcome {
        let outcome = self
            .controller
            .handle_event(&mut self.transcript, event, Instant::now());
        match outcome {
            EventOutcome::Retry(SendOutcome::Dropped) => {
                self.set_error("Message not sent: connection unavailable.");
            }
            EventOutcome::Retry(SendOutcome::Sent { .. }) | EventOutcome::Appended { .. } => {
                self.chat_scroll = 0;
            }
            _ => {}
        }
        outcome
    }

    /// Wait for the next watchdog tick.
    pub async fn watchdog_tick(&mut self) -> Instant {
        self.controller.watchdog_tick().await
    }

    /// Check the watchdog at `now`. Returns `true` if a stream completed, in which
    /// case a conversation refresh has been requested.
    pub fn on_watchdog(&mut self, now: Instant) -> bool {
        let Some(done) = self.controller.poll_watchdog(&mut self.transcript, now) else {
            return false;
        };
        tracing::debug!(sink = %done.sink, chunks = done.stats.chunks, "Refreshing conversations");
        self.spawn_list(ListIntent::Refresh);
        true
    }

    // =========================================================================
    // Store results
    // =========================================================================

    /// Apply the result of a background store call. Returns `true` if anything
    /// changed.
    pub fn handle_app_event(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::Uploaded { session, .. } if session != self.session => {
                tracing::debug!(session, current = self.session, "Ignoring upload from previous session");
                false
            }
            AppEvent::Uploaded { result, .. } => {
                match result {
                    Ok(report) if report.is_ok() => {
                        self.set_status(format!("Indexed {} ({} chunks)", report.file, report.chunks));
                    }
                    Ok(report) => self.set_error(format!("Upload failed: {}", report.status)),
                    Err(e) => self.set_error(format!("Upload failed: {e}")),
                }
                true
            }
            AppEvent::Conversations { epoch, .. }
            | AppEvent::Created { epoch, .. }
            | AppEvent::Deleted { epoch, .. }
            | AppEvent::History { epoch, .. }
                if !self.controller.is_current(epoch) =>
            {
                tracing::debug!(%epoch, current = %self.controller.epoch(), "Ignoring stale store result");
                false
            }
            AppEvent::Conversations { intent, result, .. } => {
                self.on_conversations(intent, result);
                true
            }
            AppEvent::Created { result, .. } => {
                match result {
                    Ok(conversation) => {
                        let id = conversation.id.clone();
                        self.conversations.retain(|c| c.id != id);
                        self.conversations.insert(0, conversation);
                        self.open_conversation(id);
                    }
                    Err(e) => self.set_error(format!("Could not create conversation: {e}")),
                }
                true
            }
            AppEvent::Deleted {
                id,
                was_current,
                result,
                ..
            } => {
                match result {
                    Ok(()) => {
                        tracing::info!(conversation_id = %id, "Conversation deleted");
                        self.conversations.retain(|c| c.id != id);
                    }
                    Err(e) => self.set_error(format!("Could not delete conversation: {e}")),
                }
                self.spawn_list(ListIntent::AfterDelete { was_current });
                true
            }
            AppEvent::History {
                conversation,
                result,
                ..
            } => {
                // A send made while the history was loading may already own the
                // connection and a live sink; history goes in front of it.
                match result {
                    Ok(history) if history.is_empty() => {
                        self.transcript.prepend_notice(self.greeting());
                    }
                    Ok(history) => self.transcript.load(history),
                    Err(e) => {
                        tracing::warn!(conversation_id = %conversation, error = %e, "History load failed");
                        self.transcript
                            .prepend_notice(format!("Could not load history: {e}"));
                    }
                }
                self.controller.ensure_connected();
                true
            }
        }
    }

    fn on_conversations(&mut self, intent: ListIntent, result: Result<Vec<Conversation>, StoreError>) {
        let conversations = match result {
            Ok(conversations) => conversations,
            Err(e) if intent == ListIntent::Refresh => {
                tracing::warn!(error = %e, "Conversation refresh failed");
                return;
            }
            Err(e) => {
                self.set_error(format!("Could not load conversations: {e}"));
                return;
            }
        };
        self.set_conversations(conversations);

        match intent {
            ListIntent::Refresh => {}
            ListIntent::Bootstrap => match self.conversations.first() {
                Some(first) => self.open_conversation(first.id.clone()),
                None => self.create_conversation(DEFAULT_CONVERSATION_TITLE),
            },
            ListIntent::AfterDelete { was_current: true } => match self.conversations.first() {
                Some(first) => self.open_conversation(first.id.clone()),
                None => self.transcript.push_notice(DELETED_NOTICE),
            },
            ListIntent::AfterDelete { was_current: false } => {}
        }
    }

    fn greeting(&self) -> String {
        match &self.user_email {
            Some(email) => format!("Hello {email}. Ask your question."),
            None => "Hello. Ask your question.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use streamchat_auth::MockCredentialProvider;
    use streamchat_core::Role;
    use streamchat_store::MemoryStore;
    use streamchat_stream::{EntryKind, EntryState, MemoryDialer, PeerHandle, SinkOrigin};

    const EMAIL: &str = "ada@example.com";

    struct Fixture {
        app: App<MemoryDialer>,
        stream_events: mpsc::UnboundedReceiver<StreamEvent>,
        app_events: mpsc::UnboundedReceiver<AppEvent>,
        store: Arc<MemoryStore>,
        dialer: MemoryDialer,
    }

    impl Fixture {
        fn new(store: MemoryStore) -> Self {
            let store = Arc::new(store);
            let shared = Arc::clone(&store);
            let make_store: StoreFactory =
                Box::new(move |_token| Ok(Arc::clone(&shared) as Arc<dyn ConversationStore>));
            let dialer = MemoryDialer::new();
            let (app, stream_events, app_events) = App::new(
                Arc::new(MockCredentialProvider::with_account(EMAIL, "pw")),
                make_store,
                dialer.clone(),
                StreamConfig::default(),
            );
            Self {
                app,
                stream_events,
                app_events,
                store,
                dialer,
            }
        }

        fn login(&mut self) {
            self.app
                .start_session(EMAIL.to_string(), AccessToken::new("token"))
                .unwrap();
        }

        async fn pump_app(&mut self) -> bool {
            let event = self.app_events.recv().await.unwrap();
            self.app.handle_app_event(event)
        }

        async fn pump_stream(&mut self) -> EventOutcome {
            let event = self.stream_events.recv().await.unwrap();
            self.app.handle_stream_event(event)
        }

        async fn wait_open(&mut self) -> PeerHandle {
            while self.pump_stream().await != EventOutcome::StatusChanged(ConnectionStatus::Open) {}
            self.dialer.take_peer().unwrap()
        }

        /// Login, bootstrap and wait for the connection.
        async fn ready(&mut self) -> PeerHandle {
            self.login();
            self.pump_app().await; // conversations
            self.pump_app().await; // history
            self.wait_open().await
        }

        fn type_and_send(&mut self, text: &str) {
            self.app.input = LineEditor::with_text(text);
            self.app.submit_message();
        }
    }

    fn seeded(titles: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        for title in titles {
            store.seed(title, vec![Message::user("earlier"), Message::assistant("reply")]);
        }
        store
    }

    // =========================================================================
    // Session
    // =========================================================================

    #[tokio::test]
    async fn login_form_opens_chat() {
        let mut f = Fixture::new(seeded(&["first"]));
        let mut form = AuthForm::default();
        for c in EMAIL.chars() {
            form.focused_editor().insert(c);
        }
        form.next_field();
        form.focused_editor().insert('p');
        form.focused_editor().insert('w');
        f.app.screen = Screen::Auth(form);

        f.app.submit_auth().await;

        assert!(matches!(f.app.screen, Screen::Chat));
        assert_eq!(f.app.user_email.as_deref(), Some(EMAIL));
        assert!(f.app.controller().is_authenticated());
    }

    #[tokio::test]
    async fn wrong_password_stays_on_form() {
        let mut f = Fixture::new(MemoryStore::new());
        let mut form = AuthForm::login(Some(EMAIL));
        form.focused_editor().insert('x');
        f.app.screen = Screen::Auth(form);

        f.app.submit_auth().await;

        let Screen::Auth(form) = &f.app.screen else {
            panic!("left the login form");
        };
        assert_eq!(form.message.as_deref(), Some("Incorrect email or password."));
    }

    #[tokio::test]
    async fn bootstrap_opens_newest_conversation_with_history() {
        let mut f = Fixture::new(seeded(&["old", "new"]));
        f.login();

        f.pump_app().await;
        assert_eq!(f.app.conversations.len(), 2);
        assert_eq!(f.app.controller().conversation().map(ConversationId::as_str), Some("2"));

        f.pump_app().await;
        assert_eq!(f.app.transcript.len(), 2);
        f.wait_open().await;
        assert!(f.app.is_connected());
    }

    #[tokio::test]
    async fn bootstrap_creates_conversation_when_empty() {
        let mut f = Fixture::new(MemoryStore::new());
        f.login();

        f.pump_app().await; // empty list
        f.pump_app().await; // created
        assert_eq!(f.app.conversations.len(), 1);
        assert_eq!(f.app.conversations[0].title, DEFAULT_CONVERSATION_TITLE);

        f.pump_app().await; // empty history
        let entries = f.app.transcript.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Notice);
        assert!(entries[0].text.contains(EMAIL));
    }

    #[tokio::test]
    async fn logout_tears_everything_down() {
        let mut f = Fixture::new(seeded(&["first"]));
        let _peer = f.ready().await;

        f.app.logout();

        assert!(!f.app.controller().is_authenticated());
        assert!(f.app.conversations.is_empty());
        assert!(f.app.transcript.is_empty());
        assert_eq!(f.app.connection_status(), ConnectionStatus::Closed);
        let Screen::Auth(form) = &f.app.screen else {
            panic!("still on chat screen");
        };
        assert_eq!(form.editor(crate::auth_form::Field::Email).as_str(), EMAIL);
    }

    // =========================================================================
    // Streaming
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn completed_stream_refreshes_conversations() {
        let mut f = Fixture::new(seeded(&["first"]));
        let mut peer = f.ready().await;
        let start = Instant::now();

        f.type_and_send("hello");
        assert_eq!(peer.received().await.as_deref(), Some("hello"));

        peer.push("Hi");
        peer.push(" there");
        f.pump_stream().await;
        f.pump_stream().await;

        let last = f.app.transcript.entries().last().unwrap().clone();
        assert_eq!(last.text, "Hi there");
        assert_eq!(last.kind, EntryKind::Message(Role::Assistant));

        let calls_before = f.store.list_calls();
        loop {
            let now = f.app.watchdog_tick().await;
            if f.app.on_watchdog(now) {
                break;
            }
        }
        assert!(Instant::now() - start > Duration::from_millis(3000));
        assert_eq!(
            f.app.transcript.entries().last().unwrap().state,
            EntryState::Settled
        );

        assert!(f.pump_app().await);
        assert_eq!(f.store.list_calls(), calls_before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_failure_is_swallowed() {
        let mut f = Fixture::new(seeded(&["first"]));
        let _peer = f.ready().await;
        f.type_and_send("hello");

        f.store.set_failing(true);
        loop {
            let now = f.app.watchdog_tick().await;
            if f.app.on_watchdog(now) {
                break;
            }
        }
        f.pump_app().await;

        assert!(f.app.error_message.is_none());
        assert_eq!(f.app.conversations.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn send_while_disconnected_shows_notice_then_drops() {
        let mut f = Fixture::new(seeded(&["first"]));
        f.dialer.refuse_connections(true);
        f.login();
        f.pump_app().await;
        f.pump_app().await;

        f.type_and_send("anyone?");
        assert_eq!(
            f.app.transcript.entries().last().unwrap().text,
            RECONNECTING_NOTICE
        );

        loop {
            if let EventOutcome::Retry(outcome) = f.pump_stream().await {
                assert_eq!(outcome, SendOutcome::Dropped);
                break;
            }
        }
        assert!(f.app.error_message.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn history_arriving_after_send_keeps_the_answer() {
        let mut f = Fixture::new(seeded(&["first"]));
        f.login();
        f.pump_app().await; // conversations; history stays queued

        f.type_and_send("hi");
        let sink = loop {
            if let EventOutcome::Retry(SendOutcome::Sent { sink }) = f.pump_stream().await {
                break sink;
            }
        };
        let mut peer = f.dialer.take_peer().unwrap();
        assert_eq!(peer.received().await.as_deref(), Some("hi"));
        let connection = f.app.controller().connection_id();

        f.pump_app().await; // history
        assert_eq!(f.app.controller().connection_id(), connection);
        assert_eq!(f.dialer.dials(), 1);

        peer.push("answer");
        assert_eq!(
            f.pump_stream().await,
            EventOutcome::Appended {
                sink,
                origin: SinkOrigin::Tracked
            }
        );

        let texts: Vec<&str> = f
            .app
            .transcript
            .entries()
            .iter()
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(texts, ["earlier", "reply", RECONNECTING_NOTICE, "hi", "answer"]);
    }

    #[tokio::test]
    async fn send_without_conversation_reports_error() {
        let mut f = Fixture::new(MemoryStore::new());
        f.type_and_send("hi");
        assert!(f.app.error_message.is_some());
    }

    // =========================================================================
    // Conversation management
    // =========================================================================

    #[tokio::test]
    async fn stale_history_is_ignored() {
        let mut f = Fixture::new(MemoryStore::new());
        let a = f.store.seed("a", vec![Message::assistant("from a")]);
        let b = f.store.seed("b", vec![Message::assistant("from b")]);
        f.app.store = Some(Arc::clone(&f.store) as Arc<dyn ConversationStore>);
        f.app.controller.authenticate(AccessToken::new("token"));

        f.app.open_conversation(a);
        f.app.open_conversation(b.clone());

        let first = f.pump_app().await;
        let second = f.pump_app().await;
        assert!(first ^ second);

        let texts: Vec<_> = f.app.transcript.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["from b"]);
        assert_eq!(f.app.controller().conversation(), Some(&b));
    }

    #[tokio::test]
    async fn deleting_current_opens_first_remaining() {
        let mut f = Fixture::new(seeded(&["keep", "drop"]));
        let _peer = f.ready().await;
        assert_eq!(f.app.current_conversation().unwrap().title, "drop");

        f.app.selected = Some(0);
        f.app.delete_selected();
        assert!(f.app.controller().conversation().is_none());
        assert!(f.app.transcript.is_empty());

        f.pump_app().await; // deleted
        f.pump_app().await; // list
        assert_eq!(f.app.conversations.len(), 1);
        assert_eq!(f.app.current_conversation().unwrap().title, "keep");
    }

    #[tokio::test]
    async fn deleting_last_conversation_leaves_notice() {
        let mut f = Fixture::new(seeded(&["only"]));
        let _peer = f.ready().await;

        f.app.selected = Some(0);
        f.app.delete_selected();
        f.pump_app().await;
        f.pump_app().await;

        assert!(f.app.conversations.is_empty());
        assert!(f.app.controller().conversation().is_none());
        assert_eq!(f.app.transcript.entries()[0].text, DELETED_NOTICE);
        assert_eq!(f.app.connection_status(), ConnectionStatus::Closed);
    }

    #[tokio::test]
    async fn deleting_other_conversation_keeps_current() {
        let mut f = Fixture::new(seeded(&["other", "current"]));
        let _peer = f.ready().await;
        let epoch = f.app.controller().epoch();

        f.app.selected = Some(1);
        f.app.delete_selected();
        f.pump_app().await;
        f.pump_app().await;

        assert_eq!(f.app.controller().epoch(), epoch);
        assert_eq!(f.app.current_conversation().unwrap().title, "current");
        assert!(f.app.is_connected());
    }

    #[tokio::test]
    async fn created_conversation_is_opened() {
        let mut f = Fixture::new(seeded(&["first"]));
        let _peer = f.ready().await;

        f.app.create_conversation("  ");
        f.pump_app().await;

        assert_eq!(f.app.conversations[0].title, DEFAULT_CONVERSATION_TITLE);
        assert_eq!(f.app.selected, Some(0));
        assert_eq!(
            f.app.controller().conversation(),
            Some(&f.app.conversations[0].id)
        );
    }

    #[tokio::test]
    async fn upload_finishing_after_logout_is_ignored() {
        let mut f = Fixture::new(seeded(&["first"]));
        f.login();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"pdf").unwrap();

        f.app.start_upload(path.to_str().unwrap());
        f.app.logout();

        // Bootstrap list and upload both belong to the old session.
        assert!(!f.pump_app().await);
        assert!(!f.pump_app().await);
        assert_eq!(f.app.status_message, None);
        assert_eq!(f.store.uploads(), ["notes.pdf"]);
    }

    #[tokio::test]
    async fn upload_reports_chunks() {
        let mut f = Fixture::new(seeded(&["first"]));
        f.login();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, vec![0_u8; 2500]).unwrap();

        f.app.start_upload(path.to_str().unwrap());
        // The bootstrap list arrives first.
        f.pump_app().await;
        f.pump_app().await;
        while f.app.status_message.as_deref().is_some_and(|s| s.starts_with("Indexing")) {
            f.pump_app().await;
        }

        assert_eq!(f.app.status_message.as_deref(), Some("Indexed notes.pdf (3 chunks)"));
        assert_eq!(f.store.uploads(), ["notes.pdf"]);
    }

    #[test]
    fn selection_wraps() {
        let (mut app, _s, _a) = App::new(
            Arc::new(MockCredentialProvider::new()),
            Box::new(|_| Err(StoreError::InvalidToken)),
            MemoryDialer::new(),
            StreamConfig::default(),
        );
        app.conversations = vec![
            Conversation {
                id: ConversationId::from(1),
                title: "a".into(),
            },
            Conversation {
                id: ConversationId::from(2),
                title: "b".into(),
            },
        ];
        app.select_prev();
        assert_eq!(app.selected, Some(1));
        app.select_next();
        assert_eq!(app.selected, Some(0));
    }
}
