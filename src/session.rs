//! Chat session lifecycle and message timeline.
//!
//! [`ChatSession`] owns the session state machine and the ordered message
//! timeline, and mediates every chat/session call to the tutor backend.
//! All failures are recovered locally: the user always sees a plausible
//! message in the chat or a clear session state, never a crash.

use crate::audio::PlaybackController;
use crate::autoplay::AutoplayPolicy;
use crate::backend::BackendClient;
use crate::lang::LangCode;
use std::sync::Arc;
use tracing::{info, warn};

/// Monotonically increasing message identifier, unique per view lifetime.
pub type MessageId = u64;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    /// The learner.
    User,
    /// The AI tutor.
    Bot,
}

/// One entry of the chat timeline. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Timeline-unique, monotonically increasing id.
    pub id: MessageId,
    /// Message text.
    pub text: String,
    /// Producer role.
    pub sender: Sender,
}

/// Self-reported proficiency in the target language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkillLevel {
    /// Very simple vocabulary and structures.
    Beginner,
    /// Limited vocabulary for high comprehension.
    #[default]
    Intermediate,
    /// Free conversation.
    Advanced,
}

impl SkillLevel {
    /// Parse the backend's skill-level tag; unknown tags map to the
    /// service default.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "beginner" => Self::Beginner,
            "advanced" => Self::Advanced,
            _ => Self::Intermediate,
        }
    }
}

/// User profile as reported by the backend. Read-only on the client;
/// mutations happen server-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Whether the server confirmed an authenticated user.
    pub logged_in: bool,
    /// The learner's native language, when recognized.
    pub native_language: Option<LangCode>,
    /// The language being practiced, when recognized.
    pub target_language: Option<LangCode>,
    /// Proficiency level.
    pub skill_level: SkillLevel,
    /// Preferred conversation length, in turns.
    pub conversation_length: u32,
}

/// Lifecycle state of the chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session yet (also the "not ready" resting state when the profile
    /// reports no authenticated user).
    #[default]
    Uninitialized,
    /// Profile fetch / session handshake in progress.
    Initializing,
    /// Session established; sends are accepted.
    Active,
    /// User-triggered reset in progress.
    Resetting,
    /// Initialization failed; needs a manual reset or restart.
    Failed,
}

/// The tutor's opening line, seeded locally after a successful handshake.
pub const GREETING: &str = "Hello, what would you like to talk about today?";

/// Shown in place of a tutor reply when a send fails; the learner must
/// always see a response, even a degraded one.
const SEND_FALLBACK: &str = "Sorry, I couldn't get a response. Please try again.";

/// Seeded as the sole timeline entry when initialization fails.
const INIT_FAILURE: &str =
    "Sorry, I couldn't reach your tutor. Please reset the chat or try again later.";

/// Owner of the session state machine and the message timeline.
pub struct ChatSession {
    backend: Arc<BackendClient>,
    state: SessionState,
    timeline: Vec<Message>,
    profile: Option<UserProfile>,
    next_id: MessageId,
    outstanding: bool,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("state", &self.state)
            .field("timeline_len", &self.timeline.len())
            .field("outstanding", &self.outstanding)
            .finish()
    }
}

impl ChatSession {
    /// Create an uninitialized session over the given backend.
    #[must_use]
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self {
            backend,
            state: SessionState::default(),
            timeline: Vec::new(),
            profile: None,
            next_id: 1,
            outstanding: false,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The ordered message timeline.
    #[must_use]
    pub fn timeline(&self) -> &[Message] {
        &self.timeline
    }

    /// The profile fetched during initialization, if any.
    #[must_use]
    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// Whether a send is outstanding (the "tutor is thinking" condition).
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.outstanding
    }

    /// Fetch the profile and establish a server session.
    ///
    /// Ends in `Active` (timeline seeded with the greeting), `Failed`
    /// (timeline seeded with one diagnostic message), or back in
    /// `Uninitialized` when the server reports no authenticated user — the
    /// external login guard owns that case, this never crashes on it.
    pub async fn initialize(&mut self) {
        if matches!(
            self.state,
            SessionState::Active | SessionState::Initializing
        ) {
            return;
        }
        self.state = SessionState::Initializing;

        let profile = match self.backend.fetch_profile().await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "profile fetch failed");
                self.fail();
                return;
            }
        };

        if !profile.logged_in {
            info!("no authenticated user; session not started");
            self.profile = Some(profile);
            self.state = SessionState::Uninitialized;
            return;
        }
        self.profile = Some(profile);

        match self.backend.start_session().await {
            Ok(()) => {
                self.timeline.clear();
                self.push(Sender::Bot, GREETING);
                self.state = SessionState::Active;
                info!("chat session active");
            }
            Err(e) => {
                warn!(error = %e, "session handshake failed");
                self.fail();
            }
        }
    }

    /// Send a user message and append the tutor's reply.
    ///
    /// Returns `false` without touching the timeline when the text trims
    /// empty, the session is not active, or a prior send is still
    /// outstanding (one in-flight send per session, no pipelining). The
    /// user message is appended optimistically before the round-trip and
    /// never rolled back; a failed round-trip appends a fixed fallback
    /// reply instead of surfacing an error.
    pub async fn send_user_message(&mut self, text: &str) -> bool {
        if text.trim().is_empty() || self.state != SessionState::Active || self.outstanding {
            return false;
        }

        self.push(Sender::User, text);
        self.outstanding = true;

        match self.backend.send_message(text).await {
            Ok(reply) => {
                self.push(Sender::Bot, &reply);
            }
            Err(e) => {
                warn!(error = %e, "chat send failed; substituting fallback reply");
                self.push(Sender::Bot, SEND_FALLBACK);
            }
        }
        self.outstanding = false;
        true
    }

    /// Reset the conversation: stop playback, clear the auto-play cursor
    /// and the timeline, clear the server-side context (best-effort), and
    /// re-initialize. Accepted from `Active` and from `Failed` (the manual
    /// recovery path); a no-op otherwise.
    pub async fn reset(&mut self, controller: &PlaybackController, autoplay: &mut AutoplayPolicy) {
        if !matches!(self.state, SessionState::Active | SessionState::Failed) {
            return;
        }
        self.state = SessionState::Resetting;

        controller.teardown();
        autoplay.reset();
        self.timeline.clear();
        self.outstanding = false;

        if let Err(e) = self.backend.reset_session().await {
            warn!(error = %e, "chat reset failed; re-initializing anyway");
        }

        self.state = SessionState::Uninitialized;
        self.initialize().await;
    }

    fn fail(&mut self) {
        self.timeline.clear();
        self.push(Sender::Bot, INIT_FAILURE);
        self.state = SessionState::Failed;
    }

    fn push(&mut self, sender: Sender, text: &str) {
        let id = self.next_id;
        self.next_id += 1;
        self.timeline.push(Message {
            id,
            text: text.to_owned(),
            sender,
        });
    }
}
