//! Typed authentication-state observable.
//!
//! The original client broadcast login changes as an untyped window-wide
//! event. Here the backend client owns a `tokio::sync::watch` channel and
//! publishes a typed [`AuthState`] instead; the server response is the
//! single source of truth, and any client-side copy is purely a cache.

use tokio::sync::watch;

/// Authentication state as last confirmed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No profile fetch has completed yet.
    #[default]
    Unknown,
    /// The last profile fetch reported a logged-in user.
    LoggedIn,
    /// The last profile fetch reported no user, or a logout completed.
    LoggedOut,
}

impl AuthState {
    /// Whether the server has confirmed a logged-in user.
    #[must_use]
    pub fn is_logged_in(self) -> bool {
        self == Self::LoggedIn
    }
}

/// Receiving side of the auth-state channel.
///
/// `borrow()` reads the current state; `changed().await` waits for the next
/// transition. Dropping the receiver unsubscribes.
pub type AuthWatch = watch::Receiver<AuthState>;
