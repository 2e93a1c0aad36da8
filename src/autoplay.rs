//! Auto-play policy for newly arrived tutor messages.
//!
//! Observes the timeline after every update and speaks each new bot
//! message at most once per session, without ever preempting a playback
//! already in flight. The cursor is advanced before the playback request,
//! so re-observing an unchanged timeline can never replay a message.

use crate::audio::PlaybackController;
use crate::session::{Message, MessageId, Sender, UserProfile};
use std::time::Duration;

/// Decides when a newly arrived tutor message is spoken automatically.
#[derive(Debug)]
pub struct AutoplayPolicy {
    last_auto_played: Option<MessageId>,
    delay: Duration,
}

impl AutoplayPolicy {
    /// Create a policy with the given pre-playback delay.
    ///
    /// The delay gives a new message time to be rendered before audio
    /// starts.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            last_auto_played: None,
            delay,
        }
    }

    /// The id of the last auto-played message, if any.
    #[must_use]
    pub fn last_auto_played(&self) -> Option<MessageId> {
        self.last_auto_played
    }

    /// Forget the cursor; called when the timeline is cleared on reset.
    pub fn reset(&mut self) {
        self.last_auto_played = None;
    }

    /// Inspect the timeline after an update and trigger playback of a
    /// newly arrived bot message.
    ///
    /// Does nothing when the controller is busy (a user-initiated playback
    /// is never fought), when the timeline is empty, when the last message
    /// is not from the tutor, or when it was already auto-played.
    pub async fn observe(
        &mut self,
        timeline: &[Message],
        profile: &UserProfile,
        controller: &PlaybackController,
    ) {
        if controller.is_busy() {
            return;
        }
        let Some(last) = timeline.last() else {
            return;
        };
        if last.sender != Sender::Bot || self.last_auto_played == Some(last.id) {
            return;
        }

        // Claim the id before any await so a re-render during the delay
        // cannot schedule the same message twice.
        self.last_auto_played = Some(last.id);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        controller.request_playback(last.id, &last.text, last.sender, profile, true);
    }
}
