//! Single-slot speech playback controller.
//!
//! Owns the one playback slot of the chat view: at most one synthesized
//! clip is ever in flight or sounding. The busy flag and active message id
//! are claimed synchronously, before the synthesis request is issued, so
//! two near-simultaneous requests (a double press, or auto-play racing a
//! manual press) can never both proceed.

use super::{AudioOutput, decode_clip};
use crate::backend::BackendClient;
use crate::lang::select_language;
use crate::session::{MessageId, Sender, UserProfile};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Observable playback state. At most one non-null active id at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackState {
    /// Message currently being synthesized or played.
    pub active_message_id: Option<MessageId>,
    /// Whether a playback is in flight.
    pub is_busy: bool,
}

struct Inner {
    state: PlaybackState,
    cancel: Option<CancellationToken>,
    /// Increments on every accepted playback; a finishing task only clears
    /// state when its epoch is still current, so a stale completion cannot
    /// clobber a newer playback started after a stop.
    epoch: u64,
}

/// Controller for the single audio playback slot.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<Mutex<Inner>>,
    backend: Arc<BackendClient>,
    output: Arc<dyn AudioOutput>,
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &self.state())
            .finish()
    }
}

impl PlaybackController {
    /// Create a controller over the given backend and output sink.
    #[must_use]
    pub fn new(backend: Arc<BackendClient>, output: Arc<dyn AudioOutput>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: PlaybackState::default(),
                cancel: None,
                epoch: 0,
            })),
            backend,
            output,
        }
    }

    /// Current playback state snapshot.
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.inner
            .lock()
            .map(|inner| inner.state)
            .unwrap_or_default()
    }

    /// Whether a playback is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state().is_busy
    }

    /// Request playback of a message.
    ///
    /// When idle: claims the slot synchronously, then (in a background
    /// task) selects the spoken language, fetches synthesized audio, and
    /// plays it. When busy: a manual request for the currently active
    /// message stops it (toggle-off); every other request is dropped — the
    /// slot is never queued and never interrupted by a second request.
    ///
    /// Synthesis and playback failures only clear the slot; they are never
    /// surfaced to the timeline.
    pub fn request_playback(
        &self,
        message_id: MessageId,
        text: &str,
        sender: Sender,
        profile: &UserProfile,
        is_auto: bool,
    ) {
        let (token, epoch) = {
            let Ok(mut inner) = self.inner.lock() else {
                return;
            };
            if inner.state.is_busy {
                if !is_auto && inner.state.active_message_id == Some(message_id) {
                    cancel_locked(&mut inner);
                }
                return;
            }

            inner.epoch += 1;
            inner.state = PlaybackState {
                active_message_id: Some(message_id),
                is_busy: true,
            };
            let token = CancellationToken::new();
            inner.cancel = Some(token.clone());
            (token, inner.epoch)
        };

        let language = select_language(text, sender, profile);
        debug!(%message_id, %language, auto = is_auto, "starting playback");

        let this = self.clone();
        let text = text.to_owned();
        tokio::spawn(async move {
            this.run_playback(message_id, text, language, token, epoch)
                .await;
        });
    }

    /// Stop any in-flight playback. Idempotent.
    pub fn stop_playback(&self) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        cancel_locked(&mut inner);
    }

    /// Release the playback slot for good; call when the view goes away so
    /// no audio outlives the chat.
    pub fn teardown(&self) {
        self.stop_playback();
    }

    async fn run_playback(
        &self,
        message_id: MessageId,
        text: String,
        language: crate::lang::LangCode,
        token: CancellationToken,
        epoch: u64,
    ) {
        let outcome = async {
            let payload = self.backend.synthesize(&text, language).await?;
            let clip = decode_clip(payload)?;
            self.output.play(clip, token).await
        }
        .await;

        if let Err(e) = outcome {
            // Audio is best-effort: log and move on, no timeline entry.
            warn!(%message_id, error = %e, "playback abandoned");
        }

        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.epoch == epoch {
            inner.state = PlaybackState::default();
            inner.cancel = None;
        }
    }
}

fn cancel_locked(inner: &mut Inner) {
    if let Some(token) = inner.cancel.take() {
        token.cancel();
    }
    inner.state = PlaybackState::default();
}
