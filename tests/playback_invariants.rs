//! Playback-Slot Invariant Tests
//!
//! Verify the single-slot guarantees of the playback controller against a
//! mocked synthesis endpoint and a scripted audio sink: at most one
//! playback at a time, manual toggle-off, auto-play idempotence, teardown,
//! and silent recovery from synthesis failure.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use charla::{
    AudioClip, AudioOutput, AutoplayPolicy, BackendClient, LangCode, Message, PlaybackController,
    Sender, SkillLevel, UserProfile,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Audio sink that records play calls and, when `hold` is set, keeps the
/// slot occupied until released or cancelled.
struct ScriptedOutput {
    hold: bool,
    started: AtomicUsize,
    finished: AtomicUsize,
    release: Notify,
}

impl ScriptedOutput {
    fn new(hold: bool) -> Arc<Self> {
        Arc::new(Self {
            hold,
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            release: Notify::new(),
        })
    }

    fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AudioOutput for ScriptedOutput {
    async fn play(&self, _clip: AudioClip, cancel: CancellationToken) -> charla::Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if self.hold {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = self.release.notified() => {}
            }
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Minimal mono 16-bit PCM WAV payload the decoder accepts.
fn wav_payload() -> Vec<u8> {
    let samples: Vec<i16> = (0..240).map(|i| (i % 80) * 250).collect();
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24_000u32.to_le_bytes());
    out.extend_from_slice(&48_000u32.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in &samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

async fn mount_tts(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/text-to-speech"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(wav_payload()))
        .mount(server)
        .await;
}

fn profile() -> UserProfile {
    UserProfile {
        logged_in: true,
        native_language: Some(LangCode::En),
        target_language: Some(LangCode::Es),
        skill_level: SkillLevel::Intermediate,
        conversation_length: 10,
    }
}

fn bot(id: u64, text: &str) -> Message {
    Message {
        id,
        text: text.to_owned(),
        sender: Sender::Bot,
    }
}

/// Poll until `check` passes or a 2-second budget runs out.
async fn wait_until(what: &str, check: impl Fn() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for: {what}");
}

// ────────────────────────────────────────────────────────────────────────────
// Single-slot guarantees
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn at_most_one_playback_at_a_time() {
    let server = MockServer::start().await;
    mount_tts(&server).await;
    let backend = Arc::new(BackendClient::new(server.uri()).unwrap());
    let output = ScriptedOutput::new(true);
    let controller = PlaybackController::new(backend, Arc::clone(&output) as Arc<dyn AudioOutput>);

    controller.request_playback(1, "Hola", Sender::Bot, &profile(), false);
    wait_until("first playback reaches the sink", || output.started() == 1).await;
    assert_eq!(controller.state().active_message_id, Some(1));

    // A manual request for a different message and an auto request are
    // both dropped while the slot is occupied.
    controller.request_playback(2, "Adiós", Sender::Bot, &profile(), false);
    controller.request_playback(2, "Adiós", Sender::Bot, &profile(), true);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(output.started(), 1);
    assert_eq!(controller.state().active_message_id, Some(1));

    output.release.notify_waiters();
    wait_until("playback completes", || !controller.is_busy()).await;
    assert_eq!(output.finished(), 1);
    assert_eq!(controller.state().active_message_id, None);
}

#[tokio::test]
async fn rapid_double_request_claims_the_slot_once() {
    let server = MockServer::start().await;
    mount_tts(&server).await;
    let backend = Arc::new(BackendClient::new(server.uri()).unwrap());
    let output = ScriptedOutput::new(true);
    let controller = PlaybackController::new(backend, Arc::clone(&output) as Arc<dyn AudioOutput>);

    // Back-to-back without yielding: the busy flag is claimed
    // synchronously, so the second call sees an occupied slot even though
    // no synthesis request has gone out yet.
    controller.request_playback(1, "Hola", Sender::Bot, &profile(), false);
    controller.request_playback(2, "Adiós", Sender::Bot, &profile(), true);

    wait_until("playback reaches the sink", || output.started() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(output.started(), 1);
    assert_eq!(controller.state().active_message_id, Some(1));

    output.release.notify_waiters();
    wait_until("playback completes", || !controller.is_busy()).await;
}

#[tokio::test]
async fn manual_request_on_active_message_toggles_it_off() {
    let server = MockServer::start().await;
    mount_tts(&server).await;
    let backend = Arc::new(BackendClient::new(server.uri()).unwrap());
    let output = ScriptedOutput::new(true);
    let controller = PlaybackController::new(backend, Arc::clone(&output) as Arc<dyn AudioOutput>);

    controller.request_playback(7, "Hola", Sender::Bot, &profile(), false);
    wait_until("playback reaches the sink", || output.started() == 1).await;

    // Toggle-off: same id, manual.
    controller.request_playback(7, "Hola", Sender::Bot, &profile(), false);

    let state = controller.state();
    assert!(!state.is_busy);
    assert_eq!(state.active_message_id, None);

    // The sink observes the cancellation; nothing new starts.
    wait_until("cancelled playback returns", || output.finished() == 1).await;
    assert_eq!(output.started(), 1);
}

#[tokio::test]
async fn teardown_stops_active_playback() {
    let server = MockServer::start().await;
    mount_tts(&server).await;
    let backend = Arc::new(BackendClient::new(server.uri()).unwrap());
    let output = ScriptedOutput::new(true);
    let controller = PlaybackController::new(backend, Arc::clone(&output) as Arc<dyn AudioOutput>);

    controller.request_playback(1, "Hola", Sender::Bot, &profile(), false);
    wait_until("playback reaches the sink", || output.started() == 1).await;

    controller.teardown();
    assert!(!controller.is_busy());

    wait_until("sink observes cancellation", || output.finished() == 1).await;
    // State stays cleared after the stale task unwinds.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(controller.state().active_message_id, None);
    assert!(!controller.is_busy());
}

#[tokio::test]
async fn synthesis_failure_clears_the_slot_silently() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text-to-speech"))
        .respond_with(ResponseTemplate::new(500).set_body_string("synth down"))
        .mount(&server)
        .await;

    let backend = Arc::new(BackendClient::new(server.uri()).unwrap());
    let output = ScriptedOutput::new(false);
    let controller = PlaybackController::new(backend, Arc::clone(&output) as Arc<dyn AudioOutput>);

    controller.request_playback(1, "Hola", Sender::Bot, &profile(), false);
    wait_until("failed playback clears the slot", || !controller.is_busy()).await;
    assert_eq!(output.started(), 0);
    assert_eq!(controller.state().active_message_id, None);
}

// ────────────────────────────────────────────────────────────────────────────
// Auto-play
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn auto_play_fires_exactly_once_per_message() {
    let server = MockServer::start().await;
    mount_tts(&server).await;
    let backend = Arc::new(BackendClient::new(server.uri()).unwrap());
    let output = ScriptedOutput::new(false);
    let controller = PlaybackController::new(backend, Arc::clone(&output) as Arc<dyn AudioOutput>);

    let mut policy = AutoplayPolicy::new(Duration::ZERO);
    let timeline = vec![bot(1, "¡Hola!")];

    // The same timeline rendered twice requests playback exactly once.
    policy.observe(&timeline, &profile(), &controller).await;
    policy.observe(&timeline, &profile(), &controller).await;

    wait_until("auto-play reaches the sink", || output.started() >= 1).await;
    wait_until("auto-play completes", || !controller.is_busy()).await;
    policy.observe(&timeline, &profile(), &controller).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(output.started(), 1);
}

#[tokio::test]
async fn auto_play_requests_the_target_language_for_bot_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text-to-speech"))
        .and(body_partial_json(serde_json::json!({"language": "es"})))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(wav_payload()))
        .expect(1)
        .mount(&server)
        .await;

    let backend = Arc::new(BackendClient::new(server.uri()).unwrap());
    let output = ScriptedOutput::new(false);
    let controller = PlaybackController::new(backend, Arc::clone(&output) as Arc<dyn AudioOutput>);

    let mut policy = AutoplayPolicy::new(Duration::ZERO);
    let timeline = vec![bot(1, "Hello, what would you like to talk about today?")];
    policy.observe(&timeline, &profile(), &controller).await;

    wait_until("auto-play completes", || output.finished() == 1).await;
}

#[tokio::test]
async fn auto_play_never_preempts_an_active_playback() {
    let server = MockServer::start().await;
    mount_tts(&server).await;
    let backend = Arc::new(BackendClient::new(server.uri()).unwrap());
    let output = ScriptedOutput::new(true);
    let controller = PlaybackController::new(backend, Arc::clone(&output) as Arc<dyn AudioOutput>);

    // User starts a manual playback of an older message.
    controller.request_playback(1, "¡Hola!", Sender::Bot, &profile(), false);
    wait_until("manual playback reaches the sink", || output.started() == 1).await;

    // A new bot message arrives while it is sounding.
    let mut policy = AutoplayPolicy::new(Duration::ZERO);
    let timeline = vec![bot(1, "¡Hola!"), bot(2, "¿Cómo estás?")];
    policy.observe(&timeline, &profile(), &controller).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(output.started(), 1);
    assert_eq!(controller.state().active_message_id, Some(1));
    // The busy check comes before the cursor, so the skipped message is
    // still eligible once the slot frees up.
    assert_eq!(policy.last_auto_played(), None);

    output.release.notify_waiters();
    wait_until("manual playback completes", || !controller.is_busy()).await;

    policy.observe(&timeline, &profile(), &controller).await;
    wait_until("deferred auto-play reaches the sink", || {
        output.started() == 2
    })
    .await;
}
