//! Charla: terminal client for a conversational AI language-tutor service.
//!
//! The client keeps a chat session against the tutor backend and can speak
//! any message aloud through synthesized speech:
//! Timeline → Auto-play policy → Playback controller → Language selector →
//! Synthesis endpoint → Speaker
//!
//! # Architecture
//!
//! - **Backend client**: cookie-authenticated HTTP calls via `reqwest`
//! - **Session manager**: chat lifecycle state machine + message timeline
//! - **Playback controller**: the single audio-playback slot
//! - **Auto-play policy**: speaks each new tutor message at most once
//! - **Language layer**: trigram detection (`whatlang`) + selection policy
//! - **Audio**: payload decoding via `symphonia`, output via `cpal`

pub mod audio;
pub mod auth;
pub mod autoplay;
pub mod backend;
pub mod config;
pub mod error;
pub mod lang;
pub mod paths;
pub mod session;

pub use audio::{AudioClip, AudioOutput, CpalOutput, PlaybackController, PlaybackState};
pub use auth::{AuthState, AuthWatch};
pub use autoplay::AutoplayPolicy;
pub use backend::BackendClient;
pub use config::ClientConfig;
pub use error::{ChatError, Result};
pub use lang::{LangCode, detect, select_language};
pub use session::{ChatSession, Message, MessageId, Sender, SessionState, SkillLevel, UserProfile};
