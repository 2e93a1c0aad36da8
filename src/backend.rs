//! HTTP client for the tutor backend.
//!
//! The backend is an external collaborator: a cookie-authenticated HTTP
//! service exposing the profile, session, chat, and speech-synthesis
//! endpoints. This module owns the single `reqwest` client (with its cookie
//! store carrying the ambient session credentials) and the wire types; it
//! reads only the fields the client needs (`logged_in`, `success`,
//! `response`, `error`) and treats everything else as opaque.

use crate::auth::AuthState;
use crate::error::{ChatError, Result};
use crate::lang::LangCode;
use crate::session::{SkillLevel, UserProfile};
use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::debug;

/// Client for the tutor backend HTTP surface.
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
    auth_tx: watch::Sender<AuthState>,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl BackendClient {
    /// Create a client for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().cookie_store(true).build()?;
        let (auth_tx, _rx) = watch::channel(AuthState::Unknown);
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            client,
            auth_tx,
        })
    }

    /// Subscribe to server-confirmed authentication-state changes.
    #[must_use]
    pub fn auth_changes(&self) -> crate::auth::AuthWatch {
        self.auth_tx.subscribe()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Fetch the user profile. Publishes the resulting auth state.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn fetch_profile(&self) -> Result<UserProfile> {
        let response = self.client.get(self.url("/get_user_info")).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error("get_user_info", status, &body));
        }

        let info: UserInfoResponse = response.json().await?;
        let profile = info.into_profile();
        self.auth_tx.send_replace(if profile.logged_in {
            AuthState::LoggedIn
        } else {
            AuthState::LoggedOut
        });
        Ok(profile)
    }

    /// Start a new conversation session for the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or a
    /// response without `success: true`.
    pub async fn start_session(&self) -> Result<()> {
        let response = self.client.post(self.url("/start_chat")).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error("start_chat", status, &body));
        }

        let ack: AckResponse = response.json().await?;
        if ack.success {
            Ok(())
        } else {
            Err(ChatError::Api(
                "start_chat did not report success".to_owned(),
            ))
        }
    }

    /// Send one user message and return the tutor's reply text.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, a
    /// server-reported `error` field, or a missing `response` field.
    pub async fn send_message(&self, text: &str) -> Result<String> {
        let body = serde_json::json!({ "message": text });
        let response = self
            .client
            .post(self.url("/chat"))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error("chat", status, &body));
        }

        let reply: ChatReply = response.json().await?;
        if let Some(error) = reply.error {
            return Err(ChatError::Api(format!("chat reported error: {error}")));
        }
        reply
            .response
            .ok_or_else(|| ChatError::Api("chat reply had no response field".to_owned()))
    }

    /// Clear the server-side conversation context.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status;
    /// callers treat this endpoint as best-effort.
    pub async fn reset_session(&self) -> Result<()> {
        let response = self.client.post(self.url("/reset_chat")).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error("reset_chat", status, &body));
        }
        Ok(())
    }

    /// Request synthesized speech for a text in a given language.
    ///
    /// Returns the raw encoded audio payload.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn synthesize(&self, text: &str, language: LangCode) -> Result<Bytes> {
        let body = serde_json::json!({ "text": text, "language": language.as_str() });
        let response = self
            .client
            .post(self.url("/text-to-speech"))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error("text-to-speech", status, &body));
        }

        let payload = response.bytes().await?;
        debug!(bytes = payload.len(), "received synthesized audio");
        Ok(payload)
    }

    /// End the server session. Publishes `LoggedOut` on success.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn logout(&self) -> Result<()> {
        let response = self.client.post(self.url("/logout")).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error("logout", status, &body));
        }
        self.auth_tx.send_replace(AuthState::LoggedOut);
        Ok(())
    }
}

/// Map a non-success HTTP status to a [`ChatError::Api`].
fn map_http_error(endpoint: &str, status: reqwest::StatusCode, body: &str) -> ChatError {
    ChatError::Api(format!(
        "{endpoint} returned HTTP {}: {}",
        status.as_u16(),
        extract_error_message(body)
    ))
}

/// Pull a human-readable message out of an error response body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.as_str())
                .map(String::from)
                .or_else(|| {
                    v.get("message")
                        .and_then(|m| m.as_str())
                        .map(String::from)
                })
        })
        .unwrap_or_else(|| body.to_owned())
}

// ── Wire types ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    #[serde(default)]
    logged_in: bool,
    #[serde(default)]
    background: Background,
    #[serde(default)]
    conversation_length: u32,
}

#[derive(Debug, Default, Deserialize)]
struct Background {
    #[serde(default)]
    native_lang: Option<String>,
    #[serde(default)]
    target_lang: Option<String>,
    #[serde(default)]
    skill_level: Option<String>,
}

impl UserInfoResponse {
    fn into_profile(self) -> UserProfile {
        UserProfile {
            logged_in: self.logged_in,
            native_language: self
                .background
                .native_lang
                .as_deref()
                .and_then(LangCode::from_tag),
            target_language: self
                .background
                .target_lang
                .as_deref()
                .and_then(LangCode::from_tag),
            skill_level: self
                .background
                .skill_level
                .as_deref()
                .map(SkillLevel::from_tag)
                .unwrap_or_default(),
            conversation_length: self.conversation_length,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AckResponse {
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}
