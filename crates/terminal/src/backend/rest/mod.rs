//! HTTP client for a PostgREST + GoTrue backend (the Supabase API shape).
//!
//! Uses `reqwest` with a per-request timeout. Every request carries the
//! public API key in `apikey` and a bearer token: the session's access token
//! when signed in, otherwise the API key itself.
//!
//! The client owns the session the way the hosted SDK does: sign-in, sign-up,
//! refresh and sign-out replace it, persist it (when a session file is
//! configured) and broadcast an [`AuthEvent`] to subscribers.

mod auth;
mod store;

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;

use countertop_core::{AuthEvent, Session};

use crate::backend::BackendError;
use crate::config::BackendConfig;

/// Capacity of the session-change channel. Subscribers only care about the
/// newest event, so a small buffer is plenty.
const AUTH_EVENT_CAPACITY: usize = 16;

/// Longest slice of an error body copied into logs and messages.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Client for the hosted backend's REST and auth APIs.
///
/// Cheaply cloneable; clones share the session and event channel.
#[derive(Clone)]
pub struct RestBackend {
    inner: Arc<RestBackendInner>,
}

struct RestBackendInner {
    client: reqwest::Client,
    base_url: Url,
    anon_key: String,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
    session_file: Option<PathBuf>,
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("base_url", &self.inner.base_url.as_str())
            .field("anon_key", &"[REDACTED]")
            .field("session_file", &self.inner.session_file)
            .finish_non_exhaustive()
    }
}

impl RestBackend {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(RestBackendInner {
                client,
                base_url: config.url.clone(),
                anon_key: config.anon_key.expose_secret().to_string(),
                session: RwLock::new(None),
                events,
                session_file: config.session_file.clone(),
            }),
        })
    }

    /// Resolve a path such as `rest/v1/products` against the base URL.
    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.inner.base_url.join(path)?)
    }

    /// The session currently held by the client.
    fn session(&self) -> Option<Session> {
        self.inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start a request with the API key and the best available bearer token.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let token = self
            .session()
            .map_or_else(|| self.inner.anon_key.clone(), |s| s.access_token);
        self.request_with_token(method, url, &token)
    }

    fn request_with_token(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
        self.inner
            .client
            .request(method, url)
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(token)
    }

    /// Send a request and decode a JSON body.
    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, BackendError> {
        let response = check_status(request.send().await?).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            warn!(
                error = %e,
                body = %truncate(&body, MAX_ERROR_BODY_CHARS),
                "Failed to parse backend response"
            );
            BackendError::Parse(e)
        })
    }

    /// Send a request whose body is ignored.
    async fn send_empty(request: RequestBuilder) -> Result<(), BackendError> {
        check_status(request.send().await?).await?;
        Ok(())
    }

    /// Replace the held session, persist it, and notify subscribers.
    async fn replace_session(&self, event: AuthEvent) {
        {
            let mut held = self
                .inner
                .session
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *held = event.session.clone();
        }

        if let Err(e) = self.persist_session(event.session.as_ref()).await {
            warn!(error = %e, "Failed to persist session");
        }

        debug!(kind = %event.kind, "Auth state changed");
        // No subscribers is fine: nobody is watching yet.
        self.inner.events.send(event).ok();
    }

    /// Write the session to the session file, or remove the file on sign-out.
    async fn persist_session(&self, session: Option<&Session>) -> Result<(), BackendError> {
        let Some(path) = &self.inner.session_file else {
            return Ok(());
        };

        match session {
            Some(session) => {
                let json = serde_json::to_vec_pretty(session)?;
                tokio::fs::write(path, json).await?;
            }
            None => match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }

    /// Read a session persisted by an earlier run.
    async fn load_persisted_session(&self) -> Result<Option<Session>, BackendError> {
        let Some(path) = &self.inner.session_file else {
            return Ok(None);
        };

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

/// Turn non-success responses into errors carrying the backend's message.
async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(
        status = %status,
        body = %truncate(&body, MAX_ERROR_BODY_CHARS),
        "Backend returned non-success status"
    );

    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });

    if status == StatusCode::UNAUTHORIZED {
        return Err(BackendError::Unauthorized(message));
    }
    Err(BackendError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Extract a human-readable message from a PostgREST or GoTrue error body.
fn error_message(body: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "msg", "error_description", "error"] {
            if let Some(message) = value.get(key).and_then(serde_json::Value::as_str)
                && !message.trim().is_empty()
            {
                return Some(message.to_string());
            }
        }
    }

    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| truncate(trimmed, MAX_ERROR_BODY_CHARS))
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_from_postgrest_body() {
        let body = r#"{"code":"23505","details":null,"hint":null,"message":"duplicate key value violates unique constraint"}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("duplicate key value violates unique constraint")
        );
    }

    #[test]
    fn test_error_message_from_gotrue_bodies() {
        let legacy = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(
            error_message(legacy).as_deref(),
            Some("Invalid login credentials")
        );

        let current = r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#;
        assert_eq!(
            error_message(current).as_deref(),
            Some("Invalid login credentials")
        );
    }

    #[test]
    fn test_error_message_falls_back_to_text() {
        assert_eq!(
            error_message("upstream timed out").as_deref(),
            Some("upstream timed out")
        );
        assert_eq!(error_message("   "), None);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
    }
}
