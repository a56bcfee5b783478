//! Sessions over the GoTrue auth API.
//!
//! ```text
//! POST /auth/v1/token?grant_type=password       {email, password}
//! POST /auth/v1/token?grant_type=refresh_token  {refresh_token}
//! POST /auth/v1/signup                          {email, password}
//! POST /auth/v1/logout
//! GET  /auth/v1/user
//! ```

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use countertop_core::{AuthEvent, Identity, Session};

use super::RestBackend;
use crate::backend::{Auth, AuthSubscription, BackendError, Credentials};

/// Refresh a restored session this close to expiry instead of using it.
const RESTORE_EXPIRY_MARGIN_SECS: i64 = 10;

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// Successful token grant.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: Identity,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(|| now + Duration::seconds(self.expires_in));

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

impl RestBackend {
    /// Keep a session without announcing it (restoring, not signing in).
    fn hold(&self, session: &Session) {
        let mut held = self
            .inner
            .session
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *held = Some(session.clone());
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<Session, BackendError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let request = self
            .request_with_token(Method::POST, url, &self.inner.anon_key)
            .json(body);
        let response: TokenResponse = Self::send_json(request).await?;
        Ok(response.into_session(Utc::now()))
    }

    async fn refresh_with(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let session = self
            .token_grant("refresh_token", &RefreshGrant { refresh_token })
            .await?;
        self.replace_session(AuthEvent::token_refreshed(session.clone()))
            .await;
        Ok(session)
    }
}

impl Auth for RestBackend {
    #[instrument(skip(self))]
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let session = match self.session() {
            Some(session) => session,
            None => match self.load_persisted_session().await {
                Ok(Some(session)) => session,
                Ok(None) => return Ok(None),
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable persisted session");
                    return Ok(None);
                }
            },
        };

        if !session.expires_within(Utc::now(), Duration::seconds(RESTORE_EXPIRY_MARGIN_SECS)) {
            self.hold(&session);
            return Ok(Some(session));
        }

        match self.refresh_with(&session.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(e) => {
                warn!(error = %e, "Stored session could not be refreshed");
                self.replace_session(AuthEvent::signed_out()).await;
                Ok(None)
            }
        }
    }

    #[instrument(skip(self))]
    async fn current_user(&self) -> Result<Option<Identity>, BackendError> {
        let Some(session) = self.session() else {
            return Ok(None);
        };

        let request =
            self.request_with_token(Method::GET, self.endpoint("auth/v1/user")?, &session.access_token);
        match Self::send_json::<Identity>(request).await {
            Ok(identity) => Ok(Some(identity)),
            Err(BackendError::Unauthorized(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, BackendError> {
        let grant = PasswordGrant {
            email: &credentials.email,
            password: credentials.password.expose_secret(),
        };
        let session = match self.token_grant("password", &grant).await {
            Ok(session) => session,
            // GoTrue answers bad credentials with 400, not 401.
            Err(BackendError::Api { status: 400, message }) => {
                return Err(BackendError::Unauthorized(message));
            }
            Err(e) => return Err(e),
        };

        info!(user_id = %session.user.id, "Signed in");
        self.replace_session(AuthEvent::signed_in(session.clone()))
            .await;
        Ok(session)
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<Session>, BackendError> {
        let grant = PasswordGrant {
            email: &credentials.email,
            password: credentials.password.expose_secret(),
        };
        let request = self
            .request_with_token(
                Method::POST,
                self.endpoint("auth/v1/signup")?,
                &self.inner.anon_key,
            )
            .json(&grant);

        // Auto-confirming backends answer with a token grant, others with the
        // pending user only.
        let body: serde_json::Value = Self::send_json(request).await?;
        if body.get("access_token").is_none() {
            info!("Sign-up pending email confirmation");
            return Ok(None);
        }

        let session = serde_json::from_value::<TokenResponse>(body)?.into_session(Utc::now());
        info!(user_id = %session.user.id, "Signed up and signed in");
        self.replace_session(AuthEvent::signed_in(session.clone()))
            .await;
        Ok(Some(session))
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), BackendError> {
        if let Some(session) = self.session() {
            let request = self.request_with_token(
                Method::POST,
                self.endpoint("auth/v1/logout")?,
                &session.access_token,
            );
            // The local session goes away even if the backend already forgot it.
            if let Err(e) = Self::send_empty(request).await {
                warn!(error = %e, "Backend sign-out failed, clearing local session anyway");
            }
        }

        self.replace_session(AuthEvent::signed_out()).await;
        info!("Signed out");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn refresh_session(&self) -> Result<Session, BackendError> {
        let session = self
            .session()
            .ok_or_else(|| BackendError::Unauthorized("no session to refresh".to_string()))?;
        self.refresh_with(&session.refresh_token).await
    }

    fn subscribe(&self) -> AuthSubscription {
        AuthSubscription::new(self.inner.events.subscribe())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_prefers_expires_at() {
        let json = serde_json::json!({
            "access_token": "a",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1_800_000_000,
            "refresh_token": "r",
            "user": { "id": "6c1a9e0f-3b2d-4f7e-8a1b-2c3d4e5f6a7b", "email": "cashier@example.com", "aud": "authenticated" }
        });
        let response: TokenResponse = serde_json::from_value(json).unwrap();
        let session = response.into_session(Utc::now());
        assert_eq!(session.expires_at.timestamp(), 1_800_000_000);
        assert_eq!(session.user.email.as_deref(), Some("cashier@example.com"));
    }

    #[test]
    fn test_token_response_falls_back_to_expires_in() {
        let json = serde_json::json!({
            "access_token": "a",
            "expires_in": 60,
            "refresh_token": "r",
            "user": { "id": "6c1a9e0f-3b2d-4f7e-8a1b-2c3d4e5f6a7b" }
        });
        let now = Utc::now();
        let session = serde_json::from_value::<TokenResponse>(json)
            .unwrap()
            .into_session(now);
        assert_eq!(session.expires_at, now + Duration::seconds(60));
        assert_eq!(session.user.email, None);
    }
}
