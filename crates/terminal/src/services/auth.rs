//! Authentication service.
//!
//! Credentials are checked by the backend; this layer only rejects obviously
//! incomplete input before a remote call and maps backend failures onto
//! messages the login page can show.

use thiserror::Error;
use tracing::instrument;

use countertop_core::Session;

use crate::backend::{Auth, BackendError, Credentials};

/// Minimum password length accepted at sign-up (the backend's default).
const MIN_PASSWORD_LENGTH: usize = 6;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email and password are required.")]
    MissingCredentials,

    /// Wrong email or password.
    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters.")]
    WeakPassword,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// What happened after a sign-up.
#[derive(Debug)]
pub enum SignUpOutcome {
    /// The backend confirmed the account immediately.
    SignedIn(Session),
    /// The backend sent a confirmation email first.
    ConfirmationPending,
}

/// Authentication service.
pub struct AuthService<'a, A> {
    backend: &'a A,
}

impl<'a, A: Auth> AuthService<'a, A> {
    #[must_use]
    pub const fn new(backend: &'a A) -> Self {
        Self { backend }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCredentials` without calling the backend if
    /// either field is blank, `AuthError::InvalidCredentials` if the backend
    /// rejects them.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let credentials = credentials(email, password)?;
        self.backend
            .sign_in(&credentials)
            .await
            .map_err(|e| match e {
                BackendError::Unauthorized(_) => AuthError::InvalidCredentials,
                other => AuthError::Backend(other),
            })
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` for short passwords, or the
    /// backend's error (e.g. the email is already registered).
    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        let credentials = credentials(email, password)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword);
        }

        Ok(match self.backend.sign_up(&credentials).await? {
            Some(session) => SignUpOutcome::SignedIn(session),
            None => SignUpOutcome::ConfirmationPending,
        })
    }

    /// End the current session.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if sign-out fails.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), AuthError> {
        Ok(self.backend.sign_out().await?)
    }
}

fn credentials(email: &str, password: &str) -> Result<Credentials, AuthError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok(Credentials::new(email, password))
}
