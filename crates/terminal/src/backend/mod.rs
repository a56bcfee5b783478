//! The hosted backend the till talks to.
//!
//! # Architecture
//!
//! - The backend is the source of truth for products, sales and sessions -
//!   the till keeps no local database
//! - [`Store`] covers the `products` and `sales` collections
//! - [`Auth`] covers sessions, identity and the session-change stream
//! - [`RestBackend`] implements both over the PostgREST/GoTrue HTTP API
//! - `MemoryBackend` (feature `memory`) implements both in-process for tests
//!
//! # Example
//!
//! ```rust,ignore
//! use countertop_terminal::backend::{Auth, Credentials, RestBackend, Store};
//!
//! let backend = RestBackend::new(&config.backend)?;
//! backend.sign_in(&Credentials::new("cashier@example.com", "hunter22")).await?;
//! let products = backend.list_products().await?;
//! ```

#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod rest;

use std::future::Future;

use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::broadcast;

use countertop_core::{
    AuthEvent, Identity, NewProduct, NewSale, Product, ProductId, ProductPatch, Sale, SaleId,
    Session,
};

#[cfg(any(test, feature = "memory"))]
pub use memory::MemoryBackend;
pub use rest::RestBackend;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not have the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The backend rejected the request.
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    /// The request needs a signed-in session and there is none, or the
    /// backend refused the credentials.
    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    /// No record with that id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A conditional stock adjustment would have taken stock below zero.
    #[error("Insufficient stock for product {0}")]
    InsufficientStock(ProductId),

    /// Reading or writing the persisted session failed.
    #[error("Session storage error: {0}")]
    SessionStorage(#[from] std::io::Error),

    /// Invalid URL while building a request.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Email and password for signing in or up.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    /// Bundle an email and password.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: SecretString::from(password.into()),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A live subscription to session-change events. Dropping it unsubscribes.
#[derive(Debug)]
pub struct AuthSubscription {
    receiver: broadcast::Receiver<AuthEvent>,
}

impl AuthSubscription {
    pub(crate) const fn new(receiver: broadcast::Receiver<AuthEvent>) -> Self {
        Self { receiver }
    }

    /// Wait for the next event. Returns `None` once the backend is gone.
    ///
    /// Events missed because the subscriber fell behind are skipped; only the
    /// newest session matters to a holder that overwrites on every event.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Auth subscriber lagged, skipping stale events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Record collections: products and sales.
pub trait Store: Send + Sync {
    /// All products ordered by name ascending.
    fn list_products(&self) -> impl Future<Output = Result<Vec<Product>, BackendError>> + Send;

    /// Insert a product and return the stored row.
    fn insert_product(
        &self,
        product: &NewProduct,
    ) -> impl Future<Output = Result<Product, BackendError>> + Send;

    /// Overwrite the given fields of a product (last write wins).
    fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Delete a product.
    fn delete_product(&self, id: ProductId)
    -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Atomically add `delta` to a product's stock unless the result would be
    /// negative, returning the new stock.
    ///
    /// Fails with `BackendError::InsufficientStock` when the condition fails.
    fn adjust_stock(
        &self,
        id: ProductId,
        delta: i32,
    ) -> impl Future<Output = Result<i32, BackendError>> + Send;

    /// All sales, newest first.
    fn list_sales(&self) -> impl Future<Output = Result<Vec<Sale>, BackendError>> + Send;

    /// Insert a sale and return the stored row.
    fn insert_sale(&self, sale: &NewSale)
    -> impl Future<Output = Result<Sale, BackendError>> + Send;

    /// Delete a sale. Only used to compensate a failed checkout.
    fn delete_sale(&self, id: SaleId) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Sessions and identity.
pub trait Auth: Send + Sync {
    /// The current session, if one exists (restored from storage and
    /// refreshed when needed).
    fn get_session(&self) -> impl Future<Output = Result<Option<Session>, BackendError>> + Send;

    /// Ask the backend who the current caller is.
    fn current_user(&self) -> impl Future<Output = Result<Option<Identity>, BackendError>> + Send;

    /// Sign in with email and password. Emits a signed-in event.
    fn sign_in(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Session, BackendError>> + Send;

    /// Register a new account. Returns the session when the backend signs the
    /// user in immediately, `None` when it waits for email confirmation.
    fn sign_up(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Option<Session>, BackendError>> + Send;

    /// End the session. Emits a signed-out event.
    fn sign_out(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Exchange the refresh token for a new session. Emits a token-refreshed
    /// event.
    fn refresh_session(&self) -> impl Future<Output = Result<Session, BackendError>> + Send;

    /// Subscribe to session-change events.
    fn subscribe(&self) -> AuthSubscription;
}

/// Everything the till needs from its backend.
pub trait Backend: Store + Auth + 'static {}

impl<T> Backend for T where T: Store + Auth + 'static {}
