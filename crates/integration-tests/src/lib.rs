//! Integration tests for Countertop.
//!
//! The suites drive the terminal's services and its full HTTP router
//! against the in-memory backend, so they need no hosted backend and no
//! network.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p countertop-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `checkout_flow` - Cart to sale against the store, both stock modes
//! - `terminal_routes` - Pages, forms and redirects through the router

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;

use countertop_terminal::backend::MemoryBackend;
use countertop_terminal::config::StockMode;
use countertop_terminal::routes;
use countertop_terminal::state::AppState;

/// Largest response body the helpers will read.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Email of the cashier signed in by [`TestTill::signed_in`].
pub const CASHIER_EMAIL: &str = "cashier@example.com";

/// A till running against an in-memory backend.
pub struct TestTill {
    pub backend: MemoryBackend,
    pub state: AppState<MemoryBackend>,
}

/// What a request came back with.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl TestResponse {
    /// Whether this is a redirect to `path`.
    #[must_use]
    pub fn redirects_to(&self, path: &str) -> bool {
        self.status.is_redirection() && self.location.as_deref() == Some(path)
    }
}

impl TestTill {
    /// A till with nobody signed in.
    pub async fn start(mode: StockMode) -> Self {
        Self::start_with(MemoryBackend::new(), mode).await
    }

    /// A till whose backend already holds a session when it boots.
    pub async fn signed_in(mode: StockMode) -> Self {
        let backend = MemoryBackend::new();
        backend.sign_in_as(CASHIER_EMAIL);
        Self::start_with(backend, mode).await
    }

    pub async fn start_with(backend: MemoryBackend, mode: StockMode) -> Self {
        let state = AppState::start(backend.clone(), mode).await;
        Self { backend, state }
    }

    #[must_use]
    pub fn router(&self) -> Router {
        routes::app(self.state.clone())
    }

    /// Send a GET request through the router.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::get(uri)
            .body(Body::empty())
            .expect("valid request");
        self.send(request).await
    }

    /// Send a url-encoded form POST through the router.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn post_form(&self, uri: &str, form: &str) -> TestResponse {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .expect("valid request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(String::from);
        let bytes = to_bytes(response.into_body(), MAX_BODY_BYTES)
            .await
            .expect("readable body");
        TestResponse {
            status,
            location,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

impl Drop for TestTill {
    fn drop(&mut self) {
        self.state.shutdown();
    }
}
