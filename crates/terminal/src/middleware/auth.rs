//! Authentication extractors.
//!
//! The till has one session for the whole process, held by the
//! [`SessionHolder`](crate::session::SessionHolder). Shell routes take a
//! [`RequireSession`] so that a signed-out till always lands on the login
//! page.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};

use countertop_core::Session;

use crate::backend::Backend;
use crate::state::AppState;

/// Extractor that requires a signed-in session.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireSession(session): RequireSession) -> impl IntoResponse {
///     format!("Signed in as {}", session.user.label())
/// }
/// ```
#[derive(Debug)]
pub struct RequireSession(pub Session);

/// Rejection when a shell route is requested while signed out.
#[derive(Debug)]
pub struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        Redirect::to("/login").into_response()
    }
}

impl<B: Backend> FromRequestParts<AppState<B>> for RequireSession {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState<B>,
    ) -> Result<Self, Self::Rejection> {
        state.session().current().map(Self).ok_or(AuthRejection)
    }
}
