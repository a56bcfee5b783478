//! Authentication route handlers.
//!
//! Sign-in, sign-up and sign-out go through the backend. The session holder
//! learns about the change from the backend's event stream, so each handler
//! waits (briefly) for the holder to catch up before redirecting; otherwise
//! the next page could still see the old session.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::backend::Backend;
use crate::notice::{Notice, View};
use crate::services::{AuthService, SignUpOutcome};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login and sign-up form data.
#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub notices: Vec<Notice>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display login page, or go to the till if already signed in.
pub async fn login_page<B: Backend>(State(state): State<AppState<B>>) -> Response {
    if state.session().is_signed_in() {
        return Redirect::to("/").into_response();
    }
    LoginTemplate {
        notices: state.notices().current(View::Login),
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip(state, form), fields(email = %form.email))]
pub async fn login<B: Backend>(
    State(state): State<AppState<B>>,
    Form(form): Form<CredentialsForm>,
) -> Redirect {
    match AuthService::new(state.backend())
        .login(&form.email, &form.password)
        .await
    {
        Ok(_) => {
            if !state.session().wait_for_signed_in(true).await {
                warn!("Session holder did not observe sign-in in time");
            }
            Redirect::to("/")
        }
        Err(e) => {
            state.notices().error(View::Login, e.to_string());
            Redirect::to("/login")
        }
    }
}

/// Handle sign-up form submission.
#[instrument(skip(state, form), fields(email = %form.email))]
pub async fn signup<B: Backend>(
    State(state): State<AppState<B>>,
    Form(form): Form<CredentialsForm>,
) -> Redirect {
    match AuthService::new(state.backend())
        .register(&form.email, &form.password)
        .await
    {
        Ok(SignUpOutcome::SignedIn(_)) => {
            if !state.session().wait_for_signed_in(true).await {
                warn!("Session holder did not observe sign-up in time");
            }
            Redirect::to("/")
        }
        Ok(SignUpOutcome::ConfirmationPending) => {
            state.notices().success(
                View::Login,
                "Check your email to confirm your account, then sign in.",
            );
            Redirect::to("/login")
        }
        Err(e) => {
            state.notices().error(View::Login, e.to_string());
            Redirect::to("/login")
        }
    }
}

/// Handle logout.
#[instrument(skip(state))]
pub async fn logout<B: Backend>(State(state): State<AppState<B>>) -> Redirect {
    if let Err(e) = AuthService::new(state.backend()).logout().await {
        warn!(error = %e, "Logout failed");
        state.notices().error(View::Login, e.to_string());
    }
    if !state.session().wait_for_signed_in(false).await {
        warn!("Session holder did not observe sign-out in time");
    }
    Redirect::to("/login")
}
