//! HTTP route handlers for the till.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                  - Liveness check
//!
//! # Auth
//! GET  /login                   - Login / sign-up page
//! POST /login                   - Sign in
//! POST /signup                  - Sign up
//! POST /logout                  - Sign out
//!
//! # Point of sale (requires session)
//! GET  /                        - Products and cart (?q= filter)
//! POST /cart/add                - Add one unit of a product
//! POST /cart/quantity           - Set a line's quantity
//! POST /cart/remove             - Remove a line
//! POST /checkout                - Complete the sale
//!
//! # Products (requires session)
//! GET  /products                - Management table (?q= filter)
//! GET  /products/new            - Editor for a new product
//! POST /products                - Create
//! GET  /products/{id}/edit      - Editor for an existing product
//! POST /products/{id}           - Update
//! GET  /products/{id}/delete    - Delete confirmation
//! POST /products/{id}/delete    - Delete (requires confirm=yes)
//!
//! # Sales (requires session)
//! GET  /sales                   - Sales ledger
//! ```
//!
//! Every write answers with a redirect, so the next page load refetches
//! from the backend. Outcomes reach the cashier as notices.

pub mod auth;
pub mod pos;
pub mod products;
pub mod sales;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use countertop_core::Session;

use crate::backend::Backend;
use crate::middleware::request_id_middleware;
use crate::notice::{Notice, View};
use crate::state::AppState;

/// Navigation entry in the shell header.
#[derive(Debug, Clone)]
pub struct NavItem {
    pub href: &'static str,
    pub label: &'static str,
    pub active: bool,
}

const NAV: [(View, &str, &str); 3] = [
    (View::Pos, "/", "Point of Sale"),
    (View::Products, "/products", "Products"),
    (View::Sales, "/sales", "Sales"),
];

/// Data every shell page renders around its content.
#[derive(Debug, Clone)]
pub struct Shell {
    pub nav: Vec<NavItem>,
    pub user_label: String,
    pub notices: Vec<Notice>,
}

impl Shell {
    /// The shell for `view`, with that view's live notices.
    #[must_use]
    pub fn new<B: Backend>(state: &AppState<B>, session: &Session, view: View) -> Self {
        Self {
            nav: NAV
                .iter()
                .map(|&(target, href, label)| NavItem {
                    href,
                    label,
                    active: target == view,
                })
                .collect(),
            user_label: session.user.label(),
            notices: state.notices().current(view),
        }
    }
}

/// `?q=` filter on list pages.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Create the point-of-sale routes router.
pub fn pos_routes<B: Backend>() -> Router<AppState<B>> {
    Router::new()
        .route("/", get(pos::index::<B>))
        .route("/cart/add", post(pos::add_to_cart::<B>))
        .route("/cart/quantity", post(pos::set_quantity::<B>))
        .route("/cart/remove", post(pos::remove_from_cart::<B>))
        .route("/checkout", post(pos::checkout::<B>))
}

/// Create the product management routes router.
pub fn product_routes<B: Backend>() -> Router<AppState<B>> {
    Router::new()
        .route("/", get(products::index::<B>).post(products::create::<B>))
        .route("/new", get(products::new_form::<B>))
        .route("/{id}", post(products::update::<B>))
        .route("/{id}/edit", get(products::edit_form::<B>))
        .route(
            "/{id}/delete",
            get(products::confirm_delete::<B>).post(products::delete::<B>),
        )
}

/// Create the auth routes router.
pub fn auth_routes<B: Backend>() -> Router<AppState<B>> {
    Router::new()
        .route("/login", get(auth::login_page::<B>).post(auth::login::<B>))
        .route("/signup", post(auth::signup::<B>))
        .route("/logout", post(auth::logout::<B>))
}

/// Build the full application router with middleware.
pub fn app<B: Backend>(state: AppState<B>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(auth_routes())
        .merge(pos_routes())
        .nest("/products", product_routes())
        .route("/sales", get(sales::index::<B>))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}
