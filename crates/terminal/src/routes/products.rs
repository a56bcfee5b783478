//! Product management route handlers.
//!
//! The table lists every product, including out-of-stock ones. Create and
//! update re-render the editor with the cashier's input when validation
//! fails; delete goes through a confirmation page first.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{instrument, warn};

use countertop_core::{Product, ProductId, Session, catalog};

use super::{SearchQuery, Shell};
use crate::backend::Backend;
use crate::middleware::RequireSession;
use crate::notice::View;
use crate::services::{CatalogError, CatalogService};
use crate::state::AppState;

/// The only value of `confirm` that deletes.
const CONFIRM_YES: &str = "yes";

// =============================================================================
// View Types
// =============================================================================

#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: ProductId,
    pub name: String,
    pub price: String,
    pub stock: i32,
    pub in_stock: bool,
}

impl From<&Product> for ProductRow {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price.to_string(),
            stock: product.stock,
            in_stock: product.is_in_stock(),
        }
    }
}

/// Product table template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsTemplate {
    pub shell: Shell,
    pub query: String,
    pub products: Vec<ProductRow>,
}

/// Product editor template, shared by create and update.
#[derive(Template, WebTemplate)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub shell: Shell,
    pub heading: &'static str,
    pub action: String,
    pub submit_label: &'static str,
    pub name: String,
    pub price: String,
    pub stock: String,
    pub error: Option<String>,
}

/// Delete confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "products/confirm_delete.html")]
pub struct ConfirmDeleteTemplate {
    pub shell: Shell,
    pub product: ProductRow,
}

// =============================================================================
// Form Types
// =============================================================================

/// Raw editor fields; validated by the catalog service.
#[derive(Debug, Deserialize)]
pub struct ProductForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub stock: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    #[serde(default)]
    pub confirm: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Management table, filtered by name.
#[instrument(skip(state, session))]
pub async fn index<B: Backend>(
    State(state): State<AppState<B>>,
    RequireSession(session): RequireSession,
    Query(search): Query<SearchQuery>,
) -> ProductsTemplate {
    match CatalogService::new(state.backend()).list().await {
        Ok(products) => state.remember_catalog(&products),
        Err(e) => {
            warn!(error = %e, "Failed to load products");
            state
                .notices()
                .error(View::Products, format!("Failed to load products: {e}"));
        }
    }

    let snapshot = state.catalog_snapshot();
    ProductsTemplate {
        shell: Shell::new(&state, &session, View::Products),
        products: catalog::filter_by_name(&snapshot, &search.q)
            .into_iter()
            .map(ProductRow::from)
            .collect(),
        query: search.q,
    }
}

#[instrument(skip(state, session))]
pub async fn new_form<B: Backend>(
    State(state): State<AppState<B>>,
    RequireSession(session): RequireSession,
) -> ProductFormTemplate {
    editor(&state, &session, None, ProductForm::empty(), None)
}

#[instrument(skip(state, session, form))]
pub async fn create<B: Backend>(
    State(state): State<AppState<B>>,
    RequireSession(session): RequireSession,
    Form(form): Form<ProductForm>,
) -> Response {
    match CatalogService::new(state.backend())
        .create(&form.name, &form.price, &form.stock)
        .await
    {
        Ok(product) => {
            state
                .notices()
                .success(View::Products, format!("Added {}.", product.name));
            Redirect::to("/products").into_response()
        }
        Err(e) => rejected(&state, &session, None, form, &e),
    }
}

#[instrument(skip(state, session))]
pub async fn edit_form<B: Backend>(
    State(state): State<AppState<B>>,
    RequireSession(session): RequireSession,
    Path(id): Path<ProductId>,
) -> Response {
    match CatalogService::new(state.backend()).get(id).await {
        Ok(product) => editor(&state, &session, Some(id), ProductForm::from(&product), None)
            .into_response(),
        Err(e) => back_to_table(&state, &e),
    }
}

#[instrument(skip(state, session, form))]
pub async fn update<B: Backend>(
    State(state): State<AppState<B>>,
    RequireSession(session): RequireSession,
    Path(id): Path<ProductId>,
    Form(form): Form<ProductForm>,
) -> Response {
    match CatalogService::new(state.backend())
        .update(id, &form.name, &form.price, &form.stock)
        .await
    {
        Ok(()) => {
            state
                .notices()
                .success(View::Products, format!("Updated {}.", form.name.trim()));
            Redirect::to("/products").into_response()
        }
        Err(e) => rejected(&state, &session, Some(id), form, &e),
    }
}

/// Ask before deleting.
#[instrument(skip(state, session))]
pub async fn confirm_delete<B: Backend>(
    State(state): State<AppState<B>>,
    RequireSession(session): RequireSession,
    Path(id): Path<ProductId>,
) -> Response {
    match CatalogService::new(state.backend()).get(id).await {
        Ok(product) => ConfirmDeleteTemplate {
            shell: Shell::new(&state, &session, View::Products),
            product: ProductRow::from(&product),
        }
        .into_response(),
        Err(e) => back_to_table(&state, &e),
    }
}

/// Delete, but only when the confirmation form said yes.
#[instrument(skip(state, _session))]
pub async fn delete<B: Backend>(
    State(state): State<AppState<B>>,
    RequireSession(_session): RequireSession,
    Path(id): Path<ProductId>,
    Form(form): Form<DeleteForm>,
) -> Redirect {
    if form.confirm.as_deref() != Some(CONFIRM_YES) {
        return Redirect::to("/products");
    }

    match CatalogService::new(state.backend()).delete(id).await {
        Ok(()) => state.notices().success(View::Products, "Product deleted."),
        Err(e) => {
            warn!(product_id = %id, error = %e, "Failed to delete product");
            state
                .notices()
                .error(View::Products, format!("Failed to delete product: {e}"));
        }
    }
    Redirect::to("/products")
}

// =============================================================================
// Helpers
// =============================================================================

impl ProductForm {
    const fn empty() -> Self {
        Self {
            name: String::new(),
            price: String::new(),
            stock: String::new(),
        }
    }
}

impl From<&Product> for ProductForm {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            price: product.price.to_plain_string(),
            stock: product.stock.to_string(),
        }
    }
}

fn editor<B: Backend>(
    state: &AppState<B>,
    session: &Session,
    id: Option<ProductId>,
    form: ProductForm,
    error: Option<String>,
) -> ProductFormTemplate {
    let (heading, action, submit_label) = match id {
        Some(id) => ("Edit Product", format!("/products/{id}"), "Save Changes"),
        None => ("Add Product", "/products".to_string(), "Add Product"),
    };
    ProductFormTemplate {
        shell: Shell::new(state, session, View::Products),
        heading,
        action,
        submit_label,
        name: form.name,
        price: form.price,
        stock: form.stock,
        error,
    }
}

/// Re-render the editor with the cashier's input and the reason it failed.
fn rejected<B: Backend>(
    state: &AppState<B>,
    session: &Session,
    id: Option<ProductId>,
    form: ProductForm,
    error: &CatalogError,
) -> Response {
    let status = match error {
        CatalogError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CatalogError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
        CatalogError::Backend(e) => {
            warn!(error = %e, "Failed to save product");
            StatusCode::BAD_GATEWAY
        }
    };
    let message = match error {
        CatalogError::Backend(e) => format!("Failed to save product: {e}"),
        other => other.to_string(),
    };
    (status, editor(state, session, id, form, Some(message))).into_response()
}

fn back_to_table<B: Backend>(state: &AppState<B>, error: &CatalogError) -> Response {
    if let CatalogError::Backend(e) = error {
        warn!(error = %e, "Failed to load product");
    }
    state.notices().error(View::Products, error.to_string());
    Redirect::to("/products").into_response()
}
