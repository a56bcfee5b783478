//! Point-of-sale route handlers: product picker, cart and checkout.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use countertop_core::{Cart, Product, ProductId, catalog};

use super::{SearchQuery, Shell};
use crate::backend::Backend;
use crate::error::add_breadcrumb;
use crate::middleware::RequireSession;
use crate::notice::View;
use crate::services::{CatalogService, CheckoutError, CheckoutOutcome, CheckoutService};
use crate::state::AppState;

// =============================================================================
// View Types
// =============================================================================

/// A purchasable product in the picker.
#[derive(Debug, Clone)]
pub struct PickerRow {
    pub id: ProductId,
    pub name: String,
    pub price: String,
    pub stock: i32,
}

impl From<&Product> for PickerRow {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price.to_string(),
            stock: product.stock,
        }
    }
}

/// One cart line.
#[derive(Debug, Clone)]
pub struct CartRow {
    pub product_id: ProductId,
    pub name: String,
    pub price: String,
    pub quantity: u32,
    pub max_quantity: i32,
    pub line_total: String,
}

fn cart_rows(cart: &Cart) -> Vec<CartRow> {
    cart.lines()
        .iter()
        .map(|line| CartRow {
            product_id: line.product.id,
            name: line.product.name.clone(),
            price: line.product.price.to_string(),
            quantity: line.quantity,
            max_quantity: line.known_stock(),
            line_total: line.line_total().to_string(),
        })
        .collect()
}

/// Point-of-sale page template.
#[derive(Template, WebTemplate)]
#[template(path = "pos/index.html")]
pub struct PosTemplate {
    pub shell: Shell,
    pub query: String,
    pub products: Vec<PickerRow>,
    pub cart: Vec<CartRow>,
    pub total: String,
}

// =============================================================================
// Form Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CartLineForm {
    pub product_id: ProductId,
}

/// Quantity is free text: anything that is not an integer counts as zero.
#[derive(Debug, Deserialize)]
pub struct QuantityForm {
    pub product_id: ProductId,
    #[serde(default)]
    pub quantity: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Show in-stock products matching the filter next to the cart.
#[instrument(skip(state, session))]
pub async fn index<B: Backend>(
    State(state): State<AppState<B>>,
    RequireSession(session): RequireSession,
    Query(search): Query<SearchQuery>,
) -> PosTemplate {
    match CatalogService::new(state.backend()).list().await {
        Ok(products) => state.remember_catalog(&products),
        Err(e) => {
            warn!(error = %e, "Failed to load products");
            state
                .notices()
                .error(View::Pos, format!("Failed to load products: {e}"));
        }
    }

    let snapshot = state.catalog_snapshot();
    let products = catalog::purchasable(&snapshot, &search.q)
        .into_iter()
        .map(PickerRow::from)
        .collect();

    let cart = state.cart().lock().await;
    PosTemplate {
        shell: Shell::new(&state, &session, View::Pos),
        query: search.q,
        products,
        cart: cart_rows(&cart),
        total: cart.total().to_string(),
    }
}

/// Add one unit of a product, as last shown to the cashier.
#[instrument(skip(state, _session))]
pub async fn add_to_cart<B: Backend>(
    State(state): State<AppState<B>>,
    RequireSession(_session): RequireSession,
    Form(form): Form<CartLineForm>,
) -> Redirect {
    let Some(product) = state.catalog_product(form.product_id) else {
        state.notices().error(View::Pos, "Product not found.");
        return Redirect::to("/");
    };

    let outcome = state.cart().lock().await.add(&product);
    debug!(product_id = %product.id, ?outcome, "Add to cart");
    let product_id = product.id.to_string();
    add_breadcrumb("cart", "Added product", Some(&[("product_id", product_id.as_str())]));
    Redirect::to("/")
}

/// Set a line's quantity, clamped to the stock last shown to the cashier.
#[instrument(skip(state, _session))]
pub async fn set_quantity<B: Backend>(
    State(state): State<AppState<B>>,
    RequireSession(_session): RequireSession,
    Form(form): Form<QuantityForm>,
) -> Redirect {
    let requested = form.quantity.trim().parse::<i64>().unwrap_or(0);
    let mut cart = state.cart().lock().await;
    // A product missing from the latest listing keeps the stock its line has.
    let Some(product) = state
        .catalog_product(form.product_id)
        .or_else(|| cart.get(form.product_id).map(|line| line.product.clone()))
    else {
        return Redirect::to("/");
    };

    let outcome = cart.set_quantity(&product, requested);
    debug!(product_id = %form.product_id, requested, ?outcome, "Set cart quantity");
    Redirect::to("/")
}

#[instrument(skip(state, _session))]
pub async fn remove_from_cart<B: Backend>(
    State(state): State<AppState<B>>,
    RequireSession(_session): RequireSession,
    Form(form): Form<CartLineForm>,
) -> Redirect {
    state.cart().lock().await.remove(form.product_id);
    Redirect::to("/")
}

/// Complete the sale. The cart stays locked until the backend has answered,
/// so a second checkout on this till waits for the first.
#[instrument(skip(state, _session))]
pub async fn checkout<B: Backend>(
    State(state): State<AppState<B>>,
    RequireSession(_session): RequireSession,
) -> Redirect {
    let mut cart = state.cart().lock().await;
    let result = CheckoutService::new(state.backend(), state.stock_mode())
        .checkout(&mut cart)
        .await;
    drop(cart);

    match result {
        Ok(CheckoutOutcome::Completed(sale)) => {
            let sale_id = sale.id.to_string();
            add_breadcrumb("checkout", "Sale completed", Some(&[("sale_id", sale_id.as_str())]));
            state
                .notices()
                .success(View::Pos, "Sale completed successfully!");
        }
        Ok(CheckoutOutcome::EmptyCart) => {}
        Err(e) => {
            // Partial failures were already reported at `error`.
            if !matches!(e, CheckoutError::PartiallyFailed { .. }) {
                warn!(error = %e, "Checkout failed");
            }
            state.notices().error(View::Pos, e.to_string());
        }
    }
    Redirect::to("/")
}
