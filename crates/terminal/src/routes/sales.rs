//! Sales ledger route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::{instrument, warn};

use countertop_core::{Sale, SaleItem};

use super::Shell;
use crate::backend::Backend;
use crate::middleware::RequireSession;
use crate::notice::View;
use crate::services::LedgerService;
use crate::state::AppState;

/// One sale in the ledger.
#[derive(Debug, Clone)]
pub struct SaleRow {
    pub date: String,
    pub items: Vec<String>,
    pub total: String,
}

impl From<&Sale> for SaleRow {
    fn from(sale: &Sale) -> Self {
        Self {
            date: sale.created_at.format("%Y-%m-%d %H:%M").to_string(),
            items: sale.items.iter().map(describe_item).collect(),
            total: sale.total_amount.to_string(),
        }
    }
}

/// `2x Widget @ $9.99`
fn describe_item(item: &SaleItem) -> String {
    format!("{}x {} @ {}", item.quantity, item.name, item.price)
}

/// Sales ledger template.
#[derive(Template, WebTemplate)]
#[template(path = "sales/index.html")]
pub struct SalesTemplate {
    pub shell: Shell,
    pub sales: Vec<SaleRow>,
}

/// All sales, newest first.
#[instrument(skip(state, session))]
pub async fn index<B: Backend>(
    State(state): State<AppState<B>>,
    RequireSession(session): RequireSession,
) -> SalesTemplate {
    let sales = match LedgerService::new(state.backend()).recent().await {
        Ok(sales) => sales.iter().map(SaleRow::from).collect(),
        Err(e) => {
            warn!(error = %e, "Failed to load sales");
            state.notices().error(View::Sales, e.to_string());
            Vec::new()
        }
    };

    SalesTemplate {
        shell: Shell::new(&state, &session, View::Sales),
        sales,
    }
}
