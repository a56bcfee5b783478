//! Sales history.

use thiserror::Error;
use tracing::instrument;

use countertop_core::Sale;

use crate::backend::{BackendError, Store};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to load sales: {0}")]
    Backend(#[from] BackendError),
}

/// Read-only view over recorded sales.
pub struct LedgerService<'a, S> {
    store: &'a S,
}

impl<'a, S: Store> LedgerService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// All sales, newest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Backend` if the fetch fails.
    #[instrument(skip(self))]
    pub async fn recent(&self) -> Result<Vec<Sale>, LedgerError> {
        Ok(self.store.list_sales().await?)
    }
}
