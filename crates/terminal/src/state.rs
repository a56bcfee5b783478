//! Application state shared across handlers.

use std::sync::{Arc, Mutex, PoisonError};

use countertop_core::{Cart, Product, ProductId};

use crate::backend::Backend;
use crate::config::StockMode;
use crate::notice::NoticeBoard;
use crate::session::SessionHolder;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. One till runs one process, so the cart and
/// notices here are the till's, not a per-visitor session's.
pub struct AppState<B> {
    inner: Arc<AppStateInner<B>>,
}

struct AppStateInner<B> {
    backend: Arc<B>,
    session: SessionHolder,
    stock_mode: StockMode,
    cart: tokio::sync::Mutex<Cart>,
    catalog: Mutex<Vec<Product>>,
    notices: NoticeBoard,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend> AppState<B> {
    /// Start the session holder and its refresh task, then build the state.
    pub async fn start(backend: B, stock_mode: StockMode) -> Self {
        let backend = Arc::new(backend);
        let session = SessionHolder::start(backend.as_ref()).await;
        session.keep_fresh(Arc::clone(&backend));
        Self::with_session(backend, session, stock_mode)
    }

    /// Build the state around an already started session holder.
    #[must_use]
    pub fn with_session(backend: Arc<B>, session: SessionHolder, stock_mode: StockMode) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                backend,
                session,
                stock_mode,
                cart: tokio::sync::Mutex::new(Cart::new()),
                catalog: Mutex::new(Vec::new()),
                notices: NoticeBoard::new(),
            }),
        }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    #[must_use]
    pub fn session(&self) -> &SessionHolder {
        &self.inner.session
    }

    #[must_use]
    pub fn stock_mode(&self) -> StockMode {
        self.inner.stock_mode
    }

    /// The till's cart. Held for the whole of a checkout.
    #[must_use]
    pub fn cart(&self) -> &tokio::sync::Mutex<Cart> {
        &self.inner.cart
    }

    #[must_use]
    pub fn notices(&self) -> &NoticeBoard {
        &self.inner.notices
    }

    /// Remember the products last shown to the cashier. Add-to-cart uses
    /// these, so the cart sees the stock the cashier saw.
    pub fn remember_catalog(&self, products: &[Product]) {
        let mut catalog = self
            .inner
            .catalog
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        catalog.clear();
        catalog.extend_from_slice(products);
    }

    /// The products last shown to the cashier.
    #[must_use]
    pub fn catalog_snapshot(&self) -> Vec<Product> {
        self.inner
            .catalog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// A product from the last fetched catalog.
    #[must_use]
    pub fn catalog_product(&self, id: ProductId) -> Option<Product> {
        self.inner
            .catalog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    /// Stop background tasks.
    pub fn shutdown(&self) {
        self.inner.session.shutdown();
    }
}
