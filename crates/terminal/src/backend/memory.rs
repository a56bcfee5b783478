//! In-process backend for tests.
//!
//! Behaves like the hosted backend from the till's point of view: products
//! ordered by name, sales newest first, conditional stock adjustment, and
//! session-change events on sign-in/out. Every call is recorded so tests can
//! assert which remote operations a flow issued, and individual operations
//! can be made to fail.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Duration, Utc};
use secrecy::ExposeSecret;
use tokio::sync::broadcast;

use countertop_core::{
    AuthEvent, Identity, Money, NewProduct, NewSale, Product, ProductId, ProductPatch, Sale,
    SaleId, Session, UserId,
};

use super::{Auth, AuthSubscription, BackendError, Credentials, Store};

const SESSION_LIFETIME_SECS: i64 = 3600;

/// A remote operation issued against the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListProducts,
    InsertProduct(String),
    UpdateProduct(ProductId, ProductPatch),
    DeleteProduct(ProductId),
    AdjustStock(ProductId, i32),
    ListSales,
    InsertSale,
    DeleteSale(SaleId),
    GetSession,
    CurrentUser,
    SignIn(String),
    SignUp(String),
    SignOut,
    RefreshSession,
}

impl Call {
    /// Whether the call writes to the products or sales collections.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(
            self,
            Self::InsertProduct(_)
                | Self::UpdateProduct(..)
                | Self::DeleteProduct(_)
                | Self::AdjustStock(..)
                | Self::InsertSale
                | Self::DeleteSale(_)
        )
    }
}

#[derive(Debug, Default)]
struct Failures {
    product_list: bool,
    product_writes: bool,
    sale_list: bool,
    sale_insert: bool,
    sale_delete: bool,
    session_fetch: bool,
    refresh: bool,
    /// Decrements (and overwrites) of these products fail.
    stock_updates: HashSet<ProductId>,
    /// Re-increments of these products fail.
    stock_restores: HashSet<ProductId>,
}

struct Account {
    password: String,
    identity: Identity,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    products: Vec<Product>,
    sales: Vec<Sale>,
    calls: Vec<Call>,
    failures: Failures,
    require_confirmation: bool,
}

/// Backend held entirely in memory.
///
/// Cloning shares state, so a test can keep a handle while the application
/// owns another.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    events: broadcast::Sender<AuthEvent>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryBackend")
            .field("products", &state.products.len())
            .field("sales", &state.sales.len())
            .field("signed_in", &state.session.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn injected(operation: &str) -> BackendError {
    BackendError::Api {
        status: 503,
        message: format!("injected failure: {operation}"),
    }
}

fn issue_session(identity: &Identity) -> Session {
    Session {
        access_token: format!("access-{}", uuid::Uuid::new_v4()),
        refresh_token: format!("refresh-{}", uuid::Uuid::new_v4()),
        expires_at: Utc::now() + Duration::seconds(SESSION_LIFETIME_SECS),
        user: identity.clone(),
    }
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Arc::new(Mutex::new(State::default())),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: Call) -> MutexGuard<'_, State> {
        let mut state = self.lock();
        state.calls.push(call);
        state
    }

    fn emit(&self, event: AuthEvent) {
        self.events.send(event).ok();
    }

    // =========================================================================
    // Accounts and sessions
    // =========================================================================

    /// Create an account that can sign in with these credentials.
    pub fn register_user(&self, email: &str, password: &str) -> Identity {
        let identity = Identity {
            id: UserId::generate(),
            email: Some(email.to_string()),
        };
        self.lock().accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                identity: identity.clone(),
            },
        );
        identity
    }

    /// Sign in as a fresh user without going through credentials.
    pub fn sign_in_as(&self, email: &str) -> Session {
        let identity = self.register_user(email, "password");
        let session = issue_session(&identity);
        self.lock().session = Some(session.clone());
        self.emit(AuthEvent::signed_in(session.clone()));
        session
    }

    /// Put a session in place without emitting an event, as if it had been
    /// restored from storage before the till started.
    pub fn preset_session(&self, session: Session) {
        self.lock().session = Some(session);
    }

    /// Make sign-up wait for email confirmation instead of signing in.
    pub fn require_email_confirmation(&self) {
        self.lock().require_confirmation = true;
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Insert a product directly, bypassing the call log.
    pub fn seed_product(&self, name: &str, price: Money, stock: i32) -> Product {
        let product = Product {
            id: ProductId::generate(),
            created_at: Utc::now(),
            name: name.to_string(),
            price,
            stock,
            user_id: UserId::generate(),
        };
        self.lock().products.push(product.clone());
        product
    }

    /// Overwrite a product's stock directly, bypassing the call log.
    pub fn set_stock(&self, id: ProductId, stock: i32) {
        if let Some(product) = self.lock().products.iter_mut().find(|p| p.id == id) {
            product.stock = stock;
        }
    }

    #[must_use]
    pub fn product(&self, id: ProductId) -> Option<Product> {
        self.lock().products.iter().find(|p| p.id == id).cloned()
    }

    /// Current stock of a product, if it exists.
    #[must_use]
    pub fn stock_of(&self, id: ProductId) -> Option<i32> {
        self.product(id).map(|p| p.stock)
    }

    /// Stored sales in insertion order.
    #[must_use]
    pub fn sales(&self) -> Vec<Sale> {
        self.lock().sales.clone()
    }

    // =========================================================================
    // Call log
    // =========================================================================

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Recorded calls that wrote to products or sales.
    #[must_use]
    pub fn writes(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    // =========================================================================
    // Failure injection
    // =========================================================================

    pub fn fail_product_list(&self) {
        self.lock().failures.product_list = true;
    }

    /// Product inserts, updates and deletes fail.
    pub fn fail_product_writes(&self) {
        self.lock().failures.product_writes = true;
    }

    pub fn fail_sale_list(&self) {
        self.lock().failures.sale_list = true;
    }

    pub fn fail_sale_insert(&self) {
        self.lock().failures.sale_insert = true;
    }

    pub fn fail_sale_delete(&self) {
        self.lock().failures.sale_delete = true;
    }

    pub fn fail_session_fetch(&self) {
        self.lock().failures.session_fetch = true;
    }

    pub fn fail_refresh(&self) {
        self.lock().failures.refresh = true;
    }

    /// Decrementing (or overwriting) this product's stock fails.
    pub fn fail_stock_update(&self, id: ProductId) {
        self.lock().failures.stock_updates.insert(id);
    }

    /// Re-incrementing this product's stock fails.
    pub fn fail_stock_restore(&self, id: ProductId) {
        self.lock().failures.stock_restores.insert(id);
    }
}

impl Store for MemoryBackend {
    async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        let state = self.record(Call::ListProducts);
        if state.failures.product_list {
            return Err(injected("list products"));
        }
        let mut products = state.products.clone();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn insert_product(&self, product: &NewProduct) -> Result<Product, BackendError> {
        let mut state = self.record(Call::InsertProduct(product.name.clone()));
        if state.failures.product_writes {
            return Err(injected("insert product"));
        }
        let stored = Product {
            id: ProductId::generate(),
            created_at: Utc::now(),
            name: product.name.clone(),
            price: product.price,
            stock: product.stock,
            user_id: product.user_id,
        };
        state.products.push(stored.clone());
        Ok(stored)
    }

    async fn update_product(&self, id: ProductId, patch: &ProductPatch) -> Result<(), BackendError> {
        let mut state = self.record(Call::UpdateProduct(id, patch.clone()));
        if state.failures.product_writes
            || (patch.stock.is_some() && state.failures.stock_updates.contains(&id))
        {
            return Err(injected("update product"));
        }

        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| BackendError::NotFound(format!("products {id}")))?;
        if let Some(name) = &patch.name {
            product.name.clone_from(name);
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(stock) = patch.stock {
            product.stock = stock;
        }
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), BackendError> {
        let mut state = self.record(Call::DeleteProduct(id));
        if state.failures.product_writes {
            return Err(injected("delete product"));
        }
        let before = state.products.len();
        state.products.retain(|p| p.id != id);
        if state.products.len() == before {
            return Err(BackendError::NotFound(format!("products {id}")));
        }
        Ok(())
    }

    async fn adjust_stock(&self, id: ProductId, delta: i32) -> Result<i32, BackendError> {
        let mut state = self.record(Call::AdjustStock(id, delta));
        let failing = if delta < 0 {
            &state.failures.stock_updates
        } else {
            &state.failures.stock_restores
        };
        if failing.contains(&id) {
            return Err(injected("adjust stock"));
        }

        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(BackendError::InsufficientStock(id))?;
        let new_stock = product.stock + delta;
        if new_stock < 0 {
            return Err(BackendError::InsufficientStock(id));
        }
        product.stock = new_stock;
        Ok(new_stock)
    }

    async fn list_sales(&self) -> Result<Vec<Sale>, BackendError> {
        let state = self.record(Call::ListSales);
        if state.failures.sale_list {
            return Err(injected("list sales"));
        }
        // Timestamps can tie within a test, so insertion order breaks ties.
        Ok(state.sales.iter().rev().cloned().collect())
    }

    async fn insert_sale(&self, sale: &NewSale) -> Result<Sale, BackendError> {
        let mut state = self.record(Call::InsertSale);
        if state.failures.sale_insert {
            return Err(injected("insert sale"));
        }
        let stored = Sale {
            id: SaleId::generate(),
            created_at: Utc::now(),
            items: sale.items.clone(),
            total_amount: sale.total_amount,
            user_id: sale.user_id,
        };
        state.sales.push(stored.clone());
        Ok(stored)
    }

    async fn delete_sale(&self, id: SaleId) -> Result<(), BackendError> {
        let mut state = self.record(Call::DeleteSale(id));
        if state.failures.sale_delete {
            return Err(injected("delete sale"));
        }
        let before = state.sales.len();
        state.sales.retain(|s| s.id != id);
        if state.sales.len() == before {
            return Err(BackendError::NotFound(format!("sales {id}")));
        }
        Ok(())
    }
}

impl Auth for MemoryBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let state = self.record(Call::GetSession);
        if state.failures.session_fetch {
            return Err(injected("get session"));
        }
        Ok(state.session.clone())
    }

    async fn current_user(&self) -> Result<Option<Identity>, BackendError> {
        let state = self.record(Call::CurrentUser);
        Ok(state.session.as_ref().map(|s| s.user.clone()))
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, BackendError> {
        let session = {
            let mut state = self.record(Call::SignIn(credentials.email.clone()));
            let identity = state
                .accounts
                .get(&credentials.email)
                .filter(|account| {
                    credentials.password.expose_secret() == account.password
                })
                .map(|account| account.identity.clone())
                .ok_or_else(|| {
                    BackendError::Unauthorized("Invalid login credentials".to_string())
                })?;
            let session = issue_session(&identity);
            state.session = Some(session.clone());
            session
        };
        self.emit(AuthEvent::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<Session>, BackendError> {
        let session = {
            let mut state = self.record(Call::SignUp(credentials.email.clone()));
            if state.accounts.contains_key(&credentials.email) {
                return Err(BackendError::Api {
                    status: 422,
                    message: "User already registered".to_string(),
                });
            }
            let identity = Identity {
                id: UserId::generate(),
                email: Some(credentials.email.clone()),
            };
            state.accounts.insert(
                credentials.email.clone(),
                Account {
                    password: credentials.password.expose_secret().to_string(),
                    identity: identity.clone(),
                },
            );
            if state.require_confirmation {
                return Ok(None);
            }
            let session = issue_session(&identity);
            state.session = Some(session.clone());
            session
        };
        self.emit(AuthEvent::signed_in(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.record(Call::SignOut).session = None;
        self.emit(AuthEvent::signed_out());
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Session, BackendError> {
        let session = {
            let mut state = self.record(Call::RefreshSession);
            if state.failures.refresh {
                return Err(injected("refresh session"));
            }
            let current = state
                .session
                .as_ref()
                .ok_or_else(|| BackendError::Unauthorized("no session to refresh".to_string()))?;
            let session = issue_session(&current.user);
            state.session = Some(session.clone());
            session
        };
        self.emit(AuthEvent::token_refreshed(session.clone()));
        Ok(session)
    }

    fn subscribe(&self) -> AuthSubscription {
        AuthSubscription::new(self.events.subscribe())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_adjust_stock_refuses_to_go_negative() {
        let backend = MemoryBackend::new();
        let product = backend.seed_product("Widget", Money::from_cents(999), 2);

        assert_eq!(backend.adjust_stock(product.id, -2).await.unwrap(), 0);
        let err = backend.adjust_stock(product.id, -1).await.unwrap_err();
        assert!(matches!(err, BackendError::InsufficientStock(id) if id == product.id));
        assert_eq!(backend.stock_of(product.id), Some(0));
    }

    #[tokio::test]
    async fn test_sign_in_checks_password_and_emits_event() {
        let backend = MemoryBackend::new();
        backend.register_user("cashier@example.com", "hunter22");
        let mut events = backend.subscribe();

        let wrong = Credentials::new("cashier@example.com", "nope");
        assert!(matches!(
            backend.sign_in(&wrong).await,
            Err(BackendError::Unauthorized(_))
        ));

        let right = Credentials::new("cashier@example.com", "hunter22");
        let session = backend.sign_in(&right).await.unwrap();
        assert_eq!(events.recv().await, Some(AuthEvent::signed_in(session)));
    }

    #[tokio::test]
    async fn test_list_products_sorted_by_name() {
        let backend = MemoryBackend::new();
        backend.seed_product("Widget", Money::from_cents(100), 1);
        backend.seed_product("Gadget", Money::from_cents(100), 1);

        let names: Vec<_> = backend
            .list_products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["Gadget", "Widget"]);
    }
}
