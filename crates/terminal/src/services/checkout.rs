//! Sale completion.
//!
//! Checkout is a two-step write against a store with no multi-record
//! transactions:
//!
//! 1. Insert one sale record snapshotting the cart.
//! 2. Update stock for every cart line, concurrently.
//!
//! How step 2 behaves is chosen by [`StockMode`]:
//!
//! - `Conditional`: each line is an atomic `stock - qty where stock >= qty`
//!   at the store. If any line fails, the lines that succeeded are put back
//!   and the sale is deleted, so the store ends up as if nothing happened.
//! - `Overwrite`: each line writes `known stock - qty`, computed from the
//!   stock seen when the cart was built. Concurrent tills can oversell and a
//!   failed line leaves the sale recorded with stock partially updated.
//!
//! Either way, a failure that leaves the store inconsistent is reported as
//! [`CheckoutError::PartiallyFailed`] and logged at `error`.

use futures::future::join_all;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use countertop_core::{Cart, CartLine, NewSale, ProductId, ProductPatch, Sale, SaleId};

use crate::backend::{Backend, BackendError};
use crate::config::StockMode;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("You must be logged in to complete a sale.")]
    NotAuthenticated,

    /// The "who is the caller" query itself failed.
    #[error("Could not verify the signed-in user: {0}")]
    Identity(#[source] BackendError),

    /// Nothing was written; the cart is unchanged.
    #[error("Failed to record the sale: {0}")]
    SaleNotRecorded(#[source] BackendError),

    /// A line asked for more than the store has. The sale was cancelled.
    #[error("Insufficient stock for {name}. The sale was cancelled.")]
    InsufficientStock { name: String },

    /// A stock update failed and every write was undone.
    #[error("Stock update failed; sale cancelled: {0}")]
    RolledBack(#[source] BackendError),

    /// The sale exists but stock does not match it.
    #[error(
        "Sale {sale_id} was recorded but inventory could not be fully updated, please verify stock: {source}"
    )]
    PartiallyFailed {
        sale_id: SaleId,
        #[source]
        source: BackendError,
    },
}

/// Result of a checkout that did not fail.
#[derive(Debug)]
pub enum CheckoutOutcome {
    /// The cart was empty; nothing was sent.
    EmptyCart,
    /// The sale was recorded and stock updated; the cart is now empty.
    Completed(Sale),
}

/// Cart-to-sale service.
pub struct CheckoutService<'a, B> {
    backend: &'a B,
    mode: StockMode,
}

impl<'a, B: Backend> CheckoutService<'a, B> {
    #[must_use]
    pub const fn new(backend: &'a B, mode: StockMode) -> Self {
        Self { backend, mode }
    }

    /// Record the cart as a sale and take its quantities out of stock.
    ///
    /// The cart is cleared only on success.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotAuthenticated` before any write if nobody
    /// is signed in, `CheckoutError::SaleNotRecorded` if the sale insert
    /// fails (no stock is touched), and a stock error as described in the
    /// module docs.
    #[instrument(skip(self, cart), fields(mode = %self.mode, lines = cart.len()))]
    pub async fn checkout(&self, cart: &mut Cart) -> Result<CheckoutOutcome, CheckoutError> {
        if cart.is_empty() {
            return Ok(CheckoutOutcome::EmptyCart);
        }

        let owner = self
            .backend
            .current_user()
            .await
            .map_err(CheckoutError::Identity)?
            .ok_or(CheckoutError::NotAuthenticated)?;

        let sale = self
            .backend
            .insert_sale(&NewSale::from_cart(owner.id, cart))
            .await
            .map_err(|e| {
                warn!(error = %e, "Sale insert failed, stock untouched");
                CheckoutError::SaleNotRecorded(e)
            })?;

        match self.mode {
            StockMode::Conditional => self.decrement_conditionally(&sale, cart.lines()).await?,
            StockMode::Overwrite => self.overwrite_stock(&sale, cart.lines()).await?,
        }

        cart.clear();
        info!(
            sale_id = %sale.id,
            total = %sale.total_amount,
            units = sale.unit_count(),
            "Sale completed"
        );
        Ok(CheckoutOutcome::Completed(sale))
    }

    async fn decrement_conditionally(
        &self,
        sale: &Sale,
        lines: &[CartLine],
    ) -> Result<(), CheckoutError> {
        let results = join_all(lines.iter().map(|line| async move {
            let id = line.product.id;
            (id, line.quantity, self.backend.adjust_stock(id, -units(line.quantity)).await)
        }))
        .await;

        let mut applied = Vec::new();
        let mut first_failure = None;
        for (id, quantity, result) in results {
            match result {
                Ok(_) => applied.push((id, quantity)),
                Err(e) => {
                    warn!(product_id = %id, quantity, error = %e, "Stock decrement failed");
                    first_failure.get_or_insert(e);
                }
            }
        }
        let Some(failure) = first_failure else {
            return Ok(());
        };

        self.compensate(sale, &applied).await?;

        Err(match failure {
            BackendError::InsufficientStock(id) => CheckoutError::InsufficientStock {
                name: product_name(lines, id),
            },
            other => CheckoutError::RolledBack(other),
        })
    }

    /// Put back the decrements that went through and delete the sale.
    async fn compensate(&self, sale: &Sale, applied: &[(ProductId, u32)]) -> Result<(), CheckoutError> {
        let restores = join_all(applied.iter().map(|&(id, quantity)| async move {
            (id, self.backend.adjust_stock(id, units(quantity)).await)
        }))
        .await;

        let mut failure = None;
        for (id, result) in restores {
            if let Err(e) = result {
                error!(sale_id = %sale.id, product_id = %id, error = %e, "Failed to restore stock");
                failure.get_or_insert(e);
            }
        }

        if let Err(e) = self.backend.delete_sale(sale.id).await {
            error!(sale_id = %sale.id, error = %e, "Failed to delete cancelled sale");
            failure.get_or_insert(e);
        }

        match failure {
            Some(source) => Err(CheckoutError::PartiallyFailed {
                sale_id: sale.id,
                source,
            }),
            None => {
                info!(sale_id = %sale.id, restored = applied.len(), "Checkout rolled back");
                Ok(())
            }
        }
    }

    async fn overwrite_stock(&self, sale: &Sale, lines: &[CartLine]) -> Result<(), CheckoutError> {
        let results = join_all(lines.iter().map(|line| async move {
            let id = line.product.id;
            let patch = ProductPatch::stock(line.known_stock() - units(line.quantity));
            (id, self.backend.update_product(id, &patch).await)
        }))
        .await;

        let failure = results.into_iter().find_map(|(id, result)| {
            result.err().map(|e| {
                error!(sale_id = %sale.id, product_id = %id, error = %e, "Stock overwrite failed");
                e
            })
        });

        match failure {
            Some(source) => Err(CheckoutError::PartiallyFailed {
                sale_id: sale.id,
                source,
            }),
            None => Ok(()),
        }
    }
}

/// Cart quantities never exceed an `i32` stock level.
fn units(quantity: u32) -> i32 {
    i32::try_from(quantity).unwrap_or(i32::MAX)
}

fn product_name(lines: &[CartLine], id: ProductId) -> String {
    lines
        .iter()
        .find(|line| line.product.id == id)
        .map_or_else(|| id.to_string(), |line| line.product.name.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use countertop_core::{Money, Product};

    use super::*;
    use crate::backend::MemoryBackend;
    use crate::backend::memory::Call;

    fn signed_in_backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.sign_in_as("cashier@example.com");
        backend
    }

    fn cart_with(lines: &[(&Product, i64)]) -> Cart {
        let mut cart = Cart::new();
        for (product, quantity) in lines {
            cart.add(product);
            cart.set_quantity(product, *quantity);
        }
        cart
    }

    #[tokio::test]
    async fn test_completes_sale_and_decrements_stock() {
        let backend = signed_in_backend();
        let widget = backend.seed_product("Widget", Money::from_cents(999), 5);
        let mut cart = cart_with(&[(&widget, 2)]);

        let outcome = CheckoutService::new(&backend, StockMode::Conditional)
            .checkout(&mut cart)
            .await
            .unwrap();

        let CheckoutOutcome::Completed(sale) = outcome else {
            panic!("expected a completed sale");
        };
        assert_eq!(sale.total_amount, Money::from_cents(1998));
        assert_eq!(sale.items.len(), 1);
        assert_eq!(sale.items[0].product_id, widget.id);
        assert_eq!(sale.items[0].quantity, 2);
        assert_eq!(backend.stock_of(widget.id), Some(3));
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_makes_no_calls() {
        let backend = signed_in_backend();
        backend.clear_calls();
        let mut cart = Cart::new();

        let outcome = CheckoutService::new(&backend, StockMode::Conditional)
            .checkout(&mut cart)
            .await
            .unwrap();
        assert!(matches!(outcome, CheckoutOutcome::EmptyCart));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_requires_identity_before_writing() {
        let backend = MemoryBackend::new();
        let widget = backend.seed_product("Widget", Money::from_cents(999), 5);
        let mut cart = cart_with(&[(&widget, 1)]);

        let err = CheckoutService::new(&backend, StockMode::Conditional)
            .checkout(&mut cart)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "You must be logged in to complete a sale.");
        assert!(backend.writes().is_empty());
        assert_eq!(cart.len(), 1);
    }

    #[tokio::test]
    async fn test_sale_insert_failure_touches_no_stock() {
        let backend = signed_in_backend();
        backend.fail_sale_insert();
        let widget = backend.seed_product("Widget", Money::from_cents(999), 5);
        let mut cart = cart_with(&[(&widget, 2)]);

        let err = CheckoutService::new(&backend, StockMode::Conditional)
            .checkout(&mut cart)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::SaleNotRecorded(_)));
        assert_eq!(backend.writes(), [Call::InsertSale]);
        assert_eq!(backend.stock_of(widget.id), Some(5));
        assert_eq!(cart.get(widget.id).unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_everything() {
        let backend = signed_in_backend();
        let widget = backend.seed_product("Widget", Money::from_cents(999), 5);
        let gadget = backend.seed_product("Gadget", Money::from_cents(500), 3);
        let mut cart = cart_with(&[(&widget, 2), (&gadget, 3)]);
        // Someone else sold two gadgets after this cart was built.
        backend.set_stock(gadget.id, 1);

        let err = CheckoutService::new(&backend, StockMode::Conditional)
            .checkout(&mut cart)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Gadget. The sale was cancelled."
        );
        assert_eq!(backend.stock_of(widget.id), Some(5));
        assert_eq!(backend.stock_of(gadget.id), Some(1));
        assert!(backend.sales().is_empty());
        assert_eq!(cart.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_line_restores_the_others() {
        let backend = signed_in_backend();
        let widget = backend.seed_product("Widget", Money::from_cents(999), 5);
        let gadget = backend.seed_product("Gadget", Money::from_cents(500), 3);
        backend.fail_stock_update(gadget.id);
        let mut cart = cart_with(&[(&widget, 2), (&gadget, 1)]);

        let err = CheckoutService::new(&backend, StockMode::Conditional)
            .checkout(&mut cart)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::RolledBack(_)));
        assert!(backend.calls().contains(&Call::AdjustStock(widget.id, 2)));
        assert_eq!(backend.stock_of(widget.id), Some(5));
        assert!(backend.sales().is_empty());
    }

    #[tokio::test]
    async fn test_failed_restore_is_partial_failure() {
        let backend = signed_in_backend();
        let widget = backend.seed_product("Widget", Money::from_cents(999), 5);
        let gadget = backend.seed_product("Gadget", Money::from_cents(500), 3);
        backend.fail_stock_update(gadget.id);
        backend.fail_stock_restore(widget.id);
        let mut cart = cart_with(&[(&widget, 2), (&gadget, 1)]);

        let err = CheckoutService::new(&backend, StockMode::Conditional)
            .checkout(&mut cart)
            .await
            .unwrap_err();
        let CheckoutError::PartiallyFailed { sale_id, .. } = err else {
            panic!("expected a partial failure, got {err:?}");
        };
        assert!(backend.calls().contains(&Call::DeleteSale(sale_id)));
        assert_eq!(backend.stock_of(widget.id), Some(3));
    }

    #[tokio::test]
    async fn test_overwrite_mode_writes_known_stock_minus_quantity() {
        let backend = signed_in_backend();
        let widget = backend.seed_product("Widget", Money::from_cents(999), 5);
        let mut cart = cart_with(&[(&widget, 2)]);
        backend.set_stock(widget.id, 9);

        CheckoutService::new(&backend, StockMode::Overwrite)
            .checkout(&mut cart)
            .await
            .unwrap();
        assert!(
            backend
                .calls()
                .contains(&Call::UpdateProduct(widget.id, ProductPatch::stock(3)))
        );
        assert_eq!(backend.stock_of(widget.id), Some(3));
    }

    #[tokio::test]
    async fn test_overwrite_failure_keeps_sale() {
        let backend = signed_in_backend();
        let widget = backend.seed_product("Widget", Money::from_cents(999), 5);
        backend.fail_stock_update(widget.id);
        let mut cart = cart_with(&[(&widget, 2)]);

        let err = CheckoutService::new(&backend, StockMode::Overwrite)
            .checkout(&mut cart)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::PartiallyFailed { .. }));
        assert_eq!(backend.sales().len(), 1);
        assert_eq!(cart.len(), 1);
    }
}
