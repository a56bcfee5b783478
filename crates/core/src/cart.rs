//! The till's in-memory cart.
//!
//! Lines are keyed by product id and kept in the order they were first
//! added. Each line carries the product as of the latest catalog fetch the
//! cashier acted on: adding or setting a quantity passes the freshly fetched
//! product in, the line takes its stock level, and the quantity is bounded
//! by it. The store is not consulted again until checkout.
//!
//! # Example
//!
//! ```rust
//! # use countertop_core::{Cart, Money, Product, ProductId, UserId};
//! # let product = Product {
//! #     id: ProductId::generate(),
//! #     created_at: chrono::Utc::now(),
//! #     name: "Widget".to_string(),
//! #     price: Money::from_cents(999),
//! #     stock: 5,
//! #     user_id: UserId::generate(),
//! # };
//! let mut cart = Cart::new();
//! cart.add(&product);
//! cart.add(&product);
//! assert_eq!(cart.total(), Money::from_cents(1998));
//!
//! cart.set_quantity(&product, 40); // clamped to the 5 on hand
//! assert_eq!(cart.get(product.id).map(|line| line.quantity), Some(5));
//! ```

use crate::models::{Product, SaleItem};
use crate::types::{Money, ProductId};

/// One product's quantity awaiting checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    /// Product as of the last add or quantity change.
    pub product: Product,
    /// Always at least 1 and at most `product.stock`.
    pub quantity: u32,
}

impl CartLine {
    /// Price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.product.price.times(self.quantity)
    }

    /// Stock level known to this line.
    #[must_use]
    pub const fn known_stock(&self) -> i32 {
        self.product.stock
    }

    fn sale_item(&self) -> SaleItem {
        SaleItem {
            product_id: self.product.id,
            name: self.product.name.clone(),
            price: self.product.price,
            quantity: self.quantity,
        }
    }
}

/// Result of [`Cart::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new line was created with quantity 1.
    Added,
    /// An existing line grew to the given quantity.
    Incremented(u32),
    /// Nothing changed: one more unit would exceed the known stock.
    AtStockLimit,
}

/// Result of [`Cart::set_quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityOutcome {
    /// The line now holds this quantity (possibly clamped).
    Updated(u32),
    /// The clamped quantity was zero or less, so the line was dropped.
    Removed,
    /// No line for that product.
    NotInCart,
}

/// Cart lines keyed by product id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Add one unit of `product`, as just fetched from the catalog.
    ///
    /// Incrementing past the product's stock is silently ignored: the caller
    /// gets `AtStockLimit`. If the stock fell below the line's quantity since
    /// it was last touched, the line is brought down to the new stock (and
    /// dropped when none is left).
    pub fn add(&mut self, product: &Product) -> AddOutcome {
        let limit = stock_limit(product.stock);

        if let Some(position) = self.position(product.id) {
            let Some(line) = self.lines.get_mut(position) else {
                return AddOutcome::AtStockLimit;
            };
            line.product = product.clone();
            if line.quantity < limit {
                line.quantity += 1;
                return AddOutcome::Incremented(line.quantity);
            }
            if limit == 0 {
                self.lines.remove(position);
            } else {
                line.quantity = limit;
            }
            return AddOutcome::AtStockLimit;
        }

        if limit == 0 {
            return AddOutcome::AtStockLimit;
        }

        self.lines.push(CartLine {
            product: product.clone(),
            quantity: 1,
        });
        AddOutcome::Added
    }

    /// Set the line for `product` to `requested` units, clamped to the
    /// product's current stock. A clamped quantity of zero or less removes
    /// the line.
    pub fn set_quantity(&mut self, product: &Product, requested: i64) -> QuantityOutcome {
        let Some(position) = self.position(product.id) else {
            return QuantityOutcome::NotInCart;
        };

        let Some(line) = self.lines.get_mut(position) else {
            return QuantityOutcome::NotInCart;
        };
        line.product = product.clone();
        let clamped = requested.min(i64::from(line.known_stock()));

        match u32::try_from(clamped) {
            Ok(quantity) if quantity > 0 => {
                line.quantity = quantity;
                QuantityOutcome::Updated(quantity)
            }
            _ => {
                self.lines.remove(position);
                QuantityOutcome::Removed
            }
        }
    }

    /// Drop a line. Returns whether the product was in the cart.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.product.id != product_id);
        self.lines.len() != before
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of price times quantity over all lines.
    #[must_use]
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// The line for `product_id`, if any.
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product.id == product_id)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Number of units across all lines.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Snapshot the lines as sale items.
    #[must_use]
    pub fn sale_items(&self) -> Vec<SaleItem> {
        self.lines.iter().map(CartLine::sale_item).collect()
    }

    fn position(&self, product_id: ProductId) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.product.id == product_id)
    }
}

/// Largest quantity a line may hold for a given stock level.
fn stock_limit(stock: i32) -> u32 {
    u32::try_from(stock).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::UserId;

    fn product(name: &str, cents: i64, stock: i32) -> Product {
        Product {
            id: ProductId::generate(),
            created_at: Utc::now(),
            name: name.to_string(),
            price: Money::from_cents(cents),
            stock,
            user_id: UserId::generate(),
        }
    }

    fn expected_total(cart: &Cart) -> Money {
        cart.lines()
            .iter()
            .map(|line| line.product.price.times(line.quantity))
            .sum()
    }

    #[test]
    fn test_add_creates_line_with_quantity_one() {
        let widget = product("Widget", 999, 5);
        let mut cart = Cart::new();

        assert_eq!(cart.add(&widget), AddOutcome::Added);
        assert_eq!(cart.get(widget.id).map(|l| l.quantity), Some(1));
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_add_increments_existing_line() {
        let widget = product("Widget", 999, 5);
        let mut cart = Cart::new();
        cart.add(&widget);

        assert_eq!(cart.add(&widget), AddOutcome::Incremented(2));
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_add_at_stock_limit_is_noop() {
        let widget = product("Widget", 999, 2);
        let mut cart = Cart::new();
        cart.add(&widget);
        cart.add(&widget);
        let before = cart.clone();

        assert_eq!(cart.add(&widget), AddOutcome::AtStockLimit);
        assert_eq!(cart, before);
    }

    #[test]
    fn test_add_out_of_stock_product_is_noop() {
        let widget = product("Widget", 999, 0);
        let mut cart = Cart::new();

        assert_eq!(cart.add(&widget), AddOutcome::AtStockLimit);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_clamps_to_known_stock() {
        let widget = product("Widget", 999, 5);
        let mut cart = Cart::new();
        cart.add(&widget);

        assert_eq!(
            cart.set_quantity(&widget, 12),
            QuantityOutcome::Updated(5)
        );
        assert_eq!(cart.get(widget.id).map(|l| l.quantity), Some(5));
    }

    #[test]
    fn test_set_quantity_zero_or_negative_removes_line() {
        let widget = product("Widget", 999, 5);
        let gadget = product("Gadget", 500, 5);
        let mut cart = Cart::new();
        cart.add(&widget);
        cart.add(&gadget);

        assert_eq!(cart.set_quantity(&widget, 0), QuantityOutcome::Removed);
        assert!(cart.get(widget.id).is_none());

        assert_eq!(cart.set_quantity(&gadget, -3), QuantityOutcome::Removed);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_for_unknown_product() {
        let mut cart = Cart::new();
        assert_eq!(
            cart.set_quantity(&product("Ghost", 100, 5), 1),
            QuantityOutcome::NotInCart
        );
    }

    #[test]
    fn test_remove() {
        let widget = product("Widget", 999, 5);
        let mut cart = Cart::new();
        cart.add(&widget);

        assert!(cart.remove(widget.id));
        assert!(!cart.remove(widget.id));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_total_tracks_every_change() {
        let widget = product("Widget", 999, 5);
        let gadget = product("Gadget", 1250, 3);
        let mut cart = Cart::new();
        assert_eq!(cart.total(), Money::ZERO);

        cart.add(&widget);
        assert_eq!(cart.total(), expected_total(&cart));
        cart.add(&gadget);
        cart.add(&widget);
        assert_eq!(cart.total(), expected_total(&cart));
        assert_eq!(cart.total(), Money::from_cents(999 * 2 + 1250));

        cart.set_quantity(&gadget, 3);
        assert_eq!(cart.total(), expected_total(&cart));
        cart.remove(widget.id);
        assert_eq!(cart.total(), Money::from_cents(1250 * 3));
        assert_eq!(cart.unit_count(), 3);
    }

    #[test]
    fn test_sale_items_snapshot_lines_in_order() {
        let widget = product("Widget", 999, 5);
        let gadget = product("Gadget", 500, 5);
        let mut cart = Cart::new();
        cart.add(&widget);
        cart.add(&gadget);
        cart.add(&widget);

        let items = cart.sale_items();
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Widget", "Gadget"]);
        assert_eq!(items.first().map(|i| i.quantity), Some(2));
        assert_eq!(items.first().map(|i| i.product_id), Some(widget.id));
    }

    #[test]
    fn test_line_keeps_stock_known_when_added() {
        let mut widget = product("Widget", 999, 5);
        let mut cart = Cart::new();
        cart.add(&widget);

        // A later catalog fetch with lower stock does not touch the line.
        widget.stock = 1;
        assert_eq!(cart.get(widget.id).map(CartLine::known_stock), Some(5));
    }

    #[test]
    fn test_set_quantity_clamps_to_fresh_stock() {
        let mut widget = product("Widget", 999, 5);
        let mut cart = Cart::new();
        cart.add(&widget);

        widget.stock = 2;
        assert_eq!(cart.set_quantity(&widget, 5), QuantityOutcome::Updated(2));
        assert_eq!(cart.get(widget.id).map(CartLine::known_stock), Some(2));

        widget.stock = 8;
        assert_eq!(cart.set_quantity(&widget, 7), QuantityOutcome::Updated(7));
        assert_eq!(cart.get(widget.id).map(CartLine::known_stock), Some(8));
    }

    #[test]
    fn test_add_takes_fresh_stock() {
        let mut widget = product("Widget", 999, 5);
        let mut cart = Cart::new();
        cart.add(&widget);
        cart.add(&widget);
        cart.add(&widget);

        widget.stock = 1;
        assert_eq!(cart.add(&widget), AddOutcome::AtStockLimit);
        let line = cart.get(widget.id).unwrap();
        assert_eq!((line.quantity, line.known_stock()), (1, 1));

        widget.stock = 0;
        assert_eq!(cart.add(&widget), AddOutcome::AtStockLimit);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_after_restock_increments() {
        let mut widget = product("Widget", 999, 1);
        let mut cart = Cart::new();
        cart.add(&widget);
        assert_eq!(cart.add(&widget), AddOutcome::AtStockLimit);

        widget.stock = 3;
        assert_eq!(cart.add(&widget), AddOutcome::Incremented(2));
        assert_eq!(cart.get(widget.id).map(CartLine::known_stock), Some(3));
    }
}
