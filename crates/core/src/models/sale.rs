//! Sale records.
//!
//! A sale snapshots each product's name and price at checkout time, so later
//! catalog edits never rewrite history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::types::{Money, ProductId, SaleId, UserId};

/// One line of a recorded sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub quantity: u32,
}

impl SaleItem {
    /// Price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.price.times(self.quantity)
    }
}

/// A completed sale as stored in the `sales` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub created_at: DateTime<Utc>,
    pub items: Vec<SaleItem>,
    pub total_amount: Money,
    pub user_id: UserId,
}

impl Sale {
    /// Total number of units across all lines.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Insert payload for a sale; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSale {
    pub user_id: UserId,
    pub items: Vec<SaleItem>,
    pub total_amount: Money,
}

impl NewSale {
    /// Snapshot a cart into a sale owned by `owner`.
    #[must_use]
    pub fn from_cart(owner: UserId, cart: &Cart) -> Self {
        Self {
            user_id: owner,
            items: cart.sale_items(),
            total_amount: cart.total(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_item_uses_camel_case_product_id() {
        let item = SaleItem {
            product_id: ProductId::generate(),
            name: "Widget".to_string(),
            price: Money::from_cents(999),
            quantity: 2,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("productId").is_some());
        assert!(json.get("product_id").is_none());
        assert_eq!(json["price"], serde_json::json!(9.99));
    }

    #[test]
    fn test_line_total() {
        let item = SaleItem {
            product_id: ProductId::generate(),
            name: "Widget".to_string(),
            price: Money::from_cents(999),
            quantity: 2,
        };
        assert_eq!(item.line_total(), Money::from_cents(1998));
    }

    #[test]
    fn test_sale_deserializes_store_row() {
        let row = serde_json::json!({
            "id": "9d8c7b6a-5f4e-4d3c-8b2a-1a0f9e8d7c6b",
            "created_at": "2026-02-01T09:30:00+00:00",
            "items": [
                { "productId": "0b5e7f3a-1d0c-4a8e-9a55-5f3e2c1d0b9a", "name": "Widget", "price": 9.99, "quantity": 2 },
                { "productId": "1c6f8a4b-2e1d-4b9f-8b66-6a4f3d2e1c0b", "name": "Gadget", "price": 5, "quantity": 1 }
            ],
            "total_amount": 24.98,
            "user_id": "6c1a9e0f-3b2d-4f7e-8a1b-2c3d4e5f6a7b"
        });
        let sale: Sale = serde_json::from_value(row).unwrap();
        assert_eq!(sale.items.len(), 2);
        assert_eq!(sale.unit_count(), 3);
        assert_eq!(sale.total_amount, Money::from_cents(2498));
    }
}
