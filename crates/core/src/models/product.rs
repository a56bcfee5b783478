//! Product records and the product editor's validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Money, MoneyError, ProductId, UserId};

/// A product as stored in the `products` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub price: Money,
    /// Units on hand. Non-negative by invariant, but the store is the source
    /// of truth and concurrent overwrites can leave any value here.
    pub stock: i32,
    pub user_id: UserId,
}

impl Product {
    /// Whether at least one unit is on hand.
    #[must_use]
    pub const fn is_in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Insert payload for a new product; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub stock: i32,
    pub user_id: UserId,
}

/// Partial update for an existing product. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i32>,
}

impl ProductPatch {
    /// A patch that only overwrites the stock level.
    #[must_use]
    pub const fn stock(stock: i32) -> Self {
        Self {
            name: None,
            price: None,
            stock: Some(stock),
        }
    }
}

/// Reasons the product editor refuses to submit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Price and stock must be valid numbers.")]
    InvalidNumber,
    #[error("Product name is required.")]
    EmptyName,
    #[error("Price must not be negative.")]
    NegativePrice,
    #[error("Price can have at most two decimal places.")]
    PriceTooPrecise,
    #[error("Price must be less than $10,000,000,000.")]
    PriceTooLarge,
    #[error("Stock must not be negative.")]
    NegativeStock,
}

/// Validated editor input, ready to become a [`NewProduct`] or [`ProductPatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub price: Money,
    pub stock: i32,
}

impl ProductDraft {
    /// Validate the raw editor fields.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidNumber` if price or stock do not
    /// parse, and the matching variant if the name is blank, a number is
    /// negative, or the price does not fit the store's `NUMERIC(12, 2)`.
    pub fn parse(name: &str, price: &str, stock: &str) -> Result<Self, ValidationError> {
        let price = match Money::parse(price) {
            Ok(price) => price,
            Err(MoneyError::NotANumber(_)) => return Err(ValidationError::InvalidNumber),
            Err(MoneyError::Negative) => return Err(ValidationError::NegativePrice),
            Err(MoneyError::TooManyDecimals { .. }) => {
                return Err(ValidationError::PriceTooPrecise);
            }
            Err(MoneyError::TooLarge { .. }) => return Err(ValidationError::PriceTooLarge),
        };
        let stock: i32 = stock
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidNumber)?;
        if stock < 0 {
            return Err(ValidationError::NegativeStock);
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        Ok(Self {
            name: name.to_string(),
            price,
            stock,
        })
    }

    /// Insert payload owned by `owner`.
    #[must_use]
    pub fn into_new_product(self, owner: UserId) -> NewProduct {
        NewProduct {
            name: self.name,
            price: self.price,
            stock: self.stock,
            user_id: owner,
        }
    }

    /// Full-overwrite patch for an existing product.
    #[must_use]
    pub fn into_patch(self) -> ProductPatch {
        ProductPatch {
            name: Some(self.name),
            price: Some(self.price),
            stock: Some(self.stock),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_parses_valid_input() {
        let draft = ProductDraft::parse(" Widget ", "9.99", "5").unwrap();
        assert_eq!(draft.name, "Widget");
        assert_eq!(draft.price, Money::from_cents(999));
        assert_eq!(draft.stock, 5);
    }

    #[test]
    fn test_draft_rejects_non_numeric_price() {
        assert_eq!(
            ProductDraft::parse("Widget", "abc", "5"),
            Err(ValidationError::InvalidNumber)
        );
    }

    #[test]
    fn test_draft_rejects_non_numeric_stock() {
        assert_eq!(
            ProductDraft::parse("Widget", "1.00", "lots"),
            Err(ValidationError::InvalidNumber)
        );
        assert_eq!(
            ProductDraft::parse("Widget", "1.00", "2.5"),
            Err(ValidationError::InvalidNumber)
        );
    }

    #[test]
    fn test_draft_rejects_negative_values() {
        assert_eq!(
            ProductDraft::parse("Widget", "-1", "5"),
            Err(ValidationError::NegativePrice)
        );
        assert_eq!(
            ProductDraft::parse("Widget", "1", "-5"),
            Err(ValidationError::NegativeStock)
        );
    }

    #[test]
    fn test_draft_rejects_prices_the_store_cannot_hold() {
        assert_eq!(
            ProductDraft::parse("Gold", "79228162514264337593543950335", "5"),
            Err(ValidationError::PriceTooLarge)
        );
        assert_eq!(
            ProductDraft::parse("Gold", "10000000000", "5"),
            Err(ValidationError::PriceTooLarge)
        );
        assert_eq!(
            ProductDraft::parse("Gold", "1.005", "5"),
            Err(ValidationError::PriceTooPrecise)
        );
        assert!(ProductDraft::parse("Gold", "9999999999.99", "5").is_ok());
    }

    #[test]
    fn test_draft_rejects_blank_name() {
        assert_eq!(
            ProductDraft::parse("   ", "1", "1"),
            Err(ValidationError::EmptyName)
        );
    }

    #[test]
    fn test_stock_patch_serializes_only_stock() {
        let json = serde_json::to_value(ProductPatch::stock(3)).unwrap();
        assert_eq!(json, serde_json::json!({ "stock": 3 }));
    }

    #[test]
    fn test_product_deserializes_store_row() {
        let row = serde_json::json!({
            "id": "0b5e7f3a-1d0c-4a8e-9a55-5f3e2c1d0b9a",
            "created_at": "2026-01-05T10:00:00+00:00",
            "name": "Widget",
            "price": 9.99,
            "stock": 5,
            "user_id": "6c1a9e0f-3b2d-4f7e-8a1b-2c3d4e5f6a7b"
        });
        let product: Product = serde_json::from_value(row).unwrap();
        assert_eq!(product.name, "Widget");
        assert_eq!(product.price, Money::from_cents(999));
        assert!(product.is_in_stock());
    }
}
