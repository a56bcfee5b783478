//! Client-side product filtering.
//!
//! The store returns the whole catalog ordered by name; narrowing it by a
//! search term happens locally. The management table shows everything that
//! matches, while the point-of-sale grid also hides products with no stock.

use crate::models::Product;

/// Case-insensitive substring match on the product name. An empty or blank
/// term matches everything.
#[must_use]
pub fn name_matches(product: &Product, term: &str) -> bool {
    let term = term.trim();
    term.is_empty() || product.name.to_lowercase().contains(&term.to_lowercase())
}

/// Products whose name matches `term`, in catalog order.
#[must_use]
pub fn filter_by_name<'a>(products: &'a [Product], term: &str) -> Vec<&'a Product> {
    products
        .iter()
        .filter(|product| name_matches(product, term))
        .collect()
}

/// Products a cashier can sell: name matches `term` and stock is positive.
#[must_use]
pub fn purchasable<'a>(products: &'a [Product], term: &str) -> Vec<&'a Product> {
    products
        .iter()
        .filter(|product| product.is_in_stock() && name_matches(product, term))
        .collect()
}
