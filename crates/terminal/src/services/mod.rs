//! Business logic between the routes and the backend.
//!
//! # Services
//!
//! - `auth` - Sign-in, sign-up and sign-out through the backend
//! - `catalog` - Product listing and the product editor's writes
//! - `checkout` - Turning a cart into a sale and decrementing stock
//! - `ledger` - Read-only sales history
//!
//! Services borrow the backend for the duration of one operation and hold no
//! state of their own.

pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod ledger;

pub use auth::{AuthError, AuthService, SignUpOutcome};
pub use catalog::{CatalogError, CatalogService};
pub use checkout::{CheckoutError, CheckoutOutcome, CheckoutService};
pub use ledger::{LedgerError, LedgerService};
