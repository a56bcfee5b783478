//! Records exchanged with the hosted backend.

pub mod product;
pub mod sale;
pub mod session;

pub use product::{NewProduct, Product, ProductDraft, ProductPatch, ValidationError};
pub use sale::{NewSale, Sale, SaleItem};
pub use session::{AuthEvent, AuthEventKind, Identity, Session};
