//! Countertop Core - Domain types and the cart engine.
//!
//! This crate provides the types shared by the till and its tests:
//! - [`types`] - Newtype wrappers for type-safe IDs and decimal money
//! - [`models`] - Products, sales and sessions as the hosted backend stores them
//! - [`cart`] - The in-memory cart and its stock-bounded operations
//! - [`catalog`] - Client-side product filtering
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no async runtime. The till's services drive it against a
//! backend; tests drive it directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod models;
pub mod types;

pub use cart::{AddOutcome, Cart, CartLine, QuantityOutcome};
pub use models::*;
pub use types::*;
