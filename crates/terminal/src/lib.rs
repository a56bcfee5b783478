//! Countertop terminal library.
//!
//! The till's web application as a library, so the binary and the
//! integration tests build the same router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod middleware;
pub mod notice;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
