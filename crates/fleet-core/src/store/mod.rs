//! The bot-owned relational store, seen through a narrow trait.
//!
//! This module provides:
//!
//! - [`Store`] — the query/write surface the fleet consumes (implement
//!   this for a real database)
//! - [`StoreError`] — store failure type
//! - [`MemoryStore`] / [`UuidRow`] — in-memory implementation, suitable
//!   for tests and small deployments
//!
//! Components receive a `Store` at construction instead of importing a
//! concrete database layer, so every piece is testable against
//! [`MemoryStore`].

mod error;
mod memory;
mod traits;

pub use error::StoreError;
pub use memory::{MemoryStore, UuidRow};
pub use traits::Store;
