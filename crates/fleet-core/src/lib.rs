//! Shared data model for the panel fleet.
//!
//! This crate defines the common user contract every panel client
//! normalizes to, the merged cross-panel view, the logical identity a
//! merge is keyed by, and the [`Store`] trait over the bot-owned
//! relational store.
//!
//! # Example
//!
//! ```
//! use fleet_core::{Identity, units};
//!
//! let id = Identity::PanelLocal("alice".to_string());
//! assert_eq!(id.key(), "marzban_alice");
//! assert_eq!(units::gb_to_bytes(1.0), 1 << 30);
//! ```

pub mod expiry;
mod identity;
pub mod store;
mod types;
pub mod units;

pub use identity::{Identity, PANEL_LOCAL_PREFIX};
pub use store::{MemoryStore, Store, StoreError, UuidRow};
pub use types::{MergedUser, NormalizedUser, PanelBreakdown, PanelConfig, PanelKind};
