//! Panel clients for the fleet.
//!
//! Four remote panel products, one contract: every client speaks its
//! panel's native API and normalizes users to
//! [`fleet_core::NormalizedUser`]. Marzban and marzneshin share a client
//! type (same auth scheme and field conventions).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fleet_core::MemoryStore;
//! use fleet_panels::{PanelClient, PanelRegistry};
//!
//! # async fn example() -> Result<(), fleet_panels::PanelError> {
//! let registry = PanelRegistry::new(Arc::new(MemoryStore::new()));
//! let client = registry.get("de-1").await?;
//! let _users = client.get_all_users().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod hiddify;
mod http;
mod marzban;
mod registry;
mod remnawave;
mod traits;
mod wire;

pub use error::PanelError;
pub use hiddify::HiddifyClient;
pub use marzban::MarzbanClient;
pub use registry::{PanelRegistry, build_client};
pub use remnawave::RemnawaveClient;
pub use traits::{NewUser, PanelClient, UserChange, UserId};
