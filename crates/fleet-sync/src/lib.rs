//! Cross-panel aggregation and mutation.
//!
//! This crate builds the unified view over the panel fleet:
//!
//! - [`Aggregator`] — concurrent fan-out to every active panel, merge by
//!   identity
//! - [`UserCache`] — process-wide snapshot with coalesced refreshes and
//!   a periodic sync task
//! - [`CombinedService`] — read and write operations over the logical
//!   user, applied across all panels it exists on
//! - [`IdentityResolver`] — uuid ↔ username mapping via the store
//!
//! # Wiring
//!
//! ```no_run
//! use std::sync::Arc;
//! use fleet_core::MemoryStore;
//! use fleet_panels::PanelRegistry;
//! use fleet_sync::{Aggregator, CombinedService, SyncConfig, UserCache};
//!
//! let store = Arc::new(MemoryStore::new());
//! let registry = Arc::new(PanelRegistry::new(store.clone()));
//! let cache = Arc::new(UserCache::new(Aggregator::new(store.clone(), registry.clone())));
//! let service = CombinedService::new(store, registry, cache.clone());
//!
//! let shutdown = tokio_util::sync::CancellationToken::new();
//! cache.spawn_refresh_task(SyncConfig::default().refresh_interval(), shutdown);
//! ```

mod aggregator;
mod cache;
mod config;
mod identity;
mod merge;
mod service;

pub use aggregator::Aggregator;
pub use cache::UserCache;
pub use config::SyncConfig;
pub use identity::{IdentityResolver, ResolvedIdentity};
pub use merge::MergedBuilder;
pub use service::{CombinedService, ModifyRequest};
