//! Concurrent fan-out and merge across all active panels.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use fleet_core::{Identity, MergedUser, NormalizedUser, PanelConfig, PanelKind, Store};
use fleet_panels::{PanelClient, PanelError, PanelRegistry};

use crate::merge::MergedBuilder;

/// Best-effort snapshot builder over the active fleet.
///
/// A single panel's failure (network, auth, decode) is logged and the
/// panel skipped; partial snapshots are valid. Only a store failure
/// listing the active panels aborts the run, so callers keep their
/// previous state.
pub struct Aggregator {
    store: Arc<dyn Store>,
    registry: Arc<PanelRegistry>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn Store>, registry: Arc<PanelRegistry>) -> Self {
        Self { store, registry }
    }

    /// Fetch and merge every user across all active panels.
    pub async fn fetch_all(&self) -> Result<Vec<MergedUser>, PanelError> {
        let panels = self
            .store
            .active_panels()
            .await
            .map_err(|e| PanelError::config(format!("listing active panels: {e}")))?;

        let fetches = panels.iter().map(|config| async move {
            let users = self.fetch_panel(config).await;
            (config, users)
        });
        let results = join_all(fetches).await;

        let mut merged: HashMap<String, MergedBuilder> = HashMap::new();
        for (config, result) in results {
            let users = match result {
                Ok(users) => users,
                Err(err) => {
                    warn!(panel = %config.name, error = %err, "skipping panel in aggregation");
                    continue;
                }
            };
            debug!(panel = %config.name, users = users.len(), "panel fetched");
            for user in users {
                let Some(identity) = self.identity_for(config.kind, &user).await else {
                    warn!(panel = %config.name, "record without a usable id, skipping");
                    continue;
                };
                merged
                    .entry(identity.key())
                    .or_insert_with(|| MergedBuilder::new(&identity))
                    .push(&config.name, config.kind, user);
            }
        }

        let mut users: Vec<MergedUser> = merged.into_values().map(MergedBuilder::build).collect();
        users.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(users)
    }

    async fn fetch_panel(&self, config: &PanelConfig) -> Result<Vec<NormalizedUser>, PanelError> {
        let client = self.registry.get_for(config)?;
        client.get_all_users().await
    }

    /// The identity a record merges under.
    ///
    /// UUID-keyed panels carry it in the record. Username-keyed panels
    /// are promoted to the stored uuid mapping when one exists; a
    /// failed or empty lookup degrades to the synthetic panel-local
    /// identity.
    async fn identity_for(&self, kind: PanelKind, user: &NormalizedUser) -> Option<Identity> {
        if kind.uses_uuid_id() {
            return user.uuid.map(Identity::Uuid);
        }
        let username = user.username.as_deref()?;
        match self.store.uuid_by_username(username).await {
            Ok(Some(uuid)) => Some(Identity::Uuid(uuid)),
            Ok(None) => Some(Identity::PanelLocal(username.to_string())),
            Err(err) => {
                warn!(username, error = %err, "uuid promotion lookup failed");
                Some(Identity::PanelLocal(username.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator").finish_non_exhaustive()
    }
}
