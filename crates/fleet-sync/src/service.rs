//! Combined read and write operations over the logical user.
//!
//! Every operation resolves both identity forms, then talks to each
//! panel with the id form it understands. Mutations report
//! partial-success honestly: modify is any-success (a partial fleet is
//! still a success), delete is all-success (every panel must be
//! scrubbed).

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};
use uuid::Uuid;

use fleet_core::expiry::{SECS_PER_DAY, now_unix};
use fleet_core::{Identity, MergedUser, NormalizedUser, PanelKind, Store};
use fleet_panels::{NewUser, PanelClient, PanelError, PanelRegistry, UserChange, UserId};

use crate::cache::UserCache;
use crate::identity::{IdentityResolver, ResolvedIdentity};
use crate::merge::MergedBuilder;

/// A fleet-level modification request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModifyRequest {
    pub add_gb: f64,
    pub add_days: i64,
    pub set_limit_gb: Option<f64>,
    /// Absolute validity in days from now.
    pub set_days: Option<i64>,
    /// Restrict the write to panels of one kind.
    pub target_kind: Option<PanelKind>,
}

/// Read and write operations applied across the whole fleet.
pub struct CombinedService {
    store: Arc<dyn Store>,
    registry: Arc<PanelRegistry>,
    resolver: IdentityResolver,
    cache: Arc<UserCache>,
}

impl CombinedService {
    pub fn new(store: Arc<dyn Store>, registry: Arc<PanelRegistry>, cache: Arc<UserCache>) -> Self {
        let resolver = IdentityResolver::new(store.clone());
        Self {
            store,
            registry,
            resolver,
            cache,
        }
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    async fn resolve(&self, identity: &str) -> Result<ResolvedIdentity, PanelError> {
        self.resolver
            .resolve(identity)
            .await
            .map_err(|e| PanelError::config(format!("identity lookup failed: {e}")))
    }

    /// Fetch one logical user live from every active panel.
    ///
    /// The identity may be a UUID or a username; both forms are
    /// resolved and each panel is queried with the form it accepts.
    /// Returns `None` when no panel knows the user.
    pub async fn get_user(&self, identity: &str) -> Result<Option<MergedUser>, PanelError> {
        let resolved = self.resolve(identity).await?;
        let panels = self
            .store
            .active_panels()
            .await
            .map_err(|e| PanelError::config(format!("listing active panels: {e}")))?;

        let mut fetches = Vec::new();
        for config in &panels {
            let Some(id) = resolved.id_for(config.kind) else {
                continue;
            };
            let client = match self.registry.get_for(config) {
                Ok(client) => client,
                Err(err) => {
                    warn!(panel = %config.name, error = %err, "skipping panel");
                    continue;
                }
            };
            fetches.push(async move { (config, client.get_user(&id).await) });
        }

        let key = match resolved.uuid {
            Some(uuid) => Identity::Uuid(uuid),
            None => Identity::PanelLocal(
                resolved
                    .username
                    .clone()
                    .unwrap_or_else(|| identity.trim().to_string()),
            ),
        };
        let mut builder = MergedBuilder::new(&key);
        for (config, result) in join_all(fetches).await {
            match result {
                Ok(Some(user)) => builder.push(&config.name, config.kind, user),
                Ok(None) => {}
                Err(err) => {
                    warn!(panel = %config.name, error = %err, "lookup failed on panel");
                }
            }
        }

        if builder.is_empty() {
            Ok(None)
        } else {
            Ok(Some(builder.build()))
        }
    }

    /// Case-insensitive substring search against name and uuid over the
    /// cached snapshot.
    pub async fn search(&self, query: &str) -> Vec<MergedUser> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.cache
            .get()
            .await
            .iter()
            .filter(|user| {
                user.name.to_lowercase().contains(&needle)
                    || user
                        .uuid
                        .is_some_and(|u| u.to_string().contains(&needle))
            })
            .cloned()
            .collect()
    }

    /// Apply a modification on every active panel the user exists on.
    ///
    /// Any-success semantics: `Ok(true)` when at least one panel
    /// accepted the write. A successful extension also clears the
    /// user's renewal-reminder flag in the store.
    pub async fn modify_user(
        &self,
        identity: &str,
        request: &ModifyRequest,
    ) -> Result<bool, PanelError> {
        let resolved = self.resolve(identity).await?;
        let panels = self
            .store
            .active_panels()
            .await
            .map_err(|e| PanelError::config(format!("listing active panels: {e}")))?;

        let change = UserChange {
            add_gb: request.add_gb,
            add_days: request.add_days,
            set_limit_gb: request.set_limit_gb,
            set_expire: request
                .set_days
                .map(|days| now_unix() + days * SECS_PER_DAY),
        };

        let mut writes = Vec::new();
        for config in &panels {
            if request.target_kind.is_some_and(|kind| kind != config.kind) {
                continue;
            }
            let Some(id) = resolved.id_for(config.kind) else {
                continue;
            };
            let client = match self.registry.get_for(config) {
                Ok(client) => client,
                Err(err) => {
                    warn!(panel = %config.name, error = %err, "skipping panel");
                    continue;
                }
            };
            writes.push(async move { (config, client.modify_user(&id, &change).await) });
        }

        let mut any_success = false;
        for (config, result) in join_all(writes).await {
            match result {
                Ok(()) => {
                    debug!(panel = %config.name, identity, "modify applied");
                    any_success = true;
                }
                Err(err) => {
                    warn!(panel = %config.name, identity, error = %err, "modify failed on panel");
                }
            }
        }

        // An accepted extension means the old renewal warning no longer
        // applies; let the reminder fire again near the new expiry.
        let extended = request.add_days > 0 || request.set_days.is_some();
        if any_success && extended {
            self.clear_renewal_reminder(resolved.uuid).await;
        }

        Ok(any_success)
    }

    async fn clear_renewal_reminder(&self, uuid: Option<Uuid>) {
        let Some(uuid) = uuid else { return };
        match self.resolver.uuid_id_by_uuid(uuid).await {
            Ok(Some(uuid_id)) => {
                if let Err(err) = self.store.reset_renewal_reminder_sent(uuid_id).await {
                    warn!(%uuid, error = %err, "failed to clear renewal reminder flag");
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(%uuid, error = %err, "uuid id lookup failed");
            }
        }
    }

    /// Delete the user from every panel it exists on.
    ///
    /// All-success semantics: `Ok(true)` only when every panel deletion
    /// succeeded. The store's UUID record is removed regardless of the
    /// panel outcome.
    pub async fn delete_user(&self, identity: &str) -> Result<bool, PanelError> {
        let resolved = self.resolve(identity).await?;
        let Some(merged) = self.get_user(identity).await? else {
            self.scrub_uuid_record(resolved.uuid).await;
            return Ok(false);
        };

        let mut deletes = Vec::new();
        let mut all_ok = true;
        for (panel_name, slice) in &merged.breakdown {
            let id = if slice.kind.uses_uuid_id() {
                slice.data.uuid.or(merged.uuid).map(UserId::Uuid)
            } else {
                slice.data.username.clone().map(UserId::Username)
            };
            let Some(id) = id else {
                warn!(panel = %panel_name, "no native id for deletion");
                all_ok = false;
                continue;
            };
            let client = match self.registry.get(panel_name).await {
                Ok(client) => client,
                Err(err) => {
                    warn!(panel = %panel_name, error = %err, "no client for deletion");
                    all_ok = false;
                    continue;
                }
            };
            deletes.push(async move { (panel_name, client.delete_user(&id).await) });
        }

        for (panel_name, result) in join_all(deletes).await {
            if let Err(err) = result {
                warn!(panel = %panel_name, identity, error = %err, "delete failed on panel");
                all_ok = false;
            }
        }

        self.scrub_uuid_record(merged.uuid.or(resolved.uuid)).await;
        Ok(all_ok)
    }

    async fn scrub_uuid_record(&self, uuid: Option<Uuid>) {
        let Some(uuid) = uuid else { return };
        if let Err(err) = self.store.delete_user_by_uuid(uuid).await {
            warn!(%uuid, error = %err, "failed to remove stored uuid record");
        }
    }

    /// Create a user on one named panel, or on every active panel.
    ///
    /// A fresh UUID is generated when the request carries none, so the
    /// UUID-keyed panels share one identity. Returns the created record
    /// per panel; an empty list means no panel accepted. The identity
    /// is recorded in the store when the request names a telegram owner.
    pub async fn add_user(
        &self,
        user: &NewUser,
        panel_name: Option<&str>,
    ) -> Result<Vec<(String, NormalizedUser)>, PanelError> {
        let mut request = user.clone();
        let uuid = request.uuid.unwrap_or_else(Uuid::new_v4);
        request.uuid = Some(uuid);

        let clients: Vec<Arc<dyn PanelClient>> = match panel_name {
            Some(name) => vec![self.registry.get(name).await?],
            None => {
                let panels = self
                    .store
                    .active_panels()
                    .await
                    .map_err(|e| PanelError::config(format!("listing active panels: {e}")))?;
                panels
                    .iter()
                    .filter_map(|config| match self.registry.get_for(config) {
                        Ok(client) => Some(client),
                        Err(err) => {
                            warn!(panel = %config.name, error = %err, "skipping panel");
                            None
                        }
                    })
                    .collect()
            }
        };

        let request = &request;
        let creates = clients.iter().map(|client| async move {
            (client.name().to_string(), client.add_user(request).await)
        });

        let mut created = Vec::new();
        for (panel, result) in join_all(creates).await {
            match result {
                Ok(user) => created.push((panel, user)),
                Err(err) => warn!(panel = %panel, error = %err, "create failed on panel"),
            }
        }

        if !created.is_empty()
            && let Some(owner) = request.telegram_id
            && let Err(err) = self.store.add_uuid(owner, uuid, &request.name).await
        {
            warn!(%uuid, error = %err, "failed to record uuid for owner");
        }

        Ok(created)
    }

    /// Zero the recorded usage on every panel the user exists on.
    /// Any-success semantics.
    pub async fn reset_usage(&self, identity: &str) -> Result<bool, PanelError> {
        let resolved = self.resolve(identity).await?;
        let panels = self
            .store
            .active_panels()
            .await
            .map_err(|e| PanelError::config(format!("listing active panels: {e}")))?;

        let mut resets = Vec::new();
        for config in &panels {
            let Some(id) = resolved.id_for(config.kind) else {
                continue;
            };
            let client = match self.registry.get_for(config) {
                Ok(client) => client,
                Err(err) => {
                    warn!(panel = %config.name, error = %err, "skipping panel");
                    continue;
                }
            };
            resets.push(async move { (config, client.reset_usage(&id).await) });
        }

        let mut any_success = false;
        for (config, result) in join_all(resets).await {
            match result {
                Ok(()) => any_success = true,
                Err(err) => {
                    warn!(panel = %config.name, identity, error = %err, "reset failed on panel");
                }
            }
        }
        Ok(any_success)
    }

    /// Ping every active panel concurrently.
    pub async fn panel_status(&self) -> Result<Vec<(String, bool)>, PanelError> {
        let panels = self
            .store
            .active_panels()
            .await
            .map_err(|e| PanelError::config(format!("listing active panels: {e}")))?;

        let pings = panels.iter().filter_map(|config| {
            let client = match self.registry.get_for(config) {
                Ok(client) => client,
                Err(err) => {
                    warn!(panel = %config.name, error = %err, "skipping panel");
                    return None;
                }
            };
            Some(async move { (config.name.clone(), client.ping().await) })
        });
        Ok(join_all(pings).await)
    }
}

impl std::fmt::Debug for CombinedService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedService").finish_non_exhaustive()
    }
}
