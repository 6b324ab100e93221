//! Store trait — the query/write surface the fleet consumes.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::types::PanelConfig;

use super::error::StoreError;

/// Data-access layer over the bot-owned relational store.
///
/// Implementations must be thread-safe (`Send + Sync`) as they are
/// called concurrently from the aggregator's fan-out. The store is the
/// source of truth for panel configs and uuid↔username mappings; no
/// caching happens at this layer.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Panels ──────────────────────────────────────────────────

    /// All panels with `active = true`.
    async fn active_panels(&self) -> Result<Vec<PanelConfig>, StoreError>;

    /// Every configured panel, active or not.
    async fn all_panels(&self) -> Result<Vec<PanelConfig>, StoreError>;

    /// Look up one panel by its unique name.
    async fn panel_by_name(&self, name: &str) -> Result<Option<PanelConfig>, StoreError>;

    // ── Identity mappings ───────────────────────────────────────

    /// UUID mapped to a panel-local username, if known.
    async fn uuid_by_username(&self, username: &str) -> Result<Option<Uuid>, StoreError>;

    /// Username mapped to a UUID, if known.
    async fn username_by_uuid(&self, uuid: Uuid) -> Result<Option<String>, StoreError>;

    /// Row id of the uuid record.
    async fn uuid_id_by_uuid(&self, uuid: Uuid) -> Result<Option<i64>, StoreError>;

    /// Bot user id owning the uuid record.
    async fn uuid_owner(&self, uuid: Uuid) -> Result<Option<i64>, StoreError>;

    // ── Writes ──────────────────────────────────────────────────

    /// Record a uuid for a bot user.
    async fn add_uuid(&self, user_id: i64, uuid: Uuid, name: &str) -> Result<(), StoreError>;

    /// Rename a uuid record.
    async fn update_uuid_name(
        &self,
        user_id: i64,
        uuid: Uuid,
        new_name: &str,
    ) -> Result<(), StoreError>;

    /// Remove one uuid record owned by a bot user.
    async fn delete_uuid(&self, user_id: i64, uuid: Uuid) -> Result<(), StoreError>;

    /// Remove a uuid record regardless of owner.
    async fn delete_user_by_uuid(&self, uuid: Uuid) -> Result<(), StoreError>;

    /// Clear the "renewal reminder sent" flag so the user can be warned
    /// again after an extension.
    async fn reset_renewal_reminder_sent(&self, uuid_id: i64) -> Result<(), StoreError>;

    /// Replace the access-category tags of a uuid record (optional
    /// capability; stores without categories may treat this as a no-op).
    async fn set_uuid_access_categories(
        &self,
        uuid: Uuid,
        tags: &[String],
    ) -> Result<(), StoreError>;
}

/// Blanket implementation for `Arc<S>` where `S: Store`.
#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn active_panels(&self) -> Result<Vec<PanelConfig>, StoreError> {
        (**self).active_panels().await
    }

    async fn all_panels(&self) -> Result<Vec<PanelConfig>, StoreError> {
        (**self).all_panels().await
    }

    async fn panel_by_name(&self, name: &str) -> Result<Option<PanelConfig>, StoreError> {
        (**self).panel_by_name(name).await
    }

    async fn uuid_by_username(&self, username: &str) -> Result<Option<Uuid>, StoreError> {
        (**self).uuid_by_username(username).await
    }

    async fn username_by_uuid(&self, uuid: Uuid) -> Result<Option<String>, StoreError> {
        (**self).username_by_uuid(uuid).await
    }

    async fn uuid_id_by_uuid(&self, uuid: Uuid) -> Result<Option<i64>, StoreError> {
        (**self).uuid_id_by_uuid(uuid).await
    }

    async fn uuid_owner(&self, uuid: Uuid) -> Result<Option<i64>, StoreError> {
        (**self).uuid_owner(uuid).await
    }

    async fn add_uuid(&self, user_id: i64, uuid: Uuid, name: &str) -> Result<(), StoreError> {
        (**self).add_uuid(user_id, uuid, name).await
    }

    async fn update_uuid_name(
        &self,
        user_id: i64,
        uuid: Uuid,
        new_name: &str,
    ) -> Result<(), StoreError> {
        (**self).update_uuid_name(user_id, uuid, new_name).await
    }

    async fn delete_uuid(&self, user_id: i64, uuid: Uuid) -> Result<(), StoreError> {
        (**self).delete_uuid(user_id, uuid).await
    }

    async fn delete_user_by_uuid(&self, uuid: Uuid) -> Result<(), StoreError> {
        (**self).delete_user_by_uuid(uuid).await
    }

    async fn reset_renewal_reminder_sent(&self, uuid_id: i64) -> Result<(), StoreError> {
        (**self).reset_renewal_reminder_sent(uuid_id).await
    }

    async fn set_uuid_access_categories(
        &self,
        uuid: Uuid,
        tags: &[String],
    ) -> Result<(), StoreError> {
        (**self).set_uuid_access_categories(uuid, tags).await
    }
}
