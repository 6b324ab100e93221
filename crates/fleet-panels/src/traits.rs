//! Panel client trait and operation parameter types.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use fleet_core::{NormalizedUser, PanelKind};

use crate::error::PanelError;

/// The id form a panel understands natively: UUID for hiddify and
/// remnawave, username for marzban and marzneshin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserId {
    Uuid(Uuid),
    Username(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Username(name) => f.write_str(name),
        }
    }
}

impl From<Uuid> for UserId {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

/// Parameters for creating a user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    /// Quota in GB; 0 = unlimited.
    pub limit_gb: f64,
    /// Validity in days; 0 or negative = no expiry.
    pub days: i64,
    /// Shared identity to create under; panels that key by UUID use it
    /// as the user id.
    pub uuid: Option<Uuid>,
    pub telegram_id: Option<i64>,
    /// Internal squad to attach the user to (remnawave).
    pub squad: Option<String>,
}

/// A modification to apply to an existing user.
///
/// Deltas may be negative; `set_` fields win over the matching delta.
/// An all-empty change is a no-op that succeeds without touching the
/// panel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UserChange {
    pub add_gb: f64,
    pub add_days: i64,
    pub set_limit_gb: Option<f64>,
    /// Absolute expiry as epoch seconds.
    pub set_expire: Option<i64>,
}

impl UserChange {
    /// True when the change reconciles to nothing to send.
    pub fn is_empty(&self) -> bool {
        self.add_gb == 0.0
            && self.add_days == 0
            && self.set_limit_gb.is_none()
            && self.set_expire.is_none()
    }

    /// Whether the quota is touched at all.
    pub(crate) fn touches_limit(&self) -> bool {
        self.set_limit_gb.is_some() || self.add_gb != 0.0
    }

    /// Whether the expiry is touched at all.
    pub(crate) fn touches_expire(&self) -> bool {
        self.set_expire.is_some() || self.add_days != 0
    }
}

/// One remote panel, normalized to the common contract.
///
/// Implementations own a long-lived HTTP connection pool bound to one
/// panel config and must be thread-safe: the aggregator fans out to all
/// panels concurrently.
#[async_trait]
pub trait PanelClient: Send + Sync {
    fn kind(&self) -> PanelKind;

    /// The panel's unique config name.
    fn name(&self) -> &str;

    /// Create a user. Returns the panel's normalized view of it.
    async fn add_user(&self, user: &NewUser) -> Result<NormalizedUser, PanelError>;

    /// Fetch one user. `Ok(None)` when the panel does not know the id.
    async fn get_user(&self, id: &UserId) -> Result<Option<NormalizedUser>, PanelError>;

    /// Fetch every user on the panel.
    async fn get_all_users(&self) -> Result<Vec<NormalizedUser>, PanelError>;

    /// Apply a change. Add-mode deltas read the current values first —
    /// the remote APIs have no increment verb.
    async fn modify_user(&self, id: &UserId, change: &UserChange) -> Result<(), PanelError>;

    /// Delete a user. Succeeds only on a 204 from the panel.
    async fn delete_user(&self, id: &UserId) -> Result<(), PanelError>;

    /// Zero the user's recorded usage.
    async fn reset_usage(&self, id: &UserId) -> Result<(), PanelError>;

    /// Panel-level statistics, shape left to the panel.
    async fn stats(&self) -> Result<serde_json::Value, PanelError>;

    /// Liveness: stats returned a non-empty mapping.
    async fn ping(&self) -> bool {
        match self.stats().await {
            Ok(value) => value.as_object().is_some_and(|m| !m.is_empty()),
            Err(_) => false,
        }
    }
}

/// Blanket implementation for `Arc<C>` where `C: PanelClient`.
#[async_trait]
impl<C: PanelClient + ?Sized> PanelClient for Arc<C> {
    fn kind(&self) -> PanelKind {
        (**self).kind()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn add_user(&self, user: &NewUser) -> Result<NormalizedUser, PanelError> {
        (**self).add_user(user).await
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<NormalizedUser>, PanelError> {
        (**self).get_user(id).await
    }

    async fn get_all_users(&self) -> Result<Vec<NormalizedUser>, PanelError> {
        (**self).get_all_users().await
    }

    async fn modify_user(&self, id: &UserId, change: &UserChange) -> Result<(), PanelError> {
        (**self).modify_user(id, change).await
    }

    async fn delete_user(&self, id: &UserId) -> Result<(), PanelError> {
        (**self).delete_user(id).await
    }

    async fn reset_usage(&self, id: &UserId) -> Result<(), PanelError> {
        (**self).reset_usage(id).await
    }

    async fn stats(&self) -> Result<serde_json::Value, PanelError> {
        (**self).stats().await
    }

    async fn ping(&self) -> bool {
        (**self).ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_change_is_noop() {
        assert!(UserChange::default().is_empty());
        assert!(!UserChange {
            add_gb: 1.0,
            ..UserChange::default()
        }
        .is_empty());
        assert!(!UserChange {
            set_expire: Some(0),
            ..UserChange::default()
        }
        .is_empty());
    }
}
