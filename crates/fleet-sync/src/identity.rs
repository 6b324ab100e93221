//! Identity resolution between uuid and panel-local username forms.

use std::sync::Arc;

use uuid::Uuid;

use fleet_core::{Identity, PanelKind, Store, StoreError};
use fleet_panels::UserId;

/// Both identity forms for one logical user, as far as the store knows
/// them.
#[derive(Debug, Clone, Default)]
pub struct ResolvedIdentity {
    pub uuid: Option<Uuid>,
    pub username: Option<String>,
}

impl ResolvedIdentity {
    /// The id form a panel of this kind accepts, if we know it.
    pub fn id_for(&self, kind: PanelKind) -> Option<UserId> {
        if kind.uses_uuid_id() {
            self.uuid.map(UserId::Uuid)
        } else {
            self.username.clone().map(UserId::Username)
        }
    }
}

/// Thin adapter over the store. No caching — the store is the source of
/// truth.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn Store>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Map an arbitrary identity string (uuid, synthetic key, or bare
    /// username) to both forms.
    pub async fn resolve(&self, input: &str) -> Result<ResolvedIdentity, StoreError> {
        match Identity::parse(input.trim()) {
            Identity::Uuid(uuid) => {
                let username = self.store.username_by_uuid(uuid).await?;
                Ok(ResolvedIdentity {
                    uuid: Some(uuid),
                    username,
                })
            }
            Identity::PanelLocal(username) => {
                let uuid = self.store.uuid_by_username(&username).await?;
                Ok(ResolvedIdentity {
                    uuid,
                    username: Some(username),
                })
            }
        }
    }

    pub async fn uuid_by_username(&self, username: &str) -> Result<Option<Uuid>, StoreError> {
        self.store.uuid_by_username(username).await
    }

    pub async fn username_by_uuid(&self, uuid: Uuid) -> Result<Option<String>, StoreError> {
        self.store.username_by_uuid(uuid).await
    }

    pub async fn uuid_id_by_uuid(&self, uuid: Uuid) -> Result<Option<i64>, StoreError> {
        self.store.uuid_id_by_uuid(uuid).await
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::MemoryStore;

    #[tokio::test]
    async fn resolves_both_forms() {
        let store = Arc::new(MemoryStore::new());
        let uuid = Uuid::new_v4();
        store.add_uuid(1, uuid, "alice").await.unwrap();
        let resolver = IdentityResolver::new(store);

        let by_uuid = resolver.resolve(&uuid.to_string()).await.unwrap();
        assert_eq!(by_uuid.uuid, Some(uuid));
        assert_eq!(by_uuid.username.as_deref(), Some("alice"));

        let by_name = resolver.resolve("alice").await.unwrap();
        assert_eq!(by_name.uuid, Some(uuid));

        let by_synthetic = resolver.resolve("marzban_alice").await.unwrap();
        assert_eq!(by_synthetic.uuid, Some(uuid));
        assert_eq!(by_synthetic.username.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn unknown_identity_keeps_known_half() {
        let resolver = IdentityResolver::new(Arc::new(MemoryStore::new()));

        let uuid = Uuid::new_v4();
        let r = resolver.resolve(&uuid.to_string()).await.unwrap();
        assert_eq!(r.uuid, Some(uuid));
        assert_eq!(r.username, None);
        assert!(r.id_for(PanelKind::Hiddify).is_some());
        assert!(r.id_for(PanelKind::Marzban).is_none());

        let r = resolver.resolve("bob").await.unwrap();
        assert_eq!(r.uuid, None);
        assert_eq!(r.username.as_deref(), Some("bob"));
        assert!(r.id_for(PanelKind::Remnawave).is_none());
        assert!(r.id_for(PanelKind::Marzneshin).is_some());
    }
}
