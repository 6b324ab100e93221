//! In-memory store implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::types::PanelConfig;

use super::error::StoreError;
use super::traits::Store;

/// One uuid record: a bot user's claim on a logical panel identity.
#[derive(Debug, Clone)]
pub struct UuidRow {
    pub id: i64,
    pub user_id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub renewal_reminder_sent: bool,
    pub categories: Vec<String>,
}

/// In-memory [`Store`] backed by plain vectors.
///
/// Suitable for tests and small single-process deployments. Username
/// lookups match against the record name (the panel-local username the
/// bot registered the uuid under).
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    panels: Vec<PanelConfig>,
    uuids: Vec<UuidRow>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with panel configs.
    pub fn with_panels<I: IntoIterator<Item = PanelConfig>>(panels: I) -> Self {
        let store = Self::new();
        store.inner.write().panels = panels.into_iter().collect();
        store
    }

    /// Add or replace a panel config (matched by name).
    pub fn upsert_panel(&self, config: PanelConfig) {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.panels.iter_mut().find(|p| p.name == config.name) {
            *existing = config;
        } else {
            inner.panels.push(config);
        }
    }

    /// Insert a uuid row directly, returning its row id.
    pub fn insert_uuid_row(
        &self,
        user_id: i64,
        uuid: Uuid,
        name: &str,
        renewal_reminder_sent: bool,
    ) -> i64 {
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.uuids.push(UuidRow {
            id,
            user_id,
            uuid,
            name: name.to_string(),
            renewal_reminder_sent,
            categories: Vec::new(),
        });
        id
    }

    /// Snapshot of all uuid rows (test inspection).
    pub fn uuid_rows(&self) -> Vec<UuidRow> {
        self.inner.read().uuids.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn active_panels(&self) -> Result<Vec<PanelConfig>, StoreError> {
        Ok(self
            .inner
            .read()
            .panels
            .iter()
            .filter(|p| p.active)
            .cloned()
            .collect())
    }

    async fn all_panels(&self) -> Result<Vec<PanelConfig>, StoreError> {
        Ok(self.inner.read().panels.clone())
    }

    async fn panel_by_name(&self, name: &str) -> Result<Option<PanelConfig>, StoreError> {
        Ok(self
            .inner
            .read()
            .panels
            .iter()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn uuid_by_username(&self, username: &str) -> Result<Option<Uuid>, StoreError> {
        Ok(self
            .inner
            .read()
            .uuids
            .iter()
            .find(|r| r.name == username)
            .map(|r| r.uuid))
    }

    async fn username_by_uuid(&self, uuid: Uuid) -> Result<Option<String>, StoreError> {
        Ok(self
            .inner
            .read()
            .uuids
            .iter()
            .find(|r| r.uuid == uuid)
            .map(|r| r.name.clone()))
    }

    async fn uuid_id_by_uuid(&self, uuid: Uuid) -> Result<Option<i64>, StoreError> {
        Ok(self
            .inner
            .read()
            .uuids
            .iter()
            .find(|r| r.uuid == uuid)
            .map(|r| r.id))
    }

    async fn uuid_owner(&self, uuid: Uuid) -> Result<Option<i64>, StoreError> {
        Ok(self
            .inner
            .read()
            .uuids
            .iter()
            .find(|r| r.uuid == uuid)
            .map(|r| r.user_id))
    }

    async fn add_uuid(&self, user_id: i64, uuid: Uuid, name: &str) -> Result<(), StoreError> {
        self.insert_uuid_row(user_id, uuid, name, false);
        Ok(())
    }

    async fn update_uuid_name(
        &self,
        user_id: i64,
        uuid: Uuid,
        new_name: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        match inner
            .uuids
            .iter_mut()
            .find(|r| r.user_id == user_id && r.uuid == uuid)
        {
            Some(row) => {
                row.name = new_name.to_string();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete_uuid(&self, user_id: i64, uuid: Uuid) -> Result<(), StoreError> {
        self.inner
            .write()
            .uuids
            .retain(|r| !(r.user_id == user_id && r.uuid == uuid));
        Ok(())
    }

    async fn delete_user_by_uuid(&self, uuid: Uuid) -> Result<(), StoreError> {
        self.inner.write().uuids.retain(|r| r.uuid != uuid);
        Ok(())
    }

    async fn reset_renewal_reminder_sent(&self, uuid_id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        match inner.uuids.iter_mut().find(|r| r.id == uuid_id) {
            Some(row) => {
                row.renewal_reminder_sent = false;
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn set_uuid_access_categories(
        &self,
        uuid: Uuid,
        tags: &[String],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        match inner.uuids.iter_mut().find(|r| r.uuid == uuid) {
            Some(row) => {
                row.categories = tags.to_vec();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PanelKind;

    fn panel(name: &str, active: bool) -> PanelConfig {
        PanelConfig {
            name: name.to_string(),
            kind: PanelKind::Marzban,
            base_url: format!("https://{name}.example.com"),
            secret1: "admin".to_string(),
            secret2: Some("pass".to_string()),
            proxy_path: None,
            category: None,
            active,
        }
    }

    #[tokio::test]
    async fn active_filter() {
        let store = MemoryStore::with_panels([panel("a", true), panel("b", false)]);
        assert_eq!(store.active_panels().await.unwrap().len(), 1);
        assert_eq!(store.all_panels().await.unwrap().len(), 2);
        assert!(store.panel_by_name("b").await.unwrap().is_some());
        assert!(store.panel_by_name("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn uuid_mapping_roundtrip() {
        let store = MemoryStore::new();
        let u = Uuid::new_v4();
        store.add_uuid(7, u, "alice").await.unwrap();

        assert_eq!(store.uuid_by_username("alice").await.unwrap(), Some(u));
        assert_eq!(
            store.username_by_uuid(u).await.unwrap().as_deref(),
            Some("alice")
        );
        assert_eq!(store.uuid_owner(u).await.unwrap(), Some(7));
        assert!(store.uuid_id_by_uuid(u).await.unwrap().is_some());

        store.delete_user_by_uuid(u).await.unwrap();
        assert_eq!(store.uuid_by_username("alice").await.unwrap(), None);
    }

    #[tokio::test]
    async fn rename_and_owner_scoped_delete() {
        let store = MemoryStore::new();
        let u = Uuid::new_v4();
        store.add_uuid(7, u, "alice").await.unwrap();

        store.update_uuid_name(7, u, "alice-de").await.unwrap();
        assert_eq!(
            store.username_by_uuid(u).await.unwrap().as_deref(),
            Some("alice-de")
        );
        assert!(matches!(
            store.update_uuid_name(8, u, "x").await,
            Err(StoreError::NotFound)
        ));

        // Wrong owner deletes nothing.
        store.delete_uuid(8, u).await.unwrap();
        assert_eq!(store.uuid_rows().len(), 1);
        store.delete_uuid(7, u).await.unwrap();
        assert!(store.uuid_rows().is_empty());
    }

    #[tokio::test]
    async fn reminder_flag_reset() {
        let store = MemoryStore::new();
        let u = Uuid::new_v4();
        let id = store.insert_uuid_row(1, u, "bob", true);

        store.reset_renewal_reminder_sent(id).await.unwrap();
        assert!(!store.uuid_rows()[0].renewal_reminder_sent);

        assert!(matches!(
            store.reset_renewal_reminder_sent(9999).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn categories_replace() {
        let store = MemoryStore::new();
        let u = Uuid::new_v4();
        store.add_uuid(1, u, "carol").await.unwrap();

        store
            .set_uuid_access_categories(u, &["de".to_string(), "nl".to_string()])
            .await
            .unwrap();
        assert_eq!(store.uuid_rows()[0].categories, vec!["de", "nl"]);
    }
}
