//! Memoized panel-name → client map.
//!
//! One live client per configured panel for the process lifetime, so
//! connection pools are shared across every component. Resolution is
//! safe under concurrent first-touch: both racers build, the first
//! insert wins, the loser's client is dropped and its pool released.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use fleet_core::{PanelConfig, PanelKind, Store};

use crate::error::PanelError;
use crate::hiddify::HiddifyClient;
use crate::marzban::MarzbanClient;
use crate::remnawave::RemnawaveClient;
use crate::traits::PanelClient;

/// Instantiate the client variant for a panel config.
pub fn build_client(config: &PanelConfig) -> Result<Arc<dyn PanelClient>, PanelError> {
    let client: Arc<dyn PanelClient> = match config.kind {
        PanelKind::Hiddify => Arc::new(HiddifyClient::new(config)?),
        PanelKind::Marzban | PanelKind::Marzneshin => Arc::new(MarzbanClient::new(config)?),
        PanelKind::Remnawave => Arc::new(RemnawaveClient::new(config)?),
    };
    Ok(client)
}

/// Process-wide registry of live panel clients.
pub struct PanelRegistry {
    store: Arc<dyn Store>,
    clients: RwLock<HashMap<String, Arc<dyn PanelClient>>>,
}

impl PanelRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a panel name to a live client, building and caching it on
    /// first touch. Unknown names are a config error — the one error
    /// that reaches callers.
    pub async fn get(&self, name: &str) -> Result<Arc<dyn PanelClient>, PanelError> {
        if let Some(client) = self.clients.read().get(name) {
            return Ok(client.clone());
        }
        let config = self
            .store
            .panel_by_name(name)
            .await
            .map_err(|e| PanelError::config(format!("panel lookup failed: {e}")))?
            .ok_or_else(|| PanelError::config(format!("unknown panel: {name}")))?;
        self.get_for(&config)
    }

    /// Resolve a client for an already-loaded config (the aggregator
    /// holds the config list and skips the name lookup).
    pub fn get_for(&self, config: &PanelConfig) -> Result<Arc<dyn PanelClient>, PanelError> {
        if let Some(client) = self.clients.read().get(&config.name) {
            return Ok(client.clone());
        }
        let client = build_client(config)?;
        debug!(panel = %config.name, kind = %config.kind, "built panel client");
        let mut clients = self.clients.write();
        Ok(clients
            .entry(config.name.clone())
            .or_insert(client)
            .clone())
    }

    /// Pre-seed a client under a name, replacing any cached one.
    pub fn insert(&self, name: impl Into<String>, client: Arc<dyn PanelClient>) {
        self.clients.write().insert(name.into(), client);
    }

    /// Drop the cached client for one panel (e.g. after a config edit).
    pub fn invalidate(&self, name: &str) {
        self.clients.write().remove(name);
    }

    /// Drop every cached client.
    pub fn clear(&self) {
        self.clients.write().clear();
    }
}

impl std::fmt::Debug for PanelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelRegistry")
            .field("cached", &self.clients.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::MemoryStore;

    fn config(name: &str, kind: PanelKind) -> PanelConfig {
        PanelConfig {
            name: name.to_string(),
            kind,
            base_url: "https://panel.example.com".to_string(),
            secret1: "secret".to_string(),
            secret2: Some("password".to_string()),
            proxy_path: None,
            category: None,
            active: true,
        }
    }

    #[tokio::test]
    async fn unknown_panel_is_config_error() {
        let registry = PanelRegistry::new(Arc::new(MemoryStore::new()));
        let err = registry.get("nope").await.err().unwrap();
        assert!(matches!(err, PanelError::Config(_)));
    }

    #[tokio::test]
    async fn caches_by_name() {
        let store = Arc::new(MemoryStore::with_panels([config(
            "de-1",
            PanelKind::Hiddify,
        )]));
        let registry = PanelRegistry::new(store);

        let a = registry.get("de-1").await.unwrap();
        let b = registry.get("de-1").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        registry.invalidate("de-1");
        let c = registry.get("de-1").await.unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn marzban_without_password_is_config_error() {
        let mut cfg = config("ir-1", PanelKind::Marzban);
        cfg.secret2 = None;
        assert!(matches!(
            build_client(&cfg),
            Err(PanelError::Config(_))
        ));
    }

    #[tokio::test]
    async fn builds_every_kind() {
        for kind in [
            PanelKind::Hiddify,
            PanelKind::Marzban,
            PanelKind::Remnawave,
            PanelKind::Marzneshin,
        ] {
            let client = build_client(&config("p", kind)).unwrap();
            assert_eq!(client.kind(), kind);
        }
    }
}
