//! Hiddify panel client.
//!
//! Auth is a static API key in a custom header. Quotas are reported in
//! GB directly; validity is a `package_days` counter rather than an
//! expiry timestamp. Writes always send `package_days` — a synthesized
//! expiry is for merge/reporting only, never written back.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map, Value, json};
use tracing::debug;
use uuid::Uuid;

use fleet_core::expiry::{SECS_PER_DAY, now_unix, parse_expire};
use fleet_core::{NormalizedUser, PanelConfig, PanelKind};

use crate::error::PanelError;
use crate::http::{build_http_client, decode_response, expect_no_content, normalize_base};
use crate::traits::{NewUser, PanelClient, UserChange, UserId};
use crate::wire::{is_active_record, non_empty_str, user_array};

const ADMIN_PREFIX: &str = "api/v2/admin";

/// Client for one hiddify panel.
#[derive(Debug)]
pub struct HiddifyClient {
    name: String,
    http: reqwest::Client,
    /// Base + optional proxy path + admin prefix, no trailing slash.
    admin_base: String,
    api_key: String,
}

impl HiddifyClient {
    pub fn new(config: &PanelConfig) -> Result<Self, PanelError> {
        let mut base = normalize_base(&config.base_url, "https");
        if let Some(proxy) = config.proxy_path.as_deref() {
            let proxy = proxy.trim_matches('/');
            if !proxy.is_empty() {
                base = format!("{base}/{proxy}");
            }
        }
        Ok(Self {
            name: config.name.clone(),
            http: build_http_client()?,
            admin_base: format!("{base}/{ADMIN_PREFIX}"),
            api_key: config.secret1.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.admin_base)
    }

    async fn send_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, PanelError> {
        let mut req = self
            .http
            .request(method, self.url(path))
            .header("Hiddify-API-Key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            req = req.json(body);
        }
        Ok(req.send().await?)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, PanelError> {
        let resp = self.send_raw(method, path, body).await?;
        decode_response(resp).await
    }

    fn normalize(&self, raw: Value) -> NormalizedUser {
        let limit_gb = raw
            .get("usage_limit_GB")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let usage_gb = raw
            .get("current_usage_GB")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let uuid = raw
            .get("uuid")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok());

        // Prefer a real expiry timestamp; otherwise synthesize one from
        // the remaining-days counter (display/merge only).
        let expire = raw
            .get("expiry_time")
            .and_then(parse_expire)
            .or_else(|| match raw.get("package_days").and_then(Value::as_i64) {
                Some(days) if days > 0 => Some(now_unix() + days * SECS_PER_DAY),
                _ => None,
            });

        NormalizedUser {
            uuid,
            username: None,
            name: non_empty_str(&raw, "name"),
            limit_gb,
            usage_gb,
            expire,
            active: is_active_record(&raw),
            raw,
        }
    }

    fn require_uuid(&self, id: &UserId) -> Result<Uuid, PanelError> {
        match id {
            UserId::Uuid(u) => Ok(*u),
            UserId::Username(name) => Err(PanelError::config(format!(
                "hiddify panel {} needs a uuid id, got username {name}",
                self.name
            ))),
        }
    }
}

#[async_trait]
impl PanelClient for HiddifyClient {
    fn kind(&self) -> PanelKind {
        PanelKind::Hiddify
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn add_user(&self, user: &NewUser) -> Result<NormalizedUser, PanelError> {
        let mut payload = Map::new();
        payload.insert("name".to_string(), json!(user.name));
        payload.insert("usage_limit_GB".to_string(), json!(user.limit_gb.max(0.0)));
        payload.insert("package_days".to_string(), json!(user.days.max(0)));
        payload.insert("mode".to_string(), json!("no_reset"));
        if let Some(u) = user.uuid {
            payload.insert("uuid".to_string(), json!(u.to_string()));
        }
        if let Some(tg) = user.telegram_id {
            payload.insert("telegram_id".to_string(), json!(tg));
        }

        let value = self
            .send(Method::POST, "user/", Some(&Value::Object(payload)))
            .await?
            .ok_or_else(|| PanelError::decode("empty create response"))?;
        Ok(self.normalize(value))
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<NormalizedUser>, PanelError> {
        let uuid = self.require_uuid(id)?;
        match self.send(Method::GET, &format!("user/{uuid}/"), None).await {
            Ok(Some(value)) => Ok(Some(self.normalize(value))),
            Ok(None) => Ok(None),
            Err(PanelError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn get_all_users(&self) -> Result<Vec<NormalizedUser>, PanelError> {
        let value = self
            .send(Method::GET, "user/", None)
            .await?
            .unwrap_or(Value::Array(Vec::new()));
        Ok(user_array(value)
            .into_iter()
            .map(|raw| self.normalize(raw))
            .collect())
    }

    async fn modify_user(&self, id: &UserId, change: &UserChange) -> Result<(), PanelError> {
        if change.is_empty() {
            return Ok(());
        }
        let uuid = self.require_uuid(id)?;

        // Deltas need the current values; pure set-mode changes do not.
        let needs_current = (change.touches_limit() && change.set_limit_gb.is_none())
            || (change.touches_expire() && change.set_expire.is_none());
        let current = if needs_current {
            Some(self.get_user(id).await?.ok_or(PanelError::NotFound)?)
        } else {
            None
        };

        let mut payload = Map::new();
        if change.touches_limit() {
            let limit = change
                .set_limit_gb
                .unwrap_or_else(|| {
                    current.as_ref().map(|u| u.limit_gb).unwrap_or(0.0) + change.add_gb
                })
                .max(0.0);
            payload.insert("usage_limit_GB".to_string(), json!(limit));
        }
        if change.touches_expire() {
            let now = now_unix();
            let days = match change.set_expire {
                // Absolute expiry, converted to a remaining-days counter.
                Some(ts) => (ts - now + SECS_PER_DAY - 1).div_euclid(SECS_PER_DAY),
                None => {
                    let current_days = current
                        .as_ref()
                        .and_then(|u| u.raw.get("package_days"))
                        .and_then(Value::as_i64)
                        .unwrap_or(0);
                    current_days + change.add_days
                }
            };
            payload.insert("package_days".to_string(), json!(days.max(0)));
        }

        if payload.is_empty() {
            return Ok(());
        }
        debug!(panel = %self.name, user = %uuid, "patching user");
        self.send(
            Method::PATCH,
            &format!("user/{uuid}/"),
            Some(&Value::Object(payload)),
        )
        .await?;
        Ok(())
    }

    async fn delete_user(&self, id: &UserId) -> Result<(), PanelError> {
        let uuid = self.require_uuid(id)?;
        let resp = self
            .send_raw(Method::DELETE, &format!("user/{uuid}/"), None)
            .await?;
        expect_no_content(resp).await
    }

    async fn reset_usage(&self, id: &UserId) -> Result<(), PanelError> {
        let uuid = self.require_uuid(id)?;
        self.send(
            Method::PATCH,
            &format!("user/{uuid}/"),
            Some(&json!({"current_usage_GB": 0})),
        )
        .await?;
        Ok(())
    }

    async fn stats(&self) -> Result<Value, PanelError> {
        Ok(self
            .send(Method::GET, "server_status/", None)
            .await?
            .unwrap_or_else(|| json!({})))
    }
}
