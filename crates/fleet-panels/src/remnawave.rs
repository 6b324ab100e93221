//! Remnawave panel client.
//!
//! Static bearer token, camelCase byte-denominated fields, and a
//! `{ "response": … }` envelope around every payload. Expiry is written
//! as ISO-8601 with microseconds and a trailing `Z`.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map, Value, json};
use tracing::debug;
use uuid::Uuid;

use fleet_core::expiry::{SECS_PER_DAY, extension_base, format_iso_micros, now_unix, parse_expire};
use fleet_core::units::{bytes_to_gb, gb_to_bytes};
use fleet_core::{NormalizedUser, PanelConfig, PanelKind};

use crate::error::PanelError;
use crate::http::{build_http_client, decode_response, expect_no_content, normalize_base};
use crate::traits::{NewUser, PanelClient, UserChange, UserId};
use crate::wire::{int_field, is_active_record, non_empty_str, unwrap_envelope, user_array};

/// Client for one remnawave panel.
#[derive(Debug)]
pub struct RemnawaveClient {
    name: String,
    http: reqwest::Client,
    base: String,
    token: String,
}

impl RemnawaveClient {
    pub fn new(config: &PanelConfig) -> Result<Self, PanelError> {
        Ok(Self {
            name: config.name.clone(),
            http: build_http_client()?,
            base: normalize_base(&config.base_url, "https"),
            token: config.secret1.clone(),
        })
    }

    async fn send_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, PanelError> {
        let mut req = self
            .http
            .request(method, format!("{}{path}", self.base))
            .bearer_auth(&self.token);
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
        Ok(decode_response(resp).await?.map(unwrap_envelope))
    }

    fn normalize(&self, raw: Value) -> NormalizedUser {
        let used_bytes = raw
            .get("userTraffic")
            .and_then(|t| t.get("usedTrafficBytes"))
            .and_then(Value::as_i64)
            .unwrap_or_else(|| {
                let v = int_field(&raw, "trafficUsed");
                if v != 0 {
                    v
                } else {
                    int_field(&raw, "usedTrafficBytes")
                }
            });

        NormalizedUser {
            uuid: raw
                .get("uuid")
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok()),
            username: non_empty_str(&raw, "username"),
            name: None,
            limit_gb: bytes_to_gb(int_field(&raw, "trafficLimitBytes")),
            usage_gb: bytes_to_gb(used_bytes),
            expire: raw.get("expireAt").and_then(parse_expire),
            active: is_active_record(&raw),
            raw,
        }
    }

    fn require_uuid(&self, id: &UserId) -> Result<Uuid, PanelError> {
        match id {
            UserId::Uuid(u) => Ok(*u),
            UserId::Username(name) => Err(PanelError::config(format!(
                "remnawave panel {} needs a uuid id, got username {name}",
                self.name
            ))),
        }
    }
}

#[async_trait]
impl PanelClient for RemnawaveClient {
    fn kind(&self) -> PanelKind {
        PanelKind::Remnawave
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn add_user(&self, user: &NewUser) -> Result<NormalizedUser, PanelError> {
        let mut payload = Map::new();
        payload.insert("username".to_string(), json!(user.name));
        payload.insert(
            "trafficLimitBytes".to_string(),
            json!(gb_to_bytes(user.limit_gb)),
        );
        payload.insert("trafficLimitStrategy".to_string(), json!("NO_RESET"));
        if user.days > 0 {
            payload.insert(
                "expireAt".to_string(),
                json!(format_iso_micros(now_unix() + user.days * SECS_PER_DAY)),
            );
        }
        if let Some(u) = user.uuid {
            payload.insert("uuid".to_string(), json!(u.to_string()));
        }
        if let Some(tg) = user.telegram_id {
            payload.insert("telegramId".to_string(), json!(tg));
        }
        if let Some(squad) = user.squad.as_deref() {
            payload.insert("activeInternalSquads".to_string(), json!([squad]));
        }

        let value = self
            .send(Method::POST, "/api/users", Some(&Value::Object(payload)))
            .await?
            .ok_or_else(|| PanelError::decode("empty create response"))?;
        Ok(self.normalize(value))
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<NormalizedUser>, PanelError> {
        let uuid = self.require_uuid(id)?;
        match self
            .send(Method::GET, &format!("/api/users/{uuid}"), None)
            .await
        {
            Ok(Some(value)) => Ok(Some(self.normalize(value))),
            Ok(None) => Ok(None),
            Err(PanelError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn get_all_users(&self) -> Result<Vec<NormalizedUser>, PanelError> {
        let value = self
            .send(Method::GET, "/api/users", None)
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

        let needs_current = (change.touches_limit() && change.set_limit_gb.is_none())
            || (change.touches_expire() && change.set_expire.is_none());
        let current = if needs_current {
            Some(self.get_user(id).await?.ok_or(PanelError::NotFound)?)
        } else {
            None
        };

        let mut payload = Map::new();
        payload.insert("uuid".to_string(), json!(uuid.to_string()));
        if change.touches_limit() {
            let limit_gb = change.set_limit_gb.unwrap_or_else(|| {
                current.as_ref().map(|u| u.limit_gb).unwrap_or(0.0) + change.add_gb
            });
            payload.insert(
                "trafficLimitBytes".to_string(),
                json!(gb_to_bytes(limit_gb)),
            );
        }
        if change.touches_expire() {
            let expire = match change.set_expire {
                Some(ts) => ts,
                None => {
                    let stored = current.as_ref().and_then(|u| u.expire);
                    extension_base(stored, now_unix()) + change.add_days * SECS_PER_DAY
                }
            };
            payload.insert(
                "expireAt".to_string(),
                json!(format_iso_micros(expire.max(0))),
            );
        }

        // Only the id key reconciled — nothing to send.
        if payload.len() == 1 {
            return Ok(());
        }
        debug!(panel = %self.name, user = %uuid, "patching user");
        self.send(Method::PATCH, "/api/users", Some(&Value::Object(payload)))
            .await?;
        Ok(())
    }

    async fn delete_user(&self, id: &UserId) -> Result<(), PanelError> {
        let uuid = self.require_uuid(id)?;
        let resp = self
            .send_raw(Method::DELETE, &format!("/api/users/{uuid}"), None)
            .await?;
        expect_no_content(resp).await
    }

    async fn reset_usage(&self, id: &UserId) -> Result<(), PanelError> {
        let uuid = self.require_uuid(id)?;
        self.send(
            Method::PATCH,
            "/api/users",
            Some(&json!({"uuid": uuid.to_string(), "trafficUsed": 0})),
        )
        .await?;
        Ok(())
    }

    async fn stats(&self) -> Result<Value, PanelError> {
        Ok(self
            .send(Method::GET, "/api/system/stats", None)
            .await?
            .unwrap_or_else(|| json!({})))
    }
}
