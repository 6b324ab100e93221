//! Marzban-family panel client.
//!
//! Covers both marzban and marzneshin panels: same admin-login auth,
//! same byte-denominated user shape, username as the primary id. Auth is
//! a bearer token obtained from `POST /api/admin/token`; any 401 triggers
//! exactly one refresh-and-retry.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Method, StatusCode};
use serde_json::{Map, Value, json};
use tracing::debug;

use fleet_core::expiry::{SECS_PER_DAY, extension_base, now_unix, parse_expire};
use fleet_core::units::{bytes_to_gb, gb_to_bytes};
use fleet_core::{NormalizedUser, PanelConfig, PanelKind};

use crate::error::PanelError;
use crate::http::{build_http_client, decode_response, expect_no_content, normalize_base};
use crate::traits::{NewUser, PanelClient, UserChange, UserId};
use crate::wire::{int_field, is_active_record, non_empty_str, user_array};

/// Client for one marzban or marzneshin panel.
pub struct MarzbanClient {
    name: String,
    kind: PanelKind,
    http: reqwest::Client,
    base: String,
    admin_username: String,
    admin_password: String,
    /// Current bearer token. Guard is never held across an await; a
    /// racing double-refresh costs an extra login request, nothing more.
    token: RwLock<Option<String>>,
}

impl MarzbanClient {
    pub fn new(config: &PanelConfig) -> Result<Self, PanelError> {
        let admin_password = config.secret2.clone().ok_or_else(|| {
            PanelError::config(format!(
                "panel {}: {} kind needs secret2 (admin password)",
                config.name, config.kind
            ))
        })?;
        Ok(Self {
            name: config.name.clone(),
            kind: config.kind,
            http: build_http_client()?,
            base: normalize_base(&config.base_url, "https"),
            admin_username: config.secret1.clone(),
            admin_password,
            token: RwLock::new(None),
        })
    }

    /// Obtain a fresh bearer token from the admin login endpoint.
    async fn login(&self) -> Result<String, PanelError> {
        let resp = self
            .http
            .post(format!("{}/api/admin/token", self.base))
            .form(&[
                ("username", self.admin_username.as_str()),
                ("password", self.admin_password.as_str()),
            ])
            .send()
            .await?;
        let value = decode_response(resp)
            .await?
            .ok_or_else(|| PanelError::decode("empty token response"))?;
        let token = value
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| PanelError::decode("token response missing access_token"))?
            .to_string();
        *self.token.write() = Some(token.clone());
        debug!(panel = %self.name, "obtained bearer token");
        Ok(token)
    }

    async fn bearer(&self) -> Result<String, PanelError> {
        let cached = self.token.read().clone();
        match cached {
            Some(token) => Ok(token),
            None => self.login().await,
        }
    }

    fn request(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        token: &str,
    ) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .request(method.clone(), format!("{}{path}", self.base))
            .bearer_auth(token);
        if let Some(body) = body {
            req = req.json(body);
        }
        req
    }

    /// Send a request, refreshing the token and retrying exactly once
    /// on 401.
    async fn send_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, PanelError> {
        let token = self.bearer().await?;
        let resp = self.request(&method, path, body, &token).send().await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }
        debug!(panel = %self.name, "401 from panel, refreshing token and retrying once");
        let token = self.login().await?;
        Ok(self.request(&method, path, body, &token).send().await?)
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
        NormalizedUser {
            uuid: None,
            username: non_empty_str(&raw, "username"),
            name: None,
            limit_gb: bytes_to_gb(int_field(&raw, "data_limit")),
            usage_gb: bytes_to_gb(int_field(&raw, "used_traffic")),
            expire: raw.get("expire").and_then(parse_expire),
            active: is_active_record(&raw),
            raw,
        }
    }

    fn require_username<'a>(&self, id: &'a UserId) -> Result<&'a str, PanelError> {
        match id {
            UserId::Username(name) => Ok(name),
            UserId::Uuid(u) => Err(PanelError::config(format!(
                "{} panel {} needs a username id, got uuid {u}",
                self.kind, self.name
            ))),
        }
    }
}

#[async_trait]
impl PanelClient for MarzbanClient {
    fn kind(&self) -> PanelKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn add_user(&self, user: &NewUser) -> Result<NormalizedUser, PanelError> {
        let expire = if user.days > 0 {
            now_unix() + user.days * SECS_PER_DAY
        } else {
            0
        };
        let mut payload = Map::new();
        payload.insert("username".to_string(), json!(user.name));
        payload.insert(
            "proxies".to_string(),
            json!({"vless": {}, "vmess": {}, "trojan": {}, "shadowsocks": {}}),
        );
        payload.insert("data_limit".to_string(), json!(gb_to_bytes(user.limit_gb)));
        payload.insert("expire".to_string(), json!(expire));
        payload.insert("status".to_string(), json!("active"));
        if let Some(tg) = user.telegram_id {
            payload.insert("note".to_string(), json!(tg.to_string()));
        }

        let value = self
            .send(Method::POST, "/api/user", Some(&Value::Object(payload)))
            .await?
            .ok_or_else(|| PanelError::decode("empty create response"))?;
        Ok(self.normalize(value))
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<NormalizedUser>, PanelError> {
        let username = self.require_username(id)?;
        match self
            .send(Method::GET, &format!("/api/user/{username}"), None)
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
        let username = self.require_username(id)?;

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
            let limit_gb = change.set_limit_gb.unwrap_or_else(|| {
                current.as_ref().map(|u| u.limit_gb).unwrap_or(0.0) + change.add_gb
            });
            payload.insert("data_limit".to_string(), json!(gb_to_bytes(limit_gb)));
        }
        if change.touches_expire() {
            let expire = match change.set_expire {
                Some(ts) => ts,
                None => {
                    let stored = current.as_ref().and_then(|u| u.expire);
                    extension_base(stored, now_unix()) + change.add_days * SECS_PER_DAY
                }
            };
            payload.insert("expire".to_string(), json!(expire.max(0)));
        }

        if payload.is_empty() {
            return Ok(());
        }
        debug!(panel = %self.name, user = %username, "updating user");
        self.send(
            Method::PUT,
            &format!("/api/user/{username}"),
            Some(&Value::Object(payload)),
        )
        .await?;
        Ok(())
    }

    async fn delete_user(&self, id: &UserId) -> Result<(), PanelError> {
        let username = self.require_username(id)?;
        let resp = self
            .send_raw(Method::DELETE, &format!("/api/user/{username}"), None)
            .await?;
        expect_no_content(resp).await
    }

    async fn reset_usage(&self, id: &UserId) -> Result<(), PanelError> {
        let username = self.require_username(id)?;
        self.send(Method::POST, &format!("/api/user/{username}/reset"), None)
            .await?;
        Ok(())
    }

    async fn stats(&self) -> Result<Value, PanelError> {
        Ok(self
            .send(Method::GET, "/api/system", None)
            .await?
            .unwrap_or_else(|| json!({})))
    }
}

impl std::fmt::Debug for MarzbanClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarzbanClient")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}
