//! Panel and user data model.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Product family of a remote panel.
///
/// Two id conventions exist across the fleet: hiddify and remnawave key
/// users by UUID, marzban and marzneshin by a panel-local username.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelKind {
    Hiddify,
    Marzban,
    Remnawave,
    Marzneshin,
}

impl PanelKind {
    /// Whether this panel's native user id is the UUID (vs the username).
    #[inline]
    pub fn uses_uuid_id(&self) -> bool {
        matches!(self, Self::Hiddify | Self::Remnawave)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hiddify => "hiddify",
            Self::Marzban => "marzban",
            Self::Remnawave => "remnawave",
            Self::Marzneshin => "marzneshin",
        }
    }

    /// Parse a kind from its lowercase name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hiddify" => Some(Self::Hiddify),
            "marzban" => Some(Self::Marzban),
            "remnawave" => Some(Self::Remnawave),
            "marzneshin" => Some(Self::Marzneshin),
            _ => None,
        }
    }
}

impl fmt::Display for PanelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection settings for one remote panel, as stored by the bot.
///
/// The credential fields vary by kind:
/// - hiddify: `secret1` is the static API key
/// - marzban / marzneshin: `secret1` is the admin username, `secret2` the password
/// - remnawave: `secret1` is the static bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Unique panel name, the breakdown key in merged views.
    pub name: String,
    pub kind: PanelKind,
    pub base_url: String,
    pub secret1: String,
    #[serde(default)]
    pub secret2: Option<String>,
    /// Extra path segment between the base URL and the admin prefix (hiddify).
    #[serde(default)]
    pub proxy_path: Option<String>,
    /// Free-form grouping tag, e.g. a country code.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// One panel's view of a user, normalized to the common contract.
///
/// Quotas are in gigabytes (2^30 bytes), `expire` is epoch seconds.
/// Zero limit means unlimited; `None` expire means no expiry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedUser {
    pub uuid: Option<Uuid>,
    pub username: Option<String>,
    pub name: Option<String>,
    pub limit_gb: f64,
    pub usage_gb: f64,
    pub expire: Option<i64>,
    pub active: bool,
    /// Original payload, passed through for caller-specific rendering.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl NormalizedUser {
    /// First non-empty of `name` / `username`.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.username.as_deref().filter(|s| !s.is_empty()))
    }
}

/// Per-panel slice of a merged user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelBreakdown {
    pub kind: PanelKind,
    pub data: NormalizedUser,
}

/// One logical user merged across every panel it exists on.
///
/// A user living on multiple panels has additive quota and usage; the
/// earliest positive expiry wins; aliveness is the OR over panels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedUser {
    /// String form of the identity the merge was keyed by.
    pub identity: String,
    pub uuid: Option<Uuid>,
    /// First non-empty display name found in breakdown order, else "unknown".
    pub name: String,
    pub active: bool,
    pub limit_gb: f64,
    pub usage_gb: f64,
    pub remaining_gb: f64,
    pub usage_pct: f64,
    pub expire: Option<i64>,
    /// Per-panel records, keyed by panel name. Never empty.
    pub breakdown: BTreeMap<String, PanelBreakdown>,
    /// Names of the panels this user exists on.
    pub panels: BTreeSet<String>,
}
