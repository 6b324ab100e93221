//! Merge rules — how per-panel records fold into one logical user.
//!
//! A user living on multiple panels is treated as having additive quota
//! and additive usage; aliveness is the OR over panels; the earliest
//! positive expiry wins. This is a deliberate contract, shared by the
//! aggregator and the combined service's one-off lookups.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;
use uuid::Uuid;

use fleet_core::{Identity, MergedUser, NormalizedUser, PanelBreakdown, PanelKind};

/// Accumulator for one logical user's per-panel records.
#[derive(Debug)]
pub struct MergedBuilder {
    identity: String,
    uuid: Option<Uuid>,
    active: bool,
    limit_gb: f64,
    usage_gb: f64,
    expire: Option<i64>,
    breakdown: BTreeMap<String, PanelBreakdown>,
}

impl MergedBuilder {
    pub fn new(identity: &Identity) -> Self {
        Self {
            identity: identity.key(),
            uuid: identity.uuid(),
            active: false,
            limit_gb: 0.0,
            usage_gb: 0.0,
            expire: None,
            breakdown: BTreeMap::new(),
        }
    }

    /// Fold one panel's record into the accumulator.
    pub fn push(&mut self, panel_name: &str, kind: PanelKind, user: NormalizedUser) {
        self.active |= user.active;
        self.limit_gb += user.limit_gb.max(0.0);
        self.usage_gb += user.usage_gb.max(0.0);

        if let Some(expire) = user.expire.filter(|ts| *ts > 0) {
            self.expire = Some(match self.expire {
                Some(existing) => existing.min(expire),
                None => expire,
            });
        }

        match (self.uuid, user.uuid) {
            (None, Some(u)) => self.uuid = Some(u),
            (Some(have), Some(got)) if have != got => {
                // Same identity, different uuid: keep the first, flag it.
                warn!(
                    identity = %self.identity,
                    panel = %panel_name,
                    have = %have,
                    got = %got,
                    "conflicting uuid within one identity"
                );
            }
            _ => {}
        }

        self.breakdown
            .insert(panel_name.to_string(), PanelBreakdown { kind, data: user });
    }

    /// True when no record has been folded in yet.
    pub fn is_empty(&self) -> bool {
        self.breakdown.is_empty()
    }

    /// Materialize the merged user; derived fields are computed here,
    /// once.
    pub fn build(self) -> MergedUser {
        let name = self
            .breakdown
            .values()
            .find_map(|slice| slice.data.display_name().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        let remaining_gb = (self.limit_gb - self.usage_gb).max(0.0);
        let usage_pct = if self.limit_gb > 0.0 {
            self.usage_gb / self.limit_gb * 100.0
        } else {
            0.0
        };
        let panels: BTreeSet<String> = self.breakdown.keys().cloned().collect();

        MergedUser {
            identity: self.identity,
            uuid: self.uuid,
            name,
            active: self.active,
            limit_gb: self.limit_gb,
            usage_gb: self.usage_gb,
            remaining_gb,
            usage_pct,
            expire: self.expire,
            breakdown: self.breakdown,
            panels,
        }
    }
}
