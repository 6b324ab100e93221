//! Logical user identity — the key records merge under.

use std::fmt;

use uuid::Uuid;

/// Prefix for synthetic identities of username-keyed records that have no
/// stored uuid mapping.
pub const PANEL_LOCAL_PREFIX: &str = "marzban_";

/// The key one logical user's records merge under.
///
/// UUID-keyed panels carry the identity in the record itself. Username-keyed
/// panels are promoted to an [`Identity::Uuid`] when the store knows the
/// mapping, and fall back to a synthetic panel-local identity otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Uuid(Uuid),
    PanelLocal(String),
}

impl Identity {
    /// String form: the hyphenated UUID, or the prefixed username.
    pub fn key(&self) -> String {
        match self {
            Self::Uuid(u) => u.to_string(),
            Self::PanelLocal(name) => format!("{PANEL_LOCAL_PREFIX}{name}"),
        }
    }

    /// Parse an identity key back into its structured form.
    ///
    /// Accepts a hyphenated UUID, a prefixed synthetic key, or a bare
    /// username (treated as panel-local).
    pub fn parse(key: &str) -> Self {
        if let Ok(u) = Uuid::parse_str(key) {
            return Self::Uuid(u);
        }
        let name = key.strip_prefix(PANEL_LOCAL_PREFIX).unwrap_or(key);
        Self::PanelLocal(name.to_string())
    }

    #[inline]
    pub fn uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(u) => Some(*u),
            Self::PanelLocal(_) => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid(u) => write!(f, "{u}"),
            Self::PanelLocal(name) => write!(f, "{PANEL_LOCAL_PREFIX}{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_forms() {
        let u = Uuid::parse_str("c7f2a9d4-1b3e-4f5a-8c6d-0e9f8a7b6c5d").unwrap();
        assert_eq!(Identity::Uuid(u).key(), "c7f2a9d4-1b3e-4f5a-8c6d-0e9f8a7b6c5d");
        assert_eq!(
            Identity::PanelLocal("alice".to_string()).key(),
            "marzban_alice"
        );
    }

    #[test]
    fn parse_roundtrip() {
        let u = Uuid::new_v4();
        assert_eq!(Identity::parse(&u.to_string()), Identity::Uuid(u));
        assert_eq!(
            Identity::parse("marzban_bob"),
            Identity::PanelLocal("bob".to_string())
        );
        // Bare usernames are panel-local too.
        assert_eq!(
            Identity::parse("bob"),
            Identity::PanelLocal("bob".to_string())
        );
    }
}
