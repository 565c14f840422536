//! Tagged artifact identifiers.
//!
//! Shared copies of artifacts historically surfaced with a `shared-`
//! prefix on the wire. Internally we carry a (namespace, id) pair and
//! only produce the prefixed form when serializing, so routing never
//! depends on string matching scattered through handlers.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Wire-format prefix marking an identifier as living in the shared namespace
pub const SHARED_ID_PREFIX: &str = "shared-";

/// Reserved user id owning the shared content area
pub const SHARE_USER_ID: &str = "shared";

/// Length of generated object ids
const OBJECT_ID_LEN: usize = 16;

/// Namespace an artifact identifier resolves in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Private,
    Shared,
}

/// An artifact identifier tagged with its namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemId {
    pub namespace: Namespace,
    pub id: String,
}

impl ItemId {
    pub fn private(id: impl Into<String>) -> Self {
        ItemId {
            namespace: Namespace::Private,
            id: id.into(),
        }
    }

    pub fn shared(id: impl Into<String>) -> Self {
        ItemId {
            namespace: Namespace::Shared,
            id: id.into(),
        }
    }

    /// Parse a wire identifier; a leading `shared-` routes to the shared namespace
    pub fn parse(wire: &str) -> Self {
        match wire.strip_prefix(SHARED_ID_PREFIX) {
            Some(rest) => ItemId::shared(rest),
            None => ItemId::private(wire),
        }
    }

    pub fn is_shared(&self) -> bool {
        self.namespace == Namespace::Shared
    }

    /// Wire form: the bare id, prefixed when shared
    pub fn wire(&self) -> String {
        match self.namespace {
            Namespace::Private => self.id.clone(),
            Namespace::Shared => format!("{}{}", SHARED_ID_PREFIX, self.id),
        }
    }

    /// The storage-area owner for this identifier: the given user for
    /// private ids, the reserved share user otherwise.
    pub fn owner<'a>(&self, user_id: &'a str) -> &'a str {
        if self.is_shared() {
            SHARE_USER_ID
        } else {
            user_id
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire())
    }
}

impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.wire())
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ItemId::parse(&s))
    }
}

/// Generate a random 16 character alphanumeric object id
pub fn gen_object_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(OBJECT_ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trip() {
        let shared = ItemId::parse("shared-abc123");
        assert!(shared.is_shared());
        assert_eq!(shared.id, "abc123");
        assert_eq!(shared.wire(), "shared-abc123");

        let private = ItemId::parse("abc123");
        assert!(!private.is_shared());
        assert_eq!(private.id, "abc123");
        assert_eq!(private.wire(), "abc123");
    }

    #[test]
    fn strip_is_identity_for_private() {
        // Stripping a non-prefixed id leaves it untouched
        let id = ItemId::parse("plain-id-no-prefix");
        assert_eq!(id.wire(), "plain-id-no-prefix");
    }

    #[test]
    fn double_prefix_strips_once() {
        let id = ItemId::parse("shared-shared-x");
        assert!(id.is_shared());
        assert_eq!(id.id, "shared-x");
    }

    #[test]
    fn owner_routing() {
        assert_eq!(ItemId::parse("q1").owner("u1"), "u1");
        assert_eq!(ItemId::parse("shared-q1").owner("u1"), SHARE_USER_ID);
    }

    #[test]
    fn generated_ids_alphanumeric() {
        let id = gen_object_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, gen_object_id());
    }

    #[test]
    fn serde_as_string() {
        let id = ItemId::shared("q9");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"shared-q9\"");
        let back: ItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
