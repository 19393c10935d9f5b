//! Strongly-typed identifiers used in history and on the wire.
//!
//! - `EventId`: 履歴イベントの単調増加 ID（順序の唯一の根拠）
//! - `ItemId`: activity-id / timer-id として送受信される文字列 ID

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic id of a history event. Ordering of events is ordering of ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(u64);

impl EventId {
    pub const ZERO: EventId = EventId(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for EventId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wire id of a workflow item (activity id or timer id).
///
/// Derived from an [`Identity`](super::identity::Identity); a reschedule timer
/// reuses the id of the item it re-drives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_order_numerically() {
        let mut ids = vec![EventId::new(10), EventId::new(2), EventId::new(7)];
        ids.sort();
        assert_eq!(ids, vec![EventId::new(2), EventId::new(7), EventId::new(10)]);
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&EventId::new(42)).unwrap();
        assert_eq!(json, "42");

        let id: ItemId = serde_json::from_str("\"download:1.0:\"").unwrap();
        assert_eq!(id.as_str(), "download:1.0:");
    }
}
