use crate::domain::cache::CacheKey;
use serde::{Deserialize, Serialize};

/// Cache changes published by the data plane, for views that need to
/// refresh when a category is invalidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheEvent {
    Stored(EntryEvent),
    Invalidated(EntryEvent),
    RolledBack(EntryEvent),
    TypeInvalidated(TypeInvalidatedEvent),
    Cleared(ClearedEvent),
}

impl CacheEvent {
    /// `None` for [`CacheEvent::Cleared`], which spans every type.
    pub fn cache_type(&self) -> Option<&str> {
        match self {
            CacheEvent::Stored(e) | CacheEvent::Invalidated(e) | CacheEvent::RolledBack(e) => {
                Some(&e.cache_type)
            }
            CacheEvent::TypeInvalidated(e) => Some(&e.cache_type),
            CacheEvent::Cleared(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryEvent {
    pub identifier: String,
    pub cache_type: String,
    pub timestamp_ms: i64,
}

impl EntryEvent {
    pub fn for_key(key: &CacheKey) -> Self {
        Self {
            identifier: key.identifier().to_string(),
            cache_type: key.cache_type().to_string(),
            timestamp_ms: now_timestamp_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeInvalidatedEvent {
    pub cache_type: String,
    pub removed: usize,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearedEvent {
    pub timestamp_ms: i64,
}

/// Milliseconds since the UNIX epoch.
pub fn now_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = CacheEvent::TypeInvalidated(TypeInvalidatedEvent {
            cache_type: "codes".to_string(),
            removed: 4,
            timestamp_ms: 1,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "type_invalidated");
        assert_eq!(json["cacheType"], "codes");
        assert_eq!(json["removed"], 4);

        let back: CacheEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.cache_type(), Some("codes"));
    }
}
