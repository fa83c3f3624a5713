use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timestamp;

/// Identity and lifetime information attached to a key set
///
/// `owner` is the trust anchor: every signature made with the key set is
/// attributed to it, and registries index public keys by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetadata {
    pub id: String,
    pub owner: String,
    #[serde(rename = "creation_time")]
    pub created: String,
    #[serde(rename = "update_time")]
    pub updated: String,
}

impl KeyMetadata {
    /// Fresh metadata for `owner`, stamped with the current time
    pub fn new(owner: impl Into<String>) -> Self {
        Self::new_at(owner, Utc::now())
    }

    pub fn new_at(owner: impl Into<String>, now: DateTime<Utc>) -> Self {
        let stamp = timestamp::format(now);
        Self {
            id: timestamp::unique_id(),
            owner: owner.into(),
            created: stamp.clone(),
            updated: stamp,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_wire_names() {
        let t = Utc.timestamp_opt(1234567890, 0).unwrap();
        let metadata = KeyMetadata::new_at("a.example.com", t);
        let json = serde_json::to_value(&metadata).unwrap();

        assert_eq!(json["owner"], "a.example.com");
        assert_eq!(json["creation_time"], "2009-02-13T23:31:30Z");
        assert_eq!(json["update_time"], "2009-02-13T23:31:30Z");
        assert!(json["id"].as_str().unwrap().contains('-'));
    }
}
