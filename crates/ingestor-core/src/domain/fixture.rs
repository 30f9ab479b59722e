//! FixtureEvent - キューから届く試合（fixture）更新イベント
//!
//! メッセージ body の JSON をそのまま写した構造体です。
//! 検証後は破棄され、永続化はしません。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled match/event as carried in a queue message body.
///
/// Wire keys are PascalCase (`Id`, `SportId`, `TeamId1`, `TeamId2`,
/// `DateTime`, `Details`). Missing integer keys decode as `0` and a missing
/// `DateTime` decodes as the Unix epoch; only `Details` is checked later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FixtureEvent {
    #[serde(default)]
    pub id: i64,

    #[serde(default)]
    pub sport_id: i64,

    #[serde(default)]
    pub team_id1: i64,

    #[serde(default)]
    pub team_id2: i64,

    #[serde(default = "unix_epoch")]
    pub date_time: DateTime<Utc>,

    /// Arbitrary JSON document. `None` for both an absent key and `null`.
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

impl FixtureEvent {
    pub fn has_details(&self) -> bool {
        self.details.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn decodes_pascal_case_keys() {
        let body = r#"{"Id":1,"SportId":2,"TeamId1":3,"TeamId2":4,"DateTime":"2025-01-01T00:00:00Z","Details":{"venue":"north"}}"#;
        let event: FixtureEvent = serde_json::from_str(body).unwrap();

        assert_eq!(event.id, 1);
        assert_eq!(event.sport_id, 2);
        assert_eq!(event.team_id1, 3);
        assert_eq!(event.team_id2, 4);
        assert_eq!(
            event.date_time,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(event.details, Some(serde_json::json!({ "venue": "north" })));
    }

    #[test]
    fn null_and_absent_details_are_both_none() {
        let with_null: FixtureEvent = serde_json::from_str(r#"{"Id":1,"Details":null}"#).unwrap();
        let without: FixtureEvent = serde_json::from_str(r#"{"Id":1}"#).unwrap();

        assert!(!with_null.has_details());
        assert!(!without.has_details());
    }

    #[test]
    fn missing_fields_take_zero_values() {
        let event: FixtureEvent = serde_json::from_str(r#"{"Details":{}}"#).unwrap();

        assert_eq!(event.id, 0);
        assert_eq!(event.team_id2, 0);
        assert_eq!(event.date_time, DateTime::<Utc>::UNIX_EPOCH);
        assert!(event.has_details());
    }
}
