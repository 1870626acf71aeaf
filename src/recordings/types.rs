use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Duration value meaning "not yet measured".
pub const DURATION_UNKNOWN: i32 = -1;

/// One recorded memo.
///
/// Values are immutable; updates clone into a new value. The serialized
/// form is the metadata sidecar contract:
/// `{id, dateTime (epoch millis), transcription, duration}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingItem {
    pub id: Uuid,

    #[serde(rename = "dateTime", with = "ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    /// Empty until a transcription job has completed for this item.
    #[serde(default)]
    pub transcription: String,

    #[serde(rename = "duration", default = "unknown_duration")]
    pub duration_secs: i32,
}

fn unknown_duration() -> i32 {
    DURATION_UNKNOWN
}

impl RecordingItem {
    /// Mint a fresh item at the start of a capture session.
    pub fn new() -> Self {
        Self::from_parts(Uuid::new_v4(), Utc::now())
    }

    pub fn from_parts(id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            transcription: String::new(),
            duration_secs: DURATION_UNKNOWN,
        }
    }

    /// Clone this item with a new (trimmed) transcription.
    pub fn with_transcription(&self, text: &str) -> Self {
        Self {
            transcription: text.trim().to_string(),
            ..self.clone()
        }
    }

    pub fn is_transcribed(&self) -> bool {
        !self.transcription.is_empty()
    }
}

impl Default for RecordingItem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fresh_item_is_untranscribed() {
        let item = RecordingItem::new();
        assert!(!item.is_transcribed());
        assert_eq!(item.duration_secs, DURATION_UNKNOWN);
    }

    #[test]
    fn test_with_transcription_trims_and_preserves_identity() {
        let item = RecordingItem::new();
        let updated = item.with_transcription("  hello world \n");

        assert_eq!(updated.transcription, "hello world");
        assert_eq!(updated.id, item.id);
        assert_eq!(updated.created_at, item.created_at);
        // The original value is untouched.
        assert!(!item.is_transcribed());
    }

    #[test]
    fn test_sidecar_serde_contract() {
        let item = RecordingItem {
            id: Uuid::nil(),
            created_at: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            transcription: "hi".to_string(),
            duration_secs: 5,
        };

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["dateTime"], 1_700_000_000_000i64);
        assert_eq!(json["duration"], 5);
        assert_eq!(json["transcription"], "hi");

        let back: RecordingItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_sidecar_defaults_for_sparse_json() {
        let raw = format!(r#"{{"id":"{}","dateTime":0}}"#, Uuid::nil());
        let item: RecordingItem = serde_json::from_str(&raw).unwrap();
        assert_eq!(item.transcription, "");
        assert_eq!(item.duration_secs, DURATION_UNKNOWN);
    }
}
