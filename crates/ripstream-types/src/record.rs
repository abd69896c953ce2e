//! Stream record identifiers and the [`LogRecord`] envelope.
//!
//! Ids are assigned by the store as `<milliseconds>-<sequence>` and are
//! strictly increasing within a topic. The relay uses them both as the
//! resume cursor and as the dedup key for a record.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Field/value pairs carried by a stream record.
///
/// Stream stores hold values as strings; structured producer values are
/// kept as their JSON text.
pub type FieldMap = BTreeMap<String, String>;

/// Keys written by the frame envelope. Record fields with these names are
/// not allowed to shadow the envelope.
const ENVELOPE_KEYS: [&str; 3] = ["topic", "channel", "id"];

/// Store-assigned record id, ordered by `(ms, seq)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId {
    ms: u64,
    seq: u64,
}

impl RecordId {
    /// The id preceding every real record. Reading since `ZERO` replays
    /// the whole topic.
    pub const ZERO: Self = Self { ms: 0, seq: 0 };

    /// Build an id from its two components.
    pub const fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }

    /// Millisecond component.
    pub const fn ms(self) -> u64 {
        self.ms
    }

    /// Sequence component within the millisecond.
    pub const fn seq(self) -> u64 {
        self.seq
    }

    /// The smallest id strictly greater than `self`.
    pub const fn successor(self) -> Self {
        match self.seq.checked_add(1) {
            Some(seq) => Self { ms: self.ms, seq },
            None => Self {
                ms: self.ms.saturating_add(1),
                seq: 0,
            },
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// A string could not be parsed as a [`RecordId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed record id: {0:?}")]
pub struct ParseRecordIdError(pub String);

impl FromStr for RecordId {
    type Err = ParseRecordIdError;

    /// Accepts `ms-seq` or a bare `ms` (sequence 0), matching what the
    /// stream store accepts as a cursor.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (ms, seq) = trimmed.split_once('-').unwrap_or((trimmed, "0"));
        let ms = ms
            .parse::<u64>()
            .map_err(|_e| ParseRecordIdError(s.to_owned()))?;
        let seq = seq
            .parse::<u64>()
            .map_err(|_e| ParseRecordIdError(s.to_owned()))?;
        Ok(Self { ms, seq })
    }
}

impl TryFrom<String> for RecordId {
    type Error = ParseRecordIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.to_string()
    }
}

/// One record read from a topic.
///
/// Immutable once appended. Serializes as a flat JSON object carrying the
/// envelope (`topic`, `channel`, `id`) followed by the record fields, which
/// is the frame pushed to live subscribers and returned by replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Topic the record was read from.
    pub topic: String,
    /// Store-assigned id.
    pub id: RecordId,
    /// Record payload.
    pub fields: FieldMap,
}

impl LogRecord {
    /// Create a record.
    pub fn new(topic: impl Into<String>, id: RecordId, fields: FieldMap) -> Self {
        Self {
            topic: topic.into(),
            id,
            fields,
        }
    }

    /// Look up a field value.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("topic", &self.topic)?;
        map.serialize_entry("channel", &self.topic)?;
        map.serialize_entry("id", &self.id)?;
        for (key, value) in &self.fields {
            if !ENVELOPE_KEYS.contains(&key.as_str()) {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_and_bare_ids() {
        assert_eq!("1526919030474-55".parse::<RecordId>(), Ok(RecordId::new(1_526_919_030_474, 55)));
        assert_eq!("0".parse::<RecordId>(), Ok(RecordId::ZERO));
        assert!("abc-1".parse::<RecordId>().is_err());
        assert!("1-".parse::<RecordId>().is_err());
    }

    #[test]
    fn ordering_is_numeric_not_lexical() {
        let a: RecordId = "9-0".parse().unwrap_or(RecordId::ZERO);
        let b: RecordId = "10-0".parse().unwrap_or(RecordId::ZERO);
        assert!(a < b);
        assert!(RecordId::new(5, 1) < RecordId::new(5, 2));
        assert!(RecordId::new(5, 99) < RecordId::new(6, 0));
    }

    #[test]
    fn successor_rolls_into_next_millisecond() {
        assert_eq!(RecordId::new(3, 4).successor(), RecordId::new(3, 5));
        assert_eq!(RecordId::new(3, u64::MAX).successor(), RecordId::new(4, 0));
    }

    #[test]
    fn frame_flattens_fields_and_protects_envelope() {
        let mut fields = FieldMap::new();
        fields.insert("job_id".to_owned(), "J1".to_owned());
        fields.insert("id".to_owned(), "spoofed".to_owned());
        let record = LogRecord::new("rip.start", RecordId::new(7, 0), fields);

        let json = serde_json::to_value(&record).unwrap_or_default();
        assert_eq!(json["topic"], "rip.start");
        assert_eq!(json["channel"], "rip.start");
        assert_eq!(json["id"], "7-0");
        assert_eq!(json["job_id"], "J1");
    }
}
