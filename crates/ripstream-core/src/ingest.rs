//! Severity gate and stamping for producer log lines.
//!
//! Filtering happens before anything is stamped or stored, so a filtered
//! line never occupies log space or reaches a subscriber.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use ripstream_store::LogStore;
use ripstream_types::{FieldMap, RecordId, Severity};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::RelayError;

/// Job id stamped on lines that carry none.
pub const UNKNOWN_JOB: &str = "unknown";

/// Result of passing a line through the [`IngestGate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Below the configured minimum; drop it.
    Filtered {
        /// The resolved severity of the dropped line.
        severity: Severity,
    },
    /// Admitted, with the stamped fields ready to append.
    Admitted(FieldMap),
}

/// Decides whether a producer line meets the minimum severity and, if it
/// does, stamps it with `job_id`, `severity`, and `timestamp`.
#[derive(Debug, Clone, Copy)]
pub struct IngestGate {
    minimum: Severity,
}

impl IngestGate {
    /// Create a gate admitting lines at `minimum` or above.
    pub const fn new(minimum: Severity) -> Self {
        Self { minimum }
    }

    /// The configured minimum severity.
    pub const fn minimum(&self) -> Severity {
        self.minimum
    }

    /// Gate and stamp one line.
    ///
    /// The severity is read from `level`, then `severity`, defaulting to
    /// `info`. The job id is taken from `header_job_id`, then the line's
    /// `job_id`, then [`UNKNOWN_JOB`]. `timestamp` is always the relay's
    /// `now`, overwriting anything the producer sent.
    pub fn admit(
        &self,
        line: &Map<String, Value>,
        header_job_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Admission {
        let declared = line
            .get("level")
            .or_else(|| line.get("severity"))
            .and_then(Value::as_str);
        let severity = Severity::resolve(declared);
        if !severity.meets(self.minimum) {
            return Admission::Filtered { severity };
        }

        let job_id = header_job_id
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .or_else(|| line.get("job_id").and_then(value_text).filter(|id| !id.is_empty()))
            .unwrap_or_else(|| UNKNOWN_JOB.to_owned());

        let mut fields: FieldMap = line
            .iter()
            .filter_map(|(key, value)| value_text(value).map(|text| (key.clone(), text)))
            .collect();
        fields.insert("job_id".to_owned(), job_id);
        fields.insert("severity".to_owned(), severity.as_str().to_owned());
        fields.insert(
            "timestamp".to_owned(),
            now.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        Admission::Admitted(fields)
    }
}

/// Store form of a JSON value: strings verbatim, `null` dropped,
/// everything else as JSON text.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// What happened to an ingested line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Below the minimum severity; not stored.
    Filtered,
    /// Appended under this id.
    Logged(RecordId),
}

/// Gates producer lines and appends the admitted ones to the ingest topic.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn LogStore>,
    gate: IngestGate,
    topic: String,
}

impl Ingestor {
    /// Create an ingestor appending to `topic`.
    pub fn new(store: Arc<dyn LogStore>, gate: IngestGate, topic: impl Into<String>) -> Self {
        Self {
            store,
            gate,
            topic: topic.into(),
        }
    }

    /// Topic admitted lines are appended to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Ingest one producer line.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidPayload`] if `line` is not a JSON
    /// object, or [`RelayError::Store`] if the append fails.
    pub async fn ingest(
        &self,
        line: &Value,
        header_job_id: Option<&str>,
    ) -> Result<IngestOutcome, RelayError> {
        let Some(object) = line.as_object() else {
            return Err(RelayError::InvalidPayload(
                "log line must be a JSON object".to_owned(),
            ));
        };

        match self.gate.admit(object, header_job_id, Utc::now()) {
            Admission::Filtered { severity } => {
                debug!(%severity, minimum = %self.gate.minimum(), "log line filtered");
                Ok(IngestOutcome::Filtered)
            }
            Admission::Admitted(fields) => {
                let id = self.store.append(&self.topic, &fields).await?;
                Ok(IngestOutcome::Logged(id))
            }
        }
    }
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("gate", &self.gate)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use ripstream_store::MemoryLog;
    use serde_json::json;

    use super::*;

    fn object(value: &Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn admitted(admission: Admission) -> FieldMap {
        match admission {
            Admission::Admitted(fields) => fields,
            Admission::Filtered { .. } => FieldMap::new(),
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    #[test]
    fn below_minimum_is_filtered() {
        let gate = IngestGate::new(Severity::Info);
        let line = object(&json!({"level": "debug", "message": "noise"}));
        assert_eq!(
            gate.admit(&line, None, fixed_now()),
            Admission::Filtered {
                severity: Severity::Debug
            }
        );
    }

    #[test]
    fn admitted_lines_are_stamped() {
        let gate = IngestGate::new(Severity::Info);
        let line = object(&json!({"level": "warn", "job_id": "J1", "message": "disc dirty"}));
        let fields = admitted(gate.admit(&line, None, fixed_now()));
        assert_eq!(fields.get("severity").map(String::as_str), Some("warn"));
        assert_eq!(fields.get("job_id").map(String::as_str), Some("J1"));
        assert_eq!(
            fields.get("timestamp").map(String::as_str),
            Some("2024-05-01T12:30:00.000Z")
        );
        assert_eq!(fields.get("message").map(String::as_str), Some("disc dirty"));
    }

    #[test]
    fn header_job_id_wins_and_missing_defaults_to_unknown() {
        let gate = IngestGate::new(Severity::Debug);
        let line = object(&json!({"job_id": "from-body"}));
        let fields = admitted(gate.admit(&line, Some("from-header"), fixed_now()));
        assert_eq!(fields.get("job_id").map(String::as_str), Some("from-header"));

        let fields = admitted(gate.admit(&Map::new(), None, fixed_now()));
        assert_eq!(fields.get("job_id").map(String::as_str), Some(UNKNOWN_JOB));
        assert_eq!(fields.get("severity").map(String::as_str), Some("info"));
    }

    #[test]
    fn unrecognised_level_is_treated_as_info() {
        let gate = IngestGate::new(Severity::Warn);
        let line = object(&json!({"level": "chatty"}));
        assert_eq!(
            gate.admit(&line, None, fixed_now()),
            Admission::Filtered {
                severity: Severity::Info
            }
        );
    }

    #[test]
    fn structured_values_become_json_text() {
        let gate = IngestGate::new(Severity::Info);
        let line = object(&json!({"progress": 42, "tags": ["a"], "gone": null, "timestamp": "old"}));
        let fields = admitted(gate.admit(&line, None, fixed_now()));
        assert_eq!(fields.get("progress").map(String::as_str), Some("42"));
        assert_eq!(fields.get("tags").map(String::as_str), Some("[\"a\"]"));
        assert!(!fields.contains_key("gone"));
        assert_eq!(
            fields.get("timestamp").map(String::as_str),
            Some("2024-05-01T12:30:00.000Z")
        );
    }

    #[tokio::test]
    async fn filtered_lines_never_reach_the_store() {
        let store = Arc::new(MemoryLog::new());
        let ingestor = Ingestor::new(Arc::clone(&store) as Arc<dyn LogStore>, IngestGate::new(Severity::Info), "logs");

        let outcome = ingestor.ingest(&json!({"level": "debug"}), None).await;
        assert!(matches!(outcome, Ok(IngestOutcome::Filtered)));
        assert!(store.is_empty("logs").await);

        let outcome = ingestor
            .ingest(&json!({"level": "warn", "job_id": "J1"}), None)
            .await;
        assert!(matches!(outcome, Ok(IngestOutcome::Logged(_))));
        let stored = store.read_range("logs").await.unwrap_or_default();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.first().and_then(|r| r.field("severity")), Some("warn"));
    }

    #[tokio::test]
    async fn non_object_payload_is_rejected() {
        let store = Arc::new(MemoryLog::new());
        let ingestor = Ingestor::new(store, IngestGate::new(Severity::Info), "logs");
        let outcome = ingestor.ingest(&json!(["not", "an", "object"]), None).await;
        assert!(matches!(outcome, Err(RelayError::InvalidPayload(_))));
    }
}
