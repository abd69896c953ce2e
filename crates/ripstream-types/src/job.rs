//! Job lifecycle topics and the reconstructed [`JobView`].
//!
//! Workers publish `<stage>.start`, `<stage>.progress`, and
//! `<stage>.complete` records (e.g. `rip.start`). The relay folds those
//! into one view per job.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::record::FieldMap;

/// Lifecycle phase encoded in a topic suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// `*.start`
    Start,
    /// `*.progress`
    Progress,
    /// `*.complete`
    Complete,
}

impl Lifecycle {
    /// Split a topic into its stage prefix and lifecycle phase.
    ///
    /// Returns `None` for topics that do not end in a lifecycle suffix.
    pub fn from_topic(topic: &str) -> Option<(&str, Self)> {
        let (stage, suffix) = topic.rsplit_once('.')?;
        let phase = match suffix {
            "start" => Self::Start,
            "progress" => Self::Progress,
            "complete" => Self::Complete,
            _ => return None,
        };
        Some((stage, phase))
    }
}

/// Status of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum JobStatus {
    /// A `.start` has been seen and no `.complete` since.
    Running,
    /// A `.complete` has been seen; the view is awaiting eviction.
    Completed,
}

/// Current state of one job, reconstructed from its lifecycle records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct JobView {
    /// Producer-assigned job id.
    pub job_id: String,
    /// Topic of the record that started the job (e.g. `rip.start`).
    pub channel: String,
    /// Running or completed.
    pub status: JobStatus,
    /// Last reported progress, usually a percentage.
    pub progress: Option<f64>,
    /// Fields of the most recent lifecycle record applied to this job.
    pub last_event_fields: FieldMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_suffixes_are_recognised() {
        assert_eq!(Lifecycle::from_topic("rip.start"), Some(("rip", Lifecycle::Start)));
        assert_eq!(
            Lifecycle::from_topic("transcode.progress"),
            Some(("transcode", Lifecycle::Progress))
        );
        assert_eq!(
            Lifecycle::from_topic("a.b.complete"),
            Some(("a.b", Lifecycle::Complete))
        );
    }

    #[test]
    fn non_lifecycle_topics_are_rejected() {
        assert_eq!(Lifecycle::from_topic("logs"), None);
        assert_eq!(Lifecycle::from_topic("drive_events"), None);
        assert_eq!(Lifecycle::from_topic("rip.started"), None);
    }
}
