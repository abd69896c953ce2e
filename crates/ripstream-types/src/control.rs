//! Out-of-band control commands published for downstream workers.
//!
//! The relay only writes these. Workers read the control topic and decide
//! what to do with them.

use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::record::FieldMap;

/// What a control command asks a worker to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ControlAction {
    /// Pause a running job.
    Pause,
    /// Cancel a running job.
    Cancel,
    /// Flip a service between enabled and disabled.
    Toggle,
}

impl ControlAction {
    /// Lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Cancel => "cancel",
            Self::Toggle => "toggle",
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subject of a control command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ControlTarget {
    /// A job, by id.
    Job(String),
    /// A service, by name (e.g. `rip_worker`).
    Service(String),
}

impl ControlTarget {
    /// The raw id or name.
    pub fn name(&self) -> &str {
        match self {
            Self::Job(name) | Self::Service(name) => name,
        }
    }
}

/// A command ready to be appended to the control topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCommand {
    /// Requested action.
    pub action: ControlAction,
    /// Job or service the action applies to.
    pub target: ControlTarget,
}

impl ControlCommand {
    /// Pause the given job.
    pub fn pause(job_id: impl Into<String>) -> Self {
        Self {
            action: ControlAction::Pause,
            target: ControlTarget::Job(job_id.into()),
        }
    }

    /// Cancel the given job.
    pub fn cancel(job_id: impl Into<String>) -> Self {
        Self {
            action: ControlAction::Cancel,
            target: ControlTarget::Job(job_id.into()),
        }
    }

    /// Toggle the given service.
    pub fn toggle(service: impl Into<String>) -> Self {
        Self {
            action: ControlAction::Toggle,
            target: ControlTarget::Service(service.into()),
        }
    }

    /// Encode as stream fields: `action` plus `jobId` or `service`.
    pub fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("action".to_owned(), self.action.as_str().to_owned());
        let (key, value) = match &self.target {
            ControlTarget::Job(id) => ("jobId", id),
            ControlTarget::Service(name) => ("service", name),
        };
        fields.insert(key.to_owned(), value.clone());
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_commands_carry_job_id() {
        let fields = ControlCommand::pause("J1").to_fields();
        assert_eq!(fields.get("action").map(String::as_str), Some("pause"));
        assert_eq!(fields.get("jobId").map(String::as_str), Some("J1"));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn toggle_carries_service_name() {
        let fields = ControlCommand::toggle("rip_worker").to_fields();
        assert_eq!(fields.get("action").map(String::as_str), Some("toggle"));
        assert_eq!(fields.get("service").map(String::as_str), Some("rip_worker"));
        assert!(!fields.contains_key("jobId"));
    }
}
