//! Publishing operator control commands onto the control topic.

use std::sync::Arc;

use ripstream_store::LogStore;
use ripstream_types::{ControlCommand, RecordId};
use tracing::info;

use crate::error::RelayError;

/// Longest accepted job id or service name.
pub const MAX_TARGET_LEN: usize = 128;

/// Appends validated [`ControlCommand`]s to the control topic.
///
/// Each successful call appends exactly one record. Nothing is appended
/// when validation fails.
#[derive(Clone)]
pub struct ControlPublisher {
    store: Arc<dyn LogStore>,
    topic: String,
}

impl ControlPublisher {
    /// Create a publisher appending to `topic`.
    pub fn new(store: Arc<dyn LogStore>, topic: impl Into<String>) -> Self {
        Self {
            store,
            topic: topic.into(),
        }
    }

    /// Topic commands are appended to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Validate and append a command.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidCommand`] if the target is empty, too
    /// long, or contains characters outside `[A-Za-z0-9._:-]`, or
    /// [`RelayError::Store`] if the append fails.
    pub async fn publish(&self, command: &ControlCommand) -> Result<RecordId, RelayError> {
        validate_target(command.target.name())?;
        let id = self.store.append(&self.topic, &command.to_fields()).await?;
        info!(
            action = %command.action,
            target = command.target.name(),
            %id,
            "Published control command"
        );
        Ok(id)
    }

    /// Ask workers to pause a job.
    ///
    /// # Errors
    ///
    /// See [`Self::publish`].
    pub async fn pause(&self, job_id: &str) -> Result<RecordId, RelayError> {
        self.publish(&ControlCommand::pause(job_id)).await
    }

    /// Ask workers to cancel a job.
    ///
    /// # Errors
    ///
    /// See [`Self::publish`].
    pub async fn cancel(&self, job_id: &str) -> Result<RecordId, RelayError> {
        self.publish(&ControlCommand::cancel(job_id)).await
    }

    /// Ask a service to flip its enabled state.
    ///
    /// # Errors
    ///
    /// See [`Self::publish`].
    pub async fn toggle(&self, service: &str) -> Result<RecordId, RelayError> {
        self.publish(&ControlCommand::toggle(service)).await
    }
}

impl std::fmt::Debug for ControlPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPublisher")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

fn validate_target(name: &str) -> Result<(), RelayError> {
    if name.is_empty() {
        return Err(RelayError::InvalidCommand("target must not be empty".to_owned()));
    }
    if name.len() > MAX_TARGET_LEN {
        return Err(RelayError::InvalidCommand(format!(
            "target exceeds {MAX_TARGET_LEN} characters"
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-')))
    {
        return Err(RelayError::InvalidCommand(format!(
            "target contains invalid character {bad:?}"
        )));
    }
    Ok(())
}
