//! Job state reconstruction from lifecycle topics.
//!
//! [`JobProjection`] is a pure fold: it applies `<stage>.start`,
//! `<stage>.progress`, and `<stage>.complete` records to a map of
//! [`JobView`]s and reports when a completed job becomes due for
//! eviction. [`JobTracker`] drives it from the poller and runs the
//! eviction timers.
//!
//! Each start gives the job a fresh generation. An eviction only removes
//! the job if it is still completed at the generation it was scheduled
//! for, so a restart during the grace period survives the old timer.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ripstream_types::{JobStatus, JobView, Lifecycle, LogRecord};
use tokio::sync::Mutex;
use tracing::debug;

use crate::poller::RecordListener;

/// A completed job that should be removed once its grace period ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    /// Job to remove.
    pub job_id: String,
    /// Generation the removal was scheduled against.
    pub generation: u64,
}

#[derive(Debug, Clone)]
struct TrackedJob {
    view: JobView,
    generation: u64,
}

/// Current view of every known job, folded from lifecycle records.
#[derive(Debug, Clone, Default)]
pub struct JobProjection {
    prefixes: HashSet<String>,
    jobs: BTreeMap<String, TrackedJob>,
    next_generation: u64,
}

impl JobProjection {
    /// Create a projection recognising the given stage prefixes
    /// (e.g. `rip`, `transcode`).
    pub fn new<I, T>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            jobs: BTreeMap::new(),
            next_generation: 0,
        }
    }

    /// Apply one record.
    ///
    /// Records that are not lifecycle records of a recognised stage, or
    /// carry no `job_id`, are ignored. Progress and completion for an
    /// unknown job are dropped. A repeated completion is a no-op.
    ///
    /// Returns the eviction to schedule when a running job completes.
    pub fn apply(&mut self, record: &LogRecord) -> Option<Eviction> {
        let (stage, phase) = Lifecycle::from_topic(&record.topic)?;
        if !self.prefixes.contains(stage) {
            return None;
        }
        let job_id = record.field("job_id").filter(|id| !id.is_empty())?;

        match phase {
            Lifecycle::Start => {
                let generation = self.next_generation;
                self.next_generation = self.next_generation.wrapping_add(1);
                let view = JobView {
                    job_id: job_id.to_owned(),
                    channel: record.topic.clone(),
                    status: JobStatus::Running,
                    progress: progress_of(record),
                    last_event_fields: record.fields.clone(),
                };
                self.jobs
                    .insert(job_id.to_owned(), TrackedJob { view, generation });
                None
            }
            Lifecycle::Progress => {
                let job = self.jobs.get_mut(job_id)?;
                if let Some(progress) = progress_of(record) {
                    job.view.progress = Some(progress);
                }
                job.view.last_event_fields.clone_from(&record.fields);
                None
            }
            Lifecycle::Complete => {
                let job = self.jobs.get_mut(job_id)?;
                if job.view.status == JobStatus::Completed {
                    return None;
                }
                job.view.status = JobStatus::Completed;
                job.view.last_event_fields.clone_from(&record.fields);
                Some(Eviction {
                    job_id: job_id.to_owned(),
                    generation: job.generation,
                })
            }
        }
    }

    /// Remove the job named by `eviction` if it is still completed at the
    /// same generation. Returns whether it was removed.
    pub fn evict(&mut self, eviction: &Eviction) -> bool {
        let due = self.jobs.get(&eviction.job_id).is_some_and(|job| {
            job.generation == eviction.generation && job.view.status == JobStatus::Completed
        });
        if due {
            self.jobs.remove(&eviction.job_id);
        }
        due
    }

    /// View of one job.
    pub fn get(&self, job_id: &str) -> Option<&JobView> {
        self.jobs.get(job_id).map(|job| &job.view)
    }

    /// Every view, ordered by job id.
    pub fn views(&self) -> Vec<JobView> {
        self.jobs.values().map(|job| job.view.clone()).collect()
    }

    /// Number of tracked jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether no jobs are tracked.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Progress reported by a record: `progress`, else `percentage`.
fn progress_of(record: &LogRecord) -> Option<f64> {
    record
        .field("progress")
        .or_else(|| record.field("percentage"))
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|p| p.is_finite())
}

/// Shared, timer-driven wrapper around a [`JobProjection`].
#[derive(Debug, Clone)]
pub struct JobTracker {
    projection: Arc<Mutex<JobProjection>>,
    grace: Duration,
}

impl JobTracker {
    /// Create a tracker evicting completed jobs after `grace`.
    pub fn new(projection: JobProjection, grace: Duration) -> Self {
        Self {
            projection: Arc::new(Mutex::new(projection)),
            grace,
        }
    }

    /// Apply a record and, on completion, start its eviction timer. The
    /// grace period is measured from now, not from the event's time.
    pub async fn apply(&self, record: &LogRecord) {
        let eviction = self.projection.lock().await.apply(record);
        if let Some(eviction) = eviction {
            self.schedule(eviction);
        }
    }

    fn schedule(&self, eviction: Eviction) {
        let projection = Arc::clone(&self.projection);
        let grace = self.grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if projection.lock().await.evict(&eviction) {
                debug!(job_id = %eviction.job_id, "Evicted completed job");
            }
        });
    }

    /// Every current view.
    pub async fn views(&self) -> Vec<JobView> {
        self.projection.lock().await.views()
    }

    /// One job's view.
    pub async fn get(&self, job_id: &str) -> Option<JobView> {
        self.projection.lock().await.get(job_id).cloned()
    }
}

#[async_trait]
impl RecordListener for JobTracker {
    async fn on_record(&self, record: &LogRecord) {
        self.apply(record).await;
    }
}
