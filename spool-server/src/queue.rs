//! Durable print queue
//!
//! Single source of truth for "what must be printed". Jobs live in three
//! places: the FIFO `pending` list, at most one `in_flight` job (claimed by
//! the worker), and a bounded cache of the most recently completed jobs.
//!
//! Every mutation is persisted synchronously to `queue.json` before the call
//! returns; if the write fails, the in-memory state is rolled back so the
//! queue never claims success for state the disk does not reflect. On load,
//! a job persisted as PROCESSING (unclean shutdown) is reset to ERROR - its
//! partial transport writes cannot be proven safe to retry.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Completed-job cache capacity; oldest entries are evicted first
pub const RECENT_CAPACITY: usize = 10;

const QUEUE_FILE: &str = "queue.json";
const JOBS_SUBDIR: &str = "jobs";

/// What kind of payload a job carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Image,
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Printed,
    Error,
}

/// A queued print job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: Uuid,
    pub kind: SourceKind,
    pub origin_client: String,
    pub original_filename: String,
    pub created_at: DateTime<Utc>,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Temporary input file, deleted by the worker after processing
    pub payload_path: PathBuf,
}

/// Read-only job view exposed to the status endpoints
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub kind: SourceKind,
    pub origin_client: String,
    pub original_filename: String,
    pub created_at: DateTime<Utc>,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&PrintJob> for JobSummary {
    fn from(job: &PrintJob) -> Self {
        Self {
            id: job.id,
            kind: job.kind,
            origin_client: job.origin_client.clone(),
            original_filename: job.original_filename.clone(),
            created_at: job.created_at,
            state: job.state,
            error_message: job.error_message.clone(),
        }
    }
}

/// Consistent point-in-time view of the queue
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub pending_count: usize,
    pub pending: Vec<JobSummary>,
    pub recent_completed: Vec<JobSummary>,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue persistence failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Queue serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Persisted queue state is corrupt: {0}")]
    Corrupt(String),

    #[error("Unknown job: {0}")]
    UnknownJob(Uuid),
}

pub type QueueResult<T> = Result<T, QueueError>;

/// On-disk representation. Unknown fields are ignored on load so newer
/// versions can extend the format without breaking older state files.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default)]
    pending: Vec<PrintJob>,
    #[serde(default)]
    in_flight: Option<PrintJob>,
    #[serde(default)]
    recent: Vec<PrintJob>,
}

#[derive(Debug, Clone, Default)]
struct QueueInner {
    pending: VecDeque<PrintJob>,
    in_flight: Option<PrintJob>,
    recent: VecDeque<PrintJob>,
}

impl QueueInner {
    fn push_recent(&mut self, job: PrintJob) {
        // Newest first; evict the oldest once over capacity
        self.recent.push_front(job);
        self.recent.truncate(RECENT_CAPACITY);
    }
}

/// Durable, thread-safe print queue
pub struct PrintQueue {
    inner: Mutex<QueueInner>,
    store_path: PathBuf,
    jobs_dir: PathBuf,
}

impl PrintQueue {
    /// Open the queue, loading persisted state from `dir/queue.json`
    ///
    /// Corrupt state is a hard error: discarding it silently could drop or
    /// duplicate queued work. Delete the state file manually to recover.
    pub fn open(dir: impl AsRef<Path>) -> QueueResult<Self> {
        let dir = dir.as_ref();
        let jobs_dir = dir.join(JOBS_SUBDIR);
        std::fs::create_dir_all(&jobs_dir)?;

        let store_path = dir.join(QUEUE_FILE);
        let mut inner = QueueInner::default();

        if store_path.exists() {
            let bytes = std::fs::read(&store_path)?;
            let persisted: PersistedState = serde_json::from_slice(&bytes)
                .map_err(|e| QueueError::Corrupt(format!("{}: {}", store_path.display(), e)))?;

            // A job that was in flight during an unclean shutdown is never
            // resumed: part of it may already be on paper.
            if let Some(mut job) = persisted.in_flight {
                tracing::warn!(job_id = %job.id, "resetting interrupted job to error");
                job.state = JobState::Error;
                job.error_message =
                    Some("processing interrupted by unclean shutdown".to_string());
                inner.push_recent(job);
            }

            for mut job in persisted.pending {
                if job.state == JobState::Processing {
                    tracing::warn!(job_id = %job.id, "resetting interrupted job to error");
                    job.state = JobState::Error;
                    job.error_message =
                        Some("processing interrupted by unclean shutdown".to_string());
                    inner.push_recent(job);
                } else {
                    inner.pending.push_back(job);
                }
            }

            for job in persisted.recent {
                inner.recent.push_back(job);
            }
            inner.recent.truncate(RECENT_CAPACITY);
        }

        // Make the recovery normalization durable immediately
        persist(&store_path, &inner)?;

        Ok(Self {
            inner: Mutex::new(inner),
            store_path,
            jobs_dir,
        })
    }

    /// Directory where job payload files are stored
    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    /// Create a PENDING job and append it to the queue
    ///
    /// Never blocks on printer availability.
    pub fn enqueue(
        &self,
        kind: SourceKind,
        origin_client: impl Into<String>,
        original_filename: impl Into<String>,
        payload_path: impl Into<PathBuf>,
    ) -> QueueResult<Uuid> {
        let job = PrintJob {
            id: Uuid::new_v4(),
            kind,
            origin_client: origin_client.into(),
            original_filename: original_filename.into(),
            created_at: Utc::now(),
            state: JobState::Pending,
            error_message: None,
            payload_path: payload_path.into(),
        };
        let id = job.id;

        self.mutate(move |inner| inner.pending.push_back(job))?;
        Ok(id)
    }

    /// Atomically claim the head of the queue, transitioning it to PROCESSING
    ///
    /// Returns `None` when the queue is empty or a job is already in flight;
    /// at most one job is ever PROCESSING system-wide.
    pub fn claim_next(&self) -> QueueResult<Option<PrintJob>> {
        let mut inner = self.inner.lock();
        if inner.in_flight.is_some() {
            return Ok(None);
        }
        let backup = inner.clone();
        let Some(mut job) = inner.pending.pop_front() else {
            return Ok(None);
        };
        job.state = JobState::Processing;
        inner.in_flight = Some(job.clone());

        if let Err(e) = persist(&self.store_path, &inner) {
            *inner = backup;
            // The popped job goes back to the head: persistence failed, so
            // the claim never happened.
            return Err(e);
        }
        Ok(Some(job))
    }

    /// Transition the in-flight job to PRINTED
    pub fn mark_printed(&self, job_id: Uuid) -> QueueResult<()> {
        self.complete(job_id, JobState::Printed, None)
    }

    /// Transition the in-flight job to ERROR with a message
    pub fn mark_error(&self, job_id: Uuid, message: impl Into<String>) -> QueueResult<()> {
        self.complete(job_id, JobState::Error, Some(message.into()))
    }

    fn complete(
        &self,
        job_id: Uuid,
        state: JobState,
        error_message: Option<String>,
    ) -> QueueResult<()> {
        self.mutate_checked(move |inner| {
            let claimed = inner
                .in_flight
                .as_ref()
                .filter(|j| j.id == job_id)
                .ok_or(QueueError::UnknownJob(job_id))?;

            let mut job = claimed.clone();
            job.state = state;
            job.error_message = error_message;

            inner.in_flight = None;
            inner.push_recent(job);
            Ok(())
        })
    }

    /// Consistent point-in-time snapshot for status reporting
    pub fn snapshot(&self) -> QueueSnapshot {
        let inner = self.inner.lock();
        let mut pending: Vec<JobSummary> = Vec::with_capacity(inner.pending.len() + 1);
        if let Some(job) = &inner.in_flight {
            pending.push(job.into());
        }
        pending.extend(inner.pending.iter().map(JobSummary::from));

        QueueSnapshot {
            pending_count: pending.len(),
            pending,
            recent_completed: inner.recent.iter().map(JobSummary::from).collect(),
        }
    }

    /// Apply a mutation, persist, and roll back in-memory state if the
    /// persistence write fails
    fn mutate(&self, f: impl FnOnce(&mut QueueInner)) -> QueueResult<()> {
        self.mutate_checked(|inner| {
            f(inner);
            Ok(())
        })
    }

    fn mutate_checked(
        &self,
        f: impl FnOnce(&mut QueueInner) -> QueueResult<()>,
    ) -> QueueResult<()> {
        let mut inner = self.inner.lock();
        let backup = inner.clone();

        if let Err(e) = f(&mut inner) {
            *inner = backup;
            return Err(e);
        }
        if let Err(e) = persist(&self.store_path, &inner) {
            *inner = backup;
            return Err(e);
        }
        Ok(())
    }
}

/// Serialize the full queue state and swap it into place atomically
fn persist(store_path: &Path, inner: &QueueInner) -> QueueResult<()> {
    let state = PersistedState {
        pending: inner.pending.iter().cloned().collect(),
        in_flight: inner.in_flight.clone(),
        recent: inner.recent.iter().cloned().collect(),
    };
    let bytes = serde_json::to_vec_pretty(&state)?;

    let tmp_path = store_path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &bytes)?;
    std::fs::rename(&tmp_path, store_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_queue(dir: &Path) -> PrintQueue {
        PrintQueue::open(dir).unwrap()
    }

    fn enqueue_named(queue: &PrintQueue, name: &str) -> Uuid {
        queue
            .enqueue(SourceKind::Image, "127.0.0.1", name, format!("/tmp/{name}"))
            .unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open_queue(dir.path());

        let a = enqueue_named(&queue, "a.png");
        let b = enqueue_named(&queue, "b.png");
        let c = enqueue_named(&queue, "c.png");

        for expected in [a, b, c] {
            let job = queue.claim_next().unwrap().unwrap();
            assert_eq!(job.id, expected);
            assert_eq!(job.state, JobState::Processing);
            queue.mark_printed(job.id).unwrap();
        }
        assert!(queue.claim_next().unwrap().is_none());
    }

    #[test]
    fn test_at_most_one_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open_queue(dir.path());

        enqueue_named(&queue, "a.png");
        enqueue_named(&queue, "b.png");

        let first = queue.claim_next().unwrap().unwrap();
        // Second claim while a job is in flight must yield nothing
        assert!(queue.claim_next().unwrap().is_none());

        queue.mark_printed(first.id).unwrap();
        assert!(queue.claim_next().unwrap().is_some());
    }

    #[test]
    fn test_mark_unknown_job() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open_queue(dir.path());

        let result = queue.mark_printed(Uuid::new_v4());
        assert!(matches!(result, Err(QueueError::UnknownJob(_))));
    }

    #[test]
    fn test_recent_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open_queue(dir.path());

        let mut ids = Vec::new();
        for i in 0..11 {
            ids.push(enqueue_named(&queue, &format!("job{i}.png")));
        }
        for _ in 0..11 {
            let job = queue.claim_next().unwrap().unwrap();
            queue.mark_printed(job.id).unwrap();
        }

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.recent_completed.len(), RECENT_CAPACITY);
        // The first completed job was evicted; the rest remain, newest first
        assert!(!snapshot.recent_completed.iter().any(|j| j.id == ids[0]));
        assert_eq!(snapshot.recent_completed[0].id, ids[10]);
    }

    #[test]
    fn test_snapshot_includes_in_flight_as_pending_work() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open_queue(dir.path());

        enqueue_named(&queue, "a.png");
        enqueue_named(&queue, "b.png");
        let job = queue.claim_next().unwrap().unwrap();

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.pending_count, 2);
        assert_eq!(snapshot.pending[0].id, job.id);
        assert_eq!(snapshot.pending[0].state, JobState::Processing);
    }

    #[test]
    fn test_error_message_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open_queue(dir.path());

        enqueue_named(&queue, "bad.pdf");
        let job = queue.claim_next().unwrap().unwrap();
        queue.mark_error(job.id, "transport failed: offline").unwrap();

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.recent_completed[0].state, JobState::Error);
        assert_eq!(
            snapshot.recent_completed[0].error_message.as_deref(),
            Some("transport failed: offline")
        );
    }

    #[test]
    fn test_corrupt_state_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("queue.json"), b"{not json").unwrap();

        let result = PrintQueue::open(dir.path());
        assert!(matches!(result, Err(QueueError::Corrupt(_))));
    }
}
