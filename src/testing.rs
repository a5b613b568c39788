//! In-memory queue server used by unit tests.

use crate::connection::QueueClient;
use crate::error::ProtocolError;
use crate::models::{JobId, PutRequest, ReservedJob};
use crate::stats::StatsReport;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct FakeQueue {
    pub ready: BTreeMap<String, VecDeque<ReservedJob>>,
    pub tube_stats: BTreeMap<String, StatsReport>,
    pub server_stats: StatsReport,
    /// Ids the server knows about; deleting anything else is NOT_FOUND.
    pub existing: HashSet<JobId>,
    /// Jobs whose delete is refused even though they exist.
    pub undeletable: HashSet<JobId>,
    pub kickable: u64,
    pub next_id: JobId,
    pub fail_put: bool,
    pub fail_list: bool,
    pub deleted: Vec<JobId>,
    pub puts: Vec<(String, PutRequest)>,
    /// Every call, in order, e.g. `kick jobs 5`.
    pub calls: Vec<String>,
}

impl FakeQueue {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    pub fn with_ready(mut self, tube: &str, ids: &[JobId]) -> Self {
        let jobs = self.ready.entry(tube.to_string()).or_default();
        for &id in ids {
            self.existing.insert(id);
            jobs.push_back(ReservedJob {
                id,
                payload: format!("job-{id}").into_bytes(),
            });
        }
        self
    }
}

impl QueueClient for FakeQueue {
    async fn stats(&mut self) -> Result<StatsReport, ProtocolError> {
        self.calls.push("stats".to_string());
        Ok(self.server_stats.clone())
    }

    async fn list_tubes(&mut self) -> Result<Vec<String>, ProtocolError> {
        self.calls.push("list-tubes".to_string());
        if self.fail_list {
            return Err(ProtocolError::InternalError { op: "list-tubes" });
        }
        let mut tubes: Vec<String> = self.ready.keys().cloned().collect();
        if tubes.is_empty() {
            tubes.push("default".to_string());
        }
        Ok(tubes)
    }

    async fn delete(&mut self, id: JobId) -> Result<(), ProtocolError> {
        self.calls.push(format!("delete {id}"));
        if self.undeletable.contains(&id) || !self.existing.remove(&id) {
            return Err(ProtocolError::NotFound { op: "delete" });
        }
        self.deleted.push(id);
        Ok(())
    }

    async fn tube_stats(&mut self, tube: &str) -> Result<StatsReport, ProtocolError> {
        self.calls.push(format!("stats-tube {tube}"));
        self.tube_stats
            .get(tube)
            .cloned()
            .ok_or(ProtocolError::NotFound { op: "stats-tube" })
    }

    async fn kick(&mut self, tube: &str, bound: u64) -> Result<u64, ProtocolError> {
        self.calls.push(format!("kick {tube} {bound}"));
        let n = bound.min(self.kickable);
        self.kickable -= n;
        Ok(n)
    }

    async fn put(&mut self, tube: &str, job: &PutRequest) -> Result<JobId, ProtocolError> {
        self.calls.push(format!("put {tube}"));
        if self.fail_put {
            return Err(ProtocolError::JobTooBig { op: "put" });
        }
        let id = self.next_id;
        self.next_id += 1;
        self.existing.insert(id);
        self.puts.push((tube.to_string(), job.clone()));
        Ok(id)
    }

    async fn reserve_with_timeout(
        &mut self,
        tubes: &[&str],
        timeout: Duration,
    ) -> Result<ReservedJob, ProtocolError> {
        self.calls
            .push(format!("reserve {} {}", tubes.join(","), timeout.as_secs()));
        for tube in tubes {
            if let Some(job) = self.ready.get_mut(*tube).and_then(VecDeque::pop_front) {
                return Ok(job);
            }
        }
        Err(ProtocolError::TimedOut {
            op: "reserve-with-timeout",
        })
    }
}
