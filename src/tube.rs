//! Tube administration: info, kick, delete, drain and put against one tube.
//!
//! A [`Tube`] is only a view: a name bound to a borrowed client. Every
//! operation is a short, bounded sequence of protocol round-trips.

use crate::connection::QueueClient;
use crate::error::ProtocolError;
use crate::models::{JobId, PutReceipt, PutRequest};
use crate::stats::StatsReport;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_KICK_BOUND: u64 = 100_000;

/// How long each drain iteration waits for the next job.
pub const DRAIN_RESERVE_TIMEOUT: Duration = Duration::from_secs(3);

pub struct Tube<'c, C> {
    name: String,
    client: &'c mut C,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KickOutcome {
    pub tube: String,
    pub kicked: u64,
}

impl fmt::Display for KickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} items kicked", self.kicked)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub id: JobId,
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job {} deleted", self.id)
    }
}

/// A reserved job the drain could not delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedJob {
    pub id: JobId,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrainOutcome {
    pub tube: String,
    pub deleted: u64,
    pub skipped: Vec<SkippedJob>,
}

/// Skipped jobs are reported as they happen, on the log; only the JSON form
/// lists them again.
impl fmt::Display for DrainOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} jobs deleted from {}", self.deleted, self.tube)
    }
}

enum DrainState {
    Draining,
    Deleting(JobId),
    Done,
}

impl<'c, C: QueueClient> Tube<'c, C> {
    pub fn new(client: &'c mut C, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tube statistics. A failed fetch yields an empty report; the failure
    /// is only logged.
    pub async fn info(&mut self) -> StatsReport {
        match self.client.tube_stats(&self.name).await {
            Ok(report) => report,
            Err(error) => {
                warn!(tube = %self.name, %error, "tube stats unavailable, showing empty report");
                StatsReport::new()
            }
        }
    }

    pub async fn kick(&mut self, bound: u64) -> Result<KickOutcome, ProtocolError> {
        let kicked = self.client.kick(&self.name, bound).await?;
        debug!(tube = %self.name, bound, kicked, "kicked jobs");
        Ok(KickOutcome {
            tube: self.name.clone(),
            kicked,
        })
    }

    pub async fn delete(&mut self, id: JobId) -> Result<DeleteOutcome, ProtocolError> {
        self.client.delete(id).await?;
        Ok(DeleteOutcome { id })
    }

    /// Reserve and delete jobs until a reservation fails. A timed-out (or
    /// otherwise failed) reserve is how an empty tube shows up, so it ends
    /// the drain rather than failing it. A failed delete skips that job.
    pub async fn drain(&mut self) -> DrainOutcome {
        let mut outcome = DrainOutcome {
            tube: self.name.clone(),
            deleted: 0,
            skipped: Vec::new(),
        };
        let mut state = DrainState::Draining;
        loop {
            state = match state {
                DrainState::Draining => {
                    match self
                        .client
                        .reserve_with_timeout(&[self.name.as_str()], DRAIN_RESERVE_TIMEOUT)
                        .await
                    {
                        Ok(job) => DrainState::Deleting(job.id),
                        Err(reason) => {
                            debug!(tube = %self.name, %reason, "drain finished");
                            DrainState::Done
                        }
                    }
                }
                DrainState::Deleting(id) => {
                    match self.client.delete(id).await {
                        Ok(()) => outcome.deleted += 1,
                        Err(error) => {
                            warn!(tube = %self.name, id, %error, "skipping job during drain");
                            outcome.skipped.push(SkippedJob {
                                id,
                                error: error.to_string(),
                            });
                        }
                    }
                    DrainState::Draining
                }
                DrainState::Done => break,
            };
        }
        outcome
    }

    pub async fn put(&mut self, request: &PutRequest) -> Result<PutReceipt, ProtocolError> {
        let id = self.client.put(&self.name, request).await?;
        Ok(PutReceipt {
            tube: self.name.clone(),
            id,
            priority: request.priority,
            delay_secs: request.delay.as_secs(),
            ttr_secs: request.ttr.as_secs(),
        })
    }
}
