use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Server-assigned job identifier.
pub type JobId = u64;

pub const DEFAULT_PRIORITY: u32 = 0;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(0);
pub const DEFAULT_TTR: Duration = Duration::from_secs(30);

/// A job handed out by `reserve-with-timeout`. The payload is never inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedJob {
    pub id: JobId,
    pub payload: Vec<u8>,
}

/// Everything needed to enqueue one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    pub payload: Vec<u8>,
    pub priority: u32,
    pub delay: Duration,
    pub ttr: Duration,
}

impl PutRequest {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            priority: DEFAULT_PRIORITY,
            delay: DEFAULT_DELAY,
            ttr: DEFAULT_TTR,
        }
    }
}

/// Result of a successful put, echoing the effective parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PutReceipt {
    pub tube: String,
    pub id: JobId,
    pub priority: u32,
    pub delay_secs: u64,
    pub ttr_secs: u64,
}

impl fmt::Display for PutReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Job was put to tube {} with pri={}, delay={}s, ttr={}s. Job ID: {}",
            self.tube, self.priority, self.delay_secs, self.ttr_secs, self.id
        )
    }
}
