use serde::{Deserialize, Serialize};

use crate::app::worker_loop::WorkerExit;

/// Per-worker counters, logged when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub received: u64,
    pub processed: u64,
    pub rejected: u64,
    pub ack_failures: u64,
    pub receive_failures: u64,
}

/// What a worker task hands back to the pool when it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub exit: WorkerExit,
    pub stats: WorkerStats,
}
