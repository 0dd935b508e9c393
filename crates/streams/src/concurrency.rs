//! Concurrency planning module
//!
//! Derives the parallel-mode worker pool size from configuration, CPU core
//! count, and the number of jobs to run.

use crate::config::Config;

/// Worker pool plan for parallel mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolPlan {
    /// Total logical CPU cores available
    pub total_cores: u32,
    /// Number of jobs that may stream at the same time
    pub workers: usize,
}

impl PoolPlan {
    /// Derive a pool plan from configuration
    ///
    /// Uses the following rules:
    /// - An explicit non-zero `pool.workers` wins
    /// - Otherwise one worker per logical CPU (detected via num_cpus)
    /// - Never more workers than jobs, never fewer than one
    pub fn derive(cfg: &Config, job_count: usize) -> Self {
        let total_cores = num_cpus::get() as u32;
        Self::derive_with_cores(cfg, job_count, total_cores)
    }

    fn derive_with_cores(cfg: &Config, job_count: usize, total_cores: u32) -> Self {
        let requested = if cfg.pool.workers > 0 {
            cfg.pool.workers
        } else {
            total_cores
        };

        Self {
            total_cores,
            workers: clamp_workers(requested as usize, job_count),
        }
    }
}

/// Clamp a worker count to [1, max(job_count, 1)]
fn clamp_workers(requested: usize, job_count: usize) -> usize {
    requested.clamp(1, job_count.max(1))
}
