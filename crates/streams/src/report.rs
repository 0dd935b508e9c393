//! Run report module
//!
//! Collects the final outcome of every stream job. The report decides the
//! process exit status and can be written out as JSON.

use crate::stream_job::{FailureKind, JobError, JobState, JobStats, StreamJob};
use crate::stream_spec::StreamSpec;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Final outcome of one stream job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobOutcome {
    pub spec: StreamSpec,
    pub state: JobState,
    pub failure: Option<FailureKind>,
    pub attempts: u32,
    pub stats: JobStats,
}

impl JobOutcome {
    /// Build the outcome of a finished job and log it.
    ///
    /// `error` is the job's terminal error, if it failed.
    pub fn from_job(mut job: StreamJob, error: Option<JobError>) -> Self {
        let failure = error.as_ref().map(|e| {
            job.fail(e);
            e.kind()
        });

        let outcome = Self {
            spec: job.spec,
            state: job.state,
            failure,
            attempts: job.attempts,
            stats: job.stats,
        };
        outcome.log();
        outcome
    }

    /// Outcome for a job whose worker died before returning it.
    pub fn panicked(spec: StreamSpec, attempts: u32, message: String) -> Self {
        let error = JobError::Panicked(message);
        let outcome = Self {
            spec,
            state: JobState::Failed(error.to_string()),
            failure: Some(error.kind()),
            attempts,
            stats: JobStats::default(),
        };
        outcome.log();
        outcome
    }

    pub fn is_completed(&self) -> bool {
        self.state == JobState::Completed
    }

    fn log(&self) {
        match &self.state {
            JobState::Failed(reason) => warn!(
                spec = %self.spec,
                attempts = self.attempts,
                "stream failed: {}",
                reason
            ),
            state => info!(
                spec = %self.spec,
                state = state.as_str(),
                samples_read = self.stats.samples_read,
                samples_written = self.stats.samples_written,
                "stream finished"
            ),
        }
    }
}

/// Outcomes of a whole run, stdin job first, then file jobs in spec order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<JobOutcome>,
}

impl RunReport {
    pub fn new(outcomes: Vec<JobOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed()
    }

    /// True when no job ended in failure.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report as pretty JSON.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)
    }
}
