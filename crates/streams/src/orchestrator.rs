//! Orchestrator for file-backed stream jobs
//!
//! Runs every job either on a bounded worker pool (parallel mode) or one at a
//! time in retry rounds (sequential mode). Only sequential mode retries jobs
//! whose input file does not exist yet; in parallel mode a missing input is a
//! terminal failure for that job.

use crate::concurrency::PoolPlan;
use crate::config::Config;
use crate::report::JobOutcome;
use crate::stream_job::{JobError, JobStats, StreamJob};
use crate::stream_spec::{InputDescriptor, StreamSpec};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, info};

/// Default head start given to producers before the first attempt
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_millis(10);
/// Default fixed pause between sequential rounds
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);
/// Default number of sequential rounds
pub const DEFAULT_MAX_ROUNDS: u32 = 5;

/// How file-backed jobs are executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Round-robin with retry on missing inputs
    #[default]
    Sequential,
    /// Bounded worker pool, one attempt per job
    Parallel,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &str {
        match self {
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::Parallel => "parallel",
        }
    }
}

/// Startup delay and retry-round timing
///
/// The startup delay is a best-effort head start for external producers, not
/// a guarantee that inputs exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub startup_delay: Duration,
    pub retry_interval: Duration,
    /// Always at least 1
    pub max_rounds: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            startup_delay: DEFAULT_STARTUP_DELAY,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            startup_delay: Duration::from_millis(cfg.retry.startup_delay_ms),
            retry_interval: Duration::from_millis(cfg.retry.retry_interval_ms),
            max_rounds: cfg.retry.max_rounds.max(1),
        }
    }
}

/// Runs one job attempt on a blocking worker
type JobRunner = fn(StreamJob) -> (StreamJob, Result<JobStats, JobError>);

/// Executes file-backed stream jobs
#[derive(Debug, Clone)]
pub struct Orchestrator {
    mode: ExecutionMode,
    policy: RetryPolicy,
    /// Pool size in parallel mode
    workers: usize,
    resum_interval: u64,
    runner: JobRunner,
}

impl Orchestrator {
    pub fn new(mode: ExecutionMode, policy: RetryPolicy, workers: usize) -> Self {
        Self {
            mode,
            policy,
            workers: workers.max(1),
            resum_interval: 0,
            runner: run_job,
        }
    }

    /// Build an orchestrator for `job_count` jobs from loaded configuration.
    pub fn from_config(cfg: &Config, mode: ExecutionMode, job_count: usize) -> Self {
        let plan = PoolPlan::derive(cfg, job_count);
        Self::new(mode, RetryPolicy::from_config(cfg), plan.workers)
            .with_resum_interval(cfg.engine.resum_interval)
    }

    pub fn with_resum_interval(mut self, resum_interval: u64) -> Self {
        self.resum_interval = resum_interval;
        self
    }

    #[cfg(test)]
    fn with_runner(mut self, runner: JobRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every job and return their outcomes in spec order.
    pub async fn run(&self, specs: Vec<StreamSpec>) -> Vec<JobOutcome> {
        if specs.is_empty() {
            return Vec::new();
        }

        info!(
            mode = self.mode.as_str(),
            jobs = specs.len(),
            workers = self.workers,
            "dispatching file streams"
        );

        if !self.policy.startup_delay.is_zero() {
            tokio::time::sleep(self.policy.startup_delay).await;
        }

        match self.mode {
            ExecutionMode::Parallel => self.run_parallel(specs).await,
            ExecutionMode::Sequential => self.run_sequential(specs).await,
        }
    }

    /// One blocking task per job, at most `workers` streaming at once.
    async fn run_parallel(&self, specs: Vec<StreamSpec>) -> Vec<JobOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let runner = self.runner;
        let mut handles = Vec::with_capacity(specs.len());

        for spec in specs {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("pool semaphore is never closed");
            let job = StreamJob::with_resum_interval(spec.clone(), self.resum_interval);
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                runner(job)
            });
            handles.push((spec, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (spec, handle) in handles {
            let outcome = match handle.await {
                Ok((job, result)) => JobOutcome::from_job(job, result.err()),
                Err(e) => JobOutcome::panicked(spec, 1, panic_message(e)),
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Round-robin over pending jobs, deferring those whose input is missing.
    async fn run_sequential(&self, specs: Vec<StreamSpec>) -> Vec<JobOutcome> {
        let max_rounds = self.policy.max_rounds.max(1);
        let runner = self.runner;
        let mut finished: Vec<(usize, JobOutcome)> = Vec::with_capacity(specs.len());
        let mut pending: Vec<(usize, StreamJob)> = specs
            .into_iter()
            .map(|spec| StreamJob::with_resum_interval(spec, self.resum_interval))
            .enumerate()
            .collect();

        for round in 1..=max_rounds {
            let mut deferred = Vec::new();

            for (idx, job) in pending {
                let spec = job.spec.clone();
                let attempts = job.attempts + 1;

                match tokio::task::spawn_blocking(move || runner(job)).await {
                    Ok((job, Err(e))) if e.is_retryable() => {
                        debug!(spec = %job.spec, round, "input not available yet");
                        deferred.push((idx, job));
                    }
                    Ok((job, result)) => finished.push((idx, JobOutcome::from_job(job, result.err()))),
                    Err(e) => finished.push((idx, JobOutcome::panicked(spec, attempts, panic_message(e)))),
                }
            }

            pending = deferred;
            if pending.is_empty() {
                break;
            }
            if round < max_rounds {
                info!(
                    round,
                    pending = pending.len(),
                    "inputs missing, retrying in {:?}",
                    self.policy.retry_interval
                );
                tokio::time::sleep(self.policy.retry_interval).await;
            }
        }

        for (idx, job) in pending {
            let error = JobError::RetryBudgetExhausted {
                path: input_path(&job.spec),
                rounds: max_rounds,
            };
            finished.push((idx, JobOutcome::from_job(job, Some(error))));
        }

        finished.sort_by_key(|(idx, _)| *idx);
        finished.into_iter().map(|(_, outcome)| outcome).collect()
    }
}

fn run_job(mut job: StreamJob) -> (StreamJob, Result<JobStats, JobError>) {
    let result = job.run();
    (job, result)
}

fn input_path(spec: &StreamSpec) -> PathBuf {
    match &spec.input {
        InputDescriptor::File(path) => path.clone(),
        InputDescriptor::Stdin => PathBuf::from(crate::stream_spec::STDIO_MARKER),
    }
}

/// Extract the panic payload of a failed blocking task.
fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{write_sample, Samples};
    use crate::stream_job::FailureKind;
    use crate::stream_spec::OutputDescriptor;
    use std::io::Cursor;
    use std::num::NonZeroUsize;
    use std::path::Path;
    use std::time::Instant;
    use tempfile::TempDir;

    fn encode(values: &[f64]) -> Vec<u8> {
        let mut buf = Vec::new();
        for v in values {
            write_sample(&mut buf, *v).unwrap();
        }
        buf
    }

    fn read_output(path: &Path) -> Vec<f64> {
        let bytes = std::fs::read(path).unwrap();
        Samples::new(Cursor::new(bytes))
            .collect::<std::io::Result<_>>()
            .unwrap()
    }

    fn file_spec(window: usize, input: &Path, output: &Path) -> StreamSpec {
        StreamSpec::new(
            NonZeroUsize::new(window).unwrap(),
            InputDescriptor::File(input.to_path_buf()),
            OutputDescriptor::File(output.to_path_buf()),
        )
    }

    fn policy(retry_ms: u64, max_rounds: u32) -> RetryPolicy {
        RetryPolicy {
            startup_delay: Duration::ZERO,
            retry_interval: Duration::from_millis(retry_ms),
            max_rounds,
        }
    }

    /// Write via a temporary name so readers never see a half-written file
    fn publish(path: &Path, bytes: &[u8]) {
        let tmp = path.with_extension("partial");
        std::fs::write(&tmp, bytes).unwrap();
        std::fs::rename(&tmp, path).unwrap();
    }

    #[test]
    fn test_retry_policy_from_config() {
        let mut cfg = Config::default();
        assert_eq!(RetryPolicy::from_config(&cfg), RetryPolicy::default());

        cfg.retry.max_rounds = 0;
        cfg.retry.retry_interval_ms = 7;
        let policy = RetryPolicy::from_config(&cfg);
        assert_eq!(policy.max_rounds, 1);
        assert_eq!(policy.retry_interval, Duration::from_millis(7));
    }

    #[test]
    fn test_default_mode_is_sequential() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::Sequential);
        assert_eq!(ExecutionMode::Parallel.as_str(), "parallel");
    }

    #[tokio::test]
    async fn test_no_jobs_returns_immediately() {
        let orchestrator = Orchestrator::new(ExecutionMode::Sequential, RetryPolicy::default(), 4);
        assert!(orchestrator.run(Vec::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_sequential_completes_jobs_in_order() {
        let dir = TempDir::new().unwrap();
        let in_a = dir.path().join("a.bin");
        let in_b = dir.path().join("b.bin");
        let out_a = dir.path().join("a.out");
        let out_b = dir.path().join("b.out");
        std::fs::write(&in_a, encode(&[1.0, 2.0, 3.0, 4.0, 5.0])).unwrap();
        std::fs::write(&in_b, encode(&[10.0])).unwrap();

        let orchestrator = Orchestrator::new(ExecutionMode::Sequential, policy(10, 5), 1);
        let outcomes = orchestrator
            .run(vec![file_spec(3, &in_a, &out_a), file_spec(3, &in_b, &out_b)])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.is_completed()));
        assert_eq!(outcomes[0].spec.input, InputDescriptor::File(in_a));
        assert_eq!(read_output(&out_a), vec![2.0, 3.0, 4.0]);
        assert!(read_output(&out_b).is_empty());
    }

    #[tokio::test]
    async fn test_sequential_picks_up_late_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("late.bin");
        let output = dir.path().join("late.out");

        let producer_path = input.clone();
        let producer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            publish(&producer_path, &encode(&[2.0, 4.0, 6.0]));
        });

        let orchestrator = Orchestrator::new(ExecutionMode::Sequential, policy(60, 5), 1);
        let outcomes = orchestrator.run(vec![file_spec(2, &input, &output)]).await;
        producer.await.unwrap();

        assert!(outcomes[0].is_completed(), "outcome: {:?}", outcomes[0]);
        assert!(outcomes[0].attempts >= 2);
        assert_eq!(read_output(&output), vec![3.0, 5.0]);
    }

    #[tokio::test]
    async fn test_sequential_fails_only_after_all_rounds() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("never.bin");
        let output = dir.path().join("never.out");

        let orchestrator = Orchestrator::new(ExecutionMode::Sequential, policy(40, 3), 1);
        let start = Instant::now();
        let outcomes = orchestrator.run(vec![file_spec(2, &input, &output)]).await;
        let elapsed = start.elapsed();

        assert_eq!(outcomes[0].failure, Some(FailureKind::RetryBudgetExhausted));
        assert_eq!(outcomes[0].attempts, 3);
        // two pauses between three rounds
        assert!(elapsed >= Duration::from_millis(80), "elapsed {:?}", elapsed);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_sequential_does_not_retry_other_errors() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.bin");
        std::fs::write(&input, encode(&[1.0])).unwrap();
        let output = dir.path().join("missing-dir").join("out.bin");

        let orchestrator = Orchestrator::new(ExecutionMode::Sequential, policy(10, 5), 1);
        let outcomes = orchestrator.run(vec![file_spec(1, &input, &output)]).await;

        assert_eq!(outcomes[0].failure, Some(FailureKind::Io));
        assert_eq!(outcomes[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_parallel_missing_input_fails_without_retry() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("present.bin");
        let missing = dir.path().join("missing.bin");
        let out_present = dir.path().join("present.out");
        let out_missing = dir.path().join("missing.out");
        std::fs::write(&present, encode(&[1.0, 3.0])).unwrap();

        let orchestrator = Orchestrator::new(ExecutionMode::Parallel, policy(1_000, 5), 2);
        let start = Instant::now();
        let outcomes = orchestrator
            .run(vec![
                file_spec(2, &missing, &out_missing),
                file_spec(2, &present, &out_present),
            ])
            .await;

        assert!(start.elapsed() < Duration::from_millis(1_000));
        assert_eq!(outcomes[0].failure, Some(FailureKind::InputNotFound));
        assert_eq!(outcomes[0].attempts, 1);
        assert!(outcomes[1].is_completed());
        assert_eq!(read_output(&out_present), vec![2.0]);
    }

    #[tokio::test]
    async fn test_parallel_runs_more_jobs_than_workers() {
        let dir = TempDir::new().unwrap();
        let mut specs = Vec::new();
        for i in 0..6 {
            let input = dir.path().join(format!("{i}.bin"));
            std::fs::write(&input, encode(&[i as f64, i as f64 + 2.0])).unwrap();
            specs.push(file_spec(2, &input, &dir.path().join(format!("{i}.out"))));
        }

        let orchestrator = Orchestrator::new(ExecutionMode::Parallel, policy(10, 1), 2);
        let outcomes = orchestrator.run(specs).await;

        assert_eq!(outcomes.len(), 6);
        for (i, outcome) in outcomes.iter().enumerate() {
            assert!(outcome.is_completed());
            let out = dir.path().join(format!("{i}.out"));
            assert_eq!(read_output(&out), vec![i as f64 + 1.0]);
        }
    }

    /// Crashes the worker for any existing input whose name starts with "crash"
    fn crash_on_marked_input(job: StreamJob) -> (StreamJob, Result<JobStats, JobError>) {
        if let InputDescriptor::File(path) = &job.spec.input {
            let marked = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("crash"));
            if marked && path.exists() {
                panic!("worker crashed on {}", path.display());
            }
        }
        run_job(job)
    }

    #[tokio::test]
    async fn test_parallel_panic_is_isolated_to_its_job() {
        let dir = TempDir::new().unwrap();
        let mut specs = Vec::new();
        for name in ["a", "crash", "b", "c"] {
            let input = dir.path().join(format!("{name}.bin"));
            std::fs::write(&input, encode(&[1.0, 3.0])).unwrap();
            specs.push(file_spec(2, &input, &dir.path().join(format!("{name}.out"))));
        }

        let orchestrator = Orchestrator::new(ExecutionMode::Parallel, policy(10, 1), 2)
            .with_runner(crash_on_marked_input);
        let outcomes = orchestrator.run(specs).await;

        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[1].failure, Some(FailureKind::Panicked));
        assert_eq!(outcomes[1].attempts, 1);
        assert_eq!(outcomes[1].state.as_str(), "failed");
        for i in [0, 2, 3] {
            assert!(outcomes[i].is_completed(), "outcome {i}: {:?}", outcomes[i]);
        }
        for name in ["a", "b", "c"] {
            assert_eq!(read_output(&dir.path().join(format!("{name}.out"))), vec![2.0]);
        }
    }

    #[tokio::test]
    async fn test_sequential_panic_is_isolated_to_its_job() {
        let dir = TempDir::new().unwrap();
        let in_a = dir.path().join("a.bin");
        let in_b = dir.path().join("b.bin");
        let crash = dir.path().join("crash-late.bin");
        std::fs::write(&in_a, encode(&[2.0, 4.0])).unwrap();
        std::fs::write(&in_b, encode(&[6.0, 8.0])).unwrap();

        // the crashing input shows up for the second round
        let producer_path = crash.clone();
        let producer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            publish(&producer_path, &encode(&[1.0]));
        });

        let orchestrator = Orchestrator::new(ExecutionMode::Sequential, policy(80, 5), 1)
            .with_runner(crash_on_marked_input);
        let outcomes = orchestrator
            .run(vec![
                file_spec(2, &in_a, &dir.path().join("a.out")),
                file_spec(1, &crash, &dir.path().join("crash.out")),
                file_spec(2, &in_b, &dir.path().join("b.out")),
            ])
            .await;
        producer.await.unwrap();

        assert_eq!(outcomes[1].failure, Some(FailureKind::Panicked));
        assert_eq!(outcomes[1].attempts, 2);
        assert!(outcomes[0].is_completed());
        assert!(outcomes[2].is_completed());
        assert_eq!(read_output(&dir.path().join("a.out")), vec![3.0]);
        assert_eq!(read_output(&dir.path().join("b.out")), vec![7.0]);
    }

    #[tokio::test]
    async fn test_huge_window_completes_without_output() {
        let dir = TempDir::new().unwrap();
        let in_small = dir.path().join("small.bin");
        let in_huge = dir.path().join("huge.bin");
        let out_small = dir.path().join("small.out");
        let out_huge = dir.path().join("huge.out");
        std::fs::write(&in_small, encode(&[5.0, 7.0])).unwrap();
        std::fs::write(&in_huge, encode(&[1.0, 2.0, 3.0])).unwrap();

        for mode in [ExecutionMode::Parallel, ExecutionMode::Sequential] {
            let orchestrator = Orchestrator::new(mode, policy(10, 1), 2);
            let outcomes = orchestrator
                .run(vec![
                    file_spec(1, &in_small, &out_small),
                    file_spec(usize::MAX / 2, &in_huge, &out_huge),
                ])
                .await;

            assert!(outcomes.iter().all(|o| o.is_completed()), "{mode:?}: {outcomes:?}");
            assert_eq!(outcomes[1].stats.samples_read, 3);
            assert_eq!(outcomes[1].stats.samples_written, 0);
            assert_eq!(read_output(&out_small), vec![5.0, 7.0]);
            assert!(read_output(&out_huge).is_empty());
        }
    }

    #[tokio::test]
    async fn test_panic_message_is_extracted() {
        let err = tokio::task::spawn_blocking(|| panic!("worker exploded"))
            .await
            .unwrap_err();
        assert_eq!(panic_message(err), "worker exploded");
    }

    #[test]
    fn test_from_config_clamps_workers_to_jobs() {
        let mut cfg = Config::default();
        cfg.pool.workers = 16;
        let orchestrator = Orchestrator::from_config(&cfg, ExecutionMode::Parallel, 3);
        assert_eq!(orchestrator.workers(), 3);
        assert_eq!(orchestrator.mode(), ExecutionMode::Parallel);
        assert_eq!(orchestrator.policy().max_rounds, 5);
    }
}
