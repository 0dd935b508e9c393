//! Pipeline entry point
//!
//! Parses the raw stream specs, runs the stdin stream first, then hands the
//! file-backed streams to the [`Orchestrator`].

use crate::config::Config;
use crate::orchestrator::{ExecutionMode, Orchestrator};
use crate::report::{JobOutcome, RunReport};
use crate::stdin_router::{route, run_stdin_job};
use crate::stream_spec::{parse_specs, SpecError, StreamSpec};
use thiserror::Error;

/// Error type for pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A spec was rejected; nothing ran
    #[error("Invalid stream spec: {0}")]
    Spec(#[from] SpecError),
}

/// A configured run over a set of stream specs
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub config: Config,
    pub mode: ExecutionMode,
}

impl Pipeline {
    pub fn new(config: Config, mode: ExecutionMode) -> Self {
        Self { config, mode }
    }

    /// Parse and validate every spec, then run them.
    ///
    /// Any malformed spec aborts before a single stream is opened.
    pub async fn run_raw<S: AsRef<str>>(&self, raw: &[S]) -> Result<RunReport, PipelineError> {
        let specs = parse_specs(raw)?;
        self.run(specs).await
    }

    /// Run already parsed specs.
    ///
    /// Job failures are collected in the report; only spec validation errors
    /// are returned as `Err`.
    pub async fn run(&self, specs: Vec<StreamSpec>) -> Result<RunReport, PipelineError> {
        let routed = route(specs)?;
        let mut outcomes = Vec::with_capacity(routed.files.len() + 1);

        if let Some(spec) = routed.stdin {
            outcomes.push(self.run_stdin(spec).await);
        }

        let orchestrator = Orchestrator::from_config(&self.config, self.mode, routed.files.len());
        outcomes.extend(orchestrator.run(routed.files).await);

        Ok(RunReport::new(outcomes))
    }

    async fn run_stdin(&self, spec: StreamSpec) -> JobOutcome {
        let resum_interval = self.config.engine.resum_interval;
        let task_spec = spec.clone();
        match tokio::task::spawn_blocking(move || run_stdin_job(task_spec, resum_interval)).await {
            Ok(outcome) => outcome,
            Err(e) => JobOutcome::panicked(spec, 1, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::write_sample;

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.retry.startup_delay_ms = 0;
        config.retry.retry_interval_ms = 5;
        config.retry.max_rounds = 2;
        config
    }

    #[tokio::test]
    async fn test_invalid_spec_aborts_before_running() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("in.bin");
        let output = dir.path().join("out.bin");
        let mut bytes = Vec::new();
        write_sample(&mut bytes, 1.0).unwrap();
        std::fs::write(&input, bytes).unwrap();

        let good = format!("1,{},{}", input.display(), output.display());
        let pipeline = Pipeline::new(fast_config(), ExecutionMode::Sequential);
        let err = pipeline.run_raw(&[good.as_str(), "abc,in,out"]).await.unwrap_err();

        assert!(matches!(err, PipelineError::Spec(SpecError::InvalidWindow { .. })));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_duplicate_stdin_is_invalid() {
        let pipeline = Pipeline::new(fast_config(), ExecutionMode::Parallel);
        let err = pipeline.run_raw(&["1,-,a", "2,-,b"]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Spec(SpecError::DuplicateStdin { .. })));
    }

    #[tokio::test]
    async fn test_failures_are_reported_per_job() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("in.bin");
        let mut bytes = Vec::new();
        for v in [1.0, 2.0, 3.0] {
            write_sample(&mut bytes, v).unwrap();
        }
        std::fs::write(&input, bytes).unwrap();

        let ok = format!("2,{},{}", input.display(), dir.path().join("ok.out").display());
        let missing = format!(
            "2,{},{}",
            dir.path().join("missing.bin").display(),
            dir.path().join("missing.out").display()
        );

        let pipeline = Pipeline::new(fast_config(), ExecutionMode::Sequential);
        let report = pipeline.run_raw(&[missing, ok]).await.unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.completed(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());
        assert!(report.outcomes[1].is_completed());
    }
}
