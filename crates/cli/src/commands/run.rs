use crate::cli::RunArgs;
use crate::exit_codes;
use movavg::{Config, ExecutionMode, Pipeline};
use std::path::Path;
use tracing::info;

pub async fn execute(args: RunArgs, config_path: Option<&Path>) -> u8 {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::CONFIG_ERROR;
        }
    };

    let mode = if args.parallel {
        ExecutionMode::Parallel
    } else {
        ExecutionMode::Sequential
    };

    let pipeline = Pipeline::new(config, mode);
    let report = match pipeline.run_raw(args.specs.as_slice()).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INVALID_INPUT;
        }
    };

    info!(
        completed = report.completed(),
        failed = report.failed(),
        "run finished"
    );

    if let Some(path) = &args.report {
        if let Err(e) = report.write_to(path) {
            eprintln!("Error: Failed to write report '{}': {}", path.display(), e);
            return exit_codes::IO_ERROR;
        }
    }

    if report.is_success() {
        return exit_codes::SUCCESS;
    }

    for outcome in report.outcomes.iter().filter(|o| !o.is_completed()) {
        let reason = match &outcome.state {
            movavg::JobState::Failed(reason) => reason.as_str(),
            state => state.as_str(),
        };
        eprintln!("Error: stream '{}' failed: {}", outcome.spec, reason);
    }
    eprintln!(
        "{} of {} stream(s) failed",
        report.failed(),
        report.outcomes.len()
    );
    exit_codes::JOB_FAILED
}

fn load_config(path: Option<&Path>) -> Result<Config, String> {
    match path {
        Some(path) => Config::load(path)
            .map_err(|e| format!("Config file '{}': {}", path.display(), e)),
        None => Ok(Config::from_env()),
    }
}
