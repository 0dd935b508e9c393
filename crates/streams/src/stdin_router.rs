//! Routing of the standard-input stream.
//!
//! Standard input is a single handle that cannot be shared between workers,
//! so the spec reading it is split off and run to completion before any
//! file-backed job is dispatched.

use crate::report::JobOutcome;
use crate::stream_job::StreamJob;
use crate::stream_spec::{SpecError, StreamSpec};
use tracing::info;

/// Specs split by input kind, order preserved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutedSpecs {
    /// The one spec reading standard input, if any
    pub stdin: Option<StreamSpec>,
    /// File-backed specs for the orchestrator
    pub files: Vec<StreamSpec>,
}

/// Split off the stdin-backed spec.
///
/// A second spec reading standard input is rejected rather than silently
/// ignored.
pub fn route(specs: Vec<StreamSpec>) -> Result<RoutedSpecs, SpecError> {
    let mut routed = RoutedSpecs::default();

    for spec in specs {
        if !spec.input.is_stdin() {
            routed.files.push(spec);
            continue;
        }
        if let Some(first) = &routed.stdin {
            return Err(SpecError::DuplicateStdin {
                spec: spec.to_string(),
                first: first.to_string(),
            });
        }
        routed.stdin = Some(spec);
    }

    Ok(routed)
}

/// Run the stdin job synchronously and report how it ended.
///
/// Blocks the calling thread until standard input reaches end of stream.
pub fn run_stdin_job(spec: StreamSpec, resum_interval: u64) -> JobOutcome {
    info!(spec = %spec, "streaming standard input");
    let mut job = StreamJob::with_resum_interval(spec, resum_interval);
    let result = job.run();
    JobOutcome::from_job(job, result.err())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_spec::parse_specs;

    #[test]
    fn test_route_without_stdin() {
        let specs = parse_specs(&["2,a,b", "3,c,-"]).unwrap();
        let routed = route(specs.clone()).unwrap();
        assert_eq!(routed.stdin, None);
        assert_eq!(routed.files, specs);
    }

    #[test]
    fn test_route_peels_off_stdin_and_keeps_order() {
        let specs = parse_specs(&["2,a,b", "4,-,out", "3,c,d"]).unwrap();
        let routed = route(specs).unwrap();

        assert_eq!(routed.stdin.unwrap().to_string(), "4,-,out");
        let files: Vec<String> = routed.files.iter().map(|s| s.to_string()).collect();
        assert_eq!(files, vec!["2,a,b", "3,c,d"]);
    }

    #[test]
    fn test_second_stdin_spec_is_invalid() {
        let specs = parse_specs(&["1,-,x", "2,a,b", "5,-,y"]).unwrap();
        let err = route(specs).unwrap_err();
        assert_eq!(
            err,
            SpecError::DuplicateStdin {
                spec: "5,-,y".to_string(),
                first: "1,-,x".to_string(),
            }
        );
    }
}
