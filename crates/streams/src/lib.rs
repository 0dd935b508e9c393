//! movavg
//!
//! Trailing moving averages over independent streams of little-endian `f64`
//! samples, with a retrying sequential orchestrator and a parallel worker pool.

pub mod codec;
pub mod concurrency;
pub mod moving_average;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
pub mod stdin_router;
pub mod stream_job;
pub mod stream_spec;

pub use codec::{
    decode_to_text, encode_text, format_sample, parse_text, read_sample, write_sample,
    write_samples, CodecError, Samples, SAMPLE_SIZE,
};
pub use concurrency::PoolPlan;
pub use movavg_config as config;
pub use movavg_config::Config;
pub use moving_average::{moving_average, MovingAverage};
pub use orchestrator::{ExecutionMode, Orchestrator, RetryPolicy};
pub use pipeline::{Pipeline, PipelineError};
pub use report::{JobOutcome, RunReport};
pub use stdin_router::{route, run_stdin_job, RoutedSpecs};
pub use stream_job::{
    stream_samples, FailureKind, InputSource, JobError, JobState, JobStats, OutputSink, StreamJob,
};
pub use stream_spec::{
    parse_specs, InputDescriptor, OutputDescriptor, SpecError, StreamSpec, STDIO_MARKER,
};
