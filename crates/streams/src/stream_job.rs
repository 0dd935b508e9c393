//! Stream job module
//!
//! Binds one [`StreamSpec`] to an open input and output and drains the input
//! through a [`MovingAverage`] engine, writing every produced average.

use crate::codec::{read_sample, write_sample};
use crate::moving_average::MovingAverage;
use crate::stream_spec::{InputDescriptor, OutputDescriptor, StreamSpec};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Stdin, Stdout, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Error type for stream job execution
#[derive(Debug, Error)]
pub enum JobError {
    /// Input file does not exist (yet)
    #[error("Input not found: {}", .path.display())]
    InputNotFound { path: PathBuf },

    /// Input exists but could not be opened
    #[error("Failed to open input {}: {source}", .path.display())]
    OpenInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Output could not be created
    #[error("Failed to create output {}: {source}", .path.display())]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading samples failed
    #[error("Read failed: {0}")]
    Read(#[source] io::Error),

    /// Writing averages failed
    #[error("Write failed: {0}")]
    Write(#[source] io::Error),

    /// Input never appeared within the sequential retry budget
    #[error("Input still missing after {rounds} round(s): {}", .path.display())]
    RetryBudgetExhausted { path: PathBuf, rounds: u32 },

    /// Worker running the job panicked
    #[error("Job worker panicked: {0}")]
    Panicked(String),
}

/// Serializable failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InputNotFound,
    Io,
    RetryBudgetExhausted,
    Panicked,
}

impl JobError {
    pub fn kind(&self) -> FailureKind {
        match self {
            JobError::InputNotFound { .. } => FailureKind::InputNotFound,
            JobError::OpenInput { .. }
            | JobError::CreateOutput { .. }
            | JobError::Read(_)
            | JobError::Write(_) => FailureKind::Io,
            JobError::RetryBudgetExhausted { .. } => FailureKind::RetryBudgetExhausted,
            JobError::Panicked(_) => FailureKind::Panicked,
        }
    }

    /// Only a missing input may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, JobError::InputNotFound { .. })
    }
}

/// Job state in the open → stream → complete lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum JobState {
    /// Not attempted yet, or waiting for its next attempt
    Pending,
    /// Input opened
    Opened,
    /// Samples are flowing
    Streaming,
    /// Input was missing; waiting for the next round
    RetryWait,
    /// Input drained and output flushed
    Completed,
    /// Terminal failure
    Failed(String),
}

impl JobState {
    /// Convert state to string for logging
    pub fn as_str(&self) -> &str {
        match self {
            JobState::Pending => "pending",
            JobState::Opened => "opened",
            JobState::Streaming => "streaming",
            JobState::RetryWait => "retry_wait",
            JobState::Completed => "completed",
            JobState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed(_))
    }
}

/// Sample counters for one job execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub samples_read: u64,
    pub samples_written: u64,
}

/// Readable end of a stream
pub enum InputSource {
    /// Process stdin; dropping the handle leaves the descriptor open
    Stdin(Stdin),
    File(BufReader<File>),
}

impl InputSource {
    pub fn open(descriptor: &InputDescriptor) -> Result<Self, JobError> {
        match descriptor {
            InputDescriptor::Stdin => Ok(InputSource::Stdin(io::stdin())),
            InputDescriptor::File(path) => open_input_file(path).map(InputSource::File),
        }
    }
}

impl Read for InputSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            InputSource::Stdin(stdin) => stdin.read(buf),
            InputSource::File(file) => file.read(buf),
        }
    }
}

fn open_input_file(path: &Path) -> Result<BufReader<File>, JobError> {
    match File::open(path) {
        Ok(file) => Ok(BufReader::new(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(JobError::InputNotFound {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(JobError::OpenInput {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writable end of a stream
pub enum OutputSink {
    /// Process stdout; never closed by the job
    Stdout(Stdout),
    /// Truncated file, flushed and closed when dropped
    File(BufWriter<File>),
}

impl OutputSink {
    pub fn create(descriptor: &OutputDescriptor) -> Result<Self, JobError> {
        match descriptor {
            OutputDescriptor::Stdout => Ok(OutputSink::Stdout(io::stdout())),
            OutputDescriptor::File(path) => File::create(path)
                .map(|file| OutputSink::File(BufWriter::new(file)))
                .map_err(|source| JobError::CreateOutput {
                    path: path.clone(),
                    source,
                }),
        }
    }

    /// Stdout is shared with other jobs and downstream readers, so every
    /// sample is pushed through immediately.
    pub fn flush_each_sample(&self) -> bool {
        matches!(self, OutputSink::Stdout(_))
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputSink::Stdout(stdout) => stdout.write(buf),
            OutputSink::File(file) => file.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            // one lock per sample keeps concurrent stdout writers sample-aligned
            OutputSink::Stdout(stdout) => stdout.lock().write_all(buf),
            OutputSink::File(file) => file.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputSink::Stdout(stdout) => stdout.flush(),
            OutputSink::File(file) => file.flush(),
        }
    }
}

/// Drain `input` through `engine` into `output`.
///
/// Averages are written in arrival order. With `flush_each` the writer is
/// flushed after every sample; otherwise once at end of stream.
pub fn stream_samples<R: Read, W: Write>(
    mut input: R,
    mut output: W,
    engine: &mut MovingAverage,
    flush_each: bool,
) -> Result<JobStats, JobError> {
    let mut stats = JobStats::default();

    while let Some(value) = read_sample(&mut input).map_err(JobError::Read)? {
        stats.samples_read += 1;
        if let Some(avg) = engine.observe(value) {
            write_sample(&mut output, avg).map_err(JobError::Write)?;
            if flush_each {
                output.flush().map_err(JobError::Write)?;
            }
            stats.samples_written += 1;
        }
    }

    output.flush().map_err(JobError::Write)?;
    Ok(stats)
}

/// One stream's execution
#[derive(Debug, Clone)]
pub struct StreamJob {
    pub spec: StreamSpec,
    pub state: JobState,
    /// Number of times the job tried to open its input
    pub attempts: u32,
    pub stats: JobStats,
    resum_interval: u64,
}

impl StreamJob {
    pub fn new(spec: StreamSpec) -> Self {
        Self::with_resum_interval(spec, 0)
    }

    pub fn with_resum_interval(spec: StreamSpec, resum_interval: u64) -> Self {
        Self {
            spec,
            state: JobState::Pending,
            attempts: 0,
            stats: JobStats::default(),
            resum_interval,
        }
    }

    /// Open the input and output and stream the whole input.
    ///
    /// A missing input leaves the job in [`JobState::RetryWait`]; every other
    /// error is terminal and marks it [`JobState::Failed`]. The output is only
    /// created once the input is open, so a missing input never truncates it.
    pub fn run(&mut self) -> Result<JobStats, JobError> {
        self.attempts += 1;
        self.state = JobState::Pending;

        let result = self.open_and_stream();
        match &result {
            Ok(stats) => {
                self.stats = *stats;
                self.state = JobState::Completed;
            }
            Err(e) if e.is_retryable() => self.state = JobState::RetryWait,
            Err(e) => self.state = JobState::Failed(e.to_string()),
        }
        result
    }

    fn open_and_stream(&mut self) -> Result<JobStats, JobError> {
        let input = InputSource::open(&self.spec.input)?;
        self.state = JobState::Opened;
        debug!(spec = %self.spec, attempt = self.attempts, "input opened");

        let output = OutputSink::create(&self.spec.output)?;
        let flush_each = output.flush_each_sample();

        self.state = JobState::Streaming;
        let mut engine = MovingAverage::with_resum_interval(self.spec.window, self.resum_interval);
        stream_samples(input, output, &mut engine, flush_each)
    }

    /// Mark the job as failed without running it.
    pub fn fail(&mut self, error: &JobError) {
        self.state = JobState::Failed(error.to_string());
    }
}
