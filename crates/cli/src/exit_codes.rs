//! Process exit codes

/// Every stream completed
pub const SUCCESS: u8 = 0;
/// At least one stream ended in failure; the others still ran
pub const JOB_FAILED: u8 = 1;
/// Malformed stream spec or encoder input; nothing ran
pub const INVALID_INPUT: u8 = 2;
/// Configuration file could not be loaded
pub const CONFIG_ERROR: u8 = 3;
/// Encoder/decoder channel failure, or the run report could not be written
pub const IO_ERROR: u8 = 4;
