//! Sample codec for the binary wire format.
//!
//! The wire format is a flat, headerless sequence of 8-byte little-endian
//! IEEE-754 doubles. The stream ends with the channel; a trailing fragment
//! shorter than one sample is discarded without error.
//!
//! The text encoder and decoder used by the `encode` / `decode` subcommands
//! live here too, since they share the same sample layout.

use std::io::{self, BufRead, Read, Write};
use thiserror::Error;

/// Size of one encoded sample in bytes.
pub const SAMPLE_SIZE: usize = 8;

/// Error type for the text encoder
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying channel failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A token of the text input is not a decimal number
    #[error("Invalid number '{token}' at position {position}")]
    InvalidNumber { token: String, position: usize },
}

/// Read one sample from `reader`.
///
/// Returns `Ok(None)` at end of stream, including when fewer than
/// [`SAMPLE_SIZE`] bytes were left; those bytes are dropped.
pub fn read_sample<R: Read + ?Sized>(reader: &mut R) -> io::Result<Option<f64>> {
    let mut buf = [0u8; SAMPLE_SIZE];
    match reader.read_exact(&mut buf) {
        Ok(()) => Ok(Some(f64::from_le_bytes(buf))),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write one sample to `writer`.
#[inline]
pub fn write_sample<W: Write + ?Sized>(writer: &mut W, value: f64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Iterator over the samples of a reader, stopping at end of stream.
pub struct Samples<R> {
    reader: R,
    done: bool,
}

impl<R: Read> Samples<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }
}

impl<R: Read> Iterator for Samples<R> {
    type Item = io::Result<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match read_sample(&mut self.reader) {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Parse whitespace-separated decimal text into values.
///
/// Fails on the first token that is not a number.
pub fn parse_text<R: Read>(mut reader: R) -> Result<Vec<f64>, CodecError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    text.split_whitespace()
        .enumerate()
        .map(|(position, token)| {
            token.parse::<f64>().map_err(|_| CodecError::InvalidNumber {
                token: token.to_string(),
                position,
            })
        })
        .collect()
}

/// Write every value as a sample and flush.
pub fn write_samples<W: Write>(mut writer: W, values: &[f64]) -> io::Result<()> {
    for value in values {
        write_sample(&mut writer, *value)?;
    }
    writer.flush()
}

/// Encode whitespace-separated decimal text into samples.
///
/// Every token is parsed before anything is written, so malformed input
/// produces no partial output. Returns the number of samples written.
pub fn encode_text<R: Read, W: Write>(reader: R, writer: W) -> Result<usize, CodecError> {
    let values = parse_text(reader)?;
    write_samples(writer, &values)?;
    Ok(values.len())
}

/// Decode samples into one decimal line per value.
///
/// Flushes after every line so a downstream reader sees values as they arrive.
/// Returns the number of values printed.
pub fn decode_to_text<R: BufRead, W: Write>(reader: R, mut writer: W) -> io::Result<usize> {
    let mut count = 0;
    for value in Samples::new(reader) {
        writeln!(writer, "{}", format_sample(value?))?;
        writer.flush()?;
        count += 1;
    }
    Ok(count)
}

/// Shortest representation that parses back to the same value.
///
/// Plain notation for magnitudes in `[1e-4, 1e16)` (`2.0`, `0.1`), otherwise
/// scientific with a signed exponent of at least two digits (`1e+16`,
/// `1.5e-07`), and `inf` / `-inf` / `nan` for non-finite values.
pub fn format_sample(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }

    let repr = format!("{:?}", value);
    match repr.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => repr,
    }
}
