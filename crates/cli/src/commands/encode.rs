use crate::cli::EncodeArgs;
use crate::exit_codes;
use movavg::{parse_text, write_samples, CodecError};
use std::fs::File;
use std::io::{self, BufWriter};

pub fn execute(args: EncodeArgs) -> u8 {
    // parse everything first so bad input never touches the output file
    let values = match parse_text(io::stdin().lock()) {
        Ok(values) => values,
        Err(e @ CodecError::InvalidNumber { .. }) => {
            eprintln!("Error: {}", e);
            return exit_codes::INVALID_INPUT;
        }
        Err(CodecError::Io(e)) => {
            eprintln!("Error: {}", e);
            return exit_codes::IO_ERROR;
        }
    };

    let result = match &args.output {
        Some(path) => match File::create(path) {
            Ok(file) => write_samples(BufWriter::new(file), &values),
            Err(e) => {
                eprintln!("Error: Failed to create '{}': {}", path.display(), e);
                return exit_codes::IO_ERROR;
            }
        },
        None => write_samples(io::stdout().lock(), &values),
    };

    match result {
        Ok(()) => {
            tracing::debug!(count = values.len(), "encoded samples");
            exit_codes::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_codes::IO_ERROR
        }
    }
}
