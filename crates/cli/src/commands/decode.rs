use crate::exit_codes;
use movavg::decode_to_text;
use std::io;

pub fn execute() -> u8 {
    match decode_to_text(io::stdin().lock(), io::stdout().lock()) {
        Ok(count) => {
            tracing::debug!(count, "decoded samples");
            exit_codes::SUCCESS
        }
        // downstream closed early (e.g. piped into `head`)
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_codes::IO_ERROR
        }
    }
}
