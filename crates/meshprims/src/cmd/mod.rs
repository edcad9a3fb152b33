use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod echo;
pub mod encode;
pub mod run;
pub mod version;

/// Large enough for any encoded frame at the hardware MTU.
pub(crate) const STDOUT_BUFFER: usize = 8192;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bring up configured interfaces and print inbound frames.
    Run(RunArgs),
    /// HDLC loopback peer on stdin/stdout.
    Echo(EchoArgs),
    /// Frame a payload into one HDLC frame on stdout.
    Encode(EncodeArgs),
    /// Decode an HDLC stream from stdin and print frames.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Echo(args) => echo::run(args),
        Command::Encode(args) => encode::run(args),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Network configuration file (JSON).
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: PathBuf,
    /// Transmit this string on every interface after startup.
    #[arg(long, conflicts_with = "stdin")]
    pub send: Option<String>,
    /// Transmit stdin as one payload on every interface after startup.
    #[arg(long, conflicts_with = "send")]
    pub stdin: bool,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Stop after this long (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
    /// Abort the process on any interface failure instead of recovering.
    #[arg(long)]
    pub panic_on_error: bool,
    /// Print an interface status summary on exit.
    #[arg(long)]
    pub status: bool,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Exit after echoing N frames.
    #[arg(long)]
    pub max_frames: Option<usize>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Payload string. Default: read stdin.
    #[arg(long)]
    pub data: Option<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Exit after decoding N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }
}
