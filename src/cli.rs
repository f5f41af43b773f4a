//! Command-line interface for shell-context.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone)]
pub struct Args {
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Number of concurrent sessions to run.
    pub sessions: usize,
    /// Override for the argument block limit.
    pub max_bytes: Option<usize>,
    /// Arguments handed to each session's command.
    pub command: Vec<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: None,
            log_level: None,
            sessions: 2,
            max_bytes: None,
            command: Vec::new(),
            version: false,
            help: false,
        }
    }
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Short('s') | Long("sessions") => {
                let value: String = parser.value()?.parse()?;
                result.sessions = match value.parse::<usize>() {
                    Ok(n) if n > 0 => n,
                    _ => return Err(ArgsError::InvalidValue("sessions", value)),
                };
            }
            Long("max-bytes") => {
                let value: String = parser.value()?.parse()?;
                result.max_bytes = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("max-bytes", value))?,
                );
            }
            Value(val) => {
                result.command.push(into_utf8(val)?);
                for rest in parser.raw_args()? {
                    result.command.push(into_utf8(rest)?);
                }
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

fn into_utf8(value: OsString) -> Result<String, ArgsError> {
    value
        .into_string()
        .map_err(|v| ArgsError::NotUtf8(v.to_string_lossy().into_owned()))
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"shell-context {version}
Run a command's argument vector through concurrent session workers

USAGE:
    shell-context [OPTIONS] [--] [ARGS]...

OPTIONS:
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -s, --sessions <N>      Number of concurrent sessions [default: 2]
        --max-bytes <N>     Limit on the encoded argument block (0 = none)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    SHELL_CONTEXT_ARGV_MAX_BYTES  Argument block limit (overrides config)
    SHELL_CONTEXT_THREAD_PREFIX   Worker thread name prefix
    SHELL_CONTEXT_LOG_LEVEL       Log level (overrides config)
    RUST_LOG                      Alternative log level setting

EXAMPLES:
    # Echo arguments from two sessions
    shell-context -- ssh -p 2222 "user@host"

    # Four sessions with debug logging
    shell-context -s 4 -l debug -- mosh host
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("shell-context {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// A command argument is not valid UTF-8.
    NotUtf8(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::NotUtf8(arg) => write!(f, "argument is not valid UTF-8: '{}'", arg),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
