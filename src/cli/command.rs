use std::path::PathBuf;

use clap::{ArgAction, Args, Parser as ClapParser, Subcommand, ValueEnum};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\neti library ",
    env!("ETI_VERSION"),
    "\nbuilt ",
    env!("BUILD_TIMESTAMP"),
);

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = LONG_VERSION,
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Tools for inspecting ETI(NI) streams and their Fast Information Channel",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Stop at the first frame showing a fault.
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show a progress spinner during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the fields of every frame, decoding the FIC.
    Analyse(AnalyseArgs),

    /// Print a summary of the ensemble and the stream health.
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub struct AnalyseArgs {
    /// Input ETI file (use "-" for stdin).
    #[arg(value_name = "INPUT", default_value = "-")]
    pub input: PathBuf,

    /// Increase trace verbosity; repeat to include raw bytes.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Keep decoding frames whose ERR byte signals an error.
    #[arg(short = 'e', long = "ignore-error")]
    pub ignore_error: bool,

    /// Dump the stream with this index to a file (repeatable).
    #[arg(short, long = "decode-stream", value_name = "INDEX")]
    pub decode_stream: Vec<usize>,

    /// Base path for dumped streams.
    #[arg(long, value_name = "PATH", default_value = "etisnoop")]
    pub output_path: PathBuf,

    /// Print FIG counts per FIB over the whole run.
    #[arg(short = 'f', long)]
    pub carousel: bool,

    /// Print the FIG carousel of each frame after its FIC.
    #[arg(long)]
    pub carousel_per_frame: bool,

    /// Write the run summary and carousel as YAML.
    #[arg(long, value_name = "PATH")]
    pub carousel_yaml: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input ETI file (use "-" for stdin).
    #[arg(value_name = "INPUT", default_value = "-")]
    pub input: PathBuf,

    /// Keep decoding frames whose ERR byte signals an error.
    #[arg(short = 'e', long = "ignore-error")]
    pub ignore_error: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text with timestamps.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyse_flags_parse() {
        let cli = Cli::try_parse_from([
            "etisnoop", "analyse", "-vv", "-e", "-d", "0", "-d", "2", "-f", "capture.eti",
        ])
        .unwrap();

        let Commands::Analyse(args) = cli.command else {
            panic!("expected analyse");
        };
        assert_eq!(args.verbose, 2);
        assert!(args.ignore_error);
        assert_eq!(args.decode_stream, [0, 2]);
        assert!(args.carousel);
        assert_eq!(args.input, PathBuf::from("capture.eti"));
    }

    #[test]
    fn input_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["etisnoop", "--loglevel", "warn", "info"]).unwrap();
        let Commands::Info(args) = cli.command else {
            panic!("expected info");
        };
        assert_eq!(args.input, PathBuf::from("-"));
    }
}
