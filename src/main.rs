use anyhow::Result;
use clap::Parser as ClapParser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

use cli::analyse::cmd_analyse;
use cli::command::{Cli, Commands, LogFormat};
use cli::info::cmd_info;

mod cli;
mod dump;
mod input;
mod summary;
pub(crate) mod timestamp;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let multi = MultiProgress::new();

    // Progress bars and log lines share the terminal through the bridge
    let progress = init_logging(&cli, &multi)?.then_some(&multi);

    match cli.command {
        Commands::Analyse(ref args) => cmd_analyse(args, &cli, progress),
        Commands::Info(ref args) => cmd_info(args, &cli, progress),
    }
}

/// Installs the logger; returns whether progress output is enabled.
fn init_logging(cli: &Cli, multi: &MultiProgress) -> Result<bool> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(cli.loglevel.to_level_filter());

    match cli.log_format {
        LogFormat::Plain => {
            builder.format_timestamp_millis();
        }
        LogFormat::Json => {
            builder.format(|buf, record| {
                use std::io::Write;
                writeln!(
                    buf,
                    "{{\"ts\":\"{}\",\"lvl\":\"{}\",\"target\":\"{}\",\"msg\":{:?}}}",
                    buf.timestamp_millis(),
                    record.level(),
                    record.target(),
                    record.args().to_string()
                )
            });
        }
    }

    if cli.progress {
        LogWrapper::new(multi.clone(), builder.build()).try_init()?;
    } else {
        builder.try_init()?;
    }

    Ok(cli.progress)
}
