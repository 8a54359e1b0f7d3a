use std::io::{self, BufWriter};

use anyhow::{Result, bail};
use eti::process::analyse::{Analyser, AnalyserConfig, RunEnd, Stats};
use indicatif::MultiProgress;
use log::{info, warn};

use super::command::{AnalyseArgs, Cli};
use super::progress::create_progress_bar;
use super::trace::TraceWriter;
use crate::dump::SubchannelDump;
use crate::input::EtiReader;
use crate::summary::RunSummary;
use crate::timestamp::{frames_duration_ms, time_str};

pub fn cmd_analyse(args: &AnalyseArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let mut reader = EtiReader::new(&args.input)?;
    let format = reader.format();

    let mut analyser = Analyser::new(AnalyserConfig {
        ignore_errors: args.ignore_error,
        analyse_carousel: args.carousel || args.carousel_yaml.is_some(),
    });
    for &index in &args.decode_stream {
        analyser.add_stream_sink(index, Box::new(SubchannelDump::new(&args.output_path, index)));
    }

    let stdout = BufWriter::new(io::stdout().lock());
    let mut trace = TraceWriter::new(stdout, args.verbose).with_frame_carousel(args.carousel_per_frame);
    trace.field(&format!("Identified ETI type {format}"), 0, &[], "")?;

    let pb = multi
        .map(|multi| create_progress_bar(multi, reader.estimated_frames()))
        .transpose()?;

    let end = analyser.run(&mut reader, |frame| {
        match &pb {
            Some(pb) => pb.suspend(|| trace.frame(frame))?,
            None => trace.frame(frame)?,
        }

        if cli.strict && !frame.is_clean() {
            bail!("Frame {} has faults, stopping (--strict)", frame.index);
        }

        if let Some(pb) = &pb {
            pb.inc(1);
        }

        Ok(())
    });

    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }
    trace.flush()?;
    let end = end?;

    if end == RunEnd::Aborted {
        warn!("Run aborted after {} frames", analyser.stats().frames);
    }

    let summary = analyser.tally().summarize();
    if args.carousel {
        trace.line(&summary.to_string())?;
        trace.flush()?;
    }

    if let Some(path) = &args.carousel_yaml {
        RunSummary::new(format, analyser.stats(), &summary).write(path)?;
    }

    log_stats(analyser.stats());

    Ok(())
}

fn log_stats(stats: &Stats) {
    info!(
        "{} frames ({}), {} faults",
        stats.frames,
        time_str(frames_duration_ms(stats.frames)),
        stats.faults()
    );

    if stats.faults() > 0 {
        warn!(
            "ERR {}, FSYNC {}, header CRC {}, FL {}, FIB CRC {}, FIG {}, FIG overruns {}, stream overruns {}, frame CRC {}",
            stats.err_frames,
            stats.fsync_faults,
            stats.header_crc_errors,
            stats.frame_length_mismatches,
            stats.fib_crc_errors,
            stats.fig_errors,
            stats.fig_overruns,
            stats.stream_overruns,
            stats.frame_crc_errors
        );
    }
}
