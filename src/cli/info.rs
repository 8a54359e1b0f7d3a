use std::collections::BTreeMap;

use anyhow::Result;
use eti::process::analyse::{Analyser, AnalyserConfig, EtiFrame, RunEnd, Stats};
use eti::structs::fig::{Fig, Fig0Body, Fig1Body};
use eti::structs::header::SubchannelDescriptor;
use indicatif::{MultiProgress, ProgressBar};

use super::command::{Cli, InfoArgs};
use super::progress::create_progress_bar;
use crate::input::{EtiFormat, EtiReader};
use crate::timestamp::{frames_duration_ms, time_str};

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analysing ETI stream: {}", args.input.display());

    let mut reader = EtiReader::new(&args.input)?;
    let mut analyser = Analyser::new(AnalyserConfig {
        ignore_errors: args.ignore_error,
        analyse_carousel: false,
    });

    let mut context = InfoContext {
        pb: multi
            .map(|multi| create_progress_bar(multi, reader.estimated_frames()))
            .transpose()?,
        ..Default::default()
    };

    let end = analyser.run(&mut reader, |frame| context.process_frame(frame, cli));

    if let Some(pb) = &context.pb {
        pb.finish_and_clear();
    }
    let end = end?;

    let ensemble = context.into_ensemble();
    if ensemble.mode.is_none() {
        println!("No decodable frame found in the input.");
        return Ok(());
    }

    display_ensemble(reader.format(), &ensemble);
    display_stats(analyser.stats(), reader.bytes_read(), end);

    Ok(())
}

#[derive(Default)]
struct EnsembleInfo {
    mode: Option<u8>,
    subchannels: Vec<SubchannelDescriptor>,
    eid: Option<u16>,
    label: Option<String>,
    services: BTreeMap<u32, ServiceInfo>,
}

#[derive(Default)]
struct ServiceInfo {
    label: Option<String>,
    components: usize,
}

#[derive(Default)]
struct InfoContext {
    ensemble: EnsembleInfo,
    pb: Option<ProgressBar>,
}

impl InfoContext {
    fn process_frame(&mut self, frame: &EtiFrame, cli: &Cli) -> Result<()> {
        if cli.strict && !frame.is_clean() {
            anyhow::bail!("Frame {} has faults, stopping (--strict)", frame.index);
        }

        if let Some(lidata) = &frame.lidata {
            let ensemble = &mut self.ensemble;
            if ensemble.mode.is_none() {
                ensemble.mode = Some(lidata.header.fc.mode());
                ensemble.subchannels = lidata.header.stc.clone();
            }

            let figs = lidata.fic.iter().flat_map(|fic| fic.figs());
            for fig in figs.filter_map(|record| record.decoded.as_ref().ok()) {
                ensemble.record(fig);
            }
        }

        if let Some(ref pb) = self.pb {
            pb.inc(1);
        }

        Ok(())
    }

    fn into_ensemble(self) -> EnsembleInfo {
        self.ensemble
    }
}

impl EnsembleInfo {
    fn record(&mut self, fig: &Fig) {
        match fig {
            Fig::Type0(fig0) => match &fig0.body {
                Fig0Body::EnsembleInformation(info) => {
                    self.eid.get_or_insert(info.eid);
                }
                Fig0Body::ServiceOrganisation(organisation) => {
                    for service in &organisation.services {
                        let entry = self.services.entry(service.sid).or_default();
                        entry.components = entry.components.max(service.components.len());
                    }
                }
                _ => {}
            },
            Fig::Type1(fig1) => match &fig1.body {
                Fig1Body::Ensemble { label, .. } => {
                    self.label.get_or_insert_with(|| label.text().trim_end().to_string());
                }
                Fig1Body::Programme { sid, label } => {
                    self.services
                        .entry(*sid as u32)
                        .or_default()
                        .label
                        .get_or_insert_with(|| label.text().trim_end().to_string());
                }
                Fig1Body::DataService { sid, label } => {
                    self.services
                        .entry(*sid)
                        .or_default()
                        .label
                        .get_or_insert_with(|| label.text().trim_end().to_string());
                }
                _ => {}
            },
            _ => {}
        }
    }
}

fn display_ensemble(format: EtiFormat, ensemble: &EnsembleInfo) {
    println!();
    println!("ETI Stream Information");
    println!("======================");
    println!();
    println!("  Container                 {format}");
    if let Some(mode) = ensemble.mode {
        println!("  Transmission mode         {mode}");
    }
    if let Some(eid) = ensemble.eid {
        println!("  Ensemble ID               0x{eid:04X}");
    }
    if let Some(label) = &ensemble.label {
        println!("  Ensemble label            \"{label}\"");
    }
    println!();

    println!("Sub-channels");
    for stc in &ensemble.subchannels {
        println!(
            "  Stream {:<3} SCID {:<3} SAD {:<4} {:>4} kbit/s  {}",
            stc.stream_index,
            stc.scid,
            stc.sad,
            stc.bitrate_kbps(),
            stc.protection
        );
    }
    println!();

    if !ensemble.services.is_empty() {
        println!("Services");
        for (sid, service) in &ensemble.services {
            let label = service.label.as_deref().unwrap_or("?");
            println!(
                "  0x{sid:04X}  {:<18} {} component(s)",
                format!("\"{label}\""),
                service.components
            );
        }
        println!();
    }
}

fn display_stats(stats: &Stats, total_bytes: u64, end: RunEnd) {
    println!("Analysis Summary");
    println!("  Frames processed          {}", stats.frames);

    let size_mb = total_bytes as f64 / 1_000_000.0;
    println!("  Size                      {size_mb:.2} MB ({total_bytes} bytes)");
    println!(
        "  Duration                  {}",
        time_str(frames_duration_ms(stats.frames))
    );
    if end == RunEnd::Aborted {
        println!("  Stopped early             ERR byte signalled an error");
    }
    println!();

    println!("Faults");
    println!("  ERR frames                {}", stats.err_frames);
    println!("  FSYNC                     {}", stats.fsync_faults);
    println!("  Header CRC                {}", stats.header_crc_errors);
    println!("  Frame length              {}", stats.frame_length_mismatches);
    println!("  FIB CRC                   {}", stats.fib_crc_errors);
    println!("  FIG errors                {}", stats.fig_errors);
    println!("  FIG overruns              {}", stats.fig_overruns);
    println!("  Stream overruns           {}", stats.stream_overruns);
    println!("  Frame CRC                 {}", stats.frame_crc_errors);
    println!();
}
