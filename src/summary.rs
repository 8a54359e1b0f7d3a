use std::path::Path;

use anyhow::{Context, Result};
use eti::process::analyse::Stats;
use eti::process::carousel::TallySummary;
use serde::Serialize;

use crate::input::EtiFormat;
use crate::timestamp::{frames_duration_ms, time_str};

/// End-of-run report written by `--carousel-yaml`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    version: String,
    format: String,
    frames: u64,
    duration: String,
    faults: FaultCounters,
    carousel: Vec<FibEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FaultCounters {
    err_frames: u64,
    fsync_faults: u64,
    header_crc_errors: u64,
    frame_length_mismatches: u64,
    fib_crc_errors: u64,
    fig_errors: u64,
    fig_overruns: u64,
    stream_overruns: u64,
    frame_crc_errors: u64,
}

impl From<&Stats> for FaultCounters {
    fn from(stats: &Stats) -> Self {
        Self {
            err_frames: stats.err_frames,
            fsync_faults: stats.fsync_faults,
            header_crc_errors: stats.header_crc_errors,
            frame_length_mismatches: stats.frame_length_mismatches,
            fib_crc_errors: stats.fib_crc_errors,
            fig_errors: stats.fig_errors,
            fig_overruns: stats.fig_overruns,
            stream_overruns: stats.stream_overruns,
            frame_crc_errors: stats.frame_crc_errors,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FibEntry {
    fib: usize,
    mean_bytes: usize,
    fill: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    figs: Vec<FigEntry>,
}

#[derive(Debug, Serialize)]
struct FigEntry {
    #[serde(rename = "type")]
    fig_type: u8,
    extension: u8,
    count: u64,
    bytes: u64,
}

impl RunSummary {
    pub fn new(format: EtiFormat, stats: &Stats, carousel: &TallySummary) -> Self {
        let carousel = carousel
            .fibs
            .iter()
            .map(|fib| FibEntry {
                fib: fib.index,
                mean_bytes: fib.mean_bytes,
                fill: fib.fill.clone(),
                figs: fib
                    .figs
                    .iter()
                    .map(|fig| FigEntry {
                        fig_type: fig.fig_type,
                        extension: fig.extension,
                        count: fig.count,
                        bytes: fig.bytes,
                    })
                    .collect(),
            })
            .collect();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: format.to_string(),
            frames: stats.frames,
            duration: time_str(frames_duration_ms(stats.frames)),
            faults: stats.into(),
            carousel,
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_yaml()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Carousel summary written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eti::process::carousel::{Carousel, CarouselTally, FigOccurrence};

    #[test]
    fn yaml_lists_fibs_and_faults() -> Result<()> {
        let mut carousel = Carousel::default();
        carousel.record(
            0,
            FigOccurrence {
                fig_type: 0,
                extension: 13,
                length: 6,
            },
        );
        let stats = Stats {
            frames: 42,
            fib_crc_errors: 1,
            ..Default::default()
        };

        let mut tally = CarouselTally::default();
        tally.add(&carousel);
        tally.add(&carousel);

        let yaml = RunSummary::new(EtiFormat::Raw, &stats, &tally.summarize()).to_yaml()?;

        assert!(yaml.contains("format: RAW"));
        assert!(yaml.contains("frames: 42"));
        assert!(yaml.contains("00:00:01.008"));
        assert!(yaml.contains("fibCrcErrors: 1"));
        assert!(yaml.contains("meanBytes: 6"));
        assert!(yaml.contains("count: 2"));
        assert!(yaml.contains("bytes: 12"));
        assert!(yaml.contains("type: 0"));
        assert!(yaml.contains("extension: 13"));
        Ok(())
    }
}
