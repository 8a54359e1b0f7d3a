use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use eti::process::demux::StreamSink;
use log::{debug, info};

/// Writes the raw bytes of one selected stream to `<base>.stream<N>.raw`.
pub struct SubchannelDump {
    base: PathBuf,
    stream_index: usize,
    subchannel_index: Option<usize>,
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
    bytes_written: u64,
}

impl SubchannelDump {
    pub fn new<P: AsRef<Path>>(base: P, stream_index: usize) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            stream_index,
            subchannel_index: None,
            writer: None,
            path: None,
            bytes_written: 0,
        }
    }

    pub fn output_path(base: &Path, stream_index: usize) -> PathBuf {
        let mut name = base.as_os_str().to_owned();
        name.push(format!(".stream{stream_index}.raw"));
        PathBuf::from(name)
    }
}

impl StreamSink for SubchannelDump {
    fn configure(&mut self, subchannel_index: usize, stream_index: usize) -> Result<()> {
        if stream_index != self.stream_index {
            bail!(
                "Dump for stream {} configured with stream {stream_index}",
                self.stream_index
            );
        }

        if self.writer.is_none() {
            let path = Self::output_path(&self.base, stream_index);
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            info!("Writing stream {stream_index} to {}", path.display());
            self.writer = Some(BufWriter::new(file));
            self.path = Some(path);
        } else {
            debug!("Stream {stream_index}: sub-channel index now {subchannel_index}");
        }

        self.subchannel_index = Some(subchannel_index);
        Ok(())
    }

    fn push(&mut self, data: &[u8]) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            bail!("Stream {} pushed before being configured", self.stream_index);
        };

        writer.write_all(data)?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            debug!("Stream {} never carried data", self.stream_index);
            return Ok(());
        };

        writer.flush()?;
        if let Some(path) = &self.path {
            info!(
                "Stream {} (sub-channel index {}): wrote {} bytes to {}",
                self.stream_index,
                self.subchannel_index.unwrap_or_default(),
                self.bytes_written,
                path.display()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_base(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("etisnoop-{}-{name}", std::process::id()))
    }

    #[test]
    fn output_path_appends_stream_suffix() {
        let path = SubchannelDump::output_path(Path::new("/tmp/capture"), 3);
        assert_eq!(path, PathBuf::from("/tmp/capture.stream3.raw"));
    }

    #[test]
    fn pushed_bytes_land_in_file() -> Result<()> {
        let base = temp_base("pushed");
        let mut dump = SubchannelDump::new(&base, 1);

        dump.configure(2, 1)?;
        dump.push(&[0x10; 24])?;
        dump.configure(4, 1)?;
        dump.push(&[0x11; 8])?;
        assert_eq!(dump.subchannel_index, Some(4));
        dump.close()?;

        let path = SubchannelDump::output_path(&base, 1);
        let written = std::fs::read(&path)?;
        std::fs::remove_file(&path)?;

        assert_eq!(written.len(), 32);
        assert_eq!(written[23], 0x10);
        assert_eq!(written[24], 0x11);
        Ok(())
    }

    #[test]
    fn push_before_configure_fails() {
        let mut dump = SubchannelDump::new(temp_base("unconfigured"), 0);
        assert!(dump.push(&[0x00]).is_err());
        assert!(dump.close().is_ok());
    }
}
