//! Output file adapters

mod caf;
mod ogg_opus;

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::Path;

pub use caf::{write_varint, CafSink};
pub use ogg_opus::OggOpusSink;

use crate::application::ports::{OutputSink, SinkError, SinkFactory};
use crate::domain::recording::{CodecSideInfo, ContainerFormat, PacketDescription, StreamFormat};

/// Open the output file for writing.
///
/// Without `erase_existing`, an existing file is an error and is left untouched.
pub(crate) fn open_output(path: &Path, erase_existing: bool) -> Result<BufWriter<File>, SinkError> {
    let mut options = OpenOptions::new();
    options.write(true);
    if erase_existing {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let file = options.open(path).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => SinkError::AlreadyExists(path.display().to_string()),
        _ => SinkError::Io(format!("{}: {}", path.display(), e)),
    })?;
    Ok(BufWriter::new(file))
}

/// An output file in one of the supported containers
pub enum FileSink {
    Caf(CafSink),
    Ogg(OggOpusSink),
}

impl FileSink {
    fn inner(&mut self) -> &mut dyn OutputSink {
        match self {
            Self::Caf(sink) => sink,
            Self::Ogg(sink) => sink,
        }
    }
}

impl OutputSink for FileSink {
    fn write_packets(
        &mut self,
        use_cache: bool,
        byte_count: u32,
        descriptions: &[PacketDescription],
        start_packet: u64,
        packet_count: u32,
        data: &[u8],
    ) -> Result<u32, SinkError> {
        self.inner().write_packets(
            use_cache,
            byte_count,
            descriptions,
            start_packet,
            packet_count,
            data,
        )
    }

    fn set_codec_side_info(&mut self, info: &CodecSideInfo) -> Result<(), SinkError> {
        self.inner().set_codec_side_info(info)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.inner().close()
    }
}

/// Creates output files on the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSinkFactory;

impl FileSinkFactory {
    pub fn new() -> Self {
        Self
    }
}

impl SinkFactory for FileSinkFactory {
    type Sink = FileSink;

    fn create(
        &self,
        path: &Path,
        container: ContainerFormat,
        format: &StreamFormat,
        erase_existing: bool,
    ) -> Result<FileSink, SinkError> {
        container.check_codec(format.codec)?;
        match container {
            ContainerFormat::Caf => {
                CafSink::create(path, format, erase_existing).map(FileSink::Caf)
            }
            ContainerFormat::Ogg => {
                OggOpusSink::create(path, format, erase_existing).map(FileSink::Ogg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recording::Codec;
    use tempfile::tempdir;

    fn format(codec: Codec) -> StreamFormat {
        StreamFormat::partial(codec, 1, 48000).complete().unwrap()
    }

    #[test]
    fn dispatches_by_container() {
        let dir = tempdir().unwrap();
        let factory = FileSinkFactory::new();

        let caf = factory
            .create(&dir.path().join("a.caf"), ContainerFormat::Caf, &format(Codec::LinearPcm), true)
            .unwrap();
        assert!(matches!(caf, FileSink::Caf(_)));

        let ogg = factory
            .create(&dir.path().join("a.ogg"), ContainerFormat::Ogg, &format(Codec::Opus), true)
            .unwrap();
        assert!(matches!(ogg, FileSink::Ogg(_)));
    }

    #[test]
    fn ogg_refuses_pcm_before_touching_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.ogg");
        let err = FileSinkFactory::new()
            .create(&path, ContainerFormat::Ogg, &format(Codec::LinearPcm), true)
            .err()
            .unwrap();
        assert!(matches!(err, SinkError::Unsupported(_)));
        assert!(!path.exists());
    }

    #[test]
    fn erase_existing_replaces_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.caf");
        std::fs::write(&path, b"previous take, much longer than a header").unwrap();

        let err = open_output(&path, false).unwrap_err();
        assert!(matches!(err, SinkError::AlreadyExists(_)));

        let mut sink = FileSinkFactory::new()
            .create(&path, ContainerFormat::Caf, &format(Codec::LinearPcm), true)
            .unwrap();
        sink.close().unwrap();
        assert!(std::fs::read(&path).unwrap().starts_with(b"caff"));
    }
}
