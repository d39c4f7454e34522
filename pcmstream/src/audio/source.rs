//! Audio sources and the byte streams behind them
//!
//! An [`AudioSource`] names one sound: either bytes already in memory or a
//! path that is opened as a file stream. Opening yields a [`ByteSource`],
//! which symphonia consumes as a `MediaSource`.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use symphonia::core::io::MediaSource;
use tracing::debug;

/// Identifies one sound. Immutable once bound to a decode session.
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// In-memory byte blob
    Memory(Arc<[u8]>),

    /// Path opened as a file stream
    File(PathBuf),
}

/// Whether the bytes behind a source are already resident or read from disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Memory,
    FileStream,
}

impl AudioSource {
    /// In-memory source from owned bytes
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        AudioSource::Memory(bytes.into())
    }

    /// Read a whole file into memory.
    ///
    /// Any I/O failure is reported as [`Error::SourceNotFound`].
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| Error::SourceNotFound(format!("{}: {}", path.display(), e)))?;
        debug!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(AudioSource::Memory(bytes.into()))
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            AudioSource::Memory(_) => SourceKind::Memory,
            AudioSource::File(_) => SourceKind::FileStream,
        }
    }

    /// File extension of a path source (no leading dot)
    pub fn extension(&self) -> Option<&str> {
        match self {
            AudioSource::File(path) => path.extension().and_then(|ext| ext.to_str()),
            AudioSource::Memory(_) => None,
        }
    }

    /// Display name used in logs
    pub fn display_name(&self) -> String {
        match self {
            AudioSource::Memory(bytes) => format!("<memory {} bytes>", bytes.len()),
            AudioSource::File(path) => path.display().to_string(),
        }
    }

    /// Open the underlying byte stream.
    pub fn open(&self) -> Result<ByteSource> {
        match self {
            AudioSource::Memory(bytes) => Ok(ByteSource::Memory(Cursor::new(Arc::clone(bytes)))),
            AudioSource::File(path) => {
                let file = File::open(path)
                    .map_err(|e| Error::SourceNotFound(format!("{}: {}", path.display(), e)))?;
                Ok(ByteSource::File(file))
            }
        }
    }
}

/// Seekable byte stream handed to the container readers.
pub enum ByteSource {
    Memory(Cursor<Arc<[u8]>>),
    File(File),
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            ByteSource::Memory(cursor) => cursor.read(buf),
            ByteSource::File(file) => file.read(buf),
        }
    }
}

impl Seek for ByteSource {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            ByteSource::Memory(cursor) => cursor.seek(pos),
            ByteSource::File(file) => file.seek(pos),
        }
    }
}

impl MediaSource for ByteSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        match self {
            ByteSource::Memory(cursor) => Some(cursor.get_ref().len() as u64),
            ByteSource::File(file) => file.metadata().ok().map(|m| m.len()),
        }
    }
}

/// Read up to `buf.len()` bytes from the start of the stream, then rewind to 0.
///
/// Short reads are retried until the buffer is full or the stream ends.
pub(crate) fn peek_prefix<R: Read + Seek>(stream: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    stream.seek(SeekFrom::Start(0))?;
    let mut filled = 0;
    let result = loop {
        if filled == buf.len() {
            break Ok(filled);
        }
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break Ok(filled),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => break Err(e),
        }
    };
    stream.seek(SeekFrom::Start(0))?;
    result
}
