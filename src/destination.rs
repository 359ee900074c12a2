//! Merge output
//!
//! The destination is stdout or a file, either one optionally compressed.
//! `finish()` writes compression trailers and surfaces every final flush
//! error. Dropping an unfinished destination still closes gzip and zstd
//! streams, so the prefix flushed before an aborted merge stays readable.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufWriter, IntoInnerError, Write};
use std::path::Path;

use crate::error::{MergeError, Result};

/// Record terminator written after every record
pub const RECORD_TERMINATOR: u8 = b'\n';

type Sink = Box<dyn Write + Send>;

/// Compression applied to the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputCompression {
    #[default]
    None,
    Gzip,
    Zstd,
}

impl OutputCompression {
    /// Compression implied by a file extension (`.gz`, `.zst`)
    pub fn from_extension(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gz") => OutputCompression::Gzip,
            Some(ext) if ext.eq_ignore_ascii_case("zst") => OutputCompression::Zstd,
            _ => OutputCompression::None,
        }
    }
}

enum Stream {
    Plain(BufWriter<Sink>),
    Gzip(GzEncoder<BufWriter<Sink>>),
    Zstd(zstd::Encoder<'static, BufWriter<Sink>>),
}

pub struct Destination {
    // `None` once finished
    stream: Option<Stream>,
}

impl Destination {
    /// Write to stdout, compressed when asked to
    pub fn stdout(compression: OutputCompression) -> Result<Self> {
        Self::wrap(Box::new(io::stdout()), compression)
            .map_err(|e| MergeError::destination(&describe_target(None), e))
    }

    /// Create (truncate) the destination file
    pub fn create(path: &Path, compression: OutputCompression) -> Result<Self> {
        let target = path.display().to_string();
        let file = File::create(path).map_err(|e| {
            let message = create_helpful_error_message(path, &e);
            MergeError::destination(&target, io::Error::new(e.kind(), message))
        })?;
        Self::wrap(Box::new(file), compression).map_err(|e| MergeError::destination(&target, e))
    }

    /// Wrap any writer, e.g. an in-memory buffer or a pipe
    pub fn from_writer<W: Write + Send + 'static>(
        writer: W,
        compression: OutputCompression,
    ) -> io::Result<Self> {
        Self::wrap(Box::new(writer), compression)
    }

    fn wrap(sink: Sink, compression: OutputCompression) -> io::Result<Self> {
        let writer = BufWriter::new(sink);
        let stream = match compression {
            OutputCompression::None => Stream::Plain(writer),
            OutputCompression::Gzip => Stream::Gzip(GzEncoder::new(writer, Compression::default())),
            OutputCompression::Zstd => Stream::Zstd(zstd::Encoder::new(writer, 0)?),
        };
        Ok(Self {
            stream: Some(stream),
        })
    }

    /// Write compression trailers and flush everything down to the sink
    pub fn finish(mut self) -> io::Result<()> {
        let writer = match self.stream.take() {
            Some(Stream::Plain(writer)) => writer,
            Some(Stream::Gzip(encoder)) => encoder.finish()?,
            Some(Stream::Zstd(encoder)) => encoder.finish()?,
            None => return Ok(()),
        };
        let mut sink = writer.into_inner().map_err(IntoInnerError::into_error)?;
        sink.flush()
    }

    fn stream(&mut self) -> io::Result<&mut Stream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::other("destination already finished"))
    }
}

impl Drop for Destination {
    fn drop(&mut self) {
        // GzEncoder and BufWriter close themselves on drop; zstd needs an explicit epilogue.
        if let Some(Stream::Zstd(encoder)) = self.stream.take() {
            if let Err(e) = encoder.finish().and_then(|mut writer| writer.flush()) {
                tracing::warn!(error = %e, "cannot close zstd destination");
            }
        }
    }
}

impl Write for Destination {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.stream()? {
            Stream::Plain(writer) => writer.write(buf),
            Stream::Gzip(encoder) => encoder.write(buf),
            Stream::Zstd(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stream()? {
            Stream::Plain(writer) => writer.flush(),
            Stream::Gzip(encoder) => encoder.flush(),
            Stream::Zstd(encoder) => encoder.flush(),
        }
    }
}

/// Write one record plus terminator and flush it through
pub fn write_record<W: Write + ?Sized>(output: &mut W, record: &[u8]) -> io::Result<()> {
    output.write_all(record)?;
    output.write_all(&[RECORD_TERMINATOR])?;
    output.flush()
}

/// Human-readable destination target for error messages
pub fn describe_target(path: Option<&Path>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "<stdout>".to_string(),
    }
}

/// Create a helpful error message for file creation failures
fn create_helpful_error_message(path: &Path, error: &io::Error) -> String {
    let base_msg = format!("Cannot create output file '{}': {}", path.display(), error);

    let suggestion = match error.kind() {
        io::ErrorKind::PermissionDenied => {
            if path.parent().is_some_and(|p| !p.exists()) {
                "Suggestion: Parent directory does not exist, create it first"
            } else {
                "Suggestion: Check file permissions or choose a writable location"
            }
        }
        io::ErrorKind::NotFound => "Suggestion: Parent directory does not exist, create it first",
        _ if path.is_dir() => "Suggestion: Path points to a directory, specify a filename instead",
        _ => return base_msg,
    };

    format!("{}\n{}", base_msg, suggestion)
}
