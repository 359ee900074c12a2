use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Chain, Cursor, Read};
use std::path::Path;

/// Read buffer for source streams (256KB, like the multi-file reader it came from)
pub const SOURCE_BUFFER_SIZE: usize = 256 * 1024;

/// Compression formats recognised by their magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Plain,
    /// Gzip magic: 1F 8B 08
    Gzip,
    /// Zstd magic: 28 B5 2F FD
    Zstd,
}

impl Codec {
    fn detect(head: &[u8]) -> Self {
        if head.len() >= 3 && head[0] == 0x1F && head[1] == 0x8B && head[2] == 0x08 {
            Codec::Gzip
        } else if head.len() >= 4
            && head[0] == 0x28
            && head[1] == 0xB5
            && head[2] == 0x2F
            && head[3] == 0xFD
        {
            Codec::Zstd
        } else {
            Codec::Plain
        }
    }
}

/// Peek at the first bytes of `reader` and put them back in front
fn sniff<R: Read>(mut reader: R) -> io::Result<(Codec, Chain<Cursor<Vec<u8>>, R>)> {
    let mut head = Vec::with_capacity(4);
    (&mut reader).take(4).read_to_end(&mut head)?;
    let codec = Codec::detect(&head);
    Ok((codec, Cursor::new(head).chain(reader)))
}

/// Wrap a raw source stream in the decoder its magic bytes call for
///
/// With `require_compressed`, a stream that is neither gzip nor zstd is an
/// `InvalidData` error instead of being passed through.
pub fn decompressing_reader<R: Read + Send + 'static>(
    reader: R,
    require_compressed: bool,
) -> io::Result<Box<dyn BufRead + Send>> {
    let (codec, chained) = sniff(reader)?;

    match codec {
        Codec::Gzip => Ok(Box::new(BufReader::with_capacity(
            SOURCE_BUFFER_SIZE,
            MultiGzDecoder::new(chained),
        ))),
        Codec::Zstd => Ok(Box::new(BufReader::with_capacity(
            SOURCE_BUFFER_SIZE,
            zstd::Decoder::new(chained)?,
        ))),
        Codec::Plain if require_compressed => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "not a gzip or zstd stream",
        )),
        Codec::Plain => Ok(Box::new(BufReader::with_capacity(
            SOURCE_BUFFER_SIZE,
            chained,
        ))),
    }
}

/// Open a source file, decompressing it when `compressed` is set
pub fn open_source_path(path: &Path, compressed: bool) -> io::Result<Box<dyn BufRead + Send>> {
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        if extension.eq_ignore_ascii_case("zip") {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!(
                    "ZIP archives are not supported, only gzip and zstd streams. \
                     Extract it first: unzip {}",
                    path.display()
                ),
            ));
        }
    }

    let file = File::open(path)?;
    if compressed {
        decompressing_reader(file, true)
    } else {
        Ok(Box::new(BufReader::with_capacity(SOURCE_BUFFER_SIZE, file)))
    }
}
