use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, Chain, Cursor, Read};
use std::path::Path;

type Prefixed = Chain<Cursor<Vec<u8>>, File>;

/// Streaming reader over a dataset file that may be gzip or zstd compressed.
///
/// The format is detected from magic bytes, not from the file extension:
/// gzip starts with `1F 8B 08`, zstd with `28 B5 2F FD`.
pub enum DecompressionReader {
    Gzip(MultiGzDecoder<BufReader<Prefixed>>),
    Zstd(zstd::Decoder<'static, BufReader<Prefixed>>),
    Plain(Prefixed),
}

impl std::fmt::Debug for DecompressionReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecompressionReader::Gzip(_) => write!(f, "DecompressionReader::Gzip"),
            DecompressionReader::Zstd(_) => write!(f, "DecompressionReader::Zstd"),
            DecompressionReader::Plain(_) => write!(f, "DecompressionReader::Plain"),
        }
    }
}

impl DecompressionReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open dataset file '{}'", path.display()))?;
        Self::detect(file)
            .with_context(|| format!("Failed to read dataset file '{}'", path.display()))
    }

    fn detect(mut file: File) -> std::io::Result<Self> {
        let mut head = [0u8; 4];
        let n = read_prefix(&mut file, &mut head)?;

        // Put the sniffed bytes back in front of the stream
        let chained = Cursor::new(head[..n].to_vec()).chain(file);

        let is_gzip = n >= 3 && head[..3] == [0x1F, 0x8B, 0x08];
        let is_zstd = n >= 4 && head == [0x28, 0xB5, 0x2F, 0xFD];

        if is_gzip {
            Ok(DecompressionReader::Gzip(MultiGzDecoder::new(BufReader::new(chained))))
        } else if is_zstd {
            Ok(DecompressionReader::Zstd(zstd::Decoder::with_buffer(
                BufReader::new(chained),
            )?))
        } else {
            Ok(DecompressionReader::Plain(chained))
        }
    }
}

// A short read from `File` does not mean EOF, so keep reading until the buffer is full.
fn read_prefix(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

impl Read for DecompressionReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            DecompressionReader::Gzip(reader) => reader.read(buf),
            DecompressionReader::Zstd(reader) => reader.read(buf),
            DecompressionReader::Plain(reader) => reader.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CSV: &str = "CASE_STATUS,EMPLOYER_NAME\nCertified,ACME\n";

    fn read_all(path: &Path) -> String {
        let mut reader = DecompressionReader::open(path).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_plain_passthrough() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();
        file.flush().unwrap();

        assert_eq!(read_all(file.path()), CSV);
    }

    #[test]
    fn test_gzip_detected_by_magic_bytes() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(CSV.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&compressed).unwrap();
        file.flush().unwrap();

        assert_eq!(read_all(file.path()), CSV);
    }

    #[test]
    fn test_zstd_detected_by_magic_bytes() {
        let compressed = zstd::encode_all(CSV.as_bytes(), 3).unwrap();

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&compressed).unwrap();
        file.flush().unwrap();

        assert_eq!(read_all(file.path()), CSV);
    }

    #[test]
    fn test_tiny_file_shorter_than_magic() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"a\n").unwrap();
        file.flush().unwrap();

        assert_eq!(read_all(file.path()), "a\n");
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = DecompressionReader::open(Path::new("/nonexistent/LCA.csv")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/LCA.csv"));
    }
}
