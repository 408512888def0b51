//! Input decoding with transparent gzip support
//!
//! Raw input bytes may be plain FASTQ text or a gzip container around it.
//! Detection is by the gzip magic bytes, not the filename: suffixes are only
//! used for upload-time validation hints. A failed decompression is never
//! fatal — the bytes are re-decoded as raw text and the parser gets whatever
//! comes out (possibly zero records, which is a valid degenerate outcome).

use crate::error::Result;
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::warn;

/// First two bytes of a gzip stream
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Filename suffixes accepted by upload validation
pub const SUPPORTED_SUFFIXES: &[&str] =
    &[".fastq", ".fq", ".fastq.gz", ".fq.gz", ".fasta", ".fa", ".gz"];

/// Check whether a filename carries a supported suffix
///
/// This is a validation hint only; decoding looks at the bytes, not the name.
///
/// # Example
///
/// ```
/// use seqscope::io::is_supported_input;
///
/// assert!(is_supported_input("sample.fastq.gz"));
/// assert!(!is_supported_input("sample.bam"));
/// ```
pub fn is_supported_input(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SUPPORTED_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

/// Source of raw read-file bytes
///
/// The upload transport lives outside this crate; callers hand the pipeline
/// either a local path or the already-received bytes.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// Local file path
    Path(PathBuf),
    /// In-memory bytes, e.g. from an upload handler
    Bytes(Vec<u8>),
}

impl DataSource {
    /// Create a data source from a local file path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        DataSource::Path(path.as_ref().to_path_buf())
    }

    /// Create a data source from in-memory bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        DataSource::Bytes(bytes.into())
    }

    /// Read and decode the source into text
    ///
    /// # Errors
    ///
    /// Fails only on file I/O; decompression problems fall back to a raw
    /// decode of the original bytes.
    pub fn decode(&self) -> Result<String> {
        match self {
            DataSource::Path(path) => Ok(decode_bytes(&fs::read(path)?)),
            DataSource::Bytes(bytes) => Ok(decode_bytes(bytes)),
        }
    }
}

/// Decode possibly-gzipped bytes into text
///
/// Gzip input (detected by magic bytes) is decompressed with [`GzDecoder`].
/// On any decompression error the original bytes are decoded as lossy UTF-8
/// instead, matching the contract that a bad container degrades to a raw
/// parse rather than failing the run.
pub fn decode_bytes(bytes: &[u8]) -> String {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut text = String::new();
        match GzDecoder::new(bytes).read_to_string(&mut text) {
            Ok(_) => return text,
            Err(err) => {
                warn!(error = %err, "gzip decompression failed, falling back to raw decode");
            }
        }
    }
    String::from_utf8_lossy(bytes).into_owned()
}
