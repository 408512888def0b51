//! Input decoding and FASTQ parsing
//!
//! - [`compression`]: byte-level decoding (gzip detection with raw fallback)
//! - [`fastq`]: lenient 4-line-group FASTQ parsing

pub mod compression;
pub mod fastq;

pub use compression::{decode_bytes, is_supported_input, DataSource, SUPPORTED_SUFFIXES};
pub use fastq::{parse_records, FastqReader};
