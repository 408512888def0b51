//! Error types for seqscope

use thiserror::Error;

/// Result type alias for seqscope operations
pub type Result<T> = std::result::Result<T, SeqscopeError>;

/// Error types that can occur in seqscope
///
/// Structural problems in FASTQ input (malformed record groups, truncated
/// trailing groups) are not errors: the parser drops them and keeps going.
/// Likewise a failed gzip decompression falls back to a raw decode of the
/// original bytes. Only conditions that make a run or a connection unusable
/// surface here.
#[derive(Debug, Error)]
pub enum SeqscopeError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input parsed to zero usable records
    #[error("no valid FASTQ records found in input")]
    EmptyInput,

    /// A pipeline stage faulted; the run moved to its failed state
    #[error("pipeline stage '{stage}' failed: {msg}")]
    Stage {
        /// Stage label at the time of the failure
        stage: String,
        /// Failure description
        msg: String,
    },

    /// The progress channel exhausted its reconnect budget or could not connect
    #[error("connection error: {0}")]
    Connection(String),

    /// Input filename carries an unrecognized suffix
    #[error("unsupported input file name: {0}")]
    UnsupportedInput(String),
}
