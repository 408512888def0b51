//! seqscope: FASTQ analysis pipeline with live progress streaming
//!
//! # Overview
//!
//! seqscope ingests genomic read files and produces quality statistics,
//! sequence clusters, and inter-cluster similarity scores, while streaming
//! per-stage progress to subscribers over a reconnecting duplex channel.
//! Upload transport, storage, authentication, and report rendering are
//! external concerns: callers hand this crate bytes and a job id and get an
//! [`AnalysisResult`] back.
//!
//! ## Quick start
//!
//! ```
//! use seqscope::io::DataSource;
//! use seqscope::pipeline::Pipeline;
//! use seqscope::progress::NullSink;
//!
//! # fn main() -> seqscope::Result<()> {
//! let pipeline = Pipeline::new(NullSink);
//! let source = DataSource::from_bytes("@R1\nGGCC\n+\nIIII".as_bytes());
//! let result = pipeline.run("job-1", &source)?;
//! assert_eq!(result.stats.gc_content, 100.0);
//! # Ok(())
//! # }
//! ```
//!
//! Live progress goes through a [`progress::ProgressChannel`] instead of
//! [`progress::NullSink`]; subscribers on the other end of the connection
//! receive one event per stage transition, FIFO per job id.
//!
//! ## Module organization
//!
//! - [`io`]: input decoding (gzip with raw fallback) and lenient FASTQ parsing
//! - [`operations`]: statistics engine and GC-bucket clustering estimator
//! - [`pipeline`]: the per-job stage machine tying the pieces together
//! - [`progress`]: progress events and the reconnecting channel

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod io;
pub mod operations;
pub mod pipeline;
pub mod progress;
pub mod types;

pub use error::{Result, SeqscopeError};
pub use pipeline::{JobStage, Pipeline};
pub use progress::{AnalysisStatus, ProgressChannel, ProgressEvent, ProgressSink};
pub use types::{AnalysisResult, ClusterPoint, FastqRecord, FastqStats, SimilarityMatrix};
