//! Record-level analysis operations
//!
//! - [`gc_content`]: G/C base counting
//! - [`stats`]: aggregate and per-position quality statistics
//! - [`clustering`]: GC-bucket clustering and similarity estimation

pub mod clustering;
pub mod gc_content;
pub mod stats;

pub use clustering::{cluster_records, Clustering, ClusteringConfig};
pub use gc_content::{gc_count, gc_fraction};
pub use stats::{compute_stats, phred_score, MAX_QUALITY_POSITIONS, PHRED_OFFSET};
