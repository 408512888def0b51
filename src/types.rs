//! Common types used throughout seqscope

use serde::{Deserialize, Serialize};

/// A FASTQ record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqRecord {
    /// Sequence identifier (without '@' prefix)
    pub id: String,
    /// DNA/RNA sequence
    pub sequence: Vec<u8>,
    /// Quality scores (Phred+33 encoded)
    pub quality: Vec<u8>,
}

impl FastqRecord {
    /// Create a new FASTQ record
    pub fn new(id: String, sequence: Vec<u8>, quality: Vec<u8>) -> Self {
        Self { id, sequence, quality }
    }

    /// Check if the record has an empty sequence
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Number of bases in the record
    pub fn len(&self) -> usize {
        self.sequence.len()
    }
}

/// One entry of the read-length histogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthCount {
    /// Exact read length in bases
    pub length: usize,
    /// Number of records with that length
    pub count: u64,
}

/// One entry of the quality-score histogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreCount {
    /// Integer Phred score. May fall outside the usual 0-41 range for
    /// malformed quality strings; the parser only filters structural errors.
    pub score: i32,
    /// Number of quality samples with that score
    pub count: u64,
}

/// Mean quality at one read position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionQuality {
    /// 1-based position within the read
    pub pos: usize,
    /// Mean Phred score over all records that have a base at this position
    pub score: f64,
}

/// Aggregate quality statistics for one parsed read set
///
/// Immutable once computed; owned by the [`AnalysisResult`] it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastqStats {
    /// Total number of parsed records
    pub total_reads: u64,
    /// Arithmetic mean over every quality-score sample, 0 when there are none
    pub avg_quality: f64,
    /// G/C bases as a percentage of all bases, 0 when there are none
    pub gc_content: f64,
    /// Read-length histogram, ascending by length
    pub read_length_dist: Vec<LengthCount>,
    /// Quality-score histogram, ascending by score
    pub quality_dist: Vec<ScoreCount>,
    /// Per-position mean quality for the first 150 positions. Positions past
    /// the end of shorter reads are averaged over the records that reach them.
    pub per_base_quality: Vec<PositionQuality>,
}

/// One record's placement in the 2D cluster projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPoint {
    /// X coordinate of the projected point
    pub x: f64,
    /// Y coordinate of the projected point
    pub y: f64,
    /// Dense cluster identifier, 0..K-1 in first-encounter order
    pub cluster_id: usize,
    /// Identifier of the source record
    pub sequence_id: String,
}

/// Square matrix of inter-cluster similarity scores in [0, 1]
///
/// The diagonal is always 1.0 (self-similarity). Off-diagonal entries are
/// independent draws and are not symmetric unless symmetry was requested in
/// the clustering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimilarityMatrix(Vec<Vec<f64>>);

impl SimilarityMatrix {
    /// Wrap a row-major matrix. Rows must all have `values.len()` entries.
    pub fn new(values: Vec<Vec<f64>>) -> Self {
        debug_assert!(values.iter().all(|row| row.len() == values.len()));
        Self(values)
    }

    /// Matrix dimension (number of clusters)
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Similarity of cluster `i` to cluster `j`
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.0[i][j]
    }

    /// Row-major view of the matrix
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.0
    }
}

/// Combined output of one completed analysis run
///
/// Created once per run on reaching the complete state and handed to the
/// caller; never mutated afterwards and never shared between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Aggregate quality statistics
    pub stats: FastqStats,
    /// One point per clustered record, in input order
    pub clusters: Vec<ClusterPoint>,
    /// Pairwise inter-cluster similarity
    pub similarity_matrix: SimilarityMatrix,
    /// Display names, parallel to the matrix indices
    pub cluster_names: Vec<String>,
}
