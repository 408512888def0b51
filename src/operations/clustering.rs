//! GC-bucket clustering and inter-cluster similarity estimation
//!
//! Records are bucketed by GC decile: `floor(gc_percent / 10)` gives at most
//! 11 buckets for 0-100%. Each non-empty bucket becomes one cluster, numbered
//! densely in the order buckets are first encountered.
//!
//! The 2D coordinates are a documented placeholder for a real embedding
//! projection: each point is independent random jitter around the origin, so
//! points of one cluster do not actually group visually. Similarity scores
//! are likewise independent draws in a fixed sub-range with the diagonal
//! forced to 1.0. Both can be made reproducible with a seed, and the matrix
//! can optionally be forced symmetric; by default the off-diagonal draws are
//! left independent and therefore asymmetric.

use crate::operations::gc_content::gc_fraction;
use crate::types::{ClusterPoint, FastqRecord, SimilarityMatrix};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Tuning knobs for the clustering estimator
#[derive(Debug, Clone)]
pub struct ClusteringConfig {
    /// Seed for the jitter/similarity RNG; `None` draws from OS entropy
    pub seed: Option<u64>,
    /// Mirror the upper triangle of the similarity matrix onto the lower
    pub symmetric: bool,
    /// Points land uniformly in `[-jitter, jitter)` on both axes
    pub jitter: f64,
    /// Half-open range for off-diagonal similarity draws
    pub similarity_range: (f64, f64),
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            seed: None,
            symmetric: false,
            jitter: 10.0,
            similarity_range: (0.3, 0.7),
        }
    }
}

/// Output of one clustering pass
#[derive(Debug, Clone)]
pub struct Clustering {
    /// One point per input record, in input order
    pub points: Vec<ClusterPoint>,
    /// Pairwise cluster similarity, `cluster_count()` square
    pub matrix: SimilarityMatrix,
    /// Display names parallel to the matrix indices
    pub cluster_names: Vec<String>,
}

impl Clustering {
    /// Number of non-empty GC buckets found
    pub fn cluster_count(&self) -> usize {
        self.cluster_names.len()
    }
}

/// Partition records into GC-decile clusters and estimate similarity
///
/// Zero records produce zero clusters and an empty matrix. Records are not
/// mutated; a record with an empty id gets a synthetic `SEQ_{index}` one.
pub fn cluster_records(records: &[FastqRecord], config: &ClusteringConfig) -> Clustering {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut bucket_ids: HashMap<u32, usize> = HashMap::new();
    let mut points = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        if record.is_empty() {
            continue;
        }
        let gc_percent = gc_fraction(&record.sequence) * 100.0;
        let bucket = (gc_percent / 10.0).floor() as u32;
        let next_id = bucket_ids.len();
        let cluster_id = *bucket_ids.entry(bucket).or_insert(next_id);

        let sequence_id = if record.id.is_empty() {
            format!("SEQ_{index}")
        } else {
            record.id.clone()
        };
        points.push(ClusterPoint {
            x: rng.gen_range(-config.jitter..config.jitter),
            y: rng.gen_range(-config.jitter..config.jitter),
            cluster_id,
            sequence_id,
        });
    }

    let cluster_count = bucket_ids.len();
    let matrix = similarity_matrix(cluster_count, config, &mut rng);
    let cluster_names = (0..cluster_count).map(|i| format!("Cluster {i}")).collect();

    Clustering { points, matrix, cluster_names }
}

/// Draw a similarity matrix for `count` clusters
///
/// Diagonal entries are exactly 1.0. Off-diagonal entries are independent
/// draws from the configured range; when `symmetric` is set the upper
/// triangle is mirrored instead of drawing the lower one.
fn similarity_matrix(count: usize, config: &ClusteringConfig, rng: &mut StdRng) -> SimilarityMatrix {
    let (lo, hi) = config.similarity_range;
    let mut values: Vec<Vec<f64>> = (0..count)
        .map(|i| {
            (0..count)
                .map(|j| if i == j { 1.0 } else { rng.gen_range(lo..hi) })
                .collect()
        })
        .collect();

    if config.symmetric {
        for i in 0..count {
            for j in (i + 1)..count {
                values[j][i] = values[i][j];
            }
        }
    }

    SimilarityMatrix::new(values)
}
