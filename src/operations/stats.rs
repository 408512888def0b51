//! Statistics engine over parsed FASTQ records
//!
//! All metrics are derived in one pass and returned as an immutable
//! [`FastqStats`]. Input records are never mutated. Quality decoding is
//! garbage-in, garbage-out by contract: the parser has already filtered
//! structural errors, so a quality byte below the Phred+33 offset simply
//! produces a negative score rather than an error.

use crate::operations::gc_content::gc_count;
use crate::types::{FastqRecord, FastqStats, LengthCount, PositionQuality, ScoreCount};
use std::collections::BTreeMap;

/// ASCII offset of Phred+33 quality encoding
pub const PHRED_OFFSET: i32 = 33;

/// Per-position quality is reported for at most this many leading positions
pub const MAX_QUALITY_POSITIONS: usize = 150;

/// Decode one quality byte to its integer Phred score
#[inline]
pub fn phred_score(byte: u8) -> i32 {
    debug_assert!(
        (b'!'..=b'~').contains(&byte),
        "quality byte {byte:#x} outside printable ASCII"
    );
    byte as i32 - PHRED_OFFSET
}

/// Compute aggregate statistics for a record set
///
/// Deterministic for a given input. An empty slice produces all-zero
/// aggregates and empty histograms; rejecting empty input is the pipeline's
/// decision, not this engine's.
pub fn compute_stats(records: &[FastqRecord]) -> FastqStats {
    let mut total_bases = 0u64;
    let mut gc_bases = 0u64;
    let mut quality_sum = 0i64;
    let mut quality_samples = 0u64;
    let mut length_hist: BTreeMap<usize, u64> = BTreeMap::new();
    let mut quality_hist: BTreeMap<i32, u64> = BTreeMap::new();
    let mut position_sum = [0i64; MAX_QUALITY_POSITIONS];
    let mut position_count = [0u64; MAX_QUALITY_POSITIONS];

    for record in records {
        gc_bases += gc_count(&record.sequence) as u64;
        total_bases += record.sequence.len() as u64;
        *length_hist.entry(record.sequence.len()).or_insert(0) += 1;

        for (index, &byte) in record.quality.iter().enumerate() {
            let score = phred_score(byte);
            quality_sum += i64::from(score);
            quality_samples += 1;
            *quality_hist.entry(score).or_insert(0) += 1;
            if index < MAX_QUALITY_POSITIONS {
                position_sum[index] += i64::from(score);
                position_count[index] += 1;
            }
        }
    }

    let avg_quality = if quality_samples > 0 {
        quality_sum as f64 / quality_samples as f64
    } else {
        0.0
    };
    let gc_content = if total_bases > 0 {
        gc_bases as f64 / total_bases as f64 * 100.0
    } else {
        0.0
    };

    // BTreeMap iteration gives the ascending order the histograms require
    let read_length_dist = length_hist
        .into_iter()
        .map(|(length, count)| LengthCount { length, count })
        .collect();
    let quality_dist = quality_hist
        .into_iter()
        .map(|(score, count)| ScoreCount { score, count })
        .collect();

    // Sparse positions are averaged over the records that reach them; a
    // position with no samples produces no entry at all.
    let per_base_quality = (0..MAX_QUALITY_POSITIONS)
        .filter(|&i| position_count[i] > 0)
        .map(|i| PositionQuality {
            pos: i + 1,
            score: position_sum[i] as f64 / position_count[i] as f64,
        })
        .collect();

    FastqStats {
        total_reads: records.len() as u64,
        avg_quality,
        gc_content,
        read_length_dist,
        quality_dist,
        per_base_quality,
    }
}
