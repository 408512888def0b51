//! GC content calculation

/// Count G and C bases in a sequence, case-insensitive
pub fn gc_count(seq: &[u8]) -> usize {
    seq.iter()
        .filter(|&&base| matches!(base, b'G' | b'C' | b'g' | b'c'))
        .count()
}

/// GC fraction of a sequence (0.0 to 1.0)
///
/// Returns 0.0 for an empty sequence.
///
/// # Example
///
/// ```
/// use seqscope::operations::gc_fraction;
///
/// assert_eq!(gc_fraction(b"GGCC"), 1.0);
/// assert_eq!(gc_fraction(b"ATAT"), 0.0);
/// assert_eq!(gc_fraction(b"ACGT"), 0.5);
/// ```
pub fn gc_fraction(seq: &[u8]) -> f64 {
    if seq.is_empty() {
        return 0.0;
    }
    gc_count(seq) as f64 / seq.len() as f64
}
