//! Lenient streaming FASTQ parser
//!
//! Input is organized in fixed 4-line groups: a header line whose first
//! character is the `@` sentinel, the sequence line, a separator line
//! (ignored), and the quality line. Unlike a strict parser, structural
//! anomalies do not fail the stream: a group whose sequence and quality
//! lengths differ is dropped, and a trailing partial group (fewer than four
//! remaining lines) is discarded silently. Zero records is a valid outcome
//! here — the pipeline, not the parser, decides whether that is an error.

use crate::error::Result;
use crate::types::FastqRecord;
use std::io::BufRead;
use tracing::debug;

/// Streaming FASTQ reader over any buffered input
///
/// Yields one [`FastqRecord`] per well-formed 4-line group and counts the
/// groups it had to drop.
///
/// # Example
///
/// ```
/// use seqscope::io::FastqReader;
///
/// let input = "@R1\nACGT\n+\nIIII\n";
/// let records: Vec<_> = FastqReader::new(input.as_bytes())
///     .filter_map(|r| r.ok())
///     .collect();
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].sequence, b"ACGT");
/// ```
pub struct FastqReader<R: BufRead> {
    reader: R,
    line1: String,
    line2: String,
    line3: String,
    line4: String,
    line_number: usize,
    records_dropped: usize,
    finished: bool,
}

impl<R: BufRead> FastqReader<R> {
    /// Create a reader over buffered input
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line1: String::with_capacity(256),
            line2: String::with_capacity(256),
            line3: String::with_capacity(256),
            line4: String::with_capacity(256),
            line_number: 0,
            records_dropped: 0,
            finished: false,
        }
    }

    /// Number of malformed groups dropped so far
    pub fn records_dropped(&self) -> usize {
        self.records_dropped
    }

    /// Read the next 4-line group, skipping malformed ones
    fn read_record(&mut self) -> Result<Option<FastqRecord>> {
        loop {
            self.line1.clear();
            self.line2.clear();
            self.line3.clear();
            self.line4.clear();

            let n1 = self.reader.read_line(&mut self.line1)?;
            if n1 == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            // Skip blank lines between groups (common at end of file)
            if self.line1.trim().is_empty() {
                continue;
            }

            let n2 = self.reader.read_line(&mut self.line2)?;
            let n3 = self.reader.read_line(&mut self.line3)?;
            let n4 = self.reader.read_line(&mut self.line4)?;
            if n2 == 0 || n3 == 0 || n4 == 0 {
                // Trailing partial group, discarded without error
                debug!(line = self.line_number, "discarding partial trailing FASTQ group");
                self.records_dropped += 1;
                return Ok(None);
            }
            self.line_number += 3;

            let header = self.line1.trim();
            // Sentinel character is stripped whatever it is; the separator
            // line is ignored entirely.
            let id = header.get(1..).unwrap_or("").trim().to_string();
            let sequence = self.line2.trim().as_bytes().to_vec();
            let quality = self.line4.trim().as_bytes().to_vec();

            if sequence.len() != quality.len() {
                debug!(
                    line = self.line_number,
                    seq_len = sequence.len(),
                    qual_len = quality.len(),
                    "dropping record with mismatched sequence/quality lengths"
                );
                self.records_dropped += 1;
                continue;
            }

            return Ok(Some(FastqRecord { id, sequence, quality }));
        }
    }
}

impl<R: BufRead> Iterator for FastqReader<R> {
    type Item = Result<FastqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// Parse all records from already-decoded text
///
/// Convenience wrapper over [`FastqReader`] for in-memory content; I/O
/// cannot fail here so malformed groups are simply absent from the output.
pub fn parse_records(content: &str) -> Vec<FastqRecord> {
    FastqReader::new(content.as_bytes())
        .filter_map(|r| r.ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_record() {
        let records = parse_records("@R1\nGGCC\n+\n!!!!");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "R1");
        assert_eq!(records[0].sequence, b"GGCC");
        assert_eq!(records[0].quality, b"!!!!");
    }

    #[test]
    fn parses_multiple_records() {
        let records = parse_records("@R1\nATAT\n+\n((((\n@R2\nGCGC\n+\n((((\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "R1");
        assert_eq!(records[1].id, "R2");
    }

    #[test]
    fn empty_input_yields_no_records() {
        assert!(parse_records("").is_empty());
        assert!(parse_records("\n\n").is_empty());
    }

    #[test]
    fn trailing_partial_group_is_discarded() {
        let records = parse_records("@R1\nACGT\n+\nIIII\n@R2\nACGT\n+");
        // Second group has only 3 lines
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "R1");
    }

    #[test]
    fn mismatched_lengths_are_dropped_not_fatal() {
        let input = "@R1\nACGT\n+\nII\n@R2\nGGGG\n+\nIIII\n";
        let mut reader = FastqReader::new(input.as_bytes());
        let records: Vec<_> = reader.by_ref().filter_map(|r| r.ok()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "R2");
        assert_eq!(reader.records_dropped(), 1);
    }

    #[test]
    fn sequence_and_quality_lengths_always_match() {
        let input = "@a\nACGTACGT\n+\nIIIIIIII\n@b\nAC\n+\nI\n@c\nNNN\n+\nIII\n";
        for record in parse_records(input) {
            assert_eq!(record.sequence.len(), record.quality.len());
        }
    }

    #[test]
    fn record_count_bounded_by_line_count() {
        let input = "@R1\nACGT\n+\nIIII\n@R2\nGG\n+\nII\n@R3\nT\n+\nI\n";
        let lines = input.lines().count();
        let records = parse_records(input);
        assert!(records.len() * 4 <= lines);
    }

    #[test]
    fn separator_line_content_is_ignored() {
        let records = parse_records("@R1\nACGT\n+R1 extra stuff\nIIII\n");
        assert_eq!(records.len(), 1);
    }
}
