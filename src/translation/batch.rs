/*!
 * Segment batching.
 *
 * Partitions an ordered segment list into contiguous, provider-sized groups
 * while preserving order and index traceability. Pure functions; nothing
 * here talks to the network.
 */

use crate::subtitle_processor::Segment;

/// An ordered, contiguous slice of segments bound for one provider call
#[derive(Debug, Clone)]
pub struct Batch {
    /// Position of the batch in the run, 0-based
    pub batch_index: usize,

    /// Target language code for this batch
    pub target_language: String,

    /// The segments of the batch, in original order
    pub segments: Vec<Segment>,
}

impl Batch {
    /// Source texts of the batch, in order
    pub fn source_texts(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.source_text.as_str()).collect()
    }

    /// Whether every segment carries a translation
    pub fn is_translated(&self) -> bool {
        self.segments.iter().all(|s| s.translated_text.is_some())
    }

    /// Number of segments carrying a translation
    pub fn translated_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| s.translated_text.is_some())
            .count()
    }

    /// Number of segments in the batch
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Split ordered segments into contiguous batches of at most
/// `max_batch_size` segments.
///
/// No segment appears in two batches, and concatenating all batches in
/// order reconstructs the input exactly. Segments already carrying a
/// translation (from a resume merge) are batched like any other - the
/// translation client skips them when building requests.
pub fn make_batches(segments: &[Segment], max_batch_size: usize, target_language: &str) -> Vec<Batch> {
    let size = max_batch_size.max(1);

    segments
        .chunks(size)
        .enumerate()
        .map(|(batch_index, chunk)| Batch {
            batch_index,
            target_language: target_language.to_string(),
            segments: chunk.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(n: usize) -> Vec<Segment> {
        (0..n)
            .map(|i| Segment::new(i, i as u64 * 2000, i as u64 * 2000 + 1500, format!("line {}", i)))
            .collect()
    }

    #[test]
    fn test_makeBatches_shouldRespectMaxSize() {
        let input = segments(25);
        let batches = make_batches(&input, 10, "fa");
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 10);
        assert_eq!(batches[1].len(), 10);
        assert_eq!(batches[2].len(), 5);
        assert!(batches.iter().all(|b| b.target_language == "fa"));
    }

    #[test]
    fn test_makeBatches_concatenation_shouldReconstructInput() {
        for (count, size) in [(0usize, 7usize), (1, 1), (7, 7), (8, 7), (40, 13), (100, 30)] {
            let input = segments(count);
            let batches = make_batches(&input, size, "fa");

            let rebuilt: Vec<&Segment> = batches.iter().flat_map(|b| b.segments.iter()).collect();
            assert_eq!(rebuilt.len(), input.len());
            for (a, b) in input.iter().zip(rebuilt) {
                assert_eq!(a.index, b.index);
                assert_eq!(a.source_text, b.source_text);
            }
        }
    }

    #[test]
    fn test_makeBatches_shouldNumberBatchesSequentially() {
        let input = segments(21);
        let batches = make_batches(&input, 10, "fa");
        let indices: Vec<usize> = batches.iter().map(|b| b.batch_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_makeBatches_withZeroSize_shouldClampToOne() {
        let input = segments(3);
        let batches = make_batches(&input, 0, "fa");
        assert_eq!(batches.len(), 3);
    }

    #[test]
    fn test_batchHelpers_shouldReportTranslationState() {
        let mut input = segments(2);
        let mut batch = make_batches(&input, 10, "fa").remove(0);
        assert!(!batch.is_translated());
        assert_eq!(batch.translated_count(), 0);

        for segment in &mut batch.segments {
            segment.translated_text = Some("ترجمه".to_string());
        }
        assert!(batch.is_translated());

        input.clear();
        assert!(make_batches(&input, 10, "fa").is_empty());
    }
}
