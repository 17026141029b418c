// REELFORGE Sync Validator
// Copyright (c) 2026 Reelforge Contributors
//
// Advisory watchdog over the audio segment map. Overlaps mean two narration
// chunks would speak at once; oversized gaps mean dead air beyond the
// intentional pause padding. Never fatal, never throws.

use super::spec::{AudioSegment, AudioSegmentMap};
use tracing::warn;

/// Maximum tolerated silence between adjacent segments before a warning.
/// Covers the pause padding plus jitter from variable-length synthesis.
pub const MAX_SEGMENT_GAP_SECS: f64 = 2.0;

/// Human-readable sync diagnostics. `valid` is true iff there are zero
/// errors; warnings never clear it.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Check adjacent-segment consistency over the start-sorted segment map.
pub fn check_sync(segments: &AudioSegmentMap) -> SyncReport {
    let mut ordered: Vec<(&String, &AudioSegment)> = segments.iter().collect();
    ordered.sort_by(|a, b| {
        a.1.start
            .partial_cmp(&b.1.start)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut report = SyncReport {
        valid: true,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    for pair in ordered.windows(2) {
        let (id_a, seg_a) = pair[0];
        let (id_b, seg_b) = pair[1];

        if seg_b.start.0 < seg_a.end.0 {
            let overlap = seg_a.end.0 - seg_b.start.0;
            report.errors.push(format!(
                "{} overlaps {} by {:.2}s",
                id_a, id_b, overlap
            ));
        } else {
            let gap = seg_b.start.0 - seg_a.end.0;
            if gap > MAX_SEGMENT_GAP_SECS {
                report.warnings.push(format!(
                    "large gap of {:.2}s between {} and {}",
                    gap, id_a, id_b
                ));
            }
        }
    }

    report.valid = report.errors.is_empty();
    if !report.valid {
        warn!("[SYNC] ⚠️ {} overlap error(s) detected", report.errors.len());
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::narration::PAUSE_PADDING_SECS;
    use crate::timeline::spec::TimelineSecs;

    fn segments(entries: &[(&str, f64, f64)]) -> AudioSegmentMap {
        entries
            .iter()
            .map(|(id, start, end)| {
                (
                    id.to_string(),
                    AudioSegment {
                        path: format!("/tmp/{}.wav", id),
                        start: TimelineSecs(*start),
                        end: TimelineSecs(*end),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_overlap_is_an_error() {
        let map = segments(&[("chunk1", 0.0, 2.0), ("chunk2", 1.5, 3.0)]);
        let report = check_sync(&map);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("0.50s"));
    }

    #[test]
    fn test_padding_sized_gaps_are_silent() {
        let map = segments(&[
            ("chunk1", 0.0, 2.0),
            ("chunk2", 3.5, 5.0),
            ("chunk3", 6.5, 8.0),
        ]);
        let report = check_sync(&map);
        assert!(report.valid);
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_large_gap_warns_but_stays_valid() {
        let map = segments(&[("chunk1", 0.0, 2.0), ("chunk2", 4.5, 6.0)]);
        let report = check_sync(&map);
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("2.50s"));
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        // Map iteration order is key order; chunk10 sorts before chunk2
        // lexically but later temporally. The checker must sort by start.
        let map = segments(&[("chunk10", 20.0, 22.0), ("chunk2", 0.0, 2.0)]);
        let report = check_sync(&map);
        assert!(report.valid);
        // 18s of silence between them
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_empty_and_single_segment_are_valid() {
        assert!(check_sync(&AudioSegmentMap::new()).valid);
        let map = segments(&[("chunk1", 0.0, 2.0)]);
        assert!(check_sync(&map).valid);
    }

    #[test]
    fn test_tolerance_covers_pause_padding() {
        assert!(PAUSE_PADDING_SECS < MAX_SEGMENT_GAP_SECS);
    }
}
