//! Canonical ordering and overlap resolution for normalized spans

use crate::span::{ResolvedSpans, TextSpan};
use std::cmp::Ordering;
use tracing::debug;

/// Order spans canonically and keep the first claim on every region
///
/// Spans are sorted by `(start, end)`; exact duplicates of that key fall back
/// to type and text so the result never depends on arrival order. A cursor
/// then walks the sorted list: a span is kept only if it starts at or after
/// the cursor, and a kept span moves the cursor to its end. Spans that reach
/// past `text_len` are discarded first. Must be given the spans of every chunk.
pub fn resolve(spans: Vec<TextSpan>, text_len: usize) -> ResolvedSpans {
    let total = spans.len();
    let mut ordered: Vec<TextSpan> = spans
        .into_iter()
        .filter(|span| span.start <= span.end && span.end <= text_len)
        .collect();
    let out_of_bounds = total - ordered.len();

    // WHY: the full key makes equal-range claims order the same in every run
    ordered.sort_by(canonical_order);

    let mut accepted = Vec::with_capacity(ordered.len());
    let mut cursor = 0usize;
    for span in ordered {
        if span.start < cursor {
            continue;
        }
        cursor = cursor.max(span.end);
        accepted.push(span);
    }

    let overlapping = total - out_of_bounds - accepted.len();
    if out_of_bounds > 0 || overlapping > 0 {
        debug!(
            out_of_bounds,
            overlapping,
            kept = accepted.len(),
            "Rejected spans during resolution"
        );
    }

    ResolvedSpans::from_sorted(accepted)
}

fn canonical_order(a: &TextSpan, b: &TextSpan) -> Ordering {
    a.sort_key()
        .cmp(&b.sort_key())
        .then_with(|| a.entity_type.cmp(&b.entity_type))
        .then_with(|| a.text.cmp(&b.text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize) -> TextSpan {
        TextSpan::new("PERSON", "", start, end)
    }

    fn bounds(resolved: &ResolvedSpans) -> Vec<(usize, usize)> {
        resolved.iter().map(|s| (s.start, s.end)).collect()
    }

    #[test]
    fn test_earliest_start_wins() {
        let resolved = resolve(vec![span(3, 8), span(0, 5)], 10);
        assert_eq!(bounds(&resolved), vec![(0, 5)]);
    }

    #[test]
    fn test_same_start_shorter_span_claims_first() {
        let resolved = resolve(vec![span(0, 9), span(0, 4), span(4, 6)], 10);
        assert_eq!(bounds(&resolved), vec![(0, 4), (4, 6)]);
    }

    #[test]
    fn test_adjacent_spans_are_both_kept() {
        let resolved = resolve(vec![span(5, 10), span(0, 5)], 10);
        assert_eq!(bounds(&resolved), vec![(0, 5), (5, 10)]);
    }

    #[test]
    fn test_contained_span_is_rejected() {
        let resolved = resolve(vec![span(0, 10), span(2, 4), span(10, 12)], 20);
        assert_eq!(bounds(&resolved), vec![(0, 10), (10, 12)]);
    }

    #[test]
    fn test_degenerate_span_is_accepted_without_moving_cursor_past_it() {
        let resolved = resolve(vec![span(3, 3), span(3, 6), span(1, 2)], 10);
        assert_eq!(bounds(&resolved), vec![(1, 2), (3, 3), (3, 6)]);
    }

    #[test]
    fn test_spans_past_text_end_are_dropped() {
        let resolved = resolve(vec![span(0, 2), span(4, 11)], 10);
        assert_eq!(bounds(&resolved), vec![(0, 2)]);
    }

    #[test]
    fn test_result_is_independent_of_arrival_order() {
        let forward = vec![
            TextSpan::new("PERSON", "Ann", 0, 3),
            TextSpan::new("COMPANY", "Ann", 0, 3),
            span(2, 7),
            span(7, 9),
        ];
        let mut backward = forward.clone();
        backward.reverse();

        assert_eq!(resolve(forward, 10), resolve(backward, 10));
    }

    #[test]
    fn test_empty_input() {
        assert!(resolve(Vec::new(), 0).is_empty());
    }
}
