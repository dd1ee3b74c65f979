//! Score normalization, linear fusion, and top-k selection.
//!
//! Fusion is a convex combination of two max-normalized score vectors:
//! `fused = alpha * lexical + (1 - alpha) * similarity`. Selection keeps the
//! `k` best entries in a bounded min-heap and sorts only those.

use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Divide every score by the maximum, if the maximum is positive.
///
/// A vector whose maximum is ≤ 0 (or that is empty) is left untouched, so
/// negative values are never shifted and an all-negative similarity vector
/// stays as it is. Positive scaling of the input does not change the output.
pub fn max_normalize(scores: &mut [f32]) {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max > 0.0 {
        for s in scores.iter_mut() {
            *s /= max;
        }
    }
}

/// Linear combination of two position-aligned score vectors.
/// score(d) = alpha * lexical(d) + (1 - alpha) * similarity(d)
pub fn linear_fusion(lexical: &[f32], similarity: &[f32], alpha: f32) -> Vec<f32> {
    debug_assert_eq!(lexical.len(), similarity.len());
    lexical
        .iter()
        .zip(similarity)
        .map(|(&l, &s)| alpha * l + (1.0 - alpha) * s)
        .collect()
}

/// Positions of the `k` highest scores, best first.
///
/// Ties are broken by ascending `ids[i]`, which makes the order independent
/// of the input order. NaN scores rank below every number.
pub fn select_top_k<T: Ord>(scores: &[f32], ids: &[T], k: usize) -> Vec<usize> {
    debug_assert_eq!(scores.len(), ids.len());
    let k = k.min(scores.len());
    if k == 0 {
        return Vec::new();
    }

    // Larger key = better: higher score, then smaller id.
    let key = |i: usize| {
        let s = scores[i];
        let s = if s.is_nan() { f32::NEG_INFINITY } else { s };
        (OrderedFloat(s), Reverse(&ids[i]), i)
    };

    // Partial sort: O(n log k) via min-heap of size k
    let mut heap = BinaryHeap::with_capacity(k + 1);
    for i in 0..scores.len() {
        heap.push(Reverse(key(i)));
        if heap.len() > k {
            heap.pop();
        }
    }

    let mut best: Vec<_> = heap.into_iter().map(|Reverse(entry)| entry).collect();
    best.sort_unstable_by(|a, b| b.cmp(a));
    best.into_iter().map(|(_, _, i)| i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_normalize_positive() {
        let mut v = vec![2.0, 4.0, 0.0];
        max_normalize(&mut v);
        assert_eq!(v, vec![0.5, 1.0, 0.0]);
    }

    #[test]
    fn test_max_normalize_keeps_negative_values() {
        let mut v = vec![-0.5, 2.0];
        max_normalize(&mut v);
        assert_eq!(v, vec![-0.25, 1.0]);
    }

    #[test]
    fn test_max_normalize_all_non_positive_untouched() {
        let mut v = vec![-0.3, -0.9, 0.0];
        max_normalize(&mut v);
        assert_eq!(v, vec![-0.3, -0.9, 0.0]);

        let mut zeros = vec![0.0, 0.0];
        max_normalize(&mut zeros);
        assert_eq!(zeros, vec![0.0, 0.0]);

        let mut empty: Vec<f32> = vec![];
        max_normalize(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_linear_fusion_weights() {
        let lexical = vec![1.0, 0.0];
        let similarity = vec![0.0, 1.0];
        assert_eq!(linear_fusion(&lexical, &similarity, 1.0), vec![1.0, 0.0]);
        assert_eq!(linear_fusion(&lexical, &similarity, 0.0), vec![0.0, 1.0]);
        assert_eq!(linear_fusion(&lexical, &similarity, 0.5), vec![0.5, 0.5]);
    }

    #[test]
    fn test_select_top_k_orders_descending() {
        let scores = vec![0.2, 0.9, 0.5, 0.7];
        let ids = vec![10, 11, 12, 13];
        assert_eq!(select_top_k(&scores, &ids, 3), vec![1, 3, 2]);
    }

    #[test]
    fn test_select_top_k_clamps() {
        let scores = vec![0.1, 0.3];
        let ids = vec![1, 2];
        assert_eq!(select_top_k(&scores, &ids, 10), vec![1, 0]);
        assert!(select_top_k(&scores, &ids, 0).is_empty());
        assert!(select_top_k::<u32>(&[], &[], 5).is_empty());
    }

    #[test]
    fn test_select_top_k_tie_break_by_id() {
        let scores = vec![0.5, 0.5, 0.5, 0.1];
        let ids = vec!["c", "a", "b", "d"];
        assert_eq!(select_top_k(&scores, &ids, 4), vec![1, 2, 0, 3]);
        // The cut at k keeps the smallest ids among equal scores.
        assert_eq!(select_top_k(&scores, &ids, 2), vec![1, 2]);
    }

    #[test]
    fn test_select_top_k_nan_last() {
        let scores = vec![f32::NAN, 0.1, -1.0];
        let ids = vec![0, 1, 2];
        assert_eq!(select_top_k(&scores, &ids, 3), vec![1, 2, 0]);
    }
}
