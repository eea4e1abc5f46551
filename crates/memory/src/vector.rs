//! Vector similarity and diversity-aware ranking.

use std::collections::HashSet;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector has zero norm, the lengths differ (service
/// and fallback vectors can coexist in one store), or the result is not
/// finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    let score = (dot / denom) as f32;
    if !score.is_finite() {
        return 0.0;
    }
    score.clamp(-1.0, 1.0)
}

/// Score every vector against `query` and sort by descending similarity.
///
/// Returns `(position, score)` pairs. Ties keep insertion order.
pub fn rank_by_similarity<'a, I>(query: &[f32], vectors: I) -> Vec<(usize, f32)>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut scored: Vec<(usize, f32)> = vectors
        .into_iter()
        .enumerate()
        .map(|(i, v)| (i, cosine_similarity(query, v)))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
}

/// Pick up to `top_k` ranked candidates, preferring distinct sources.
///
/// The first pass walks the best `scan_window` candidates and takes one
/// per source. If that yields fewer than `top_k`, the remaining slots are
/// filled from all other candidates in rank order, repeats allowed. The
/// selection is returned in rank order.
pub fn select_diverse<'a, F>(
    ranked: &[(usize, f32)],
    source_of: F,
    top_k: usize,
    scan_window: usize,
) -> Vec<(usize, f32)>
where
    F: Fn(usize) -> &'a str,
{
    let mut picked = vec![false; ranked.len()];
    let mut seen: HashSet<&str> = HashSet::new();
    let mut count = 0;

    for (rank, (position, _)) in ranked.iter().enumerate().take(scan_window) {
        if count == top_k {
            break;
        }
        if seen.insert(source_of(*position)) {
            picked[rank] = true;
            count += 1;
        }
    }

    for flag in picked.iter_mut() {
        if count == top_k {
            break;
        }
        if !*flag {
            *flag = true;
            count += 1;
        }
    }

    ranked
        .iter()
        .zip(picked)
        .filter_map(|(candidate, keep)| keep.then_some(*candidate))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn opposite_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_scores_zero() {
        let zero = vec![0.0, 0.0, 0.0];
        let v = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&zero, &v), 0.0);
        assert_eq!(cosine_similarity(&v, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn different_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn non_finite_components_score_zero() {
        assert_eq!(cosine_similarity(&[f32::INFINITY, 1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[f32::NEG_INFINITY, 0.0]), 0.0);
    }

    #[test]
    fn ranking_with_poisoned_vectors_stays_in_range() {
        let vectors: Vec<Vec<f32>> = (0..64)
            .map(|i| match i % 3 {
                0 => vec![f32::NAN, 1.0],
                1 => vec![f32::INFINITY, 0.0],
                _ => vec![1.0, i as f32],
            })
            .collect();
        let ranked = rank_by_similarity(&[1.0, 1.0], vectors.iter().map(Vec::as_slice));

        assert_eq!(ranked.len(), 64);
        assert!(ranked.iter().all(|(_, s)| (-1.0..=1.0).contains(s)));
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn ranking_is_descending_and_stable() {
        let vectors: Vec<Vec<f32>> = vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![1.0, 0.0],
        ];
        let ranked = rank_by_similarity(&[1.0, 0.0], vectors.iter().map(Vec::as_slice));
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![1, 3, 2, 0]);
    }

    fn ranked(n: usize) -> Vec<(usize, f32)> {
        (0..n).map(|i| (i, 1.0 - i as f32 * 0.01)).collect()
    }

    #[test]
    fn prefers_distinct_sources_within_window() {
        // positions 0..=9 from a.txt, 10 from b.txt, ranked by position
        let sources: Vec<&str> = (0..11).map(|i| if i == 7 { "b.txt" } else { "a.txt" }).collect();
        let picked = select_diverse(&ranked(11), |p| sources[p], 3, 9);
        let positions: Vec<usize> = picked.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, vec![0, 1, 7]);
    }

    #[test]
    fn source_outside_window_is_not_promoted() {
        let sources: Vec<&str> = (0..11).map(|i| if i == 10 { "b.txt" } else { "a.txt" }).collect();
        let picked = select_diverse(&ranked(11), |p| sources[p], 3, 9);
        let positions: Vec<usize> = picked.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn fills_past_window_to_reach_top_k() {
        let sources = ["a", "a", "a", "a", "a", "a"];
        let picked = select_diverse(&ranked(6), |p| sources[p], 5, 2);
        assert_eq!(picked.len(), 5);
    }

    #[test]
    fn fewer_candidates_than_top_k() {
        let sources = ["a", "b"];
        assert_eq!(select_diverse(&ranked(2), |p| sources[p], 5, 15).len(), 2);
        assert!(select_diverse(&[], |_| "x", 5, 15).is_empty());
    }

    #[test]
    fn all_distinct_takes_top_k_best() {
        let sources = ["a", "b", "c", "d", "e"];
        let picked = select_diverse(&ranked(5), |p| sources[p], 3, 9);
        let positions: Vec<usize> = picked.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }
}
