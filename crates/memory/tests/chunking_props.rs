//! Property tests for chunk coverage and vector ranking.

use civicbot_memory::chunker::Chunker;
use civicbot_memory::vector::{cosine_similarity, rank_by_similarity, select_diverse};
use proptest::prelude::*;

/// Undo the overlap: every chunk after the first starts `overlap` chars
/// inside its predecessor.
fn reassemble(chunks: &[&str], overlap: usize) -> String {
    let mut text = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            text.push_str(chunk);
        } else {
            text.extend(chunk.chars().skip(overlap));
        }
    }
    text
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn chunks_cover_text_exactly(
        text in "[a-zăîșțâ ]{0,400}",
        chunk_size in 1usize..60,
        overlap_seed in 0usize..60,
    ) {
        let overlap = overlap_seed % chunk_size;
        let chunker = Chunker::new(chunk_size, overlap).unwrap();
        let chunks = chunker.chunk(&text);

        prop_assert!(!chunks.is_empty());
        prop_assert!(chunks.iter().all(|c| c.chars().count() <= chunk_size));
        prop_assert_eq!(reassemble(&chunks, overlap), text);
    }

    #[test]
    fn stride_below_one_is_rejected(chunk_size in 0usize..100, extra in 0usize..100) {
        prop_assert!(Chunker::new(chunk_size, chunk_size + extra).is_err());
    }

    #[test]
    fn self_similarity_is_one(v in proptest::collection::vec(-10.0f32..10.0, 1..32)) {
        prop_assume!(v.iter().any(|x| x.abs() > 1e-3));
        prop_assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
        let zero = vec![0.0; v.len()];
        prop_assert_eq!(cosine_similarity(&zero, &v), 0.0);
    }

    #[test]
    fn diverse_selection_size(
        sources in proptest::collection::vec(0u8..4, 0..40),
        top_k in 1usize..10,
        multiplier in 1usize..4,
    ) {
        let names: Vec<String> = sources.iter().map(|s| format!("doc{s}.txt")).collect();
        let vectors: Vec<Vec<f32>> = (0..names.len()).map(|i| vec![1.0, i as f32]).collect();
        let ranked = rank_by_similarity(&[1.0, 0.0], vectors.iter().map(Vec::as_slice));
        let picked = select_diverse(&ranked, |p| names[p].as_str(), top_k, top_k * multiplier);

        prop_assert_eq!(picked.len(), top_k.min(names.len()));
        // rank order preserved
        prop_assert!(picked.windows(2).all(|w| w[0].1 >= w[1].1));
    }
}
