use soundalike_common::{Result, SoundalikeError};
use tracing::debug;

use crate::index::FlatIndex;
use crate::store::EmbeddingStore;
use crate::types::Recommendation;

/// The `n` tracks closest to `track`, closest first, never including `track`.
///
/// The query row is looked up in the store and searched with `n + 1`
/// neighbors, since the track itself is normally its own nearest hit. Its
/// position is then filtered out and the rest truncated to `n`. The search
/// is not narrowed by identifier beforehand: with duplicate vectors that
/// would change which tracks make the cut.
///
/// Fewer than `n` results is fine for a small catalog; none at all is
/// `EmptyRecommendation`.
pub fn recommend(
    store: &EmbeddingStore,
    index: &FlatIndex,
    track: &str,
    n: usize,
) -> Result<Vec<Recommendation>> {
    if n == 0 {
        return Err(SoundalikeError::invalid_input("top_n must be at least 1"));
    }
    if index.len() != store.len() || index.dimension() != store.dimension() {
        return Err(SoundalikeError::corrupt_store(format!(
            "Index ({} x {}) does not match store ({} x {})",
            index.len(),
            index.dimension(),
            store.len(),
            store.dimension()
        )));
    }

    let position = store
        .position_of(track)
        .ok_or_else(|| SoundalikeError::track_not_found(track))?;
    let query = store.vector_at(position).ok_or_else(|| {
        SoundalikeError::corrupt_store(format!("Track {} has no vector", track))
    })?;

    let hits = index.search(query, n.saturating_add(1))?;

    let recommendations: Vec<Recommendation> = hits
        .into_iter()
        .filter(|hit| hit.position != position)
        .take(n)
        .map(|hit| {
            store
                .identifier_at(hit.position)
                .map(|id| Recommendation::new(id, hit.distance))
                .ok_or_else(|| {
                    SoundalikeError::corrupt_store(format!(
                        "Index position {} has no track",
                        hit.position
                    ))
                })
        })
        .collect::<Result<_>>()?;

    if recommendations.is_empty() {
        return Err(SoundalikeError::empty_recommendation(track));
    }

    debug!("{} recommendations for {}", recommendations.len(), track);
    Ok(recommendations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::store_of;

    fn catalog(entries: &[(&str, Vec<f32>)]) -> (EmbeddingStore, FlatIndex) {
        let store = store_of(entries);
        let index = FlatIndex::build(store.vectors()).unwrap();
        (store, index)
    }

    fn abc() -> (EmbeddingStore, FlatIndex) {
        catalog(&[
            ("A", vec![0.0, 0.0]),
            ("B", vec![1.0, 0.0]),
            ("C", vec![5.0, 5.0]),
        ])
    }

    #[test]
    fn test_nearest_other_track() {
        let (store, index) = abc();
        let result = recommend(&store, &index, "A", 1).unwrap();
        assert_eq!(result, vec![Recommendation::new("B", 1.0)]);
    }

    #[test]
    fn test_ranked_and_truncated() {
        let (store, index) = abc();
        let result = recommend(&store, &index, "C", 2).unwrap();
        assert_eq!(
            result,
            vec![Recommendation::new("B", 41.0), Recommendation::new("A", 50.0)]
        );
    }

    #[test]
    fn test_small_catalog_returns_what_exists() {
        let (store, index) = abc();
        let result = recommend(&store, &index, "A", 10).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_never_includes_query() {
        let (store, index) = abc();
        for id in ["A", "B", "C"] {
            for n in 1..=3 {
                let result = recommend(&store, &index, id, n).unwrap();
                assert!(result.iter().all(|r| r.track != id));
            }
        }
    }

    #[test]
    fn test_duplicate_vectors_keep_the_twin() {
        // X and Y are identical; X sorts first at distance 0
        let (store, index) = catalog(&[
            ("X", vec![1.0, 1.0]),
            ("Y", vec![1.0, 1.0]),
            ("Z", vec![4.0, 5.0]),
        ]);
        let result = recommend(&store, &index, "Y", 1).unwrap();
        assert_eq!(result, vec![Recommendation::new("X", 0.0)]);
    }

    #[test]
    fn test_single_track_catalog_is_empty() {
        let (store, index) = catalog(&[("only", vec![1.0, 2.0])]);
        assert!(matches!(
            recommend(&store, &index, "only", 5),
            Err(SoundalikeError::EmptyRecommendation(_))
        ));
    }

    #[test]
    fn test_unknown_track() {
        let (store, index) = abc();
        assert!(matches!(
            recommend(&store, &index, "unknown", 5),
            Err(SoundalikeError::TrackNotFound(_))
        ));
    }

    #[test]
    fn test_zero_n_rejected() {
        let (store, index) = abc();
        assert!(matches!(
            recommend(&store, &index, "A", 0),
            Err(SoundalikeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_mismatched_index_rejected() {
        let (store, _) = abc();
        let (_, other_index) = catalog(&[("A", vec![0.0, 0.0]), ("B", vec![1.0, 0.0])]);
        assert!(matches!(
            recommend(&store, &other_index, "A", 1),
            Err(SoundalikeError::CorruptStore(_))
        ));
    }
}
