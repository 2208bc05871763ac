use tracing::debug;

use crate::{
    corpus::Embedded,
    error::{Error, Result},
};

/// Cosine distance between two vectors of equal length.
///
/// `0.0` means identical direction and `2.0` opposite direction. A zero-length
/// vector has no direction, so it's treated as orthogonal to everything.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);

    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));

        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator == 0.0 {
        return 1.0;
    }

    (1.0 - dot / denominator) as f32
}

/// Orders `items` nearest-first by cosine distance to `query`.
///
/// The sort is stable, so equally distant items keep their corpus order.
///
/// # Errors
///
/// Returns [`Error::DimensionMismatch`] if an item's vector length differs from the query's.
pub fn rank<'a, T: Embedded>(query: &[f32], items: &'a [T]) -> Result<Vec<&'a T>> {
    let mut scored = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let embedding = item.embedding();

            if embedding.len() != query.len() {
                return Err(Error::DimensionMismatch {
                    collection: "query",
                    index,
                    expected: query.len(),
                    found: embedding.len(),
                });
            }

            Ok((cosine_distance(query, embedding), item))
        })
        .collect::<Result<Vec<_>>>()?;

    scored.sort_by(|(a, _), (b, _)| a.total_cmp(b));

    debug!(items = scored.len(), "Ranked corpus");

    Ok(scored.into_iter().map(|(_, item)| item).collect())
}

/// The `count` items nearest to `query`.
///
/// # Errors
///
/// Returns [`Error::DimensionMismatch`] if an item's vector length differs from the query's.
pub fn nearest<'a, T: Embedded>(query: &[f32], items: &'a [T], count: usize) -> Result<Vec<&'a T>> {
    let mut ranked = rank(query, items)?;
    ranked.truncate(count);

    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::DocSection;

    fn doc(content: &str, embedding: Vec<f32>) -> DocSection {
        DocSection {
            content: content.to_string(),
            embedding,
        }
    }

    fn corpus() -> Vec<DocSection> {
        vec![
            doc("east", vec![1.0, 0.0, 0.0]),
            doc("north", vec![0.0, 1.0, 0.0]),
            doc("north-east", vec![0.7, 0.7, 0.0]),
            doc("west", vec![-1.0, 0.0, 0.0]),
            doc("up", vec![0.0, 0.0, 3.0]),
        ]
    }

    #[test]
    fn identical_vectors_have_zero_distance() {
        for vector in [vec![1.0, 2.0, 3.0], vec![0.3, -0.1, 0.7], vec![5.0, 5.0, 5.0]] {
            assert_eq!(cosine_distance(&vector, &vector), 0.0);
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let a = [0.2, -0.4, 0.9];
        let b = [0.7, 0.1, -0.3];

        assert_eq!(cosine_distance(&a, &b), cosine_distance(&b, &a));
    }

    #[test]
    fn distance_ignores_magnitude() {
        let distance = cosine_distance(&[1.0, 1.0], &[10.0, 10.0]);

        assert!(distance.abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 4.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-2.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_is_orthogonal() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn ranks_nearest_first() {
        let docs = corpus();
        let ranked = rank(&[1.0, 0.1, 0.0], &docs).unwrap();

        let order = ranked.iter().map(|d| d.content.as_str()).collect::<Vec<_>>();
        assert_eq!(order, vec!["east", "north-east", "north", "up", "west"]);
    }

    #[test]
    fn ranking_is_a_sorted_permutation() {
        let docs = corpus();
        let query = [0.3, -0.2, 0.5];
        let ranked = rank(&query, &docs).unwrap();

        assert_eq!(ranked.len(), docs.len());
        for item in &docs {
            assert!(ranked.iter().any(|r| std::ptr::eq(*r, item)));
        }

        let distances = ranked
            .iter()
            .map(|d| cosine_distance(&query, &d.embedding))
            .collect::<Vec<_>>();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn exact_match_ranks_first() {
        let docs = corpus();
        let ranked = rank(&docs[4].embedding, &docs).unwrap();

        assert_eq!(ranked[0].content, "up");
        assert_eq!(cosine_distance(&docs[4].embedding, &ranked[0].embedding), 0.0);
    }

    #[test]
    fn ties_keep_corpus_order() {
        let docs = vec![
            doc("first", vec![0.0, 1.0]),
            doc("second", vec![0.0, 2.0]),
            doc("third", vec![0.0, 3.0]),
        ];

        let ranked = rank(&[1.0, 0.0], &docs).unwrap();
        let order = ranked.iter().map(|d| d.content.as_str()).collect::<Vec<_>>();

        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        let docs = vec![doc("ok", vec![1.0, 0.0]), doc("bad", vec![1.0, 0.0, 0.0])];

        assert!(matches!(
            rank(&[1.0, 0.0], &docs),
            Err(Error::DimensionMismatch {
                index: 1,
                expected: 2,
                found: 3,
                ..
            })
        ));
    }

    #[test]
    fn nearest_truncates() {
        let docs = corpus();

        assert_eq!(nearest(&[0.0, 1.0, 0.0], &docs, 2).unwrap().len(), 2);
        assert_eq!(nearest(&[0.0, 1.0, 0.0], &docs, 10).unwrap().len(), 5);
        assert!(nearest(&[0.0, 1.0, 0.0], &Vec::<DocSection>::new(), 3).unwrap().is_empty());
    }
}
