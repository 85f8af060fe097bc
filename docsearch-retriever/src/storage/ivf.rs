//! Inverted-file partitioning over unit-length vectors.
//!
//! Centroids live in the same space as the stored embeddings and are compared with cosine
//! distance (`1 - dot`), so every centroid is kept L2-normalized. Training is spherical
//! k-means seeded from evenly spaced vectors.

use super::dot;
use docsearch_embed::l2_normalize;

/// Cosine distance between unit vectors.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - dot(a, b)
}

/// Index of the centroid closest to `vector`; the lowest index wins ties.
pub fn nearest(centroids: &[Vec<f32>], vector: &[f32]) -> Option<usize> {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, cosine_distance(vector, c)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Indices of the `n` centroids closest to `query`, nearest first.
pub fn nearest_n(centroids: &[Vec<f32>], query: &[f32], n: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f32)> = centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, cosine_distance(query, c)))
        .collect();
    scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    scored.into_iter().take(n).map(|(i, _)| i).collect()
}

/// Result of a k-means run: centroids plus the list assigned to each input vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub centroids: Vec<Vec<f32>>,
    pub assignments: Vec<usize>,
}

/// Cluster `vectors` into at most `lists` partitions.
///
/// Stops early once an iteration leaves every centroid unchanged. Clusters that end up
/// empty keep their previous centroid, so list ids stay dense.
pub fn train(vectors: &[Vec<f32>], lists: usize, max_iterations: usize) -> Partition {
    if vectors.is_empty() || lists == 0 {
        return Partition {
            centroids: Vec::new(),
            assignments: Vec::new(),
        };
    }

    let k = lists.min(vectors.len());
    let dimension = vectors[0].len();
    let mut centroids: Vec<Vec<f32>> = (0..k)
        .map(|i| vectors[i * vectors.len() / k].clone())
        .collect();
    let mut assignments = assign(&centroids, vectors);

    for iteration in 0..max_iterations {
        let mut sums = vec![vec![0.0f32; dimension]; k];
        let mut counts = vec![0usize; k];
        for (vector, &list) in vectors.iter().zip(&assignments) {
            counts[list] += 1;
            for (sum, value) in sums[list].iter_mut().zip(vector) {
                *sum += value;
            }
        }

        let mut changed = false;
        for (list, mut centroid) in sums.into_iter().enumerate() {
            if counts[list] == 0 {
                continue;
            }
            l2_normalize(&mut centroid);
            if centroid != centroids[list] {
                changed = true;
                centroids[list] = centroid;
            }
        }

        assignments = assign(&centroids, vectors);
        if !changed {
            tracing::debug!("k-means converged after {} iterations", iteration + 1);
            break;
        }
    }

    Partition {
        centroids,
        assignments,
    }
}

fn assign(centroids: &[Vec<f32>], vectors: &[Vec<f32>]) -> Vec<usize> {
    vectors
        .iter()
        .map(|v| nearest(centroids, v).unwrap_or(0))
        .collect()
}
