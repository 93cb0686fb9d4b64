//! k-nearest-neighbor search over a subset of matrix rows
//!
//! Samples are addressed by row index into a shared feature matrix, so
//! neighbor lists are plain `usize` indices. Queries go through a
//! `linfa_nn` linear-search index built over the member rows; each result
//! list is re-ordered by (distance, row index) so equal distances come back
//! in a stable order.

use linfa_nn::distance::{Distance, L2Dist};
use linfa_nn::{LinearSearch, NearestNeighbour};
use ndarray::{ArrayView2, Axis};

use crate::utils::AnalysisError;

/// Neighbor lists for a set of member rows
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborIndex {
    /// Number of neighbors actually kept per member
    pub k: usize,
    /// `neighbors[i]` holds the `k` nearest rows to `members[i]`, closest first
    pub neighbors: Vec<Vec<usize>>,
}

/// Find the `k` nearest other members for every member row
///
/// # Arguments
/// * `features` - Feature matrix (rows=samples, cols=features)
/// * `members` - Row indices to search among (e.g. one class)
/// * `k` - Requested neighbor count
///
/// # Returns
/// * `Ok(NeighborIndex)` - Neighbor lists; `k` is reduced to `members.len() - 1`
///   when fewer members exist
/// * `Err(AnalysisError)` - If `members` is empty or references a missing row
///
/// Each member is excluded from its own list by position, so exact duplicates
/// of a member still count as neighbors at distance zero.
pub fn nearest_neighbors(
    features: ArrayView2<f64>,
    members: &[usize],
    k: usize,
) -> Result<NeighborIndex, AnalysisError> {
    if members.is_empty() {
        return Err(AnalysisError::ValidationError(
            "Cannot search neighbors in an empty sample set".into(),
        ));
    }
    if let Some(&bad) = members.iter().find(|&&m| m >= features.nrows()) {
        return Err(AnalysisError::ValidationError(format!(
            "row {} out of range for {} samples",
            bad,
            features.nrows()
        )));
    }

    // Handle edge case: k >= n_members
    let effective_k = k.min(members.len() - 1);

    let subset = features.select(Axis(0), members);
    let index = LinearSearch::new().from_batch(&subset, L2Dist).map_err(|e| {
        AnalysisError::ModelError(format!("failed to build neighbor index: {}", e))
    })?;

    let mut neighbors = Vec::with_capacity(members.len());
    for (pos, point) in subset.rows().into_iter().enumerate() {
        // One extra result covers the query point itself
        let found = index
            .k_nearest(point, effective_k + 1)
            .map_err(|e| AnalysisError::ModelError(format!("neighbor query failed: {}", e)))?;

        let mut candidates: Vec<(f64, usize)> = found
            .into_iter()
            .filter(|&(_, i)| i != pos)
            .map(|(other, i)| (L2Dist.rdistance(point, other), members[i]))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        neighbors.push(
            candidates
                .into_iter()
                .take(effective_k)
                .map(|(_, row)| row)
                .collect(),
        );
    }

    Ok(NeighborIndex {
        k: effective_k,
        neighbors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};

    #[test]
    fn test_knn_simple_case() {
        // (0,0), (1,1), (10,10), (1,0)
        let features = arr2(&[[0.0, 0.0], [1.0, 1.0], [10.0, 10.0], [1.0, 0.0]]);
        let index = nearest_neighbors(features.view(), &[0, 1, 2, 3], 2).unwrap();

        assert_eq!(index.k, 2);
        // (0,0): (1,0) at 1, then (1,1) at sqrt(2)
        assert_eq!(index.neighbors[0], vec![3, 1]);
        // (10,10): furthest point still gets the two closest
        assert_eq!(index.neighbors[2], vec![1, 3]);
    }

    #[test]
    fn test_knn_subset_only() {
        // Row 1 is closest to row 0 but is not a member
        let features = arr2(&[[0.0], [0.1], [5.0], [9.0]]);
        let index = nearest_neighbors(features.view(), &[0, 2, 3], 1).unwrap();
        assert_eq!(index.neighbors[0], vec![2]);
        assert_eq!(index.neighbors[1], vec![3]);
        assert_eq!(index.neighbors[2], vec![2]);
    }

    #[test]
    fn test_knn_empty_members() {
        let features = Array2::zeros((3, 2));
        let result = nearest_neighbors(features.view(), &[], 5);

        assert!(result.is_err());
        if let Err(AnalysisError::ValidationError(msg)) = result {
            assert!(msg.contains("empty"));
        }
    }

    #[test]
    fn test_knn_k_larger_than_members() {
        // 5 samples, k=10 - should auto-adjust to k=4
        let features = Array2::from_shape_vec(
            (5, 2),
            vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0],
        )
        .unwrap();

        let index = nearest_neighbors(features.view(), &[0, 1, 2, 3, 4], 10).unwrap();
        assert_eq!(index.k, 4);
        assert!(index.neighbors.iter().all(|n| n.len() == 4));
    }

    #[test]
    fn test_knn_single_member() {
        let features = arr2(&[[1.0, 2.0]]);
        let index = nearest_neighbors(features.view(), &[0], 5).unwrap();
        assert_eq!(index.k, 0);
        assert_eq!(index.neighbors, vec![Vec::<usize>::new()]);
    }

    #[test]
    fn test_knn_duplicates_and_ties() {
        // Rows 1 and 2 are duplicates of row 0; ties resolve by index
        let features = arr2(&[[1.0], [1.0], [1.0], [2.0]]);
        let index = nearest_neighbors(features.view(), &[0, 1, 2, 3], 2).unwrap();
        assert_eq!(index.neighbors[0], vec![1, 2]);
        assert_eq!(index.neighbors[1], vec![0, 2]);
        // Three rows tie at distance 1; any two of them, in row order
        let far = &index.neighbors[3];
        assert_eq!(far.len(), 2);
        assert!(far[0] < far[1] && far[1] <= 2);
    }

    #[test]
    fn test_knn_many_identical_rows() {
        // A column with few distinct values (like the quarter) repeats coordinates
        let features =
            Array2::from_shape_fn((40, 2), |(i, j)| if j == 0 { (i % 4) as f64 } else { 1.0 });
        let members: Vec<usize> = (0..40).collect();
        let index = nearest_neighbors(features.view(), &members, 5).unwrap();
        assert_eq!(index.k, 5);
        for (row, list) in index.neighbors.iter().enumerate() {
            assert_eq!(list.len(), 5);
            assert!(!list.contains(&row));
            assert!(list.iter().all(|&n| n % 4 == row % 4));
        }
    }

    #[test]
    fn test_knn_unordered_members() {
        let features = arr2(&[[0.0], [3.0], [1.0], [7.0]]);
        let index = nearest_neighbors(features.view(), &[3, 0, 2], 1).unwrap();
        assert_eq!(index.neighbors, vec![vec![2], vec![2], vec![0]]);
    }

    #[test]
    fn test_knn_row_out_of_range() {
        let features = arr2(&[[1.0], [2.0]]);
        assert!(nearest_neighbors(features.view(), &[0, 7], 1).is_err());
    }
}
