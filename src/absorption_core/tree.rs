//! CART classification tree grown with Gini impurity
//!
//! Nodes live in a flat arena (`Vec<TreeNode>`, root at index 0) and samples
//! are referenced by row index into the training matrix.
//!
//! # Traversal
//!
//! - Start at node 0 (root)
//! - At a split, go left when `features[feature] <= threshold`, else right
//! - A leaf returns the empirical class distribution of its training rows

use ndarray::{ArrayView1, ArrayView2};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::utils::AnalysisError;

/// Minimum impurity decrease for a split to be kept
const MIN_GAIN: f64 = 1e-12;

/// A single node in the tree arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Class distribution in fitted class order
        probabilities: Vec<f64>,
        n_samples: usize,
    },
}

/// Stopping rules and feature sampling for a single tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Candidate features per node (`<= n_features`)
    pub max_features: usize,
}

/// Fitted classification tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

/// Gini impurity of a class histogram
fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Grower<'a, 'r, R: Rng + ?Sized> {
    features: ArrayView2<'a, f64>,
    labels: &'a [usize],
    n_classes: usize,
    params: TreeParams,
    rng: &'r mut R,
    nodes: Vec<TreeNode>,
}

impl<R: Rng + ?Sized> Grower<'_, '_, R> {
    fn histogram(&self, rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &r in rows {
            counts[self.labels[r]] += 1;
        }
        counts
    }

    fn leaf(&mut self, counts: &[usize], n_samples: usize) -> usize {
        let n = n_samples as f64;
        self.nodes.push(TreeNode::Leaf {
            probabilities: counts.iter().map(|&c| c as f64 / n).collect(),
            n_samples,
        });
        self.nodes.len() - 1
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let n_features = self.features.ncols();
        if self.params.max_features >= n_features {
            (0..n_features).collect()
        } else {
            let mut picked =
                index::sample(&mut *self.rng, n_features, self.params.max_features).into_vec();
            picked.sort_unstable();
            picked
        }
    }

    /// Best Gini split over the candidate features, honoring `min_samples_leaf`
    fn best_split(&mut self, rows: &[usize], counts: &[usize]) -> Option<BestSplit> {
        let n = rows.len();
        let parent = gini(counts, n);
        let min_leaf = self.params.min_samples_leaf;
        let mut best: Option<BestSplit> = None;
        let mut sorted = rows.to_vec();

        for feature in self.candidate_features() {
            let column = self.features.column(feature);
            sorted.sort_by(|&a, &b| column[a].total_cmp(&column[b]).then(a.cmp(&b)));

            let mut left = vec![0usize; self.n_classes];
            for i in 0..n - 1 {
                left[self.labels[sorted[i]]] += 1;
                let n_left = i + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let (lo, hi) = (column[sorted[i]], column[sorted[i + 1]]);
                if lo == hi {
                    continue;
                }

                let right: Vec<usize> = counts.iter().zip(&left).map(|(c, l)| c - l).collect();
                let weighted = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / n as f64;
                let gain = parent - weighted;

                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best.filter(|b| b.gain > MIN_GAIN)
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let counts = self.histogram(&rows);
        let n = rows.len();

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if pure
            || depth >= self.params.max_depth
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
        {
            return self.leaf(&counts, n);
        }

        let Some(split) = self.best_split(&rows, &counts) else {
            return self.leaf(&counts, n);
        };

        let column = self.features.column(split.feature);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| column[r] <= split.threshold);

        // Reserve the slot so the split precedes its subtrees in the arena
        let id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            probabilities: Vec::new(),
            n_samples: 0,
        });
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[id] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }
}

impl DecisionTree {
    /// Grow a tree on the given rows of a training matrix
    ///
    /// # Arguments
    /// * `features` - Scaled training matrix (rows=samples, cols=features)
    /// * `labels` - Class index per matrix row, `< n_classes`
    /// * `rows` - Row indices to train on (may repeat, e.g. a bootstrap sample)
    /// * `rng` - Random source for per-node feature sampling
    pub fn fit<R: Rng + ?Sized>(
        features: ArrayView2<f64>,
        labels: &[usize],
        n_classes: usize,
        rows: Vec<usize>,
        params: TreeParams,
        rng: &mut R,
    ) -> Result<Self, AnalysisError> {
        if rows.is_empty() {
            return Err(AnalysisError::ValidationError(
                "cannot grow a tree on zero samples".to_string(),
            ));
        }
        if features.nrows() != labels.len() {
            return Err(AnalysisError::ValidationError(format!(
                "feature rows ({}) must match label count ({})",
                features.nrows(),
                labels.len()
            )));
        }
        if rows.iter().any(|&r| r >= labels.len()) || labels.iter().any(|&l| l >= n_classes) {
            return Err(AnalysisError::ValidationError(
                "row or class index out of range".to_string(),
            ));
        }

        let mut grower = Grower {
            features: features.view(),
            labels,
            n_classes,
            params,
            rng,
            nodes: Vec::new(),
        };
        grower.grow(rows, 0);
        Ok(Self {
            nodes: grower.nodes,
        })
    }

    /// Leaf class distribution for one (scaled) feature vector
    ///
    /// Callers check the width; the forest validates it once per request.
    pub fn predict_proba(&self, features: ArrayView1<f64>) -> &[f64] {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { probabilities, .. } => return probabilities,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    /// Longest root-to-leaf path, in edges
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }

    /// Structural check for trees read back from disk
    ///
    /// Children must point strictly forward in the arena (which rules out
    /// cycles), features must be in range, leaves must carry a distribution
    /// over `n_classes` classes.
    pub fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), AnalysisError> {
        if self.nodes.is_empty() {
            return Err(AnalysisError::ValidationError("tree has no nodes".to_string()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(AnalysisError::ValidationError(format!(
                            "node {} has invalid feature index {}",
                            i, feature
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(AnalysisError::ValidationError(format!(
                            "node {} has non-finite threshold",
                            i
                        )));
                    }
                    for child in [left, right] {
                        if *child <= i || *child >= self.nodes.len() {
                            return Err(AnalysisError::ValidationError(format!(
                                "node {} has invalid child {}",
                                i, child
                            )));
                        }
                    }
                }
                TreeNode::Leaf { probabilities, .. } => {
                    if probabilities.len() != n_classes {
                        return Err(AnalysisError::ValidationError(format!(
                            "leaf node {} has {} probabilities, expected {}",
                            i,
                            probabilities.len(),
                            n_classes
                        )));
                    }
                    let total: f64 = probabilities.iter().sum();
                    if (total - 1.0).abs() > 1e-6 {
                        return Err(AnalysisError::ValidationError(format!(
                            "leaf node {} probabilities sum to {}",
                            i, total
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
