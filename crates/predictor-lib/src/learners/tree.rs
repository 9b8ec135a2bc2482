//! Gradient-statistics decision tree
//!
//! A single CART-style learner shared by every tree ensemble. Nodes are grown
//! greedily on first/second order statistics `(g, h)`:
//!
//! - split gain: `G_L²/(H_L+λ) + G_R²/(H_R+λ) - G²/(H+λ)`
//! - leaf weight: `-G/(H+λ)`
//!
//! With `g = -y`, `h = 1` and `λ = 0` this is an ordinary variance-reduction
//! regression tree whose leaves hold the mean target.

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

/// Minimum gain for a split to be accepted
const MIN_SPLIT_GAIN: f64 = 1e-12;

/// Growth parameters for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub min_child_weight: f64,
    pub lambda: f64,
    /// Features considered per split; `None` considers all of them
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 3,
            min_samples_leaf: 1,
            min_child_weight: 0.0,
            lambda: 0.0,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Quantile bin edges per feature for histogram split search
#[derive(Debug, Clone)]
pub struct FeatureBins {
    edges: Vec<Vec<f64>>,
    codes: Vec<Vec<usize>>,
}

impl FeatureBins {
    /// Bin every column of `x` into at most `max_bins` quantile bins
    pub fn new(x: ArrayView2<f64>, max_bins: usize) -> Self {
        let max_bins = max_bins.max(2);
        let mut edges = Vec::with_capacity(x.ncols());
        let mut codes = Vec::with_capacity(x.ncols());

        for column in x.columns() {
            let mut sorted: Vec<f64> = column.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            sorted.dedup();

            // Edges are upper bin bounds; the last distinct value needs no edge
            let feature_edges: Vec<f64> = if sorted.len() <= max_bins {
                sorted
                    .windows(2)
                    .map(|pair| (pair[0] + pair[1]) / 2.0)
                    .collect()
            } else {
                let mut e: Vec<f64> = (1..max_bins)
                    .map(|k| {
                        let pos = k as f64 / max_bins as f64 * (sorted.len() - 1) as f64;
                        let lo = pos.floor() as usize;
                        (sorted[lo] + sorted[(lo + 1).min(sorted.len() - 1)]) / 2.0
                    })
                    .collect();
                e.dedup();
                e
            };

            let feature_codes = column
                .iter()
                .map(|v| feature_edges.partition_point(|edge| edge < v))
                .collect();
            edges.push(feature_edges);
            codes.push(feature_codes);
        }

        Self { edges, codes }
    }

    fn n_bins(&self, feature: usize) -> usize {
        self.edges[feature].len() + 1
    }
}

/// How split thresholds are enumerated
#[derive(Debug, Clone, Copy)]
pub enum SplitSearch<'a> {
    /// Midpoints between consecutive distinct values
    Exact,
    /// Precomputed histogram bin edges
    Histogram(&'a FeatureBins),
}

struct GrowContext<'a> {
    x: ArrayView2<'a, f64>,
    grad: &'a [f64],
    hess: &'a [f64],
    params: TreeParams,
    search: SplitSearch<'a>,
}

struct SplitChoice {
    feature: usize,
    threshold: f64,
    gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grow a tree on the rows listed in `indices` (repeats allowed)
    pub fn fit(
        x: ArrayView2<f64>,
        grad: &[f64],
        hess: &[f64],
        indices: &mut [usize],
        params: TreeParams,
        search: SplitSearch<'_>,
        rng: &mut StdRng,
    ) -> Self {
        let ctx = GrowContext {
            x: x.view(),
            grad,
            hess,
            params,
            search,
        };
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(&ctx, indices, 0, rng);
        tree
    }

    pub fn predict(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    fn grow(&mut self, ctx: &GrowContext<'_>, indices: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let (g_sum, h_sum) = indices
            .iter()
            .fold((0.0, 0.0), |(g, h), &i| (g + ctx.grad[i], h + ctx.hess[i]));
        let leaf_value = leaf_weight(g_sum, h_sum, ctx.params.lambda);

        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value: leaf_value });

        if depth >= ctx.params.max_depth || indices.len() < 2 * ctx.params.min_samples_leaf.max(1) {
            return node_idx;
        }

        let Some(split) = best_split(ctx, indices, g_sum, h_sum, rng) else {
            return node_idx;
        };

        let mid = partition(indices, |i| ctx.x[[i, split.feature]] <= split.threshold);
        let (left_rows, right_rows) = indices.split_at_mut(mid);
        let left = self.grow(ctx, left_rows, depth + 1, rng);
        let right = self.grow(ctx, right_rows, depth + 1, rng);

        self.nodes[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }
}

fn leaf_weight(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom <= f64::EPSILON {
        0.0
    } else {
        -g / denom
    }
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom <= f64::EPSILON {
        0.0
    } else {
        g * g / denom
    }
}

/// In-place partition; returns the number of rows satisfying `pred`
fn partition<F: Fn(usize) -> bool>(indices: &mut [usize], pred: F) -> usize {
    let mut mid = 0;
    for k in 0..indices.len() {
        if pred(indices[k]) {
            indices.swap(mid, k);
            mid += 1;
        }
    }
    mid
}

fn candidate_features(n_features: usize, max_features: Option<usize>, rng: &mut StdRng) -> Vec<usize> {
    match max_features {
        Some(k) if k < n_features => {
            let mut chosen = sample(rng, n_features, k.max(1)).into_vec();
            chosen.sort_unstable();
            chosen
        }
        _ => (0..n_features).collect(),
    }
}

fn best_split(
    ctx: &GrowContext<'_>,
    indices: &[usize],
    g_sum: f64,
    h_sum: f64,
    rng: &mut StdRng,
) -> Option<SplitChoice> {
    let lambda = ctx.params.lambda;
    let parent = score(g_sum, h_sum, lambda);
    let mut best: Option<SplitChoice> = None;

    let mut consider = |feature: usize, threshold: f64, gl: f64, hl: f64, nl: usize| {
        let nr = indices.len() - nl;
        let (gr, hr) = (g_sum - gl, h_sum - hl);
        if nl < ctx.params.min_samples_leaf || nr < ctx.params.min_samples_leaf {
            return;
        }
        if hl < ctx.params.min_child_weight || hr < ctx.params.min_child_weight {
            return;
        }
        let gain = score(gl, hl, lambda) + score(gr, hr, lambda) - parent;
        if gain > MIN_SPLIT_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
            best = Some(SplitChoice {
                feature,
                threshold,
                gain,
            });
        }
    };

    for feature in candidate_features(ctx.x.ncols(), ctx.params.max_features, rng) {
        match ctx.search {
            SplitSearch::Exact => {
                let mut order: Vec<(f64, usize)> = indices.iter().map(|&i| (ctx.x[[i, feature]], i)).collect();
                order.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

                let (mut gl, mut hl) = (0.0, 0.0);
                for k in 0..order.len() - 1 {
                    let (value, i) = order[k];
                    gl += ctx.grad[i];
                    hl += ctx.hess[i];
                    let next = order[k + 1].0;
                    if next > value {
                        consider(feature, (value + next) / 2.0, gl, hl, k + 1);
                    }
                }
            }
            SplitSearch::Histogram(bins) => {
                let n_bins = bins.n_bins(feature);
                let mut g_hist = vec![0.0; n_bins];
                let mut h_hist = vec![0.0; n_bins];
                let mut n_hist = vec![0usize; n_bins];
                for &i in indices {
                    let code = bins.codes[feature][i];
                    g_hist[code] += ctx.grad[i];
                    h_hist[code] += ctx.hess[i];
                    n_hist[code] += 1;
                }

                let (mut gl, mut hl, mut nl) = (0.0, 0.0, 0usize);
                for b in 0..n_bins - 1 {
                    gl += g_hist[b];
                    hl += h_hist[b];
                    nl += n_hist[b];
                    if nl == 0 || nl == indices.len() {
                        continue;
                    }
                    consider(feature, bins.edges[feature][b], gl, hl, nl);
                }
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use rand::SeedableRng;

    fn step_data() -> (Array2<f64>, Vec<f64>) {
        let x = Array2::from_shape_vec((8, 1), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]).unwrap();
        let y = vec![1.0, 1.0, 1.0, 1.0, 5.0, 5.0, 5.0, 5.0];
        (x, y)
    }

    #[test]
    fn test_variance_tree_finds_step() {
        let (x, y) = step_data();
        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; y.len()];
        let mut indices: Vec<usize> = (0..y.len()).collect();
        let mut rng = StdRng::seed_from_u64(42);

        let tree = RegressionTree::fit(
            x.view(),
            &grad,
            &hess,
            &mut indices,
            TreeParams::default(),
            SplitSearch::Exact,
            &mut rng,
        );

        assert!((tree.predict(array![2.0].view()) - 1.0).abs() < 1e-12);
        assert!((tree.predict(array![7.0].view()) - 5.0).abs() < 1e-12);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_depth_limit() {
        let (x, _) = step_data();
        let y: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; 8];
        let mut indices: Vec<usize> = (0..8).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let params = TreeParams {
            max_depth: 2,
            ..TreeParams::default()
        };

        let tree = RegressionTree::fit(x.view(), &grad, &hess, &mut indices, params, SplitSearch::Exact, &mut rng);
        assert!(tree.depth() <= 2);
        assert!(tree.n_leaves() <= 4);
    }

    #[test]
    fn test_histogram_matches_step() {
        let (x, y) = step_data();
        let bins = FeatureBins::new(x.view(), 255);
        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; y.len()];
        let mut indices: Vec<usize> = (0..y.len()).collect();
        let mut rng = StdRng::seed_from_u64(42);

        let tree = RegressionTree::fit(
            x.view(),
            &grad,
            &hess,
            &mut indices,
            TreeParams::default(),
            SplitSearch::Histogram(&bins),
            &mut rng,
        );
        assert!((tree.predict(array![3.0].view()) - 1.0).abs() < 1e-12);
        assert!((tree.predict(array![6.0].view()) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let (x, _) = step_data();
        let grad = vec![-3.0; 8];
        let hess = vec![1.0; 8];
        let mut indices: Vec<usize> = (0..8).collect();
        let mut rng = StdRng::seed_from_u64(42);

        let tree = RegressionTree::fit(
            x.view(),
            &grad,
            &hess,
            &mut indices,
            TreeParams::default(),
            SplitSearch::Exact,
            &mut rng,
        );
        assert_eq!(tree.n_leaves(), 1);
        assert!((tree.predict(array![100.0].view()) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_bins_are_bounded() {
        let x = Array2::from_shape_fn((1000, 1), |(i, _)| i as f64);
        let bins = FeatureBins::new(x.view(), 16);
        assert!(bins.n_bins(0) <= 16);
        assert!(bins.codes[0].iter().all(|&c| c < bins.n_bins(0)));
    }
}
