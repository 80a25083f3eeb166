//! HDBSCAN over a precomputed distance matrix.
//!
//! Hierarchical density-based clustering (Campello, Moulavi, Sander 2013)
//! assigns a provisional label to every item: locally dense items share a
//! label, sparse or isolated items get [`NOISE`]. Unlike DBSCAN there is no
//! global epsilon; a hierarchy of density levels is built and stable
//! clusters are selected from it.
//!
//! Outline:
//!
//! 1. **Core distance**: distance to the k-th nearest neighbor
//!    (k = `min_samples`), estimating local density.
//! 2. **Mutual reachability**: `mrd(i, j) = max(core_i, core_j, d(i, j))`,
//!    which keeps sparse regions from forming spurious links.
//! 3. **Minimum spanning tree** over the mutual-reachability graph (Prim,
//!    O(n²) on the dense matrix).
//! 4. **Condensed tree**: walk MST edges in ascending order, merging
//!    components; components below `min_cluster_size` fall out as points
//!    instead of forming splits.
//! 5. **Selection**: [`SelectionMethod::Leaf`] takes the leaves of the
//!    condensed tree (more, tighter clusters — the right trade for grouping
//!    near-duplicate images); [`SelectionMethod::ExcessOfMass`] maximizes
//!    stability bottom-up.
//!
//! The whole computation is deterministic for a given input order.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::distance::DistanceMatrix;
use crate::error::{ClusteringError, Result};

/// Provisional label for items the algorithm could not assign to a cluster.
pub const NOISE: i64 = -1;

/// How stable clusters are picked from the condensed hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    /// Select the leaves of the condensed tree: more, smaller, tighter
    /// clusters.
    Leaf,
    /// Select the subtrees with the greatest stability mass: fewer, broader
    /// clusters.
    ExcessOfMass,
}

/// Hyperparameters for the density clusterer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HdbscanConfig {
    /// Smallest group reported as a cluster rather than noise. The
    /// algorithm requires at least 2: a cluster implies a pair.
    pub min_cluster_size: usize,

    /// Neighborhood size for the density estimate. Smaller values produce
    /// more and smaller clusters. Must be at least 1.
    pub min_samples: usize,

    /// Cluster selection strategy.
    pub selection: SelectionMethod,
}

impl Default for HdbscanConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 2,
            min_samples: 1,
            selection: SelectionMethod::Leaf,
        }
    }
}

/// HDBSCAN clusterer over a precomputed distance matrix.
#[derive(Debug, Clone)]
pub struct HdbscanClusterer {
    config: HdbscanConfig,
}

impl HdbscanClusterer {
    /// Validate the configuration and build a clusterer.
    ///
    /// `min_samples < 1` is rejected. `min_cluster_size < 2` is clamped up
    /// to 2 with a warning; it is the single case where input is repaired
    /// instead of rejected.
    pub fn new(mut config: HdbscanConfig) -> Result<Self> {
        if config.min_samples < 1 {
            return Err(ClusteringError::InvalidConfiguration {
                name: "min_samples",
                message: "must be at least 1",
            });
        }

        if config.min_cluster_size < 2 {
            warn!(
                "min_cluster_size {} is below the structural minimum, clamping to 2",
                config.min_cluster_size
            );
            config.min_cluster_size = 2;
        }

        Ok(Self { config })
    }

    /// The effective (validated, possibly clamped) configuration.
    pub fn config(&self) -> &HdbscanConfig {
        &self.config
    }

    /// Assign one provisional label per item, in input order. Noise items
    /// get [`NOISE`]; other labels are arbitrary non-negative identifiers.
    ///
    /// An empty matrix yields an empty label vector without running the
    /// algorithm. A single item is always noise: density clustering cannot
    /// form a pair from one point.
    pub fn fit(&self, distances: &DistanceMatrix) -> Vec<i64> {
        let n = distances.len();
        if n == 0 {
            return Vec::new();
        }
        if n == 1 {
            return vec![NOISE];
        }

        let core = core_distances(distances, self.config.min_samples);
        let mut mst = minimum_spanning_tree(n, |i, j| {
            distances.get(i, j).max(core[i]).max(core[j])
        });
        mst.sort_by(|a, b| a.2.total_cmp(&b.2));

        let tree = CondensedTree::build(&mst, n, self.config.min_cluster_size);
        tree.label_points(self.config.selection)
    }
}

/// Distance from each item to its k-th nearest other item,
/// k = `min_samples` capped at n-1.
fn core_distances(distances: &DistanceMatrix, min_samples: usize) -> Vec<f64> {
    let n = distances.len();
    let k = min_samples.min(n - 1);

    let mut core = Vec::with_capacity(n);
    for i in 0..n {
        let mut row: Vec<f64> = (0..n)
            .filter(|&j| j != i)
            .map(|j| distances.get(i, j))
            .collect();
        row.sort_by(|a, b| a.total_cmp(b));
        core.push(row[k - 1]);
    }
    core
}

/// Minimum spanning tree of the dense complete graph on `n` vertices,
/// computed with Prim's algorithm. Returns edges `(u, v, weight)`.
fn minimum_spanning_tree(n: usize, weight: impl Fn(usize, usize) -> f64) -> Vec<(usize, usize, f64)> {
    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut source = vec![usize::MAX; n];
    best[0] = 0.0;

    for _ in 0..n {
        let mut u = usize::MAX;
        let mut u_best = f64::INFINITY;
        for v in 0..n {
            if !in_tree[v] && best[v] < u_best {
                u_best = best[v];
                u = v;
            }
        }
        if u == usize::MAX {
            break;
        }
        in_tree[u] = true;

        for v in 0..n {
            if in_tree[v] {
                continue;
            }
            let w = weight(u, v);
            if w < best[v] {
                best[v] = w;
                source[v] = u;
            }
        }
    }

    let mut edges = Vec::with_capacity(n.saturating_sub(1));
    for v in 1..n {
        if source[v] != usize::MAX {
            edges.push((source[v], v, best[v]));
        }
    }
    edges
}

// ---------------------------------------------------------------------------
// Condensed cluster tree
// ---------------------------------------------------------------------------

/// A child entry in the condensed tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Child {
    /// A point joining the parent cluster's region.
    Point(usize),
    /// A cluster split off under a newly formed parent.
    Cluster(usize),
}

/// One row of the condensed tree table.
#[derive(Debug)]
struct CondensedEdge {
    /// Parent cluster id.
    parent: usize,
    /// Point or cluster child.
    child: Child,
    /// Number of points under the child (1 for point children).
    size: usize,
    /// Density level (1 / distance) at which the child attached.
    lambda: f64,
}

/// Merge components with per-root member lists, so a component's points can
/// be recorded into the condensed tree when it first becomes a cluster.
struct Components {
    parent: Vec<usize>,
    members: Vec<Vec<usize>>,
    cluster: Vec<Option<usize>>,
}

impl Components {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            members: (0..n).map(|i| vec![i]).collect(),
            cluster: vec![None; n],
        }
    }

    fn find(&self, mut x: usize) -> usize {
        while self.parent[x] != x {
            x = self.parent[x];
        }
        x
    }

    /// Union by size; member lists move small-into-large. Returns the root.
    fn union(&mut self, ra: usize, rb: usize) -> usize {
        let (big, small) = if self.members[ra].len() >= self.members[rb].len() {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big;
        let moved = std::mem::take(&mut self.members[small]);
        self.members[big].extend(moved);
        big
    }
}

struct CondensedTree {
    n: usize,
    num_clusters: usize,
    edges: Vec<CondensedEdge>,
}

impl CondensedTree {
    /// Build the condensed tree from MST edges sorted by ascending weight.
    ///
    /// Components below `min_cluster_size` never hold a cluster; their
    /// points fall into whichever cluster absorbs them. When two components
    /// of cluster size meet, a fresh parent records both sides as cluster
    /// children.
    fn build(mst: &[(usize, usize, f64)], n: usize, min_cluster_size: usize) -> Self {
        let mut comps = Components::new(n);
        let mut edges: Vec<CondensedEdge> = Vec::new();
        let mut num_clusters = 0usize;

        // Allocate a cluster id for a component that has none yet, recording
        // its current members as point children born at `lambda`.
        fn materialize(
            edges: &mut Vec<CondensedEdge>,
            num_clusters: &mut usize,
            members: &[usize],
            lambda: f64,
        ) -> usize {
            let id = *num_clusters;
            *num_clusters += 1;
            for &p in members {
                edges.push(CondensedEdge {
                    parent: id,
                    child: Child::Point(p),
                    size: 1,
                    lambda,
                });
            }
            id
        }

        for &(u, v, dist) in mst {
            let ru = comps.find(u);
            let rv = comps.find(v);
            debug_assert_ne!(ru, rv);

            // Identical points would give an infinite density; the largest
            // finite value keeps stability arithmetic finite.
            let lambda = if dist > 0.0 { dist.recip() } else { f64::MAX };

            let size_u = comps.members[ru].len();
            let size_v = comps.members[rv].len();

            match (size_u >= min_cluster_size, size_v >= min_cluster_size) {
                (true, true) => {
                    // Genuine split seen bottom-up: both sides are clusters
                    // of a newly formed parent.
                    let left = match comps.cluster[ru] {
                        Some(c) => c,
                        None => materialize(&mut edges, &mut num_clusters, &comps.members[ru], lambda),
                    };
                    let right = match comps.cluster[rv] {
                        Some(c) => c,
                        None => materialize(&mut edges, &mut num_clusters, &comps.members[rv], lambda),
                    };

                    let parent = num_clusters;
                    num_clusters += 1;
                    edges.push(CondensedEdge {
                        parent,
                        child: Child::Cluster(left),
                        size: size_u,
                        lambda,
                    });
                    edges.push(CondensedEdge {
                        parent,
                        child: Child::Cluster(right),
                        size: size_v,
                        lambda,
                    });

                    let root = comps.union(ru, rv);
                    comps.cluster[root] = Some(parent);
                }
                (true, false) | (false, true) => {
                    let (big, small) = if size_u >= min_cluster_size {
                        (ru, rv)
                    } else {
                        (rv, ru)
                    };

                    let cluster = match comps.cluster[big] {
                        Some(c) => c,
                        None => materialize(&mut edges, &mut num_clusters, &comps.members[big], lambda),
                    };
                    for &p in &comps.members[small] {
                        edges.push(CondensedEdge {
                            parent: cluster,
                            child: Child::Point(p),
                            size: 1,
                            lambda,
                        });
                    }

                    let root = comps.union(big, small);
                    comps.cluster[root] = Some(cluster);
                }
                (false, false) => {
                    // Sub-threshold components never hold a cluster.
                    comps.union(ru, rv);
                }
            }
        }

        Self {
            n,
            num_clusters,
            edges,
        }
    }

    fn children_lists(&self) -> Vec<Vec<usize>> {
        let mut lists = vec![Vec::new(); self.num_clusters];
        for edge in &self.edges {
            if let Child::Cluster(c) = edge.child {
                lists[edge.parent].push(c);
            }
        }
        lists
    }

    fn point_lists(&self) -> Vec<Vec<usize>> {
        let mut lists = vec![Vec::new(); self.num_clusters];
        for edge in &self.edges {
            if let Child::Point(p) = edge.child {
                lists[edge.parent].push(p);
            }
        }
        lists
    }

    /// Select stable clusters and assign labels. Points under no selected
    /// cluster stay [`NOISE`].
    fn label_points(&self, selection: SelectionMethod) -> Vec<i64> {
        let mut labels = vec![NOISE; self.n];
        if self.num_clusters == 0 {
            return labels;
        }

        let children = self.children_lists();
        let points = self.point_lists();

        let selected = match selection {
            SelectionMethod::Leaf => children.iter().map(Vec::is_empty).collect::<Vec<_>>(),
            SelectionMethod::ExcessOfMass => self.select_excess_of_mass(&children),
        };

        // Selected clusters are pairwise non-overlapping, so each subtree
        // can be labeled wholesale.
        let mut next_label = 0i64;
        for c in 0..self.num_clusters {
            if !selected[c] {
                continue;
            }
            let label = next_label;
            next_label += 1;

            let mut stack = vec![c];
            while let Some(cur) = stack.pop() {
                for &p in &points[cur] {
                    labels[p] = label;
                }
                stack.extend(children[cur].iter().copied());
            }
        }

        labels
    }

    /// Bottom-up stability selection: a parent replaces its children when
    /// its own stability exceeds the sum of their subtree stabilities.
    fn select_excess_of_mass(&self, children: &[Vec<usize>]) -> Vec<bool> {
        let num = self.num_clusters;

        // A cluster is born when it first appears as a cluster child; roots
        // are born at lambda 0.
        let mut birth = vec![0.0f64; num];
        let mut has_parent = vec![false; num];
        for edge in &self.edges {
            if let Child::Cluster(c) = edge.child {
                birth[c] = edge.lambda;
                has_parent[c] = true;
            }
        }

        // stability(c) = sum over child edges of size * (lambda - birth(c)).
        let mut stability = vec![0.0f64; num];
        for edge in &self.edges {
            stability[edge.parent] += edge.size as f64 * (edge.lambda - birth[edge.parent]);
        }

        let mut selected = vec![false; num];
        let mut subtree_stability = stability.clone();

        for root in 0..num {
            if has_parent[root] {
                continue;
            }
            // Iterative post-order from this root.
            let mut stack = vec![(root, false)];
            while let Some((c, visited)) = stack.pop() {
                if !visited {
                    stack.push((c, true));
                    stack.extend(children[c].iter().map(|&ch| (ch, false)));
                    continue;
                }

                if children[c].is_empty() {
                    selected[c] = true;
                    continue;
                }

                let child_sum: f64 = children[c].iter().map(|&ch| subtree_stability[ch]).sum();
                if stability[c] > child_sum {
                    selected[c] = true;
                    subtree_stability[c] = stability[c];
                    // The winner absorbs its whole subtree.
                    let mut below: Vec<usize> = children[c].clone();
                    while let Some(d) = below.pop() {
                        selected[d] = false;
                        below.extend(children[d].iter().copied());
                    }
                } else {
                    subtree_stability[c] = child_sum;
                }
            }
        }

        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMatrix;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    /// Build a matrix from an explicit symmetric distance table.
    fn matrix(table: &[&[f64]]) -> DistanceMatrix {
        let n = table.len();
        let mut values = vec![0.0f64; n * n];
        for (i, row) in table.iter().enumerate() {
            assert_eq!(row.len(), n);
            for (j, &d) in row.iter().enumerate() {
                values[i * n + j] = d;
            }
        }
        DistanceMatrix::from_raw(n, values)
    }

    /// Two tight triples far apart: in-group distance 0.01, cross 0.9.
    fn two_triples() -> DistanceMatrix {
        let near = 0.01;
        let far = 0.9;
        matrix(&[
            &[0.0, near, near, far, far, far],
            &[near, 0.0, near, far, far, far],
            &[near, near, 0.0, far, far, far],
            &[far, far, far, 0.0, near, near],
            &[far, far, far, near, 0.0, near],
            &[far, far, far, near, near, 0.0],
        ])
    }

    fn clusterer(config: HdbscanConfig) -> HdbscanClusterer {
        HdbscanClusterer::new(config).unwrap()
    }

    #[test]
    fn two_triples_form_two_clusters_with_leaf_selection() {
        let labels = clusterer(HdbscanConfig::default()).fit(&two_triples());

        assert_eq!(labels.len(), 6);
        assert!(labels.iter().all(|&l| l != NOISE));
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn two_triples_form_two_clusters_with_excess_of_mass() {
        let config = HdbscanConfig {
            selection: SelectionMethod::ExcessOfMass,
            ..HdbscanConfig::default()
        };
        let labels = clusterer(config).fit(&two_triples());

        let distinct: HashSet<i64> = labels.iter().copied().collect();
        assert_eq!(distinct.len(), 2);
        assert!(!distinct.contains(&NOISE));
    }

    #[test]
    fn far_outlier_stays_noise_under_leaf_selection() {
        let near = 0.01;
        let far = 0.9;
        let out = 1.8;
        let distances = matrix(&[
            &[0.0, near, near, far, far, far, out],
            &[near, 0.0, near, far, far, far, out],
            &[near, near, 0.0, far, far, far, out],
            &[far, far, far, 0.0, near, near, out],
            &[far, far, far, near, 0.0, near, out],
            &[far, far, far, near, near, 0.0, out],
            &[out, out, out, out, out, out, 0.0],
        ]);

        let labels = clusterer(HdbscanConfig::default()).fit(&distances);
        assert_eq!(labels[6], NOISE);
        assert!(labels[..6].iter().all(|&l| l != NOISE));
    }

    #[test]
    fn empty_matrix_yields_no_labels() {
        let labels = clusterer(HdbscanConfig::default()).fit(&matrix(&[]));
        assert!(labels.is_empty());
    }

    #[test]
    fn single_item_is_noise() {
        let labels = clusterer(HdbscanConfig::default()).fit(&matrix(&[&[0.0]]));
        assert_eq!(labels, vec![NOISE]);
    }

    #[test]
    fn pair_below_cluster_threshold_is_noise() {
        let labels = clusterer(HdbscanConfig::default()).fit(&matrix(&[
            &[0.0, 0.01],
            &[0.01, 0.0],
        ]));
        assert_eq!(labels, vec![NOISE, NOISE]);
    }

    #[test]
    fn oversized_min_cluster_size_marks_everything_noise() {
        let config = HdbscanConfig {
            min_cluster_size: 100,
            ..HdbscanConfig::default()
        };
        let labels = clusterer(config).fit(&two_triples());
        assert!(labels.iter().all(|&l| l == NOISE));
    }

    #[test]
    fn min_samples_zero_is_rejected() {
        let config = HdbscanConfig {
            min_samples: 0,
            ..HdbscanConfig::default()
        };
        let err = HdbscanClusterer::new(config).unwrap_err();
        assert!(matches!(
            err,
            ClusteringError::InvalidConfiguration { name: "min_samples", .. }
        ));
    }

    #[test]
    fn min_cluster_size_below_two_is_clamped_not_rejected() {
        let config = HdbscanConfig {
            min_cluster_size: 1,
            ..HdbscanConfig::default()
        };
        let clusterer = HdbscanClusterer::new(config).unwrap();
        assert_eq!(clusterer.config().min_cluster_size, 2);
    }

    #[test]
    fn identical_points_cluster_without_panicking() {
        // Zero distances exercise the finite-density fallback.
        let labels = clusterer(HdbscanConfig::default()).fit(&matrix(&[
            &[0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0],
        ]));
        assert_eq!(labels.len(), 3);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_ne!(labels[0], NOISE);
    }

    #[test]
    fn fit_is_deterministic() {
        let clusterer = clusterer(HdbscanConfig::default());
        let first = clusterer.fit(&two_triples());
        let second = clusterer.fit(&two_triples());
        assert_eq!(first, second);
    }

    #[test]
    fn large_min_samples_is_capped_at_batch_size() {
        let config = HdbscanConfig {
            min_samples: 100,
            ..HdbscanConfig::default()
        };
        let labels = clusterer(config).fit(&two_triples());
        assert_eq!(labels.len(), 6);
    }
}
