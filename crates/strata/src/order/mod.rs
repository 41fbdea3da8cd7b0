//! Crossing minimization.
//!
//! A layer-by-layer sweep in alternating directions over two-layer reduction graphs, one per
//! cluster and adjacent column pair, so frames stay contiguous in every column. Each restart
//! sweeps until the crossing count stops improving; the best column order over all restarts is
//! kept.

mod barycenter;
mod cross_count;
mod layer_tree;
mod multi_input;
mod reduction_graph;

pub use cross_count::{cross_count, two_layer_cross_count};

use crate::cluster_graph::ClusterGraph;
use crate::context::LayoutContext;
use crate::model::{ClusterId, Socket};
use barycenter::Barycenters;
use layer_tree::LayerTree;
use multi_input::expanded_input_indices;
use rand::Rng;
use reduction_graph::ReductionGraph;
use rustc_hash::FxHashMap as HashMap;
use strata_graph::{EdgeIx, NodeIx};

/// A vertex of a reduction graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Vertex {
    Node(NodeIx),
    /// A child cluster collapsed into a single vertex.
    Cluster(ClusterId),
    /// Upper or lower border of a collapsed cluster on the fixed side.
    Border(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VSocket {
    owner: Vertex,
    idx: usize,
    is_output: bool,
}

impl VSocket {
    fn of(s: Socket) -> Self {
        Self {
            owner: Vertex::Node(s.owner),
            idx: s.idx,
            is_output: s.is_output,
        }
    }
}

/// Reduction graphs of one adjacent column pair, parents before children.
type Item = Vec<ReductionGraph>;

fn build_items(
    cg: &ClusterGraph,
    trees: &[LayerTree],
    input_indices: &HashMap<EdgeIx, usize>,
    forwards: bool,
) -> Vec<Item> {
    let pairs: Vec<(usize, usize)> = if forwards {
        (1..trees.len()).map(|i| (i - 1, i)).collect()
    } else {
        (1..trees.len()).rev().map(|i| (i, i - 1)).collect()
    };
    pairs
        .into_iter()
        .map(|(fixed, free)| {
            let (fixed, free) = (&trees[fixed], &trees[free]);
            free.clusters
                .iter()
                .map(|&h| ReductionGraph::new(cg, h, fixed, free, input_indices, forwards))
                .collect()
        })
        .collect()
}

/// Re-sorts the free side of every reduction graph by the current column order.
fn sort_reduced_free_columns(cg: &ClusterGraph, trees: &[LayerTree], items: &mut [Item]) {
    for rg in items.iter_mut().flatten() {
        let tree = &trees[rg.free_col];
        let pos = |v: &Vertex| -> usize {
            let w = match *v {
                Vertex::Node(v) => Some(v),
                Vertex::Cluster(c) => tree.first_node(c),
                Vertex::Border(_) => None,
            };
            w.and_then(|w| cg.col_pos(w)).unwrap_or(usize::MAX)
        };
        rg.reduced_free.sort_by_key(pos);
    }
}

/// Nodes of a column in the order given by the barycenters of each cluster's children.
fn new_col_order(tree: &LayerTree, root: ClusterId, barycenters: &Barycenters) -> Vec<NodeIx> {
    let mut out = Vec::new();
    let mut stack = vec![Vertex::Cluster(root)];
    while let Some(v) = stack.pop() {
        match v {
            Vertex::Node(v) => out.push(v),
            Vertex::Cluster(c) => {
                let mut children = tree.children(c).to_vec();
                children.sort_by(|a, b| {
                    let ba = barycenters.get(a).copied().unwrap_or(0.0);
                    let bb = barycenters.get(b).copied().unwrap_or(0.0);
                    ba.total_cmp(&bb)
                });
                stack.extend(children.into_iter().rev());
            }
            Vertex::Border(_) => {}
        }
    }
    out
}

struct Sweeps<'a> {
    trees: &'a [LayerTree],
    forward: Vec<Item>,
    backward: Vec<Item>,
}

impl Sweeps<'_> {
    fn sort_reduced_free_columns(&mut self, cg: &ClusterGraph) {
        sort_reduced_free_columns(cg, self.trees, &mut self.forward);
        sort_reduced_free_columns(cg, self.trees, &mut self.backward);
    }

    /// One sweep over all column pairs in the given direction. Returns its crossing count.
    fn sweep(
        &mut self,
        cg: &mut ClusterGraph,
        ctx: &mut LayoutContext<'_>,
        forwards: bool,
        is_first_sweep: bool,
    ) -> f64 {
        let mut barycenters: Barycenters = HashMap::default();
        let mut count = 0.0;
        let items = if forwards {
            &mut self.forward
        } else {
            &mut self.backward
        };

        for (i, item) in items.iter_mut().enumerate() {
            let Some(first) = item.first() else {
                continue;
            };
            let (fixed_col, free_col, root) = (first.fixed_col, first.free_col, first.h);

            let mut last_pos: HashMap<ClusterId, usize> = HashMap::default();
            if i == 0 {
                for (j, &v) in cg.columns[fixed_col].iter().enumerate() {
                    for c in cg.cluster_chain(cg.cluster_of(v)) {
                        last_pos.insert(c, j);
                    }
                }
            }

            for rg in item.iter_mut() {
                if i == 0 {
                    rg.constrained
                        .sort_by_key(|c| last_pos.get(c).copied().unwrap_or(usize::MAX));
                } else {
                    rg.constrained.sort_by(|a, b| {
                        let ba = barycenters.get(&Vertex::Cluster(*a)).copied().unwrap_or(0.0);
                        let bb = barycenters.get(&Vertex::Cluster(*b)).copied().unwrap_or(0.0);
                        ba.total_cmp(&bb)
                    });
                }
                barycenter::sort_expanded_fixed(rg, cg);

                let ranks = barycenter::socket_ranks(rg, forwards);
                barycenter::calc_barycenters(rg, &ranks, &mut barycenters, &mut ctx.rng);
                barycenter::fill_in_unknown_barycenters(
                    &rg.reduced_free,
                    &mut barycenters,
                    is_first_sweep,
                    &mut ctx.rng,
                );
                barycenter::handle_constraints(rg, &mut barycenters);

                count += barycenter::graph_cross_count(rg, &barycenters);
            }

            cg.columns[free_col] = new_col_order(&self.trees[free_col], root, &barycenters);
        }
        count
    }

    /// Sweeps in alternating directions, starting with a random one, until the crossing count
    /// stops improving. Leaves the best order in `cg` and returns its crossing count.
    fn minimized_cross_count(&mut self, cg: &mut ClusterGraph, ctx: &mut LayoutContext<'_>) -> f64 {
        let mut cross_count = f64::INFINITY;
        let mut forwards = ctx.rng.gen_bool(0.5);
        let mut is_first_sweep = true;
        let mut best_columns = cg.columns.clone();
        loop {
            if cross_count == 0.0 {
                return 0.0;
            }

            forwards = !forwards;
            let old_cross_count = cross_count;
            cross_count = self.sweep(cg, ctx, forwards, is_first_sweep);
            tracing::trace!(forwards, crossings = cross_count, "sweep");

            if old_cross_count > cross_count {
                self.sort_reduced_free_columns(cg);
                best_columns = cg.columns.clone();
                is_first_sweep = false;
            } else {
                cg.columns = best_columns;
                return old_cross_count;
            }
        }
    }
}

/// Reorders the nodes within every column to reduce crossings.
///
/// The result never has more crossings than the initial order.
pub fn minimize_crossings(cg: &mut ClusterGraph, ctx: &mut LayoutContext<'_>) {
    let n = cg.columns.len();
    if n < 2 {
        return;
    }

    let trees: Vec<LayerTree> = (0..n).map(|i| LayerTree::build(cg, i)).collect();
    let input_indices = expanded_input_indices(cg, ctx);
    let mut sweeps = Sweeps {
        trees: &trees,
        forward: build_items(cg, &trees, &input_indices, true),
        backward: build_items(cg, &trees, &input_indices, false),
    };

    let initial_columns = cg.columns.clone();
    let initial_count = cross_count(cg);

    let mut best_count = f64::INFINITY;
    let mut best_columns = cg.columns.clone();
    for restart in 0..ctx.config.iterations {
        let count = sweeps.minimized_cross_count(cg, ctx);
        tracing::trace!(restart, crossings = count, "restart");
        if count < best_count {
            best_count = count;
            best_columns = cg.columns.clone();
            if best_count == 0.0 {
                break;
            }
        } else {
            cg.columns = best_columns.clone();
            sweeps.sort_reduced_free_columns(cg);
        }
    }
    cg.columns = best_columns;

    let final_count = cross_count(cg);
    if final_count > initial_count {
        cg.columns = initial_columns;
    }
    tracing::debug!(
        initial = initial_count,
        crossings = final_count.min(initial_count),
        "minimized crossings"
    );
}
