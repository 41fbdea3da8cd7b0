//! Layer assignment.
//!
//! Nodes are layered by longest path over a constraint graph that also holds a left and a right
//! border vertex for every frame. Members sit between their frame's borders, and an edge between
//! two sibling subtrees of a frame keeps the source subtree entirely left of the target subtree.
//! This keeps every frame's rank span contiguous and free of foreign nodes where possible.

use crate::cluster_graph::ClusterGraph;
use crate::model::ClusterId;
use rustc_hash::FxHashMap as HashMap;
use strata_graph::{Graph, NodeIx, alg};

/// Rank constraint graph. Edge labels are minimum lengths.
struct Constraints {
    g: Graph<(), usize>,
    node_vertex: HashMap<NodeIx, NodeIx>,
    borders: HashMap<ClusterId, (NodeIx, NodeIx)>,
}

impl Constraints {
    fn constrain(&mut self, from: NodeIx, to: NodeIx, minlen: usize) {
        self.g.add_edge(from, to, minlen);
    }

    fn left_of(&self, v: NodeIx, c: Option<ClusterId>) -> Option<NodeIx> {
        match c {
            Some(c) => self.borders.get(&c).map(|&(left, _)| left),
            None => self.node_vertex.get(&v).copied(),
        }
    }

    fn right_of(&self, v: NodeIx, c: Option<ClusterId>) -> Option<NodeIx> {
        match c {
            Some(c) => self.borders.get(&c).map(|&(_, right)| right),
            None => self.node_vertex.get(&v).copied(),
        }
    }
}

/// Child of `ancestor` on the cluster chain of `c`, or `None` when `c` is `ancestor` itself.
fn child_towards(cg: &ClusterGraph, ancestor: ClusterId, c: ClusterId) -> Option<ClusterId> {
    cg.cluster_chain(c)
        .take_while(|&x| x != ancestor)
        .last()
}

fn build_constraints(cg: &ClusterGraph) -> Constraints {
    let tree = cg.nesting_tree();
    let mut cons = Constraints {
        g: Graph::with_capacity(cg.g.node_count(), cg.g.edge_count()),
        node_vertex: HashMap::default(),
        borders: HashMap::default(),
    };

    for v in cg.g.nodes() {
        let x = cons.g.add_node(());
        cons.node_vertex.insert(v, x);
    }
    for c in tree.live_clusters().filter(|c| !c.is_root()) {
        let left = cons.g.add_node(());
        let right = cons.g.add_node(());
        cons.borders.insert(c, (left, right));
    }

    let frames: Vec<ClusterId> = tree.live_clusters().filter(|c| !c.is_root()).collect();
    for &c in &frames {
        let (left, right) = cons.borders[&c];
        for &v in &tree.nodes[c.index()] {
            let x = cons.node_vertex[&v];
            cons.constrain(left, x, 0);
            cons.constrain(x, right, 0);
        }
        for &child in &tree.clusters[c.index()] {
            let (child_left, child_right) = cons.borders[&child];
            cons.constrain(left, child_left, 0);
            cons.constrain(child_right, right, 0);
        }
    }

    for e in cg.g.edges() {
        let Some((u, v)) = cg.g.endpoints(e) else {
            continue;
        };
        let (x, y) = (cons.node_vertex[&u], cons.node_vertex[&v]);
        cons.constrain(x, y, 1);

        let (cu, cv) = (cg.cluster_of(u), cg.cluster_of(v));
        if cu == cv {
            continue;
        }
        let lca = cg.lowest_common_cluster(cu, cv);
        let (su, sv) = (child_towards(cg, lca, cu), child_towards(cg, lca, cv));
        if su.is_none() && sv.is_none() {
            continue;
        }
        let (Some(from), Some(to)) = (cons.right_of(u, su), cons.left_of(v, sv)) else {
            continue;
        };
        if from == x && to == y {
            continue;
        }
        if alg::has_path(&cons.g, to, from) {
            tracing::trace!(?u, ?v, "skipped frame separation constraint");
            continue;
        }
        cons.constrain(from, to, 1);
    }

    cons
}

/// Length of the longest path from every vertex to a sink, honouring edge minimum lengths.
fn longest_paths(g: &Graph<(), usize>) -> Vec<usize> {
    let order = alg::toposort(g).unwrap_or_else(|cycle| {
        tracing::warn!(node = ?cycle.node, "rank constraints are cyclic");
        g.node_ids()
    });

    let mut height = vec![0usize; g.node_bound()];
    for &x in order.iter().rev() {
        let mut h = 0;
        for &e in g.out_edges(x) {
            let (Some(y), Some(&minlen)) = (g.target(e), g.edge(e)) else {
                continue;
            };
            h = h.max(height[y.index()] + minlen);
        }
        height[x.index()] = h;
    }
    height
}

/// Assigns `rank` to every node (starting at 0) and records the rank extent of every frame.
pub fn compute_ranks(cg: &mut ClusterGraph) {
    let cons = build_constraints(cg);
    let height = longest_paths(&cons.g);
    let max_height = height.iter().copied().max().unwrap_or(0);

    let ranks: Vec<(NodeIx, usize)> = cons
        .node_vertex
        .iter()
        .map(|(&v, &x)| (v, max_height - height[x.index()]))
        .collect();
    let min_rank = ranks.iter().map(|&(_, r)| r).min().unwrap_or(0);
    for (v, r) in ranks {
        if let Some(node) = cg.node_mut(v) {
            node.rank = r - min_rank;
        }
    }

    update_cluster_ranks(cg);
    tracing::debug!(
        ranks = cg.g.node_labels().map(|(_, n)| n.rank + 1).max().unwrap_or(0),
        "computed ranks"
    );
}

/// Recomputes `left_rank`/`right_rank` of every live cluster from its descendant nodes.
pub fn update_cluster_ranks(cg: &mut ClusterGraph) {
    let tree = cg.nesting_tree();
    for (i, descendants) in tree.descendants.iter().enumerate() {
        let ranks = descendants.iter().map(|&v| cg.rank(v));
        let (Some(left), Some(right)) = (ranks.clone().min(), ranks.max()) else {
            continue;
        };
        let cluster = &mut cg.clusters[i];
        cluster.left_rank = left;
        cluster.right_rank = right;
    }
}
