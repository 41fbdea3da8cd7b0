//! Splits long edges into unit-length chains.
//!
//! Long edges that leave the same output socket are funneled through shared dummy nodes first
//! ([`merge_edges`]), the rest get one dummy per intermediate rank ([`insert_dummy_nodes`]).
//! Afterwards every edge spans exactly one rank and every frame occupies a contiguous rank range.

use crate::cluster_graph::ClusterGraph;
use crate::config::LayoutConfig;
use crate::model::{ClusterId, Edge, Node, NodeKind, Socket};
use crate::rank::update_cluster_ranks;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use strata_graph::{EdgeIx, NodeIx};

fn long_edges(cg: &ClusterGraph) -> Vec<(EdgeIx, NodeIx, NodeIx)> {
    cg.g.edges()
        .filter_map(|e| {
            let (u, v) = cg.g.endpoints(e)?;
            (cg.rank(v) > cg.rank(u) + 1).then_some((e, u, v))
        })
        .collect()
}

fn add_dummy(cg: &mut ClusterGraph, cluster: ClusterId, rank: usize, size: f64) -> NodeIx {
    cg.g.add_node(Node::dummy(cluster, rank, size))
}

/// Funnels long edges leaving the same output socket through one shared dummy chain.
///
/// Edges are visited by target rank; each target gets a dummy one rank before it, shared with
/// any earlier target of the same rank, and the dummies are chained in rank order.
pub fn merge_edges(cg: &mut ClusterGraph, config: &LayoutConfig) {
    let mut groups: IndexMap<Socket, Vec<(EdgeIx, NodeIx, NodeIx)>> = IndexMap::new();
    for (e, u, v) in long_edges(cg) {
        let Some(edge) = cg.edge(e) else {
            continue;
        };
        groups.entry(edge.from).or_default().push((e, u, v));
    }

    let mut merged = 0usize;
    for (from, mut edges) in groups {
        if edges.len() < 2 {
            continue;
        }
        edges.sort_by_key(|&(_, _, v)| cg.rank(v));

        let u = from.owner;
        let mut dummies: Vec<NodeIx> = Vec::new();
        let mut last_target = u;
        for (e, _, v) in edges {
            let Some(edge) = cg.edge(e) else {
                continue;
            };
            let rank = cg.rank(v) - 1;
            let w = match dummies.last() {
                Some(&w) if cg.rank(w) == rank => w,
                _ => {
                    let c = cg.lowest_common_cluster(cg.cluster_of(u), cg.cluster_of(v));
                    let w = add_dummy(cg, c, rank, config.reroute_size);
                    dummies.push(w);
                    w
                }
            };
            cg.g.add_edge(w, v, Edge::new(Socket::output(w, 0), edge.to));
            cg.g.remove_edge(e);
            last_target = v;
        }

        let Some(&first) = dummies.first() else {
            continue;
        };
        for pair in dummies.windows(2) {
            cg.add_dummy_edge(pair[0], pair[1]);
        }
        cg.g.add_edge(u, first, Edge::new(from, Socket::input(first, 0)));
        improve_cluster_assignment(cg, config, (u, last_target), &dummies);
        merged += 1;
    }

    tracing::debug!(groups = merged, "merged long edges");
}

/// Replaces every remaining long edge by a chain of dummies, then pads frames with filler
/// dummies at every rank inside their span that has no member.
pub fn insert_dummy_nodes(cg: &mut ClusterGraph, config: &LayoutConfig) {
    update_cluster_ranks(cg);

    let edges = long_edges(cg);
    let mut inserted = 0usize;
    for (e, u, v) in edges {
        let c = cg.lowest_common_cluster(cg.cluster_of(u), cg.cluster_of(v));
        let dummies: Vec<NodeIx> = (cg.rank(u) + 1..cg.rank(v))
            .map(|rank| add_dummy(cg, c, rank, config.reroute_size))
            .collect();
        inserted += dummies.len();
        improve_cluster_assignment(cg, config, (u, v), &dummies);
        cg.add_dummy_nodes_to_edge(e, &dummies);
    }

    let fillers = add_filler_nodes(cg, config.reroute_size);
    tracing::debug!(dummies = inserted, fillers, "inserted dummy nodes");
}

fn add_filler_nodes(cg: &mut ClusterGraph, size: f64) -> usize {
    let tree = cg.nesting_tree();
    let mut ranks: Vec<BTreeSet<usize>> = tree
        .descendants
        .iter()
        .map(|d| d.iter().map(|&v| cg.rank(v)).collect())
        .collect();

    let mut frames: Vec<ClusterId> = tree.live_clusters().filter(|c| !c.is_root()).collect();
    frames.sort_by_key(|&c| std::cmp::Reverse(cg.cluster(c).nesting_level));

    let mut count = 0;
    for c in frames {
        let present: Vec<usize> = ranks[c.index()].iter().copied().collect();
        for pair in present.windows(2) {
            for rank in pair[0] + 1..pair[1] {
                let mut filler = Node::new(NodeKind::Dummy { filler: true }, c, size, size);
                filler.rank = rank;
                cg.g.add_node(filler);
                count += 1;
                for a in cg.cluster_chain(c) {
                    ranks[a.index()].insert(rank);
                }
            }
        }
    }
    count
}

/// Moves the dummies of edge `(u, v)` into the frames of `u` and `v` as far as the ranks of
/// those frames allow, so connectors stay inside a frame instead of cutting across its border.
pub fn improve_cluster_assignment(
    cg: &mut ClusterGraph,
    config: &LayoutConfig,
    (u, v): (NodeIx, NodeIx),
    dummies: &[NodeIx],
) {
    if config.keep_reroutes_outside_frames || dummies.is_empty() {
        return;
    }

    let (cu, cv) = (cg.cluster_of(u), cg.cluster_of(v));
    let (ru, rv) = (cg.rank(u), cg.rank(v));
    let parent = |c: ClusterId| cg.parent(c).unwrap_or(ClusterId::ROOT);
    let left = |c: ClusterId| cg.cluster(c).left_rank;
    let right = |c: ClusterId| cg.cluster(c).right_rank;

    let (c1, c2) = if cu.is_root() || cv.is_root() || right(cu) >= left(cv) {
        if !cv.is_root() && ru < left(cv) {
            let mut c = cv;
            while !parent(c).is_root() && ru < left(parent(c)) {
                c = parent(c);
            }
            (None, Some(c))
        } else if !cu.is_root() && rv > right(cu) {
            let mut c = cu;
            while !parent(c).is_root() && rv > right(parent(c)) {
                c = parent(c);
            }
            (Some(c), None)
        } else {
            return;
        }
    } else {
        let (mut a, mut b) = (cu, cv);
        loop {
            let pa = parent(a);
            if !pa.is_root() && right(pa) < left(b) {
                a = pa;
                continue;
            }
            let pb = parent(b);
            if !pb.is_root() && right(a) < left(pb) {
                b = pb;
                continue;
            }
            break;
        }
        (Some(a), Some(b))
    };

    let (stop1, stop2) = (c1.map(parent), c2.map(parent));
    if let Some(stop) = stop1 {
        assign_clusters(cg, dummies.iter().copied(), cu, stop, true);
    }
    if let Some(stop) = stop2 {
        assign_clusters(cg, dummies.iter().rev().copied(), cv, stop, false);
    }
}

/// Walks `dummies` while climbing from `start` towards `stop`, assigning each dummy to the
/// first cluster whose rank extent contains it on the given side.
fn assign_clusters(
    cg: &mut ClusterGraph,
    dummies: impl Iterator<Item = NodeIx>,
    start: ClusterId,
    stop: ClusterId,
    from_left: bool,
) {
    let mut c = start;
    for w in dummies {
        let rank = cg.rank(w);
        loop {
            if c == stop {
                break;
            }
            let cluster = cg.cluster(c);
            let within = if from_left {
                rank <= cluster.right_rank
            } else {
                rank >= cluster.left_rank
            };
            if within {
                break;
            }
            match cg.parent(c) {
                Some(p) => c = p,
                None => break,
            }
        }
        if c == stop {
            break;
        }
        if let Some(node) = cg.node_mut(w) {
            node.cluster = c;
        }
    }
}
