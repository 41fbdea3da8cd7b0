//! Reroute chains: removal of redundant host reroutes before layout, dissolving routing dummies,
//! and snapping chains onto the height of the sockets they connect.

use crate::cluster_graph::{ClusterGraph, PathOptions};
use crate::context::LayoutContext;
use crate::model::{ClusterId, Edge, Node, Socket};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use strata_graph::NodeIx;

/// Whether a reroute-like node may be deleted without losing host information.
///
/// Synthetic nodes always may. Host reroutes are kept when they carry a label, when a saved
/// multi-input order traces back to them, or when they link to an element outside the selection.
pub fn is_safe_to_remove(ctx: &LayoutContext<'_>, v: NodeIx, node: &Node) -> bool {
    let Some(element) = node.element() else {
        return true;
    };
    if ctx.element(element).is_some_and(|e| !e.label.is_empty()) {
        return false;
    }
    if ctx.is_multi_input_base(v) {
        return false;
    }
    !ctx.linked_to_unselected.contains(&element)
}

/// Clusters whose only members are reroutes.
fn reroute_clusters(cg: &ClusterGraph) -> HashSet<ClusterId> {
    let tree = cg.nesting_tree();
    tree.live_clusters()
        .filter(|c| {
            tree.clusters[c.index()].is_empty()
                && tree.nodes[c.index()].iter().all(|&v| cg.is_reroute(v))
        })
        .collect()
}

/// Links the node feeding `path` straight to every input the path ends in. Clears `path` when a
/// direct link of the same kind already exists, since the chain is then the only thing keeping
/// two otherwise identical links into a multi-input socket apart.
fn dissolve_reroute_edges(cg: &mut ClusterGraph, path: &mut Vec<NodeIx>) {
    let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
        return;
    };
    if cg.g.out_degree(last) == 0 {
        return;
    }
    let Some(&e) = cg.g.in_edges(first).first() else {
        return;
    };
    let (Some(u), Some(edge)) = (cg.g.source(e), cg.edge(e)) else {
        return;
    };
    let o = edge.from;

    let succ_inputs: Vec<Socket> = cg
        .g
        .out_edges(last)
        .iter()
        .filter_map(|&e| cg.edge(e))
        .map(|d| d.to)
        .collect();

    let duplicate = cg
        .g
        .out_edges(u)
        .iter()
        .filter_map(|&e| cg.edge(e))
        .any(|d| d.from == o && succ_inputs.contains(&d.to));
    if duplicate {
        path.clear();
        return;
    }

    for i in succ_inputs {
        cg.g.add_edge(u, i.owner, Edge::new(o, i));
    }
}

/// Deletes host reroute chains that are safe to remove, relinking their endpoints directly.
/// Chains inside frames made only of reroutes keep their two ends.
pub fn remove_reroutes(cg: &mut ClusterGraph, ctx: &mut LayoutContext<'_>) {
    let clusters = reroute_clusters(cg);
    let paths = {
        let ctx = &*ctx;
        cg.reroute_paths(|v, n| is_safe_to_remove(ctx, v, n), PathOptions::LINEAR)
    };

    let mut removed = 0;
    for mut path in paths {
        let Some(&first) = path.first() else {
            continue;
        };
        if clusters.contains(&cg.cluster_of(first)) {
            if path.len() > 2 {
                let last = path[path.len() - 1];
                cg.add_dummy_edge(first, last);
                let between = &path[1..path.len() - 1];
                removed += between.len();
                cg.remove_nodes(ctx, between);
            }
        } else {
            dissolve_reroute_edges(cg, &mut path);
            removed += path.len();
            cg.remove_nodes(ctx, &path);
        }
    }
    tracing::debug!(removed, "removed redundant reroutes");
}

/// Replaces chains of routing dummies by direct links when reroutes are not kept.
pub fn dissolve_dummy_nodes(cg: &mut ClusterGraph, ctx: &mut LayoutContext<'_>) {
    let opts = PathOptions {
        preserve_reroute_clusters: false,
        ..PathOptions::LINEAR
    };
    let paths = cg.reroute_paths(|_, n| !n.is_real(), opts);
    for path in paths {
        let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
            continue;
        };
        let incoming = cg
            .g
            .in_edges(first)
            .first()
            .and_then(|&e| Some((cg.g.source(e)?, cg.edge(e)?.from)));
        if let Some((u, o)) = incoming {
            let succ_inputs: Vec<Socket> = cg
                .g
                .out_edges(last)
                .iter()
                .filter_map(|&e| cg.edge(e))
                .map(|d| d.to)
                .collect();
            for i in succ_inputs {
                cg.g.add_edge(u, i.owner, Edge::new(o, i));
            }
        }
        cg.remove_nodes(ctx, &path);
    }
}

fn foreign_sockets(cg: &ClusterGraph, path: &[NodeIx]) -> Vec<Socket> {
    let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
        return Vec::new();
    };
    let inputs = cg.g.in_edges(first).iter().filter_map(|&e| cg.edge(e)).map(|d| d.from);
    let outputs = cg.g.out_edges(last).iter().filter_map(|&e| cg.edge(e)).map(|d| d.to);
    inputs.chain(outputs).collect()
}

/// Whether moving every node of `path` to top `y` keeps clear of its column neighbours.
fn fits_in_columns(cg: &ClusterGraph, path: &[NodeIx], y: f64, moving_up: bool, margin_y: f64) -> bool {
    let neighbours = path.iter().filter_map(|&v| {
        let i = cg.col_pos(v)?;
        let col = &cg.columns[cg.node(v)?.col?];
        let j = if moving_up { i.checked_sub(1)? } else { i + 1 };
        cg.node(*col.get(j)?)
    });

    if moving_up {
        let lowest = neighbours.map(|n| n.y - n.height).fold(f64::INFINITY, f64::min);
        !(lowest.is_finite() && y > lowest - margin_y)
    } else {
        let height = path.first().and_then(|&v| cg.node(v)).map_or(0.0, |n| n.height);
        let highest = neighbours.map(|n| n.y).fold(f64::NEG_INFINITY, f64::max);
        !(highest.is_finite() && highest + margin_y > y - height)
    }
}

/// Moves straight reroute chains onto the height of a socket they connect, as long as the move
/// does not collide with their column neighbours. Chains that become aligned with a neighbouring
/// chain are merged with it and considered again.
pub fn align_reroutes_with_sockets(cg: &mut ClusterGraph, ctx: &LayoutContext<'_>) {
    let opts = PathOptions {
        preserve_reroute_clusters: false,
        aligned: true,
        linear: false,
    };
    let mut paths: IndexMap<Vec<NodeIx>, Vec<Socket>> = IndexMap::new();
    for p in cg.reroute_paths(|_, _| true, opts) {
        let sockets = foreign_sockets(cg, &p);
        paths.insert(p, sockets);
    }
    let mut path_of: HashMap<NodeIx, Vec<NodeIx>> = HashMap::default();
    for p in paths.keys() {
        for &v in p {
            path_of.insert(v, p.clone());
        }
    }

    let margin_y = ctx.config.margin.y;
    let mut moved = 0usize;
    loop {
        let mut changed = false;
        let keys: Vec<Vec<NodeIx>> = paths.keys().cloned().collect();
        for p1 in keys {
            let Some(&first) = p1.first() else {
                paths.shift_remove(&p1);
                continue;
            };
            let y = cg.node(first).map_or(0.0, |n| n.y);
            let target = {
                let Some(sockets) = paths.get_mut(&p1) else {
                    continue;
                };
                sockets.sort_by(|&a, &b| {
                    let key = |s: Socket| {
                        let owner = cg.node(s.owner);
                        (
                            !owner.is_some_and(Node::is_reroute),
                            owner.is_none_or(|n| n.y != y),
                        )
                    };
                    key(a).cmp(&key(b)).then_with(|| {
                        (y - cg.socket_y(a)).abs().total_cmp(&(y - cg.socket_y(b)).abs())
                    })
                });
                sockets.first().copied()
            };

            let Some(target) = target.filter(|&s| cg.socket_y(s) != y) else {
                paths.shift_remove(&p1);
                continue;
            };

            let movement = y - cg.socket_y(target);
            if !fits_in_columns(cg, &p1, y - movement, movement < 0.0, margin_y) {
                continue;
            }
            for &v in &p1 {
                if let Some(node) = cg.node_mut(v) {
                    node.y -= movement;
                }
            }
            moved += 1;

            let w = target.owner;
            if cg.is_reroute(w) {
                if let Some(p2) = path_of.get(&w).cloned() {
                    let last_rank = p1.last().map_or(0, |&v| cg.rank(v));
                    let p3: Vec<NodeIx> = if cg.rank(w) > last_rank {
                        p1.iter().chain(&p2).copied().collect()
                    } else {
                        p2.iter().chain(&p1).copied().collect()
                    };
                    let sockets = foreign_sockets(cg, &p3);
                    paths.shift_remove(&p1);
                    paths.shift_remove(&p2);
                    for &v in &p3 {
                        path_of.insert(v, p3.clone());
                    }
                    paths.insert(p3, sockets);
                }
            }
            changed = true;
        }

        if !changed {
            if paths.is_empty() {
                break;
            }
            for sockets in paths.values_mut() {
                if !sockets.is_empty() {
                    sockets.remove(0);
                }
            }
        }
    }
    tracing::debug!(moved, "aligned reroutes with sockets");
}
