//! Column construction and the vertical frame borders that live inside columns.

use crate::cluster_graph::ClusterGraph;
use crate::context::LayoutContext;
use crate::model::{ClusterId, Node, NodeKind};
use std::collections::BTreeMap;
use strata_graph::NodeIx;

/// Groups nodes into one column per rank.
///
/// The initial order within a column is by element id, with isolated real nodes moved by their
/// current height so unconnected elements keep their relative vertical order.
pub fn add_columns(cg: &mut ClusterGraph, ctx: &LayoutContext<'_>) {
    let mut by_rank: BTreeMap<usize, Vec<NodeIx>> = BTreeMap::new();
    for (v, node) in cg.g.node_labels() {
        by_rank.entry(node.rank).or_default().push(v);
    }

    let y_loc = |v: NodeIx| -> f64 {
        let Some(ix) = cg.node(v).and_then(Node::element) else {
            return 0.0;
        };
        if !cg.g.is_isolated(v) {
            return 0.0;
        }
        ctx.element(ix).map(|e| e.location.y).unwrap_or(0.0)
    };

    let mut columns: Vec<Vec<NodeIx>> = Vec::with_capacity(by_rank.len());
    for (_, mut col) in by_rank {
        col.sort_by(|&a, &b| node_name(cg, ctx, a).cmp(node_name(cg, ctx, b)));
        col.sort_by(|&a, &b| y_loc(b).total_cmp(&y_loc(a)));
        columns.push(col);
    }

    for (i, col) in columns.iter().enumerate() {
        for &v in col {
            if let Some(node) = cg.node_mut(v) {
                node.col = Some(i);
            }
        }
    }
    tracing::debug!(columns = columns.len(), "built columns");
    cg.columns = columns;
}

/// Element id of a real node, empty for synthetic nodes.
pub fn node_name<'c>(cg: &ClusterGraph, ctx: &'c LayoutContext<'_>, v: NodeIx) -> &'c str {
    cg.node(v)
        .and_then(Node::element)
        .map(|ix| ctx.element_id(ix))
        .unwrap_or("")
}

/// Adds an upper and a lower border node to every column a frame occupies, directly above and
/// below the frame's members, and chains the borders of each side across columns.
///
/// Inner frames are handled first so the borders of an outer frame enclose those of its children.
pub fn add_vertical_border_nodes(cg: &mut ClusterGraph) {
    let tree = cg.nesting_tree();
    let mut frames: Vec<ClusterId> = tree.live_clusters().filter(|c| !c.is_root()).collect();
    frames.sort_by_key(|&c| std::cmp::Reverse(cg.cluster(c).nesting_level));

    let mut borders: Vec<Vec<NodeIx>> = vec![Vec::new(); cg.clusters.len()];
    for c in frames {
        let mut by_col: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &v in tree.descendants[c.index()].iter().chain(&borders[c.index()]) {
            let (Some(col), Some(pos)) = (cg.node(v).and_then(|n| n.col), cg.col_pos(v)) else {
                continue;
            };
            by_col.entry(col).or_default().push(pos);
        }

        let label_height = cg.cluster(c).label_height;
        let mut lowers: Vec<NodeIx> = Vec::with_capacity(by_col.len());
        let mut uppers: Vec<NodeIx> = Vec::with_capacity(by_col.len());
        for (col, positions) in by_col {
            let (Some(&min), Some(&max)) = (positions.iter().min(), positions.iter().max()) else {
                continue;
            };

            let mut lower = Node::new(NodeKind::VerticalBorder, c, 0.0, 0.0);
            lower.col = Some(col);
            let lower = cg.g.add_node(lower);
            cg.columns[col].insert(max + 1, lower);
            lowers.push(lower);

            let mut upper = Node::new(NodeKind::VerticalBorder, c, 0.0, label_height);
            upper.col = Some(col);
            let upper = cg.g.add_node(upper);
            cg.columns[col].insert(min, upper);
            uppers.push(upper);
        }

        for pair in lowers.windows(2).chain(uppers.windows(2)) {
            cg.add_dummy_edge(pair[0], pair[1]);
        }

        let added: Vec<NodeIx> = lowers.into_iter().chain(uppers).collect();
        for a in cg.cluster_chain(c).skip(1).collect::<Vec<_>>() {
            borders[a.index()].extend(&added);
        }
    }
}

/// Drops the filler dummies once they have shaped the column order.
pub fn remove_fillers(cg: &mut ClusterGraph, ctx: &mut LayoutContext<'_>) {
    let fillers: Vec<NodeIx> = cg
        .g
        .node_labels()
        .filter(|(_, n)| n.is_filler())
        .map(|(v, _)| v)
        .collect();
    cg.remove_nodes(ctx, &fillers);
}
