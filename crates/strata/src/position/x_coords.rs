use crate::cluster_graph::ClusterGraph;
use crate::config::LayoutConfig;
use crate::model::ClusterId;
use rustc_hash::FxHashSet as HashSet;

/// Clusters of the column plus all their ancestors.
fn cluster_closure(cg: &ClusterGraph, col: usize) -> HashSet<ClusterId> {
    let mut out = HashSet::default();
    for &v in &cg.columns[col] {
        out.extend(cg.cluster_chain(cg.cluster_of(v)));
    }
    out
}

/// Deepest chain of frames in `side` that are not also in `other`.
fn exclusive_depth(cg: &ClusterGraph, side: &HashSet<ClusterId>, other: &HashSet<ClusterId>) -> usize {
    side.iter()
        .map(|&c| {
            cg.cluster_chain(c)
                .filter(|a| !a.is_root() && !other.contains(a))
                .count()
        })
        .max()
        .unwrap_or(0)
}

/// Extra space after column `i` for the frame edges that open or close between it and the next
/// column.
fn frame_padding_of_col(cg: &ClusterGraph, config: &LayoutConfig, i: usize) -> f64 {
    if i + 1 >= cg.columns.len() {
        return 0.0;
    }

    let direct = |col: usize| -> HashSet<ClusterId> {
        cg.columns[col].iter().map(|&v| cg.cluster_of(v)).collect()
    };
    if direct(i) == direct(i + 1) {
        return 0.0;
    }

    let (left, right) = (cluster_closure(cg, i), cluster_closure(cg, i + 1));
    let dist = exclusive_depth(cg, &left, &right) + exclusive_depth(cg, &right, &left);
    config.frame_padding * dist as f64
}

/// Assigns the left edge of every node column by column.
///
/// Nodes are centred on the widest node of their column; reroutes sit on the column's left
/// edge. The gap after a column grows with the number of steep links leaving it.
pub fn assign_x_coords(cg: &mut ClusterGraph, config: &LayoutConfig) {
    let mut x = 0.0;
    for i in 0..cg.columns.len() {
        let col = cg.columns[i].clone();
        let max_width = col
            .iter()
            .filter_map(|&v| cg.node(v).map(|n| n.width))
            .fold(0.0, f64::max);

        for &v in &col {
            let Some(node) = cg.node_mut(v) else {
                continue;
            };
            node.x = if node.is_reroute() {
                x
            } else {
                x - (node.width - max_width) / 2.0
            };
        }

        let steep = col
            .iter()
            .flat_map(|&v| cg.g.out_edges(v).iter().copied())
            .filter_map(|e| cg.edge(e))
            .filter(|edge| (cg.socket_y(edge.to) - cg.socket_y(edge.from)).abs() >= config.margin.x * 3.0)
            .count();
        let spacing = (1.0 + (steep as f64 / 4.0).min(2.0)) * config.margin.x;
        x += max_width + spacing + frame_padding_of_col(cg, config, i);
    }
    tracing::debug!(columns = cg.columns.len(), width = x, "assigned x coordinates");
}
