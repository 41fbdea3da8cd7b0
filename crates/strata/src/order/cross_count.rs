use crate::cluster_graph::ClusterGraph;
use rustc_hash::FxHashMap as HashMap;

/// Weighted crossings between two layers.
///
/// `edges` are `(north, south, weight)` position triples sorted by north position and, within one
/// north position, by south position. Runs an accumulator tree over the south positions.
pub fn two_layer_cross_count(edges: &[(usize, usize, f64)], south_len: usize) -> f64 {
    if edges.is_empty() || south_len == 0 {
        return 0.0;
    }

    let mut first_index: usize = 1;
    while first_index < south_len {
        first_index <<= 1;
    }
    let tree_size = 2 * first_index - 1;
    first_index -= 1;
    let mut tree: Vec<f64> = vec![0.0; tree_size];

    let mut cc: f64 = 0.0;
    for &(_, south, weight) in edges {
        let mut index = south + first_index;
        tree[index] += weight;
        let mut weight_sum: f64 = 0.0;
        while index > 0 {
            if index % 2 == 1 {
                weight_sum += tree[index + 1];
            }
            index = (index - 1) >> 1;
            tree[index] += weight;
        }
        cc += weight * weight_sum;
    }

    cc
}

/// Crossings of the current column order, counted between sockets without regard to frames.
pub fn cross_count(cg: &ClusterGraph) -> f64 {
    let mut cc: f64 = 0.0;
    for i in 1..cg.columns.len() {
        let (north, south) = (&cg.columns[i - 1], &cg.columns[i]);
        let south_pos: HashMap<_, usize> = south.iter().enumerate().map(|(i, &v)| (v, i)).collect();

        let mut pairs: Vec<((usize, usize), (usize, usize))> = Vec::new();
        for (i, &u) in north.iter().enumerate() {
            for &e in cg.g.out_edges(u) {
                let (Some(edge), Some(v)) = (cg.edge(e), cg.g.target(e)) else {
                    continue;
                };
                let Some(&j) = south_pos.get(&v) else {
                    continue;
                };
                pairs.push(((i, edge.from.idx), (j, edge.to.idx)));
            }
        }

        let mut south_keys: Vec<(usize, usize)> = pairs.iter().map(|&(_, s)| s).collect();
        south_keys.sort_unstable();
        south_keys.dedup();
        pairs.sort_unstable();

        let edges: Vec<(usize, usize, f64)> = pairs
            .iter()
            .filter_map(|&(n, s)| {
                let j = south_keys.binary_search(&s).ok()?;
                Some((n.0, j, 1.0))
            })
            .collect();
        cc += two_layer_cross_count(&edges, south_keys.len());
    }
    cc
}
