use crate::build::base_from_socket;
use crate::cluster_graph::ClusterGraph;
use crate::context::LayoutContext;
use crate::model::Socket;
use indexmap::IndexSet;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::cmp::Reverse;
use strata_graph::{EdgeIx, NodeIx};

/// Virtual input indices for nodes with multi-input sockets.
///
/// Every link into a multi-input socket gets its own consecutive index, ordered by descending
/// sort id, and the following sockets are shifted accordingly. Crossing reduction sees the
/// links in the order the host draws them.
pub fn expanded_input_indices(cg: &ClusterGraph, ctx: &LayoutContext<'_>) -> HashMap<EdgeIx, usize> {
    let owners: IndexSet<NodeIx> = ctx
        .multi_input_sort_ids
        .keys()
        .map(|s| s.owner)
        .filter(|&v| cg.g.contains_node(v))
        .collect();

    let mut out: HashMap<EdgeIx, usize> = HashMap::default();
    for v in owners {
        let mut inputs: Vec<Socket> = cg
            .g
            .in_edges(v)
            .iter()
            .filter_map(|&e| cg.edge(e).map(|edge| edge.to))
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();
        inputs.sort_by_key(|s| s.idx);
        let Some(first) = inputs.first() else {
            continue;
        };

        let mut i = first.idx;
        for socket in inputs {
            let edges: Vec<EdgeIx> = cg
                .g
                .in_edges(v)
                .iter()
                .copied()
                .filter(|&e| cg.edge(e).is_some_and(|edge| edge.to == socket))
                .collect();

            let Some(sort_ids) = ctx.multi_input_sort_ids.get(&socket) else {
                for e in edges {
                    out.insert(e, i);
                }
                i += 1;
                continue;
            };

            let mut sort_ids = sort_ids.clone();
            sort_ids.sort_by_key(|&(_, id)| Reverse(id));
            let mut used: HashSet<EdgeIx> = HashSet::default();
            for (base, _) in sort_ids {
                let found = edges.iter().copied().find(|e| {
                    !used.contains(e)
                        && cg
                            .edge(*e)
                            .is_some_and(|edge| base_from_socket(cg, edge) == base)
                });
                let Some(e) = found else {
                    continue;
                };
                used.insert(e);
                out.insert(e, i);
                i += 1;
            }
        }
    }
    out
}
