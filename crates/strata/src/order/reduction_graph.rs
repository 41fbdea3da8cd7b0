//! Two-layer crossing reduction graphs.
//!
//! For a pair of adjacent columns and a cluster `h` of the free column, the free side is reduced
//! to the children of `h`: member nodes stay as they are, child clusters collapse into a single
//! vertex. The fixed side is the whole fixed column plus a pair of border vertices for every
//! collapsed cluster that also spans the fixed column, which pulls the cluster towards its
//! members on the fixed side.

use super::layer_tree::{LayerTree, child_towards};
use super::{VSocket, Vertex};
use crate::cluster_graph::ClusterGraph;
use crate::model::ClusterId;
use indexmap::IndexMap;
use rustc_hash::FxHashMap as HashMap;
use strata_graph::{EdgeIx, NodeIx};

#[derive(Debug, Clone, Copy)]
struct ReducedEdge {
    fixed: VSocket,
    free: VSocket,
    weight: f64,
}

#[derive(Debug, Clone)]
pub struct ReductionGraph {
    pub h: ClusterId,
    pub fixed_col: usize,
    pub free_col: usize,
    /// Fixed column plus border vertices.
    pub expanded_fixed: Vec<Vertex>,
    /// Upper and lower border vertex of each collapsed cluster, with the cluster's nodes in the
    /// fixed column.
    pub border_pairs: Vec<(Vertex, Vertex, Vec<NodeIx>)>,
    pub reduced_free: Vec<Vertex>,
    pub fixed_sockets: Vec<(Vertex, Vec<VSocket>)>,
    pub free_sockets: HashMap<Vertex, Vec<VSocket>>,
    /// Collapsed clusters that also span the fixed column; their relative order is constrained.
    pub constrained: Vec<ClusterId>,
    pub degree: HashMap<Vertex, usize>,
    pub north: Vec<VSocket>,
    pub south: Vec<VSocket>,
    pub bipartite: Vec<(VSocket, VSocket, f64)>,
}

impl ReductionGraph {
    pub fn new(
        cg: &ClusterGraph,
        h: ClusterId,
        fixed: &LayerTree,
        free: &LayerTree,
        input_indices: &HashMap<EdgeIx, usize>,
        forwards: bool,
    ) -> Self {
        let mut edges: IndexMap<(VSocket, VSocket), ReducedEdge> = IndexMap::new();
        for t in free.descendant_nodes(h) {
            let incident = if forwards {
                cg.g.in_edges(t)
            } else {
                cg.g.out_edges(t)
            };
            for &e in incident {
                let Some(edge) = cg.edge(e) else {
                    continue;
                };
                let s = if forwards { edge.from.owner } else { edge.to.owner };
                if cg.node(s).and_then(|n| n.col) != Some(fixed.col) {
                    continue;
                }
                let Some(c) = child_towards(cg, h, t) else {
                    continue;
                };

                let from = VSocket::of(edge.from);
                let mut to = VSocket::of(edge.to);
                if let Some(&idx) = input_indices.get(&e) {
                    to.idx = idx;
                }
                let (fixed_socket, mut free_socket) = if forwards { (from, to) } else { (to, from) };
                if let Vertex::Cluster(_) = c {
                    free_socket = VSocket {
                        owner: c,
                        idx: 0,
                        is_output: free_socket.is_output,
                    };
                }

                edges
                    .entry((fixed_socket, free_socket))
                    .and_modify(|r| r.weight += 1.0)
                    .or_insert(ReducedEdge {
                        fixed: fixed_socket,
                        free: free_socket,
                        weight: 1.0,
                    });
            }
        }

        let fixed_nodes = &cg.columns[fixed.col];
        let mut expanded_fixed: Vec<Vertex> = fixed_nodes.iter().map(|&v| Vertex::Node(v)).collect();

        let pos = |v: &Vertex| match *v {
            Vertex::Node(v) => cg.col_pos(v).unwrap_or(usize::MAX),
            _ => usize::MAX,
        };
        let mut reduced_free: Vec<Vertex> = free.children(h).to_vec();
        reduced_free.sort_by_key(pos);

        let mut border_pairs = Vec::new();
        let mut next_border = 0;
        for &v in &reduced_free {
            let Vertex::Cluster(c) = v else {
                continue;
            };
            if !fixed.contains(c) {
                continue;
            }
            let upper = Vertex::Border(next_border);
            let lower = Vertex::Border(next_border + 1);
            next_border += 2;
            expanded_fixed.extend([upper, lower]);

            let shared = free
                .descendant_clusters(c)
                .into_iter()
                .filter(|&d| fixed.contains(d))
                .count();
            let weight = 0.5 * (1 + shared) as f64;
            for border in [upper, lower] {
                let fixed_socket = VSocket {
                    owner: border,
                    idx: 0,
                    is_output: forwards,
                };
                let free_socket = VSocket {
                    owner: v,
                    idx: 0,
                    is_output: !forwards,
                };
                edges.insert(
                    (fixed_socket, free_socket),
                    ReducedEdge {
                        fixed: fixed_socket,
                        free: free_socket,
                        weight,
                    },
                );
            }
            border_pairs.push((upper, lower, fixed.descendant_nodes(c)));
        }

        let mut fixed_sockets: Vec<(Vertex, Vec<VSocket>)> = Vec::new();
        for &u in &expanded_fixed {
            let mut sockets: Vec<VSocket> = Vec::new();
            for r in edges.values().filter(|r| r.fixed.owner == u) {
                if !sockets.contains(&r.fixed) {
                    sockets.push(r.fixed);
                }
            }
            if sockets.is_empty() {
                continue;
            }
            sockets.sort_by_key(|s| s.idx);
            if forwards {
                sockets.reverse();
            }
            fixed_sockets.push((u, sockets));
        }

        let mut free_sockets: HashMap<Vertex, Vec<VSocket>> = HashMap::default();
        let mut degree: HashMap<Vertex, usize> = HashMap::default();
        for &v in &reduced_free {
            free_sockets.insert(v, Vec::new());
        }
        for r in edges.values() {
            if let Some(sockets) = free_sockets.get_mut(&r.free.owner) {
                sockets.push(r.fixed);
            }
            *degree.entry(r.free.owner).or_default() += 1;
            *degree.entry(r.fixed.owner).or_default() += 1;
        }

        let constrained: Vec<ClusterId> = reduced_free
            .iter()
            .filter_map(|&v| match v {
                Vertex::Cluster(c) if fixed.contains(c) => Some(c),
                _ => None,
            })
            .collect();

        let mut bipartite: Vec<(VSocket, VSocket, f64)> =
            edges.values().map(|r| (r.fixed, r.free, r.weight)).collect();
        let mut north: Vec<VSocket> = Vec::new();
        let mut south: Vec<VSocket> = Vec::new();
        for &(n, s, _) in &bipartite {
            if !north.contains(&n) {
                north.push(n);
            }
            if !south.contains(&s) {
                south.push(s);
            }
        }
        if south.len() > north.len() {
            std::mem::swap(&mut north, &mut south);
            for e in &mut bipartite {
                *e = (e.1, e.0, e.2);
            }
        }
        north.sort_by_key(|s| s.idx);
        south.sort_by_key(|s| s.idx);

        Self {
            h,
            fixed_col: fixed.col,
            free_col: free.col,
            expanded_fixed,
            border_pairs,
            reduced_free,
            fixed_sockets,
            free_sockets,
            constrained,
            degree,
            north,
            south,
            bipartite,
        }
    }

    pub fn is_free(&self, v: Vertex) -> bool {
        self.free_sockets.contains_key(&v)
    }
}
