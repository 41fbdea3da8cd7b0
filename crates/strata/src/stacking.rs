//! Contraction of collapsed node chains into stacks, and their expansion after layout.
//!
//! Chains are chosen per weakly connected component of the eligible subgraph with a maximum
//! bipartite matching between out- and in-copies of the nodes, which yields disjoint paths.
//! Links whose contraction would close a cycle through the rest of the graph are dropped from
//! the chains with a weighted feedback arc set heuristic.

use crate::cluster_graph::ClusterGraph;
use crate::columns::node_name;
use crate::context::LayoutContext;
use crate::model::{Edge, Node, NodeKind, Socket};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::collections::VecDeque;
use strata_graph::{EdgeIx, Graph, NodeIx, alg};

/// A chain of nodes contracted into a single stack node.
#[derive(Debug, Clone)]
pub struct NodeStack {
    rep: NodeIx,
    /// Members top to bottom with the handles they had before contraction.
    members: Vec<(NodeIx, Node)>,
    /// Links between members.
    internal: Vec<(NodeIx, NodeIx, Edge)>,
    /// Socket of the stack node and the member socket it stands for.
    sockets: Vec<(Socket, Socket)>,
}

impl NodeStack {
    /// The stack node standing in for the chain.
    pub fn rep(&self) -> NodeIx {
        self.rep
    }

    /// Handles the members had before contraction, top to bottom.
    pub fn members(&self) -> impl Iterator<Item = NodeIx> + '_ {
        self.members.iter().map(|(v, _)| *v)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

const NIL: usize = usize::MAX;

/// Hopcroft-Karp over `adj` (top index to bottom indices). Visits tops and neighbours in the
/// given order, so the matching only depends on the input order.
fn hopcroft_karp(adj: &[Vec<usize>], n_bottom: usize) -> Vec<Option<usize>> {
    struct State<'a> {
        adj: &'a [Vec<usize>],
        pair_u: Vec<Option<usize>>,
        pair_v: Vec<usize>,
        dist: Vec<f64>,
    }

    impl State<'_> {
        fn dist(&self, u: usize) -> f64 {
            if u == NIL {
                self.dist[self.adj.len()]
            } else {
                self.dist[u]
            }
        }

        fn set_dist(&mut self, u: usize, d: f64) {
            let i = if u == NIL { self.adj.len() } else { u };
            self.dist[i] = d;
        }

        fn bfs(&mut self) -> bool {
            let mut queue: VecDeque<usize> = VecDeque::new();
            for u in 0..self.adj.len() {
                if self.pair_u[u].is_none() {
                    self.dist[u] = 0.0;
                    queue.push_back(u);
                } else {
                    self.dist[u] = f64::INFINITY;
                }
            }
            self.set_dist(NIL, f64::INFINITY);

            while let Some(u) = queue.pop_front() {
                if self.dist(u) >= self.dist(NIL) {
                    continue;
                }
                for &v in &self.adj[u] {
                    let pu = self.pair_v[v];
                    if self.dist(pu) == f64::INFINITY {
                        self.set_dist(pu, self.dist(u) + 1.0);
                        if pu != NIL {
                            queue.push_back(pu);
                        }
                    }
                }
            }
            self.dist(NIL) != f64::INFINITY
        }

        fn dfs(&mut self, u: usize) -> bool {
            if u == NIL {
                return true;
            }
            for k in 0..self.adj[u].len() {
                let v = self.adj[u][k];
                let pu = self.pair_v[v];
                if self.dist(pu) == self.dist(u) + 1.0 && self.dfs(pu) {
                    self.pair_v[v] = u;
                    self.pair_u[u] = Some(v);
                    return true;
                }
            }
            self.set_dist(u, f64::INFINITY);
            false
        }
    }

    let mut state = State {
        adj,
        pair_u: vec![None; adj.len()],
        pair_v: vec![NIL; n_bottom],
        dist: vec![f64::INFINITY; adj.len() + 1],
    };
    while state.bfs() {
        for u in 0..adj.len() {
            if state.pair_u[u].is_none() {
                state.dfs(u);
            }
        }
    }
    state.pair_u
}

/// Links of one component outside a maximum set of disjoint chains.
fn edges_outside_linear_branching(
    cg: &ClusterGraph,
    ctx: &LayoutContext<'_>,
    h: &Graph<NodeIx, EdgeIx>,
    component: &[NodeIx],
) -> Vec<EdgeIx> {
    let name = |hv: NodeIx| h.node(hv).map(|&v| node_name(cg, ctx, v)).unwrap_or("");
    let mut nodes: Vec<NodeIx> = component.to_vec();
    nodes.sort_by(|&a, &b| name(a).cmp(name(b)));
    let index: HashMap<NodeIx, usize> = nodes.iter().enumerate().map(|(i, &v)| (v, i)).collect();

    let mut edges: Vec<EdgeIx> = component
        .iter()
        .flat_map(|&v| h.out_edges(v).iter().copied())
        .collect();
    let key = |e: &EdgeIx| {
        let (u, v) = h.endpoints(*e).unwrap_or((nodes[0], nodes[0]));
        format!("{}{}", name(u), name(v))
    };
    edges.sort_by_cached_key(key);

    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for &e in &edges {
        let Some((u, v)) = h.endpoints(e) else {
            continue;
        };
        let (Some(&i), Some(&j)) = (index.get(&u), index.get(&v)) else {
            continue;
        };
        if !adj[i].contains(&j) {
            adj[i].push(j);
        }
    }

    let matching = hopcroft_karp(&adj, nodes.len());
    edges
        .into_iter()
        .filter(|&e| {
            let Some((u, v)) = h.endpoints(e) else {
                return true;
            };
            let (Some(&i), Some(&j)) = (index.get(&u), index.get(&v)) else {
                return true;
            };
            matching[i] != Some(j)
        })
        .collect()
}

/// Edges of `chain` that cannot all be contracted without creating a cycle in the layout graph.
///
/// Every chain edge is reversed with weight 1, every other edge gets infinite weight, and a
/// feedback arc set of the result is computed: cycles are broken by repeatedly subtracting the
/// lightest weight along a cycle, and removed edges are then re-added greedily where they keep
/// the graph acyclic.
fn edges_preventing_acyclic_contraction(cg: &ClusterGraph, chain: &HashSet<EdgeIx>) -> Vec<EdgeIx> {
    let mut g: Graph<(), ()> = Graph::with_capacity(cg.g.node_bound(), cg.g.edge_count());
    let handles: Vec<NodeIx> = (0..cg.g.node_bound()).map(|_| g.add_node(())).collect();

    let mut origin: Vec<EdgeIx> = Vec::new();
    let mut weights: Vec<f64> = Vec::new();
    for e in cg.g.edges() {
        let Some((u, v)) = cg.g.endpoints(e) else {
            continue;
        };
        let (u, v) = (handles[u.index()], handles[v.index()]);
        let (from, to, weight) = if chain.contains(&e) {
            (v, u, 1.0)
        } else {
            (u, v, f64::INFINITY)
        };
        if let Some(tmp) = g.add_edge(from, to, ()) {
            debug_assert_eq!(tmp.index(), origin.len());
            origin.push(e);
            weights.push(weight);
        }
    }

    let mut acyclic = g.clone();
    while let Some(cycle) = alg::find_cycle(&acyclic) {
        let on_cycle: HashSet<NodeIx> = cycle
            .iter()
            .filter_map(|&e| acyclic.source(e))
            .collect();
        let induced: Vec<EdgeIx> = acyclic
            .edges()
            .filter(|&e| {
                acyclic
                    .endpoints(e)
                    .is_some_and(|(a, b)| on_cycle.contains(&a) && on_cycle.contains(&b))
            })
            .collect();
        let min_weight = induced
            .iter()
            .map(|e| weights[e.index()])
            .fold(f64::INFINITY, f64::min);
        if !(min_weight.is_finite() && min_weight > 0.0) {
            tracing::warn!("cannot break cycle through stack chain");
            break;
        }
        for e in induced {
            weights[e.index()] -= min_weight;
            if weights[e.index()] == 0.0 {
                acyclic.remove_edge(e);
            }
        }
    }

    let mut out = Vec::new();
    for e in g.edges() {
        if acyclic.contains_edge(e) {
            continue;
        }
        let Some((a, b)) = g.endpoints(e) else {
            continue;
        };
        let Some(readded) = acyclic.add_edge(a, b, ()) else {
            continue;
        };
        if !alg::is_acyclic(&acyclic) {
            acyclic.remove_edge(readded);
            out.push(origin[e.index()]);
        }
    }
    out
}

fn remove_chain_edges(h: &mut Graph<NodeIx, EdgeIx>, removed: &[EdgeIx]) {
    let doomed: Vec<EdgeIx> = h
        .edges()
        .filter(|&e| h.edge(e).is_some_and(|orig| removed.contains(orig)))
        .collect();
    for e in doomed {
        h.remove_edge(e);
    }
}

/// Contracts every chain of collapsed, stackable nodes into a stack node.
pub fn contract_node_stacks(cg: &mut ClusterGraph, ctx: &LayoutContext<'_>) -> Vec<NodeStack> {
    let eligible: Vec<NodeIx> = cg
        .g
        .node_labels()
        .filter(|(_, n)| {
            n.collapsed
                && n.element()
                    .and_then(|ix| ctx.element(ix))
                    .is_some_and(|e| e.stackable)
        })
        .map(|(v, _)| v)
        .collect();

    let mut h: Graph<NodeIx, EdgeIx> = Graph::new();
    let mut h_of: HashMap<NodeIx, NodeIx> = HashMap::default();
    for &v in &eligible {
        h_of.insert(v, h.add_node(v));
    }
    for &u in &eligible {
        let Some(&hu) = h_of.get(&u) else {
            continue;
        };
        let mut targets: HashMap<NodeIx, usize> = HashMap::default();
        for v in cg.g.successors(u) {
            *targets.entry(v).or_default() += 1;
        }
        for &e in cg.g.out_edges(u) {
            let Some(v) = cg.g.target(e) else {
                continue;
            };
            let Some(&hv) = h_of.get(&v) else {
                continue;
            };
            if cg.cluster_of(u) != cg.cluster_of(v) || targets.get(&v).copied().unwrap_or(0) > 1 {
                continue;
            }
            h.add_edge(hu, hv, e);
        }
    }

    for component in alg::weakly_connected_components(&h) {
        for e in edges_outside_linear_branching(cg, ctx, &h, &component) {
            h.remove_edge(e);
        }
    }

    for component in alg::weakly_connected_components(&h) {
        let chain: HashSet<EdgeIx> = component
            .iter()
            .flat_map(|&v| h.out_edges(v).iter().filter_map(|&e| h.edge(e).copied()))
            .collect();
        let removed = edges_preventing_acyclic_contraction(cg, &chain);
        remove_chain_edges(&mut h, &removed);
    }
    let chain: HashSet<EdgeIx> = h.edges().filter_map(|e| h.edge(e).copied()).collect();
    let removed = edges_preventing_acyclic_contraction(cg, &chain);
    remove_chain_edges(&mut h, &removed);

    let Ok(order) = alg::toposort(&h) else {
        tracing::warn!("stack chains are cyclic; skipping stacking");
        return Vec::new();
    };
    let mut topo_index: HashMap<NodeIx, usize> = HashMap::default();
    for (i, v) in order.into_iter().enumerate() {
        topo_index.insert(v, i);
    }

    let mut stacks = Vec::new();
    for mut component in alg::weakly_connected_components(&h) {
        if component.len() < 2 {
            continue;
        }
        component.sort_by_key(|v| topo_index.get(v).copied().unwrap_or(usize::MAX));
        let path: Vec<NodeIx> = component.iter().filter_map(|&hv| h.node(hv).copied()).collect();
        stacks.push(contract(cg, ctx, &path));
    }

    tracing::debug!(stacks = stacks.len(), "contracted node stacks");
    stacks
}

fn contract(cg: &mut ClusterGraph, ctx: &LayoutContext<'_>, path: &[NodeIx]) -> NodeStack {
    let cluster = cg.cluster_of(path[0]);
    let rep = cg.g.add_node(Node::new(NodeKind::Stack, cluster, 0.0, 0.0));
    let mut stack = NodeStack {
        rep,
        members: Vec::with_capacity(path.len()),
        internal: Vec::new(),
        sockets: Vec::new(),
    };

    let spacing = ctx.config.margin.y * ctx.config.stack_margin_y_factor;
    let mut y = 0.0;
    let mut width: f64 = 0.0;
    for &v in path {
        for is_output in [false, true] {
            let incident = if is_output {
                cg.g.out_edges(v)
            } else {
                cg.g.in_edges(v)
            };
            let mut external: Vec<(EdgeIx, Edge)> = incident
                .iter()
                .filter_map(|&e| cg.edge(e).map(|edge| (e, edge)))
                .filter(|(_, edge)| !path.contains(&edge.opposite_socket(v).owner))
                .collect();
            external.sort_by_key(|(_, edge)| edge.socket_of(v).idx);

            for (e, edge) in external {
                let original = edge.socket_of(v);
                let socket = Socket {
                    owner: rep,
                    idx: stack.sockets.len(),
                    is_output,
                };
                let offset = cg.socket_offset(original) - y;
                if let Some(node) = cg.node_mut(rep) {
                    node.set_socket_offset(is_output, socket.idx, offset);
                }
                stack.sockets.push((socket, original));

                cg.g.remove_edge(e);
                if is_output {
                    cg.g.add_edge(rep, edge.to.owner, Edge::new(socket, edge.to));
                } else {
                    cg.g.add_edge(edge.from.owner, rep, Edge::new(edge.from, socket));
                }
            }
        }

        let Some(node) = cg.node(v) else {
            continue;
        };
        y += node.height + spacing;
        width = width.max(node.width);
    }

    for &v in path {
        for &e in cg.g.out_edges(v) {
            if let (Some(edge), Some(w)) = (cg.edge(e), cg.g.target(e)) {
                stack.internal.push((v, w, edge));
            }
        }
    }
    for &v in path {
        if let Some(node) = cg.g.remove_node(v) {
            stack.members.push((v, node));
        }
    }

    if let Some(node) = cg.node_mut(rep) {
        node.height = y;
        node.width = width;
    }
    stack
}

/// Puts the members of a stack back in place of the stack node, top to bottom, and reconnects
/// their links.
pub fn expand_node_stack(cg: &mut ClusterGraph, ctx: &mut LayoutContext<'_>, stack: NodeStack) {
    let Some(rep_node) = cg.node(stack.rep).cloned() else {
        return;
    };
    let spacing = ctx.config.margin.y * ctx.config.stack_margin_y_factor;

    let mut new_of: HashMap<NodeIx, NodeIx> = HashMap::default();
    let mut placed = Vec::with_capacity(stack.members.len());
    let mut y = rep_node.y;
    for (old, mut node) in stack.members {
        node.cluster = rep_node.cluster;
        node.rank = rep_node.rank;
        node.col = rep_node.col;
        node.x = rep_node.x - (node.width - rep_node.width) / 2.0;
        node.y = y;
        y -= node.height + spacing;

        let new = cg.g.add_node(node);
        new_of.insert(old, new);
        ctx.remap_node(old, new);
        placed.push(new);
    }
    let remap = |s: Socket| s.with_owner(new_of.get(&s.owner).copied().unwrap_or(s.owner));

    for (socket, original) in stack.sockets {
        let original = remap(original);
        if socket.is_output {
            let edges: Vec<EdgeIx> = cg
                .g
                .out_edges(stack.rep)
                .iter()
                .copied()
                .filter(|&e| cg.edge(e).is_some_and(|edge| edge.from == socket))
                .collect();
            for e in edges {
                let (Some(edge), Some(v)) = (cg.edge(e), cg.g.target(e)) else {
                    continue;
                };
                cg.g.remove_edge(e);
                cg.g.add_edge(original.owner, v, Edge::new(original, edge.to));
            }
        } else {
            let found = cg
                .g
                .in_edges(stack.rep)
                .iter()
                .copied()
                .find(|&e| cg.edge(e).is_some_and(|edge| edge.to == socket));
            let Some(e) = found else {
                continue;
            };
            let (Some(edge), Some(u)) = (cg.edge(e), cg.g.source(e)) else {
                continue;
            };
            cg.g.remove_edge(e);
            cg.g.add_edge(u, original.owner, Edge::new(edge.from, original));
        }
    }

    for (u, v, edge) in stack.internal {
        let (Some(&u), Some(&v)) = (new_of.get(&u), new_of.get(&v)) else {
            continue;
        };
        cg.g.add_edge(u, v, Edge::new(remap(edge.from), remap(edge.to)));
    }

    if let Some(col) = rep_node.col.and_then(|c| cg.columns.get_mut(c)) {
        let i = col.iter().position(|&w| w == stack.rep).unwrap_or(col.len());
        col.splice(i..i, placed);
    }
    cg.remove_nodes(ctx, &[stack.rep]);
}
