//! Helper algorithms over [`Graph`].
//!
//! All traversals visit nodes in handle order and edges in insertion order, so their output is
//! deterministic for a given construction sequence.

use super::{EdgeIx, Graph, NodeIx};
use rustc_hash::FxBuildHasher;
use std::collections::VecDeque;

type HashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;

/// The graph contains at least one directed cycle through `node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    pub node: NodeIx,
}

/// Kahn's algorithm. Sources are seeded in handle order; ties are resolved FIFO.
pub fn toposort<N, E>(g: &Graph<N, E>) -> Result<Vec<NodeIx>, Cycle> {
    let mut indegree: Vec<usize> = vec![0; g.node_bound()];
    for v in g.nodes() {
        indegree[v.index()] = g.in_degree(v);
    }

    let mut queue: VecDeque<NodeIx> = g.nodes().filter(|v| indegree[v.index()] == 0).collect();
    let mut out: Vec<NodeIx> = Vec::with_capacity(g.node_count());
    while let Some(v) = queue.pop_front() {
        out.push(v);
        for w in g.successors(v) {
            let d = &mut indegree[w.index()];
            *d = d.saturating_sub(1);
            if *d == 0 {
                queue.push_back(w);
            }
        }
    }

    if out.len() != g.node_count() {
        let node = g
            .nodes()
            .find(|v| indegree[v.index()] > 0)
            .unwrap_or(NodeIx(0));
        return Err(Cycle { node });
    }
    Ok(out)
}

pub fn is_acyclic<N, E>(g: &Graph<N, E>) -> bool {
    toposort(g).is_ok()
}

/// Returns the edges of one directed cycle, if any.
pub fn find_cycle<N, E>(g: &Graph<N, E>) -> Option<Vec<EdgeIx>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    let mut mark: Vec<Mark> = vec![Mark::New; g.node_bound()];
    // Edge used to enter each node on the current DFS path.
    let mut via: Vec<Option<EdgeIx>> = vec![None; g.node_bound()];

    for root in g.nodes() {
        if mark[root.index()] != Mark::New {
            continue;
        }
        let mut stack: Vec<(NodeIx, usize)> = vec![(root, 0)];
        mark[root.index()] = Mark::Active;

        while let Some(top) = stack.last_mut() {
            let (v, next) = *top;
            let out = g.out_edges(v);
            if next >= out.len() {
                mark[v.index()] = Mark::Done;
                stack.pop();
                continue;
            }
            top.1 += 1;
            let e = out[next];
            let Some(w) = g.target(e) else {
                continue;
            };
            match mark[w.index()] {
                Mark::New => {
                    mark[w.index()] = Mark::Active;
                    via[w.index()] = Some(e);
                    stack.push((w, 0));
                }
                Mark::Active => {
                    let mut cycle = vec![e];
                    let mut cur = v;
                    while cur != w {
                        let Some(back) = via[cur.index()] else {
                            break;
                        };
                        cycle.push(back);
                        let Some(prev) = g.source(back) else {
                            break;
                        };
                        cur = prev;
                    }
                    cycle.reverse();
                    return Some(cycle);
                }
                Mark::Done => {}
            }
        }
    }
    None
}

/// Whether `to` is reachable from `from` (a node always reaches itself).
pub fn has_path<N, E>(g: &Graph<N, E>, from: NodeIx, to: NodeIx) -> bool {
    if from == to {
        return g.contains_node(from);
    }
    let mut seen: HashSet<NodeIx> = HashSet::default();
    let mut stack = vec![from];
    while let Some(v) = stack.pop() {
        for w in g.successors(v) {
            if w == to {
                return true;
            }
            if seen.insert(w) {
                stack.push(w);
            }
        }
    }
    false
}

/// Weakly connected components. Each component is sorted by handle, and components are ordered
/// by their smallest handle.
pub fn weakly_connected_components<N, E>(g: &Graph<N, E>) -> Vec<Vec<NodeIx>> {
    let mut seen: Vec<bool> = vec![false; g.node_bound()];
    let mut out: Vec<Vec<NodeIx>> = Vec::new();
    for root in g.nodes() {
        if seen[root.index()] {
            continue;
        }
        seen[root.index()] = true;
        let mut component = vec![root];
        let mut stack = vec![root];
        while let Some(v) = stack.pop() {
            for w in g.successors(v).chain(g.predecessors(v)) {
                if !seen[w.index()] {
                    seen[w.index()] = true;
                    component.push(w);
                    stack.push(w);
                }
            }
        }
        component.sort();
        out.push(component);
    }
    out
}

/// Nodes reachable from `v` (excluding `v`), in BFS order.
pub fn descendants<N, E>(g: &Graph<N, E>, v: NodeIx) -> Vec<NodeIx> {
    let mut seen: HashSet<NodeIx> = HashSet::default();
    seen.insert(v);
    let mut queue: VecDeque<NodeIx> = VecDeque::from([v]);
    let mut out: Vec<NodeIx> = Vec::new();
    while let Some(u) = queue.pop_front() {
        for w in g.successors(u) {
            if seen.insert(w) {
                out.push(w);
                queue.push_back(w);
            }
        }
    }
    out
}
