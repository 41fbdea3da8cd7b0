//! Arena-backed directed multigraph.
//!
//! Every node keeps its own ordered lists of outgoing and incoming edges, so adjacency queries
//! are O(degree) and iteration order is always insertion order. That ordering is relied upon by
//! the layout pipeline for deterministic output.

mod entries;
mod index;

pub mod alg;

use entries::{EdgeEntry, NodeEntry};
pub use index::{EdgeIx, NodeIx};

#[derive(Debug, Clone)]
pub struct Graph<N, E> {
    nodes: Vec<Option<NodeEntry<N>>>,
    edges: Vec<Option<EdgeEntry<E>>>,
    node_count: usize,
    edge_count: usize,
}

impl<N, E> Default for Graph<N, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, E> Graph<N, E> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            node_count: 0,
            edge_count: 0,
        }
    }

    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(nodes),
            edges: Vec::with_capacity(edges),
            node_count: 0,
            edge_count: 0,
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Upper bound (exclusive) of every node handle ever issued by this graph.
    ///
    /// Useful for sizing dense side tables indexed by [`NodeIx::index`].
    pub fn node_bound(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_node(&mut self, label: N) -> NodeIx {
        let ix = NodeIx(self.nodes.len() as u32);
        self.nodes.push(Some(NodeEntry {
            label,
            out: Vec::new(),
            in_: Vec::new(),
        }));
        self.node_count += 1;
        ix
    }

    pub fn contains_node(&self, v: NodeIx) -> bool {
        self.entry(v).is_some()
    }

    pub fn node(&self, v: NodeIx) -> Option<&N> {
        self.entry(v).map(|e| &e.label)
    }

    pub fn node_mut(&mut self, v: NodeIx) -> Option<&mut N> {
        self.nodes
            .get_mut(v.index())
            .and_then(Option::as_mut)
            .map(|e| &mut e.label)
    }

    /// Removes `v` together with all of its incident edges and returns its label.
    pub fn remove_node(&mut self, v: NodeIx) -> Option<N> {
        let entry = self.entry(v)?;
        let mut incident: Vec<EdgeIx> = entry.out.clone();
        incident.extend(entry.in_.iter().copied());
        for e in incident {
            let _ = self.remove_edge(e);
        }

        let entry = self.nodes.get_mut(v.index())?.take()?;
        self.node_count -= 1;
        Some(entry.label)
    }

    /// Live node handles in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeIx> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_some())
            .map(|(i, _)| NodeIx(i as u32))
    }

    pub fn node_ids(&self) -> Vec<NodeIx> {
        self.nodes().collect()
    }

    pub fn node_labels(&self) -> impl Iterator<Item = (NodeIx, &N)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (NodeIx(i as u32), &e.label)))
    }

    /// Adds a `v -> w` edge. Returns `None` (and adds nothing) when an endpoint is missing.
    pub fn add_edge(&mut self, v: NodeIx, w: NodeIx, label: E) -> Option<EdgeIx> {
        if !self.contains_node(v) || !self.contains_node(w) {
            return None;
        }
        let ix = EdgeIx(self.edges.len() as u32);
        self.edges.push(Some(EdgeEntry {
            source: v,
            target: w,
            label,
        }));
        if let Some(Some(entry)) = self.nodes.get_mut(v.index()) {
            entry.out.push(ix);
        }
        if let Some(Some(entry)) = self.nodes.get_mut(w.index()) {
            entry.in_.push(ix);
        }
        self.edge_count += 1;
        Some(ix)
    }

    pub fn remove_edge(&mut self, e: EdgeIx) -> Option<E> {
        let entry = self.edges.get_mut(e.index())?.take()?;
        if let Some(Some(v)) = self.nodes.get_mut(entry.source.index()) {
            v.out.retain(|&x| x != e);
        }
        if let Some(Some(w)) = self.nodes.get_mut(entry.target.index()) {
            w.in_.retain(|&x| x != e);
        }
        self.edge_count -= 1;
        Some(entry.label)
    }

    pub fn contains_edge(&self, e: EdgeIx) -> bool {
        self.edges.get(e.index()).is_some_and(Option::is_some)
    }

    pub fn edge(&self, e: EdgeIx) -> Option<&E> {
        self.edge_entry(e).map(|e| &e.label)
    }

    pub fn endpoints(&self, e: EdgeIx) -> Option<(NodeIx, NodeIx)> {
        self.edge_entry(e).map(|e| (e.source, e.target))
    }

    pub fn source(&self, e: EdgeIx) -> Option<NodeIx> {
        self.edge_entry(e).map(|e| e.source)
    }

    pub fn target(&self, e: EdgeIx) -> Option<NodeIx> {
        self.edge_entry(e).map(|e| e.target)
    }

    /// Live edge handles in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeIx> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_some())
            .map(|(i, _)| EdgeIx(i as u32))
    }

    pub fn out_edges(&self, v: NodeIx) -> &[EdgeIx] {
        self.entry(v).map(|e| e.out.as_slice()).unwrap_or(&[])
    }

    pub fn in_edges(&self, v: NodeIx) -> &[EdgeIx] {
        self.entry(v).map(|e| e.in_.as_slice()).unwrap_or(&[])
    }

    /// Successors of `v`, once per parallel edge.
    pub fn successors(&self, v: NodeIx) -> impl Iterator<Item = NodeIx> + '_ {
        self.out_edges(v)
            .iter()
            .filter_map(|&e| self.edge_entry(e).map(|e| e.target))
    }

    /// Predecessors of `v`, once per parallel edge.
    pub fn predecessors(&self, v: NodeIx) -> impl Iterator<Item = NodeIx> + '_ {
        self.in_edges(v)
            .iter()
            .filter_map(|&e| self.edge_entry(e).map(|e| e.source))
    }

    pub fn first_successor(&self, v: NodeIx) -> Option<NodeIx> {
        self.successors(v).next()
    }

    pub fn first_predecessor(&self, v: NodeIx) -> Option<NodeIx> {
        self.predecessors(v).next()
    }

    pub fn out_degree(&self, v: NodeIx) -> usize {
        self.out_edges(v).len()
    }

    pub fn in_degree(&self, v: NodeIx) -> usize {
        self.in_edges(v).len()
    }

    pub fn degree(&self, v: NodeIx) -> usize {
        self.out_degree(v) + self.in_degree(v)
    }

    pub fn is_isolated(&self, v: NodeIx) -> bool {
        self.degree(v) == 0
    }

    /// All `v -> w` edges in insertion order.
    pub fn edges_connecting(&self, v: NodeIx, w: NodeIx) -> Vec<EdgeIx> {
        self.out_edges(v)
            .iter()
            .copied()
            .filter(|&e| self.target(e) == Some(w))
            .collect()
    }

    pub fn has_edge(&self, v: NodeIx, w: NodeIx) -> bool {
        self.out_edges(v)
            .iter()
            .any(|&e| self.target(e) == Some(w))
    }

    pub fn find_edge(&self, v: NodeIx, w: NodeIx) -> Option<EdgeIx> {
        self.out_edges(v)
            .iter()
            .copied()
            .find(|&e| self.target(e) == Some(w))
    }

    pub fn for_each_node_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(NodeIx, &mut N),
    {
        for (i, entry) in self.nodes.iter_mut().enumerate() {
            if let Some(entry) = entry {
                f(NodeIx(i as u32), &mut entry.label);
            }
        }
    }

    fn entry(&self, v: NodeIx) -> Option<&NodeEntry<N>> {
        self.nodes.get(v.index()).and_then(Option::as_ref)
    }

    fn edge_entry(&self, e: EdgeIx) -> Option<&EdgeEntry<E>> {
        self.edges.get(e.index()).and_then(Option::as_ref)
    }
}
