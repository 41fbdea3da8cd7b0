//! The layout graph: an arena multigraph of [`Node`]s plus the frame nesting tree.
//!
//! The nesting tree is stored implicitly through `Node::cluster` and `Cluster::parent`. Views
//! that need the explicit tree (members, descendants, live clusters) build a [`NestingTree`]
//! snapshot on demand.

use crate::context::LayoutContext;
use crate::model::{Cluster, ClusterId, Edge, Node, Socket};
use rustc_hash::FxHashSet as HashSet;
use strata_graph::{EdgeIx, Graph, NodeIx, alg};

pub type LayoutGraph = Graph<Node, Edge>;

#[derive(Debug, Clone)]
pub struct ClusterGraph {
    pub g: LayoutGraph,
    pub clusters: Vec<Cluster>,
    /// Node order of every column, top to bottom. Empty until columns are built.
    pub columns: Vec<Vec<NodeIx>>,
}

/// Explicit nesting tree derived from the current node set.
#[derive(Debug, Clone)]
pub struct NestingTree {
    /// Direct member nodes of each cluster.
    pub nodes: Vec<Vec<NodeIx>>,
    /// Direct child clusters of each cluster, restricted to live clusters.
    pub clusters: Vec<Vec<ClusterId>>,
    /// All nodes nested (at any depth) in each cluster.
    pub descendants: Vec<Vec<NodeIx>>,
}

impl NestingTree {
    /// Clusters with at least one descendant node, in id order. Always includes the root when
    /// the graph is non-empty.
    pub fn live_clusters(&self) -> impl Iterator<Item = ClusterId> + '_ {
        self.descendants
            .iter()
            .enumerate()
            .filter(|(_, d)| !d.is_empty())
            .map(|(i, _)| ClusterId(i as u32))
    }

    pub fn is_live(&self, c: ClusterId) -> bool {
        self.descendants
            .get(c.index())
            .is_some_and(|d| !d.is_empty())
    }

    /// Live clusters nested (at any depth) in `c`, excluding `c`.
    pub fn descendant_clusters(&self, c: ClusterId) -> Vec<ClusterId> {
        let mut out = Vec::new();
        let mut stack = vec![c];
        while let Some(c) = stack.pop() {
            for &child in &self.clusters[c.index()] {
                out.push(child);
                stack.push(child);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PathOptions {
    /// Never join reroutes across the boundary of a frame that holds only reroutes.
    pub preserve_reroute_clusters: bool,
    /// Only join reroutes at the same height.
    pub aligned: bool,
    /// Cut paths at nodes with several outgoing links in the full graph rather than only among
    /// reroutes.
    pub linear: bool,
}

impl PathOptions {
    pub const LINEAR: Self = Self {
        preserve_reroute_clusters: true,
        aligned: false,
        linear: true,
    };
}

impl ClusterGraph {
    pub fn new(clusters: Vec<Cluster>) -> Self {
        Self {
            g: Graph::new(),
            clusters,
            columns: Vec::new(),
        }
    }

    pub fn cluster(&self, c: ClusterId) -> &Cluster {
        &self.clusters[c.index()]
    }

    pub fn parent(&self, c: ClusterId) -> Option<ClusterId> {
        self.clusters.get(c.index()).and_then(|c| c.parent)
    }

    /// `c` followed by its ancestors up to the root.
    pub fn cluster_chain(&self, c: ClusterId) -> impl Iterator<Item = ClusterId> + '_ {
        std::iter::successors(Some(c), move |&c| self.parent(c))
    }

    pub fn lowest_common_cluster(&self, a: ClusterId, b: ClusterId) -> ClusterId {
        let chain_a: Vec<ClusterId> = self.cluster_chain(a).collect();
        self.cluster_chain(b)
            .find(|c| chain_a.contains(c))
            .unwrap_or(ClusterId::ROOT)
    }

    pub fn node(&self, v: NodeIx) -> Option<&Node> {
        self.g.node(v)
    }

    pub fn node_mut(&mut self, v: NodeIx) -> Option<&mut Node> {
        self.g.node_mut(v)
    }

    pub fn edge(&self, e: EdgeIx) -> Option<Edge> {
        self.g.edge(e).copied()
    }

    pub fn cluster_of(&self, v: NodeIx) -> ClusterId {
        self.node(v).map(|n| n.cluster).unwrap_or(ClusterId::ROOT)
    }

    pub fn rank(&self, v: NodeIx) -> usize {
        self.node(v).map(|n| n.rank).unwrap_or(0)
    }

    pub fn is_reroute(&self, v: NodeIx) -> bool {
        self.node(v).is_some_and(Node::is_reroute)
    }

    pub fn nesting_tree(&self) -> NestingTree {
        let n = self.clusters.len();
        let mut tree = NestingTree {
            nodes: vec![Vec::new(); n],
            clusters: vec![Vec::new(); n],
            descendants: vec![Vec::new(); n],
        };
        for (v, node) in self.g.node_labels() {
            tree.nodes[node.cluster.index()].push(v);
            for c in self.cluster_chain(node.cluster) {
                tree.descendants[c.index()].push(v);
            }
        }
        for c in 1..n {
            let c = ClusterId(c as u32);
            if !tree.is_live(c) {
                continue;
            }
            if let Some(p) = self.parent(c) {
                tree.clusters[p.index()].push(c);
            }
        }
        tree
    }

    pub fn socket_x(&self, s: Socket) -> f64 {
        let Some(v) = self.node(s.owner) else {
            return 0.0;
        };
        if s.is_output { v.x + v.width } else { v.x }
    }

    pub fn socket_offset(&self, s: Socket) -> f64 {
        self.node(s.owner)
            .map(|v| v.socket_offset(s.is_output, s.idx))
            .unwrap_or(0.0)
    }

    pub fn socket_y(&self, s: Socket) -> f64 {
        self.node(s.owner).map(|v| v.y).unwrap_or(0.0) + self.socket_offset(s)
    }

    /// Position of `v` within its column.
    pub fn col_pos(&self, v: NodeIx) -> Option<usize> {
        let col = self.node(v)?.col?;
        self.columns.get(col)?.iter().position(|&w| w == v)
    }

    pub fn add_dummy_edge(&mut self, u: NodeIx, v: NodeIx) -> Option<EdgeIx> {
        self.g
            .add_edge(u, v, Edge::new(Socket::output(u, 0), Socket::input(v, 0)))
    }

    /// Replaces edge `e` by a path through `dummies`, reusing connections that already exist.
    pub fn add_dummy_nodes_to_edge(&mut self, e: EdgeIx, dummies: &[NodeIx]) {
        let (Some(&w), Some(&z)) = (dummies.first(), dummies.last()) else {
            return;
        };
        let (Some(edge), Some((u, v))) = (self.edge(e), self.g.endpoints(e)) else {
            return;
        };

        for pair in dummies.windows(2) {
            if !self.g.has_edge(pair[0], pair[1]) {
                self.add_dummy_edge(pair[0], pair[1]);
            }
        }
        if !self.g.has_edge(u, w) {
            self.g.add_edge(u, w, Edge::new(edge.from, Socket::input(w, 0)));
        }
        self.g.add_edge(z, v, Edge::new(Socket::output(z, 0), edge.to));
        self.g.remove_edge(e);
    }

    /// Removes nodes from the graph and their columns. Removed host elements are recorded in
    /// the context.
    pub fn remove_nodes(&mut self, ctx: &mut LayoutContext<'_>, nodes: &[NodeIx]) {
        for &v in nodes {
            let Some(node) = self.g.remove_node(v) else {
                continue;
            };
            if let Some(col) = node.col.and_then(|c| self.columns.get_mut(c)) {
                col.retain(|&w| w != v);
            }
            if let Some(element) = node.element() {
                if !ctx.is_new_element(element) {
                    ctx.removed.push(element);
                }
            }
        }
    }

    /// Maximal chains of reroute-like nodes accepted by `filter`, each ordered along the links,
    /// and ordered by their position in a topological order of the graph.
    pub fn reroute_paths<F>(&self, filter: F, opts: PathOptions) -> Vec<Vec<NodeIx>>
    where
        F: Fn(NodeIx, &Node) -> bool,
    {
        let reroutes: HashSet<NodeIx> = self
            .g
            .node_labels()
            .filter(|&(v, n)| n.is_reroute() && filter(v, n))
            .map(|(v, _)| v)
            .collect();

        let mut pairs: Vec<(NodeIx, NodeIx)> = Vec::new();
        let mut seen: HashSet<(NodeIx, NodeIx)> = HashSet::default();
        for e in self.g.edges() {
            let Some((u, v)) = self.g.endpoints(e) else {
                continue;
            };
            if reroutes.contains(&u) && reroutes.contains(&v) && seen.insert((u, v)) {
                pairs.push((u, v));
            }
        }

        let branching: HashSet<NodeIx> = reroutes
            .iter()
            .copied()
            .filter(|&v| {
                let degree = if opts.linear {
                    self.g.out_degree(v)
                } else {
                    pairs.iter().filter(|&&(u, _)| u == v).count()
                };
                degree > 1
            })
            .collect();
        pairs.retain(|(u, _)| !branching.contains(u));

        if opts.preserve_reroute_clusters {
            let tree = self.nesting_tree();
            let reroute_clusters: HashSet<ClusterId> = tree
                .live_clusters()
                .filter(|c| tree.nodes[c.index()].iter().all(|&v| self.is_reroute(v)))
                .collect();
            pairs.retain(|&(u, v)| {
                let (cu, cv) = (self.cluster_of(u), self.cluster_of(v));
                cu == cv || !(reroute_clusters.contains(&cu) || reroute_clusters.contains(&cv))
            });
        }

        if opts.aligned {
            pairs.retain(|&(u, v)| {
                let (Some(a), Some(b)) = (self.node(u), self.node(v)) else {
                    return false;
                };
                a.y == b.y
            });
        }

        let order = alg::toposort(&self.g).unwrap_or_else(|_| self.g.node_ids());
        let mut topo_index = vec![usize::MAX; self.g.node_bound()];
        for (i, v) in order.iter().enumerate() {
            topo_index[v.index()] = i;
        }

        let mut sets = DisjointSets::new(self.g.node_bound());
        for &(u, v) in &pairs {
            sets.union(u.index(), v.index());
        }
        let mut members: Vec<NodeIx> = reroutes.into_iter().collect();
        members.sort_by_key(|v| topo_index[v.index()]);

        let mut by_root: indexmap::IndexMap<usize, Vec<NodeIx>> = indexmap::IndexMap::new();
        for v in members {
            by_root.entry(sets.find(v.index())).or_default().push(v);
        }
        let mut paths: Vec<Vec<NodeIx>> = by_root.into_values().collect();
        paths.sort_by_key(|p| p.iter().map(|v| topo_index[v.index()]).sum::<usize>());
        paths
    }
}

/// Union-find over dense indices.
#[derive(Debug, Clone)]
pub struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    pub fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb.max(ra)] = rb.min(ra);
        }
    }
}
