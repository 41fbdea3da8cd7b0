//! Vertical placement (Brandes & Köpf).
//!
//! Four candidate layouts are computed, one per combination of alignment side (left or right
//! neighbours) and packing direction (down or up). Each pass aligns nodes into blocks through
//! median neighbours, shifts blocks so that linked sockets line up, and compacts the blocks
//! into classes. Frames whose members drift apart are repaired by marking the offending nodes,
//! which stops them from aligning across the frame boundary, and re-running the pass.
//!
//! Per-pass block state lives in side tables indexed by node handle.

use crate::cluster_graph::{ClusterGraph, NestingTree};
use crate::config::{LayoutConfig, SocketAlignment};
use crate::geom::fmean;
use crate::model::ClusterId;
use rustc_hash::FxHashSet as HashSet;
use strata_graph::NodeIx;

const ITER_LIMIT: usize = 20;

/// Edges that must not be used for alignment, as unordered node pairs.
type MarkedEdges = HashSet<(NodeIx, NodeIx)>;

fn edge_key(v: NodeIx, w: NodeIx) -> (NodeIx, NodeIx) {
    if v <= w { (v, w) } else { (w, v) }
}

fn unique(it: impl Iterator<Item = NodeIx>) -> Vec<NodeIx> {
    let mut out: Vec<NodeIx> = Vec::new();
    for v in it {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

/// Marks edges that cross an inner segment of the columns. Columns are bottom-first.
fn marked_conflicts<F>(
    cg: &ClusterGraph,
    columns: &[Vec<NodeIx>],
    pos: &[usize],
    should_ensure_alignment: F,
) -> MarkedEdges
where
    F: Fn(NodeIx) -> bool,
{
    let mut marked = MarkedEdges::default();
    for i in 1..columns.len() {
        let col = &columns[i];
        let mut k0 = 0;
        let mut l = 0;
        for (l1, &u) in col.iter().enumerate() {
            let k1 = if should_ensure_alignment(u) {
                let Some(upper) = cg.g.first_predecessor(u) else {
                    continue;
                };
                pos[upper.index()]
            } else if l1 + 1 == col.len() {
                columns[i - 1].len().saturating_sub(1)
            } else {
                continue;
            };

            while l <= l1 {
                let v = col[l];
                l += 1;
                if should_ensure_alignment(v) {
                    continue;
                }
                for pred in cg.g.predecessors(v) {
                    let k = pos[pred.index()];
                    if k < k0 || k > k1 {
                        marked.insert(edge_key(pred, v));
                    }
                }
            }
            k0 = k1;
        }
    }
    marked
}

fn positions(n: usize, columns: &[Vec<NodeIx>]) -> Vec<usize> {
    let mut pos = vec![0; n];
    for col in columns {
        for (i, &v) in col.iter().enumerate() {
            pos[v.index()] = i;
        }
    }
    pos
}

/// One placement pass.
struct Pass<'a> {
    cg: &'a ClusterGraph,
    config: &'a LayoutConfig,
    /// Align with left neighbours (edges followed forwards) rather than right ones.
    forwards: bool,
    is_up: bool,
    /// Columns in pass order: first column is the one without aligned neighbours.
    columns: Vec<Vec<NodeIx>>,
    /// Index into `columns` of each node.
    col_of: Vec<usize>,
    pos: Vec<usize>,
    root: Vec<NodeIx>,
    aligned: Vec<NodeIx>,
    sink: Vec<NodeIx>,
    shift: Vec<f64>,
    inner_shift: Vec<f64>,
    y: Vec<Option<f64>>,
}

impl<'a> Pass<'a> {
    fn new(
        cg: &'a ClusterGraph,
        config: &'a LayoutConfig,
        forwards: bool,
        is_up: bool,
        top_first: &[Vec<NodeIx>],
    ) -> Self {
        let mut columns: Vec<Vec<NodeIx>> = top_first.to_vec();
        if !forwards {
            columns.reverse();
        }
        if !is_up {
            for col in &mut columns {
                col.reverse();
            }
        }

        let n = cg.g.node_bound();
        let mut col_of = vec![0; n];
        for (i, col) in columns.iter().enumerate() {
            for &v in col {
                col_of[v.index()] = i;
            }
        }
        let pos = positions(n, &columns);

        let mut pass = Self {
            cg,
            config,
            forwards,
            is_up,
            columns,
            col_of,
            pos,
            root: Vec::new(),
            aligned: Vec::new(),
            sink: Vec::new(),
            shift: Vec::new(),
            inner_shift: Vec::new(),
            y: Vec::new(),
        };
        pass.reset();
        pass
    }

    fn reset(&mut self) {
        let n = self.cg.g.node_bound();
        self.shift = vec![f64::INFINITY; n];
        self.inner_shift = vec![0.0; n];
        self.y = vec![None; n];
        let Some(first) = self.cg.g.nodes().next() else {
            return;
        };
        let mut identity = vec![first; n];
        for v in self.cg.g.nodes() {
            identity[v.index()] = v;
        }
        self.root = identity.clone();
        self.aligned = identity.clone();
        self.sink = identity;
    }

    /// Neighbours on the side blocks are aligned with.
    fn preds(&self, v: NodeIx) -> Vec<NodeIx> {
        if self.forwards {
            unique(self.cg.g.predecessors(v))
        } else {
            unique(self.cg.g.successors(v))
        }
    }

    fn block(&self, start: NodeIx) -> Vec<NodeIx> {
        let mut out = vec![start];
        let mut w = self.aligned[start.index()];
        while w != start {
            out.push(w);
            w = self.aligned[w.index()];
        }
        out
    }

    fn height(&self, v: NodeIx) -> f64 {
        self.cg.node(v).map(|n| n.height).unwrap_or(0.0)
    }

    fn horizontal_alignment(&mut self, marked_edges: &MarkedEdges, marked_nodes: &HashSet<NodeIx>) {
        for c in 0..self.columns.len() {
            let mut prev_i: Option<usize> = None;
            for k in 0..self.columns[c].len() {
                let v = self.columns[c][k];
                let mut preds = self.preds(v);
                if preds.is_empty() {
                    continue;
                }
                preds.sort_by_key(|u| self.pos[u.index()]);
                let m = (preds.len() - 1) / 2;
                let medians = if preds.len() % 2 == 0 { m..=m + 1 } else { m..=m };

                for &u in &preds[medians] {
                    let i = self.pos[u.index()];
                    if self.aligned[v.index()] != v
                        || marked_edges.contains(&edge_key(u, v))
                        || prev_i.is_some_and(|p| p >= i)
                    {
                        continue;
                    }
                    if self.cg.cluster_of(u) != self.cg.cluster_of(v)
                        && (marked_nodes.contains(&u) || marked_nodes.contains(&v))
                    {
                        continue;
                    }

                    self.aligned[u.index()] = v;
                    self.root[v.index()] = self.root[u.index()];
                    self.aligned[v.index()] = self.root[v.index()];
                    prev_i = Some(i);
                }
            }
        }
    }

    fn should_use_inner_shift(&self, v: NodeIx, w: NodeIx) -> bool {
        let (Some(nv), Some(nw)) = (self.cg.node(v), self.cg.node(w)) else {
            return false;
        };
        if nv.is_reroute() || nw.is_reroute() {
            return true;
        }
        match self.config.socket_alignment {
            SocketAlignment::None => return false,
            SocketAlignment::Full => return true,
            SocketAlignment::Moderate => {}
        }
        if nv.cluster != nw.cluster || nv.is_stack() || nw.is_stack() {
            return true;
        }

        let (nv, nw) = if self.forwards { (nv, nw) } else { (nw, nv) };
        if nv.height > nw.height && !nw.collapsed {
            return false;
        }
        (nv.height - nw.height).abs() > fmean([nv.height, nw.height]) / 2.0
    }

    fn compute_inner_shifts(&mut self) {
        let roots: Vec<NodeIx> = unique(self.cg.g.nodes().map(|v| self.root[v.index()]));
        for root in roots {
            let block = self.block(root);
            for pair in block.windows(2) {
                let (v, w) = (pair[0], pair[1]);
                let v_shift = self.inner_shift[v.index()];
                if !self.should_use_inner_shift(v, w) {
                    self.inner_shift[w.index()] = v_shift;
                    continue;
                }

                let edges = if self.forwards {
                    self.cg.g.edges_connecting(v, w)
                } else {
                    self.cg.g.edges_connecting(w, v)
                };
                let shifts = edges.into_iter().filter_map(|e| self.cg.edge(e)).map(|edge| {
                    let p = self.cg.socket_offset(edge.socket_of(v));
                    let q = self.cg.socket_offset(edge.socket_of(w));
                    if self.is_up {
                        v_shift - p + q
                    } else {
                        v_shift + p - q
                    }
                });
                self.inner_shift[w.index()] = fmean(shifts);
            }
        }
    }

    /// Places the block rooted at `start` and, first, every block it is packed against.
    fn place_block(&mut self, start: NodeIx) {
        struct Frame {
            v: NodeIx,
            members: Vec<NodeIx>,
            next: usize,
            initial: bool,
        }

        if self.y[start.index()].is_some() {
            return;
        }
        self.y[start.index()] = Some(0.0);
        let mut stack = vec![Frame {
            v: start,
            members: self.block(start),
            next: 0,
            initial: true,
        }];

        while let Some(top) = stack.last_mut() {
            let v = top.v;
            let Some(&w) = top.members.get(top.next) else {
                let (y, sink) = (self.y[v.index()], self.sink[v.index()]);
                for &w in &top.members {
                    self.y[w.index()] = y;
                    self.sink[w.index()] = sink;
                }
                stack.pop();
                continue;
            };

            let i = self.pos[w.index()];
            if i == 0 {
                top.next += 1;
                continue;
            }
            let n = self.columns[self.col_of[w.index()]][i - 1];
            let u = self.root[n.index()];
            if self.y[u.index()].is_none() {
                self.y[u.index()] = Some(0.0);
                let members = self.block(u);
                stack.push(Frame {
                    v: u,
                    members,
                    next: 0,
                    initial: true,
                });
                continue;
            }

            top.next += 1;
            if self.sink[v.index()] == v {
                self.sink[v.index()] = self.sink[u.index()];
            }
            if self.sink[v.index()] == self.sink[u.index()] {
                let delta = if self.is_up { self.height(n) } else { self.height(w) }
                    + self.config.margin.y;
                let s_b = self.y[u.index()].unwrap_or(0.0) + self.inner_shift[n.index()]
                    - self.inner_shift[w.index()]
                    + delta;
                let y = if top.initial {
                    s_b
                } else {
                    self.y[v.index()].unwrap_or(0.0).max(s_b)
                };
                self.y[v.index()] = Some(y);
                top.initial = false;
            }
        }
    }

    fn vertical_compaction(&mut self) {
        let nodes: Vec<NodeIx> = self.cg.g.nodes().collect();
        for &v in &nodes {
            if self.root[v.index()] == v {
                self.place_block(v);
            }
        }

        let mut neighborings: Vec<Vec<(NodeIx, NodeIx)>> = vec![Vec::new(); self.columns.len()];
        for col in &self.columns {
            for pair in col.windows(2).rev() {
                let (u, v) = (pair[0], pair[1]);
                let (su, sv) = (self.sink[u.index()], self.sink[v.index()]);
                if su == sv {
                    continue;
                }
                let list = &mut neighborings[self.col_of[sv.index()]];
                if !list.contains(&(u, v)) {
                    list.push((u, v));
                }
            }
        }

        let y_of = |pass: &Self, v: NodeIx| pass.y[v.index()].unwrap_or(0.0);
        for (c, pairs) in neighborings.iter().enumerate() {
            let Some(&first) = self.columns[c].first() else {
                continue;
            };
            let s0 = self.sink[first.index()];
            if self.shift[s0.index()] == f64::INFINITY {
                self.shift[s0.index()] = 0.0;
            }

            for &(u, v) in pairs {
                let delta = if self.is_up { self.height(u) } else { self.height(v) }
                    + self.config.margin.y;
                let s_c = y_of(self, v) + self.inner_shift[v.index()]
                    - y_of(self, u)
                    - self.inner_shift[u.index()]
                    - delta;
                let (su, sv) = (self.sink[u.index()], self.sink[v.index()]);
                self.shift[su.index()] = self.shift[su.index()].min(self.shift[sv.index()] + s_c);
            }
        }

        for v in nodes {
            let mut shift = self.shift[self.sink[v.index()].index()];
            if !shift.is_finite() {
                shift = 0.0;
            }
            let y = y_of(self, v) + shift + self.inner_shift[v.index()];
            self.y[v.index()] = Some(y);
        }
    }

    /// Vertical extent of a cluster member in pass coordinates.
    fn extent(&self, v: NodeIx) -> (f64, f64) {
        let y = self.y[v.index()].unwrap_or(0.0);
        let h = self.height(v);
        if self.is_up { (y, y + h) } else { (y - h, y) }
    }

    fn has_large_gaps_in_frame(&self, tree: &NestingTree, c: ClusterId) -> bool {
        let mut lines: Vec<(f64, f64)> = Vec::new();
        for &v in &tree.nodes[c.index()] {
            if self.cg.node(v).is_some_and(|n| n.is_vertical_border()) {
                continue;
            }
            lines.push(self.extent(v));
        }
        for &child in &tree.clusters[c.index()] {
            let mut roots: Vec<NodeIx> = unique(
                tree.nodes[child.index()]
                    .iter()
                    .filter(|&&w| self.cg.node(w).is_some_and(|n| n.is_vertical_border()))
                    .map(|w| self.root[w.index()]),
            );
            let y = |v: &NodeIx| self.y[v.index()].unwrap_or(0.0);
            roots.sort_by(|a, b| y(a).total_cmp(&y(b)));
            let (Some(&w), Some(&z)) = (roots.first(), roots.last()) else {
                continue;
            };
            lines.push(if self.is_up {
                (y(&w), y(&z) + self.height(z))
            } else {
                (y(&w) - self.height(w), y(&z))
            });
        }

        lines.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut merged: Vec<(f64, f64)> = Vec::new();
        for line in lines {
            match merged.last_mut() {
                Some(last) if last.1 >= line.0 => last.1 = last.1.max(line.1),
                _ => merged.push(line),
            }
        }
        merged
            .windows(2)
            .any(|pair| pair[1].0 - pair[0].1 > self.config.margin.y)
    }

    /// Nodes of frames with large gaps that should stop aligning across the frame boundary.
    fn marked_nodes(&self, tree: &NestingTree, old: &HashSet<NodeIx>) -> HashSet<NodeIx> {
        let mut marked = HashSet::default();
        for top in tree.live_clusters() {
            if self.cg.cluster(top).nesting_level != 1 {
                continue;
            }
            let mut nested = tree.descendant_clusters(top);
            nested.push(top);
            nested.sort_by_key(|&c| std::cmp::Reverse(self.cg.cluster(c).nesting_level));

            for c in nested {
                let children: &[NodeIx] = &tree.nodes[c.index()];
                if children.iter().all(|v| old.contains(v)) {
                    continue;
                }
                if !self.has_large_gaps_in_frame(tree, c) {
                    continue;
                }
                if children.iter().any(|v| old.contains(v)) {
                    marked.extend(children.iter().copied());
                    continue;
                }

                let roots = unique(children.iter().map(|v| self.root[v.index()]));
                for root in roots {
                    let block = self.block(root);
                    let leaves_frame = block.windows(2).any(|pair| {
                        let (u, v) = (pair[0], pair[1]);
                        self.cg.is_reroute(u)
                            && self.cg.is_reroute(v)
                            && (children.contains(&u) != children.contains(&v))
                    });
                    if leaves_frame {
                        continue;
                    }
                    marked.extend(block.into_iter().filter(|v| children.contains(v)));
                }
            }
        }
        marked
    }

    /// Runs the pass, repairing frame gaps until none remain or the iteration limit is hit.
    fn run(&mut self, tree: &NestingTree, marked_edges: &MarkedEdges) {
        let mut marked_nodes: HashSet<NodeIx> = HashSet::default();
        for iteration in 1..=ITER_LIMIT {
            self.horizontal_alignment(marked_edges, &marked_nodes);
            self.compute_inner_shifts();
            self.vertical_compaction();

            let new = self.marked_nodes(tree, &marked_nodes);
            if new.is_empty() || iteration == ITER_LIMIT {
                break;
            }
            tracing::trace!(
                forwards = self.forwards,
                is_up = self.is_up,
                marked = new.len(),
                "repairing frame gaps"
            );
            marked_nodes.extend(new);
            self.reset();
        }
    }
}

/// The four candidate vertical layouts, as top edges in node iteration order.
///
/// Indices match [`crate::config::Direction::candidate_index`].
pub fn candidate_layouts(cg: &ClusterGraph, config: &LayoutConfig) -> [Vec<f64>; 4] {
    let nodes: Vec<NodeIx> = cg.g.nodes().collect();
    if nodes.is_empty() {
        return Default::default();
    }

    let tree = cg.nesting_tree();
    let bottom_first: Vec<Vec<NodeIx>> = cg
        .columns
        .iter()
        .map(|col| col.iter().rev().copied().collect())
        .collect();
    let pos = positions(cg.g.node_bound(), &bottom_first);
    let mut marked_edges = marked_conflicts(cg, &bottom_first, &pos, |v| {
        cg.is_reroute(v) && cg.g.predecessors(v).any(|u| cg.is_reroute(u))
    });
    marked_edges.extend(marked_conflicts(cg, &bottom_first, &pos, |v| {
        cg.node(v).is_some_and(|n| n.is_vertical_border()) && cg.g.in_degree(v) > 0
    }));

    let mut layouts: [Vec<f64>; 4] = Default::default();
    let passes = [(false, false), (false, true), (true, false), (true, true)];
    for (i, (forwards, is_up)) in passes.into_iter().enumerate() {
        let mut pass = Pass::new(cg, config, forwards, is_up, &cg.columns);
        pass.run(&tree, &marked_edges);
        let sign = if is_up { -1.0 } else { 1.0 };
        layouts[i] = nodes
            .iter()
            .map(|v| sign * pass.y[v.index()].unwrap_or(0.0))
            .collect();
    }
    layouts
}

/// Shifts the layouts onto a common reference: the narrowest one starts at 0, the others are
/// aligned to it by their lower or upper extreme. `heights` is in node iteration order.
pub fn balance(heights: &[f64], layouts: &mut [Vec<f64>; 4]) {
    let min_y = |l: &[f64]| {
        l.iter()
            .zip(heights)
            .map(|(y, h)| y - h)
            .fold(f64::INFINITY, f64::min)
    };
    let max_y = |l: &[f64]| l.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut smallest = 0;
    let mut smallest_span = f64::INFINITY;
    for (i, l) in layouts.iter().enumerate() {
        let span = max_y(l) - min_y(l);
        if span < smallest_span {
            smallest = i;
            smallest_span = span;
        }
    }

    let movement = min_y(&layouts[smallest]);
    for y in &mut layouts[smallest] {
        *y -= movement;
    }

    let reference = layouts[smallest].clone();
    for (i, l) in layouts.iter_mut().enumerate() {
        if i == smallest {
            continue;
        }
        let movement = if i % 2 != 1 {
            min_y(&reference) - min_y(l)
        } else {
            max_y(&reference) - max_y(l)
        };
        for y in l.iter_mut() {
            *y += movement;
        }
    }
}

/// Assigns the top edge of every node.
pub fn assign_y_coords(cg: &mut ClusterGraph, config: &LayoutConfig) {
    let nodes: Vec<NodeIx> = cg.g.nodes().collect();
    if nodes.is_empty() {
        return;
    }
    let mut layouts = candidate_layouts(cg, config);

    let ys: Vec<f64> = match config.direction.candidate_index() {
        Some(i) => std::mem::take(&mut layouts[i]),
        None => {
            let heights: Vec<f64> = nodes
                .iter()
                .map(|&v| cg.node(v).map(|n| n.height).unwrap_or(0.0))
                .collect();
            balance(&heights, &mut layouts);
            (0..nodes.len())
                .map(|i| {
                    let mut values = [layouts[0][i], layouts[1][i], layouts[2][i], layouts[3][i]];
                    values.sort_by(|a, b| a.total_cmp(b));
                    (values[1] + values[2]) / 2.0
                })
                .collect()
        }
    };

    for (v, y) in nodes.into_iter().zip(ys) {
        if let Some(node) = cg.node_mut(v) {
            node.y = y;
        }
    }
    tracing::debug!(direction = ?config.direction, "assigned y coordinates");
}
