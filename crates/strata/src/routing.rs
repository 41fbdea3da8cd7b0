//! Bend points for links that would otherwise cut through neighbouring nodes.

use crate::cluster_graph::ClusterGraph;
use crate::columns::node_name;
use crate::context::LayoutContext;
use crate::error::Diagnostic;
use crate::geom::{Segment, Vec2, segment_intersection};
use crate::model::{Node, Socket};
use indexmap::IndexMap;
use strata_graph::{EdgeIx, NodeIx};

const MIN_X_DIFF: f64 = 30.0;
const MIN_Y_DIFF: f64 = 8.0;

#[derive(Debug, Clone, Copy)]
struct BendPoint {
    at: Vec2,
}

struct Router<'c, 'a> {
    cg: &'c ClusterGraph,
    ctx: &'c mut LayoutContext<'a>,
    bends: Vec<BendPoint>,
    /// Bend points of every routed edge, by index into `bends`.
    routes: IndexMap<EdgeIx, Vec<usize>>,
}

fn socket_pos(cg: &ClusterGraph, s: Socket) -> Vec2 {
    Vec2::new(cg.socket_x(s), cg.socket_y(s))
}

fn node_overlaps_edge(v: &Node, line: Segment) -> bool {
    if v.is_reroute() {
        return false;
    }
    let top = (Vec2::new(v.x, v.y), Vec2::new(v.x + v.width, v.y));
    let bottom_y = v.y - v.height;
    let bottom = (Vec2::new(v.x, bottom_y), Vec2::new(v.x + v.width, bottom_y));
    segment_intersection(line, top).is_some() || segment_intersection(line, bottom).is_some()
}

impl Router<'_, '_> {
    /// Whether a link from `socket` towards `other` clears the column neighbour it heads
    /// towards without a bend.
    fn is_unnecessary_bend_point(&self, socket: Socket, other: Socket) -> bool {
        let cg = self.cg;
        let v = socket.owner;
        if cg.is_reroute(v) {
            return false;
        }
        let (Some(node), Some(i)) = (cg.node(v), cg.col_pos(v)) else {
            return true;
        };
        let Some(col) = node.col.and_then(|c| cg.columns.get(c)) else {
            return true;
        };

        let (p, q) = (socket_pos(cg, socket), socket_pos(cg, other));
        let is_above = q.y > p.y;
        let nbr = if is_above {
            i.checked_sub(1).and_then(|j| col.get(j))
        } else {
            col.get(i + 1)
        };
        let Some(nbr) = nbr.and_then(|&w| cg.node(w)) else {
            return true;
        };
        if nbr.is_reroute() {
            return true;
        }

        let margin = self.ctx.config.margin;
        let padding = self.ctx.config.frame_padding;
        let mut x_offset = margin.x / 2.0;
        let mut nbr_y = if is_above {
            nbr.y - nbr.height - margin.y / 2.0
        } else {
            nbr.y + margin.y / 2.0
        };

        let nbr_cluster = cg.cluster(nbr.cluster);
        if nbr_cluster.is_frame() && nbr.cluster != node.cluster {
            x_offset += padding;
            if is_above {
                nbr_y -= padding;
            } else {
                nbr_y += padding + nbr_cluster.label_height;
            }
        }

        let barrier = (
            Vec2::new(nbr.x - x_offset, nbr_y),
            Vec2::new(nbr.x + nbr.width + x_offset, nbr_y),
        );
        segment_intersection(barrier, (p, q)).is_none()
    }

    fn add_bend_points(&mut self, v: NodeIx) {
        let cg = self.cg;
        let Some(col) = cg.node(v).and_then(|n| n.col).and_then(|c| cg.columns.get(c)) else {
            return;
        };
        let mut largest: Option<&Node> = None;
        for w in col.iter().filter_map(|&w| cg.node(w)) {
            if largest.is_none_or(|l| w.width > l.width) {
                largest = Some(w);
            }
        }
        let Some(largest) = largest else {
            return;
        };

        let incident: Vec<EdgeIx> = cg.g.out_edges(v).iter().chain(cg.g.in_edges(v)).copied().collect();
        for e in incident {
            let Some(edge) = cg.edge(e) else {
                continue;
            };
            let socket = edge.socket_of(v);
            let other = edge.opposite_socket(v);
            let p = socket_pos(cg, socket);
            let x = if socket.is_output {
                largest.x + largest.width
            } else {
                largest.x
            };

            if (p.x - x).abs() <= MIN_X_DIFF {
                continue;
            }
            if (socket_pos(cg, other).y - p.y).abs() <= MIN_Y_DIFF {
                continue;
            }
            if self.is_unnecessary_bend_point(socket, other) {
                continue;
            }

            if !(x.is_finite() && p.y.is_finite()) {
                let diagnostic = Diagnostic::RoutingDegenerate {
                    from: node_name(cg, self.ctx, edge.from.owner).to_string(),
                    to: node_name(cg, self.ctx, edge.to.owner).to_string(),
                };
                tracing::warn!(?diagnostic, "skipping degenerate bend point");
                self.ctx.diagnostics.push(diagnostic);
                continue;
            }

            self.bends.push(BendPoint { at: Vec2::new(x, p.y) });
            self.routes.entry(e).or_default().push(self.bends.len() - 1);
        }
    }

    /// Bend points with the same source socket and position collapse into one. Branching
    /// reroutes share a bend point with every sibling link that ends at the same height.
    fn merge_equivalent(&mut self) {
        let cg = self.cg;
        let mut groups: IndexMap<(Socket, u64, u64), Vec<(EdgeIx, usize)>> = IndexMap::new();
        for (&e, bends) in &self.routes {
            let Some(edge) = cg.edge(e) else {
                continue;
            };
            for &b in bends {
                let at = self.bends[b].at;
                groups
                    .entry((edge.from, at.x.to_bits(), at.y.to_bits()))
                    .or_default()
                    .push((e, b));
            }
        }

        for ((from, _, _), members) in groups {
            let Some(&(_, target)) = members.first() else {
                continue;
            };
            for &(e, b) in &members[1..] {
                if let Some(bends) = self.routes.get_mut(&e) {
                    for slot in bends.iter_mut().filter(|slot| **slot == b) {
                        *slot = target;
                    }
                }
            }

            let u = from.owner;
            if !cg.is_reroute(u) || cg.g.out_degree(u) < 2 {
                continue;
            }
            let target_y = self.bends[target].at.y;
            for &e in cg.g.out_edges(u) {
                let Some(edge) = cg.edge(e) else {
                    continue;
                };
                let bends = self.routes.entry(e).or_default();
                if !bends.contains(&target) && cg.socket_y(edge.to) == target_y {
                    bends.push(target);
                }
            }
        }
        self.routes.retain(|_, bends| !bends.is_empty());
    }

    /// Lets sibling links from the same socket reuse a route when the straight segment from its
    /// last bend point is clear.
    fn extend_to_siblings(&mut self) {
        let cg = self.cg;
        let routed: Vec<EdgeIx> = self.routes.keys().copied().collect();
        for e in routed {
            let Some(mut bends) = self.routes.get(&e).cloned() else {
                continue;
            };
            bends.sort_by(|&a, &b| self.bends[a].at.x.total_cmp(&self.bends[b].at.x));
            self.routes.insert(e, bends.clone());

            let (Some(edge), Some((u, v))) = (cg.edge(e), cg.g.endpoints(e)) else {
                continue;
            };
            let Some(&last) = bends.last() else {
                continue;
            };
            let last = self.bends[last].at;
            let col = cg
                .node(v)
                .and_then(|n| n.col)
                .and_then(|c| cg.columns.get(c))
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            for &sibling in cg.g.out_edges(u) {
                let Some(d) = cg.edge(sibling) else {
                    continue;
                };
                if d.from != edge.from || self.routes.contains_key(&sibling) {
                    continue;
                }
                let to = socket_pos(cg, d.to);
                if to.x <= last.x {
                    continue;
                }
                let line = (last, to);
                if col.iter().filter_map(|&w| cg.node(w)).any(|w| node_overlaps_edge(w, line)) {
                    continue;
                }
                self.routes.insert(sibling, bends.clone());
            }
        }
    }
}

/// Inserts bend-point dummies on links that leave or enter a node far from the column edge at
/// a different height than their other end.
pub fn route_edges(cg: &mut ClusterGraph, ctx: &mut LayoutContext<'_>) {
    let mut router = Router {
        cg: &*cg,
        ctx: &mut *ctx,
        bends: Vec::new(),
        routes: IndexMap::new(),
    };
    let nodes: Vec<NodeIx> = router.cg.columns.iter().flatten().copied().collect();
    for v in nodes {
        router.add_bend_points(v);
    }
    router.merge_equivalent();
    router.extend_to_siblings();

    let Router { bends, routes, .. } = router;
    let size = ctx.config.reroute_size;
    let mut created: Vec<Option<NodeIx>> = vec![None; bends.len()];
    for (e, route) in routes {
        let Some((u, v)) = cg.g.endpoints(e) else {
            continue;
        };
        let c = cg.lowest_common_cluster(cg.cluster_of(u), cg.cluster_of(v));
        let mut dummies = Vec::with_capacity(route.len());
        for b in route {
            let w = match created[b] {
                Some(w) => w,
                None => {
                    let mut node = Node::dummy(c, 0, size);
                    node.x = bends[b].at.x;
                    node.y = bends[b].at.y;
                    let w = cg.g.add_node(node);
                    created[b] = Some(w);
                    w
                }
            };
            if let Some(node) = cg.node_mut(w) {
                node.cluster = c;
            }
            dummies.push(w);
        }
        cg.add_dummy_nodes_to_edge(e, &dummies);
    }

    tracing::debug!(
        bend_points = created.iter().flatten().count(),
        "routed edges"
    );
}
