//! Turns the laid out graph back into host mutations.

use crate::build::base_from_socket;
use crate::cluster_graph::{ClusterGraph, PathOptions};
use crate::context::LayoutContext;
use crate::geom::{Rect, Vec2, fmean, is_close};
use crate::model::{ClusterId, Edge, ElementIx, NodeKind, Socket};
use crate::reroutes::is_safe_to_remove;
use crate::snapshot::{Arrangement, Element, Link, MultiInputOrder, SortedSource};
use indexmap::IndexSet;
use rustc_hash::FxHashSet as HashSet;
use strata_graph::{EdgeIx, NodeIx};

/// Height difference below which a reroute counts as level with the socket next to it.
const Y_TOL: f64 = 5.0;

fn pred_output(cg: &ClusterGraph, w: NodeIx) -> Option<Socket> {
    let &e = cg.g.in_edges(w).first()?;
    cg.edge(e).map(|d| d.from)
}

fn succ_input(cg: &ClusterGraph, w: NodeIx) -> Option<Socket> {
    let &e = cg.g.out_edges(w).first()?;
    cg.edge(e).map(|d| d.to)
}

fn node_y(cg: &ClusterGraph, v: NodeIx) -> f64 {
    cg.node(v).map_or(0.0, |n| n.y)
}

/// Drops the reroutes of a straight chain that sit level with the socket on either side, so the
/// link runs straight into that socket. `path` keeps the surviving nodes.
pub fn simplify_path(cg: &mut ClusterGraph, ctx: &mut LayoutContext<'_>, path: &mut Vec<NodeIx>) {
    let (Some(&u), Some(&v)) = (path.first(), path.last()) else {
        return;
    };

    if path.len() == 1 {
        let Some(node) = cg.node(v) else {
            return;
        };
        if cg.g.in_degree(v) == 0 || cg.g.out_degree(v) != 1 || node.col.is_none() || node.is_real() {
            return;
        }
        let (Some(p), Some(q)) = (pred_output(cg, v), succ_input(cg, v)) else {
            return;
        };
        if is_close(cg.socket_y(p), cg.socket_y(q), Y_TOL) {
            cg.g.add_edge(p.owner, q.owner, Edge::new(p, q));
            cg.remove_nodes(ctx, &[v]);
            path.clear();
        }
        return;
    }

    let mut between: Vec<NodeIx> = path[1..path.len() - 1].to_vec();

    let p = match pred_output(cg, u) {
        Some(p) if is_close(cg.socket_y(p), node_y(cg, u), Y_TOL) => {
            between.push(u);
            p
        }
        _ => Socket::output(u, 0),
    };
    let q = match succ_input(cg, v) {
        Some(q) if cg.g.out_degree(v) == 1 && is_close(node_y(cg, v), cg.socket_y(q), Y_TOL) => {
            between.push(v);
            q
        }
        _ => Socket::input(v, 0),
    };

    if p.owner != u || q.owner != v || !between.is_empty() {
        cg.g.add_edge(p.owner, q.owner, Edge::new(p, q));
    }
    cg.remove_nodes(ctx, &between);
    path.retain(|w| !between.contains(w));
}

/// Simplifies every routing chain and turns the remaining synthetic nodes into new host
/// reroutes.
fn realize_dummy_nodes(cg: &mut ClusterGraph, ctx: &mut LayoutContext<'_>) {
    let opts = PathOptions {
        aligned: true,
        ..PathOptions::LINEAR
    };
    let paths = {
        let ctx = &*ctx;
        cg.reroute_paths(|v, n| is_safe_to_remove(ctx, v, n), opts)
    };

    for mut path in paths {
        simplify_path(cg, ctx, &mut path);
        for v in path {
            if cg.node(v).is_none_or(|n| n.is_real()) {
                continue;
            }
            let element = ctx.new_reroute_element();
            if let Some(node) = cg.node_mut(v) {
                node.kind = NodeKind::Real {
                    element,
                    reroute: true,
                };
            }
        }
    }
}

/// Moves every node by the same offset so the mean node location equals `old_center`.
fn recenter_nodes(cg: &mut ClusterGraph, old_center: Vec2) {
    let new_center = Vec2::new(
        fmean(cg.g.node_labels().map(|(_, n)| n.x)),
        fmean(cg.g.node_labels().map(|(_, n)| n.y)),
    );
    let offset = old_center - new_center;
    cg.g.for_each_node_mut(|_, n| {
        n.x += offset.x;
        n.y += offset.y;
    });
}

fn element_of(cg: &ClusterGraph, v: NodeIx) -> Option<ElementIx> {
    cg.node(v)?.element()
}

fn link_of(cg: &ClusterGraph, ctx: &LayoutContext<'_>, e: EdgeIx) -> Option<Link> {
    let edge = cg.edge(e)?;
    let from = element_of(cg, edge.from.owner)?;
    let to = element_of(cg, edge.to.owner)?;
    Some(Link::new(
        ctx.element_id(from),
        edge.from.idx,
        ctx.element_id(to),
        edge.to.idx,
    ))
}

/// Diff between the host links among the selection and the links of the final graph.
fn link_diff(cg: &ClusterGraph, ctx: &LayoutContext<'_>, out: &mut Arrangement) {
    let selected: HashSet<&str> = ctx
        .snapshot
        .elements
        .iter()
        .filter(|e| e.selected && !e.is_frame())
        .map(|e| e.id.as_str())
        .collect();
    let mut pool: Vec<Option<&Link>> = ctx
        .snapshot
        .layout_links()
        .filter(|l| selected.contains(l.from.as_str()) && selected.contains(l.to.as_str()))
        .map(Some)
        .collect();

    for e in cg.g.edges() {
        let Some(link) = link_of(cg, ctx, e) else {
            continue;
        };
        let existing = pool
            .iter_mut()
            .find(|slot| matches!(**slot, Some(l) if l.key() == link.key()));
        match existing {
            Some(slot) => *slot = None,
            None => out.added_links.push(link),
        }
    }

    let removed: HashSet<&str> = out.removed.iter().map(String::as_str).collect();
    out.removed_links = pool
        .into_iter()
        .flatten()
        .filter(|l| !removed.contains(l.from.as_str()) && !removed.contains(l.to.as_str()))
        .cloned()
        .collect();
}

/// Sort ids of every saved multi-input socket, reassigned to the links that now carry each
/// original source.
fn restore_multi_input_orders(cg: &ClusterGraph, ctx: &LayoutContext<'_>, out: &mut Arrangement) {
    for (&target, sort_ids) in &ctx.multi_input_sort_ids {
        let Some(to) = element_of(cg, target.owner) else {
            continue;
        };
        let incoming: Vec<EdgeIx> = cg
            .g
            .in_edges(target.owner)
            .iter()
            .copied()
            .filter(|&e| cg.edge(e).is_some_and(|d| d.to == target))
            .collect();

        let mut used: IndexSet<EdgeIx> = IndexSet::new();
        let mut sources = Vec::with_capacity(sort_ids.len());
        for &(base, sort_id) in sort_ids {
            let found = incoming.iter().copied().find(|e| {
                !used.contains(e) && cg.edge(*e).is_some_and(|d| base_from_socket(cg, d) == base)
            });
            let Some(e) = found else {
                continue;
            };
            used.insert(e);
            let (Some(edge), Some(from)) = (cg.edge(e), cg.g.source(e).and_then(|u| element_of(cg, u)))
            else {
                continue;
            };
            sources.push(SortedSource {
                element: ctx.element_id(from).to_string(),
                socket: edge.from.idx,
                sort_id,
            });
        }

        if sources.is_empty() {
            continue;
        }
        for link in out.added_links.iter_mut() {
            if link.to != ctx.element_id(to) || link.to_socket != target.idx {
                continue;
            }
            if let Some(source) = sources
                .iter()
                .find(|s| s.element == link.from && s.socket == link.from_socket)
            {
                link.multi_input_sort_id = Some(source.sort_id);
            }
        }
        out.multi_input_orders.push(MultiInputOrder {
            element: ctx.element_id(to).to_string(),
            socket: target.idx,
            sources,
        });
    }
}

fn union(a: Option<Rect>, b: Rect) -> Rect {
    let Some(a) = a else {
        return b;
    };
    let left = a.x.min(b.x);
    let right = (a.x + a.width).max(b.x + b.width);
    let top = a.y.max(b.y);
    let bottom = (a.y - a.height).min(b.y - b.height);
    Rect {
        x: left,
        y: top,
        width: right - left,
        height: top - bottom,
    }
}

/// Bounds of every frame around its arranged members, innermost frames first.
fn frame_bounds(cg: &ClusterGraph, ctx: &LayoutContext<'_>, out: &mut Arrangement) {
    let tree = cg.nesting_tree();
    let mut frames: Vec<ClusterId> = tree.live_clusters().filter(|c| !c.is_root()).collect();
    frames.sort_by_key(|&c| std::cmp::Reverse(cg.cluster(c).nesting_level));

    let padding = ctx.config.frame_padding;
    let mut bounds: Vec<Option<Rect>> = vec![None; cg.clusters.len()];
    for c in frames {
        let mut inner = None;
        for n in tree.nodes[c.index()].iter().filter_map(|&v| cg.node(v)) {
            let r = Rect {
                x: n.x,
                y: n.y,
                width: n.width,
                height: n.height,
            };
            inner = Some(union(inner, r));
        }
        for &child in &tree.clusters[c.index()] {
            if let Some(r) = bounds[child.index()] {
                inner = Some(union(inner, r));
            }
        }
        let Some(inner) = inner else {
            continue;
        };

        let cluster = cg.cluster(c);
        let rect = Rect {
            x: inner.x - padding,
            y: inner.y + padding + cluster.label_height,
            width: inner.width + 2.0 * padding,
            height: inner.height + 2.0 * padding + cluster.label_height,
        };
        bounds[c.index()] = Some(rect);
        if let Some(frame) = cluster.frame {
            out.frames.insert(ctx.element_id(frame).to_string(), rect);
        }
    }
}

/// Materializes the layout: new reroutes for surviving routing nodes, final positions centred on
/// `old_center`, the link diff, restored multi-input orders and frame bounds.
pub fn realize_layout(
    cg: &mut ClusterGraph,
    ctx: &mut LayoutContext<'_>,
    old_center: Vec2,
) -> Arrangement {
    if ctx.config.add_reroutes {
        realize_dummy_nodes(cg, ctx);
    }
    recenter_nodes(cg, old_center);

    let mut out = Arrangement::default();
    let mut created: Vec<(ElementIx, Element)> = Vec::new();
    for (_, node) in cg.g.node_labels() {
        let Some(element) = node.element() else {
            continue;
        };
        let location = Vec2::new(node.x, node.y);
        let id = ctx.element_id(element).to_string();
        if !ctx.is_new_element(element) {
            out.positions.insert(id, location);
            continue;
        }
        let mut reroute = Element::reroute(id, location, ctx.config.reroute_size);
        if let Some(frame) = cg.cluster(node.cluster).frame {
            reroute = reroute.with_parent(ctx.element_id(frame));
        }
        created.push((element, reroute));
    }
    created.sort_by_key(|(ix, _)| *ix);
    out.added_reroutes = created.into_iter().map(|(_, e)| e).collect();

    let removed: IndexSet<&str> = ctx.removed.iter().map(|&ix| ctx.element_id(ix)).collect();
    out.removed = removed.into_iter().map(str::to_string).collect();

    link_diff(cg, ctx, &mut out);
    restore_multi_input_orders(cg, ctx, &mut out);
    frame_bounds(cg, ctx, &mut out);
    out.diagnostics = std::mem::take(&mut ctx.diagnostics);

    tracing::debug!(
        moved = out.positions.len(),
        added_reroutes = out.added_reroutes.len(),
        removed = out.removed.len(),
        added_links = out.added_links.len(),
        removed_links = out.removed_links.len(),
        "realized layout"
    );
    out
}
