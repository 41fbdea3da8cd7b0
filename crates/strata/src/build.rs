//! Builds the layout graph from the selected elements of a snapshot.

use crate::cluster_graph::ClusterGraph;
use crate::context::LayoutContext;
use crate::error::{Error, Result};
use crate::model::{Cluster, ClusterId, Edge, ElementIx, Node, NodeKind, Socket};
use crate::snapshot::Element;
use rustc_hash::FxHashMap as HashMap;
use std::collections::VecDeque;
use strata_graph::{NodeIx, alg};

/// Creates one node per selected non-frame element, one cluster per frame, and one edge per
/// layout link between selected elements.
pub fn build_cluster_graph(ctx: &mut LayoutContext<'_>) -> Result<ClusterGraph> {
    let snapshot = ctx.snapshot;
    let config = ctx.config;

    let mut index: HashMap<&str, usize> = HashMap::default();
    for (i, e) in snapshot.elements.iter().enumerate() {
        if index.insert(e.id.as_str(), i).is_some() {
            return Err(Error::DuplicateElement { id: e.id.clone() });
        }
    }

    // Clusters: the root, then one per frame in element order.
    let mut clusters = vec![Cluster::root()];
    let mut frame_cluster: Vec<Option<ClusterId>> = vec![None; snapshot.elements.len()];
    for (i, e) in snapshot.elements.iter().enumerate() {
        if !e.is_frame() {
            continue;
        }
        frame_cluster[i] = Some(ClusterId(clusters.len() as u32));
        let label_height = if e.label.is_empty() {
            0.0
        } else {
            -(config.frame_padding / 2.0 - e.label_size * 1.25)
        };
        clusters.push(Cluster {
            frame: Some(ElementIx(i)),
            label_height,
            ..Cluster::root()
        });
    }

    let mut parent_cluster: Vec<ClusterId> = vec![ClusterId::ROOT; snapshot.elements.len()];
    for (i, e) in snapshot.elements.iter().enumerate() {
        let Some(parent) = e.parent.as_deref() else {
            continue;
        };
        let cluster = index
            .get(parent)
            .and_then(|&p| frame_cluster[p])
            .ok_or_else(|| Error::UndefinedParent {
                id: e.id.clone(),
                parent: parent.to_string(),
            })?;
        parent_cluster[i] = cluster;
        if let Some(c) = frame_cluster[i] {
            clusters[c.index()].parent = Some(cluster);
        }
    }
    for c in 1..clusters.len() {
        if clusters[c].parent.is_none() {
            clusters[c].parent = Some(ClusterId::ROOT);
        }
    }

    for c in 1..clusters.len() {
        let mut level = 0;
        let mut cur = ClusterId(c as u32);
        while !cur.is_root() {
            level += 1;
            if level > clusters.len() {
                let id = clusters[c]
                    .frame
                    .map(|f| snapshot.elements[f.0].id.clone())
                    .unwrap_or_default();
                return Err(Error::CyclicParent { id });
            }
            cur = clusters[cur.index()].parent.unwrap_or(ClusterId::ROOT);
        }
        clusters[c].nesting_level = level;
    }

    let mut cg = ClusterGraph::new(clusters);

    let mut node_of: HashMap<usize, NodeIx> = HashMap::default();
    for (i, e) in snapshot.elements.iter().enumerate() {
        if !e.selected || e.is_frame() {
            continue;
        }
        let node = real_node(e, ElementIx(i), parent_cluster[i], config.reroute_size);
        node_of.insert(i, cg.g.add_node(node));
    }
    if node_of.is_empty() {
        return Err(Error::EmptySelection);
    }

    for link in snapshot.layout_links() {
        let dangling = || Error::DanglingLink {
            from: link.from.clone(),
            from_socket: link.from_socket,
            to: link.to.clone(),
            to_socket: link.to_socket,
        };
        let (Some(&i), Some(&j)) = (index.get(link.from.as_str()), index.get(link.to.as_str()))
        else {
            return Err(dangling());
        };
        let (from, to) = (&snapshot.elements[i], &snapshot.elements[j]);
        if link.from_socket >= from.socket_count(true) || link.to_socket >= to.socket_count(false)
        {
            return Err(dangling());
        }

        match (node_of.get(&i), node_of.get(&j)) {
            (Some(&u), Some(&v)) => {
                cg.g.add_edge(
                    u,
                    v,
                    Edge::new(
                        Socket::output(u, link.from_socket),
                        Socket::input(v, link.to_socket),
                    ),
                );
            }
            (Some(_), None) => {
                ctx.linked_to_unselected.insert(ElementIx(i));
            }
            (None, Some(_)) => {
                ctx.linked_to_unselected.insert(ElementIx(j));
            }
            (None, None) => {}
        }
    }

    if let Some(cycle) = alg::find_cycle(&cg.g) {
        let id = cycle
            .first()
            .and_then(|&e| cg.g.source(e))
            .and_then(|v| cg.node(v)?.element())
            .map(|ix| ctx.element_id(ix).to_string())
            .unwrap_or_default();
        return Err(Error::CyclicLinks { id });
    }

    tracing::debug!(
        nodes = cg.g.node_count(),
        edges = cg.g.edge_count(),
        clusters = cg.clusters.len(),
        "built layout graph"
    );
    Ok(cg)
}

fn real_node(e: &Element, element: ElementIx, cluster: ClusterId, reroute_size: f64) -> Node {
    let reroute = e.is_reroute();
    let kind = NodeKind::Real { element, reroute };
    if reroute {
        return Node::new(kind, cluster, reroute_size, reroute_size);
    }
    let mut node = Node::new(kind, cluster, e.width, e.height).with_offsets(
        e.inputs.iter().map(|s| s.offset_y).collect(),
        e.outputs.iter().map(|s| s.offset_y).collect(),
    );
    node.collapsed = e.collapsed;
    node
}

/// Records, for every link into a multi-input socket, the output it originally comes from
/// (looking through reroutes) and its sort id.
pub fn save_multi_input_orders(cg: &ClusterGraph, ctx: &mut LayoutContext<'_>) {
    let snapshot = ctx.snapshot;
    let mut sort_ids: HashMap<(&str, usize, &str, usize), u32> = HashMap::default();
    let mut ordinal: HashMap<(&str, usize), u32> = HashMap::default();
    for link in snapshot.layout_links() {
        let n = ordinal.entry((link.to.as_str(), link.to_socket)).or_insert(0);
        sort_ids.insert(link.key(), link.multi_input_sort_id.unwrap_or(*n));
        *n += 1;
    }

    let mut saved: Vec<(Socket, (Socket, u32))> = Vec::new();
    for e in cg.g.edges() {
        let Some(edge) = cg.edge(e) else {
            continue;
        };
        let Some(target) = cg.node(edge.to.owner) else {
            continue;
        };
        let is_multi_input = target
            .element()
            .and_then(|ix| ctx.element(ix))
            .and_then(|el| el.inputs.get(edge.to.idx))
            .is_some_and(|s| s.multi_input);
        if !is_multi_input {
            continue;
        }

        let base = base_from_socket(cg, edge);
        let (Some(from_id), Some(to_id)) = (
            element_id_of(cg, ctx, edge.from.owner),
            element_id_of(cg, ctx, edge.to.owner),
        ) else {
            continue;
        };
        let key = (from_id, edge.from.idx, to_id, edge.to.idx);
        let sort_id = sort_ids.get(&key).copied().unwrap_or(0);
        saved.push((edge.to, (base, sort_id)));
    }

    for (target, entry) in saved {
        ctx.multi_input_sort_ids.entry(target).or_default().push(entry);
    }
}

fn element_id_of<'a>(cg: &ClusterGraph, ctx: &LayoutContext<'a>, v: NodeIx) -> Option<&'a str> {
    let ix = cg.node(v)?.element()?;
    ctx.element(ix).map(|e| e.id.as_str())
}

/// Output socket a link into `edge.to` originates from, following reroutes upstream.
pub(crate) fn base_from_socket(cg: &ClusterGraph, edge: Edge) -> Socket {
    if !cg.is_reroute(edge.from.owner) {
        return edge.from;
    }

    let mut last = edge.from;
    let mut queue: VecDeque<NodeIx> = VecDeque::from([edge.from.owner]);
    let mut seen = vec![edge.from.owner];
    while let Some(z) = queue.pop_front() {
        for &e in cg.g.in_edges(z) {
            let (Some(u), Some(in_edge)) = (cg.g.source(e), cg.edge(e)) else {
                continue;
            };
            if seen.contains(&u) {
                continue;
            }
            seen.push(u);
            last = in_edge.from;
            if !cg.is_reroute(u) {
                return in_edge.from;
            }
            queue.push_back(u);
        }
    }
    last
}
