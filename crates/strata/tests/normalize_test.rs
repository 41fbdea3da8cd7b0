use strata::build::build_cluster_graph;
use strata::cluster_graph::ClusterGraph;
use strata::context::LayoutContext;
use strata::normalize::{insert_dummy_nodes, merge_edges};
use strata::rank::compute_ranks;
use strata::{Element, GraphSnapshot, LayoutConfig, Link, Vec2};
use strata_graph::NodeIx;

fn node(id: &str) -> Element {
    Element::node(id, Vec2::ZERO, 140.0, 100.0)
        .with_inputs(&[-40.0, -60.0])
        .with_outputs(&[-35.0, -55.0])
}

fn find(cg: &ClusterGraph, ctx: &LayoutContext<'_>, id: &str) -> NodeIx {
    cg.g.node_labels()
        .find(|(_, n)| n.element().is_some_and(|ix| ctx.element_id(ix) == id))
        .map(|(v, _)| v)
        .expect("node exists")
}

fn set_rank(cg: &mut ClusterGraph, v: NodeIx, rank: usize) {
    cg.node_mut(v).expect("node exists").rank = rank;
}

fn assert_unit_spans(cg: &ClusterGraph) {
    for e in cg.g.edges() {
        let (u, v) = cg.g.endpoints(e).expect("live edge");
        assert_eq!(cg.rank(v), cg.rank(u) + 1, "edge {u:?} -> {v:?}");
    }
}

fn dummies(cg: &ClusterGraph) -> Vec<NodeIx> {
    cg.g.node_labels()
        .filter(|(_, n)| !n.is_real())
        .map(|(v, _)| v)
        .collect()
}

#[test]
fn insert_dummy_nodes_splits_a_long_edge_into_unit_steps() {
    let snapshot = GraphSnapshot {
        elements: vec![node("a"), node("b"), node("c")],
        links: vec![Link::new("a", 0, "b", 0), Link::new("a", 1, "c", 0)],
        active: None,
    };
    let config = LayoutConfig::default();
    let mut ctx = LayoutContext::new(&snapshot, &config);
    let mut cg = build_cluster_graph(&mut ctx).expect("graph");
    let (a, b, c) = (find(&cg, &ctx, "a"), find(&cg, &ctx, "b"), find(&cg, &ctx, "c"));
    set_rank(&mut cg, a, 0);
    set_rank(&mut cg, b, 1);
    set_rank(&mut cg, c, 3);

    insert_dummy_nodes(&mut cg, &config);

    assert_unit_spans(&cg);
    let added = dummies(&cg);
    assert_eq!(added.len(), 2);

    let d1 = cg
        .g
        .successors(a)
        .find(|&w| w != b)
        .expect("a links to a dummy");
    assert_eq!(cg.rank(d1), 1);
    let d2 = cg.g.first_successor(d1).expect("chain continues");
    assert_eq!(cg.rank(d2), 2);
    assert_eq!(cg.g.first_successor(d2), Some(c));
    assert!(!cg.g.has_edge(a, c));

    let last = cg.g.in_edges(c).first().and_then(|&e| cg.edge(e)).expect("edge");
    assert_eq!(last.to.idx, 0);
    let first = cg
        .g
        .out_edges(a)
        .iter()
        .filter_map(|&e| cg.edge(e))
        .find(|edge| edge.to.owner == d1)
        .expect("edge");
    assert_eq!(first.from.idx, 1);
}

#[test]
fn merge_edges_funnels_links_from_one_socket_through_shared_dummies() {
    let snapshot = GraphSnapshot {
        elements: vec![node("s"), node("t1"), node("t2")],
        links: vec![Link::new("s", 0, "t1", 0), Link::new("s", 0, "t2", 0)],
        active: None,
    };
    let config = LayoutConfig::default();
    let mut ctx = LayoutContext::new(&snapshot, &config);
    let mut cg = build_cluster_graph(&mut ctx).expect("graph");
    let (s, t1, t2) = (find(&cg, &ctx, "s"), find(&cg, &ctx, "t1"), find(&cg, &ctx, "t2"));
    set_rank(&mut cg, s, 0);
    set_rank(&mut cg, t1, 2);
    set_rank(&mut cg, t2, 4);

    merge_edges(&mut cg, &config);
    insert_dummy_nodes(&mut cg, &config);

    assert_unit_spans(&cg);
    let at_rank_1: Vec<NodeIx> = dummies(&cg).into_iter().filter(|&v| cg.rank(v) == 1).collect();
    assert_eq!(at_rank_1.len(), 1);
    assert_eq!(cg.g.out_degree(s), 1);
    assert_eq!(cg.g.first_successor(s), Some(at_rank_1[0]));
    // One dummy per rank between the source and the farthest target.
    assert_eq!(dummies(&cg).len(), 3);
}

#[test]
fn insert_dummy_nodes_fills_rank_gaps_inside_frames() {
    let snapshot = GraphSnapshot {
        elements: vec![
            Element::frame("f"),
            node("p").with_parent("f"),
            node("q").with_parent("f"),
        ],
        links: Vec::new(),
        active: None,
    };
    let config = LayoutConfig::default();
    let mut ctx = LayoutContext::new(&snapshot, &config);
    let mut cg = build_cluster_graph(&mut ctx).expect("graph");
    let (p, q) = (find(&cg, &ctx, "p"), find(&cg, &ctx, "q"));
    set_rank(&mut cg, p, 2);
    set_rank(&mut cg, q, 5);
    let frame = cg.cluster_of(p);

    insert_dummy_nodes(&mut cg, &config);

    let mut fillers: Vec<usize> = cg
        .g
        .node_labels()
        .filter(|(_, n)| n.is_filler())
        .map(|(_, n)| {
            assert_eq!(n.cluster, frame);
            n.rank
        })
        .collect();
    fillers.sort();
    assert_eq!(fillers, vec![3, 4]);
}

#[test]
fn every_edge_spans_one_rank_after_normalization() {
    let snapshot = GraphSnapshot {
        elements: vec![
            Element::frame("f"),
            node("a"),
            node("b").with_parent("f"),
            node("c").with_parent("f"),
            node("d"),
            node("e"),
        ],
        links: vec![
            Link::new("a", 0, "b", 0),
            Link::new("a", 0, "d", 0),
            Link::new("a", 0, "e", 1),
            Link::new("b", 0, "c", 0),
            Link::new("c", 0, "d", 1),
            Link::new("d", 0, "e", 0),
            Link::new("b", 1, "e", 1),
        ],
        active: None,
    };
    let config = LayoutConfig::default();
    let mut ctx = LayoutContext::new(&snapshot, &config);
    let mut cg = build_cluster_graph(&mut ctx).expect("graph");
    compute_ranks(&mut cg);
    merge_edges(&mut cg, &config);
    insert_dummy_nodes(&mut cg, &config);

    assert_unit_spans(&cg);
}

fn frame_to_outside() -> GraphSnapshot {
    GraphSnapshot {
        elements: vec![
            Element::frame("f"),
            node("a").with_parent("f"),
            node("b").with_parent("f"),
            node("c").with_parent("f"),
            node("d"),
        ],
        links: vec![
            Link::new("a", 0, "b", 0),
            Link::new("b", 0, "c", 0),
            Link::new("c", 0, "d", 0),
            Link::new("a", 1, "d", 1),
        ],
        active: None,
    }
}

fn dummy_clusters(config: &LayoutConfig, snapshot: &GraphSnapshot) -> (Vec<bool>, bool) {
    let mut ctx = LayoutContext::new(snapshot, config);
    let mut cg = build_cluster_graph(&mut ctx).expect("graph");
    for (id, rank) in [("a", 0), ("b", 1), ("c", 2), ("d", 3)] {
        let v = find(&cg, &ctx, id);
        set_rank(&mut cg, v, rank);
    }
    insert_dummy_nodes(&mut cg, config);

    let frame = cg.cluster_of(find(&cg, &ctx, "a"));
    let inside: Vec<bool> = dummies(&cg)
        .into_iter()
        .map(|w| cg.cluster_of(w) == frame)
        .collect();
    (inside, frame.is_root())
}

#[test]
fn dummies_of_a_link_leaving_a_frame_move_into_the_frame() {
    let snapshot = frame_to_outside();
    let (inside, frame_is_root) = dummy_clusters(&LayoutConfig::default(), &snapshot);
    assert!(!frame_is_root);
    assert_eq!(inside, vec![true, true]);
}

#[test]
fn keep_reroutes_outside_frames_leaves_dummies_in_the_common_frame() {
    let snapshot = frame_to_outside();
    let config = LayoutConfig {
        keep_reroutes_outside_frames: true,
        ..LayoutConfig::default()
    };
    let (inside, _) = dummy_clusters(&config, &snapshot);
    assert_eq!(inside, vec![false, false]);
}
