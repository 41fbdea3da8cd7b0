use strata::build::build_cluster_graph;
use strata::cluster_graph::ClusterGraph;
use strata::columns::add_columns;
use strata::context::LayoutContext;
use strata::normalize::{insert_dummy_nodes, merge_edges};
use strata::order::{cross_count, minimize_crossings, two_layer_cross_count};
use strata::rank::compute_ranks;
use strata::{Element, GraphSnapshot, LayoutConfig, Link, Vec2};

fn node(id: &str) -> Element {
    Element::node(id, Vec2::ZERO, 140.0, 100.0)
        .with_inputs(&[-40.0, -60.0])
        .with_outputs(&[-35.0, -55.0])
}

fn columns_by_name(cg: &ClusterGraph, ctx: &LayoutContext<'_>) -> Vec<Vec<String>> {
    cg.columns
        .iter()
        .map(|col| {
            col.iter()
                .map(|&v| {
                    cg.node(v)
                        .and_then(|n| n.element())
                        .map(|ix| ctx.element_id(ix).to_string())
                        .unwrap_or_else(|| "~".to_string())
                })
                .collect()
        })
        .collect()
}

fn prepare<'a>(snapshot: &'a GraphSnapshot, config: &'a LayoutConfig) -> (ClusterGraph, LayoutContext<'a>) {
    let mut ctx = LayoutContext::new(snapshot, config);
    let mut cg = build_cluster_graph(&mut ctx).expect("graph");
    compute_ranks(&mut cg);
    merge_edges(&mut cg, config);
    insert_dummy_nodes(&mut cg, config);
    add_columns(&mut cg, &ctx);
    (cg, ctx)
}

#[test]
fn two_layer_cross_count_counts_weighted_inversions() {
    // north 0 -> south 1, north 1 -> south 0: one crossing.
    assert_eq!(two_layer_cross_count(&[(0, 1, 1.0), (1, 0, 1.0)], 2), 1.0);
    assert_eq!(two_layer_cross_count(&[(0, 0, 1.0), (1, 1, 1.0)], 2), 0.0);
    assert_eq!(two_layer_cross_count(&[(0, 2, 2.0), (1, 0, 1.0), (1, 1, 3.0)], 3), 8.0);
    assert_eq!(two_layer_cross_count(&[], 4), 0.0);
}

#[test]
fn minimize_crossings_untangles_a_crossed_pair() {
    let snapshot = GraphSnapshot {
        elements: vec![node("a"), node("b"), node("c"), node("d")],
        links: vec![Link::new("a", 0, "d", 0), Link::new("b", 0, "c", 0)],
        active: None,
    };
    let config = LayoutConfig::default();
    let (mut cg, mut ctx) = prepare(&snapshot, &config);
    assert_eq!(columns_by_name(&cg, &ctx), vec![vec!["a", "b"], vec!["c", "d"]]);
    assert_eq!(cross_count(&cg), 1.0);

    minimize_crossings(&mut cg, &mut ctx);
    assert_eq!(cross_count(&cg), 0.0);
}

#[test]
fn minimize_crossings_never_ends_worse_than_the_initial_order() {
    let names = ["a", "b", "c", "d", "e", "f", "g", "h"];
    let elements: Vec<Element> = names.iter().map(|id| node(id)).collect();
    let links = vec![
        Link::new("a", 0, "f", 0),
        Link::new("a", 1, "e", 1),
        Link::new("b", 0, "e", 0),
        Link::new("b", 1, "g", 0),
        Link::new("c", 0, "h", 0),
        Link::new("c", 1, "f", 1),
        Link::new("d", 0, "g", 1),
        Link::new("d", 1, "h", 1),
    ];
    let snapshot = GraphSnapshot {
        elements,
        links,
        active: None,
    };
    let config = LayoutConfig::default();
    let (mut cg, mut ctx) = prepare(&snapshot, &config);
    let initial = cross_count(&cg);

    minimize_crossings(&mut cg, &mut ctx);
    let after = cross_count(&cg);
    assert!(after <= initial, "{after} > {initial}");

    // Every node stays in its column.
    let mut sizes: Vec<usize> = cg.columns.iter().map(Vec::len).collect();
    sizes.sort();
    assert_eq!(sizes, vec![4, 4]);
}

#[test]
fn minimize_crossings_is_deterministic() {
    let names = ["a", "b", "c", "d", "e", "f"];
    let elements: Vec<Element> = names.iter().map(|id| node(id)).collect();
    let links = vec![
        Link::new("a", 0, "f", 0),
        Link::new("b", 0, "e", 0),
        Link::new("c", 0, "d", 0),
        Link::new("a", 1, "d", 1),
        Link::new("c", 1, "f", 1),
    ];
    let snapshot = GraphSnapshot {
        elements,
        links,
        active: None,
    };
    let config = LayoutConfig::default();

    let run = || {
        let (mut cg, mut ctx) = prepare(&snapshot, &config);
        minimize_crossings(&mut cg, &mut ctx);
        columns_by_name(&cg, &ctx)
    };
    assert_eq!(run(), run());
}

#[test]
fn frames_keep_one_relative_order_across_columns() {
    let elements = vec![
        Element::frame("f"),
        Element::frame("g"),
        node("x"),
        node("a1").with_parent("f"),
        node("c1").with_parent("f"),
        node("b1").with_parent("f"),
        node("a2").with_parent("g"),
        node("c2").with_parent("g"),
        node("b2").with_parent("g"),
        node("y"),
    ];
    // x pulls one node of each frame up and one down, so the barycenters interleave the frames.
    let links = vec![
        Link::new("x", 0, "a1", 0),
        Link::new("x", 1, "c1", 0),
        Link::new("x", 0, "c2", 0),
        Link::new("x", 1, "a2", 0),
        Link::new("a1", 0, "b1", 0),
        Link::new("c1", 0, "b1", 1),
        Link::new("a2", 0, "b2", 0),
        Link::new("c2", 0, "b2", 1),
        Link::new("b1", 0, "y", 0),
        Link::new("b2", 0, "y", 1),
    ];
    let snapshot = GraphSnapshot {
        elements,
        links,
        active: None,
    };
    let config = LayoutConfig::default();
    let (mut cg, mut ctx) = prepare(&snapshot, &config);
    minimize_crossings(&mut cg, &mut ctx);

    let columns = columns_by_name(&cg, &ctx);
    let column_of = |id: &str| {
        columns
            .iter()
            .find(|col| col.iter().any(|n| n == id))
            .expect("node has a column")
    };
    let pos = |col: &[String], id: &str| col.iter().position(|n| n == id).expect("in column");

    let middle = column_of("a1");
    let (a1, c1, a2, c2) = (
        pos(middle, "a1"),
        pos(middle, "c1"),
        pos(middle, "a2"),
        pos(middle, "c2"),
    );
    assert_eq!(a1.abs_diff(c1), 1, "{middle:?}");
    assert_eq!(a2.abs_diff(c2), 1, "{middle:?}");

    let last = column_of("b1");
    let f_first_in_middle = a1 < a2;
    let f_first_in_last = pos(last, "b1") < pos(last, "b2");
    assert_eq!(f_first_in_middle, f_first_in_last, "{columns:?}");
}
