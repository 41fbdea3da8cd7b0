use strata::build::build_cluster_graph;
use strata::cluster_graph::ClusterGraph;
use strata::context::LayoutContext;
use strata::stacking::{contract_node_stacks, expand_node_stack};
use strata::{Element, GraphSnapshot, LayoutConfig, Link, Vec2};
use strata_graph::{NodeIx, alg};

fn node(id: &str) -> Element {
    Element::node(id, Vec2::ZERO, 140.0, 100.0)
        .with_inputs(&[-40.0, -60.0])
        .with_outputs(&[-35.0, -55.0])
}

fn collapsed(id: &str) -> Element {
    let mut e = node(id);
    e.collapsed = true;
    e.stackable = true;
    e
}

fn name_of(cg: &ClusterGraph, ctx: &LayoutContext<'_>, v: NodeIx) -> String {
    cg.node(v)
        .and_then(|n| n.element())
        .map(|ix| ctx.element_id(ix).to_string())
        .unwrap_or_else(|| "~".to_string())
}

fn edge_list(cg: &ClusterGraph, ctx: &LayoutContext<'_>) -> Vec<(String, usize, String, usize)> {
    let mut out: Vec<_> = cg
        .g
        .edges()
        .filter_map(|e| cg.edge(e))
        .map(|edge| {
            (
                name_of(cg, ctx, edge.from.owner),
                edge.from.idx,
                name_of(cg, ctx, edge.to.owner),
                edge.to.idx,
            )
        })
        .collect();
    out.sort();
    out
}

fn find(cg: &ClusterGraph, ctx: &LayoutContext<'_>, id: &str) -> NodeIx {
    cg.g.node_labels()
        .find(|(_, n)| n.element().is_some_and(|ix| ctx.element_id(ix) == id))
        .map(|(v, _)| v)
        .expect("node exists")
}

#[test]
fn collapsed_chain_contracts_into_one_stack_and_expands_back() {
    let snapshot = GraphSnapshot {
        elements: vec![node("x"), collapsed("a"), collapsed("b"), collapsed("c"), node("y")],
        links: vec![
            Link::new("x", 0, "a", 1),
            Link::new("a", 0, "b", 0),
            Link::new("b", 0, "c", 0),
            Link::new("c", 1, "y", 0),
            Link::new("x", 1, "b", 1),
        ],
        active: None,
    };
    let config = LayoutConfig {
        stack_collapsed: true,
        ..LayoutConfig::default()
    };
    let mut ctx = LayoutContext::new(&snapshot, &config);
    let mut cg = build_cluster_graph(&mut ctx).expect("graph");
    let before = edge_list(&cg, &ctx);

    let stacks = contract_node_stacks(&mut cg, &ctx);
    assert_eq!(stacks.len(), 1);
    assert_eq!(stacks[0].len(), 3);
    assert_eq!(cg.g.node_count(), 3);

    let rep = stacks[0].rep();
    let stack_node = cg.node(rep).expect("stack node").clone();
    let spacing = config.margin.y * config.stack_margin_y_factor;
    assert_eq!(stack_node.height, 3.0 * (100.0 + spacing));
    // Two links come in from x and one leaves towards y.
    assert_eq!(cg.g.in_degree(rep), 2);
    assert_eq!(cg.g.out_degree(rep), 1);

    for stack in stacks {
        expand_node_stack(&mut cg, &mut ctx, stack);
    }
    assert_eq!(cg.g.node_count(), 5);
    assert_eq!(edge_list(&cg, &ctx), before);

    let (a, b, c) = (find(&cg, &ctx, "a"), find(&cg, &ctx, "b"), find(&cg, &ctx, "c"));
    let y = |v| cg.node(v).expect("node").y;
    assert_eq!(y(a), stack_node.y);
    assert_eq!(y(b), y(a) - (100.0 + spacing));
    assert_eq!(y(c), y(b) - (100.0 + spacing));
}

#[test]
fn stacking_never_introduces_a_cycle() {
    // Contracting all of a, b and c would route a -> x -> c through the stack twice.
    let snapshot = GraphSnapshot {
        elements: vec![collapsed("a"), collapsed("b"), collapsed("c"), node("x")],
        links: vec![
            Link::new("a", 0, "b", 0),
            Link::new("b", 0, "c", 0),
            Link::new("a", 1, "x", 0),
            Link::new("x", 0, "c", 1),
        ],
        active: None,
    };
    let config = LayoutConfig {
        stack_collapsed: true,
        ..LayoutConfig::default()
    };
    let mut ctx = LayoutContext::new(&snapshot, &config);
    let mut cg = build_cluster_graph(&mut ctx).expect("graph");
    let a = find(&cg, &ctx, "a");
    let c = find(&cg, &ctx, "c");

    let stacks = contract_node_stacks(&mut cg, &ctx);
    assert!(alg::toposort(&cg.g).is_ok());
    for stack in &stacks {
        let members: Vec<NodeIx> = stack.members().collect();
        assert!(!(members.contains(&a) && members.contains(&c)));
        assert!(stack.len() >= 2);
    }
}

#[test]
fn nodes_in_different_frames_are_not_stacked() {
    let snapshot = GraphSnapshot {
        elements: vec![
            Element::frame("f"),
            collapsed("a"),
            collapsed("b").with_parent("f"),
        ],
        links: vec![Link::new("a", 0, "b", 0)],
        active: None,
    };
    let config = LayoutConfig {
        stack_collapsed: true,
        ..LayoutConfig::default()
    };
    let mut ctx = LayoutContext::new(&snapshot, &config);
    let mut cg = build_cluster_graph(&mut ctx).expect("graph");

    assert!(contract_node_stacks(&mut cg, &ctx).is_empty());
}

#[test]
fn expanded_graph_arranges_members_in_one_column() {
    let snapshot = GraphSnapshot {
        elements: vec![node("x"), collapsed("a"), collapsed("b"), node("y")],
        links: vec![
            Link::new("x", 0, "a", 0),
            Link::new("a", 0, "b", 0),
            Link::new("b", 0, "y", 0),
        ],
        active: None,
    };
    let config = LayoutConfig {
        stack_collapsed: true,
        ..LayoutConfig::default()
    };
    let arrangement = strata::arrange(&snapshot, &config).expect("arranged");

    let a = arrangement.positions["a"];
    let b = arrangement.positions["b"];
    let x = arrangement.positions["x"];
    assert_eq!(a.x, b.x);
    assert!(b.y < a.y);
    assert!(x.x < a.x);
}
