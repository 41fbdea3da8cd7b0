use strata::build::build_cluster_graph;
use strata::cluster_graph::ClusterGraph;
use strata::columns::{add_columns, add_vertical_border_nodes, remove_fillers};
use strata::context::LayoutContext;
use strata::normalize::{insert_dummy_nodes, merge_edges};
use strata::order::minimize_crossings;
use strata::position::{assign_y_coords, balance, candidate_layouts};
use strata::rank::compute_ranks;
use strata::{Direction, Element, GraphSnapshot, LayoutConfig, Link, SocketAlignment, Vec2};

const H: f64 = 100.0;

fn node(id: &str, inputs: usize, outputs: usize) -> Element {
    Element::node(id, Vec2::ZERO, 140.0, H)
        .with_inputs(&vec![0.0; inputs])
        .with_outputs(&vec![0.0; outputs])
}

/// a fans out to b and c, which both feed d. Mirroring the graph vertically swaps b and c.
fn diamond() -> GraphSnapshot {
    GraphSnapshot {
        elements: vec![node("a", 0, 1), node("b", 1, 1), node("c", 1, 1), node("d", 2, 0)],
        links: vec![
            Link::new("a", 0, "b", 0),
            Link::new("a", 0, "c", 0),
            Link::new("b", 0, "d", 0),
            Link::new("c", 0, "d", 1),
        ],
        active: None,
    }
}

fn prepare<'a>(snapshot: &'a GraphSnapshot, config: &'a LayoutConfig) -> (ClusterGraph, LayoutContext<'a>) {
    let mut ctx = LayoutContext::new(snapshot, config);
    let mut cg = build_cluster_graph(&mut ctx).expect("graph");
    compute_ranks(&mut cg);
    merge_edges(&mut cg, config);
    insert_dummy_nodes(&mut cg, config);
    add_columns(&mut cg, &ctx);
    minimize_crossings(&mut cg, &mut ctx);
    add_vertical_border_nodes(&mut cg);
    remove_fillers(&mut cg, &mut ctx);
    (cg, ctx)
}

fn y_by_name(cg: &ClusterGraph, ctx: &LayoutContext<'_>, id: &str) -> f64 {
    cg.g.node_labels()
        .find(|(_, n)| n.element().is_some_and(|ix| ctx.element_id(ix) == id))
        .map(|(_, n)| n.y)
        .expect("node exists")
}

fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn up_and_down_candidates_are_mirror_images() {
    let snapshot = diamond();
    let config = LayoutConfig::default();
    let (cg, _ctx) = prepare(&snapshot, &config);
    let layouts = candidate_layouts(&cg, &config);

    // Node iteration order is a, b, c, d. Mirroring maps a top edge y to -(y - H) and swaps b
    // and c, so `down[v] + up[mirror(v)]` is the same for every node.
    let mirror = [0, 2, 1, 3];
    for (down, up) in [(0, 1), (2, 3)] {
        let (down, up) = (&layouts[down], &layouts[up]);
        let sums: Vec<f64> = (0..4).map(|i| down[i] + up[mirror[i]]).collect();
        for s in &sums {
            assert!(is_close(*s, sums[0]), "{down:?} vs {up:?}");
        }
    }
}

#[test]
fn balanced_direction_is_symmetric_for_a_symmetric_graph() {
    let snapshot = diamond();
    let config = LayoutConfig::default();
    let (mut cg, ctx) = prepare(&snapshot, &config);
    assign_y_coords(&mut cg, &config);

    let (a, b, c, d) = (
        y_by_name(&cg, &ctx, "a"),
        y_by_name(&cg, &ctx, "b"),
        y_by_name(&cg, &ctx, "c"),
        y_by_name(&cg, &ctx, "d"),
    );
    assert!(is_close(a, d), "a={a} d={d}");
    assert!(is_close(b + c, 2.0 * a), "b={b} c={c} a={a}");
    assert!((b - c).abs() >= H, "b and c overlap: b={b} c={c}");
}

#[test]
fn balanced_direction_averages_the_mirrored_candidates() {
    let snapshot = diamond();
    let config = LayoutConfig::default();
    let (mut cg, ctx) = prepare(&snapshot, &config);

    let heights: Vec<f64> = cg.g.node_labels().map(|(_, n)| n.height).collect();
    let mut layouts = candidate_layouts(&cg, &config);
    balance(&heights, &mut layouts);
    assign_y_coords(&mut cg, &config);
    let ys: Vec<f64> = cg.g.node_labels().map(|(_, n)| n.y).collect();

    for (i, y) in ys.iter().enumerate() {
        let mut values = [layouts[0][i], layouts[1][i], layouts[2][i], layouts[3][i]];
        values.sort_by(|a, b| a.total_cmp(b));
        assert!(is_close(*y, (values[1] + values[2]) / 2.0), "node {i}: {y} vs {values:?}");
    }

    // a and d are their own mirror images, so they sit halfway between each mirrored pair.
    for id in ["a", "d"] {
        let i = cg
            .g
            .node_labels()
            .position(|(_, n)| n.element().is_some_and(|ix| ctx.element_id(ix) == id))
            .expect("node exists");
        let y = y_by_name(&cg, &ctx, id);
        assert!(is_close(y, (layouts[0][i] + layouts[1][i]) / 2.0), "{id}: {y} vs {layouts:?}");
        assert!(is_close(y, (layouts[2][i] + layouts[3][i]) / 2.0), "{id}: {y} vs {layouts:?}");
    }
}

#[test]
fn single_direction_keeps_linked_sockets_level() {
    let snapshot = diamond();
    let config = LayoutConfig {
        direction: Direction::TopLeft,
        ..LayoutConfig::default()
    };
    let (mut cg, ctx) = prepare(&snapshot, &config);
    assign_y_coords(&mut cg, &config);

    let (a, b, c, d) = (
        y_by_name(&cg, &ctx, "a"),
        y_by_name(&cg, &ctx, "b"),
        y_by_name(&cg, &ctx, "c"),
        y_by_name(&cg, &ctx, "d"),
    );
    // a and d line up with one of the two branches.
    assert!(is_close(a, d));
    assert!(is_close(a, b) || is_close(a, c));
    assert!((b - c).abs() >= H + config.margin.y - 1e-6);
}

#[test]
fn column_neighbours_never_overlap() {
    let snapshot = GraphSnapshot {
        elements: vec![
            node("a", 0, 2),
            node("b", 1, 1),
            node("c", 1, 1),
            node("e", 1, 1),
            node("d", 3, 0),
        ],
        links: vec![
            Link::new("a", 0, "b", 0),
            Link::new("a", 1, "c", 0),
            Link::new("a", 1, "e", 0),
            Link::new("b", 0, "d", 0),
            Link::new("c", 0, "d", 1),
            Link::new("e", 0, "d", 2),
        ],
        active: None,
    };
    for direction in [
        Direction::Balanced,
        Direction::BottomLeft,
        Direction::BottomRight,
        Direction::TopLeft,
        Direction::TopRight,
    ] {
        let config = LayoutConfig {
            direction,
            ..LayoutConfig::default()
        };
        let (mut cg, _ctx) = prepare(&snapshot, &config);
        assign_y_coords(&mut cg, &config);

        for col in &cg.columns {
            for pair in col.windows(2) {
                let (upper, lower) = (cg.node(pair[0]).expect("node"), cg.node(pair[1]).expect("node"));
                assert!(
                    upper.y - upper.height >= lower.y - 1e-6,
                    "{direction:?}: {} / {}",
                    upper.y,
                    lower.y
                );
            }
        }
    }
}

/// A short node feeding a tall one, with the linked sockets at different depths.
fn unequal_pair() -> GraphSnapshot {
    GraphSnapshot {
        elements: vec![
            Element::node("a", Vec2::ZERO, 140.0, H).with_outputs(&[-30.0]),
            Element::node("b", Vec2::ZERO, 140.0, 2.0 * H).with_inputs(&[-80.0]),
        ],
        links: vec![Link::new("a", 0, "b", 0)],
        active: None,
    }
}

#[test]
fn socket_alignment_none_lines_up_node_tops() {
    let snapshot = unequal_pair();
    let config = LayoutConfig {
        direction: Direction::TopLeft,
        socket_alignment: SocketAlignment::None,
        ..LayoutConfig::default()
    };
    let (mut cg, ctx) = prepare(&snapshot, &config);
    assign_y_coords(&mut cg, &config);

    let (a, b) = (y_by_name(&cg, &ctx, "a"), y_by_name(&cg, &ctx, "b"));
    assert!(is_close(a, b), "a={a} b={b}");
}

#[test]
fn socket_alignment_full_lines_up_linked_sockets() {
    let snapshot = unequal_pair();
    for direction in [Direction::TopLeft, Direction::BottomRight, Direction::Balanced] {
        let config = LayoutConfig {
            direction,
            socket_alignment: SocketAlignment::Full,
            ..LayoutConfig::default()
        };
        let (mut cg, ctx) = prepare(&snapshot, &config);
        assign_y_coords(&mut cg, &config);

        let (a, b) = (y_by_name(&cg, &ctx, "a"), y_by_name(&cg, &ctx, "b"));
        assert!(is_close(a - 30.0, b - 80.0), "{direction:?}: a={a} b={b}");
    }
}
