use strata::{
    Element, Error, GraphSnapshot, LayoutConfig, Link, SocketInfo, Vec2, arrange,
};

fn node(id: &str) -> Element {
    Element::node(id, Vec2::ZERO, 140.0, 100.0)
        .with_inputs(&[-40.0, -60.0])
        .with_outputs(&[-35.0, -55.0])
}

fn snapshot(elements: Vec<Element>, links: Vec<Link>) -> GraphSnapshot {
    GraphSnapshot {
        elements,
        links,
        active: None,
    }
}

/// Follows a link out of `(id, socket)` through any reroutes and returns the socket it ends in.
fn follow(snapshot: &GraphSnapshot, id: &str, socket: usize) -> Option<(String, usize)> {
    let (mut cur, mut sock) = (id.to_string(), socket);
    for _ in 0..100 {
        let link = snapshot
            .links
            .iter()
            .find(|l| l.from == cur && l.from_socket == sock)?;
        let target = snapshot.element(&link.to)?;
        if !target.is_reroute() {
            return Some((link.to.clone(), link.to_socket));
        }
        cur = link.to.clone();
        sock = 0;
    }
    None
}

#[test]
fn arrange_places_a_chain_left_to_right() {
    let snap = snapshot(
        vec![node("a"), node("b"), node("c")],
        vec![Link::new("a", 0, "b", 0), Link::new("b", 0, "c", 0)],
    );
    let config = LayoutConfig::default();
    let out = arrange(&snap, &config).expect("arranged");

    let (a, b, c) = (out.positions["a"], out.positions["b"], out.positions["c"]);
    assert!(b.x - a.x >= 140.0 + config.margin.x - 1e-6);
    assert!(c.x - b.x >= 140.0 + config.margin.x - 1e-6);
    assert!(out.added_reroutes.is_empty());
    assert!(out.removed.is_empty());
    assert!(out.added_links.is_empty());
    assert!(out.removed_links.is_empty());
}

#[test]
fn arrange_keeps_the_selection_centered() {
    let mut elements = vec![node("a"), node("b"), node("c")];
    elements[0].location = Vec2::new(0.0, 0.0);
    elements[1].location = Vec2::new(300.0, 40.0);
    elements[2].location = Vec2::new(90.0, -220.0);
    let snap = snapshot(
        elements,
        vec![Link::new("a", 0, "b", 0), Link::new("a", 1, "c", 0)],
    );
    let out = arrange(&snap, &LayoutConfig::default()).expect("arranged");

    let n = out.positions.len() as f64;
    let mean_x: f64 = out.positions.values().map(|p| p.x).sum::<f64>() / n;
    let mean_y: f64 = out.positions.values().map(|p| p.y).sum::<f64>() / n;
    assert!((mean_x - 130.0).abs() < 1e-6, "{mean_x}");
    assert!((mean_y - -60.0).abs() < 1e-6, "{mean_y}");
}

#[test]
fn arrange_is_deterministic() {
    let snap = snapshot(
        vec![node("a"), node("b"), node("c"), node("d"), node("e")],
        vec![
            Link::new("a", 0, "c", 0),
            Link::new("b", 0, "c", 1),
            Link::new("a", 1, "d", 0),
            Link::new("c", 0, "e", 0),
            Link::new("b", 1, "e", 1),
            Link::new("d", 0, "e", 1),
        ],
    );
    let config = LayoutConfig::default();
    let first = arrange(&snap, &config).expect("arranged");
    let second = arrange(&snap, &config).expect("arranged");
    assert_eq!(first, second);
}

#[test]
fn arrange_leaves_unselected_elements_alone() {
    let mut elements = vec![node("a"), node("b"), node("c")];
    elements[2].selected = false;
    elements[2].location = Vec2::new(-500.0, 500.0);
    let snap = snapshot(
        elements,
        vec![Link::new("a", 0, "b", 0), Link::new("b", 0, "c", 0)],
    );
    let out = arrange(&snap, &LayoutConfig::default()).expect("arranged");

    assert!(out.positions.contains_key("a"));
    assert!(out.positions.contains_key("b"));
    assert!(!out.positions.contains_key("c"));
    assert!(out.removed_links.is_empty());
}

#[test]
fn arrange_rejects_empty_selection() {
    let mut elements = vec![node("a"), node("b")];
    for e in &mut elements {
        e.selected = false;
    }
    let snap = snapshot(elements, vec![Link::new("a", 0, "b", 0)]);
    let err = arrange(&snap, &LayoutConfig::default()).unwrap_err();
    assert!(matches!(err, Error::EmptySelection), "{err}");

    let frames_only = snapshot(vec![Element::frame("f")], Vec::new());
    let err = arrange(&frames_only, &LayoutConfig::default()).unwrap_err();
    assert!(matches!(err, Error::EmptySelection), "{err}");
}

#[test]
fn arrange_rejects_cyclic_links() {
    let snap = snapshot(
        vec![node("a"), node("b"), node("c")],
        vec![
            Link::new("a", 0, "b", 0),
            Link::new("b", 0, "c", 0),
            Link::new("c", 0, "a", 0),
        ],
    );
    let err = arrange(&snap, &LayoutConfig::default()).unwrap_err();
    assert!(matches!(err, Error::CyclicLinks { .. }), "{err}");
}

#[test]
fn arrange_ignores_hidden_and_invalid_links_when_checking_for_cycles() {
    let mut back = Link::new("b", 0, "a", 0);
    back.valid = false;
    let mut hidden = Link::new("b", 1, "a", 1);
    hidden.hidden = true;
    let snap = snapshot(
        vec![node("a"), node("b")],
        vec![Link::new("a", 0, "b", 0), back, hidden],
    );
    let out = arrange(&snap, &LayoutConfig::default()).expect("arranged");
    assert!(out.positions["a"].x < out.positions["b"].x);
}

#[test]
fn arrange_rejects_malformed_snapshots() {
    let config = LayoutConfig::default();

    let orphan = snapshot(vec![node("a").with_parent("missing")], Vec::new());
    let err = arrange(&orphan, &config).unwrap_err();
    assert!(
        matches!(&err, Error::UndefinedParent { id, parent } if id == "a" && parent == "missing"),
        "{err}"
    );

    let dangling = snapshot(vec![node("a"), node("b")], vec![Link::new("a", 5, "b", 0)]);
    let err = arrange(&dangling, &config).unwrap_err();
    assert!(matches!(err, Error::DanglingLink { from_socket: 5, .. }), "{err}");

    let unknown = snapshot(vec![node("a")], vec![Link::new("a", 0, "ghost", 0)]);
    let err = arrange(&unknown, &config).unwrap_err();
    assert!(matches!(err, Error::DanglingLink { .. }), "{err}");

    let duplicate = snapshot(vec![node("a"), node("a")], Vec::new());
    let err = arrange(&duplicate, &config).unwrap_err();
    assert!(matches!(err, Error::DuplicateElement { .. }), "{err}");

    let cyclic_frames = snapshot(
        vec![
            Element::frame("f").with_parent("g"),
            Element::frame("g").with_parent("f"),
            node("a").with_parent("f"),
        ],
        Vec::new(),
    );
    let err = arrange(&cyclic_frames, &config).unwrap_err();
    assert!(matches!(err, Error::CyclicParent { .. }), "{err}");
}

#[test]
fn arrange_rejects_invalid_config() {
    let snap = snapshot(vec![node("a")], Vec::new());
    let config = LayoutConfig {
        iterations: 0,
        ..LayoutConfig::default()
    };
    let err = arrange(&snap, &config).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }), "{err}");
}

#[test]
fn arrange_without_reroutes_keeps_links_as_they_are() {
    let snap = snapshot(
        vec![node("a"), node("b"), node("c")],
        vec![
            Link::new("a", 0, "b", 0),
            Link::new("b", 0, "c", 0),
            Link::new("a", 1, "c", 1),
        ],
    );
    let config = LayoutConfig {
        add_reroutes: false,
        ..LayoutConfig::default()
    };
    let out = arrange(&snap, &config).expect("arranged");

    assert!(out.added_reroutes.is_empty());
    assert!(out.added_links.is_empty());
    assert!(out.removed_links.is_empty());
    assert_eq!(out.positions.len(), 3);
}

#[test]
fn long_links_stay_connected_through_new_reroutes() {
    let mut snap = snapshot(
        vec![node("a"), node("b"), node("c"), node("d")],
        vec![
            Link::new("a", 0, "b", 0),
            Link::new("b", 0, "c", 0),
            Link::new("c", 0, "d", 0),
            Link::new("a", 1, "d", 1),
        ],
    );
    let out = arrange(&snap, &LayoutConfig::default()).expect("arranged");
    for reroute in &out.added_reroutes {
        assert!(reroute.is_reroute());
        assert!(!snap.elements.iter().any(|e| e.id == reroute.id));
    }

    snap.apply(&out);
    assert_eq!(follow(&snap, "a", 1), Some(("d".to_string(), 1)));
    assert_eq!(follow(&snap, "a", 0), Some(("b".to_string(), 0)));
    assert_eq!(follow(&snap, "c", 0), Some(("d".to_string(), 0)));
}

#[test]
fn reroutes_of_a_link_leaving_a_frame_stay_outside_when_asked() {
    let mut snap = snapshot(
        vec![
            Element::frame("f"),
            node("a").with_parent("f"),
            node("b").with_parent("f"),
            node("c").with_parent("f"),
            node("d"),
        ],
        vec![
            Link::new("a", 0, "b", 0),
            Link::new("b", 0, "c", 0),
            Link::new("c", 0, "d", 0),
            Link::new("a", 1, "d", 1),
        ],
    );
    let config = LayoutConfig {
        keep_reroutes_outside_frames: true,
        ..LayoutConfig::default()
    };
    let out = arrange(&snap, &config).expect("arranged");
    for reroute in &out.added_reroutes {
        assert_eq!(reroute.parent, None, "{} was put inside a frame", reroute.id);
    }

    snap.apply(&out);
    assert_eq!(follow(&snap, "a", 1), Some(("d".to_string(), 1)));
}

#[test]
fn redundant_reroutes_are_removed() {
    let snap = snapshot(
        vec![node("a"), Element::reroute("r", Vec2::ZERO, 8.0), node("b")],
        vec![Link::new("a", 0, "r", 0), Link::new("r", 0, "b", 0)],
    );
    let out = arrange(&snap, &LayoutConfig::default()).expect("arranged");

    assert_eq!(out.removed, vec!["r".to_string()]);
    assert!(out.added_links.iter().any(|l| l.key() == ("a", 0, "b", 0)));

    let mut applied = snap.clone();
    applied.apply(&out);
    assert!(applied.element("r").is_none());
    assert!(applied.links.iter().any(|l| l.key() == ("a", 0, "b", 0)));
    assert!(!applied.links.iter().any(|l| l.from == "r" || l.to == "r"));
}

#[test]
fn labelled_reroutes_survive() {
    let mut reroute = Element::reroute("r", Vec2::ZERO, 8.0);
    reroute.label = "keep me".to_string();
    let snap = snapshot(
        vec![node("a"), reroute, node("b")],
        vec![Link::new("a", 0, "r", 0), Link::new("r", 0, "b", 0)],
    );
    let out = arrange(&snap, &LayoutConfig::default()).expect("arranged");

    assert!(out.removed.is_empty());
    assert!(out.positions.contains_key("r"));
    let (a, r, b) = (out.positions["a"], out.positions["r"], out.positions["b"]);
    assert!(a.x < r.x && r.x < b.x);
}

#[test]
fn reroutes_linked_to_unselected_elements_survive() {
    let mut outside = node("z");
    outside.selected = false;
    let snap = snapshot(
        vec![node("a"), Element::reroute("r", Vec2::ZERO, 8.0), node("b"), outside],
        vec![
            Link::new("a", 0, "r", 0),
            Link::new("r", 0, "b", 0),
            Link::new("r", 0, "z", 0),
        ],
    );
    let out = arrange(&snap, &LayoutConfig::default()).expect("arranged");
    assert!(!out.removed.contains(&"r".to_string()));
}

#[test]
fn frames_enclose_their_members() {
    let mut frame = Element::frame("f");
    frame.label = "Group".to_string();
    let snap = snapshot(
        vec![
            frame,
            node("a"),
            node("b").with_parent("f"),
            node("c").with_parent("f"),
            node("d"),
        ],
        vec![
            Link::new("a", 0, "b", 0),
            Link::new("b", 0, "c", 0),
            Link::new("c", 0, "d", 0),
        ],
    );
    let config = LayoutConfig::default();
    let out = arrange(&snap, &config).expect("arranged");

    let bounds = out.frames["f"];
    for id in ["b", "c"] {
        let p = out.positions[id];
        assert!(bounds.x <= p.x - config.frame_padding + 1e-6, "{id}");
        assert!(bounds.x + bounds.width >= p.x + 140.0 + config.frame_padding - 1e-6, "{id}");
        assert!(bounds.y >= p.y + config.frame_padding - 1e-6, "{id}");
        assert!(bounds.y - bounds.height <= p.y - 100.0 - config.frame_padding + 1e-6, "{id}");
    }
    for id in ["a", "d"] {
        let p = out.positions[id];
        assert!(p.x + 140.0 <= bounds.x || p.x >= bounds.x + bounds.width, "{id} inside frame");
    }

    let mut applied = snap.clone();
    applied.apply(&out);
    let f = applied.element("f").expect("frame");
    assert_eq!(f.location, Vec2::new(bounds.x, bounds.y));
    assert_eq!(f.width, bounds.width);
}

#[test]
fn multi_input_order_survives_arrangement() {
    let mut target = node("t");
    target.inputs = vec![SocketInfo {
        offset_y: -40.0,
        multi_input: true,
        ..SocketInfo::default()
    }];
    let mut first = Link::new("a", 0, "t", 0);
    first.multi_input_sort_id = Some(1);
    let mut second = Link::new("b", 0, "t", 0);
    second.multi_input_sort_id = Some(0);
    let mut third = Link::new("c", 0, "t", 0);
    third.multi_input_sort_id = Some(2);
    let mut snap = snapshot(
        vec![node("a"), node("b"), node("c"), target],
        vec![first, second, third],
    );

    let out = arrange(&snap, &LayoutConfig::default()).expect("arranged");
    let order = out
        .multi_input_orders
        .iter()
        .find(|o| o.element == "t" && o.socket == 0)
        .expect("order saved");
    assert_eq!(order.sources.len(), 3);

    snap.apply(&out);
    let sort_id = |from: &str| {
        snap.links
            .iter()
            .find(|l| l.from == from && l.to == "t")
            .and_then(|l| l.multi_input_sort_id)
    };
    assert_eq!(sort_id("a"), Some(1));
    assert_eq!(sort_id("b"), Some(0));
    assert_eq!(sort_id("c"), Some(2));
}
