use strata_graph::Graph;

#[test]
fn add_and_remove_nodes_keeps_handles_stable() {
    let mut g: Graph<&str, ()> = Graph::new();
    let a = g.add_node("a");
    let b = g.add_node("b");
    let c = g.add_node("c");

    assert_eq!(g.remove_node(b), Some("b"));
    assert_eq!(g.node_count(), 2);
    assert_eq!(g.node(a), Some(&"a"));
    assert_eq!(g.node(c), Some(&"c"));
    assert_eq!(g.node(b), None);

    let d = g.add_node("d");
    assert_ne!(d, b);
    assert_eq!(g.node_ids(), vec![a, c, d]);
}

#[test]
fn removing_a_node_removes_its_incident_edges() {
    let mut g: Graph<(), u8> = Graph::new();
    let a = g.add_node(());
    let b = g.add_node(());
    let c = g.add_node(());
    let ab = g.add_edge(a, b, 1).unwrap();
    let bc = g.add_edge(b, c, 2).unwrap();
    let ac = g.add_edge(a, c, 3).unwrap();

    g.remove_node(b);

    assert_eq!(g.edge_count(), 1);
    assert!(!g.contains_edge(ab));
    assert!(!g.contains_edge(bc));
    assert_eq!(g.edge(ac), Some(&3));
    assert_eq!(g.out_edges(a), &[ac]);
    assert_eq!(g.in_edges(c), &[ac]);
}

#[test]
fn parallel_edges_are_kept_in_insertion_order() {
    let mut g: Graph<(), &str> = Graph::new();
    let a = g.add_node(());
    let b = g.add_node(());
    let e1 = g.add_edge(a, b, "first").unwrap();
    let e2 = g.add_edge(a, b, "second").unwrap();

    assert_eq!(g.edges_connecting(a, b), vec![e1, e2]);
    assert_eq!(g.successors(a).collect::<Vec<_>>(), vec![b, b]);
    assert_eq!(g.out_degree(a), 2);
    assert_eq!(g.in_degree(b), 2);

    g.remove_edge(e1);
    assert_eq!(g.find_edge(a, b), Some(e2));
}

#[test]
fn add_edge_with_a_missing_endpoint_is_rejected() {
    let mut g: Graph<(), ()> = Graph::new();
    let a = g.add_node(());
    let b = g.add_node(());
    g.remove_node(b);

    assert_eq!(g.add_edge(a, b, ()), None);
    assert_eq!(g.edge_count(), 0);
}

#[test]
fn endpoints_and_degrees_are_reported() {
    let mut g: Graph<(), ()> = Graph::new();
    let a = g.add_node(());
    let b = g.add_node(());
    let e = g.add_edge(a, b, ()).unwrap();

    assert_eq!(g.endpoints(e), Some((a, b)));
    assert_eq!(g.first_successor(a), Some(b));
    assert_eq!(g.first_predecessor(b), Some(a));
    assert_eq!(g.degree(a), 1);
    assert!(!g.is_isolated(b));
}
