//! Entry points: arrange one snapshot, or every graph of a project.

use crate::build::{build_cluster_graph, save_multi_input_orders};
use crate::columns::{add_columns, add_vertical_border_nodes, remove_fillers};
use crate::config::{LayoutConfig, Origin};
use crate::context::LayoutContext;
use crate::error::{Error, Result};
use crate::geom::{Vec2, fmean};
use crate::normalize::{insert_dummy_nodes, merge_edges};
use crate::order::minimize_crossings;
use crate::position::{assign_x_coords, assign_y_coords};
use crate::rank::compute_ranks;
use crate::realize::realize_layout;
use crate::recenter::recenter;
use crate::reroutes::{align_reroutes_with_sockets, dissolve_dummy_nodes, remove_reroutes};
use crate::routing::route_edges;
use crate::snapshot::{Arrangement, GraphSnapshot};
use crate::stacking::{contract_node_stacks, expand_node_stack};
use serde::{Deserialize, Serialize};
use strata_graph::NodeIx;

/// Lays out the selected elements of `snapshot`.
///
/// The snapshot itself is not modified; apply the returned [`Arrangement`] with
/// [`GraphSnapshot::apply`].
pub fn arrange(snapshot: &GraphSnapshot, config: &LayoutConfig) -> Result<Arrangement> {
    config.validate()?;

    let selected = snapshot
        .elements
        .iter()
        .filter(|e| e.selected && !e.is_frame());
    if selected.clone().next().is_none() {
        return Err(Error::EmptySelection);
    }
    let old_center = Vec2::new(
        fmean(selected.clone().map(|e| e.location.x)),
        fmean(selected.map(|e| e.location.y)),
    );

    let mut ctx = LayoutContext::new(snapshot, config);
    let mut cg = build_cluster_graph(&mut ctx)?;

    save_multi_input_orders(&cg, &mut ctx);
    if config.add_reroutes {
        remove_reroutes(&mut cg, &mut ctx);
    }
    let stacks = if config.stack_collapsed {
        contract_node_stacks(&mut cg, &ctx)
    } else {
        Vec::new()
    };

    compute_ranks(&mut cg);
    merge_edges(&mut cg, config);
    insert_dummy_nodes(&mut cg, config);

    add_columns(&mut cg, &ctx);
    minimize_crossings(&mut cg, &mut ctx);

    add_vertical_border_nodes(&mut cg);
    remove_fillers(&mut cg, &mut ctx);
    assign_y_coords(&mut cg, config);

    if !config.add_reroutes {
        dissolve_dummy_nodes(&mut cg, &mut ctx);
    }
    align_reroutes_with_sockets(&mut cg, &ctx);

    let borders: Vec<NodeIx> = cg
        .g
        .node_labels()
        .filter(|(_, n)| n.is_vertical_border())
        .map(|(v, _)| v)
        .collect();
    cg.remove_nodes(&mut ctx, &borders);
    assign_x_coords(&mut cg, config);
    if config.add_reroutes {
        route_edges(&mut cg, &mut ctx);
    }

    for stack in stacks {
        expand_node_stack(&mut cg, &mut ctx, stack);
    }

    Ok(realize_layout(&mut cg, &mut ctx, old_center))
}

/// A host node graph addressed by name, as visited by the batch operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedGraph {
    pub name: String,
    pub snapshot: GraphSnapshot,
}

#[derive(Debug)]
pub struct BatchFailure {
    pub graph: String,
    pub error: Error,
}

/// Outcome of a batch run. Graphs missing from `failures` were updated in place.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub arranged: Vec<String>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

fn run_batch<F>(graphs: &mut [NamedGraph], mut op: F) -> BatchReport
where
    F: FnMut(&GraphSnapshot) -> Result<Arrangement>,
{
    let mut report = BatchReport::default();
    for graph in graphs.iter_mut() {
        let selection = graph.snapshot.select_all();
        match op(&graph.snapshot) {
            Ok(arrangement) => {
                graph.snapshot.apply(&arrangement);
                report.arranged.push(graph.name.clone());
            }
            Err(error) => {
                tracing::warn!(graph = %graph.name, %error, "graph skipped");
                report.failures.push(BatchFailure {
                    graph: graph.name.clone(),
                    error,
                });
            }
        }
        graph.snapshot.restore_selection(&selection);
    }
    report
}

/// Arranges every element of every graph. A failing graph is reported and left untouched; the
/// remaining graphs are still processed.
pub fn arrange_all(graphs: &mut [NamedGraph], config: &LayoutConfig) -> BatchReport {
    run_batch(graphs, |snapshot| arrange(snapshot, config))
}

/// Recenters every element of every graph around `origin`.
pub fn recenter_all(graphs: &mut [NamedGraph], origin: Origin) -> BatchReport {
    run_batch(graphs, |snapshot| recenter(snapshot, origin))
}
