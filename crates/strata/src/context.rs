//! Per-invocation state shared by the pipeline stages.

use crate::config::LayoutConfig;
use crate::error::Diagnostic;
use crate::model::{ElementIx, Socket};
use crate::snapshot::{Element, GraphSnapshot};
use indexmap::IndexMap;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rustc_hash::FxHashSet as HashSet;
use strata_graph::NodeIx;

/// Seed the random source is reset to at the start of every invocation.
pub const SEED: u64 = 0;

/// Saved link order of one multi-input socket: the original source socket of each link (traced
/// back through reroutes) and its sort id.
pub type SortIds = Vec<(Socket, u32)>;

pub struct LayoutContext<'a> {
    pub config: &'a LayoutConfig,
    pub snapshot: &'a GraphSnapshot,
    /// Host ids by [`ElementIx`]: the snapshot's elements followed by reroutes created during
    /// this invocation.
    pub element_ids: Vec<String>,
    pub rng: StdRng,
    pub multi_input_sort_ids: IndexMap<Socket, SortIds>,
    /// Elements with at least one layout link to an unselected element.
    pub linked_to_unselected: HashSet<ElementIx>,
    pub removed: Vec<ElementIx>,
    pub diagnostics: Vec<Diagnostic>,
    taken_ids: HashSet<String>,
}

impl<'a> LayoutContext<'a> {
    pub fn new(snapshot: &'a GraphSnapshot, config: &'a LayoutConfig) -> Self {
        let element_ids: Vec<String> = snapshot.elements.iter().map(|e| e.id.clone()).collect();
        let taken_ids = element_ids.iter().cloned().collect();
        Self {
            config,
            snapshot,
            element_ids,
            rng: StdRng::seed_from_u64(SEED),
            multi_input_sort_ids: IndexMap::new(),
            linked_to_unselected: HashSet::default(),
            removed: Vec::new(),
            diagnostics: Vec::new(),
            taken_ids,
        }
    }

    /// Snapshot element behind `ix`; `None` for reroutes created by this invocation.
    pub fn element(&self, ix: ElementIx) -> Option<&'a Element> {
        self.snapshot.elements.get(ix.0)
    }

    pub fn element_id(&self, ix: ElementIx) -> &str {
        self.element_ids.get(ix.0).map(String::as_str).unwrap_or("")
    }

    /// Registers a new reroute element and returns its index. Ids follow the host's
    /// `Reroute`, `Reroute.001`, ... convention.
    pub fn new_reroute_element(&mut self) -> ElementIx {
        let mut id = "Reroute".to_string();
        let mut n = 0;
        while self.taken_ids.contains(&id) {
            n += 1;
            id = format!("Reroute.{n:03}");
        }
        self.taken_ids.insert(id.clone());
        self.element_ids.push(id);
        ElementIx(self.element_ids.len() - 1)
    }

    pub fn is_new_element(&self, ix: ElementIx) -> bool {
        ix.0 >= self.snapshot.elements.len()
    }

    /// Whether `v` is the original source of any saved multi-input order.
    pub fn is_multi_input_base(&self, v: NodeIx) -> bool {
        self.multi_input_sort_ids
            .values()
            .any(|ids| ids.iter().any(|(s, _)| s.owner == v))
    }

    /// Rewrites saved sockets after a node was re-inserted under a new handle.
    pub fn remap_node(&mut self, old: NodeIx, new: NodeIx) {
        let remap = |s: Socket| if s.owner == old { s.with_owner(new) } else { s };
        let entries: Vec<(Socket, SortIds)> = self.multi_input_sort_ids.drain(..).collect();
        for (target, ids) in entries {
            let ids = ids.into_iter().map(|(s, id)| (remap(s), id)).collect();
            self.multi_input_sort_ids.insert(remap(target), ids);
        }
    }
}
