//! Serializable view of a host node graph and the mutations produced by a layout run.
//!
//! A [`GraphSnapshot`] is everything the engine reads: elements with their geometry, sockets,
//! frame parents and selection state, plus the links between sockets. An [`Arrangement`] is
//! everything the engine writes. Nothing in the snapshot is touched until
//! [`GraphSnapshot::apply`] is called, so a failed layout leaves the host document unchanged.

use crate::error::{Diagnostic, Result};
use crate::geom::{Rect, Vec2};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    #[default]
    Node,
    Frame,
    Reroute,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocketInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Vertical socket position relative to the element's top edge (`<= 0`).
    #[serde(default)]
    pub offset_y: f64,
    /// Whether the socket accepts several ordered links.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub multi_input: bool,
}

fn default_label_size() -> f64 {
    20.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    #[serde(default)]
    pub kind: ElementKind,
    /// Absolute location of the top-left corner.
    #[serde(default)]
    pub location: Vec2,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    /// Id of the frame this element is nested in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<SocketInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<SocketInfo>,
    #[serde(default)]
    pub selected: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub collapsed: bool,
    /// Whether a collapsed element may be stacked with its neighbours.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stackable: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default = "default_label_size")]
    pub label_size: f64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub active_output: bool,
}

impl Element {
    pub fn node(id: impl Into<String>, location: Vec2, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            kind: ElementKind::Node,
            location,
            width,
            height,
            parent: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            selected: true,
            collapsed: false,
            stackable: false,
            label: String::new(),
            label_size: default_label_size(),
            active_output: false,
        }
    }

    pub fn frame(id: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Frame,
            ..Self::node(id, Vec2::ZERO, 0.0, 0.0)
        }
    }

    pub fn reroute(id: impl Into<String>, location: Vec2, size: f64) -> Self {
        Self {
            kind: ElementKind::Reroute,
            inputs: vec![SocketInfo::default()],
            outputs: vec![SocketInfo::default()],
            ..Self::node(id, location, size, size)
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_inputs(mut self, offsets: &[f64]) -> Self {
        self.inputs = offsets.iter().map(|&offset_y| SocketInfo::at(offset_y)).collect();
        self
    }

    pub fn with_outputs(mut self, offsets: &[f64]) -> Self {
        self.outputs = offsets.iter().map(|&offset_y| SocketInfo::at(offset_y)).collect();
        self
    }

    pub fn is_frame(&self) -> bool {
        self.kind == ElementKind::Frame
    }

    pub fn is_reroute(&self) -> bool {
        self.kind == ElementKind::Reroute
    }

    /// Number of input (or output) sockets links may attach to.
    pub fn socket_count(&self, is_output: bool) -> usize {
        match (self.kind, is_output) {
            (ElementKind::Frame, _) => 0,
            (ElementKind::Reroute, _) => 1,
            (ElementKind::Node, true) => self.outputs.len(),
            (ElementKind::Node, false) => self.inputs.len(),
        }
    }
}

impl SocketInfo {
    pub fn at(offset_y: f64) -> Self {
        Self {
            offset_y,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub from: String,
    pub from_socket: usize,
    pub to: String,
    pub to_socket: usize,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    #[serde(default = "default_true")]
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_input_sort_id: Option<u32>,
}

impl Link {
    pub fn new(
        from: impl Into<String>,
        from_socket: usize,
        to: impl Into<String>,
        to_socket: usize,
    ) -> Self {
        Self {
            from: from.into(),
            from_socket,
            to: to.into(),
            to_socket,
            hidden: false,
            valid: true,
            multi_input_sort_id: None,
        }
    }

    pub fn key(&self) -> (&str, usize, &str, usize) {
        (&self.from, self.from_socket, &self.to, self.to_socket)
    }

    fn is_layout_relevant(&self) -> bool {
        self.valid && !self.hidden
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub elements: Vec<Element>,
    #[serde(default)]
    pub links: Vec<Link>,
    /// Id of the active element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<String>,
}

impl GraphSnapshot {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Links that take part in layout: valid and not hidden.
    pub fn layout_links(&self) -> impl Iterator<Item = &Link> + '_ {
        self.links.iter().filter(|l| l.is_layout_relevant())
    }

    /// Selects every element and returns the previous selection flags by id.
    pub fn select_all(&mut self) -> IndexMap<String, bool> {
        self.elements
            .iter_mut()
            .map(|e| (e.id.clone(), std::mem::replace(&mut e.selected, true)))
            .collect()
    }

    /// Restores selection flags returned by [`GraphSnapshot::select_all`]. Elements added since
    /// then are deselected.
    pub fn restore_selection(&mut self, selection: &IndexMap<String, bool>) {
        for e in &mut self.elements {
            e.selected = selection.get(&e.id).copied().unwrap_or(false);
        }
    }

    /// Applies the host mutations of a layout run.
    pub fn apply(&mut self, arrangement: &Arrangement) {
        if !arrangement.removed.is_empty() {
            self.elements
                .retain(|e| !arrangement.removed.iter().any(|id| *id == e.id));
            self.links.retain(|l| {
                !arrangement
                    .removed
                    .iter()
                    .any(|id| *id == l.from || *id == l.to)
            });
        }

        for removed in &arrangement.removed_links {
            if let Some(i) = self.links.iter().position(|l| l.key() == removed.key()) {
                self.links.remove(i);
            }
        }

        self.elements
            .extend(arrangement.added_reroutes.iter().cloned());
        self.links.extend(arrangement.added_links.iter().cloned());

        for e in &mut self.elements {
            if let Some(location) = arrangement.positions.get(&e.id) {
                e.location = *location;
            }
            if let Some(bounds) = arrangement.frames.get(&e.id) {
                e.location = Vec2::new(bounds.x, bounds.y);
                e.width = bounds.width;
                e.height = bounds.height;
            }
        }

        for order in &arrangement.multi_input_orders {
            for source in &order.sources {
                let key = (
                    source.element.as_str(),
                    source.socket,
                    order.element.as_str(),
                    order.socket,
                );
                for link in self.links.iter_mut().filter(|l| l.key() == key) {
                    link.multi_input_sort_id = Some(source.sort_id);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortedSource {
    pub element: String,
    pub socket: usize,
    pub sort_id: u32,
}

/// Link order of one multi-input socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiInputOrder {
    pub element: String,
    pub socket: usize,
    pub sources: Vec<SortedSource>,
}

/// Host mutations computed by one layout invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arrangement {
    /// New absolute location of every moved element.
    pub positions: IndexMap<String, Vec2>,
    /// Reroute elements created for routing nodes.
    pub added_reroutes: Vec<Element>,
    /// Ids of elements deleted by the layout (redundant reroutes).
    pub removed: Vec<String>,
    pub added_links: Vec<Link>,
    pub removed_links: Vec<Link>,
    pub multi_input_orders: Vec<MultiInputOrder>,
    /// Bounds of frames that enclose arranged elements.
    pub frames: IndexMap<String, Rect>,
    pub diagnostics: Vec<Diagnostic>,
}
