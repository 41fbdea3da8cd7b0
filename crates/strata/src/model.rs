//! Layout-time node, socket, edge and cluster types.
//!
//! Everything here refers to other layout objects through stable integer handles: nodes and edges
//! by [`NodeIx`]/[`EdgeIx`] into the arena graph, clusters by [`ClusterId`] into the cluster table.

use strata_graph::NodeIx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterId(pub u32);

impl ClusterId {
    /// Virtual cluster containing everything that is not inside a frame.
    pub const ROOT: Self = Self(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

/// Index into [`crate::context::LayoutContext::element_ids`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementIx(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Backed by a host element.
    Real { element: ElementIx, reroute: bool },
    /// Routing or padding placeholder. Fillers keep a frame's rank span contiguous and are dropped
    /// after crossing minimization.
    Dummy { filler: bool },
    /// A contracted chain of stacked nodes.
    Stack,
    /// Marks the upper or lower edge of a frame within one column.
    VerticalBorder,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub cluster: ClusterId,
    pub width: f64,
    pub height: f64,
    pub rank: usize,
    /// Column index once columns are built; `None` for bend points.
    pub col: Option<usize>,
    /// Left edge.
    pub x: f64,
    /// Top edge (y grows upwards).
    pub y: f64,
    /// Whether the host element is drawn collapsed.
    pub collapsed: bool,
    input_offsets: Vec<f64>,
    output_offsets: Vec<f64>,
}

impl Node {
    pub fn new(kind: NodeKind, cluster: ClusterId, width: f64, height: f64) -> Self {
        Self {
            kind,
            cluster,
            width,
            height,
            rank: 0,
            col: None,
            x: 0.0,
            y: 0.0,
            collapsed: false,
            input_offsets: Vec::new(),
            output_offsets: Vec::new(),
        }
    }

    pub fn dummy(cluster: ClusterId, rank: usize, size: f64) -> Self {
        Self {
            rank,
            ..Self::new(NodeKind::Dummy { filler: false }, cluster, size, size)
        }
    }

    pub fn with_offsets(mut self, inputs: Vec<f64>, outputs: Vec<f64>) -> Self {
        self.input_offsets = inputs;
        self.output_offsets = outputs;
        self
    }

    /// Reroutes, routing dummies and vertical borders are all point-like connectors.
    pub fn is_reroute(&self) -> bool {
        match self.kind {
            NodeKind::Real { reroute, .. } => reroute,
            NodeKind::Dummy { .. } | NodeKind::VerticalBorder => true,
            NodeKind::Stack => false,
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self.kind, NodeKind::Real { .. })
    }

    pub fn element(&self) -> Option<ElementIx> {
        match self.kind {
            NodeKind::Real { element, .. } => Some(element),
            _ => None,
        }
    }

    pub fn is_filler(&self) -> bool {
        matches!(self.kind, NodeKind::Dummy { filler: true })
    }

    pub fn is_vertical_border(&self) -> bool {
        self.kind == NodeKind::VerticalBorder
    }

    pub fn is_stack(&self) -> bool {
        self.kind == NodeKind::Stack
    }

    /// Socket offset relative to the top edge; 0 for unknown sockets.
    pub fn socket_offset(&self, is_output: bool, idx: usize) -> f64 {
        if self.is_reroute() {
            return 0.0;
        }
        let offsets = if is_output {
            &self.output_offsets
        } else {
            &self.input_offsets
        };
        offsets.get(idx).copied().unwrap_or(0.0)
    }

    pub fn set_socket_offset(&mut self, is_output: bool, idx: usize, offset: f64) {
        let offsets = if is_output {
            &mut self.output_offsets
        } else {
            &mut self.input_offsets
        };
        if offsets.len() <= idx {
            offsets.resize(idx + 1, 0.0);
        }
        offsets[idx] = offset;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Socket {
    pub owner: NodeIx,
    pub idx: usize,
    pub is_output: bool,
}

impl Socket {
    pub const fn input(owner: NodeIx, idx: usize) -> Self {
        Self {
            owner,
            idx,
            is_output: false,
        }
    }

    pub const fn output(owner: NodeIx, idx: usize) -> Self {
        Self {
            owner,
            idx,
            is_output: true,
        }
    }

    pub fn with_owner(self, owner: NodeIx) -> Self {
        Self { owner, ..self }
    }
}

/// A link between two sockets. The edge runs from `from.owner` to `to.owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: Socket,
    pub to: Socket,
}

impl Edge {
    pub fn new(from: Socket, to: Socket) -> Self {
        Self { from, to }
    }

    /// Socket of this edge owned by `v`.
    pub fn socket_of(&self, v: NodeIx) -> Socket {
        if self.from.owner == v { self.from } else { self.to }
    }

    /// Socket of this edge not owned by `v`.
    pub fn opposite_socket(&self, v: NodeIx) -> Socket {
        if self.from.owner == v { self.to } else { self.from }
    }
}

#[derive(Debug, Clone)]
pub struct Cluster {
    /// Backing frame element; `None` for the root.
    pub frame: Option<ElementIx>,
    pub parent: Option<ClusterId>,
    pub nesting_level: usize,
    /// Lowest and highest rank of any descendant node.
    pub left_rank: usize,
    pub right_rank: usize,
    /// Extra height reserved above the frame's first row for its label.
    pub label_height: f64,
}

impl Cluster {
    pub fn root() -> Self {
        Self {
            frame: None,
            parent: None,
            nesting_level: 0,
            left_rank: 0,
            right_rank: 0,
            label_height: 0.0,
        }
    }

    pub fn is_frame(&self) -> bool {
        self.frame.is_some()
    }
}
