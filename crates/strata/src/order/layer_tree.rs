use super::Vertex;
use crate::cluster_graph::ClusterGraph;
use crate::model::ClusterId;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::collections::VecDeque;
use strata_graph::NodeIx;

/// The part of the nesting tree spanned by one column: its nodes plus all their ancestor
/// clusters.
#[derive(Debug, Clone)]
pub struct LayerTree {
    pub col: usize,
    children: HashMap<ClusterId, Vec<Vertex>>,
    /// Clusters in breadth-first order from the root, so parents precede children.
    pub clusters: Vec<ClusterId>,
    members: HashSet<ClusterId>,
}

impl LayerTree {
    pub fn build(cg: &ClusterGraph, col: usize) -> Self {
        let mut children: HashMap<ClusterId, Vec<Vertex>> = HashMap::default();
        let mut members: HashSet<ClusterId> = HashSet::default();
        for &v in &cg.columns[col] {
            let mut child = Vertex::Node(v);
            let mut c = cg.cluster_of(v);
            loop {
                children.entry(c).or_default().push(child);
                if !members.insert(c) {
                    break;
                }
                let Some(parent) = cg.parent(c) else {
                    break;
                };
                child = Vertex::Cluster(c);
                c = parent;
            }
        }

        let mut clusters = Vec::with_capacity(members.len());
        let mut queue: VecDeque<ClusterId> = VecDeque::new();
        if members.contains(&ClusterId::ROOT) {
            queue.push_back(ClusterId::ROOT);
        }
        while let Some(c) = queue.pop_front() {
            clusters.push(c);
            for child in children.get(&c).into_iter().flatten() {
                if let Vertex::Cluster(child) = *child {
                    queue.push_back(child);
                }
            }
        }

        Self {
            col,
            children,
            clusters,
            members,
        }
    }

    pub fn contains(&self, c: ClusterId) -> bool {
        self.members.contains(&c)
    }

    pub fn children(&self, c: ClusterId) -> &[Vertex] {
        self.children.get(&c).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Vertices below `c` in breadth-first order, excluding `c`.
    fn bfs(&self, c: ClusterId) -> impl Iterator<Item = Vertex> + '_ {
        let mut queue: VecDeque<Vertex> = self.children(c).iter().copied().collect();
        std::iter::from_fn(move || {
            let v = queue.pop_front()?;
            if let Vertex::Cluster(c) = v {
                queue.extend(self.children(c).iter().copied());
            }
            Some(v)
        })
    }

    pub fn descendant_nodes(&self, c: ClusterId) -> Vec<NodeIx> {
        self.bfs(c)
            .filter_map(|v| match v {
                Vertex::Node(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn descendant_clusters(&self, c: ClusterId) -> Vec<ClusterId> {
        self.bfs(c)
            .filter_map(|v| match v {
                Vertex::Cluster(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Closest node below `c`.
    pub fn first_node(&self, c: ClusterId) -> Option<NodeIx> {
        self.bfs(c).find_map(|v| match v {
            Vertex::Node(v) => Some(v),
            _ => None,
        })
    }
}

/// Child of `h` on the path from `h` down to node `t`.
pub fn child_towards(cg: &ClusterGraph, h: ClusterId, t: NodeIx) -> Option<Vertex> {
    let mut child = Vertex::Node(t);
    let mut c = cg.cluster_of(t);
    while c != h {
        child = Vertex::Cluster(c);
        c = cg.parent(c)?;
    }
    Some(child)
}
