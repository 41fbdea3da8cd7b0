//! Barycenters of free vertices and the constraints between collapsed clusters.

use super::cross_count::two_layer_cross_count;
use super::reduction_graph::ReductionGraph;
use super::{VSocket, Vertex};
use crate::cluster_graph::ClusterGraph;
use crate::geom::fmean;
use rand::Rng;
use rand::rngs::StdRng;
use rustc_hash::FxHashMap as HashMap;

pub type Barycenters = HashMap<Vertex, f64>;

/// Sorts the fixed side by the current column order, with each border pair wrapped tightly
/// around the nodes of its cluster.
pub fn sort_expanded_fixed(rg: &mut ReductionGraph, cg: &ClusterGraph) {
    let mut pos: HashMap<Vertex, f64> = cg.columns[rg.fixed_col]
        .iter()
        .enumerate()
        .map(|(i, &v)| (Vertex::Node(v), i as f64))
        .collect();

    for (upper, lower, nodes) in &rg.border_pairs {
        let positions = nodes.iter().filter_map(|&v| pos.get(&Vertex::Node(v)).copied());
        let min = positions.clone().fold(f64::INFINITY, f64::min);
        let max = positions.fold(f64::NEG_INFINITY, f64::max);
        pos.insert(*upper, min - 0.1);
        pos.insert(*lower, max + 0.1);
    }

    rg.expanded_fixed.sort_by(|a, b| {
        let (pa, pb) = (
            pos.get(a).copied().unwrap_or(f64::INFINITY),
            pos.get(b).copied().unwrap_or(f64::INFINITY),
        );
        pa.total_cmp(&pb)
    });
}

/// Spreads the sockets of every fixed vertex evenly inside the vertex's slot.
pub fn socket_ranks(rg: &ReductionGraph, forwards: bool) -> HashMap<VSocket, f64> {
    let mut ranks = HashMap::default();
    for (v, sockets) in &rg.fixed_sockets {
        let Some(i) = rg.expanded_fixed.iter().position(|w| w == v) else {
            continue;
        };
        let mut incr = 1.0 / (sockets.len() + 1) as f64;
        if forwards {
            incr = -incr;
        }
        let mut rank = (i + 1) as f64;
        for &s in sockets {
            rank += incr;
            ranks.insert(s, rank);
        }
    }
    ranks
}

pub fn random_perturbation(rng: &mut StdRng) -> f64 {
    let amount: f64 = rng.gen_range(-1.0..1.0);
    rng.gen_range(0.0..1.0) * amount - amount / 2.0
}

pub fn calc_barycenters(
    rg: &ReductionGraph,
    ranks: &HashMap<VSocket, f64>,
    barycenters: &mut Barycenters,
    rng: &mut StdRng,
) {
    for &w in &rg.reduced_free {
        let Some(sockets) = rg.free_sockets.get(&w) else {
            continue;
        };
        if sockets.is_empty() {
            continue;
        }
        let mean = fmean(sockets.iter().map(|s| ranks.get(s).copied().unwrap_or(0.0)));
        barycenters.insert(w, mean + random_perturbation(rng));
    }
}

/// Gives every vertex without neighbours a barycenter: a random one on the first sweep,
/// otherwise one between its column neighbours.
pub fn fill_in_unknown_barycenters(
    col: &[Vertex],
    barycenters: &mut Barycenters,
    is_first_sweep: bool,
    rng: &mut StdRng,
) {
    if is_first_sweep {
        let max_b = col
            .iter()
            .filter_map(|v| barycenters.get(v).copied())
            .fold(None, |acc: Option<f64>, b| Some(acc.map_or(b, |a| a.max(b))))
            .unwrap_or(0.0)
            + 2.0;
        for &v in col {
            if barycenters.contains_key(&v) {
                continue;
            }
            let b = rng.gen_range(0.0..1.0) * max_b - 1.0 + random_perturbation(rng);
            barycenters.insert(v, b);
        }
        return;
    }

    for (i, &v) in col.iter().enumerate() {
        if barycenters.contains_key(&v) {
            continue;
        }
        let prev_b = if i == 0 {
            0.0
        } else {
            barycenters.get(&col[i - 1]).copied().unwrap_or(0.0)
        };
        let next_b = col[i + 1..]
            .iter()
            .find_map(|w| barycenters.get(w).copied())
            .unwrap_or(prev_b + 1.0);
        let b = (prev_b + next_b) / 2.0 + random_perturbation(rng);
        barycenters.insert(v, b);
    }
}

struct Group {
    members: Vec<Vertex>,
    barycenter: f64,
    degree: usize,
}

/// Enforces the given order of the constrained clusters.
///
/// Adjacent constrained groups whose barycenters violate the order are coalesced into one
/// group with their degree-weighted barycenter until no violation remains. Afterwards every free
/// vertex gets its final position as barycenter.
pub fn handle_constraints(rg: &ReductionGraph, barycenters: &mut Barycenters) {
    let bary = |b: &Barycenters, v: Vertex| b.get(&v).copied().unwrap_or(0.0);

    let mut path: Vec<Group> = Vec::new();
    if rg.constrained.len() >= 2 {
        path = rg
            .constrained
            .iter()
            .map(|&c| {
                let v = Vertex::Cluster(c);
                Group {
                    members: vec![v],
                    barycenter: bary(barycenters, v),
                    degree: rg.degree.get(&v).copied().unwrap_or(0),
                }
            })
            .collect();
    }

    let violated = |path: &[Group]| {
        path.windows(2)
            .position(|pair| pair[0].barycenter >= pair[1].barycenter)
    };
    // Each merge removes a group, so this ends once a single group is left at the latest.
    while let Some(i) = violated(&path) {
        let t = path.remove(i + 1);
        let s = &mut path[i];
        let degree = s.degree + t.degree;
        s.barycenter = if degree > 0 {
            (s.barycenter * s.degree as f64 + t.barycenter * t.degree as f64) / degree as f64
        } else {
            (s.barycenter + t.barycenter) / 2.0
        };
        s.degree = degree;
        s.members.extend(t.members);
    }

    let in_path = |v: &Vertex| path.iter().any(|g| g.members.contains(v));
    let mut groups: Vec<Group> = rg
        .reduced_free
        .iter()
        .filter(|v| !in_path(v))
        .map(|&v| Group {
            members: vec![v],
            barycenter: bary(barycenters, v),
            degree: 0,
        })
        .collect();
    groups.extend(path);
    groups.sort_by(|a, b| a.barycenter.total_cmp(&b.barycenter));

    for (i, v) in groups.into_iter().flat_map(|g| g.members).enumerate() {
        barycenters.insert(v, i as f64);
    }
}

/// Weighted crossings of the reduction graph under the current barycenters.
pub fn graph_cross_count(rg: &mut ReductionGraph, barycenters: &Barycenters) -> f64 {
    if rg.bipartite.is_empty() {
        return 0.0;
    }

    let mut north = std::mem::take(&mut rg.north);
    let mut south = std::mem::take(&mut rg.south);
    let fixed_pos: HashMap<Vertex, usize> = rg
        .expanded_fixed
        .iter()
        .enumerate()
        .map(|(i, &v)| (v, i))
        .collect();
    let pos = |s: &VSocket| -> f64 {
        if rg.is_free(s.owner) {
            barycenters.get(&s.owner).copied().unwrap_or(0.0)
        } else {
            fixed_pos.get(&s.owner).map(|&i| i as f64).unwrap_or(f64::INFINITY)
        }
    };
    north.sort_by(|a, b| pos(a).total_cmp(&pos(b)));
    south.sort_by(|a, b| pos(a).total_cmp(&pos(b)));

    let north_idx: HashMap<VSocket, usize> = north.iter().enumerate().map(|(i, &s)| (s, i)).collect();
    let south_idx: HashMap<VSocket, usize> = south.iter().enumerate().map(|(i, &s)| (s, i)).collect();

    let index = |m: &HashMap<VSocket, usize>, s: &VSocket| m.get(s).copied().unwrap_or(0);
    rg.bipartite.sort_by_key(|e| index(&south_idx, &e.1));
    rg.bipartite.sort_by_key(|e| index(&north_idx, &e.0));

    let edges: Vec<(usize, usize, f64)> = rg
        .bipartite
        .iter()
        .map(|(n, s, w)| (index(&north_idx, n), index(&south_idx, s), *w))
        .collect();
    let count = two_layer_cross_count(&edges, south.len());

    rg.north = north;
    rg.south = south;
    count
}
