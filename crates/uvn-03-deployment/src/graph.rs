//! Backbone edge construction, one function per strategy shape (§4.2).
//!
//! Every builder is handed cells pre-split into `public` and `private`
//! (both already sorted ascending by id, which is what makes every
//! strategy's output deterministic) and returns the unordered edge list.
//! Private cells never gain an edge to another private cell; where a
//! strategy needs to attach them at all, they are round-robined onto the
//! public ring in ascending id order.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared_types::ids::CellId;
use shared_types::settings::StrategyArgs;

use crate::errors::DeploymentError;

pub type Edge = (CellId, CellId);

fn canon(a: CellId, b: CellId) -> Edge {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Attaches every private cell to a public cell, round-robin in ascending
/// id order. Not used by full-mesh, whose private cells dangle by design.
fn attach_privates_round_robin(public: &[CellId], private: &[CellId], edges: &mut BTreeSet<Edge>) {
    if public.is_empty() {
        return;
    }
    for (i, p) in private.iter().enumerate() {
        let anchor = public[i % public.len()];
        edges.insert(canon(*p, anchor));
    }
}

pub fn full_mesh(public: &[CellId], _private: &[CellId]) -> BTreeSet<Edge> {
    let mut edges = BTreeSet::new();
    for i in 0..public.len() {
        for j in (i + 1)..public.len() {
            edges.insert(canon(public[i], public[j]));
        }
    }
    edges
}

pub fn circular(public: &[CellId], private: &[CellId]) -> BTreeSet<Edge> {
    let mut edges = BTreeSet::new();
    let n = public.len();
    if n >= 2 {
        for i in 0..n {
            edges.insert(canon(public[i], public[(i + 1) % n]));
        }
    }
    attach_privates_round_robin(public, private, &mut edges);
    edges
}

pub fn crossed(public: &[CellId], private: &[CellId]) -> BTreeSet<Edge> {
    let mut edges = circular(public, &[]);
    let n = public.len();
    if n >= 4 {
        for i in 0..n {
            edges.insert(canon(public[i], public[(i + n / 2) % n]));
        }
    }
    attach_privates_round_robin(public, private, &mut edges);
    edges
}

/// A seeded, ring-anchored random graph: start from a connectivity-
/// guaranteeing ring, then add random chords until every public cell has
/// reached (approximately) the requested degree. `strategy_args` carries
/// `"seed"` (u64, default 0) and `"degree"` (u64, default 3).
pub fn random(public: &[CellId], private: &[CellId], args: &StrategyArgs) -> Result<BTreeSet<Edge>, DeploymentError> {
    if public.is_empty() {
        return Err(DeploymentError::NoPublicCells);
    }
    let seed = args.get("seed").and_then(|v| v.as_u64()).unwrap_or(0);
    let degree = args.get("degree").and_then(|v| v.as_u64()).unwrap_or(3).max(2) as usize;
    let mut edges = circular(public, &[]);
    let n = public.len();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut degree_of = vec![2usize; n];
    if n <= 2 {
        degree_of = vec![edges.len(); n];
    }

    let target = degree.min(n.saturating_sub(1));
    let mut attempts = 0;
    while degree_of.iter().any(|&d| d < target) && attempts < n * n * 4 {
        attempts += 1;
        let i = rng.gen_range(0..n);
        let j = rng.gen_range(0..n);
        if i == j || degree_of[i] >= target || degree_of[j] >= target {
            continue;
        }
        let e = canon(public[i], public[j]);
        if edges.insert(e) {
            degree_of[i] += 1;
            degree_of[j] += 1;
        }
    }
    attach_privates_round_robin(public, private, &mut edges);
    Ok(edges)
}

/// Edge list supplied verbatim: `{"edges": [[id, id], ...]}`.
pub fn static_edges(
    all_cells: &BTreeSet<CellId>,
    args: &StrategyArgs,
) -> Result<BTreeSet<Edge>, DeploymentError> {
    let raw = args.get("edges").ok_or(DeploymentError::MalformedEdgeList)?;
    let list = raw.as_array().ok_or(DeploymentError::MalformedEdgeList)?;
    let mut edges = BTreeSet::new();
    for pair in list {
        let pair = pair.as_array().ok_or(DeploymentError::MalformedEdgeList)?;
        if pair.len() != 2 {
            return Err(DeploymentError::MalformedEdgeList);
        }
        let a = pair[0].as_u64().ok_or(DeploymentError::MalformedEdgeList)? as u32;
        let b = pair[1].as_u64().ok_or(DeploymentError::MalformedEdgeList)? as u32;
        let a = CellId::from(a);
        let b = CellId::from(b);
        if !all_cells.contains(&a) {
            return Err(DeploymentError::UnknownCell(a));
        }
        if !all_cells.contains(&b) {
            return Err(DeploymentError::UnknownCell(b));
        }
        if a != b {
            edges.insert(canon(a, b));
        }
    }
    Ok(edges)
}
