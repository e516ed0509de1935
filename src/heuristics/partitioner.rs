use crate::engine::OccurrenceManager;
use crate::{Literal, Var};
use rustc_hash::{FxHashMap, FxHashSet};
use std::str::FromStr;

/// The graph the partitioning heuristic works on.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PartitionerKind {
    /// No partitioning: the priority list stays empty.
    No,
    /// Separator of the dual graph (one vertex per clause).
    ClauseBipartite,
    /// Separator of the primal graph (one vertex per variable).
    VarBipartite,
}

impl FromStr for PartitionerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NO" => Ok(Self::No),
            "CB" => Ok(Self::ClauseBipartite),
            "VB" => Ok(Self::VarBipartite),
            _ => Err(anyhow::anyhow!(r#"unknown partitioner "{s}""#)),
        }
    }
}

/// The partitioning configuration.
#[derive(Copy, Clone, Debug)]
pub struct PartitionerConfig {
    /// The graph to separate.
    pub kind: PartitionerKind,
    /// Reduce the primal graph before partitioning. Only meaningful for an
    /// external hypergraph partitioner; the built-in separator ignores it.
    pub reduce_primal_graph: bool,
    /// Simplify the primal graph through literal equivalences. Only
    /// meaningful for an external hypergraph partitioner.
    pub equiv_simplification: bool,
}

impl Default for PartitionerConfig {
    fn default() -> Self {
        Self {
            kind: PartitionerKind::ClauseBipartite,
            reduce_primal_graph: false,
            equiv_simplification: false,
        }
    }
}

/// Computes cut sets of the residual formula's primal or dual graph.
///
/// The cut set of a component becomes the priority list of its decision
/// nodes: branching inside a separator first tends to disconnect the
/// component early. This is a stand-in for an external hypergraph
/// partitioner, computing a breadth-first layer separator: the BFS layer
/// whose removal splits the vertices most evenly.
pub struct Partitioner {
    config: PartitionerConfig,
    n_calls: u64,
}

impl Partitioner {
    /// Builds the partitioner matching the configuration, or `None` when
    /// partitioning is disabled.
    #[must_use]
    pub fn from_config(config: PartitionerConfig) -> Option<Self> {
        match config.kind {
            PartitionerKind::No => None,
            _ => {
                if config.reduce_primal_graph || config.equiv_simplification {
                    log::debug!(
                        "primal-graph reduction options are ignored by the built-in separator"
                    );
                }
                Some(Self { config, n_calls: 0 })
            }
        }
    }

    /// Returns the number of partitions computed so far.
    #[must_use]
    pub fn n_calls(&self) -> u64 {
        self.n_calls
    }

    /// Computes the cut set of the component, to be used as a priority list.
    ///
    /// The returned variables belong to the component; the list may be empty
    /// when the component has no useful separator.
    pub fn compute_partition(&mut self, component: &[Var], occ: &OccurrenceManager) -> Vec<Var> {
        self.n_calls += 1;
        match self.config.kind {
            PartitionerKind::No => Vec::new(),
            PartitionerKind::VarBipartite => primal_separator(component, occ),
            PartitionerKind::ClauseBipartite => dual_separator(component, occ),
        }
    }
}

/// BFS layering of the primal graph restricted to the component; returns the
/// most balanced layer.
fn primal_separator(component: &[Var], occ: &OccurrenceManager) -> Vec<Var> {
    let start = *component
        .iter()
        .max_by_key(|v| occ.n_clauses_with_var(**v))
        .expect("a non-empty component");
    let mut dist: FxHashMap<Var, usize> = FxHashMap::default();
    let mut seen_clauses: FxHashSet<u32> = FxHashSet::default();
    let mut queue = vec![start];
    dist.insert(start, 0);
    let mut pos = 0;
    while pos < queue.len() {
        let v = queue[pos];
        pos += 1;
        let d = dist[&v];
        for polarity in [true, false] {
            for &idx in occ.occ_list(Literal::from_var(v, polarity)) {
                if !seen_clauses.insert(idx) {
                    continue;
                }
                for l in occ.clause(idx as usize) {
                    let w = l.var_index();
                    if !occ.var_is_assigned(w) && !dist.contains_key(&w) {
                        dist.insert(w, d + 1);
                        queue.push(w);
                    }
                }
            }
        }
    }
    best_layer(component.iter().map(|v| (*v, dist.get(v).copied())))
}

/// BFS layering of the dual graph (clauses linked by shared variables);
/// returns the variables of the most balanced clause layer.
fn dual_separator(component: &[Var], occ: &OccurrenceManager) -> Vec<Var> {
    let start_var = *component
        .iter()
        .max_by_key(|v| occ.n_clauses_with_var(**v))
        .expect("a non-empty component");
    let mut start_clause = None;
    for polarity in [true, false] {
        if let Some(idx) = occ.occ_list(Literal::from_var(start_var, polarity)).first() {
            start_clause = Some(*idx);
            break;
        }
    }
    let Some(start_clause) = start_clause else {
        return Vec::new();
    };
    let mut clause_dist: FxHashMap<u32, usize> = FxHashMap::default();
    let mut seen_vars: FxHashSet<Var> = FxHashSet::default();
    let mut queue = vec![start_clause];
    clause_dist.insert(start_clause, 0);
    let mut pos = 0;
    while pos < queue.len() {
        let idx = queue[pos];
        pos += 1;
        let d = clause_dist[&idx];
        for l in occ.clause(idx as usize) {
            let v = l.var_index();
            if occ.var_is_assigned(v) || !seen_vars.insert(v) {
                continue;
            }
            for polarity in [true, false] {
                for &other in occ.occ_list(Literal::from_var(v, polarity)) {
                    if let std::collections::hash_map::Entry::Vacant(e) = clause_dist.entry(other)
                    {
                        e.insert(d + 1);
                        queue.push(other);
                    }
                }
            }
        }
    }
    // per-layer clause counts, then the variables of the most balanced layer
    let n_layers = clause_dist.values().max().map_or(0, |d| d + 1);
    if n_layers < 3 {
        return Vec::new();
    }
    let mut counts = vec![0usize; n_layers];
    for d in clause_dist.values() {
        counts[*d] += 1;
    }
    let cut_layer = most_balanced(&counts);
    let mut cut = Vec::new();
    let mut in_cut: FxHashSet<Var> = FxHashSet::default();
    for (idx, d) in &clause_dist {
        if *d != cut_layer {
            continue;
        }
        for l in occ.clause(*idx as usize) {
            let v = l.var_index();
            if !occ.var_is_assigned(v) && in_cut.insert(v) {
                cut.push(v);
            }
        }
    }
    cut.sort_unstable();
    cut
}

fn best_layer(dists: impl Iterator<Item = (Var, Option<usize>)>) -> Vec<Var> {
    let entries: Vec<(Var, usize)> = dists
        .filter_map(|(v, d)| d.map(|d| (v, d)))
        .collect();
    let n_layers = entries.iter().map(|(_, d)| *d).max().map_or(0, |d| d + 1);
    if n_layers < 3 {
        return Vec::new();
    }
    let mut counts = vec![0usize; n_layers];
    for (_, d) in &entries {
        counts[*d] += 1;
    }
    let cut_layer = most_balanced(&counts);
    let mut cut: Vec<Var> = entries
        .into_iter()
        .filter_map(|(v, d)| (d == cut_layer).then_some(v))
        .collect();
    cut.sort_unstable();
    cut
}

/// The inner layer whose removal splits the remaining vertices most evenly.
fn most_balanced(counts: &[usize]) -> usize {
    let total: usize = counts.iter().sum();
    let mut before = counts[0];
    let mut best = (1, usize::MAX);
    for (layer, count) in counts.iter().enumerate().take(counts.len() - 1).skip(1) {
        let after = total - before - count;
        let imbalance = before.abs_diff(after);
        if imbalance < best.1 {
            best = (layer, imbalance);
        }
        before += count;
    }
    best.0
}
