use crate::{Literal, Var};
use rustc_hash::FxHashMap;

/// The index of a node in a [`DecisionDnnf`] arena.
pub type NodeIndex = usize;

/// The index of the shared false leaf.
pub const FALSE_NODE: NodeIndex = 0;
/// The index of the shared true leaf.
pub const TRUE_NODE: NodeIndex = 1;

pub(crate) const VAR_SENTINEL: Var = usize::MAX;

/// An edge to a child node, decorated with the forced literals and the freed
/// variables of the branch.
///
/// The literal and variable lists live in the graph's shared arenas; a
/// branch only holds the index their run starts at. The `from_cache` flag
/// records whether the child was obtained from the component cache rather
/// than by fresh inference.
#[derive(Copy, Clone, Debug)]
pub struct Branch {
    /// The target node.
    pub target: NodeIndex,
    /// Start of the branch's unit literals in the unit arena.
    pub units: usize,
    /// Start of the branch's free variables in the free-variable arena.
    pub free_vars: usize,
    /// `true` when the target was found in the component cache.
    pub from_cache: bool,
}

/// A Decision-DNNF node.
pub enum Node {
    /// The false constant.
    False,
    /// The true constant.
    True,
    /// A decorator attaching forced literals and free variables above a child.
    Unary(Branch),
    /// A deterministic binary disjunction: the two branches assume a literal
    /// and its complement.
    Decision(Branch, Branch),
    /// A decomposable conjunction: the children's variable sets are pairwise
    /// disjoint.
    And(Vec<NodeIndex>),
}

/// A Decision-DNNF: a node arena, the shared unit-literal and free-variable
/// arenas, and a root branch.
///
/// The graph is built monotonically by the compiler and destroyed as a
/// whole; child links never form a cycle, and cache reuse makes sub-DAGs
/// shared. The arenas grow only: a branch keeps an index, never a pointer.
pub struct DecisionDnnf {
    n_vars: usize,
    nodes: Vec<Node>,
    unit_lits: Vec<Literal>,
    free_vars: Vec<Var>,
    root: Branch,
    root_reasons: Vec<usize>,
    node_reasons: FxHashMap<NodeIndex, Vec<usize>>,
    and_flags: FxHashMap<NodeIndex, Vec<bool>>,
    n_edges: usize,
}

impl DecisionDnnf {
    /// Builds a graph holding only the two constant leaves.
    #[must_use]
    pub fn new(n_vars: usize) -> Self {
        Self {
            n_vars,
            nodes: vec![Node::False, Node::True],
            unit_lits: vec![Literal::SENTINEL],
            free_vars: vec![VAR_SENTINEL],
            root: Branch {
                target: TRUE_NODE,
                units: 0,
                free_vars: 0,
                from_cache: false,
            },
            root_reasons: Vec::new(),
            node_reasons: FxHashMap::default(),
            and_flags: FxHashMap::default(),
            n_edges: 0,
        }
    }

    /// Returns the number of variables of the compiled formula.
    #[must_use]
    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    /// Returns the number of nodes of the graph.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of edges of the graph.
    #[must_use]
    pub fn n_edges(&self) -> usize {
        self.n_edges
    }

    /// Returns the root branch.
    #[must_use]
    pub fn root(&self) -> Branch {
        self.root
    }

    /// Returns the node stored at the given index.
    #[must_use]
    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.nodes[idx]
    }

    pub(crate) fn root_reasons(&self) -> &[usize] {
        &self.root_reasons
    }

    pub(crate) fn node_reasons(&self, idx: NodeIndex) -> &[usize] {
        self.node_reasons.get(&idx).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn and_flags(&self, idx: NodeIndex) -> &[bool] {
        self.and_flags.get(&idx).map_or(&[], Vec::as_slice)
    }

    /// Appends a unit-literal list to the arena and returns its start index.
    pub(crate) fn save_units(&mut self, units: &[Literal]) -> usize {
        if units.is_empty() {
            return 0;
        }
        let start = self.unit_lits.len();
        self.unit_lits.extend_from_slice(units);
        self.unit_lits.push(Literal::SENTINEL);
        start
    }

    /// Appends a free-variable list to the arena and returns its start index.
    pub(crate) fn save_free_vars(&mut self, vars: &[Var]) -> usize {
        if vars.is_empty() {
            return 0;
        }
        let start = self.free_vars.len();
        self.free_vars.extend_from_slice(vars);
        self.free_vars.push(VAR_SENTINEL);
        start
    }

    /// Builds a branch, saving its decorations into the arenas.
    pub(crate) fn make_branch(
        &mut self,
        target: NodeIndex,
        units: &[Literal],
        free_vars: &[Var],
        from_cache: bool,
    ) -> Branch {
        self.n_edges += 1;
        Branch {
            target,
            units: self.save_units(units),
            free_vars: self.save_free_vars(free_vars),
            from_cache,
        }
    }

    pub(crate) fn add_unary(&mut self, branch: Branch) -> NodeIndex {
        self.nodes.push(Node::Unary(branch));
        self.nodes.len() - 1
    }

    pub(crate) fn add_decision(
        &mut self,
        pos: Branch,
        neg: Branch,
        reasons: Option<Vec<usize>>,
    ) -> NodeIndex {
        self.nodes.push(Node::Decision(pos, neg));
        let idx = self.nodes.len() - 1;
        if let Some(reasons) = reasons {
            self.node_reasons.insert(idx, reasons);
        }
        idx
    }

    pub(crate) fn add_and(
        &mut self,
        children: Vec<NodeIndex>,
        from_cache: Option<Vec<bool>>,
    ) -> NodeIndex {
        debug_assert!(children.len() > 1);
        self.n_edges += children.len();
        self.nodes.push(Node::And(children));
        let idx = self.nodes.len() - 1;
        if let Some(flags) = from_cache {
            self.and_flags.insert(idx, flags);
        }
        idx
    }

    pub(crate) fn set_root(&mut self, root: Branch, reasons: Vec<usize>) {
        self.root = root;
        self.root_reasons = reasons;
    }

    /// Returns the unit literals of the run starting at `start`.
    #[must_use]
    pub fn units_from(&self, start: usize) -> &[Literal] {
        let end = self.unit_lits[start..]
            .iter()
            .position(|l| *l == Literal::SENTINEL)
            .expect("every unit run ends with a sentinel");
        &self.unit_lits[start..start + end]
    }

    /// Returns the free variables of the run starting at `start`.
    #[must_use]
    pub fn free_vars_from(&self, start: usize) -> &[Var] {
        let end = self.free_vars[start..]
            .iter()
            .position(|v| *v == VAR_SENTINEL)
            .expect("every free-variable run ends with a sentinel");
        &self.free_vars[start..start + end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lits(dimacs: &[isize]) -> Vec<Literal> {
        dimacs.iter().map(|n| Literal::from(*n)).collect()
    }

    #[test]
    fn test_empty_runs_share_the_first_sentinel() {
        let mut dag = DecisionDnnf::new(2);
        let b = dag.make_branch(TRUE_NODE, &[], &[], false);
        assert_eq!(0, b.units);
        assert_eq!(0, b.free_vars);
        assert!(dag.units_from(b.units).is_empty());
        assert!(dag.free_vars_from(b.free_vars).is_empty());
    }

    #[test]
    fn test_runs_are_recovered() {
        let mut dag = DecisionDnnf::new(3);
        let b1 = dag.make_branch(TRUE_NODE, &lits(&[1, -2]), &[2], false);
        let b2 = dag.make_branch(TRUE_NODE, &lits(&[3]), &[], true);
        assert_eq!(lits(&[1, -2]), dag.units_from(b1.units));
        assert_eq!(&[2], dag.free_vars_from(b1.free_vars));
        assert_eq!(lits(&[3]), dag.units_from(b2.units));
        assert!(dag.free_vars_from(b2.free_vars).is_empty());
        assert!(b2.from_cache);
    }

    #[test]
    fn test_node_and_edge_counts() {
        let mut dag = DecisionDnnf::new(2);
        let pos = dag.make_branch(TRUE_NODE, &lits(&[1]), &[], false);
        let neg = dag.make_branch(TRUE_NODE, &lits(&[-1]), &[], false);
        let d = dag.add_decision(pos, neg, None);
        let other = dag.make_branch(TRUE_NODE, &lits(&[2]), &[], false);
        let u = dag.add_unary(other);
        dag.add_and(vec![d, u], None);
        assert_eq!(5, dag.n_nodes());
        assert_eq!(5, dag.n_edges());
    }
}
