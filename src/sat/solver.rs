use super::heap::VarHeap;
use super::types::{Clause, ClauseArena, ClauseRef, Value, Watcher};
use crate::{Literal, Var};
use std::cmp::Ordering;
use std::io::Write;
use std::sync::{
    atomic::{AtomicBool, Ordering as AtomicOrdering},
    Arc,
};

const VAR_ACTIVITY_RESCALE: f64 = 1e100;
const CLAUSE_ACTIVITY_RESCALE: f64 = 1e20;

/// The result of a satisfiability call.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SolveStatus {
    /// The formula is satisfiable under the current assumptions.
    Sat,
    /// The formula is unsatisfiable under the current assumptions.
    Unsat,
    /// A budget was exhausted or the interrupt flag was raised before a
    /// status could be computed. The solver cannot resume the interrupted
    /// call; the whole computation must be abandoned.
    Interrupted,
}

#[derive(Copy, Clone, Default)]
struct VarData {
    reason: Option<ClauseRef>,
    level: usize,
}

enum SearchResult {
    Sat,
    Unsat,
    Restart,
    Budget,
}

/// A CDCL SAT solver in the minisat lineage.
///
/// The solver propagates with two watched literals per clause (plus a blocker
/// literal per watcher), analyzes conflicts at the first unique implication
/// point with recursive clause minimization, scores variables with VSIDS,
/// restarts on the Luby sequence and periodically reduces the learnt-clause
/// database by activity.
///
/// Two features depart from a stock SAT solver and serve the compilation
/// engine: solving can be restricted to a set of decision variables (the
/// connected component under consideration), and the literals implied by the
/// current assumptions can be collected per variable set.
pub struct Solver {
    ca: ClauseArena,
    clauses: Vec<ClauseRef>,
    learnts: Vec<ClauseRef>,
    watches: Vec<Vec<Watcher>>,
    assigns: Vec<Value>,
    vardata: Vec<VarData>,
    trail: Vec<Literal>,
    trail_lim: Vec<usize>,
    qhead: usize,
    activity: Vec<f64>,
    polarity: Vec<bool>,
    order_heap: VarHeap,
    scope_stamp: Vec<u64>,
    scope_epoch: u64,
    assumptions: Vec<Literal>,
    conflict: Vec<Literal>,
    var_inc: f64,
    var_decay: f64,
    cla_inc: f64,
    cla_decay: f64,
    restart_first: u64,
    restart_inc: f64,
    max_learnts: f64,
    learnt_growth: f64,
    conflict_budget: i64,
    propagation_budget: i64,
    interrupt: Arc<AtomicBool>,
    ok: bool,
    remove_satisfied: bool,
    need_model: bool,
    n_conflicts: u64,
    n_propagations: u64,
    n_decisions: u64,
    model: Vec<Value>,
    seen: Vec<bool>,
    analyze_stack: Vec<Literal>,
    analyze_toclear: Vec<Literal>,
    trace: Option<Box<dyn Write>>,
    trace_failed: bool,
    n_trace_clauses: usize,
    final_trace_index: Option<usize>,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            ca: ClauseArena::default(),
            clauses: Vec::new(),
            learnts: Vec::new(),
            watches: Vec::new(),
            assigns: Vec::new(),
            vardata: Vec::new(),
            trail: Vec::new(),
            trail_lim: Vec::new(),
            qhead: 0,
            activity: Vec::new(),
            polarity: Vec::new(),
            order_heap: VarHeap::default(),
            scope_stamp: Vec::new(),
            scope_epoch: 0,
            assumptions: Vec::new(),
            conflict: Vec::new(),
            var_inc: 1.,
            var_decay: 0.95,
            cla_inc: 1.,
            cla_decay: 0.999,
            restart_first: 100,
            restart_inc: 2.,
            max_learnts: 0.,
            learnt_growth: 1.1,
            conflict_budget: -1,
            propagation_budget: -1,
            interrupt: Arc::new(AtomicBool::new(false)),
            ok: true,
            remove_satisfied: true,
            need_model: true,
            n_conflicts: 0,
            n_propagations: 0,
            n_decisions: 0,
            model: Vec::new(),
            seen: Vec::new(),
            analyze_stack: Vec::new(),
            analyze_toclear: Vec::new(),
            trace: None,
            trace_failed: false,
            n_trace_clauses: 0,
            final_trace_index: None,
        }
    }
}

impl Solver {
    /// Builds a solver with no variable and no clause.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new, unassigned variable and returns its index.
    pub fn new_var(&mut self) -> Var {
        let v = self.assigns.len();
        self.assigns.push(Value::Undef);
        self.vardata.push(VarData::default());
        self.activity.push(0.);
        self.polarity.push(false);
        self.seen.push(false);
        self.scope_stamp.push(0);
        self.watches.push(Vec::new());
        self.watches.push(Vec::new());
        self.order_heap.grow_to(v + 1);
        self.order_heap.insert(v, &self.activity);
        v
    }

    /// Returns the number of variables of the solver.
    #[must_use]
    pub fn n_vars(&self) -> usize {
        self.assigns.len()
    }

    /// Returns `false` if a conflict was derived at level 0, making the
    /// formula permanently unsatisfiable.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// Returns the value of a variable under the current partial assignment.
    #[must_use]
    pub fn value_var(&self, v: Var) -> Value {
        self.assigns[v]
    }

    /// Returns the value of a literal under the current partial assignment.
    #[must_use]
    pub fn value_lit(&self, l: Literal) -> Value {
        if l.polarity() {
            self.assigns[l.var_index()]
        } else {
            self.assigns[l.var_index()].negate()
        }
    }

    /// Returns the decision level at which a variable was assigned.
    /// Only meaningful for assigned variables.
    #[must_use]
    pub fn level(&self, v: Var) -> usize {
        self.vardata[v].level
    }

    /// Returns the reason clause of an assigned, propagated variable;
    /// decisions, assumptions and unassigned variables have none.
    #[must_use]
    pub fn reason(&self, v: Var) -> Option<ClauseRef> {
        if self.assigns[v] == Value::Undef {
            return None;
        }
        self.vardata[v].reason
    }

    /// Returns the trace index of the reason clause of an assigned variable,
    /// or `None` for decisions, assumptions and unassigned variables.
    #[must_use]
    pub fn reason_trace_index(&self, v: Var) -> Option<usize> {
        self.reason(v).map(|cr| self.ca[cr].trace_index)
    }

    /// Returns the current trail of assigned literals, in assignment order.
    #[must_use]
    pub fn trail(&self) -> &[Literal] {
        &self.trail
    }

    /// Returns the current decision level.
    #[must_use]
    pub fn decision_level(&self) -> usize {
        self.trail_lim.len()
    }

    /// Returns the VSIDS activity table, indexed by variable.
    #[must_use]
    pub fn activities(&self) -> &[f64] {
        &self.activity
    }

    /// Returns the last polarity assigned to a variable, used by the saved
    /// phase heuristic.
    #[must_use]
    pub fn saved_polarity(&self, v: Var) -> bool {
        self.polarity[v]
    }

    /// Returns the model stored by the last successful satisfiability call.
    /// Empty unless model storage is enabled (see [`set_need_model`](Self::set_need_model)).
    #[must_use]
    pub fn model(&self) -> &[Value] {
        &self.model
    }

    /// Enables or disables model storage on successful satisfiability calls.
    pub fn set_need_model(&mut self, need_model: bool) {
        self.need_model = need_model;
    }

    /// Sets whether level-0 simplification may delete satisfied original clauses.
    pub fn set_remove_satisfied(&mut self, remove_satisfied: bool) {
        self.remove_satisfied = remove_satisfied;
    }

    /// Sets the conflict and propagation budgets; negative values disable a budget.
    pub fn set_budgets(&mut self, conflicts: i64, propagations: i64) {
        self.conflict_budget = conflicts;
        self.propagation_budget = propagations;
    }

    /// Returns a flag that, once raised, makes the next satisfiability call
    /// return [`SolveStatus::Interrupted`].
    #[must_use]
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Redirects the learnt clauses to a resolution trace sink and starts
    /// indexing clauses for certified output.
    pub fn set_trace(&mut self, out: Box<dyn Write>) {
        self.trace = Some(out);
    }

    /// Returns the trace index of the clause that produced the last final
    /// conflict, when a single falsified clause is responsible for it.
    #[must_use]
    pub fn final_trace_index(&self) -> Option<usize> {
        self.final_trace_index
    }

    /// Returns the final conflict of the last unsatisfiable call, expressed
    /// over the negations of the assumptions responsible for it.
    #[must_use]
    pub fn final_conflict(&self) -> &[Literal] {
        &self.conflict
    }

    /// Replaces the assumption literals.
    pub fn set_assumptions(&mut self, assumptions: Vec<Literal>) {
        self.cancel_until(0);
        self.assumptions = assumptions;
    }

    /// Pushes a new assumption literal.
    pub fn push_assumption(&mut self, l: Literal) {
        self.assumptions.push(l);
    }

    /// Pops the last assumption literal.
    pub fn pop_assumption(&mut self) {
        self.assumptions.pop();
    }

    /// Returns the current assumption literals.
    #[must_use]
    pub fn assumptions(&self) -> &[Literal] {
        &self.assumptions
    }

    /// Backtracks to the decision level matching the current assumption count.
    pub fn cancel_to_assumptions(&mut self) {
        let level = self.assumptions.len().min(self.decision_level());
        self.cancel_until(level);
    }

    /// Adds a clause to the formula. Must be called at level 0.
    ///
    /// The literals are sorted and deduplicated; a tautology is a no-op.
    /// Literals already falsified at level 0 are removed and a resulting unit
    /// is propagated immediately. Returns `false` if the solver reached a
    /// conflict at level 0, now or in a previous call.
    pub fn add_clause(&mut self, lits: Vec<Literal>) -> bool {
        debug_assert_eq!(0, self.decision_level());
        let trace_index = self.next_trace_index();
        if !self.ok {
            return false;
        }
        let mut lits = lits;
        lits.sort_unstable();
        lits.dedup();
        let mut simplified = Vec::with_capacity(lits.len());
        let mut prev = None;
        for l in lits {
            if self.value_lit(l) == Value::True || prev == Some(l.flip()) {
                return true;
            }
            if self.value_lit(l) != Value::False {
                simplified.push(l);
            }
            prev = Some(l);
        }
        match simplified.len() {
            0 => {
                self.ok = false;
                self.final_trace_index = Some(trace_index);
            }
            1 => {
                self.unchecked_enqueue(simplified[0], None);
                if let Some(confl) = self.propagate() {
                    self.ok = false;
                    self.final_trace_index = Some(self.ca[confl].trace_index);
                }
            }
            _ => {
                let cr = self.ca.alloc(simplified, false, trace_index);
                self.clauses.push(cr);
                self.attach_clause(cr);
            }
        }
        self.ok
    }

    /// Opens a new decision level.
    pub fn new_decision_level(&mut self) {
        self.trail_lim.push(self.trail.len());
    }

    /// Enqueues a literal if it is not already falsified.
    ///
    /// Returns `false` when the literal is falsified under the current
    /// assignment, `true` otherwise.
    pub fn enqueue(&mut self, l: Literal, reason: Option<ClauseRef>) -> bool {
        match self.value_lit(l) {
            Value::False => false,
            Value::True => true,
            Value::Undef => {
                self.unchecked_enqueue(l, reason);
                true
            }
        }
    }

    /// Enqueues a literal known to be unassigned.
    pub fn unchecked_enqueue(&mut self, l: Literal, reason: Option<ClauseRef>) {
        debug_assert_eq!(Value::Undef, self.value_lit(l));
        let v = l.var_index();
        self.assigns[v] = Value::from_polarity(l.polarity());
        self.vardata[v] = VarData {
            reason,
            level: self.decision_level(),
        };
        self.trail.push(l);
    }

    /// Backtracks to the given decision level, undoing every later assignment.
    pub fn cancel_until(&mut self, level: usize) {
        if self.decision_level() <= level {
            return;
        }
        for i in (self.trail_lim[level]..self.trail.len()).rev() {
            let l = self.trail[i];
            let v = l.var_index();
            self.assigns[v] = Value::Undef;
            self.polarity[v] = l.polarity();
            self.insert_var_order(v);
        }
        self.qhead = self.trail_lim[level];
        self.trail.truncate(self.trail_lim[level]);
        self.trail_lim.truncate(level);
    }

    /// Drains the propagation queue.
    ///
    /// Returns the falsified clause when propagation reaches a conflict,
    /// `None` when a fixpoint is reached.
    pub fn propagate(&mut self) -> Option<ClauseRef> {
        let mut confl = None;
        while self.qhead < self.trail.len() {
            let p = self.trail[self.qhead];
            self.qhead += 1;
            self.n_propagations += 1;
            let ws = std::mem::take(&mut self.watches[p.index()]);
            let mut kept = Vec::with_capacity(ws.len());
            let mut i = 0;
            'watchers: while i < ws.len() {
                let w = ws[i];
                i += 1;
                if self.value_lit(w.blocker) == Value::True {
                    kept.push(w);
                    continue;
                }
                let cr = w.cref;
                let false_lit = p.flip();
                if self.ca[cr][0] == false_lit {
                    self.ca[cr].swap_lits(0, 1);
                }
                debug_assert_eq!(false_lit, self.ca[cr][1]);
                let first = self.ca[cr][0];
                if first != w.blocker && self.value_lit(first) == Value::True {
                    kept.push(Watcher {
                        cref: cr,
                        blocker: first,
                    });
                    continue;
                }
                for k in 2..self.ca[cr].len() {
                    let lk = self.ca[cr][k];
                    if self.value_lit(lk) != Value::False {
                        self.ca[cr].swap_lits(1, k);
                        self.watches[lk.flip().index()].push(Watcher {
                            cref: cr,
                            blocker: first,
                        });
                        continue 'watchers;
                    }
                }
                // no new watch: the clause is unit or falsified
                kept.push(Watcher {
                    cref: cr,
                    blocker: first,
                });
                if self.value_lit(first) == Value::False {
                    confl = Some(cr);
                    self.qhead = self.trail.len();
                    kept.extend_from_slice(&ws[i..]);
                    break;
                }
                self.unchecked_enqueue(first, Some(cr));
            }
            self.watches[p.index()] = kept;
            if confl.is_some() {
                break;
            }
        }
        confl
    }

    /// Decides satisfiability under the current assumptions.
    ///
    /// On success the solver is left at the decision level matching the
    /// assumption count, with the trail holding the assumptions and their
    /// consequences; on failure the final conflict is available through
    /// [`final_conflict`](Self::final_conflict).
    pub fn solve_with_assumptions(&mut self) -> SolveStatus {
        self.conflict.clear();
        if !self.ok {
            return SolveStatus::Unsat;
        }
        self.final_trace_index = None;
        self.cancel_until(0);
        if self.max_learnts == 0. {
            self.max_learnts = (self.clauses.len() as f64 / 3.).max(1000.);
        }
        let mut curr_restarts = 0u32;
        loop {
            let budget = (luby(self.restart_inc, curr_restarts) * self.restart_first as f64) as u64;
            match self.search(budget) {
                SearchResult::Sat => {
                    self.cancel_until(self.assumptions.len());
                    return SolveStatus::Sat;
                }
                SearchResult::Unsat => return SolveStatus::Unsat,
                SearchResult::Restart => curr_restarts += 1,
                SearchResult::Budget => return SolveStatus::Interrupted,
            }
        }
    }

    /// Simplifies the clause database at level 0 by removing satisfied
    /// clauses. Refused (returning `false`) when top-level propagation
    /// already fails.
    pub fn simplify(&mut self) -> bool {
        debug_assert_eq!(0, self.decision_level());
        if !self.ok {
            return false;
        }
        if let Some(confl) = self.propagate() {
            self.ok = false;
            self.final_trace_index = Some(self.ca[confl].trace_index);
            return false;
        }
        let learnts = std::mem::take(&mut self.learnts);
        for cr in learnts {
            if self.clause_satisfied(cr) {
                self.remove_clause(cr);
            } else {
                self.learnts.push(cr);
            }
        }
        if self.remove_satisfied {
            let clauses = std::mem::take(&mut self.clauses);
            for cr in clauses {
                if self.clause_satisfied(cr) {
                    self.remove_clause(cr);
                } else {
                    self.clauses.push(cr);
                }
            }
        }
        true
    }

    /// Restricts the decision variables to the given set and rebuilds the
    /// decision order accordingly. Propagation is unaffected.
    pub fn set_decision_scope(&mut self, vars: &[Var]) {
        self.scope_epoch += 1;
        for &v in vars {
            self.scope_stamp[v] = self.scope_epoch;
        }
        self.order_heap.clear();
        for &v in vars {
            if self.assigns[v] == Value::Undef {
                self.order_heap.insert(v, &self.activity);
            }
        }
    }

    /// Collects, for every assigned variable of the given set, the literal it
    /// is assigned to.
    #[must_use]
    pub fn collect_units(&self, vars: &[Var]) -> Vec<Literal> {
        vars.iter()
            .filter_map(|&v| match self.assigns[v] {
                Value::Undef => None,
                Value::True => Some(Literal::from_var(v, true)),
                Value::False => Some(Literal::from_var(v, false)),
            })
            .collect()
    }

    pub(crate) fn detach_clause_at(&mut self, i: usize) {
        let cr = self.clauses[i];
        if self.ca[cr].attached {
            self.detach_clause(cr);
            self.ca[cr].attached = false;
        }
    }

    pub(crate) fn reattach_clause_at(&mut self, i: usize) {
        let cr = self.clauses[i];
        if self.ca[cr].attached {
            return;
        }
        // restore the watch invariant: watch two non-falsified literals when possible
        for slot in 0..2 {
            if self.value_lit(self.ca[cr][slot]) == Value::False {
                for k in (slot + 1)..self.ca[cr].len() {
                    if self.value_lit(self.ca[cr][k]) != Value::False {
                        self.ca[cr].swap_lits(slot, k);
                        break;
                    }
                }
            }
        }
        self.ca[cr].attached = true;
        self.attach_clause(cr);
    }

    pub(crate) fn clause_at(&self, i: usize) -> &Clause {
        &self.ca[self.clauses[i]]
    }

    pub(crate) fn n_original_clauses(&self) -> usize {
        self.clauses.len()
    }

    fn search(&mut self, nof_conflicts: u64) -> SearchResult {
        let mut conflict_c = 0u64;
        loop {
            if let Some(confl) = self.propagate() {
                self.n_conflicts += 1;
                conflict_c += 1;
                if self.decision_level() == 0 {
                    self.ok = false;
                    self.final_trace_index = Some(self.ca[confl].trace_index);
                    return SearchResult::Unsat;
                }
                let (learnt, bt_level) = self.analyze(confl);
                self.cancel_until(bt_level);
                self.log_learnt(&learnt);
                if learnt.len() == 1 {
                    self.next_trace_index();
                    self.unchecked_enqueue(learnt[0], None);
                } else {
                    let trace_index = self.next_trace_index();
                    let first = learnt[0];
                    let cr = self.ca.alloc(learnt, true, trace_index);
                    self.learnts.push(cr);
                    self.attach_clause(cr);
                    self.bump_clause_activity(cr);
                    self.unchecked_enqueue(first, Some(cr));
                }
                self.var_inc *= 1. / self.var_decay;
                self.cla_inc *= 1. / self.cla_decay;
            } else {
                if conflict_c >= nof_conflicts {
                    self.cancel_to_assumptions();
                    return SearchResult::Restart;
                }
                if !self.within_budget() {
                    return SearchResult::Budget;
                }
                if self.learnts.len() as f64 - self.trail.len() as f64 >= self.max_learnts {
                    self.reduce_db();
                }
                let mut next = None;
                while self.decision_level() < self.assumptions.len() {
                    let p = self.assumptions[self.decision_level()];
                    match self.value_lit(p) {
                        Value::True => self.new_decision_level(),
                        Value::False => {
                            self.analyze_final(p.flip());
                            return SearchResult::Unsat;
                        }
                        Value::Undef => {
                            next = Some(p);
                            break;
                        }
                    }
                }
                if next.is_none() {
                    self.n_decisions += 1;
                    next = self.pick_branch_lit();
                    if next.is_none() {
                        if self.need_model {
                            self.model = self.assigns.clone();
                        }
                        return SearchResult::Sat;
                    }
                }
                self.new_decision_level();
                self.unchecked_enqueue(next.expect("a decision literal"), None);
            }
        }
    }

    fn analyze(&mut self, confl: ClauseRef) -> (Vec<Literal>, usize) {
        let mut learnt = vec![Literal::SENTINEL];
        let mut path_c = 0usize;
        let mut p = None;
        let mut index = self.trail.len();
        let mut confl = confl;
        loop {
            if self.ca[confl].learnt {
                self.bump_clause_activity(confl);
            }
            let start = usize::from(p.is_some());
            for j in start..self.ca[confl].len() {
                let q = self.ca[confl][j];
                let v = q.var_index();
                if !self.seen[v] && self.level(v) > 0 {
                    self.bump_var_activity(v);
                    self.seen[v] = true;
                    if self.level(v) >= self.decision_level() {
                        path_c += 1;
                    } else {
                        learnt.push(q);
                    }
                }
            }
            loop {
                index -= 1;
                if self.seen[self.trail[index].var_index()] {
                    break;
                }
            }
            let pl = self.trail[index];
            self.seen[pl.var_index()] = false;
            path_c -= 1;
            p = Some(pl);
            if path_c == 0 {
                break;
            }
            confl = self.vardata[pl.var_index()]
                .reason
                .expect("a non-UIP literal of the current level has a reason");
        }
        learnt[0] = p.expect("conflict analysis visits at least one literal").flip();

        self.analyze_toclear.clone_from(&learnt);
        let abstract_levels = learnt[1..]
            .iter()
            .fold(0u32, |acc, l| acc | self.abstract_level(l.var_index()));
        let mut j = 1;
        for i in 1..learnt.len() {
            let l = learnt[i];
            if self.vardata[l.var_index()].reason.is_none()
                || !self.lit_redundant(l, abstract_levels)
            {
                learnt[j] = l;
                j += 1;
            }
        }
        learnt.truncate(j);

        let bt_level = if learnt.len() == 1 {
            0
        } else {
            let mut max_i = 1;
            for i in 2..learnt.len() {
                if self.level(learnt[i].var_index()) > self.level(learnt[max_i].var_index()) {
                    max_i = i;
                }
            }
            learnt.swap(1, max_i);
            self.level(learnt[1].var_index())
        };

        let toclear = std::mem::take(&mut self.analyze_toclear);
        for l in &toclear {
            self.seen[l.var_index()] = false;
        }
        (learnt, bt_level)
    }

    fn lit_redundant(&mut self, p: Literal, abstract_levels: u32) -> bool {
        self.analyze_stack.clear();
        self.analyze_stack.push(p);
        let top = self.analyze_toclear.len();
        while let Some(q) = self.analyze_stack.pop() {
            let cr = self.vardata[q.var_index()]
                .reason
                .expect("a stacked literal has a reason");
            for i in 1..self.ca[cr].len() {
                let l = self.ca[cr][i];
                let v = l.var_index();
                if !self.seen[v] && self.level(v) > 0 {
                    if self.vardata[v].reason.is_some()
                        && (self.abstract_level(v) & abstract_levels) != 0
                    {
                        self.seen[v] = true;
                        self.analyze_stack.push(l);
                        self.analyze_toclear.push(l);
                    } else {
                        for j in top..self.analyze_toclear.len() {
                            self.seen[self.analyze_toclear[j].var_index()] = false;
                        }
                        self.analyze_toclear.truncate(top);
                        return false;
                    }
                }
            }
        }
        true
    }

    fn analyze_final(&mut self, p: Literal) {
        self.conflict.clear();
        self.conflict.push(p);
        if self.decision_level() == 0 {
            return;
        }
        self.seen[p.var_index()] = true;
        for i in (self.trail_lim[0]..self.trail.len()).rev() {
            let x = self.trail[i].var_index();
            if self.seen[x] {
                if let Some(cr) = self.vardata[x].reason {
                    for j in 1..self.ca[cr].len() {
                        let l = self.ca[cr][j];
                        if self.level(l.var_index()) > 0 {
                            self.seen[l.var_index()] = true;
                        }
                    }
                } else {
                    debug_assert!(self.level(x) > 0);
                    self.conflict.push(self.trail[i].flip());
                }
                self.seen[x] = false;
            }
        }
        self.seen[p.var_index()] = false;
    }

    fn pick_branch_lit(&mut self) -> Option<Literal> {
        loop {
            let v = self.order_heap.pop_max()?;
            self.order_heap.sift_root(&self.activity);
            if self.assigns[v] == Value::Undef && self.in_scope(v) {
                return Some(Literal::from_var(v, self.polarity[v]));
            }
        }
    }

    fn reduce_db(&mut self) {
        let extra_lim = self.cla_inc / self.learnts.len() as f64;
        {
            let Solver {
                ref mut learnts,
                ref ca,
                ..
            } = *self;
            learnts.sort_by(|a, b| {
                ca[*a]
                    .activity
                    .partial_cmp(&ca[*b].activity)
                    .unwrap_or(Ordering::Equal)
            });
        }
        let old = std::mem::take(&mut self.learnts);
        let half = old.len() / 2;
        for (i, cr) in old.into_iter().enumerate() {
            let keep = self.ca[cr].len() == 2
                || self.locked(cr)
                || (i >= half && self.ca[cr].activity >= extra_lim);
            if keep {
                self.learnts.push(cr);
            } else {
                self.remove_clause(cr);
            }
        }
        self.max_learnts *= self.learnt_growth;
    }

    fn locked(&self, cr: ClauseRef) -> bool {
        let first = self.ca[cr][0];
        self.value_lit(first) == Value::True
            && self.vardata[first.var_index()].reason == Some(cr)
    }

    fn clause_satisfied(&self, cr: ClauseRef) -> bool {
        self.ca[cr]
            .lits()
            .iter()
            .any(|l| self.value_lit(*l) == Value::True)
    }

    fn attach_clause(&mut self, cr: ClauseRef) {
        let c0 = self.ca[cr][0];
        let c1 = self.ca[cr][1];
        self.watches[c0.flip().index()].push(Watcher {
            cref: cr,
            blocker: c1,
        });
        self.watches[c1.flip().index()].push(Watcher {
            cref: cr,
            blocker: c0,
        });
    }

    fn detach_clause(&mut self, cr: ClauseRef) {
        let c0 = self.ca[cr][0];
        let c1 = self.ca[cr][1];
        self.watches[c0.flip().index()].retain(|w| w.cref != cr);
        self.watches[c1.flip().index()].retain(|w| w.cref != cr);
    }

    fn remove_clause(&mut self, cr: ClauseRef) {
        debug_assert!(!self.locked(cr));
        self.detach_clause(cr);
        self.ca[cr].attached = false;
    }

    fn insert_var_order(&mut self, v: Var) {
        if self.in_scope(v) && !self.order_heap.contains(v) {
            self.order_heap.insert(v, &self.activity);
        }
    }

    fn in_scope(&self, v: Var) -> bool {
        self.scope_epoch == 0 || self.scope_stamp[v] == self.scope_epoch
    }

    fn abstract_level(&self, v: Var) -> u32 {
        1 << (self.level(v) & 31)
    }

    fn bump_var_activity(&mut self, v: Var) {
        self.activity[v] += self.var_inc;
        if self.activity[v] > VAR_ACTIVITY_RESCALE {
            for a in &mut self.activity {
                *a *= 1. / VAR_ACTIVITY_RESCALE;
            }
            self.var_inc *= 1. / VAR_ACTIVITY_RESCALE;
        }
        self.order_heap.bump(v, &self.activity);
    }

    fn bump_clause_activity(&mut self, cr: ClauseRef) {
        self.ca[cr].activity += self.cla_inc;
        if self.ca[cr].activity > CLAUSE_ACTIVITY_RESCALE {
            let learnts = std::mem::take(&mut self.learnts);
            for lr in &learnts {
                self.ca[*lr].activity *= 1. / CLAUSE_ACTIVITY_RESCALE;
            }
            self.learnts = learnts;
            self.cla_inc *= 1. / CLAUSE_ACTIVITY_RESCALE;
        }
    }

    fn within_budget(&self) -> bool {
        !self.interrupt.load(AtomicOrdering::Relaxed)
            && (self.conflict_budget < 0 || self.n_conflicts < self.conflict_budget.unsigned_abs())
            && (self.propagation_budget < 0
                || self.n_propagations < self.propagation_budget.unsigned_abs())
    }

    fn next_trace_index(&mut self) -> usize {
        self.n_trace_clauses += 1;
        self.n_trace_clauses
    }

    fn log_learnt(&mut self, lits: &[Literal]) {
        let Some(out) = self.trace.as_mut() else {
            return;
        };
        let mut line = String::new();
        for l in lits {
            line.push_str(&format!("{l} "));
        }
        line.push('0');
        if writeln!(out, "{line}").is_err() && !self.trace_failed {
            self.trace_failed = true;
            log::warn!("cannot write to the resolution trace anymore; giving up on it");
        }
    }
}

/// The Luby restart sequence: the `x`-th term of the sequence, scaled by `y`.
fn luby(y: f64, mut x: u32) -> f64 {
    let mut size = 1u64;
    let mut seq = 0i32;
    while size < u64::from(x) + 1 {
        seq += 1;
        size = 2 * size + 1;
    }
    while size - 1 != u64::from(x) {
        size = (size - 1) >> 1;
        seq -= 1;
        x %= u32::try_from(size).expect("luby sequence sizes fit in 32 bits");
    }
    y.powi(seq)
}
