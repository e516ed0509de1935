use crate::Literal;

/// The truth value of a variable or a literal under a partial assignment.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Value {
    /// Assigned to true.
    True,
    /// Assigned to false.
    False,
    /// Not assigned.
    Undef,
}

impl Value {
    /// Builds the value making a literal of the given polarity true.
    #[must_use]
    pub fn from_polarity(polarity: bool) -> Self {
        if polarity {
            Value::True
        } else {
            Value::False
        }
    }

    /// Returns the opposite value; `Undef` is its own opposite.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Value::True => Value::False,
            Value::False => Value::True,
            Value::Undef => Value::Undef,
        }
    }
}

/// A 32-bit reference to a clause stored in a [`ClauseArena`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ClauseRef(u32);

/// A clause record.
///
/// A clause is an ordered list of distinct literals, tagged with an
/// attached/detached flag, a learnt/original flag, an activity score and a
/// trace index used when a resolution trace is emitted.
pub struct Clause {
    lits: Vec<Literal>,
    pub(crate) activity: f64,
    pub(crate) learnt: bool,
    pub(crate) attached: bool,
    pub(crate) trace_index: usize,
}

impl Clause {
    /// Returns the number of literals of the clause.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lits.len()
    }

    /// Returns `true` for the (never built) empty clause.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lits.is_empty()
    }

    /// Returns the literals of the clause.
    #[must_use]
    pub fn lits(&self) -> &[Literal] {
        &self.lits
    }

    pub(crate) fn swap_lits(&mut self, i: usize, j: usize) {
        self.lits.swap(i, j);
    }
}

impl std::ops::Index<usize> for Clause {
    type Output = Literal;

    fn index(&self, index: usize) -> &Literal {
        &self.lits[index]
    }
}

/// The clause storage of the solver.
///
/// Clauses are held in a single arena and addressed by 32-bit [`ClauseRef`]
/// values; detached clauses keep their slot but are never reused.
#[derive(Default)]
pub struct ClauseArena {
    clauses: Vec<Clause>,
}

impl ClauseArena {
    pub(crate) fn alloc(&mut self, lits: Vec<Literal>, learnt: bool, trace_index: usize) -> ClauseRef {
        debug_assert!(lits.len() >= 2);
        let cr = ClauseRef(
            u32::try_from(self.clauses.len()).expect("clause arena overflows 32-bit references"),
        );
        self.clauses.push(Clause {
            lits,
            activity: 0.,
            learnt,
            attached: true,
            trace_index,
        });
        cr
    }
}

impl std::ops::Index<ClauseRef> for ClauseArena {
    type Output = Clause;

    fn index(&self, cr: ClauseRef) -> &Clause {
        &self.clauses[cr.0 as usize]
    }
}

impl std::ops::IndexMut<ClauseRef> for ClauseArena {
    fn index_mut(&mut self, cr: ClauseRef) -> &mut Clause {
        &mut self.clauses[cr.0 as usize]
    }
}

/// A watch-list entry: a clause reference and a blocker literal whose truth
/// makes the clause inspection unnecessary.
#[derive(Copy, Clone)]
pub(crate) struct Watcher {
    pub cref: ClauseRef,
    pub blocker: Literal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_negate() {
        assert_eq!(Value::False, Value::True.negate());
        assert_eq!(Value::True, Value::False.negate());
        assert_eq!(Value::Undef, Value::Undef.negate());
    }

    #[test]
    fn test_arena_indexing() {
        let mut ca = ClauseArena::default();
        let cr = ca.alloc(vec![Literal::from(1), Literal::from(-2)], false, 1);
        assert_eq!(2, ca[cr].len());
        assert_eq!(Literal::from(-2), ca[cr][1]);
        assert!(!ca[cr].learnt);
        ca[cr].swap_lits(0, 1);
        assert_eq!(Literal::from(-2), ca[cr][0]);
    }
}
