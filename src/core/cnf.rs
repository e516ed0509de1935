use crate::{Literal, Var};
use anyhow::Result;
use std::io::Write;

/// A CNF formula: a number of variables and a conjunction of clauses.
pub struct CnfFormula {
    n_vars: usize,
    clauses: Vec<Vec<Literal>>,
}

impl CnfFormula {
    /// Builds an empty formula over the given number of variables.
    #[must_use]
    pub fn new(n_vars: usize) -> Self {
        Self {
            n_vars,
            clauses: Vec::new(),
        }
    }

    /// Builds a formula from raw clause data.
    ///
    /// # Panics
    ///
    /// This function panics if a clause refers to a variable outside the formula.
    #[must_use]
    pub fn from_clauses(n_vars: usize, clauses: Vec<Vec<Literal>>) -> Self {
        assert!(
            clauses
                .iter()
                .all(|c| c.iter().all(|l| l.var_index() < n_vars)),
            "a clause refers to a variable outside the formula"
        );
        Self { n_vars, clauses }
    }

    /// Adds a clause to the formula.
    pub fn add_clause(&mut self, clause: Vec<Literal>) {
        self.clauses.push(clause);
    }

    /// Replaces the clauses of the formula.
    pub fn set_clauses(&mut self, clauses: Vec<Vec<Literal>>) {
        self.clauses = clauses;
    }

    /// Returns the number of variables of the formula.
    #[must_use]
    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    /// Returns the clauses of the formula.
    #[must_use]
    pub fn clauses(&self) -> &[Vec<Literal>] {
        &self.clauses
    }

    /// Returns the variables of the formula, in increasing order.
    #[must_use]
    pub fn variables(&self) -> Vec<Var> {
        (0..self.n_vars).collect()
    }

    /// Writes the formula in the DIMACS format.
    ///
    /// # Errors
    ///
    /// An error is returned if an I/O exception occurs.
    pub fn write_dimacs<W>(&self, mut writer: W) -> Result<()>
    where
        W: Write,
    {
        writeln!(writer, "p cnf {} {}", self.n_vars, self.clauses.len())?;
        for clause in &self.clauses {
            for l in clause {
                write!(writer, "{l} ")?;
            }
            writeln!(writer, "0")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lits(dimacs: &[isize]) -> Vec<Literal> {
        dimacs.iter().map(|n| Literal::from(*n)).collect()
    }

    #[test]
    fn test_write_dimacs() {
        let cnf = CnfFormula::from_clauses(3, vec![lits(&[1, 2]), lits(&[-1, 3])]);
        let mut buffer = Vec::new();
        cnf.write_dimacs(&mut buffer).unwrap();
        assert_eq!(
            "p cnf 3 2\n1 2 0\n-1 3 0\n",
            String::from_utf8(buffer).unwrap()
        );
    }

    #[test]
    #[should_panic(expected = "outside the formula")]
    fn test_out_of_range_clause() {
        let _ = CnfFormula::from_clauses(1, vec![lits(&[1, 2])]);
    }
}
