use crate::{Literal, Var};
use bitvec::{bitvec, vec::BitVec};

/// The literal-weight table used for weighted model counting.
///
/// Each literal has a weight, defaulting to 1.
/// The weight of a variable is the sum of the weights of its two literals.
pub struct Weights {
    lit_weights: Vec<f64>,
}

impl Weights {
    /// Builds a weight table where every literal weights 1.
    #[must_use]
    pub fn new(n_vars: usize) -> Self {
        Self {
            lit_weights: vec![1.; n_vars << 1],
        }
    }

    /// Sets the weight of a literal.
    pub fn set_weight(&mut self, l: Literal, weight: f64) {
        self.lit_weights[l.index()] = weight;
    }

    /// Returns the weight of a literal.
    #[must_use]
    pub fn weight(&self, l: Literal) -> f64 {
        self.lit_weights[l.index()]
    }

    /// Returns the weight of a variable, that is the sum of the weights of its two literals.
    #[must_use]
    pub fn var_weight(&self, v: Var) -> f64 {
        self.lit_weights[v << 1] + self.lit_weights[(v << 1) | 1]
    }

    /// Returns the number of variables the table was built for.
    #[must_use]
    pub fn n_vars(&self) -> usize {
        self.lit_weights.len() >> 1
    }

    /// Returns `true` if every literal weight is an integer.
    ///
    /// In this case, counting can be done with unbounded integers instead of floats.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        self.lit_weights.iter().all(|w| w.fract() == 0.)
    }
}

/// The set of projected variables, that is the variables the model count is restricted to.
#[derive(Clone)]
pub struct ProjectedVars(BitVec);

impl ProjectedVars {
    /// Builds the default projection, in which every variable is projected.
    #[must_use]
    pub fn all(n_vars: usize) -> Self {
        Self(bitvec![1; n_vars])
    }

    /// Builds a projection restricted to the given variables.
    #[must_use]
    pub fn from_vars(n_vars: usize, vars: &[Var]) -> Self {
        let mut bv = bitvec![0; n_vars];
        for v in vars {
            bv.set(*v, true);
        }
        Self(bv)
    }

    /// Returns `true` if the variable belongs to the projection.
    #[must_use]
    pub fn contains(&self, v: Var) -> bool {
        self.0[v]
    }

    /// Returns the number of projected variables.
    #[must_use]
    pub fn count(&self) -> usize {
        self.0.count_ones()
    }
}
