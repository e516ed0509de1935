mod cnf;
pub use cnf::CnfFormula;

mod literals;
pub use literals::Literal;
pub use literals::Var;

mod numbers;
pub use numbers::Num;

mod system;
pub(crate) use system::process_memory_mb;

mod weights;
pub use weights::ProjectedVars;
pub use weights::Weights;
