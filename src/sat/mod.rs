mod heap;

mod solver;
pub use solver::SolveStatus;
pub use solver::Solver;

mod types;
pub use types::Clause;
pub use types::ClauseRef;
pub use types::Value;
