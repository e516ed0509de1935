mod eval;
pub use eval::EvaluationContext;

mod graph;
pub use graph::Branch;
pub use graph::DecisionDnnf;
pub use graph::Node;
pub use graph::NodeIndex;
pub use graph::FALSE_NODE;
pub use graph::TRUE_NODE;

mod writer;
pub use writer::DdnnfWriter;
