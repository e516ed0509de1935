#![doc = include_str!("../README.md")]

mod cache;
pub use cache::BucketManager;
pub use cache::CacheMode;
pub use cache::CacheSettings;
pub use cache::ComponentCache;
pub use cache::ReductionStrategy;
pub use cache::StoreMode;

mod core;
pub use core::CnfFormula;
pub use core::Literal;
pub use core::Num;
pub use core::ProjectedVars;
pub use core::Var;
pub use core::Weights;

mod dag;
pub use dag::Branch;
pub use dag::DdnnfWriter;
pub use dag::DecisionDnnf;
pub use dag::EvaluationContext;
pub use dag::Node;
pub use dag::NodeIndex;

mod engine;
pub use engine::parse_preproc_pipeline;
pub use engine::Compiler;
pub use engine::Components;
pub use engine::EngineConfig;
pub use engine::ModelCounter;
pub use engine::OccurrenceManager;
pub use engine::Preproc;
pub use engine::PreprocPass;

mod heuristics;
pub use heuristics::Partitioner;
pub use heuristics::PartitionerConfig;
pub use heuristics::PartitionerKind;
pub use heuristics::PhaseHeuristicKind;
pub use heuristics::VariableHeuristic;
pub use heuristics::VariableHeuristicKind;

mod io;
pub use io::read_projected;
pub use io::read_weights;
pub use io::DimacsReader;

mod sat;
pub use sat::Clause;
pub use sat::ClauseRef;
pub use sat::SolveStatus;
pub use sat::Solver;
pub use sat::Value;
