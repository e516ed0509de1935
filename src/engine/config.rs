use crate::cache::{CacheSettings, StoreMode};
use crate::heuristics::{PartitionerConfig, PhaseHeuristicKind, VariableHeuristicKind};

/// The knobs shared by the compiler and the counter.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// The variable scoring method.
    pub var_heuristic: VariableHeuristicKind,
    /// The phase selection policy.
    pub phase_heuristic: PhaseHeuristicKind,
    /// Invert the phase chosen by the phase heuristic.
    pub reverse_polarity: bool,
    /// The partitioning heuristic configuration.
    pub partitioner: PartitionerConfig,
    /// The component-cache configuration.
    pub cache: CacheSettings,
    /// Which clauses take part in the cache keys.
    pub store_mode: StoreMode,
    /// The precision, in bits, of the floats used for weighted counting.
    pub precision: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            var_heuristic: VariableHeuristicKind::Vsads,
            phase_heuristic: PhaseHeuristicKind::True,
            reverse_polarity: false,
            partitioner: PartitionerConfig::default(),
            cache: CacheSettings::default(),
            store_mode: StoreMode::NotTouched,
            precision: 128,
        }
    }
}
