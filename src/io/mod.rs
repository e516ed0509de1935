mod dimacs;
pub use dimacs::DimacsReader;

mod inputs;
pub use inputs::read_projected;
pub use inputs::read_weights;
