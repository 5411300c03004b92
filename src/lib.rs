// Welling: regional policy vs. citizen sentiment gap analysis
//
// This is the library root. `engine` is the pure analysis core; the other
// modules are storage, file loading, the language model, and the flows that
// tie them together.

pub mod config;
pub mod db;
pub mod engine;
pub mod files;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod status;
