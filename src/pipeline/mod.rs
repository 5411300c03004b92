// Pipelines — multi-step flows over the store, vector files, and the
// language model. Each submodule backs one or two CLI commands.

pub mod action;
pub mod batch;
pub mod diagnosis;
pub mod gaps;
pub mod search;
pub mod sentiment;
