//! Generic iterative data-flow analysis

pub mod infrastructure;

pub use infrastructure::framework::{BlockDataFlow, DataFlowStats};
