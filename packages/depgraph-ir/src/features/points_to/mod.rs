//! Points-to analysis over the pointer state subgraph
//!
//! The module is split the usual way: domain models (offsets, pointers,
//! memory objects, the PSS itself), the PSS builder, and two worklist
//! solvers sharing one core loop. Flow-insensitive keeps one memory object
//! per allocation site; flow-sensitive keeps one memory map per program
//! point.

pub mod domain;
pub mod infrastructure;

pub use domain::{MemoryMap, MemoryObject, Offset, Pointer, PointerSubgraph, PointsToSet};
pub use infrastructure::flow_insensitive::{solve_flow_insensitive, FlowInsensitiveResult};
pub use infrastructure::flow_sensitive::{solve_flow_sensitive, FlowSensitiveResult};
pub use infrastructure::pss_builder::build_pss;
pub use infrastructure::solver::SolverStats;
