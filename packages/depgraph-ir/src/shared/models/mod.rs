pub mod ir;

pub use ir::{Block, CfgEdge, CfgEdgeKind, Function, InstKind, Instruction, Module, ValueId};
