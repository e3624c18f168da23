//! Cycle-safe traversals over nodes and blocks

pub mod infrastructure;

pub use infrastructure::block_walk::{dfs_blocks, walk_blocks, BlockWalkFlags};
pub use infrastructure::nodes_walk::{walk_nodes, WalkEdges};
