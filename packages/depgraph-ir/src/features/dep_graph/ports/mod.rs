//! Ports of the dep_graph feature

use crate::shared::models::ir::Function;
use rustc_hash::FxHashMap;

/// Supplier of immediate post-dominators for a function's CFG
///
/// The returned map is keyed by IR block index. `Some(idx)` names the
/// immediate post-dominator block; `None` attaches the block to the
/// sentinel root (no immediate post-dominator, e.g. the endpoints of the
/// function). A top-level `None` means no post-dominator data exists for
/// the function at all, which happens when nothing reaches an exit.
pub trait PostDominatorProvider {
    fn immediate_post_dominators(
        &self,
        func: &Function,
    ) -> Option<FxHashMap<usize, Option<usize>>>;
}
