/*
 * depgraph-ir - Program Dependence Graph + Points-to Analysis
 *
 * Feature-First Architecture:
 * - shared/      : IR data model consumed from the provider
 * - features/    : Vertical slices (dep_graph -> traversal -> data_flow -> points_to)
 * - adapters/    : DOT and plain-text renderers
 *
 * The analysis runs in a single logical thread; fixpoint convergence is
 * guaranteed by monotone transfers over finite lattices.
 */

#![allow(clippy::upper_case_acronyms)] // PDG, PSS naming
#![allow(clippy::new_without_default)]

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports
// ═══════════════════════════════════════════════════════════════════════════

/// Shared models (IR provider data model)
pub mod shared;

/// Feature modules
pub mod features;

/// Output adapters (DOT, plain text)
pub mod adapters;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use errors::{DepGraphError, Result};
pub use features::dep_graph::{analyze_module, build_module, DepGraph, ModuleAnalysis, Subgraph};
pub use features::points_to::{
    build_pss, solve_flow_insensitive, solve_flow_sensitive, PointerSubgraph,
};
pub use shared::models::ir::Module;
