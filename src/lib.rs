//! Bookloom - Textbook Rewrite Pipeline
//!
//! Bookloom takes a structured textbook chapter (sections, subsections,
//! content blocks) and produces a rewritten version of the same chapter:
//! the structural identity is preserved (block ids, heading numbering,
//! list shapes) while the prose is regenerated, auxiliary deepening and
//! practice call-out boxes are inserted, and scannable micro-headings
//! are added.
//!
//! # Architecture
//!
//! The crate is layered:
//!
//! - **Domain Layer** (`domain`): the document tree, generation units,
//!   skeleton and text-map artifacts, and the ports to the external
//!   generation/planning capabilities
//! - **Service Layer** (`services`): the four pipeline stages:
//!   decomposer, planner, generation driver, assembler
//! - **Infrastructure Layer** (`infrastructure`): the Anthropic API
//!   adapter, retry policy, config loading, and artifact file IO
//! - **CLI Layer** (`cli`): per-stage subcommands
//!
//! # Pipeline
//!
//! ```text
//! tree ──decompose──▶ skeleton ──plan──▶ skeleton' ──generate──▶ text map
//!                                                                   │
//! tree + skeleton' + text map ──assemble──▶ rewritten tree ◀─────────┘
//! ```
//!
//! The stages communicate only through two serializable artifacts (the
//! skeleton and the unit-id → text map), so planning runs once while
//! generation and assembly can be re-run without re-decomposing.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult, GenerateError};
pub use domain::models::{
    BlockClass, BlockKind, Chapter, Config, ContentBlock, GeneratedTextMap, GenerationUnit,
    Section, Skeleton, Subsection, UnitKind,
};
pub use domain::ports::{LayoutAdvisor, PlanAdvice, TextGenerator};
pub use infrastructure::config::ConfigLoader;
pub use services::{assemble_chapter, decompose_chapter, GenerationDriver, LayoutPlanner};
