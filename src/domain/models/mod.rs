//! Domain models: the document tree, generation units, and run config.

pub mod config;
pub mod document;
pub mod unit;

pub use config::{Config, ModelConfig, PlannerConfig, RetryConfig, SplitConfig};
pub use document::{BlockClass, BlockKind, Chapter, ContentBlock, Section, Subsection};
pub use unit::{
    BlockRef, BlockRole, GeneratedTextMap, GenerationUnit, Placement, SectionPlan, Skeleton,
    SubsectionPlan, UnitKind, FROM_CONTEXT_SENTINEL, SKIP_TOKEN,
};
