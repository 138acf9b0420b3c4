//! Service layer: the four pipeline stages and their shared helpers.

pub mod assembler;
pub mod decomposer;
pub mod generator;
pub mod planner;
pub mod redundancy;
pub mod splitter;
pub mod text;

pub use assembler::assemble_chapter;
pub use decomposer::{decompose_chapter, decompose_subsection};
pub use generator::GenerationDriver;
pub use planner::LayoutPlanner;
pub use redundancy::RedundancyTracker;
pub use splitter::split_long_text;
