//! Iterative nullability annotation inference.
//!
//! Each round builds the target with the analyzer attached, turns every
//! suggested fix into a [`Node`](graph::Node), expands it into a tree of
//! companion fixes, and scores the trees by injecting them in batches of
//! non-conflicting nodes and rebuilding. Trees that strictly reduce the error
//! count are kept, and the loop repeats until no tree helps.

mod annotator;
mod cache;
mod context;
pub mod downstream;
mod error;
mod evaluator;
mod generative;
pub mod graph;
mod initializer;
pub mod report;
mod snapshot;

pub use annotator::{Annotator, RunSummary};
pub use cache::{CachedEffect, EffectCache};
pub use context::Context;
pub use downstream::{DownstreamImpactModel, DownstreamModel, LibraryModel, LocalOnly};
pub use error::{EngineError, Result};
pub use generative::GenerativeOutcome;
pub use report::{Report, RunLog};
pub use snapshot::{Snapshot, SnapshotSource};
