//! Typed, region-indexed views over the analyzer's report files.
//!
//! Every store here is rebuilt from scratch after each build. Nothing is
//! patched in place across rounds.

mod error;
pub mod deserializer;
pub mod field;
pub mod files;
pub mod method;
pub mod store;
pub mod tracker;

pub use deserializer::{Deserializer, SerializationVersion};
pub use error::{IndexError, Result};
pub use field::{FieldDeclarationStore, FieldInitStore};
pub use method::{MethodHierarchy, MethodRecord, MethodRegistry, Visibility};
pub use store::{Index, IndexKey, Keyed, TrackerNode};
pub use tracker::{CompoundRegionTracker, FieldRegionTracker, MethodRegionTracker, ParameterRegionTracker, RegionTracker};
