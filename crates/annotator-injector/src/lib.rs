//! Adds and removes annotations in Java source files.
//!
//! Edits are declaration-level: an annotation is inserted at the start of a
//! field, method or parameter declaration and removed from the same place.
//! Every file touched in one batch is rewritten once, and the resulting
//! [`OffsetMap`](annotator_core::edit::OffsetMap) is recorded so analyzer
//! offsets reported against the edited file can be mapped back.

mod change;
mod error;
mod injector;
mod offsets;

pub use change::{AnnotationEdit, ChangeKind, EditOutcome, InjectionReport};
pub use error::{InjectError, Result};
pub use injector::{Injector, MethodRewrite};
pub use offsets::FileOffsetStore;
