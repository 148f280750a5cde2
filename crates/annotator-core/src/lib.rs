//! Core shared types for the nullability annotator.
//!
//! Everything here is plain data: regions, locations, fixes, analyzer errors
//! and the text-edit primitives the injector uses. No I/O happens in this
//! crate.

pub mod edit;
mod error;
mod fix;
mod location;
mod region;

pub use error::{ErrorRecord, ErrorKind};
pub use fix::{Fix, NULLABLE_TAG};
pub use location::{method_name, Location, LocationKind, LocationParseError};
pub use region::Region;
pub use text_size::{TextRange, TextSize};

/// Strips the `file:` scheme some analyzers prepend to source paths.
pub fn strip_file_scheme(uri: &str) -> &str {
    let trimmed = uri.strip_prefix("file://").or_else(|| uri.strip_prefix("file:"));
    trimmed.unwrap_or(uri)
}

/// Returns the simple name of a flat class name (`a.b.Outer$Inner` -> `Inner`).
pub fn simple_class_name(class: &str) -> &str {
    let tail = class.rsplit('.').next().unwrap_or(class);
    tail.rsplit('$').next().unwrap_or(tail)
}
