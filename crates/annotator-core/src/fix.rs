use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::{Location, Region};

/// Annotation column value the analyzer uses for nullability suggestions.
pub const NULLABLE_TAG: &str = "nullable";

/// A suggested annotation on a [`Location`].
///
/// Identity is the location alone: two fixes on the same location compare
/// equal regardless of provenance. Use [`Fix::merge`] to union reasons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fix {
    pub location: Location,
    /// Fully qualified annotation name, e.g. `javax.annotation.Nullable`.
    pub annotation: String,
    #[serde(default)]
    pub reasons: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
}

impl Fix {
    pub fn new(location: Location, annotation: impl Into<String>) -> Self {
        Self {
            location,
            annotation: annotation.into(),
            reasons: BTreeSet::new(),
            region: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.insert(reason.into());
        self
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn merge(&mut self, other: &Fix) {
        debug_assert_eq!(self.location, other.location);
        self.reasons.extend(other.reasons.iter().cloned());
        if self.region.is_none() {
            self.region = other.region.clone();
        }
    }

    pub fn is_on_method(&self) -> bool {
        matches!(self.location, Location::Method { .. })
    }

    pub fn is_on_field(&self) -> bool {
        matches!(self.location, Location::Field { .. })
    }

    pub fn is_on_parameter(&self) -> bool {
        matches!(self.location, Location::Parameter { .. })
    }

    pub fn covers(&self, other: &Fix) -> bool {
        self.location.covers(&other.location)
    }
}

impl PartialEq for Fix {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location
    }
}

impl Eq for Fix {}

impl Hash for Fix {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.location.hash(state);
    }
}

impl PartialOrd for Fix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fix {
    fn cmp(&self, other: &Self) -> Ordering {
        self.location.cmp(&other.location)
    }
}

impl fmt::Display for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{} on {}", self.annotation, self.location)
    }
}
