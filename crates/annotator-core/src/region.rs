use serde::{Deserialize, Serialize};
use std::fmt;

/// Member name used for class-level scope (field initializers, static blocks).
const CLASS_SCOPE: &str = "null";

/// An enclosing code scope: `(class, member)`.
///
/// Equality is exact on both components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Region {
    pub class: String,
    pub member: String,
}

impl Region {
    pub fn new(class: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            member: member.into(),
        }
    }

    /// The class-wide region used for field initialization analysis.
    pub fn class_scope(class: impl Into<String>) -> Self {
        Self::new(class, CLASS_SCOPE)
    }

    pub fn is_class_scope(&self) -> bool {
        self.member == CLASS_SCOPE
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class, self.member)
    }
}
