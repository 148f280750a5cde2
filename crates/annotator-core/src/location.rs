use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::strip_file_scheme;

/// Tag the analyzer uses for "no physical location".
const NULL_KIND: &str = "null";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LocationKind {
    Field,
    Method,
    Parameter,
}

impl LocationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LocationKind::Field => "FIELD",
            LocationKind::Method => "METHOD",
            LocationKind::Parameter => "PARAMETER",
        }
    }
}

/// Target of a nullability annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Location {
    /// One field declaration statement. `variables` holds every declarator
    /// the annotation applies to.
    Field {
        class: String,
        path: PathBuf,
        variables: BTreeSet<String>,
    },
    /// A method return type.
    Method {
        class: String,
        path: PathBuf,
        method: String,
    },
    Parameter {
        class: String,
        path: PathBuf,
        method: String,
        index: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationParseError {
    ColumnCount { expected: usize, found: usize },
    UnknownKind(String),
    InvalidIndex(String),
}

impl fmt::Display for LocationParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationParseError::ColumnCount { expected, found } => {
                write!(f, "expected {expected} location columns, found {found}")
            }
            LocationParseError::UnknownKind(kind) => write!(f, "unknown location kind `{kind}`"),
            LocationParseError::InvalidIndex(raw) => write!(f, "invalid parameter index `{raw}`"),
        }
    }
}

impl std::error::Error for LocationParseError {}

impl Location {
    pub const COLUMNS: usize = 6;

    pub fn field<I, S>(class: impl Into<String>, path: impl Into<PathBuf>, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Location::Field {
            class: class.into(),
            path: path.into(),
            variables: variables.into_iter().map(Into::into).collect(),
        }
    }

    pub fn method(class: impl Into<String>, path: impl Into<PathBuf>, method: impl Into<String>) -> Self {
        Location::Method {
            class: class.into(),
            path: path.into(),
            method: method.into(),
        }
    }

    pub fn parameter(
        class: impl Into<String>,
        path: impl Into<PathBuf>,
        method: impl Into<String>,
        index: usize,
    ) -> Self {
        Location::Parameter {
            class: class.into(),
            path: path.into(),
            method: method.into(),
            index,
        }
    }

    /// Parses the analyzer's six-column encoding
    /// `kind, class, method, variable, index, uri`.
    ///
    /// Returns `Ok(None)` when the kind column is the literal `null`.
    pub fn from_columns(columns: &[&str]) -> Result<Option<Location>, LocationParseError> {
        if columns.len() != Self::COLUMNS {
            return Err(LocationParseError::ColumnCount {
                expected: Self::COLUMNS,
                found: columns.len(),
            });
        }
        let kind = columns[0];
        if kind == NULL_KIND {
            return Ok(None);
        }
        let class = columns[1];
        let method = columns[2];
        let path = PathBuf::from(strip_file_scheme(columns[5]));
        let location = match kind {
            "FIELD" => Location::field(
                class,
                path,
                columns[3].split(',').map(str::trim).filter(|var| !var.is_empty()),
            ),
            "METHOD" => Location::method(class, path, method),
            "PARAMETER" => {
                let index = columns[4]
                    .parse::<usize>()
                    .map_err(|_| LocationParseError::InvalidIndex(columns[4].to_string()))?;
                Location::parameter(class, path, method, index)
            }
            other => return Err(LocationParseError::UnknownKind(other.to_string())),
        };
        Ok(Some(location))
    }

    /// Inverse of [`Location::from_columns`].
    pub fn to_columns(&self) -> [String; 6] {
        let path = self.path().display().to_string();
        match self {
            Location::Field { class, variables, .. } => [
                "FIELD".into(),
                class.clone(),
                NULL_KIND.into(),
                variables.iter().cloned().collect::<Vec<_>>().join(","),
                "0".into(),
                path,
            ],
            Location::Method { class, method, .. } => [
                "METHOD".into(),
                class.clone(),
                method.clone(),
                NULL_KIND.into(),
                "0".into(),
                path,
            ],
            Location::Parameter {
                class, method, index, ..
            } => [
                "PARAMETER".into(),
                class.clone(),
                method.clone(),
                NULL_KIND.into(),
                index.to_string(),
                path,
            ],
        }
    }

    pub fn kind(&self) -> LocationKind {
        match self {
            Location::Field { .. } => LocationKind::Field,
            Location::Method { .. } => LocationKind::Method,
            Location::Parameter { .. } => LocationKind::Parameter,
        }
    }

    pub fn class(&self) -> &str {
        match self {
            Location::Field { class, .. } | Location::Method { class, .. } | Location::Parameter { class, .. } => {
                class
            }
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Location::Field { path, .. } | Location::Method { path, .. } | Location::Parameter { path, .. } => path,
        }
    }

    /// Method signature for method and parameter locations.
    pub fn method_signature(&self) -> Option<&str> {
        match self {
            Location::Field { .. } => None,
            Location::Method { method, .. } | Location::Parameter { method, .. } => Some(method),
        }
    }

    pub fn field_variables(&self) -> Option<&BTreeSet<String>> {
        match self {
            Location::Field { variables, .. } => Some(variables),
            Location::Method { .. } | Location::Parameter { .. } => None,
        }
    }

    /// Whether annotating `self` also annotates `other`. Field locations cover
    /// any field location of the same class whose variables are a subset.
    pub fn covers(&self, other: &Location) -> bool {
        match (self, other) {
            (
                Location::Field { class, variables, .. },
                Location::Field {
                    class: other_class,
                    variables: other_variables,
                    ..
                },
            ) => class == other_class && other_variables.is_subset(variables),
            _ => self == other,
        }
    }

    /// True for a parameter of a constructor, i.e. a method whose name equals
    /// the simple name of its class.
    pub fn is_constructor_parameter(&self) -> bool {
        match self {
            Location::Parameter { class, method, .. } => {
                method_name(method) == crate::simple_class_name(class)
            }
            Location::Field { .. } | Location::Method { .. } => false,
        }
    }
}

/// `foo(int,java.lang.Object)` -> `foo`.
pub fn method_name(signature: &str) -> &str {
    signature.split('(').next().unwrap_or(signature).trim()
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Field { class, variables, .. } => {
                let vars = variables.iter().cloned().collect::<Vec<_>>().join(",");
                write!(f, "FIELD {class}#{{{vars}}}")
            }
            Location::Method { class, method, .. } => write!(f, "METHOD {class}#{method}"),
            Location::Parameter {
                class, method, index, ..
            } => write!(f, "PARAMETER {class}#{method}[{index}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_each_kind() {
        let field = Location::from_columns(&["FIELD", "a.C", "null", "x,y", "0", "file:/src/C.java"])
            .unwrap()
            .unwrap();
        assert_eq!(field, Location::field("a.C", "/src/C.java", ["x", "y"]));

        let method = Location::from_columns(&["METHOD", "a.C", "m(int)", "null", "0", "/src/C.java"])
            .unwrap()
            .unwrap();
        assert_eq!(method.method_signature(), Some("m(int)"));

        let param = Location::from_columns(&["PARAMETER", "a.C", "m(int,Object)", "o", "1", "/src/C.java"])
            .unwrap()
            .unwrap();
        assert_eq!(param, Location::parameter("a.C", "/src/C.java", "m(int,Object)", 1));
    }

    #[test]
    fn null_kind_means_no_location() {
        let parsed = Location::from_columns(&["null", "null", "null", "null", "null", "null"]).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn rejects_unknown_kind_and_bad_index() {
        assert_eq!(
            Location::from_columns(&["LOCAL", "a", "b", "c", "0", "p"]),
            Err(LocationParseError::UnknownKind("LOCAL".into()))
        );
        assert!(matches!(
            Location::from_columns(&["PARAMETER", "a", "b()", "c", "x", "p"]),
            Err(LocationParseError::InvalidIndex(_))
        ));
        assert!(matches!(
            Location::from_columns(&["METHOD", "a"]),
            Err(LocationParseError::ColumnCount { expected: 6, found: 2 })
        ));
    }

    #[test]
    fn columns_survive_a_round_trip() {
        let loc = Location::parameter("a.C", "/src/C.java", "m(int,Object)", 1);
        let cols = loc.to_columns();
        let refs: Vec<&str> = cols.iter().map(String::as_str).collect();
        assert_eq!(Location::from_columns(&refs).unwrap(), Some(loc));
    }

    #[test]
    fn constructor_parameters_are_detected() {
        assert!(Location::parameter("a.Outer$Box", "/B.java", "Box(Object)", 0).is_constructor_parameter());
        assert!(!Location::parameter("a.Box", "/B.java", "make(Object)", 0).is_constructor_parameter());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(Location::method("a.C", "/C.java", "m()")).unwrap();
        assert_eq!(json["kind"], "METHOD");
        assert_eq!(json["method"], "m()");
    }
}
