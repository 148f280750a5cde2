use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::{Fix, Region};

/// Checker error categories the engine treats specially. Everything else is
/// kept verbatim in [`ErrorKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    Dereference,
    FieldNoInit,
    MethodNoInit,
    ReturnNullable,
    PassNullable,
    AssignFieldNullable,
    WrongOverrideReturn,
    WrongOverrideParam,
    Other(String),
}

impl ErrorKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "DEREFERENCE_NULLABLE" | "DEREFERENCE" => ErrorKind::Dereference,
            "FIELD_NO_INIT" => ErrorKind::FieldNoInit,
            "METHOD_NO_INIT" => ErrorKind::MethodNoInit,
            "RETURN_NULLABLE" => ErrorKind::ReturnNullable,
            "PASS_NULLABLE" => ErrorKind::PassNullable,
            "ASSIGN_FIELD_NULLABLE" => ErrorKind::AssignFieldNullable,
            "WRONG_OVERRIDE_RETURN" => ErrorKind::WrongOverrideReturn,
            "WRONG_OVERRIDE_PARAM" => ErrorKind::WrongOverrideParam,
            other => ErrorKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorKind::Dereference => "DEREFERENCE_NULLABLE",
            ErrorKind::FieldNoInit => "FIELD_NO_INIT",
            ErrorKind::MethodNoInit => "METHOD_NO_INIT",
            ErrorKind::ReturnNullable => "RETURN_NULLABLE",
            ErrorKind::PassNullable => "PASS_NULLABLE",
            ErrorKind::AssignFieldNullable => "ASSIGN_FIELD_NULLABLE",
            ErrorKind::WrongOverrideReturn => "WRONG_OVERRIDE_RETURN",
            ErrorKind::WrongOverrideParam => "WRONG_OVERRIDE_PARAM",
            ErrorKind::Other(raw) => raw,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A nullability error reported by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    pub region: Region,
    /// Byte offset in the source file. Serialization versions that do not
    /// track offsets get a synthetic per-load counter instead.
    pub offset: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// The fix that would make this error disappear, if the analyzer knows one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolving_fix: Option<Fix>,
}

impl ErrorRecord {
    pub fn is_fixable(&self) -> bool {
        self.resolving_fix.is_some()
    }

    /// Whether some fix in `fixes` covers this error's resolving fix. Errors
    /// without a resolving fix are never resolvable.
    pub fn is_resolvable_by<'a, I>(&self, fixes: I) -> bool
    where
        I: IntoIterator<Item = &'a Fix>,
    {
        match &self.resolving_fix {
            Some(required) => fixes.into_iter().any(|fix| fix.covers(required)),
            None => false,
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {} (offset {}): {}", self.kind, self.region, self.offset, self.message)
    }
}
