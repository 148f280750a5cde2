//! Version-specific row decoding for errors, fixes and tracker edges.

use std::path::PathBuf;

use annotator_core::{strip_file_scheme, ErrorKind, ErrorRecord, Fix, Location, Region, NULLABLE_TAG};

use crate::field::FieldDeclarationStore;
use crate::store::TrackerNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationVersion {
    /// Errors without offsets; fixes in a separate `fixes.tsv`.
    V1,
    /// Errors with offset and path; fixes derived from errors.
    V3,
}

impl SerializationVersion {
    pub fn from_number(version: u8) -> Option<Self> {
        match version {
            1 => Some(SerializationVersion::V1),
            3 => Some(SerializationVersion::V3),
            _ => None,
        }
    }

    pub fn error_columns(self) -> usize {
        match self {
            SerializationVersion::V1 => 10,
            SerializationVersion::V3 => 12,
        }
    }

    /// Whether suggested fixes come from `fixes.tsv` rather than from errors.
    pub fn has_fix_file(self) -> bool {
        matches!(self, SerializationVersion::V1)
    }
}

/// Decodes analyzer rows for one load. Version 1 has no offsets, so every
/// error gets a synthetic, incrementing one to keep errors distinct.
#[derive(Debug, Clone)]
pub struct Deserializer {
    version: SerializationVersion,
    annotation: String,
    next_offset: u32,
    keep_unresolved: bool,
}

const FIX_COLUMNS: usize = 10;

impl Deserializer {
    pub fn new(version: SerializationVersion, annotation: impl Into<String>) -> Self {
        Self {
            version,
            annotation: annotation.into(),
            next_offset: 0,
            keep_unresolved: false,
        }
    }

    /// Keep resolving fixes whose source file does not exist. Downstream
    /// builds see the target module as a jar, so fixes on target code carry
    /// paths that only the target's method metadata can resolve.
    pub fn keep_unresolved_fixes(mut self) -> Self {
        self.keep_unresolved = true;
        self
    }

    pub fn version(&self) -> SerializationVersion {
        self.version
    }

    /// Decodes one `errors.tsv` row. The error's resolving fix is dropped
    /// when it points into a source file that does not exist (library or
    /// generated code); the error itself is kept and becomes unfixable.
    pub fn deserialize_error(
        &mut self,
        row: &[&str],
        fields: &FieldDeclarationStore,
    ) -> Result<Option<ErrorRecord>, String> {
        let expected = self.version.error_columns();
        if row.len() != expected {
            return Err(format!("expected {expected} columns for an error, found {}", row.len()));
        }
        let kind = ErrorKind::parse(row[0]);
        let message = row[1].to_string();
        let region = Region::new(row[2], row[3]);
        let (offset, path, location_columns) = match self.version {
            SerializationVersion::V1 => {
                let offset = self.next_offset;
                self.next_offset += 1;
                (offset, None, &row[4..10])
            }
            SerializationVersion::V3 => {
                let offset = row[4]
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| format!("invalid error offset `{}`", row[4]))?;
                let path = match row[5].trim() {
                    "" | "null" => None,
                    raw => Some(PathBuf::from(strip_file_scheme(raw))),
                };
                (offset, path, &row[6..12])
            }
        };

        let location = Location::from_columns(location_columns).map_err(|err| err.to_string())?;
        let location = match location {
            Some(location) => Some(location),
            None if kind == ErrorKind::FieldNoInit => uninitialized_field(&message)
                .and_then(|field| fields.location_on_field(&region.class, field)),
            None => None,
        };
        let location = location.map(|location| self.expand_field_location(location, fields));
        let resolving_fix = location.and_then(|location| {
            if self.keep_unresolved || location.path().exists() {
                Some(
                    Fix::new(location, self.annotation.clone())
                        .with_reason(kind.as_str())
                        .with_region(region.clone()),
                )
            } else {
                tracing::warn!(
                    location = %location,
                    path = %location.path().display(),
                    "dropping resolving fix in missing source file"
                );
                None
            }
        });

        Ok(Some(ErrorRecord {
            kind,
            message,
            region,
            offset,
            path,
            resolving_fix,
        }))
    }

    /// Decodes one `fixes.tsv` row:
    /// location (6 columns), reason, annotation, enclosing class, enclosing member.
    pub fn deserialize_fix(&self, row: &[&str], fields: &FieldDeclarationStore) -> Result<Option<Fix>, String> {
        if row.len() != FIX_COLUMNS {
            return Err(format!("expected {FIX_COLUMNS} columns for a fix, found {}", row.len()));
        }
        if row[7] != NULLABLE_TAG {
            return Err(format!("unsupported annotation `{}`", row[7]));
        }
        let Some(location) = Location::from_columns(&row[0..6]).map_err(|err| err.to_string())? else {
            return Ok(None);
        };
        if !location.path().exists() {
            tracing::warn!(path = %location.path().display(), "dropping fix in missing source file");
            return Ok(None);
        }
        let location = self.expand_field_location(location, fields);
        Ok(Some(
            Fix::new(location, self.annotation.clone())
                .with_reason(row[6])
                .with_region(Region::new(row[8], row[9])),
        ))
    }

    pub fn deserialize_tracker_node(&self, row: &[&str]) -> Result<TrackerNode, String> {
        TrackerNode::from_row(row)
    }

    /// One annotation covers a whole declaration statement, so a field fix
    /// always targets every variable declared alongside it.
    fn expand_field_location(&self, location: Location, fields: &FieldDeclarationStore) -> Location {
        match location {
            Location::Field {
                class,
                path,
                variables,
            } => {
                let variables = fields.group_of(&class, &variables);
                Location::Field {
                    class,
                    path,
                    variables,
                }
            }
            other => other,
        }
    }
}

/// Extracts `foo` from `@NonNull field foo not initialized`.
fn uninitialized_field(message: &str) -> Option<&str> {
    let rest = &message[message.find("field ")? + "field ".len()..];
    rest.split_whitespace().next()
}
