use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::AnnotatorConfig;

/// JSON schema for the annotator's config file.
#[must_use]
pub fn json_schema() -> RootSchema {
    schema_for!(AnnotatorConfig)
}
