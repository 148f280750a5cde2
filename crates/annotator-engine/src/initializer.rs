use std::collections::{BTreeMap, BTreeSet};

use annotator_core::{ErrorKind, Location};
use annotator_index::{files, FieldInitStore};
use annotator_injector::AnnotationEdit;

use crate::context::Context;
use crate::snapshot::Snapshot;
use crate::Result;

/// Uninitialized fields per class, from `FIELD_NO_INIT` errors.
pub fn uninitialized_fields(snapshot: &Snapshot) -> BTreeMap<String, BTreeSet<String>> {
    let mut by_class: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for error in snapshot.errors.iter().filter(|error| error.kind == ErrorKind::FieldNoInit) {
        let Some(fix) = &error.resolving_fix else {
            continue;
        };
        if let Location::Field { class, variables, .. } = &fix.location {
            by_class.entry(class.clone()).or_default().extend(variables.iter().cloned());
        }
    }
    by_class
}

/// One initializer per class: the method initializing the most of its
/// uninitialized fields.
pub fn initializer_edits(
    uninitialized: &BTreeMap<String, BTreeSet<String>>,
    inits: &FieldInitStore,
    annotation: &str,
) -> Vec<AnnotationEdit> {
    uninitialized
        .iter()
        .filter_map(|(class, fields)| inits.find_initializer(class, fields))
        .collect::<BTreeSet<Location>>()
        .into_iter()
        .map(|method| AnnotationEdit::add(method, annotation))
        .collect()
}

/// Annotates inferred initializer methods. Returns how many were annotated.
pub fn infer_initializers(ctx: &mut Context, snapshot: &Snapshot) -> Result<usize> {
    let uninitialized = uninitialized_fields(snapshot);
    if uninitialized.is_empty() {
        return Ok(0);
    }
    let inits = FieldInitStore::load(&[ctx.config().target_dir().join(files::FIELD_INIT)])?;
    let annotation = ctx.config().initializer_annotation.clone();
    let edits = initializer_edits(&uninitialized, &inits, &annotation);
    let report = ctx.apply_edits(&edits)?;
    let applied = report.applied();
    tracing::info!(classes = uninitialized.len(), initializers = applied, "annotated initializer methods");
    Ok(applied)
}
