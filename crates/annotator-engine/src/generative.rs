//! Rewrites of whole methods for dereference errors no annotation can fix.

use std::collections::BTreeMap;

use annotator_ai::MethodFixer;
use annotator_core::{method_name, ErrorKind, ErrorRecord, Region};

use crate::context::Context;
use crate::snapshot::Snapshot;
use crate::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerativeOutcome {
    pub attempted: usize,
    pub kept: usize,
}

/// The first unfixable dereference error of each method region.
fn targets(snapshot: &Snapshot) -> BTreeMap<Region, &ErrorRecord> {
    let mut targets = BTreeMap::new();
    for error in snapshot.unfixable_errors() {
        if error.kind == ErrorKind::Dereference && !error.region.is_class_scope() {
            targets.entry(error.region.clone()).or_insert(error);
        }
    }
    targets
}

/// Asks `fixer` for a rewrite of every method with an unfixable dereference.
/// A rewrite is kept when the rebuilt method reports fewer errors, and
/// reverted otherwise. Returns the snapshot of the final sources.
pub fn apply_generative_fixes(
    ctx: &mut Context,
    fixer: &dyn MethodFixer,
    snapshot: Snapshot,
) -> Result<(Snapshot, GenerativeOutcome)> {
    let mut outcome = GenerativeOutcome::default();
    let mut current = snapshot;
    let plans: Vec<(Region, Option<std::path::PathBuf>, String)> = targets(&current)
        .into_iter()
        .map(|(region, error)| (region, error.path.clone(), error.message.clone()))
        .collect();

    for (region, path, message) in plans {
        let Some(location) = current.method_location(&region, path.as_deref()) else {
            continue;
        };
        let Some(text) = ctx.injector().method_text(&location)? else {
            continue;
        };
        outcome.attempted += 1;
        let Some(rewritten) = fixer.rewrite_method(method_name(&region.member), &text, &message) else {
            continue;
        };
        let Some(rewrite) = ctx.injector().rewrite_method(&location, &rewritten)? else {
            tracing::debug!(region = %region, "generated method did not match the original declaration");
            continue;
        };

        let before = current.error_count([&region]);
        let after = match ctx.build_target(false) {
            Ok(after) => after,
            Err(err) => {
                rewrite.revert()?;
                return Err(err);
            }
        };
        if after.error_count([&region]) < before {
            tracing::info!(region = %region, "kept generated method rewrite");
            outcome.kept += 1;
            current = after;
        } else {
            tracing::debug!(region = %region, "reverting generated method rewrite");
            rewrite.revert()?;
        }
    }
    Ok((current, outcome))
}
