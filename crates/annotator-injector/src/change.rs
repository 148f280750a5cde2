use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use annotator_core::edit::OffsetMap;
use annotator_core::{Fix, Location};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Remove,
}

/// One annotation change at one location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnnotationEdit {
    pub location: Location,
    /// Fully qualified annotation name, or a simple name for annotations
    /// that need no import.
    pub annotation: String,
    pub kind: ChangeKind,
}

impl AnnotationEdit {
    pub fn add(location: Location, annotation: impl Into<String>) -> Self {
        Self {
            location,
            annotation: annotation.into(),
            kind: ChangeKind::Add,
        }
    }

    pub fn remove(location: Location, annotation: impl Into<String>) -> Self {
        Self {
            location,
            annotation: annotation.into(),
            kind: ChangeKind::Remove,
        }
    }

    pub fn from_fix(fix: &Fix) -> Self {
        Self::add(fix.location.clone(), fix.annotation.clone())
    }

    /// The edit undoing this one.
    pub fn reverse(&self) -> Self {
        let kind = match self.kind {
            ChangeKind::Add => ChangeKind::Remove,
            ChangeKind::Remove => ChangeKind::Add,
        };
        Self {
            location: self.location.clone(),
            annotation: self.annotation.clone(),
            kind,
        }
    }

    pub fn simple_annotation(&self) -> &str {
        self.annotation.rsplit('.').next().unwrap_or(&self.annotation)
    }
}

impl fmt::Display for AnnotationEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind {
            ChangeKind::Add => "add",
            ChangeKind::Remove => "remove",
        };
        write!(f, "{verb} @{} on {}", self.simple_annotation(), self.location)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// The source text changed.
    Applied,
    /// Nothing to do: the annotation was already present (add) or absent
    /// (remove).
    Unchanged,
    Failed(String),
}

impl EditOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, EditOutcome::Failed(_))
    }
}

/// Per-edit outcomes of one batch, plus one offset map per rewritten file.
#[derive(Debug, Clone, Default)]
pub struct InjectionReport {
    pub outcomes: Vec<(AnnotationEdit, EditOutcome)>,
    pub offsets: BTreeMap<PathBuf, OffsetMap>,
}

impl InjectionReport {
    pub fn applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == EditOutcome::Applied)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &(AnnotationEdit, EditOutcome)> {
        self.outcomes.iter().filter(|(_, outcome)| !outcome.is_success())
    }
}
