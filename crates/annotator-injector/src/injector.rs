use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use annotator_core::edit::{apply_text_edits, TextEdit};
use annotator_core::{simple_class_name, Location, TextRange, TextSize};
use annotator_syntax::java::{self, ast};
use annotator_syntax::Span;

use crate::change::{AnnotationEdit, ChangeKind, EditOutcome, InjectionReport};
use crate::{InjectError, Result};

/// Applies [`AnnotationEdit`]s to source files on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct Injector;

/// A whole-method replacement that can be undone.
#[derive(Debug, Clone)]
pub struct MethodRewrite {
    pub path: PathBuf,
    original: String,
}

impl MethodRewrite {
    pub fn revert(self) -> Result<()> {
        write_file(&self.path, &self.original)
    }
}

impl Injector {
    pub fn new() -> Self {
        Injector
    }

    /// Applies `edits`, grouped by file. Edits that cannot be resolved in
    /// their file are reported as failed; I/O errors abort the batch.
    pub fn apply(&self, edits: &[AnnotationEdit]) -> Result<InjectionReport> {
        let mut by_file: BTreeMap<&Path, Vec<&AnnotationEdit>> = BTreeMap::new();
        for edit in edits {
            by_file.entry(edit.location.path()).or_default().push(edit);
        }

        let mut report = InjectionReport::default();
        for (path, edits) in by_file {
            self.apply_to_file(path, &edits, &mut report)?;
        }
        tracing::debug!(
            edits = edits.len(),
            applied = report.applied(),
            failed = report.failures().count(),
            "applied annotation edits"
        );
        Ok(report)
    }

    fn apply_to_file(&self, path: &Path, edits: &[&AnnotationEdit], report: &mut InjectionReport) -> Result<()> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                for edit in edits {
                    report
                        .outcomes
                        .push(((*edit).clone(), EditOutcome::Failed(format!("{} not found", path.display()))));
                }
                return Ok(());
            }
            Err(source) => {
                return Err(InjectError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let unit = java::parse(&text).into_compilation_unit();

        let mut text_edits: Vec<TextEdit> = Vec::new();
        let mut imports: BTreeSet<&str> = BTreeSet::new();
        let mut seen: HashSet<TextRange> = HashSet::new();
        for edit in edits {
            let outcome = match plan_edit(&text, &unit, edit) {
                Ok(Planned::Edit(text_edit, import)) => {
                    // Two fixes on the same declaration collapse to one edit.
                    if seen.insert(text_edit.range) {
                        text_edits.push(text_edit);
                    }
                    if let Some(import) = import {
                        imports.insert(import);
                    }
                    EditOutcome::Applied
                }
                Ok(Planned::Nothing) => EditOutcome::Unchanged,
                Err(reason) => {
                    tracing::debug!(edit = %edit, reason = %reason, "annotation edit failed");
                    EditOutcome::Failed(reason)
                }
            };
            report.outcomes.push(((*edit).clone(), outcome));
        }

        for import in imports {
            text_edits.push(import_edit(&unit, import));
        }
        if text_edits.is_empty() {
            return Ok(());
        }

        let (new_text, offsets) = apply_text_edits(&text, &text_edits).map_err(|source| InjectError::Edit {
            path: path.to_path_buf(),
            source,
        })?;
        write_file(path, &new_text)?;
        report.offsets.insert(path.to_path_buf(), offsets);
        Ok(())
    }

    /// The source text of the method at `location`.
    pub fn method_text(&self, location: &Location) -> Result<Option<String>> {
        let path = location.path();
        let text = read_file(path)?;
        let unit = java::parse(&text).into_compilation_unit();
        Ok(find_method(&unit, location)
            .ok()
            .map(|method| text[method.range.start..method.range.end].to_string()))
    }

    /// Replaces the method at `location` with `new_text`. Returns `None` when
    /// the method cannot be found or `new_text` is not a single method with
    /// the same name.
    pub fn rewrite_method(&self, location: &Location, new_text: &str) -> Result<Option<MethodRewrite>> {
        let path = location.path();
        let text = read_file(path)?;
        let unit = java::parse(&text).into_compilation_unit();
        let Ok(method) = find_method(&unit, location) else {
            return Ok(None);
        };
        let replacement = match java::parse_single_method(new_text.trim(), simple_class_name(location.class())) {
            Some(parsed) if parsed.name == method.name => new_text.trim(),
            _ => return Ok(None),
        };

        let edit = TextEdit::new(range(method.range), replacement);
        let (new_file, _) = apply_text_edits(&text, &[edit]).map_err(|source| InjectError::Edit {
            path: path.to_path_buf(),
            source,
        })?;
        write_file(path, &new_file)?;
        Ok(Some(MethodRewrite {
            path: path.to_path_buf(),
            original: text,
        }))
    }
}

enum Planned<'a> {
    Edit(TextEdit, Option<&'a str>),
    Nothing,
}

fn plan_edit<'a>(text: &str, unit: &ast::CompilationUnit, edit: &'a AnnotationEdit) -> std::result::Result<Planned<'a>, String> {
    let (start, annotations) = declaration(unit, &edit.location)?;
    let existing = annotations.iter().find(|a| matches_annotation(a, &edit.annotation));

    match edit.kind {
        ChangeKind::Add => {
            if existing.is_some() {
                return Ok(Planned::Nothing);
            }
            let (written, import) = written_form(unit, &edit.annotation);
            let insert = TextEdit::insert(TextSize::from(start as u32), format!("@{written} "));
            Ok(Planned::Edit(insert, import))
        }
        ChangeKind::Remove => match existing {
            Some(annotation) => Ok(Planned::Edit(TextEdit::delete(removal_range(text, annotation.range)), None)),
            None => Ok(Planned::Nothing),
        },
    }
}

/// Start offset and annotations of the declaration `location` refers to.
fn declaration<'u>(
    unit: &'u ast::CompilationUnit,
    location: &Location,
) -> std::result::Result<(usize, &'u [ast::AnnotationUse]), String> {
    match location {
        Location::Field { class, variables, .. } => {
            let ty = find_type(unit, class)?;
            let first = variables.iter().next().ok_or("field location without variables")?;
            let field = ty
                .find_field(first)
                .ok_or_else(|| format!("field {first} not found in {class}"))?;
            Ok((field.range.start, &field.annotations))
        }
        Location::Method { .. } => {
            let method = find_method(unit, location)?;
            Ok((method.range.start, &method.annotations))
        }
        Location::Parameter { index, .. } => {
            let method = find_method(unit, location)?;
            let param = method
                .params
                .get(*index)
                .ok_or_else(|| format!("{} has no parameter {index}", method.name))?;
            Ok((param.range.start, &param.annotations))
        }
    }
}

fn find_type<'u>(unit: &'u ast::CompilationUnit, class: &str) -> std::result::Result<&'u ast::TypeDecl, String> {
    unit.find_type(class).ok_or_else(|| format!("class {class} not found"))
}

fn find_method<'u>(unit: &'u ast::CompilationUnit, location: &Location) -> std::result::Result<&'u ast::MethodDecl, String> {
    let signature = location.method_signature().ok_or("location is not on a method")?;
    find_type(unit, location.class())?
        .find_method(signature)
        .ok_or_else(|| format!("method {signature} not found in {}", location.class()))
}

fn matches_annotation(annotation: &ast::AnnotationUse, qualified: &str) -> bool {
    let simple = qualified.rsplit('.').next().unwrap_or(qualified);
    annotation.name == qualified || annotation.name == simple
}

/// How the annotation is spelled in this file, and the import it needs.
fn written_form<'a>(unit: &ast::CompilationUnit, qualified: &'a str) -> (&'a str, Option<&'a str>) {
    let Some((_, simple)) = qualified.rsplit_once('.') else {
        return (qualified, None);
    };
    if unit.imports_type(qualified) {
        return (simple, None);
    }
    let clashes = unit
        .imports
        .iter()
        .any(|import| !import.is_star && import.path.rsplit('.').next() == Some(simple));
    if clashes {
        (qualified, None)
    } else {
        (simple, Some(qualified))
    }
}

fn import_edit(unit: &ast::CompilationUnit, qualified: &str) -> TextEdit {
    let statement = format!("import {qualified};");
    if let Some(last) = unit.imports.last() {
        return TextEdit::insert(TextSize::from(last.range.end as u32), format!("\n{statement}"));
    }
    if let Some(package) = &unit.package {
        return TextEdit::insert(TextSize::from(package.range.end as u32), format!("\n\n{statement}"));
    }
    TextEdit::insert(TextSize::from(0), format!("{statement}\n\n"))
}

/// The annotation plus trailing blanks, or its whole line when nothing else
/// is on it.
fn removal_range(text: &str, span: Span) -> TextRange {
    let bytes = text.as_bytes();
    let mut end = span.end;
    while end < bytes.len() && matches!(bytes[end], b' ' | b'\t') {
        end += 1;
    }

    let line_start = text[..span.start].rfind('\n').map(|idx| idx + 1).unwrap_or(0);
    let alone_before = text[line_start..span.start].trim().is_empty();
    let at_line_end = end == bytes.len() || bytes[end] == b'\n' || bytes[end] == b'\r';
    if alone_before && at_line_end {
        let mut line_end = end;
        if text[line_end..].starts_with("\r\n") {
            line_end += 2;
        } else if line_end < bytes.len() {
            line_end += 1;
        }
        return range(Span::new(line_start, line_end));
    }
    range(Span::new(span.start, end))
}

fn range(span: Span) -> TextRange {
    TextRange::new(TextSize::from(span.start as u32), TextSize::from(span.end as u32))
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| InjectError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).map_err(|source| InjectError::Io {
        path: path.to_path_buf(),
        source,
    })
}
