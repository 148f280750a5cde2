//! Field declaration groups and field initialization facts.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use annotator_core::{strip_file_scheme, Location};
use annotator_syntax::java;

use crate::store::for_each_row;
use crate::{IndexError, Result};

#[derive(Debug, Clone, Default)]
struct ClassFields {
    path: PathBuf,
    /// Declaration statements declaring more than one variable.
    groups: Vec<BTreeSet<String>>,
}

/// Which fields of a class share one declaration statement.
///
/// Built from `class_info.tsv` (`class \t path`) by parsing each referenced
/// source file once.
#[derive(Debug, Clone, Default)]
pub struct FieldDeclarationStore {
    classes: HashMap<String, ClassFields>,
}

impl FieldDeclarationStore {
    pub fn load(class_info_files: &[PathBuf]) -> Result<Self> {
        let mut rows: Vec<(String, PathBuf)> = Vec::new();
        for file in class_info_files {
            for_each_row(file, |line, row| {
                if row.len() != 2 {
                    return Err(IndexError::Malformed {
                        path: file.clone(),
                        line,
                        message: format!("expected 2 columns for class info, found {}", row.len()),
                    });
                }
                rows.push((row[0].to_string(), PathBuf::from(strip_file_scheme(row[1]))));
                Ok(())
            })?;
        }

        let mut parsed: HashMap<PathBuf, Option<java::ast::CompilationUnit>> = HashMap::new();
        let mut store = Self::default();
        for (class, path) in rows {
            let unit = parsed.entry(path.clone()).or_insert_with(|| match std::fs::read_to_string(&path) {
                Ok(text) => Some(java::parse(&text).into_compilation_unit()),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping class info for unreadable source file");
                    None
                }
            });
            let Some(unit) = unit else {
                continue;
            };
            let Some(decl) = unit.find_type(&class) else {
                tracing::warn!(class = %class, path = %path.display(), "class not found in its source file");
                continue;
            };
            let groups = decl
                .fields()
                .filter(|field| field.declarators.len() > 1)
                .map(|field| field.names().map(str::to_string).collect())
                .collect();
            store.classes.insert(class, ClassFields { path, groups });
        }
        Ok(store)
    }

    /// Registers a class directly, bypassing `class_info.tsv`.
    pub fn insert_class<I>(&mut self, class: impl Into<String>, path: impl Into<PathBuf>, groups: I)
    where
        I: IntoIterator<Item = BTreeSet<String>>,
    {
        self.classes.insert(
            class.into(),
            ClassFields {
                path: path.into(),
                groups: groups.into_iter().collect(),
            },
        );
    }

    /// `fields` plus every field declared in the same statement as any of
    /// them.
    pub fn group_of(&self, class: &str, fields: &BTreeSet<String>) -> BTreeSet<String> {
        let mut group = fields.clone();
        if let Some(info) = self.classes.get(class) {
            for declared in info.groups.iter().filter(|declared| !declared.is_disjoint(fields)) {
                group.extend(declared.iter().cloned());
            }
        }
        group
    }

    /// A single-variable field location for `class#field`, if the class's
    /// source file is known.
    pub fn location_on_field(&self, class: &str, field: &str) -> Option<Location> {
        let info = self.classes.get(class)?;
        Some(Location::field(class, info.path.clone(), [field]))
    }

    pub fn path_of(&self, class: &str) -> Option<&Path> {
        self.classes.get(class).map(|info| info.path.as_path())
    }
}

/// `field_init.tsv`: which methods initialize which fields.
#[derive(Debug, Clone, Default)]
pub struct FieldInitStore {
    by_class: HashMap<String, Vec<(Location, String)>>,
}

impl FieldInitStore {
    pub fn load(files: &[PathBuf]) -> Result<Self> {
        let mut store = Self::default();
        for file in files {
            for_each_row(file, |line, row| {
                let malformed = |message: String| IndexError::Malformed {
                    path: file.clone(),
                    line,
                    message,
                };
                let location = Location::from_columns(row).map_err(|err| malformed(err.to_string()))?;
                let Some(location @ Location::Method { .. }) = location else {
                    return Err(malformed("field initialization rows must target a method".into()));
                };
                if !location.path().exists() {
                    tracing::warn!(path = %location.path().display(), "dropping initializer in missing source file");
                    return Ok(());
                }
                let field = row[3].to_string();
                store
                    .by_class
                    .entry(location.class().to_string())
                    .or_default()
                    .push((location, field));
                Ok(())
            })?;
        }
        Ok(store)
    }

    /// The method of `class` initializing the largest number of `fields`.
    /// Ties go to the method seen first.
    pub fn find_initializer(&self, class: &str, fields: &BTreeSet<String>) -> Option<Location> {
        let entries = self.by_class.get(class)?;
        let mut order: Vec<&Location> = Vec::new();
        let mut counts: HashMap<&Location, usize> = HashMap::new();
        for (method, field) in entries {
            if !fields.contains(field) {
                continue;
            }
            let count = counts.entry(method).or_insert(0);
            if *count == 0 {
                order.push(method);
            }
            *count += 1;
        }
        let mut best: Option<(&Location, usize)> = None;
        for method in order {
            let count = counts[method];
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((method, count));
            }
        }
        best.map(|(method, _)| method.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn groups_fields_declared_together() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("C.java");
        std::fs::write(&source, "package p;\nclass C {\n  Object a, b;\n  Object c;\n}\n").unwrap();
        let info = dir.path().join("class_info.tsv");
        std::fs::write(
            &info,
            format!("class\tpath\np.C\tfile:{}\np.Gone\t/nowhere/Gone.java\n", source.display()),
        )
        .unwrap();

        let store = FieldDeclarationStore::load(&[info]).unwrap();
        assert_eq!(store.group_of("p.C", &set(&["a"])), set(&["a", "b"]));
        assert_eq!(store.group_of("p.C", &set(&["c"])), set(&["c"]));
        assert_eq!(store.group_of("p.C", &set(&["b", "c"])), set(&["a", "b", "c"]));
        assert_eq!(store.path_of("p.C"), Some(source.as_path()));
        assert!(store.path_of("p.Gone").is_none());
        assert_eq!(
            store.location_on_field("p.C", "c"),
            Some(Location::field("p.C", source.clone(), ["c"]))
        );
    }

    #[test]
    fn group_spans_every_statement_it_touches() {
        let mut store = FieldDeclarationStore::default();
        store.insert_class("p.C", "/C.java", [set(&["a", "b"]), set(&["c", "d"]), set(&["e", "f"])]);

        assert_eq!(store.group_of("p.C", &set(&["a", "c"])), set(&["a", "b", "c", "d"]));
        assert_eq!(store.group_of("p.C", &set(&["b", "z"])), set(&["a", "b", "z"]));
        assert_eq!(store.group_of("p.Other", &set(&["a"])), set(&["a"]));
    }

    #[test]
    fn picks_initializer_covering_most_fields() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("C.java");
        std::fs::write(&source, "class C {}").unwrap();
        let path = source.display().to_string();
        let init = dir.path().join("field_init.tsv");
        std::fs::write(
            &init,
            format!(
                "header\nMETHOD\tp.C\tsetUp()\tx\t0\t{path}\nMETHOD\tp.C\tinit()\tx\t0\t{path}\nMETHOD\tp.C\tinit()\ty\t0\t{path}\n"
            ),
        )
        .unwrap();

        let store = FieldInitStore::load(&[init]).unwrap();
        let best = store.find_initializer("p.C", &set(&["x", "y"])).unwrap();
        assert_eq!(best.method_signature(), Some("init()"));
        let tie = store.find_initializer("p.C", &set(&["x"])).unwrap();
        assert_eq!(tie.method_signature(), Some("setUp()"));
        assert!(store.find_initializer("p.C", &set(&["z"])).is_none());
    }
}
