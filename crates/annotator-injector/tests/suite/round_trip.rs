use std::path::Path;

use annotator_core::Location;
use annotator_injector::{AnnotationEdit, FileOffsetStore, Injector};
use proptest::prelude::*;

const NULLABLE: &str = "javax.annotation.Nullable";
const IMPORT_LINE: &str = "\nimport javax.annotation.Nullable;";

const SOURCE: &str = r#"package com.acme;

import java.util.List;

/** A repository. */
public class Repo {
    private Object cache, backup;
    protected final List<String> names = null;

    public Repo(Object seed, List<String> names) {
        this.cache = seed;
    }

    @Override
    public String toString() { return "repo"; }

    public <T> T find(T key, int limit, Object... rest) {
        return key;
    }

    static class Entry {
        Object value;
        Object get(Object fallback) { return value; }
    }
}
"#;

fn locations(path: &Path) -> Vec<Location> {
    vec![
        Location::field("com.acme.Repo", path, ["cache", "backup"]),
        Location::field("com.acme.Repo", path, ["names"]),
        Location::parameter("com.acme.Repo", path, "Repo(java.lang.Object,java.util.List<java.lang.String>)", 0),
        Location::parameter("com.acme.Repo", path, "Repo(java.lang.Object,java.util.List<java.lang.String>)", 1),
        Location::method("com.acme.Repo", path, "toString()"),
        Location::method("com.acme.Repo", path, "find(T,int,java.lang.Object[])"),
        Location::parameter("com.acme.Repo", path, "find(T,int,java.lang.Object[])", 0),
        Location::parameter("com.acme.Repo", path, "find(T,int,java.lang.Object[])", 2),
        Location::field("com.acme.Repo$Entry", path, ["value"]),
        Location::method("com.acme.Repo$Entry", path, "get(java.lang.Object)"),
        Location::parameter("com.acme.Repo$Entry", path, "get(java.lang.Object)", 0),
    ]
}

proptest! {
    #[test]
    fn add_then_remove_restores_the_source(mask in proptest::collection::vec(any::<bool>(), 11)) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Repo.java");
        std::fs::write(&path, SOURCE).unwrap();

        let chosen: Vec<Location> = locations(&path)
            .into_iter()
            .zip(&mask)
            .filter(|(_, keep)| **keep)
            .map(|(loc, _)| loc)
            .collect();
        let adds: Vec<AnnotationEdit> = chosen.iter().cloned().map(|loc| AnnotationEdit::add(loc, NULLABLE)).collect();
        let removes: Vec<AnnotationEdit> = adds.iter().map(AnnotationEdit::reverse).collect();

        let injector = Injector::new();
        let added = injector.apply(&adds).unwrap();
        prop_assert_eq!(added.failures().count(), 0);
        let removed = injector.apply(&removes).unwrap();
        prop_assert_eq!(removed.failures().count(), 0);

        let after = std::fs::read_to_string(&path).unwrap();
        prop_assert_eq!(after.replace(IMPORT_LINE, ""), SOURCE);
    }
}

#[test]
fn offsets_map_back_to_the_original_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Repo.java");
    std::fs::write(&path, SOURCE).unwrap();

    let report = Injector::new()
        .apply(&[AnnotationEdit::add(
            Location::method("com.acme.Repo", &path, "toString()"),
            NULLABLE,
        )])
        .unwrap();
    let mut store = FileOffsetStore::default();
    store.record(&report);

    let edited = std::fs::read_to_string(&path).unwrap();
    let marker = "return key;";
    let new_offset = edited.find(marker).unwrap() as u32;
    let old_offset = SOURCE.find(marker).unwrap() as u32;
    assert_eq!(store.to_original(&path, new_offset), old_offset);
}

#[test]
fn reverted_edits_fold_out_of_the_offset_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Repo.java");
    std::fs::write(&path, SOURCE).unwrap();
    let injector = Injector::new();
    let mut store = FileOffsetStore::default();

    let adds = [
        AnnotationEdit::add(Location::method("com.acme.Repo", &path, "toString()"), NULLABLE),
        AnnotationEdit::add(Location::field("com.acme.Repo$Entry", &path, ["value"]), NULLABLE),
    ];
    let removes: Vec<AnnotationEdit> = adds.iter().map(AnnotationEdit::reverse).collect();
    for _ in 0..3 {
        store.record(&injector.apply(&adds).unwrap());
        store.record(&injector.apply(&removes).unwrap());
    }

    // Only the import survives the reverts.
    let edited = std::fs::read_to_string(&path).unwrap();
    assert_eq!(edited.replace(IMPORT_LINE, ""), SOURCE);
    assert_eq!(store.len(), 1);
    for marker in ["return key;", "Object value;", "package com.acme;"] {
        let new_offset = edited.find(marker).unwrap() as u32;
        let old_offset = SOURCE.find(marker).unwrap() as u32;
        assert_eq!(store.to_original(&path, new_offset), old_offset, "{marker}");
    }

    // With the import already in place an add and its revert leave nothing.
    let other = dir.path().join("Other.java");
    std::fs::write(&other, &edited).unwrap();
    let mut fresh = FileOffsetStore::default();
    let add = [AnnotationEdit::add(Location::method("com.acme.Repo", &other, "toString()"), NULLABLE)];
    fresh.record(&injector.apply(&add).unwrap());
    assert_eq!(fresh.len(), 1);
    fresh.record(&injector.apply(&[add[0].reverse()]).unwrap());
    assert!(fresh.is_empty());
}
