//! The analyzer's view of a codebase after one build.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use annotator_core::{ErrorRecord, Fix, Location, Region};
use annotator_index::{
    files, CompoundRegionTracker, Deserializer, FieldDeclarationStore, Index, IndexKey, MethodRegistry,
    SerializationVersion, TrackerNode,
};
use annotator_injector::FileOffsetStore;

use crate::Result;

/// Where one snapshot is read from.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    pub version: SerializationVersion,
    pub annotation: String,
    /// Directories holding `errors.tsv`, `fixes.tsv` and the graphs.
    pub report_dirs: Vec<PathBuf>,
    /// Directories whose `method_info.tsv` describes the module being
    /// annotated.
    pub module_dirs: Vec<PathBuf>,
    pub dependency_dirs: Vec<PathBuf>,
    /// Keep resolving fixes in files that do not exist locally.
    pub keep_unresolved_fixes: bool,
}

/// Every store built from one set of analyzer reports. Snapshots are never
/// patched; the next build produces a new one.
#[derive(Debug)]
pub struct Snapshot {
    pub errors: Index<ErrorRecord>,
    /// Suggested fixes, keyed by the region that reported them.
    pub fixes: Index<Fix>,
    pub call_graph: Index<TrackerNode>,
    pub field_graph: Index<TrackerNode>,
    pub methods: MethodRegistry,
    pub fields: FieldDeclarationStore,
}

fn in_dirs(dirs: &[PathBuf], name: &str) -> Vec<PathBuf> {
    dirs.iter().map(|dir| dir.join(name)).collect()
}

impl Snapshot {
    /// Loads every store. Error offsets are translated back to original
    /// source coordinates through `offsets`.
    pub fn load(source: &SnapshotSource, offsets: &FileOffsetStore) -> Result<Self> {
        let fields = FieldDeclarationStore::load(&in_dirs(&source.report_dirs, files::CLASS_INFO))?;
        let methods = MethodRegistry::load(
            &in_dirs(&source.module_dirs, files::METHOD_INFO),
            &in_dirs(&source.dependency_dirs, files::METHOD_INFO),
        )?;

        let mut deserializer = Deserializer::new(source.version, source.annotation.clone());
        if source.keep_unresolved_fixes {
            deserializer = deserializer.keep_unresolved_fixes();
        }

        let mut errors = Index::new(IndexKey::ByMethod);
        errors.index(&in_dirs(&source.report_dirs, files::ERRORS), |row| {
            let error = deserializer.deserialize_error(row, &fields)?;
            Ok(error.map(|mut error| {
                if let Some(path) = &error.path {
                    error.offset = offsets.to_original(path, error.offset);
                }
                error
            }))
        })?;

        let mut fixes = Index::new(IndexKey::ByMethod);
        if source.version.has_fix_file() {
            fixes.index(&in_dirs(&source.report_dirs, files::FIXES), |row| {
                deserializer.deserialize_fix(row, &fields)
            })?;
        } else {
            for fix in errors.iter().filter_map(|error| error.resolving_fix.clone()) {
                fixes.insert(fix);
            }
        }

        let mut call_graph = Index::new(IndexKey::ByClass);
        call_graph.index(&in_dirs(&source.report_dirs, files::CALL_GRAPH), |row| {
            deserializer.deserialize_tracker_node(row).map(Some)
        })?;
        let mut field_graph = Index::new(IndexKey::ByClass);
        field_graph.index(&in_dirs(&source.report_dirs, files::FIELD_GRAPH), |row| {
            deserializer.deserialize_tracker_node(row).map(Some)
        })?;

        tracing::debug!(
            errors = errors.len(),
            fixes = fixes.len(),
            methods = methods.len(),
            "loaded analyzer snapshot"
        );
        Ok(Self {
            errors,
            fixes,
            call_graph,
            field_graph,
            methods,
            fields,
        })
    }

    pub fn tracker(&self) -> CompoundRegionTracker<'_> {
        CompoundRegionTracker::standard(&self.call_graph, &self.field_graph, &self.methods)
    }

    /// Number of errors reported in `regions`.
    pub fn error_count<'a>(&self, regions: impl IntoIterator<Item = &'a Region>) -> usize {
        regions.into_iter().map(|region| self.errors.get(region).len()).sum()
    }

    /// Fixes reported from `regions`, merged by location.
    pub fn fixes_in<'a>(&self, regions: impl IntoIterator<Item = &'a Region>) -> BTreeSet<Fix> {
        merge_fixes(
            regions
                .into_iter()
                .flat_map(|region| self.fixes.get(region))
                .cloned(),
        )
    }

    /// Order-independent digest of the errors in `regions`.
    pub fn fingerprint<'a>(&self, regions: impl IntoIterator<Item = &'a Region>) -> u64 {
        let mut digests: Vec<u64> = regions
            .into_iter()
            .flat_map(|region| self.errors.get(region))
            .map(|error| {
                let mut hasher = DefaultHasher::new();
                error.hash(&mut hasher);
                hasher.finish()
            })
            .collect();
        digests.sort_unstable();
        let mut hasher = DefaultHasher::new();
        digests.hash(&mut hasher);
        hasher.finish()
    }

    /// One fix per suggested location, with reasons merged.
    pub fn candidate_fixes(&self) -> BTreeSet<Fix> {
        merge_fixes(self.fixes.iter().cloned())
    }

    /// Errors no single annotation can resolve.
    pub fn unfixable_errors(&self) -> Vec<&ErrorRecord> {
        let mut errors: Vec<&ErrorRecord> = self.errors.iter().filter(|error| !error.is_fixable()).collect();
        errors.sort_by(|a, b| (&a.region, a.offset, &a.message).cmp(&(&b.region, b.offset, &b.message)));
        errors
    }

    /// Source file of `region`'s enclosing method, from the error report or
    /// the method metadata.
    pub fn method_location(&self, region: &Region, error_path: Option<&Path>) -> Option<Location> {
        let path = match error_path {
            Some(path) => path.to_path_buf(),
            None => {
                use annotator_index::MethodHierarchy;
                self.methods.find(&region.class, &region.member)?.path.clone()?
            }
        };
        Some(Location::method(region.class.clone(), path, region.member.clone()))
    }
}

fn merge_fixes(fixes: impl Iterator<Item = Fix>) -> BTreeSet<Fix> {
    let mut merged: BTreeMap<Location, Fix> = BTreeMap::new();
    for fix in fixes {
        match merged.get_mut(&fix.location) {
            Some(existing) => existing.merge(&fix),
            None => {
                merged.insert(fix.location.clone(), fix);
            }
        }
    }
    merged.into_values().collect()
}
