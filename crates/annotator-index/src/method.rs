//! Method metadata and override resolution.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use annotator_core::{strip_file_scheme, Location};

use crate::store::{coarse_hash, for_each_row};
use crate::{IndexError, Result};

/// Parent id of methods that override nothing.
pub const TOP_ID: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Package,
    Private,
}

impl Visibility {
    fn parse(raw: &str) -> std::result::Result<Self, String> {
        match raw {
            "public" => Ok(Visibility::Public),
            "protected" => Ok(Visibility::Protected),
            "package" | "" => Ok(Visibility::Package),
            "private" => Ok(Visibility::Private),
            other => Err(format!("unknown visibility `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRecord {
    pub id: i64,
    pub class: String,
    pub signature: String,
    pub parent: i64,
    /// Whether each parameter already carries a nullable annotation.
    pub annotation_flags: Vec<bool>,
    pub is_nullable: bool,
    pub visibility: Visibility,
    pub has_non_primitive_return: bool,
    pub path: Option<PathBuf>,
    pub declared_in_module: bool,
    pub children: BTreeSet<i64>,
}

impl MethodRecord {
    pub const COLUMNS: usize = 10;

    fn from_row(row: &[&str], declared_in_module: bool) -> std::result::Result<Self, String> {
        if row.len() != Self::COLUMNS {
            return Err(format!(
                "expected {} columns for method info, found {}",
                Self::COLUMNS,
                row.len()
            ));
        }
        let int = |raw: &str| raw.trim().parse::<i64>().map_err(|_| format!("invalid integer `{raw}`"));
        let boolean = |raw: &str| match raw.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(format!("invalid boolean `{other}`")),
        };

        let size = int(row[4])?;
        let flags = parse_flags(row[5])?;
        if flags.len() as i64 != size {
            return Err(format!("method declares {size} parameters but has {} flags", flags.len()));
        }
        let path = match row[9].trim() {
            "" | "null" => None,
            raw => Some(PathBuf::from(strip_file_scheme(raw))),
        };

        Ok(Self {
            id: int(row[0])?,
            class: row[1].to_string(),
            signature: row[2].to_string(),
            parent: int(row[3])?,
            annotation_flags: flags,
            is_nullable: boolean(row[6])?,
            visibility: Visibility::parse(row[7].trim())?,
            has_non_primitive_return: boolean(row[8])?,
            path,
            declared_in_module,
            children: BTreeSet::new(),
        })
    }

    pub fn location(&self) -> Option<Location> {
        self.path
            .as_ref()
            .map(|path| Location::method(self.class.clone(), path.clone(), self.signature.clone()))
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Whether parameter `index` is already annotated. Out-of-range indices
    /// count as not annotated.
    pub fn is_parameter_annotated(&self, index: usize) -> bool {
        self.annotation_flags.get(index).copied().unwrap_or(false)
    }
}

/// `[true,false]` -> `vec![true, false]`.
fn parse_flags(raw: &str) -> std::result::Result<Vec<bool>, String> {
    let inner = raw
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| format!("invalid annotation flags `{raw}`"))?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|flag| !flag.is_empty())
        .map(|flag| match flag {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(format!("invalid annotation flag `{other}`")),
        })
        .collect()
}

/// Read-only view of the override hierarchy used while expanding fix trees.
pub trait MethodHierarchy {
    fn find(&self, class: &str, signature: &str) -> Option<&MethodRecord>;

    /// The method `class#signature` directly overrides, or `None` if it
    /// overrides nothing (its parent is the top sentinel) or is unknown.
    fn closest_super_method(&self, class: &str, signature: &str) -> Option<&MethodRecord>;

    /// Methods directly overriding `class#signature`.
    fn sub_methods(&self, class: &str, signature: &str) -> Vec<&MethodRecord>;

    /// Whether `location` belongs to the module being annotated.
    fn declared_in_module(&self, location: &Location) -> bool;
}

/// Analyzer ids are only unique within one `method_info.tsv`, so records are
/// keyed by the index of the file they came from as well.
type MethodKey = (usize, i64);

#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    nodes: HashMap<MethodKey, MethodRecord>,
    by_class: HashMap<u64, Vec<MethodKey>>,
}

impl MethodRegistry {
    /// Loads `method_info.tsv` files. Records from `module_files` are marked
    /// as declared in the target module; `dependency_files` describe other
    /// modules (downstream consumers).
    pub fn load(module_files: &[PathBuf], dependency_files: &[PathBuf]) -> Result<Self> {
        let mut registry = Self::default();
        let sources = module_files
            .iter()
            .map(|file| (file, true))
            .chain(dependency_files.iter().map(|file| (file, false)));
        for (source, (file, in_module)) in sources.enumerate() {
            for_each_row(file, |line, row| {
                let record = MethodRecord::from_row(row, in_module).map_err(|message| IndexError::Malformed {
                    path: file.clone(),
                    line,
                    message,
                })?;
                registry.insert(source, record);
                Ok(())
            })?;
        }
        registry.link_children();
        tracing::debug!(methods = registry.nodes.len(), "loaded method registry");
        Ok(registry)
    }

    /// Builds a registry from records sharing one id space.
    pub fn from_records(records: impl IntoIterator<Item = MethodRecord>) -> Self {
        let mut registry = Self::default();
        for record in records {
            registry.insert(0, record);
        }
        registry.link_children();
        registry
    }

    fn insert(&mut self, source: usize, record: MethodRecord) {
        let key = (source, record.id);
        if let Some(previous) = self.nodes.get(&key) {
            tracing::warn!(
                id = record.id,
                kept = %format!("{}#{}", record.class, record.signature),
                replaced = %format!("{}#{}", previous.class, previous.signature),
                "duplicate method id in one method info file"
            );
        } else {
            self.by_class
                .entry(coarse_hash(&record.class, None))
                .or_default()
                .push(key);
        }
        self.nodes.insert(key, record);
    }

    fn link_children(&mut self) {
        let edges: Vec<(MethodKey, i64)> = self
            .nodes
            .iter()
            .filter(|(_, record)| record.parent != TOP_ID)
            .map(|(&(source, _), record)| ((source, record.parent), record.id))
            .collect();
        for (parent, child) in edges {
            if let Some(parent) = self.nodes.get_mut(&parent) {
                parent.children.insert(child);
            }
        }
    }

    fn find_keyed(&self, class: &str, signature: &str) -> Option<(MethodKey, &MethodRecord)> {
        self.keys_of_class(class)
            .find(|(_, record)| record.signature == signature)
    }

    fn keys_of_class<'a: 'c, 'c>(&'a self, class: &'c str) -> impl Iterator<Item = (MethodKey, &'a MethodRecord)> + 'c {
        self.by_class
            .get(&coarse_hash(class, None))
            .into_iter()
            .flatten()
            .filter_map(|key| self.nodes.get(key).map(|record| (*key, record)))
            .filter(move |(_, record)| record.class == class)
    }

    pub fn methods_of_class(&self, class: &str) -> Vec<&MethodRecord> {
        self.keys_of_class(class).map(|(_, record)| record).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodRecord> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Public methods of the target module with a non-primitive return type.
    pub fn public_methods_with_non_primitive_return(&self) -> impl Iterator<Item = &MethodRecord> {
        self.nodes
            .values()
            .filter(|record| record.declared_in_module && record.is_public() && record.has_non_primitive_return)
    }
}

impl MethodHierarchy for MethodRegistry {
    fn find(&self, class: &str, signature: &str) -> Option<&MethodRecord> {
        self.find_keyed(class, signature).map(|(_, record)| record)
    }

    fn closest_super_method(&self, class: &str, signature: &str) -> Option<&MethodRecord> {
        let ((source, _), record) = self.find_keyed(class, signature)?;
        if record.parent == TOP_ID {
            return None;
        }
        self.nodes.get(&(source, record.parent))
    }

    fn sub_methods(&self, class: &str, signature: &str) -> Vec<&MethodRecord> {
        match self.find_keyed(class, signature) {
            Some(((source, _), record)) => record
                .children
                .iter()
                .filter_map(|id| self.nodes.get(&(source, *id)))
                .collect(),
            None => Vec::new(),
        }
    }

    fn declared_in_module(&self, location: &Location) -> bool {
        match location.method_signature() {
            Some(signature) => self
                .find(location.class(), signature)
                .is_some_and(|record| record.declared_in_module),
            None => self
                .methods_of_class(location.class())
                .into_iter()
                .any(|record| record.declared_in_module),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const METHOD_INFO: &str = "id\tclass\tmethod\tparent\tsize\tflags\tnullable\tvisibility\tnon_primitive\tpath
0\ta.B\tm(java.lang.Object,java.lang.Object)\t-1\t2\t[false,false]\tfalse\tpublic\ttrue\tfile:/src/B.java
1\ta.D\tm(java.lang.Object,java.lang.Object)\t0\t2\t[false,true]\tfalse\tpublic\ttrue\t/src/D.java
2\ta.E\tm(java.lang.Object,java.lang.Object)\t1\t2\t[false,false]\ttrue\tprivate\tfalse\t/src/E.java
";

    fn registry() -> MethodRegistry {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("method_info.tsv");
        std::fs::write(&file, METHOD_INFO).unwrap();
        MethodRegistry::load(&[file], &[]).unwrap()
    }

    #[test]
    fn resolves_closest_super_and_sub_methods() {
        let registry = registry();
        let sig = "m(java.lang.Object,java.lang.Object)";

        assert!(registry.closest_super_method("a.B", sig).is_none());
        assert_eq!(registry.closest_super_method("a.D", sig).map(|m| m.id), Some(0));

        let subs: Vec<i64> = registry.sub_methods("a.B", sig).iter().map(|m| m.id).collect();
        assert_eq!(subs, vec![1]);
        assert!(registry.sub_methods("a.E", sig).is_empty());
    }

    #[test]
    fn parses_flags_and_paths() {
        let registry = registry();
        let sig = "m(java.lang.Object,java.lang.Object)";
        let d = registry.find("a.D", sig).unwrap();
        assert_eq!(d.annotation_flags, vec![false, true]);
        assert!(d.is_parameter_annotated(1));
        assert!(!d.is_parameter_annotated(7));
        assert_eq!(registry.find("a.B", sig).unwrap().path, Some(PathBuf::from("/src/B.java")));
    }

    #[test]
    fn ids_are_scoped_to_their_file() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("module.tsv");
        std::fs::write(&module, METHOD_INFO).unwrap();
        // The downstream file reuses ids 0 and 1 for unrelated methods.
        let downstream = dir.path().join("downstream.tsv");
        std::fs::write(
            &downstream,
            "header\n0\tapp.Base\trun()\t-1\t0\t[]\tfalse\tpublic\tfalse\t/app/Base.java\n1\tapp.Main\trun()\t0\t0\t[]\tfalse\tpublic\tfalse\t/app/Main.java\n",
        )
        .unwrap();

        let registry = MethodRegistry::load(&[module], &[downstream]).unwrap();
        let sig = "m(java.lang.Object,java.lang.Object)";
        assert_eq!(registry.len(), 5);
        assert!(registry.find("a.B", sig).is_some_and(|m| m.declared_in_module));
        assert!(registry.find("app.Main", "run()").is_some_and(|m| !m.declared_in_module));

        assert_eq!(registry.closest_super_method("a.D", sig).map(|m| m.class.as_str()), Some("a.B"));
        assert_eq!(
            registry.closest_super_method("app.Main", "run()").map(|m| m.class.as_str()),
            Some("app.Base")
        );
        let subs: Vec<&str> = registry.sub_methods("a.B", sig).iter().map(|m| m.class.as_str()).collect();
        assert_eq!(subs, vec!["a.D"]);
        let subs: Vec<&str> = registry.sub_methods("app.Base", "run()").iter().map(|m| m.class.as_str()).collect();
        assert_eq!(subs, vec!["app.Main"]);
    }

    #[test]
    fn seeds_only_public_non_primitive_methods() {
        let registry = registry();
        let mut ids: Vec<i64> = registry.public_methods_with_non_primitive_return().map(|m| m.id).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn dependency_records_are_not_in_module() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("method_info.tsv");
        std::fs::write(&file, METHOD_INFO).unwrap();
        let registry = MethodRegistry::load(&[], &[file]).unwrap();
        let loc = Location::method("a.B", "/src/B.java", "m(java.lang.Object,java.lang.Object)");
        assert!(!registry.declared_in_module(&loc));
    }

    #[test]
    fn flag_count_must_match_size() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("method_info.tsv");
        std::fs::write(&file, "header\n0\ta.B\tm()\t-1\t1\t[]\tfalse\tpublic\ttrue\t/B.java\n").unwrap();
        assert!(matches!(
            MethodRegistry::load(&[file], &[]),
            Err(IndexError::Malformed { line: 2, .. })
        ));
    }
}
