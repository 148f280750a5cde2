//! Hash-multimap over report rows.
//!
//! Lookups are two-phase: a coarse hash of the class (or class and member)
//! selects a bucket, then an exact predicate filters it. Collisions are
//! expected and harmless.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use annotator_core::{ErrorRecord, Fix, Region};

use crate::{IndexError, Result};

/// The `(class, member)` pair a record is indexed under.
pub trait Keyed {
    fn key_class(&self) -> &str;
    fn key_member(&self) -> &str;
}

impl Keyed for ErrorRecord {
    fn key_class(&self) -> &str {
        &self.region.class
    }

    fn key_member(&self) -> &str {
        &self.region.member
    }
}

impl Keyed for Fix {
    fn key_class(&self) -> &str {
        self.region.as_ref().map(|r| r.class.as_str()).unwrap_or("")
    }

    fn key_member(&self) -> &str {
        self.region.as_ref().map(|r| r.member.as_str()).unwrap_or("")
    }
}

/// One call-graph or field-graph edge: `caller_region` uses `callee_member`
/// of `callee_class`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackerNode {
    pub caller: Region,
    pub callee_member: String,
    pub callee_class: String,
}

impl TrackerNode {
    pub const COLUMNS: usize = 4;

    pub fn from_row(row: &[&str]) -> std::result::Result<Self, String> {
        if row.len() != Self::COLUMNS {
            return Err(format!(
                "expected {} columns for a tracker edge, found {}",
                Self::COLUMNS,
                row.len()
            ));
        }
        Ok(Self {
            caller: Region::new(row[0], row[1]),
            callee_member: row[2].to_string(),
            callee_class: row[3].to_string(),
        })
    }
}

impl Keyed for TrackerNode {
    fn key_class(&self) -> &str {
        &self.callee_class
    }

    fn key_member(&self) -> &str {
        &self.callee_member
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKey {
    ByClass,
    ByMethod,
}

pub fn coarse_hash(class: &str, member: Option<&str>) -> u64 {
    let mut hasher = DefaultHasher::new();
    class.hash(&mut hasher);
    if let Some(member) = member {
        member.hash(&mut hasher);
    }
    hasher.finish()
}

#[derive(Debug, Clone)]
pub struct Index<T> {
    key: IndexKey,
    items: HashMap<u64, Vec<T>>,
    total: usize,
}

impl<T: Keyed> Index<T> {
    pub fn new(key: IndexKey) -> Self {
        Self {
            key,
            items: HashMap::new(),
            total: 0,
        }
    }

    /// Replaces the contents with the rows of `files`.
    ///
    /// `factory` turns one row into a record; `Ok(None)` drops the row
    /// (the factory is expected to log why) and `Err` aborts the load.
    /// Files that do not exist are treated as empty: the analyzer only
    /// creates them when it has something to report.
    pub fn index<F>(&mut self, files: &[PathBuf], mut factory: F) -> Result<()>
    where
        F: FnMut(&[&str]) -> std::result::Result<Option<T>, String>,
    {
        self.items.clear();
        self.total = 0;
        for file in files {
            for_each_row(file, |line, row| match factory(row) {
                Ok(Some(item)) => {
                    self.insert(item);
                    Ok(())
                }
                Ok(None) => Ok(()),
                Err(message) => Err(IndexError::Malformed {
                    path: file.clone(),
                    line,
                    message,
                }),
            })?;
        }
        tracing::debug!(total = self.total, files = files.len(), "indexed report rows");
        Ok(())
    }

    pub fn insert(&mut self, item: T) {
        let hash = self.hash_of(item.key_class(), item.key_member());
        self.items.entry(hash).or_default().push(item);
        self.total += 1;
    }

    fn hash_of(&self, class: &str, member: &str) -> u64 {
        match self.key {
            IndexKey::ByClass => coarse_hash(class, None),
            IndexKey::ByMethod => coarse_hash(class, Some(member)),
        }
    }

    pub fn get(&self, region: &Region) -> Vec<&T> {
        self.get_by_method(&region.class, &region.member)
    }

    pub fn get_by_method(&self, class: &str, member: &str) -> Vec<&T> {
        self.items
            .get(&self.hash_of(class, member))
            .into_iter()
            .flatten()
            .filter(|item| item.key_class() == class && item.key_member() == member)
            .collect()
    }

    pub fn get_by_class(&self, class: &str) -> Vec<&T> {
        match self.key {
            IndexKey::ByClass => self
                .items
                .get(&coarse_hash(class, None))
                .into_iter()
                .flatten()
                .filter(|item| item.key_class() == class)
                .collect(),
            IndexKey::ByMethod => self.iter().filter(|item| item.key_class() == class).collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Regions of every record matching `predicate`.
    pub fn regions_where(&self, mut predicate: impl FnMut(&T) -> bool) -> BTreeSet<Region> {
        self.iter()
            .filter(|item| predicate(item))
            .map(|item| Region::new(item.key_class(), item.key_member()))
            .collect()
    }
}

/// Calls `f` with the 1-based line number and columns of every data row of a
/// tab-separated file. The header row is skipped; a missing file yields no
/// rows.
pub(crate) fn for_each_row<F>(path: &Path, mut f: F) -> Result<()>
where
    F: FnMut(usize, &[&str]) -> Result<()>,
{
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "report file not found, treating as empty");
            return Ok(());
        }
        Err(source) => {
            return Err(IndexError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    for (idx, line) in text.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let row: Vec<&str> = line.split('\t').collect();
        f(idx + 1, &row)?;
    }
    Ok(())
}
