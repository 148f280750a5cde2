use std::collections::HashMap;
use std::path::{Path, PathBuf};

use annotator_core::edit::OffsetMap;

use crate::InjectionReport;

/// One offset map per file, folding every edit recorded so far.
///
/// The analyzer reports offsets against the current file contents; mapping
/// them back through the folded map yields offsets in the original source,
/// which keeps errors comparable across rounds. Edits that were reverted
/// fold away, so only changes still on disk cost anything.
#[derive(Debug, Clone, Default)]
pub struct FileOffsetStore {
    maps: HashMap<PathBuf, OffsetMap>,
}

impl FileOffsetStore {
    pub fn record(&mut self, report: &InjectionReport) {
        for (path, map) in &report.offsets {
            if map.is_empty() {
                continue;
            }
            let folded = match self.maps.get(path) {
                Some(previous) => previous.then(map),
                None => map.clone(),
            };
            if folded.is_empty() {
                self.maps.remove(path);
            } else {
                self.maps.insert(path.clone(), folded);
            }
        }
    }

    pub fn to_original(&self, path: &Path, offset: u32) -> u32 {
        match self.maps.get(path) {
            Some(map) => map.to_original(offset),
            None => offset,
        }
    }

    /// Number of files whose current contents differ from the original.
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}
