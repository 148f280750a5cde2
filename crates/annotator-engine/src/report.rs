//! Output files of a run: `reports.json`, `log.txt` and `unfixable.tsv`.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use annotator_core::{ErrorRecord, Fix};
use serde_json::{json, Map, Value};

use crate::error::write_file;
use crate::Result;

pub const REPORTS: &str = "reports.json";
pub const LOG: &str = "log.txt";
pub const UNFIXABLE: &str = "unfixable.tsv";

/// Verdict for one root fix, as of the last round that evaluated it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub root: Fix,
    pub tree: BTreeSet<Fix>,
    pub local_effect: i32,
    pub lower_bound: i32,
    pub upper_bound: i32,
    pub overall_effect: i32,
    /// No triggered fixes were left unexplored.
    pub finished: bool,
    pub approved: bool,
}

impl Report {
    /// The root fix's JSON with the effect keys added. The tree is listed
    /// only for chained reports that did not make things worse locally.
    fn to_json(&self, chain: bool) -> Result<Value> {
        let mut entry = match serde_json::to_value(&self.root)? {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("FIX".into(), other);
                map
            }
        };
        entry.insert("LOCAL EFFECT".into(), json!(self.local_effect));
        entry.insert("OVERALL EFFECT".into(), json!(self.overall_effect));
        entry.insert("Upper Bound EFFECT".into(), json!(self.upper_bound));
        entry.insert("Lower Bound EFFECT".into(), json!(self.lower_bound));
        entry.insert("FINISHED".into(), json!(self.finished));
        let tree: Vec<Value> = if chain && self.local_effect < 1 {
            self.tree
                .iter()
                .filter(|fix| **fix != self.root)
                .map(serde_json::to_value)
                .collect::<std::result::Result<_, _>>()?
        } else {
            Vec::new()
        };
        entry.insert("TREE".into(), Value::Array(tree));
        Ok(Value::Object(entry))
    }
}

/// Writes `reports` sorted by overall effect, worst first.
pub fn write_reports(path: &Path, reports: &[Report], chain: bool) -> Result<()> {
    let mut sorted: Vec<&Report> = reports.iter().collect();
    sorted.sort_by(|a, b| b.overall_effect.cmp(&a.overall_effect).then_with(|| a.root.cmp(&b.root)));
    let entries = sorted
        .into_iter()
        .map(|report| report.to_json(chain))
        .collect::<Result<Vec<_>>>()?;
    let text = serde_json::to_string_pretty(&json!({ "REPORTS": entries }))?;
    write_file(path, &text)
}

pub fn write_unfixable(path: &Path, errors: &[&ErrorRecord]) -> Result<()> {
    let mut text = String::from("kind\tmessage\tclass\tmember\toffset\tpath\n");
    for error in errors {
        let path = error
            .path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "null".to_string());
        let message = error.message.replace(['\t', '\n'], " ");
        let _ = writeln!(
            text,
            "{}\t{}\t{}\t{}\t{}\t{}",
            error.kind, message, error.region.class, error.region.member, error.offset, path
        );
    }
    write_file(path, &text)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundLog {
    pub nodes: usize,
    pub batches: usize,
    pub approved: usize,
    pub builds: u32,
    pub elapsed: Duration,
}

/// Plain-text run summary.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    pub rounds: Vec<RoundLog>,
    pub initializers: usize,
    pub downstream_seeds: usize,
    pub generative_attempts: usize,
    pub generative_kept: usize,
    pub cache_hits: u32,
    pub total_builds: u32,
    pub total_elapsed: Duration,
}

impl RunLog {
    pub fn approved(&self) -> usize {
        self.rounds.iter().map(|round| round.approved).sum()
    }

    pub fn render(&self) -> String {
        let mut text = String::new();
        for (i, round) in self.rounds.iter().enumerate() {
            let _ = writeln!(
                text,
                "round {}: nodes={} batches={} approved={} builds={} elapsed_ms={}",
                i + 1,
                round.nodes,
                round.batches,
                round.approved,
                round.builds,
                round.elapsed.as_millis()
            );
        }
        let _ = writeln!(text, "initializers={}", self.initializers);
        let _ = writeln!(text, "downstream_seeds={}", self.downstream_seeds);
        let _ = writeln!(
            text,
            "generative_fixes={}/{}",
            self.generative_kept, self.generative_attempts
        );
        let _ = writeln!(text, "cache_hits={}", self.cache_hits);
        let _ = writeln!(text, "approved={}", self.approved());
        let _ = writeln!(text, "builds={}", self.total_builds);
        let _ = writeln!(text, "elapsed_ms={}", self.total_elapsed.as_millis());
        text
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_file(path, &self.render())
    }
}
