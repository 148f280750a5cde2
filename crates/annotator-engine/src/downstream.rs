//! How making target methods nullable affects modules that depend on the
//! target without being rebuilt from its sources.
//!
//! Downstream builds see the target as a library. The library-model side
//! files tell the analyzer which library methods and fields to treat as
//! nullable, which is how seeds are "annotated" without touching sources.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;

use annotator_core::{ErrorRecord, Fix, Location};
use annotator_index::{MethodHierarchy, MethodRecord, MethodRegionTracker, MethodRegistry};

use crate::context::Context;
use crate::error::write_file;
use crate::graph::{partition, Node};
use crate::Result;

pub const NULLABLE_METHODS: &str = "nullable-methods.tsv";
pub const NULLABLE_FIELDS: &str = "nullable-fields.tsv";

/// Downstream consequences of a fix tree.
pub trait DownstreamModel {
    /// The worst single fix's unresolved downstream errors.
    fn lower_bound(&self, tree: &BTreeSet<Fix>) -> i32;

    /// All unresolved downstream errors of the tree's fixes, summed.
    fn upper_bound(&self, tree: &BTreeSet<Fix>) -> i32;

    /// Target parameters receiving a nullable value from downstream code
    /// once `method` returns nullable.
    fn impacted_parameters(&self, method: &Location) -> BTreeSet<Location>;

    /// Whether `fix` triggers downstream errors the target cannot fix.
    fn is_not_fixable_on_target(&self, fix: &Fix) -> bool;

    /// Forgets errors resolved by `fixes` now applied to the target.
    fn update_impacts_after_injection(&mut self, fixes: &[Fix]) -> Result<()>;
}

/// No downstream modules: every query is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOnly;

impl DownstreamModel for LocalOnly {
    fn lower_bound(&self, _: &BTreeSet<Fix>) -> i32 {
        0
    }

    fn upper_bound(&self, _: &BTreeSet<Fix>) -> i32 {
        0
    }

    fn impacted_parameters(&self, _: &Location) -> BTreeSet<Location> {
        BTreeSet::new()
    }

    fn is_not_fixable_on_target(&self, _: &Fix) -> bool {
        false
    }

    fn update_impacts_after_injection(&mut self, _: &[Fix]) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggeredError {
    pub error: ErrorRecord,
    /// The error's resolving fix lies in the target module.
    pub fixable_on_target: bool,
}

/// Downstream errors one seed triggers.
#[derive(Debug, Clone, Default)]
pub struct MethodImpact {
    pub triggered: Vec<TriggeredError>,
    pub impacted_parameters: BTreeSet<Location>,
}

impl MethodImpact {
    /// Triggered errors the tree does not resolve.
    fn effect(&self, tree: &BTreeSet<Fix>) -> i32 {
        self.triggered
            .iter()
            .filter(|triggered| !triggered.error.is_resolvable_by(tree))
            .count() as i32
    }
}

/// The library-model side files read by downstream builds.
#[derive(Debug, Clone)]
pub struct LibraryModel {
    dir: PathBuf,
}

impl LibraryModel {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Replaces both side files with `locations`. Parameter locations are
    /// not modeled and are skipped.
    pub fn write<'a>(&self, locations: impl IntoIterator<Item = &'a Location>) -> Result<()> {
        let mut methods = String::new();
        let mut fields = String::new();
        for location in locations {
            match location {
                Location::Method { class, method, .. } => {
                    methods.push_str(&format!("{class}\t{method}\n"));
                }
                Location::Field { class, variables, .. } => {
                    for variable in variables {
                        fields.push_str(&format!("{class}\t{variable}\n"));
                    }
                }
                Location::Parameter { .. } => {}
            }
        }
        write_file(&self.dir.join(NULLABLE_METHODS), &methods)?;
        write_file(&self.dir.join(NULLABLE_FIELDS), &fields)
    }

    pub fn clear(&self) -> Result<()> {
        self.write(std::iter::empty())
    }
}

/// Per-seed downstream impact measured with real downstream builds.
#[derive(Debug, Clone)]
pub struct DownstreamImpactModel {
    impacts: BTreeMap<Location, MethodImpact>,
    library_model: LibraryModel,
    /// Target locations already annotated, kept in the side files.
    applied: BTreeSet<Location>,
}

impl DownstreamImpactModel {
    pub fn from_impacts(impacts: BTreeMap<Location, MethodImpact>, library_model: LibraryModel) -> Self {
        Self {
            impacts,
            library_model,
            applied: BTreeSet::new(),
        }
    }

    pub fn impact(&self, method: &Location) -> Option<&MethodImpact> {
        self.impacts.get(method)
    }

    pub fn seeds(&self) -> impl Iterator<Item = &Location> {
        self.impacts.keys()
    }

    /// Builds the downstream modules once per batch of seeds, where a seed
    /// is a public target method with a non-primitive return that
    /// downstream code calls.
    pub fn analyze(ctx: &mut Context, target: &MethodRegistry) -> Result<Self> {
        let library_model = LibraryModel::new(ctx.config().downstream.library_model_path.clone());
        let annotation = ctx.config().nullable_annotation.clone();
        library_model.clear()?;
        let baseline = ctx.build_downstream()?;

        let tracker = MethodRegionTracker::new(&baseline.call_graph, &baseline.methods);
        let mut nodes: Vec<Node> = Vec::new();
        let mut seeds: Vec<&MethodRecord> = target
            .public_methods_with_non_primitive_return()
            .filter(|record| !record.is_nullable)
            .collect();
        seeds.sort_by(|a, b| (&a.class, &a.signature).cmp(&(&b.class, &b.signature)));
        for record in seeds {
            let Some(location) = record.location() else {
                continue;
            };
            let callers = tracker.callers(&record.class, &record.signature);
            if callers.is_empty() {
                continue;
            }
            let mut node = Node::new(nodes.len(), Fix::new(location, annotation.clone()));
            node.regions = callers;
            nodes.push(node);
        }
        tracing::info!(seeds = nodes.len(), "analyzing downstream impact");

        let refs: Vec<&Node> = nodes.iter().collect();
        let batches = partition(&refs);
        let mut impacts = BTreeMap::new();
        for batch in &batches {
            let locations: Vec<&Location> = batch.iter().map(|&i| &nodes[i].root.location).collect();
            library_model.write(locations.iter().copied())?;
            let after = ctx.build_downstream()?;
            for &i in batch {
                let node = &nodes[i];
                let before: HashSet<&ErrorRecord> = node.regions.iter().flat_map(|region| baseline.errors.get(region)).collect();
                let triggered: Vec<TriggeredError> = node
                    .regions
                    .iter()
                    .flat_map(|region| after.errors.get(region))
                    .filter(|error| !before.contains(error))
                    .map(|error| TriggeredError {
                        fixable_on_target: error
                            .resolving_fix
                            .as_ref()
                            .is_some_and(|fix| target.declared_in_module(&fix.location)),
                        error: error.clone(),
                    })
                    .collect();
                let impacted_parameters = impacted_parameters(&triggered, target);
                tracing::debug!(
                    seed = %node.root.location,
                    triggered = triggered.len(),
                    parameters = impacted_parameters.len(),
                    "measured downstream impact"
                );
                impacts.insert(
                    node.root.location.clone(),
                    MethodImpact {
                        triggered,
                        impacted_parameters,
                    },
                );
            }
        }
        library_model.clear()?;
        Ok(Self::from_impacts(impacts, library_model))
    }
}

/// Target parameters that resolve some triggered error, with their source
/// path taken from the target's method metadata.
fn impacted_parameters(triggered: &[TriggeredError], target: &MethodRegistry) -> BTreeSet<Location> {
    triggered
        .iter()
        .filter_map(|triggered| triggered.error.resolving_fix.as_ref())
        .filter_map(|fix| match &fix.location {
            Location::Parameter {
                class, method, index, ..
            } => {
                let record = target.find(class, method).filter(|record| record.declared_in_module)?;
                let path = record.path.clone()?;
                Some(Location::parameter(class.clone(), path, method.clone(), *index))
            }
            _ => None,
        })
        .collect()
}

impl DownstreamModel for DownstreamImpactModel {
    fn lower_bound(&self, tree: &BTreeSet<Fix>) -> i32 {
        tree.iter()
            .filter_map(|fix| self.impacts.get(&fix.location))
            .map(|impact| impact.effect(tree))
            .max()
            .unwrap_or(0)
    }

    fn upper_bound(&self, tree: &BTreeSet<Fix>) -> i32 {
        tree.iter()
            .filter_map(|fix| self.impacts.get(&fix.location))
            .map(|impact| impact.effect(tree))
            .sum()
    }

    fn impacted_parameters(&self, method: &Location) -> BTreeSet<Location> {
        self.impacts
            .get(method)
            .map(|impact| impact.impacted_parameters.clone())
            .unwrap_or_default()
    }

    fn is_not_fixable_on_target(&self, fix: &Fix) -> bool {
        self.impacts.get(&fix.location).is_some_and(|impact| {
            impact
                .triggered
                .iter()
                .any(|triggered| !triggered.fixable_on_target)
        })
    }

    fn update_impacts_after_injection(&mut self, fixes: &[Fix]) -> Result<()> {
        for impact in self.impacts.values_mut() {
            impact
                .triggered
                .retain(|triggered| !triggered.error.is_resolvable_by(fixes));
        }
        self.applied.extend(fixes.iter().map(|fix| fix.location.clone()));
        self.library_model.write(&self.applied)
    }
}
