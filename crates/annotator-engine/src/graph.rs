//! Fix trees and their conflict graph.
//!
//! A [`Node`] starts from one root fix and grows a tree of companion fixes
//! that must be injected together for the root to make sense. Nodes whose
//! regions intersect cannot be evaluated in the same build, so they are
//! colored into batches by [`partition`].

use std::collections::{BTreeMap, BTreeSet};

use annotator_core::{Fix, Location, Region};
use annotator_index::{FieldDeclarationStore, Index, MethodHierarchy, RegionTracker};

use crate::downstream::DownstreamModel;

pub const REASON_FIELD_GROUP: &str = "FIELD_GROUP";
pub const REASON_OVERRIDE_PARAM: &str = "WRONG_OVERRIDE_PARAM";
pub const REASON_DOWNSTREAM_FLOW: &str = "PASS_NULLABLE";

/// What node expansion consults.
pub struct Expansion<'a> {
    pub methods: &'a dyn MethodHierarchy,
    pub fields: &'a FieldDeclarationStore,
    pub downstream: &'a dyn DownstreamModel,
    pub annotation: &'a str,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: usize,
    pub root: Fix,
    pub tree: BTreeSet<Fix>,
    pub regions: BTreeSet<Region>,
    /// Companion fixes discovered but not yet merged into the tree.
    pub triggered: BTreeSet<Fix>,
    /// Local effect of the last evaluation, penalty included.
    pub effect: i32,
    /// Whether the node gained fixes since its last evaluation, either in
    /// its tree or as new triggered fixes. Chain mode only re-evaluates
    /// changed nodes.
    pub changed: bool,
    root_source: BTreeSet<Region>,
}

impl Node {
    pub fn new(id: usize, root: Fix) -> Self {
        Self {
            id,
            tree: BTreeSet::from([root.clone()]),
            root,
            regions: BTreeSet::new(),
            triggered: BTreeSet::new(),
            effect: 0,
            changed: false,
            root_source: BTreeSet::new(),
        }
    }

    /// Records the regions that reported the root. A field root also counts
    /// every region suggesting any variable of its declaration group.
    pub fn set_root_source(&mut self, fixes: &Index<Fix>, fields: &FieldDeclarationStore) {
        self.root_source = match &self.root.location {
            Location::Field {
                class,
                path,
                variables,
            } => {
                let group = fields.group_of(class, variables);
                fixes.regions_where(|fix| match &fix.location {
                    Location::Field {
                        class: other_class,
                        path: other_path,
                        variables: other_variables,
                    } => other_class == class && other_path == path && !other_variables.is_disjoint(&group),
                    _ => false,
                })
            }
            root => fixes.regions_where(|fix| &fix.location == root),
        };
    }

    pub fn root_source(&self) -> &BTreeSet<Region> {
        &self.root_source
    }

    fn holds(&self, fix: &Fix) -> bool {
        self.tree.contains(fix) || self.tree.iter().any(|held| held.covers(fix))
    }

    /// Fixes the current tree implies but does not hold.
    fn implied(&self, expansion: &Expansion<'_>, scheduled: &BTreeSet<Location>) -> BTreeSet<Fix> {
        let mut implied = BTreeSet::new();

        let mut field_vars: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for fix in &self.tree {
            if let Location::Field { class, variables, .. } = &fix.location {
                field_vars.entry(class.as_str()).or_default().extend(variables.iter().cloned());
            }
        }

        for fix in &self.tree {
            match &fix.location {
                Location::Field {
                    class,
                    path,
                    variables,
                } => {
                    let group = expansion.fields.group_of(class, variables);
                    let covered = field_vars.get(class.as_str());
                    if covered.map_or(true, |covered| !group.is_subset(covered)) {
                        let mut companion = Fix::new(Location::field(class.clone(), path.clone(), group), expansion.annotation)
                            .with_reason(REASON_FIELD_GROUP);
                        companion.region = fix.region.clone();
                        implied.insert(companion);
                    }
                }
                Location::Parameter { class, method, index, .. } => {
                    for sub in expansion.methods.sub_methods(class, method) {
                        if sub.is_parameter_annotated(*index) || *index >= sub.annotation_flags.len() {
                            continue;
                        }
                        let Some(path) = &sub.path else {
                            continue;
                        };
                        if !sub.declared_in_module {
                            continue;
                        }
                        implied.insert(
                            Fix::new(
                                Location::parameter(sub.class.clone(), path.clone(), sub.signature.clone(), *index),
                                expansion.annotation,
                            )
                            .with_reason(REASON_OVERRIDE_PARAM)
                            .with_region(Region::new(sub.class.clone(), sub.signature.clone())),
                        );
                    }
                }
                Location::Method { class, method, .. } => {
                    for parameter in expansion.downstream.impacted_parameters(&fix.location) {
                        implied.insert(
                            Fix::new(parameter, expansion.annotation)
                                .with_reason(REASON_DOWNSTREAM_FLOW)
                                .with_region(Region::new(class.clone(), method.clone())),
                        );
                    }
                }
            }
        }

        implied.retain(|fix| !self.holds(fix) && !scheduled.contains(&fix.location));
        implied
    }

    /// Merges implied fixes into the tree until nothing new is implied.
    /// `scheduled` holds the roots of the other nodes in this round. Returns
    /// whether the tree grew.
    pub fn expand(&mut self, expansion: &Expansion<'_>, scheduled: &BTreeSet<Location>) -> bool {
        let mut grew = false;
        loop {
            let implied = self.implied(expansion, scheduled);
            if implied.is_empty() {
                break;
            }
            tracing::debug!(node = self.id, added = implied.len(), "expanding fix tree");
            grew = true;
            self.tree.extend(implied);
        }
        self.changed |= grew;
        grew
    }

    /// Moves the triggered fixes into the tree.
    pub fn merge_triggered(&mut self) {
        let triggered = std::mem::take(&mut self.triggered);
        for fix in triggered {
            if !self.holds(&fix) {
                self.changed |= self.tree.insert(fix);
            }
        }
    }

    /// Rebuilds the regions from scratch: where the root was reported, what
    /// the tree's locations affect, and the class scope of any constructor
    /// parameter in the tree.
    pub fn update_regions(&mut self, tracker: &dyn RegionTracker) {
        self.regions.clear();
        self.regions.extend(self.root_source.iter().cloned());
        for fix in &self.tree {
            if let Some(regions) = tracker.get_regions(&fix.location) {
                self.regions.extend(regions);
            }
            if fix.location.is_constructor_parameter() {
                self.regions.insert(Region::class_scope(fix.location.class()));
            }
        }
    }

    pub fn conflicts_with(&self, other: &Node) -> bool {
        !self.regions.is_disjoint(&other.regions)
    }

    /// Records one evaluation. `local_effect` is the raw error delta over
    /// the regions, `annotated_together` the fixes the other nodes of the
    /// batch injected alongside this tree, and `reported` the fixes the
    /// analyzer newly suggested in this node's regions.
    pub fn update_status(
        &mut self,
        local_effect: i32,
        annotated_together: &BTreeSet<Location>,
        reported: impl IntoIterator<Item = Fix>,
        methods: &dyn MethodHierarchy,
        fields: &FieldDeclarationStore,
    ) {
        self.effect = local_effect + self.override_penalty(annotated_together, methods);
        self.changed = false;
        self.update_triggered(reported, fields);
    }

    /// One point for every super method another node annotated while this
    /// tree left its override unannotated.
    fn override_penalty(&self, annotated_together: &BTreeSet<Location>, methods: &dyn MethodHierarchy) -> i32 {
        let mut penalty = 0;
        for fix in self.tree.iter().filter(|fix| fix.is_on_method()) {
            let Location::Method { class, method, .. } = &fix.location else {
                continue;
            };
            let Some(parent) = methods.closest_super_method(class, method) else {
                continue;
            };
            if parent.is_nullable {
                continue;
            }
            let in_tree = self.tree.iter().any(|held| {
                held.is_on_method()
                    && held.location.class() == parent.class
                    && held.location.method_signature() == Some(parent.signature.as_str())
            });
            let annotated = annotated_together.iter().any(|location| {
                matches!(location, Location::Method { class: c, method: m, .. } if *c == parent.class && *m == parent.signature)
            });
            if !in_tree && annotated {
                penalty += 1;
            }
        }
        penalty
    }

    fn update_triggered(&mut self, reported: impl IntoIterator<Item = Fix>, fields: &FieldDeclarationStore) {
        let before = self.triggered.len();
        for fix in reported {
            if self.holds(&fix) {
                continue;
            }
            if let Location::Field { class, variables, .. } = &fix.location {
                let group = fields.group_of(class, variables);
                let duplicate = self.triggered.iter().any(|held| match &held.location {
                    Location::Field {
                        class: held_class,
                        variables: held_variables,
                        ..
                    } => held_class == class && !held_variables.is_disjoint(&group),
                    _ => false,
                });
                if duplicate {
                    continue;
                }
            }
            self.triggered.insert(fix);
        }
        self.changed |= self.triggered.len() > before;
    }

    pub fn locations(&self) -> BTreeSet<Location> {
        self.tree.iter().map(|fix| fix.location.clone()).collect()
    }
}

/// Splits `nodes` into batches of pairwise region-disjoint nodes by
/// saturation-degree greedy coloring. Batches come out in color order and
/// hold indices into `nodes`.
pub fn partition(nodes: &[&Node]) -> Vec<Vec<usize>> {
    let n = nodes.len();
    let neighbors: Vec<Vec<usize>> = (0..n)
        .map(|i| (0..n).filter(|&j| j != i && nodes[i].conflicts_with(nodes[j])).collect())
        .collect();

    let mut colors: Vec<Option<usize>> = vec![None; n];
    for _ in 0..n {
        let next = (0..n)
            .filter(|&i| colors[i].is_none())
            .max_by_key(|&i| {
                let saturation: BTreeSet<usize> = neighbors[i].iter().filter_map(|&j| colors[j]).collect();
                // Reverse the index so ties go to the earliest node.
                (saturation.len(), neighbors[i].len(), std::cmp::Reverse(i))
            });
        let Some(next) = next else {
            break;
        };
        let taken: BTreeSet<usize> = neighbors[next].iter().filter_map(|&j| colors[j]).collect();
        let color = (0..).find(|color| !taken.contains(color)).unwrap_or(0);
        colors[next] = Some(color);
    }

    let mut batches: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, color) in colors.into_iter().enumerate() {
        batches.entry(color.unwrap_or(0)).or_default().push(index);
    }
    batches.into_values().collect()
}
