//! Region trackers: which regions may change once a location is annotated.

use std::collections::BTreeSet;

use annotator_core::{Location, Region};

use crate::method::MethodHierarchy;
use crate::store::{Index, TrackerNode};

pub trait RegionTracker {
    /// Regions to re-check after annotating `location`, or `None` when this
    /// tracker does not model the location's kind.
    fn get_regions(&self, location: &Location) -> Option<BTreeSet<Region>>;
}

/// Callers of a method, the method itself and its closest super method.
pub struct MethodRegionTracker<'a> {
    call_graph: &'a Index<TrackerNode>,
    methods: &'a dyn MethodHierarchy,
}

impl<'a> MethodRegionTracker<'a> {
    pub fn new(call_graph: &'a Index<TrackerNode>, methods: &'a dyn MethodHierarchy) -> Self {
        Self { call_graph, methods }
    }

    /// Regions calling `class#member`.
    pub fn callers(&self, class: &str, member: &str) -> BTreeSet<Region> {
        self.call_graph
            .get_by_method(class, member)
            .into_iter()
            .map(|edge| edge.caller.clone())
            .collect()
    }
}

impl RegionTracker for MethodRegionTracker<'_> {
    fn get_regions(&self, location: &Location) -> Option<BTreeSet<Region>> {
        let Location::Method { class, method, .. } = location else {
            return None;
        };
        let mut regions = self.callers(class, method);
        regions.insert(Region::new(class.clone(), method.clone()));
        if let Some(parent) = self.methods.closest_super_method(class, method) {
            regions.insert(Region::new(parent.class.clone(), parent.signature.clone()));
        }
        Some(regions)
    }
}

/// Regions reading a field plus the field's own initializer scope.
pub struct FieldRegionTracker<'a> {
    field_graph: &'a Index<TrackerNode>,
}

impl<'a> FieldRegionTracker<'a> {
    pub fn new(field_graph: &'a Index<TrackerNode>) -> Self {
        Self { field_graph }
    }
}

impl RegionTracker for FieldRegionTracker<'_> {
    fn get_regions(&self, location: &Location) -> Option<BTreeSet<Region>> {
        let Location::Field { class, variables, .. } = location else {
            return None;
        };
        let mut regions = BTreeSet::new();
        for variable in variables {
            regions.extend(
                self.field_graph
                    .get_by_method(class, variable)
                    .into_iter()
                    .map(|edge| edge.caller.clone()),
            );
            regions.insert(Region::new(class.clone(), variable.clone()));
        }
        Some(regions)
    }
}

/// A parameter only affects the body of its own method.
#[derive(Debug, Default)]
pub struct ParameterRegionTracker;

impl RegionTracker for ParameterRegionTracker {
    fn get_regions(&self, location: &Location) -> Option<BTreeSet<Region>> {
        let Location::Parameter { class, method, .. } = location else {
            return None;
        };
        Some(BTreeSet::from([Region::new(class.clone(), method.clone())]))
    }
}

/// Asks each tracker in order and returns the first answer.
pub struct CompoundRegionTracker<'a> {
    trackers: Vec<Box<dyn RegionTracker + 'a>>,
}

impl<'a> CompoundRegionTracker<'a> {
    pub fn new(trackers: Vec<Box<dyn RegionTracker + 'a>>) -> Self {
        Self { trackers }
    }

    /// Field, method and parameter trackers over one build's metadata.
    pub fn standard(
        call_graph: &'a Index<TrackerNode>,
        field_graph: &'a Index<TrackerNode>,
        methods: &'a dyn MethodHierarchy,
    ) -> Self {
        Self::new(vec![
            Box::new(FieldRegionTracker::new(field_graph)),
            Box::new(MethodRegionTracker::new(call_graph, methods)),
            Box::new(ParameterRegionTracker),
        ])
    }
}

impl RegionTracker for CompoundRegionTracker<'_> {
    fn get_regions(&self, location: &Location) -> Option<BTreeSet<Region>> {
        self.trackers.iter().find_map(|tracker| tracker.get_regions(location))
    }
}
