// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dataset snapshot: owns the map elements, their spatial index and a lazily
//! computed overlap table.
//!
//! The snapshot is immutable. Changing elements means taking them back with
//! [`MapData::into_elements`] (or calling [`MapData::rebuild`]) and building a
//! new snapshot, which also discards every cached overlap.

use std::sync::{Arc, OnceLock};

use rustc_hash::FxHashMap;

use crate::bounds::{Aabb, BoundedObject, Padded};
use crate::config::Tolerances;
use crate::element::{ElementId, MapElement};
use crate::error::{Error, Result};
use crate::fault::{Fault, FaultReporter, TracingFaultReporter};
use crate::overlap::{OverlapDetector, OverlapRecord};
use crate::spatial_index::SpatialIndex;

/// Upper bound on grid cells per axis for automatically sized indexes
const MAX_CELLS_PER_AXIS: usize = 512;

/// Overlaps of every element, each record oriented with that element as `e1`
#[derive(Debug, Default)]
struct OverlapTable {
    per_slot: Vec<Vec<OverlapRecord>>,
    failures: Vec<Fault>,
}

pub struct MapData {
    /// Elements registered under boxes padded by the touch tolerance
    index: SpatialIndex<Padded<MapElement>>,
    /// ElementId -> slot in `index`
    slots: FxHashMap<ElementId, usize>,
    detector: OverlapDetector,
    reporter: Arc<dyn FaultReporter>,
    overlaps: OnceLock<OverlapTable>,
}

impl MapData {
    /// Snapshot with default tolerances, logging faults through `tracing`
    pub fn new(elements: Vec<MapElement>) -> Result<Self> {
        Self::with_options(elements, Tolerances::default(), Arc::new(TracingFaultReporter))
    }

    pub fn with_options(
        elements: Vec<MapElement>,
        tolerances: Tolerances,
        reporter: Arc<dyn FaultReporter>,
    ) -> Result<Self> {
        let detector = OverlapDetector::new(tolerances)?;

        let mut slots = FxHashMap::default();
        for (slot, element) in elements.iter().enumerate() {
            if slots.insert(element.id, slot).is_some() {
                return Err(Error::DuplicateElement(element.id));
            }
        }

        let bounds = elements
            .iter()
            .map(BoundedObject::bounding_box)
            .filter(Aabb::is_valid)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(|| Aabb::new(0.0, 0.0, 0.0, 0.0));
        let margin = detector.tolerances().touch_epsilon;
        let cells = cells_per_axis(elements.len());
        let padded = elements
            .into_iter()
            .map(|element| Padded::new(element, margin));
        let index = SpatialIndex::build(bounds.expand(margin), cells, cells, padded)?;

        Ok(Self {
            index,
            slots,
            detector,
            reporter,
            overlaps: OnceLock::new(),
        })
    }

    /// Elements in insertion order
    pub fn elements(&self) -> impl ExactSizeIterator<Item = &MapElement> + '_ {
        self.index.objects().iter().map(|padded| &padded.inner)
    }

    pub fn element(&self, id: ElementId) -> Option<&MapElement> {
        self.slots
            .get(&id)
            .and_then(|&slot| self.index.get(slot))
            .map(|padded| &padded.inner)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &SpatialIndex<Padded<MapElement>> {
        &self.index
    }

    pub fn tolerances(&self) -> &Tolerances {
        self.detector.tolerances()
    }

    /// Elements whose bounding box overlaps `region`
    pub fn query<'a>(&'a self, region: &'a Aabb) -> impl Iterator<Item = &'a MapElement> + 'a {
        self.index
            .query_objects(region)
            .map(|padded| &padded.inner)
            .filter(move |e| e.bounding_box().intersects(region))
    }

    /// All overlaps of element `id`, oriented with `id` as `e1` and sorted by
    /// the other element. Computes the whole table on first use.
    pub fn overlaps_of(&self, id: ElementId) -> &[OverlapRecord] {
        let table = self.overlap_table();
        self.slots
            .get(&id)
            .and_then(|&slot| table.per_slot.get(slot))
            .map_or(&[], Vec::as_slice)
    }

    /// Elements that failed validation during overlap detection
    pub fn faults(&self) -> &[Fault] {
        &self.overlap_table().failures
    }

    /// Whether the overlap table has been computed yet
    pub fn overlaps_computed(&self) -> bool {
        self.overlaps.get().is_some()
    }

    /// Fresh snapshot over the same elements with an empty overlap cache
    pub fn rebuild(self) -> Result<Self> {
        let tolerances = *self.detector.tolerances();
        let reporter = Arc::clone(&self.reporter);
        Self::with_options(self.into_elements(), tolerances, reporter)
    }

    pub fn into_elements(self) -> Vec<MapElement> {
        self.index
            .into_objects()
            .into_iter()
            .map(Padded::into_inner)
            .collect()
    }

    fn overlap_table(&self) -> &OverlapTable {
        self.overlaps.get_or_init(|| {
            let report = self.detector.detect(&self.index, self.reporter.as_ref());

            let mut per_slot = vec![Vec::new(); self.index.len()];
            for record in report.records {
                let slots = (self.slots.get(&record.e1), self.slots.get(&record.e2));
                if let (Some(&s1), Some(&s2)) = slots {
                    per_slot[s2].push(record.reversed());
                    per_slot[s1].push(record);
                }
            }
            for records in &mut per_slot {
                records.sort_by_key(|r| r.e2);
            }

            OverlapTable {
                per_slot,
                failures: report.failures,
            }
        })
    }
}

impl std::fmt::Debug for MapData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapData")
            .field("elements", &self.index.len())
            .field("bounds", self.index.bounds())
            .field("overlaps_computed", &self.overlaps_computed())
            .finish()
    }
}

/// Roughly one element per cell on a square grid
fn cells_per_axis(elements: usize) -> usize {
    ((elements as f64).sqrt().ceil() as usize).clamp(1, MAX_CELLS_PER_AXIS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::CollectingFaultReporter;
    use crate::overlap::OverlapKind;
    use crate::polygon::PolygonWithHoles;
    use nalgebra::Point2;

    fn pt(x: f64, z: f64) -> Point2<f64> {
        Point2::new(x, z)
    }

    fn square(id: u32, min: f64, max: f64) -> MapElement {
        MapElement::area(
            id,
            PolygonWithHoles::simple(vec![pt(min, min), pt(max, min), pt(max, max), pt(min, max)]),
        )
    }

    fn sample() -> Vec<MapElement> {
        vec![
            square(10, 0.0, 10.0),
            square(20, 2.0, 4.0),
            MapElement::line(30, vec![pt(-5.0, 5.0), pt(15.0, 5.0)]),
            square(40, 100.0, 110.0),
        ]
    }

    #[test]
    fn test_empty_dataset() {
        let data = MapData::new(Vec::new()).unwrap();
        assert!(data.is_empty());
        assert!(data.overlaps_of(ElementId(1)).is_empty());
        assert!(data.faults().is_empty());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let err = MapData::new(vec![square(1, 0.0, 1.0), square(1, 2.0, 3.0)]).unwrap_err();
        assert_eq!(err, Error::DuplicateElement(ElementId(1)));
    }

    #[test]
    fn test_overlaps_are_lazy_and_oriented() {
        let data = MapData::new(sample()).unwrap();
        assert!(!data.overlaps_computed());

        let outer = data.overlaps_of(ElementId(10));
        assert!(data.overlaps_computed());
        assert_eq!(outer.len(), 2);
        assert!(outer.iter().all(|r| r.e1 == ElementId(10)));
        assert_eq!(outer[0].e2, ElementId(20));
        assert_eq!(outer[0].kind, OverlapKind::Contains);
        assert_eq!(outer[1].e2, ElementId(30));
        assert_eq!(outer[1].kind, OverlapKind::Crossing);

        let inner = data.overlaps_of(ElementId(20));
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].kind, OverlapKind::ContainedBy);

        assert!(data.overlaps_of(ElementId(40)).is_empty());
        assert!(data.overlaps_of(ElementId(99)).is_empty());
    }

    #[test]
    fn test_query_region() {
        let data = MapData::new(sample()).unwrap();
        let region = Aabb::new(99.0, 99.0, 101.0, 101.0);
        let ids: Vec<ElementId> = data.query(&region).map(|e| e.id).collect();
        assert_eq!(ids, vec![ElementId(40)]);
    }

    #[test]
    fn test_faults_reported_once() {
        let mut elements = sample();
        elements.push(MapElement::line(50, vec![pt(1.0, 1.0), pt(1.0, 1.0)]));

        let reporter = Arc::new(CollectingFaultReporter::new());
        let data =
            MapData::with_options(elements, Tolerances::default(), reporter.clone()).unwrap();

        data.overlaps_of(ElementId(10));
        data.overlaps_of(ElementId(20));
        assert_eq!(data.faults().len(), 1);
        assert_eq!(reporter.len(), 1);
        assert!(data.overlaps_of(ElementId(50)).is_empty());
    }

    #[test]
    fn test_rebuild_clears_cache() {
        let data = MapData::new(sample()).unwrap();
        data.overlaps_of(ElementId(10));
        assert!(data.overlaps_computed());

        let rebuilt = data.rebuild().unwrap();
        assert!(!rebuilt.overlaps_computed());
        assert_eq!(rebuilt.len(), 4);
        assert_eq!(rebuilt.element(ElementId(30)).unwrap().kind_name(), "line");
    }
}
