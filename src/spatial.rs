//! R-tree index over feature envelopes for click hit-testing
//!
//! Mirrors the selection index a map renderer keeps: each feature with a
//! geometry contributes its bounding box, and point or box queries return
//! feature indices into the source document.

use crate::bbox::{BoundingBox, LngLat};
use crate::click::MapClickEvent;
use crate::geojson::GeometryDocument;
use rstar::{RTree, RTreeObject, AABB};

/// A feature's envelope tagged with its position in the document
#[derive(Clone, Debug)]
pub struct IndexedFeature {
    pub index: usize,
    pub bounds: AABB<[f64; 2]>,
}

impl IndexedFeature {
    pub fn new(index: usize, bbox: BoundingBox) -> Self {
        let bounds = AABB::from_corners([bbox.min_lng, bbox.min_lat], [bbox.max_lng, bbox.max_lat]);
        Self { index, bounds }
    }
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.bounds
    }
}

impl rstar::PointDistance for IndexedFeature {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.bounds.distance_2(point)
    }
}

#[derive(Debug)]
pub struct FeatureIndex {
    tree: RTree<IndexedFeature>,
}

impl FeatureIndex {
    /// Bulk-loads every feature that has at least one finite position
    pub fn build(doc: &GeometryDocument) -> Self {
        let objects: Vec<IndexedFeature> = doc
            .features
            .iter()
            .enumerate()
            .filter_map(|(index, feature)| feature.bbox().map(|b| IndexedFeature::new(index, b)))
            .collect();
        Self {
            tree: RTree::bulk_load(objects),
        }
    }

    /// Features whose envelope contains `point` (edges included), ascending
    pub fn features_at(&self, point: LngLat) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .tree
            .locate_all_at_point(&[point.lng, point.lat])
            .map(|obj| obj.index)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Features whose envelope intersects `bbox`, ascending
    pub fn features_in(&self, bbox: &BoundingBox) -> Vec<usize> {
        let search = AABB::from_corners([bbox.min_lng, bbox.min_lat], [bbox.max_lng, bbox.max_lat]);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&search)
            .map(|obj| obj.index)
            .collect();
        hits.sort_unstable();
        hits
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// Builds the click event a map would report for a click at `click`
pub fn hit_test(doc: &GeometryDocument, index: &FeatureIndex, click: LngLat) -> MapClickEvent {
    let features = index
        .features_at(click)
        .into_iter()
        .filter_map(|i| doc.features.get(i).cloned())
        .collect();
    MapClickEvent {
        features,
        lng_lat: click,
    }
}
