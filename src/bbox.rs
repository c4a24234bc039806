//! Bounding-box math over GeoJSON documents
//!
//! Boxes are `[min_lng, min_lat, max_lng, max_lat]`. Computation never fails:
//! anything without usable positions yields `None`, which callers treat as
//! "zoom to the default view".

use crate::geojson::{Feature, Geometry, GeometryDocument, Position};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Feature count above which `compute_bbox` folds in parallel
const PARALLEL_THRESHOLD: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f64; 4]", from = "[f64; 4]")]
pub struct BoundingBox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Self {
        Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    /// Degenerate box covering a single coordinate
    pub fn from_point(lng: f64, lat: f64) -> Self {
        Self::new(lng, lat, lng, lat)
    }

    /// Grows the box in place to include a coordinate
    pub fn extend(&mut self, lng: f64, lat: f64) {
        self.min_lng = self.min_lng.min(lng);
        self.min_lat = self.min_lat.min(lat);
        self.max_lng = self.max_lng.max(lng);
        self.max_lat = self.max_lat.max(lat);
    }

    pub fn extended(mut self, lng: f64, lat: f64) -> Self {
        self.extend(lng, lat);
        self
    }

    /// Smallest box covering both
    pub fn union(self, other: BoundingBox) -> Self {
        Self::new(
            self.min_lng.min(other.min_lng),
            self.min_lat.min(other.min_lat),
            self.max_lng.max(other.max_lng),
            self.max_lat.max(other.max_lat),
        )
    }

    /// Inclusive on every edge
    pub fn contains(&self, point: LngLat) -> bool {
        point.lng >= self.min_lng
            && point.lng <= self.max_lng
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lng <= other.max_lng
            && other.min_lng <= self.max_lng
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lng, self.min_lat, self.max_lng, self.max_lat]
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        bbox.to_array()
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(a: [f64; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }
}

impl Geometry {
    /// Envelope of every finite position, or `None` if there are none
    pub fn bbox(&self) -> Option<BoundingBox> {
        let mut bbox: Option<BoundingBox> = None;
        self.visit_positions(&mut |position: &[f64]| {
            if let [lng, lat, ..] = *position {
                if lng.is_finite() && lat.is_finite() {
                    bbox = Some(match bbox {
                        Some(b) => b.extended(lng, lat),
                        None => BoundingBox::from_point(lng, lat),
                    });
                }
            }
        });
        bbox
    }
}

impl Feature {
    pub fn bbox(&self) -> Option<BoundingBox> {
        self.geometry.as_ref().and_then(Geometry::bbox)
    }
}

/// Envelope of an entire document.
///
/// Returns `None` for an absent document or one without any positions.
pub fn compute_bbox(doc: Option<&GeometryDocument>) -> Option<BoundingBox> {
    let features = &doc?.features;
    if features.len() > PARALLEL_THRESHOLD {
        features
            .par_iter()
            .filter_map(Feature::bbox)
            .reduce_with(BoundingBox::union)
    } else {
        features
            .iter()
            .filter_map(Feature::bbox)
            .reduce(BoundingBox::union)
    }
}

/// Folds a ring into a box that starts at its first coordinate
pub fn compute_polygon_bounds(ring: &[Position]) -> Option<BoundingBox> {
    let mut coords = ring.iter().filter_map(|p| match p.as_slice() {
        [lng, lat, ..] => Some((*lng, *lat)),
        _ => None,
    });
    let (lng, lat) = coords.next()?;
    Some(coords.fold(BoundingBox::from_point(lng, lat), |b, (lng, lat)| {
        b.extended(lng, lat)
    }))
}

/// Whether a point lies inside the box, boundaries included
pub fn is_within_bbox(point: LngLat, bbox: &BoundingBox) -> bool {
    bbox.contains(point)
}
