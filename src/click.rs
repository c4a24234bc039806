//! Map click normalization across the antimeridian

use crate::bbox::LngLat;
use crate::geojson::{Feature, Properties};
use serde::Serialize;

/// A click on the map and the features rendered under it, topmost first
#[derive(Debug, Clone, PartialEq)]
pub struct MapClickEvent {
    pub features: Vec<Feature>,
    pub lng_lat: LngLat,
}

/// Where to anchor a popup for the clicked feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickTarget {
    /// `[lng, lat]`, with lng moved to within 180 degrees of the click
    pub coordinates: [f64; 2],
    pub properties: Properties,
}

/// Picks the first hit feature and wraps its longitude next to the click.
///
/// A map that repeats the world horizontally reports click longitudes outside
/// [-180, 180]. The feature position is shifted by whole turns so that the
/// popup opens on the copy of the world that was clicked.
///
/// Returns `None` if nothing was hit, the first feature has no position, or a
/// longitude is not finite.
pub fn normalize_click_coordinate(event: &MapClickEvent) -> Option<ClickTarget> {
    let feature = event.features.first()?;
    let position = feature.geometry.as_ref()?.first_position()?;
    let (&lng, &lat) = (position.first()?, position.get(1)?);

    let click_lng = event.lng_lat.lng;
    if !lng.is_finite() || !click_lng.is_finite() {
        return None;
    }

    Some(ClickTarget {
        coordinates: [lng + wrap_offset(click_lng, lng), lat],
        properties: feature.properties.clone(),
    })
}

/// Whole turns of 360 degrees that bring `lng` within 180 of `click_lng`
fn wrap_offset(click_lng: f64, lng: f64) -> f64 {
    let diff = click_lng - lng;
    if diff.abs() <= 180.0 {
        return 0.0;
    }
    let turns = ((diff.abs() - 180.0) / 360.0).ceil();
    turns * 360.0 * diff.signum()
}
