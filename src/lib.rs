//! Utilities behind a map viewer's file import and feature panel.
//!
//! - [`loader`] detects and converts GeoJSON, KML and zipped Shapefiles
//! - [`click`] normalizes map clicks across the antimeridian
//! - [`label`] and [`table`] render feature properties
//! - [`bbox`] and [`spatial`] answer extent and hit-test queries
//! - [`datetime`] formats timestamps for display
//!
//! # Example
//! ```ignore
//! use geofile_kit::{load_path, compute_bbox};
//!
//! let loaded = load_path("parks.geojson")?;
//! for doc in loaded.documents() {
//!     println!("{:?}", compute_bbox(Some(doc)));
//! }
//! ```

pub mod bbox;
pub mod click;
pub mod config;
pub mod datetime;
pub mod error;
pub mod geojson;
pub mod label;
pub mod loader;
pub mod logging;
pub mod parse_xml;
pub mod spatial;
pub mod table;

pub use bbox::{compute_bbox, compute_polygon_bounds, is_within_bbox, BoundingBox, LngLat};
pub use click::{normalize_click_coordinate, ClickTarget, MapClickEvent};
pub use config::Config;
pub use datetime::{format_date_time, format_date_time_in};
pub use error::{FormatError, LoadError, ParseError};
pub use geojson::{Feature, Geometry, GeometryDocument, Properties};
pub use label::{extract_label, extract_label_with};
pub use loader::{
    detect_format, load_as_geojson, load_path, FsFile, InMemoryFile, LoadedDocument,
    SpatialFormat, SpatialSource,
};
pub use spatial::{hit_test, FeatureIndex};
pub use table::{render_properties_table, render_properties_table_with};
