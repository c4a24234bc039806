//! Zipped Shapefile bundles
//!
//! An archive may hold several shapefiles. Entries are grouped by their path
//! without extension; every group with a `.shp` member becomes one layer.
//!
//! # Module Structure
//! - `shp` - geometry records
//! - `dbf` - attribute records
//! - `prj` - projection detection and unprojection to WGS84

pub mod dbf;
pub mod prj;
pub mod shp;

use crate::error::ParseError;
use crate::geojson::{Feature, GeometryDocument};
use dbf::TextEncoding;
use indexmap::IndexMap;
use prj::Projection;
use std::io::{Cursor, Read};
use tracing::{debug, warn};
use zip::ZipArchive;

/// Largest archive member that will be extracted
const MAX_ENTRY_BYTES: u64 = 1 << 30;

/// The files making up one shapefile layer
#[derive(Debug, Default)]
struct BundleParts {
    shp: Option<Vec<u8>>,
    dbf: Option<Vec<u8>>,
    prj: Option<Vec<u8>>,
    cpg: Option<Vec<u8>>,
}

/// Decodes every shapefile layer in a zip archive, in archive order
///
/// # Errors
/// * [`ParseError::Zip`] if the archive itself is corrupt
/// * [`ParseError::MissingPart`] if no `.shp` member exists
/// * [`ParseError::Shapefile`] / [`ParseError::UnsupportedProjection`] from a layer
pub fn read_zipped_shapefile(bytes: &[u8]) -> Result<Vec<GeometryDocument>, ParseError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut bundles: IndexMap<String, BundleParts> = IndexMap::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let path = entry.name().to_string();
        if path.starts_with("__MACOSX/") {
            continue;
        }
        let Some((stem, extension)) = path.rsplit_once('.') else {
            continue;
        };

        let extension = extension.to_ascii_lowercase();
        if !matches!(extension.as_str(), "shp" | "dbf" | "prj" | "cpg") {
            debug!(entry = %path, "ignoring zip entry");
            continue;
        }

        // The declared size is untrusted; grow the buffer as bytes arrive
        let mut data = Vec::new();
        entry
            .by_ref()
            .take(MAX_ENTRY_BYTES + 1)
            .read_to_end(&mut data)
            .map_err(|e| ParseError::Shapefile(format!("failed to extract '{}': {}", path, e)))?;
        if data.len() as u64 > MAX_ENTRY_BYTES {
            return Err(ParseError::Shapefile(format!(
                "'{}' is larger than {} bytes",
                path, MAX_ENTRY_BYTES
            )));
        }

        let parts = bundles.entry(stem.to_string()).or_default();
        match extension.as_str() {
            "shp" => parts.shp = Some(data),
            "dbf" => parts.dbf = Some(data),
            "prj" => parts.prj = Some(data),
            _ => parts.cpg = Some(data),
        }
    }

    let mut layers = Vec::new();
    for (stem, parts) in bundles {
        match parts.shp {
            Some(ref shp) => layers.push(decode_layer(&stem, shp, &parts)?),
            None => warn!(layer = %stem, "ignoring shapefile parts without a .shp"),
        }
    }

    if layers.is_empty() {
        return Err(ParseError::MissingPart { part: "shp" });
    }
    Ok(layers)
}

fn decode_layer(name: &str, shp: &[u8], parts: &BundleParts) -> Result<GeometryDocument, ParseError> {
    let projection = match &parts.prj {
        Some(prj) => Projection::from_wkt(&String::from_utf8_lossy(prj))?,
        None => Projection::Geographic,
    };
    let encoding = TextEncoding::from_cpg(parts.cpg.as_deref());

    let shapes = shp::read_shapes(shp)?;
    let records = match &parts.dbf {
        Some(dbf) => dbf::read_records(dbf, encoding)?,
        None => Vec::new(),
    };

    if !records.is_empty() && records.len() != shapes.len() {
        warn!(
            layer = name,
            shapes = shapes.len(),
            records = records.len(),
            "shape and attribute counts differ"
        );
    }
    let null_shapes = shapes.iter().filter(|s| s.is_none()).count();
    if null_shapes > 0 {
        warn!(layer = name, null_shapes, "layer contains null shapes");
    }

    let mut records = records.into_iter();
    let features = shapes
        .into_iter()
        .map(|shape| {
            let geometry = shape.map(|g| projection.to_wgs84(g));
            Feature::new(geometry, records.next().unwrap_or_default())
        })
        .collect();

    let mut document = GeometryDocument::new(features);
    document.file_name = Some(name.to_string());
    debug!(layer = name, ?projection, features = document.features.len(), "decoded shapefile layer");
    Ok(document)
}
