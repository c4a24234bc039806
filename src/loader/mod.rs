//! Spatial file loader
//!
//! Detects a file's format from its extension and converts its content into a
//! [`GeometryDocument`]. Three formats are recognized:
//! - `.geojson` - parsed directly with serde_json
//! - `.kml` - parsed into an XML tree, then converted feature by feature
//! - `.zip` - a zipped Shapefile bundle (`.shp` + optional `.dbf`/`.prj`/`.cpg`)
//!
//! Loading is a single synchronous read per call. Nothing is cached and nothing
//! is retried; a failed load is retried by calling again.

pub mod kml;
pub mod shapefile;

use crate::error::{FormatError, LoadResult};
use crate::geojson::{parse_geojson, GeometryDocument};
use crate::parse_xml::parse_xml_str;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Recognized spatial file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialFormat {
    Zip,
    Kml,
    GeoJson,
}

impl SpatialFormat {
    /// Lowercase tag, identical to the file extension
    pub fn as_str(&self) -> &'static str {
        match self {
            SpatialFormat::Zip => "zip",
            SpatialFormat::Kml => "kml",
            SpatialFormat::GeoJson => "geojson",
        }
    }
}

impl fmt::Display for SpatialFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detects the format from a file name's extension, ignoring case.
///
/// Only the final path component is considered. A name without an extension,
/// or with any extension other than zip/kml/geojson, yields `None`.
pub fn detect_format(name: &str) -> Option<SpatialFormat> {
    let file_name = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let (_, extension) = file_name.rsplit_once('.')?;
    match extension.to_ascii_lowercase().as_str() {
        "zip" => Some(SpatialFormat::Zip),
        "kml" => Some(SpatialFormat::Kml),
        "geojson" => Some(SpatialFormat::GeoJson),
        _ => None,
    }
}

/// A named blob whose content can be read as text or bytes
pub trait SpatialSource {
    /// File name, used only to derive the extension
    fn name(&self) -> &str;

    /// Reads the whole content as text. Invalid UTF-8 is replaced, not rejected.
    fn read_text(&self) -> io::Result<String>;

    fn read_bytes(&self) -> io::Result<Vec<u8>>;
}

/// A file already held in memory, e.g. an upload
#[derive(Debug, Clone)]
pub struct InMemoryFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InMemoryFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

impl SpatialSource for InMemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_text(&self) -> io::Result<String> {
        Ok(String::from_utf8_lossy(&self.bytes).into_owned())
    }

    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

/// A file on disk, read lazily when the loader asks for content
#[derive(Debug, Clone)]
pub struct FsFile {
    path: PathBuf,
    name: String,
}

impl FsFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SpatialSource for FsFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_text(&self) -> io::Result<String> {
        let bytes = std::fs::read(&self.path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn read_bytes(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}

/// Result of loading a spatial file
///
/// Zip archives holding more than one shapefile produce one document per layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LoadedDocument {
    Single(GeometryDocument),
    Layers(Vec<GeometryDocument>),
}

impl LoadedDocument {
    /// All documents, in load order
    pub fn documents(&self) -> &[GeometryDocument] {
        match self {
            LoadedDocument::Single(doc) => std::slice::from_ref(doc),
            LoadedDocument::Layers(docs) => docs,
        }
    }

    pub fn into_documents(self) -> Vec<GeometryDocument> {
        match self {
            LoadedDocument::Single(doc) => vec![doc],
            LoadedDocument::Layers(docs) => docs,
        }
    }

    pub fn feature_count(&self) -> usize {
        self.documents().iter().map(|d| d.features.len()).sum()
    }
}

/// Loads a spatial file and converts it to GeoJSON.
///
/// # Arguments
/// * `source` - The file to load; its name selects the reader
/// * `text` - Content already read by the caller. Used instead of reading
///   for GeoJSON and KML; ignored for zip archives, which are binary.
///
/// # Errors
/// * [`FormatError::Unrecognized`] before any read if the extension is unknown
/// * [`FormatError::Unreadable`] if the content cannot be read
/// * [`crate::error::ParseError`] if the content does not match its format
pub fn load_as_geojson<S>(source: &S, text: Option<&str>) -> LoadResult<LoadedDocument>
where
    S: SpatialSource + ?Sized,
{
    let name = source.name();
    let format = detect_format(name).ok_or_else(|| FormatError::Unrecognized {
        name: name.to_string(),
    })?;

    debug!(file = name, %format, "loading spatial file");

    let loaded = match format {
        SpatialFormat::GeoJson => LoadedDocument::Single(read_geojson(source, text)?),
        SpatialFormat::Kml => LoadedDocument::Single(read_kml(source, text)?),
        SpatialFormat::Zip => read_shapefile_zip(source)?,
    };

    info!(
        file = name,
        %format,
        layers = loaded.documents().len(),
        features = loaded.feature_count(),
        "spatial file loaded"
    );
    Ok(loaded)
}

/// Loads a file from disk; see [`load_as_geojson`]
pub fn load_path<P: AsRef<Path>>(path: P) -> LoadResult<LoadedDocument> {
    load_as_geojson(&FsFile::new(path), None)
}

fn read_geojson<S: SpatialSource + ?Sized>(source: &S, text: Option<&str>) -> LoadResult<GeometryDocument> {
    let name = source.name();
    if !name.to_ascii_lowercase().ends_with(".geojson") {
        return Err(FormatError::ExtensionMismatch {
            name: name.to_string(),
            expected: SpatialFormat::GeoJson.as_str(),
        }
        .into());
    }

    let content = source_text(source, text)?;
    Ok(parse_geojson(strip_bom(&content))?)
}

fn read_kml<S: SpatialSource + ?Sized>(source: &S, text: Option<&str>) -> LoadResult<GeometryDocument> {
    let content = source_text(source, text)?;
    let root = parse_xml_str(strip_bom(&content))?;
    Ok(kml::kml_to_geojson(&root)?)
}

fn read_shapefile_zip<S: SpatialSource + ?Sized>(source: &S) -> LoadResult<LoadedDocument> {
    let bytes = source.read_bytes().map_err(|e| unreadable(source, e))?;
    let mut layers = shapefile::read_zipped_shapefile(&bytes)?;

    if layers.len() == 1 {
        if let Some(layer) = layers.pop() {
            return Ok(LoadedDocument::Single(layer));
        }
    }
    Ok(LoadedDocument::Layers(layers))
}

fn source_text<'a, S: SpatialSource + ?Sized>(source: &S, text: Option<&'a str>) -> LoadResult<Cow<'a, str>> {
    match text {
        Some(text) => Ok(Cow::Borrowed(text)),
        None => source
            .read_text()
            .map(Cow::Owned)
            .map_err(|e| unreadable(source, e).into()),
    }
}

fn unreadable<S: SpatialSource + ?Sized>(source: &S, error: io::Error) -> FormatError {
    FormatError::Unreadable {
        name: source.name().to_string(),
        source: error,
    }
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Source that counts reads and always fails them
    struct CountingSource {
        name: &'static str,
        reads: Cell<usize>,
    }

    impl SpatialSource for CountingSource {
        fn name(&self) -> &str {
            self.name
        }

        fn read_text(&self) -> io::Result<String> {
            self.reads.set(self.reads.get() + 1);
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"))
        }

        fn read_bytes(&self) -> io::Result<Vec<u8>> {
            self.reads.set(self.reads.get() + 1);
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"))
        }
    }

    #[test]
    fn test_detect_format_any_case() {
        assert_eq!(detect_format("a.zip"), Some(SpatialFormat::Zip));
        assert_eq!(detect_format("A.ZIP"), Some(SpatialFormat::Zip));
        assert_eq!(detect_format("roads.KmL"), Some(SpatialFormat::Kml));
        assert_eq!(detect_format("x.GeoJSON"), Some(SpatialFormat::GeoJson));
        assert_eq!(detect_format("dir.kml/inner.geojson"), Some(SpatialFormat::GeoJson));
    }

    #[test]
    fn test_detect_format_rejects_others() {
        assert_eq!(detect_format("x.txt"), None);
        assert_eq!(detect_format("x.json"), None);
        assert_eq!(detect_format("zip"), None);
        assert_eq!(detect_format("archive.zip.bak"), None);
        assert_eq!(detect_format("dir.kml/readme"), None);
        assert_eq!(detect_format(""), None);
    }

    #[test]
    fn test_format_tags() {
        assert_eq!(SpatialFormat::Zip.to_string(), "zip");
        assert_eq!(SpatialFormat::Kml.as_str(), "kml");
        assert_eq!(SpatialFormat::GeoJson.as_str(), "geojson");
    }

    #[test]
    fn test_unrecognized_extension_never_reads() {
        let source = CountingSource { name: "x.txt", reads: Cell::new(0) };
        let err = load_as_geojson(&source, None).unwrap_err();
        assert!(err.is_format_error());
        assert_eq!(source.reads.get(), 0);
    }

    #[test]
    fn test_read_failure_is_format_error() {
        let source = CountingSource { name: "x.geojson", reads: Cell::new(0) };
        let err = load_as_geojson(&source, None).unwrap_err();
        assert!(matches!(
            err,
            crate::error::LoadError::Format(FormatError::Unreadable { .. })
        ));
        assert_eq!(source.reads.get(), 1);
    }

    #[test]
    fn test_preloaded_text_skips_read() {
        let source = CountingSource { name: "x.geojson", reads: Cell::new(0) };
        let loaded = load_as_geojson(
            &source,
            Some(r#"{"type":"FeatureCollection","features":[]}"#),
        )
        .unwrap();
        assert_eq!(loaded.feature_count(), 0);
        assert_eq!(source.reads.get(), 0);
    }

    #[test]
    fn test_geojson_with_bom() {
        let file = InMemoryFile::new(
            "bom.geojson",
            "\u{feff}{\"type\":\"FeatureCollection\",\"features\":[]}",
        );
        let loaded = load_as_geojson(&file, None).unwrap();
        assert_eq!(loaded.documents().len(), 1);
    }

    #[test]
    fn test_loaded_document_accessors() {
        let single = LoadedDocument::Single(GeometryDocument::default());
        assert_eq!(single.documents().len(), 1);
        assert_eq!(single.clone().into_documents().len(), 1);

        let layers = LoadedDocument::Layers(vec![GeometryDocument::default(); 3]);
        assert_eq!(layers.documents().len(), 3);
        assert_eq!(layers.feature_count(), 0);
    }
}
