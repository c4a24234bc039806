//! Error types for spatial file loading
//!
//! Loading can fail in two ways that callers care about:
//! - **Format errors**: the file is not something we know how to read (bad
//!   extension, unreadable file). Nothing was parsed.
//! - **Parse errors**: the content does not conform to the format its name
//!   claims (malformed JSON, invalid XML, corrupt archive).

use std::io;
use thiserror::Error;

/// Result type for loader operations
pub type LoadResult<T> = Result<T, LoadError>;

/// Top-level loader error
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl LoadError {
    /// True if the file was rejected before any content was parsed
    pub fn is_format_error(&self) -> bool {
        matches!(self, LoadError::Format(_))
    }

    /// True if the content was read but failed to parse
    pub fn is_parse_error(&self) -> bool {
        matches!(self, LoadError::Parse(_))
    }
}

/// The file cannot be handled as a spatial format
#[derive(Error, Debug)]
pub enum FormatError {
    /// Extension missing or not one of zip/kml/geojson
    #[error("unsupported file format: '{name}' (expected .zip, .kml or .geojson)")]
    Unrecognized { name: String },

    /// File name does not carry the suffix the reader was dispatched for
    #[error("file '{name}' is not a .{expected} file")]
    ExtensionMismatch { name: String, expected: &'static str },

    /// The file is missing or its content could not be read
    #[error("failed to read '{name}'")]
    Unreadable {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// The content does not conform to the expected format
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid GeoJSON: {0}")]
    InvalidGeoJson(String),

    #[error("invalid XML: {0}")]
    Xml(String),

    #[error("invalid KML: {0}")]
    Kml(String),

    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A required member of a shapefile bundle is absent
    #[error("shapefile bundle is missing its .{part} part")]
    MissingPart { part: &'static str },

    #[error("invalid shapefile: {0}")]
    Shapefile(String),

    #[error("unsupported projection: {0}")]
    UnsupportedProjection(String),
}

impl From<quick_xml::Error> for ParseError {
    fn from(err: quick_xml::Error) -> Self {
        ParseError::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for ParseError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        ParseError::Xml(err.to_string())
    }
}

impl From<quick_xml::escape::EscapeError> for ParseError {
    fn from(err: quick_xml::escape::EscapeError) -> Self {
        ParseError::Xml(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_split() {
        let format: LoadError = FormatError::Unrecognized { name: "x.txt".to_string() }.into();
        assert!(format.is_format_error());
        assert!(!format.is_parse_error());

        let parse: LoadError = ParseError::Kml("no root".to_string()).into();
        assert!(parse.is_parse_error());
        assert!(!parse.is_format_error());
    }

    #[test]
    fn test_messages_name_the_file() {
        let err = FormatError::Unrecognized { name: "roads.csv".to_string() };
        assert!(err.to_string().contains("roads.csv"));

        let err = FormatError::ExtensionMismatch { name: "a.json".to_string(), expected: "geojson" };
        assert_eq!(err.to_string(), "file 'a.json' is not a .geojson file");
    }
}
