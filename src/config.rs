//! User-tunable settings for labels, the properties panel and date display

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Property keys tried first when picking a feature label, in priority order
pub const DEFAULT_LABEL_KEYS: [&str; 7] = [
    "name",
    "nama",
    "nameobj",
    "id",
    "fid",
    "objectid",
    "description",
];

/// Keys never shown in the properties table
pub const DEFAULT_HIDDEN_PROPERTIES: [&str; 2] = ["WKT_GEOMETRY", "ogc_fid"];

/// chrono pattern equivalent to `YYYY-MM-DD HH:mm:ss`
pub const DEFAULT_DATE_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

/// Environment variable the CLI reads when no `--config` is given
pub const CONFIG_ENV_VAR: &str = "GEOFILE_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Styling for the properties table
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableStyle {
    pub class: String,
    pub shaded_background: String,
    pub plain_background: String,
}

impl Default for TableStyle {
    fn default() -> Self {
        Self {
            class: "properties-table".to_string(),
            shaded_background: "#f2f2f2".to_string(),
            plain_background: "#ffffff".to_string(),
        }
    }
}

/// Settings shared by the label extractor, table renderer and date formatter.
///
/// Every field is optional in the JSON form; missing fields take their defaults.
///
/// ```json
/// { "labelKeys": ["title", "name"], "table": { "shadedBackground": "#eee" } }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub label_keys: Vec<String>,
    pub hidden_properties: Vec<String>,
    pub table: TableStyle,
    pub date_pattern: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            label_keys: DEFAULT_LABEL_KEYS.iter().map(|k| k.to_string()).collect(),
            hidden_properties: DEFAULT_HIDDEN_PROPERTIES.iter().map(|k| k.to_string()).collect(),
            table: TableStyle::default(),
            date_pattern: DEFAULT_DATE_PATTERN.to_string(),
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// True if `key` must be left out of the properties table
    pub fn is_hidden(&self, key: &str) -> bool {
        self.hidden_properties.iter().any(|k| k == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.label_keys[0], "name");
        assert_eq!(config.label_keys.len(), 7);
        assert!(config.is_hidden("WKT_GEOMETRY"));
        assert!(config.is_hidden("ogc_fid"));
        assert!(!config.is_hidden("name"));
        assert_eq!(config.date_pattern, "%Y-%m-%d %H:%M:%S");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json_str(
            r##"{ "labelKeys": ["title"], "table": { "shadedBackground": "#eee" } }"##,
        )
        .unwrap();
        assert_eq!(config.label_keys, vec!["title".to_string()]);
        assert_eq!(config.table.shaded_background, "#eee");
        assert_eq!(config.table.plain_background, "#ffffff");
        assert!(config.is_hidden("ogc_fid"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(Config::from_json_str("{"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::load("/definitely/not/here.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
