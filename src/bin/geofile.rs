//! Command-line front end for geofile_kit
//!
//! Usage:
//!   geofile detect <file>
//!   geofile convert <file> [--pretty]
//!   geofile bbox <file>
//!   geofile labels <file>
//!   geofile table <file> --feature <n>
//!   geofile pick <file> --lng <x> --lat <y>
//!   geofile date <input>
//!
//! Global options: `--config <path>` (JSON settings, falls back to
//! `$GEOFILE_CONFIG`) and `--log-dir <dir>` (also log to `geofile.log`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use geofile_kit::config::CONFIG_ENV_VAR;
use geofile_kit::label::display_value;
use geofile_kit::logging::init_logging;
use geofile_kit::{
    compute_bbox, detect_format, extract_label_with, format_date_time_in, hit_test, load_path,
    normalize_click_coordinate, render_properties_table_with, Config, FeatureIndex, LngLat,
    LoadedDocument,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser)]
#[command(name = "geofile")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect GeoJSON, KML and zipped Shapefile files", long_about = None)]
struct Cli {
    /// JSON config file (label keys, hidden properties, table style, date pattern)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for geofile.log
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the detected format tag
    Detect { file: PathBuf },
    /// Print the file as GeoJSON, one document per layer
    Convert {
        file: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
    /// Print [minLng,minLat,maxLng,maxLat] per layer
    Bbox { file: PathBuf },
    /// Print one label per feature
    Labels { file: PathBuf },
    /// Print the HTML properties table of one feature
    Table {
        file: PathBuf,
        /// Zero-based feature index across all layers
        #[arg(long)]
        feature: usize,
    },
    /// Hit-test a map click and print the normalized target
    Pick {
        file: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
    },
    /// Format a timestamp in local time
    Date { input: String },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_dir.as_deref()).context("failed to initialize logging")?;
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Detect { file } => {
            let name = file.to_string_lossy();
            match detect_format(&name) {
                Some(format) => println!("{}", format),
                None => {
                    println!("unknown");
                    return Ok(ExitCode::from(2));
                }
            }
        }
        Commands::Convert { file, pretty } => {
            for doc in load(&file)?.documents() {
                let json = if pretty {
                    serde_json::to_string_pretty(doc)?
                } else {
                    serde_json::to_string(doc)?
                };
                println!("{}", json);
            }
        }
        Commands::Bbox { file } => {
            for doc in load(&file)?.documents() {
                println!("{}", serde_json::to_string(&compute_bbox(Some(doc)))?);
            }
        }
        Commands::Labels { file } => {
            for doc in load(&file)?.documents() {
                for feature in &doc.features {
                    let label = extract_label_with(&feature.properties, &config.label_keys);
                    println!("{}", label.map(display_value).unwrap_or_default());
                }
            }
        }
        Commands::Table { file, feature } => {
            let loaded = load(&file)?;
            let Some(selected) = loaded
                .documents()
                .iter()
                .flat_map(|doc| doc.features.iter())
                .nth(feature)
            else {
                bail!(
                    "feature {} out of range ({} features)",
                    feature,
                    loaded.feature_count()
                );
            };
            println!("{}", render_properties_table_with(&selected.properties, &config));
        }
        Commands::Pick { file, lng, lat } => {
            let click = LngLat::new(lng, lat);
            let target = load(&file)?.documents().iter().find_map(|doc| {
                let index = FeatureIndex::build(doc);
                debug!(features = index.len(), "built feature index");
                normalize_click_coordinate(&hit_test(doc, &index, click))
            });
            println!("{}", serde_json::to_string(&target)?);
        }
        Commands::Date { input } => {
            println!(
                "{}",
                format_date_time_in(Some(input.as_str()), &chrono::Local, &config.date_pattern)
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load(file: &Path) -> Result<LoadedDocument> {
    load_path(file).with_context(|| format!("failed to load {}", file.display()))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match std::env::var_os(CONFIG_ENV_VAR) {
            Some(p) => PathBuf::from(p),
            None => return Ok(Config::default()),
        },
    };
    Config::load(&path).with_context(|| format!("failed to load config {}", path.display()))
}
