//! Run configuration (A3): import filters, the default speed table,
//! routing defaults, and output paths, loaded from `.toml` or `.json`.

use crate::cli_error::OsmCliError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct ImportFilter {
    /// Only ingest ways whose tags pass this allow-list of `key=value`
    /// pairs; an empty list ingests every way.
    pub allowed_tags: Vec<(String, String)>,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricConfig {
    Distance,
    Time,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct RoutingDefaults {
    pub metric: MetricConfig,
    pub algorithm: AlgorithmConfig,
    pub nearest_node_search_km: f64,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmConfig {
    Dijkstra,
    Astar,
    Bidirectional,
}

impl Default for RoutingDefaults {
    fn default() -> Self {
        RoutingDefaults { metric: MetricConfig::Time, algorithm: AlgorithmConfig::Astar, nearest_node_search_km: 1.0 }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct Config {
    pub import_filter: ImportFilter,
    /// `highway` tag value -> km/h, overriding `routing::default_speeds()`
    /// entries it names; anything left unnamed falls back to the built-in
    /// table.
    pub speed_overrides_kmh: HashMap<String, f64>,
    pub routing: RoutingDefaults,
    pub output_dir: Option<String>,
}

impl TryFrom<&Path> for Config {
    type Error = OsmCliError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match extension {
            "toml" => Ok(toml::from_str(&std::fs::read_to_string(path)?)?),
            "json" => Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?),
            other => Err(OsmCliError::ConfigurationError(format!(
                "unsupported config file extension: '{other}' (expected .toml or .json)"
            ))),
        }
    }
}
