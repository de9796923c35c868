use crate::error::OsmError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OsmCliError {
    #[error("failure reading run configuration: {0}")]
    ConfigurationError(String),
    #[error("failure operating on .pbf data: {source}")]
    OsmError {
        #[from]
        source: OsmError,
    },
    #[error("failure reading a file: {source}")]
    StdIoError {
        #[from]
        source: std::io::Error,
    },
    #[error("failure decoding JSON: {source}")]
    SerdeJsonError {
        #[from]
        source: serde_json::Error,
    },
    #[error("failure decoding TOML: {source}")]
    TomlError {
        #[from]
        source: toml::de::Error,
    },
}
