//! Configuration types for imagefilter
//!
//! The configuration file is a JSON object with two required sections:
//! `IFF` (SDK initialization parameters, passed through untouched) and
//! `chains` (one entry per processing chain).

use crate::error::{Error, Result};
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "imagefilter.json";

/// Validated application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    iff: Value,
    chains: Vec<Value>,
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = text.parse()?;
        tracing::debug!(
            "Loaded configuration from {} ({} chains)",
            path.display(),
            config.chains.len()
        );
        Ok(config)
    }

    /// Validate an already parsed document
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut root) = value else {
            return Err(Error::Config("top level must be an object".into()));
        };

        let iff = root
            .remove("IFF")
            .ok_or_else(|| Error::Config("missing `IFF` section".into()))?;

        let chains = match root.remove("chains") {
            None => return Err(Error::Config("missing `chains` section".into())),
            Some(Value::Array(chains)) => chains,
            Some(_) => {
                return Err(Error::Config("section `chains` must be an array".into()));
            }
        };

        if chains.is_empty() {
            return Err(Error::Config("section `chains` must not be empty".into()));
        }

        Ok(Self { iff, chains })
    }

    /// SDK initialization parameters
    pub fn iff(&self) -> &Value {
        &self.iff
    }

    /// Chain specifications, in file order
    pub fn chains(&self) -> &[Value] {
        &self.chains
    }
}

impl FromStr for Config {
    type Err = Error;

    /// Parse and validate configuration text
    fn from_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("malformed JSON: {}", e)))?;
        Self::from_value(value)
    }
}

/// Runtime settings for the frame pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Id of the chain that exports frames
    pub export_chain: String,
    /// Id of the chain frames are pushed back into
    pub import_chain: String,
    /// Exporter element inside the export chain
    pub exporter: String,
    /// Importer element inside the import chain
    pub importer: String,
    /// Upper bound on how long the main loop waits for a frame
    pub wait_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            export_chain: "export".into(),
            import_chain: "import".into(),
            exporter: "exporter".into(),
            importer: "importer".into(),
            wait_timeout: Duration::from_secs(1),
        }
    }
}

impl PipelineSettings {
    pub fn with_chains(mut self, export: impl Into<String>, import: impl Into<String>) -> Self {
        self.export_chain = export.into();
        self.import_chain = import.into();
        self
    }

    pub fn with_elements(mut self, exporter: impl Into<String>, importer: impl Into<String>) -> Self {
        self.exporter = exporter.into();
        self.importer = importer.into();
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }
}
