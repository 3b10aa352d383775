use crate::core::models::raster::Layer;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborhoodConfig {
    /// Scales the distance to the nearest direct neighbour into the
    /// neighbourhood radius.
    pub multiplier: f64,
}

/// Factors applied to raw bands at ingestion, before clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestConfig {
    pub reduction_scale: f32,
    pub coverage_scale: f32,
    pub time_scale: f32,
}

impl IngestConfig {
    pub fn scale_for(&self, layer: Layer) -> f32 {
        match layer {
            Layer::Reduction => self.reduction_scale,
            Layer::Coverage => self.coverage_scale,
            Layer::Time => self.time_scale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SitingConfig {
    pub neighborhood: NeighborhoodConfig,
    pub ingest: IngestConfig,
}

impl Default for SitingConfig {
    fn default() -> Self {
        let defaults = DefaultsConfig::default();
        Self {
            neighborhood: NeighborhoodConfig {
                multiplier: defaults.neighborhood_multiplier,
            },
            ingest: IngestConfig {
                reduction_scale: defaults.reduction_scale,
                coverage_scale: defaults.coverage_scale,
                time_scale: defaults.time_scale,
            },
        }
    }
}

/// Values used for anything a configuration file leaves unset.
///
/// The scales convert the simulation outputs (reduction and travel time are
/// stored in thousandths) into the units the objectives are reported in.
pub struct DefaultsConfig {
    pub neighborhood_multiplier: f64,
    pub reduction_scale: f32,
    pub coverage_scale: f32,
    pub time_scale: f32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            neighborhood_multiplier: 2.0,
            reduction_scale: 0.001,
            coverage_scale: 1.0,
            time_scale: 0.001,
        }
    }
}

#[derive(Default)]
pub struct SitingConfigBuilder {
    neighborhood_multiplier: Option<f64>,
    reduction_scale: Option<f32>,
    coverage_scale: Option<f32>,
    time_scale: Option<f32>,
}

impl SitingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn neighborhood_multiplier(mut self, multiplier: f64) -> Self {
        self.neighborhood_multiplier = Some(multiplier);
        self
    }
    pub fn reduction_scale(mut self, scale: f32) -> Self {
        self.reduction_scale = Some(scale);
        self
    }
    pub fn coverage_scale(mut self, scale: f32) -> Self {
        self.coverage_scale = Some(scale);
        self
    }
    pub fn time_scale(mut self, scale: f32) -> Self {
        self.time_scale = Some(scale);
        self
    }

    pub fn build(self) -> Result<SitingConfig, ConfigError> {
        let multiplier = self
            .neighborhood_multiplier
            .ok_or(ConfigError::MissingParameter("neighborhood_multiplier"))?;
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "neighborhood_multiplier",
                reason: format!("must be finite and positive, got {multiplier}"),
            });
        }

        let ingest = IngestConfig {
            reduction_scale: positive_scale(
                "reduction_scale",
                self.reduction_scale
                    .ok_or(ConfigError::MissingParameter("reduction_scale"))?,
            )?,
            coverage_scale: positive_scale(
                "coverage_scale",
                self.coverage_scale
                    .ok_or(ConfigError::MissingParameter("coverage_scale"))?,
            )?,
            time_scale: positive_scale(
                "time_scale",
                self.time_scale
                    .ok_or(ConfigError::MissingParameter("time_scale"))?,
            )?,
        };

        Ok(SitingConfig {
            neighborhood: NeighborhoodConfig { multiplier },
            ingest,
        })
    }
}

fn positive_scale(name: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("must be finite and positive, got {value}"),
        })
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialNeighborhoodConfig {
    multiplier: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialIngestConfig {
    #[serde(rename = "reduction-scale")]
    reduction_scale: Option<f32>,
    #[serde(rename = "coverage-scale")]
    coverage_scale: Option<f32>,
    #[serde(rename = "time-scale")]
    time_scale: Option<f32>,
}

/// A possibly incomplete configuration as read from TOML.
///
/// ```toml
/// [neighborhood]
/// multiplier = 2.0
///
/// [ingest]
/// reduction-scale = 0.001
/// coverage-scale = 1.0
/// time-scale = 0.001
/// ```
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialSitingConfig {
    neighborhood: Option<PartialNeighborhoodConfig>,
    ingest: Option<PartialIngestConfig>,
}

impl PartialSitingConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Toml {
            path: "<inline>".to_string(),
            source: e,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading siting configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    /// Applies `KEY=VALUE` overrides such as `neighborhood.multiplier=3`.
    pub fn apply_set_values(&mut self, set_values: &[String]) -> Result<(), ConfigError> {
        for kv_pair in set_values {
            let (key, value_str) =
                kv_pair
                    .split_once('=')
                    .ok_or_else(|| ConfigError::InvalidParameter {
                        name: "set",
                        reason: format!("expected KEY=VALUE, got '{kv_pair}'"),
                    })?;

            match key.trim() {
                "neighborhood.multiplier" => {
                    self.neighborhood
                        .get_or_insert_with(Default::default)
                        .multiplier = Some(parse_value("neighborhood.multiplier", value_str)?);
                }
                "ingest.reduction-scale" => {
                    self.ingest
                        .get_or_insert_with(Default::default)
                        .reduction_scale = Some(parse_value("ingest.reduction-scale", value_str)?);
                }
                "ingest.coverage-scale" => {
                    self.ingest
                        .get_or_insert_with(Default::default)
                        .coverage_scale = Some(parse_value("ingest.coverage-scale", value_str)?);
                }
                "ingest.time-scale" => {
                    self.ingest
                        .get_or_insert_with(Default::default)
                        .time_scale = Some(parse_value("ingest.time-scale", value_str)?);
                }
                _ => {
                    return Err(ConfigError::InvalidParameter {
                        name: "set",
                        reason: format!("unsupported configuration key '{key}'"),
                    });
                }
            }
        }
        Ok(())
    }

    /// Fills unset values from [`DefaultsConfig`] and validates the result.
    pub fn into_config(self) -> Result<SitingConfig, ConfigError> {
        let defaults = DefaultsConfig::default();
        let neighborhood = self.neighborhood.unwrap_or_default();
        let ingest = self.ingest.unwrap_or_default();

        SitingConfigBuilder::new()
            .neighborhood_multiplier(
                neighborhood
                    .multiplier
                    .unwrap_or(defaults.neighborhood_multiplier),
            )
            .reduction_scale(ingest.reduction_scale.unwrap_or(defaults.reduction_scale))
            .coverage_scale(ingest.coverage_scale.unwrap_or(defaults.coverage_scale))
            .time_scale(ingest.time_scale.unwrap_or(defaults.time_scale))
            .build()
    }
}

fn parse_value<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidParameter {
            name,
            reason: format!("cannot parse '{value}' as a number"),
        })
}
