//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `relief-config.yaml` at the
//! project root. Every section and field has a default, so an empty file
//! (or no file at all) yields a working setup matching the reference
//! scenario: an earthquake in Los Angeles with five supply kinds.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use relief_types::{AgentId, ResourceKind, Situation, Skill};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::bus::DEFAULT_MAX_HOPS;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReliefConfig {
    /// Disaster parameters.
    #[serde(default)]
    pub situation: SituationConfig,

    /// Starting inventory per resource kind.
    #[serde(default = "default_inventory")]
    pub inventory: BTreeMap<ResourceKind, u32>,

    /// Bus addresses of the four agents.
    #[serde(default)]
    pub agents: AgentDirectory,

    /// Assessment agent parameters.
    #[serde(default)]
    pub assessment: AssessmentConfig,

    /// Distribution agent parameters.
    #[serde(default)]
    pub distribution: DistributionConfig,

    /// Bus parameters.
    #[serde(default)]
    pub bus: BusConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ReliefConfig {
    fn default() -> Self {
        Self {
            situation: SituationConfig::default(),
            inventory: default_inventory(),
            agents: AgentDirectory::default(),
            assessment: AssessmentConfig::default(),
            distribution: DistributionConfig::default(),
            bus: BusConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ReliefConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `RELIEF_LOG_LEVEL` overrides `logging.level`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document parses as YAML null, not as an empty mapping.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.logging.apply_env_overrides();
        Ok(config)
    }
}

/// Disaster parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SituationConfig {
    /// Kind of disaster.
    #[serde(default = "default_disaster_type")]
    pub disaster_type: String,

    /// Where it happened.
    #[serde(default = "default_location")]
    pub location: String,

    /// Overall severity (1--10).
    #[serde(default = "default_severity")]
    pub severity: u8,
}

impl Default for SituationConfig {
    fn default() -> Self {
        Self {
            disaster_type: default_disaster_type(),
            location: default_location(),
            severity: default_severity(),
        }
    }
}

impl SituationConfig {
    /// Build the immutable [`Situation`] stored in the shared context.
    pub fn to_situation(&self) -> Situation {
        Situation {
            disaster_type: self.disaster_type.clone(),
            location: self.location.clone(),
            severity: self.severity,
        }
    }
}

/// Bus addresses of the four agents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentDirectory {
    /// Coordination (allocation) agent.
    #[serde(default = "default_coordinator_id")]
    pub coordinator: AgentId,

    /// Distribution (volunteer/task) agent.
    #[serde(default = "default_distribution_id")]
    pub distribution: AgentId,

    /// Broadcast (communication) agent.
    #[serde(default = "default_broadcast_id")]
    pub broadcast: AgentId,

    /// Assessment (analytics) agent.
    #[serde(default = "default_assessment_id")]
    pub assessment: AgentId,
}

impl Default for AgentDirectory {
    fn default() -> Self {
        Self {
            coordinator: default_coordinator_id(),
            distribution: default_distribution_id(),
            broadcast: default_broadcast_id(),
            assessment: default_assessment_id(),
        }
    }
}

/// Assessment agent parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssessmentConfig {
    /// Number of most recent samples averaged into a prediction.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// A weather sample is significant when wind speed exceeds this.
    #[serde(default = "default_wind_speed_threshold")]
    pub wind_speed_threshold: Decimal,

    /// Averaged wind speed is divided by this to get the risk level.
    #[serde(default = "default_risk_divisor")]
    pub risk_divisor: Decimal,

    /// Predictions at or above this risk level raise an alert.
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: u8,

    /// Number of areas produced per assessment.
    #[serde(default = "default_area_count")]
    pub area_count: u32,

    /// Lowest generated severity.
    #[serde(default = "default_severity_min")]
    pub severity_min: u8,

    /// Highest generated severity.
    #[serde(default = "default_severity_max")]
    pub severity_max: u8,

    /// Lowest generated population.
    #[serde(default = "default_population_min")]
    pub population_min: u32,

    /// Highest generated population.
    #[serde(default = "default_population_max")]
    pub population_max: u32,

    /// Needs reported for every generated area.
    #[serde(default = "default_area_needs")]
    pub area_needs: BTreeSet<ResourceKind>,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            wind_speed_threshold: default_wind_speed_threshold(),
            risk_divisor: default_risk_divisor(),
            alert_threshold: default_alert_threshold(),
            area_count: default_area_count(),
            severity_min: default_severity_min(),
            severity_max: default_severity_max(),
            population_min: default_population_min(),
            population_max: default_population_max(),
            area_needs: default_area_needs(),
        }
    }
}

/// Distribution agent parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DistributionConfig {
    /// Priority given to every generated task.
    #[serde(default = "default_baseline_priority")]
    pub baseline_priority: u8,

    /// Skills required by every generated task.
    #[serde(default = "default_task_skills")]
    pub default_skills: BTreeSet<Skill>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            baseline_priority: default_baseline_priority(),
            default_skills: default_task_skills(),
        }
    }
}

/// Bus parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BusConfig {
    /// Messages further than this many hops from their stimulus are dropped.
    #[serde(default = "default_max_hops")]
    pub max_hops: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RELIEF_LOG_LEVEL") {
            self.level = val;
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_inventory() -> BTreeMap<ResourceKind, u32> {
    let mut m = BTreeMap::new();
    m.insert(ResourceKind::Food, 1000);
    m.insert(ResourceKind::Water, 5000);
    m.insert(ResourceKind::MedicalSupplies, 500);
    m.insert(ResourceKind::ShelterKits, 200);
    m.insert(ResourceKind::Blankets, 1000);
    m
}

fn default_disaster_type() -> String {
    "earthquake".to_owned()
}

fn default_location() -> String {
    "Los Angeles".to_owned()
}

const fn default_severity() -> u8 {
    8
}

fn default_coordinator_id() -> AgentId {
    AgentId::from("relief_coordinator")
}

fn default_distribution_id() -> AgentId {
    AgentId::from("volunteer_coordinator")
}

fn default_broadcast_id() -> AgentId {
    AgentId::from("communication")
}

fn default_assessment_id() -> AgentId {
    AgentId::from("analytics")
}

const fn default_window_size() -> usize {
    5
}

const fn default_wind_speed_threshold() -> Decimal {
    Decimal::from_parts(50, 0, 0, false, 0)
}

const fn default_risk_divisor() -> Decimal {
    Decimal::TEN
}

const fn default_alert_threshold() -> u8 {
    7
}

const fn default_area_count() -> u32 {
    3
}

const fn default_severity_min() -> u8 {
    1
}

const fn default_severity_max() -> u8 {
    10
}

const fn default_population_min() -> u32 {
    100
}

const fn default_population_max() -> u32 {
    10_000
}

fn default_area_needs() -> BTreeSet<ResourceKind> {
    [
        ResourceKind::Food,
        ResourceKind::Water,
        ResourceKind::MedicalSupplies,
    ]
    .into_iter()
    .collect()
}

const fn default_baseline_priority() -> u8 {
    3
}

fn default_task_skills() -> BTreeSet<Skill> {
    [Skill::Logistics].into_iter().collect()
}

const fn default_max_hops() -> u32 {
    DEFAULT_MAX_HOPS
}

fn default_log_level() -> String {
    "info".to_owned()
}
