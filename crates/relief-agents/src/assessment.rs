//! Assessment agent: sample logs, predictions, alerts, and area assessments.
//!
//! Samples are kept per [`DataSource`] in arrival order and never pruned.
//! A weather sample whose wind speed exceeds the configured threshold
//! triggers a prediction over the latest `window_size` weather samples:
//!
//! ```text
//! risk = min(10, floor(mean(wind_speed) / risk_divisor))
//! ```
//!
//! A prediction at or above `alert_threshold` is sent to the broadcast
//! agent as an alert. Area assessments come from an injectable
//! [`AreaSource`] so the agent itself stays deterministic.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use relief_core::{Agent, AgentCore, AgentDirectory, AssessmentConfig, Bus, BusEvent, SharedContext};
use relief_types::{
    AgentId, AlertNotice, AreaDemand, DataSource, MAX_RISK_LEVEL, Message, Payload, Prediction,
    PredictionId, PredictionKind, Reading, Sample, Sequence, SystemStatus,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::info;

/// Reading field holding the wind speed of a weather sample.
pub const WIND_SPEED: &str = "wind_speed";

const WEATHER_AREAS: [&str; 2] = ["Area A", "Area B"];
const WEATHER_ACTIONS: [&str; 2] = ["Evacuate high-risk areas", "Deploy additional rescue teams"];

/// Produces demand areas for a disaster.
///
/// The engine plugs in a randomized generator; tests use
/// [`FixedAreaSource`].
pub trait AreaSource: Send {
    /// Assess the areas affected by `disaster_type` at `location`.
    fn assess(&mut self, disaster_type: &str, location: &str) -> Vec<AreaDemand>;
}

/// An [`AreaSource`] that always returns the same areas.
#[derive(Debug, Clone, Default)]
pub struct FixedAreaSource {
    areas: Vec<AreaDemand>,
}

impl FixedAreaSource {
    /// Create a source returning `areas` for every request.
    pub const fn new(areas: Vec<AreaDemand>) -> Self {
        Self { areas }
    }
}

impl AreaSource for FixedAreaSource {
    fn assess(&mut self, _disaster_type: &str, _location: &str) -> Vec<AreaDemand> {
        self.areas.clone()
    }
}

/// Watches data feeds and assesses affected areas.
pub struct AssessmentAgent {
    core: AgentCore,
    context: Arc<SharedContext>,
    config: AssessmentConfig,
    broadcast: AgentId,
    area_source: Box<dyn AreaSource>,
    samples: BTreeMap<DataSource, Vec<Sample>>,
    predictions: BTreeMap<PredictionId, Prediction>,
    prediction_ids: Sequence,
    teams_connected: Option<u32>,
}

impl core::fmt::Debug for AssessmentAgent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AssessmentAgent")
            .field("core", &self.core)
            .field("sources", &self.samples.len())
            .field("predictions", &self.predictions.len())
            .finish_non_exhaustive()
    }
}

impl AssessmentAgent {
    /// Create the agent.
    pub fn new(
        directory: &AgentDirectory,
        bus: Arc<Bus>,
        context: Arc<SharedContext>,
        config: AssessmentConfig,
        area_source: Box<dyn AreaSource>,
    ) -> Self {
        Self {
            core: AgentCore::new(directory.assessment.clone(), "Analytics Agent", bus),
            context,
            config,
            broadcast: directory.broadcast.clone(),
            area_source,
            samples: BTreeMap::new(),
            predictions: BTreeMap::new(),
            prediction_ids: Sequence::new(),
            teams_connected: None,
        }
    }

    /// Whether a sample from `source` warrants a prediction.
    pub fn is_significant(&self, source: &DataSource, data: &Reading) -> bool {
        match source {
            DataSource::Weather => data.get_or_zero(WIND_SPEED) > self.config.wind_speed_threshold,
            DataSource::Other(_) => false,
        }
    }

    /// Append a sample and react to it. Returns the prediction, if the
    /// sample was significant.
    pub fn ingest(&mut self, source: DataSource, data: Reading) -> Option<Prediction> {
        let significant = self.is_significant(&source, &data);
        info!(agent = %self.id(), source = %source, significant, "New data received");
        self.samples.entry(source.clone()).or_default().push(Sample {
            timestamp: Utc::now(),
            data,
        });

        if !significant {
            return None;
        }
        let prediction = self.predict(&source);
        if prediction.risk_level >= self.config.alert_threshold {
            self.raise_alert(&prediction);
        }
        Some(prediction)
    }

    /// Build and store a prediction for `source`.
    ///
    /// Weather predictions average the latest samples; any other source
    /// yields a general prediction at the situation severity.
    pub fn predict(&mut self, source: &DataSource) -> Prediction {
        let id = PredictionId(self.prediction_ids.next_value());
        let prediction = match source {
            DataSource::Weather => Prediction {
                id,
                kind: PredictionKind::WeatherImpact,
                source: source.clone(),
                risk_level: self.weather_risk(),
                areas_affected: WEATHER_AREAS.iter().map(|s| (*s).to_owned()).collect(),
                recommended_actions: WEATHER_ACTIONS.iter().map(|s| (*s).to_owned()).collect(),
            },
            DataSource::Other(_) => Prediction {
                id,
                kind: PredictionKind::General,
                source: source.clone(),
                risk_level: self.context.situation().severity.min(MAX_RISK_LEVEL),
                areas_affected: Vec::new(),
                recommended_actions: Vec::new(),
            },
        };

        self.core.emit(&BusEvent::PredictionGenerated {
            agent: self.id().clone(),
            prediction: id,
            risk_level: prediction.risk_level,
        });
        self.predictions.insert(id, prediction.clone());
        prediction
    }

    /// The latest `count` samples of `source`, oldest first.
    pub fn recent_samples(&self, source: &DataSource, count: usize) -> &[Sample] {
        let log = self.samples.get(source).map_or(&[][..], Vec::as_slice);
        let skip = log.len().saturating_sub(count);
        log.get(skip..).unwrap_or_default()
    }

    /// Every prediction generated so far, by id.
    pub const fn predictions(&self) -> &BTreeMap<PredictionId, Prediction> {
        &self.predictions
    }

    /// Receivers reported by the last communication status, if any.
    pub const fn teams_connected(&self) -> Option<u32> {
        self.teams_connected
    }

    fn weather_risk(&self) -> u8 {
        let window = self.recent_samples(&DataSource::Weather, self.config.window_size);
        let mut sum = Decimal::ZERO;
        for sample in window {
            sum = sum
                .checked_add(sample.data.get_or_zero(WIND_SPEED))
                .unwrap_or(Decimal::MAX);
        }
        let count = Decimal::from(window.len().max(1));
        let risk = sum
            .checked_div(count)
            .and_then(|avg| avg.checked_div(self.config.risk_divisor))
            .map_or(Decimal::ZERO, |r| r.floor());
        risk.min(Decimal::from(MAX_RISK_LEVEL)).to_u8().unwrap_or(0)
    }

    fn raise_alert(&mut self, prediction: &Prediction) {
        let notice = AlertNotice {
            alert_type: prediction.kind,
            message: format!("High risk detected: {}/{MAX_RISK_LEVEL}", prediction.risk_level),
            risk_level: prediction.risk_level,
            areas_affected: prediction.areas_affected.clone(),
            recommended_actions: prediction.recommended_actions.clone(),
        };
        self.core.emit(&BusEvent::AlertRaised {
            agent: self.id().clone(),
            risk_level: prediction.risk_level,
        });
        let to = self.broadcast.clone();
        self.send(to, Payload::Alert(notice));
    }

    fn assess_areas(&mut self, requester: AgentId, disaster_type: &str, location: &str) {
        let area_data = self.area_source.assess(disaster_type, location);
        info!(agent = %self.id(), areas = area_data.len(), "Assessed affected areas");
        self.send(requester, Payload::NeedAssessment { area_data });
    }
}

impl Agent for AssessmentAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    fn on_message(&mut self, message: &Message) {
        match message.content() {
            Payload::RequestAreaAssessment {
                disaster_type,
                location,
            } => self.assess_areas(message.sender().clone(), disaster_type, location),
            Payload::NewData { source, data } => {
                self.ingest(source.clone(), data.clone());
            }
            Payload::CommunicationSystemStatus {
                status,
                teams_connected,
            } => {
                if *status == SystemStatus::Degraded {
                    info!(agent = %self.id(), "Communication system degraded");
                }
                self.teams_connected = Some(*teams_connected);
            }
            Payload::NeedAssessment { .. }
            | Payload::NewAllocationPlan { .. }
            | Payload::Alert(_)
            | Payload::EmergencyAlert(_)
            | Payload::VolunteerStatus { .. }
            | Payload::Unrecognized => {}
        }
    }

    fn on_start(&mut self) {
        info!(agent = %self.id(), window = self.config.window_size, "Watching data feeds");
    }
}
