//! Demo data for a single run: volunteers, field teams, random area
//! assessments, and the weather stimulus.
//!
//! All randomness in the workspace lives here. A fixed `seed` in the
//! `demo` section makes a run reproducible.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use relief_agents::{AreaSource, WIND_SPEED};
use relief_core::AssessmentConfig;
use relief_types::{
    AgentId, AreaDemand, Coordinates, Reading, Receiver, ResourceKind, Skill, Volunteer,
    VolunteerId,
};
use rust_decimal::Decimal;
use serde::Deserialize;

// -----------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------

/// Demo data parameters, read from the `demo` section of
/// `relief-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DemoConfig {
    /// RNG seed. A fresh OS seed is used when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Number of volunteers registered by the distribution agent.
    #[serde(default = "default_volunteer_count")]
    pub volunteer_count: u32,

    /// Number of field teams on the broadcast roster.
    #[serde(default = "default_team_count")]
    pub team_count: u32,

    /// Latitude the teams are scattered around.
    #[serde(default = "default_base_lat")]
    pub base_lat: f64,

    /// Longitude the teams are scattered around.
    #[serde(default = "default_base_lon")]
    pub base_lon: f64,

    /// Width of the square teams are scattered in, in degrees.
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Wind speed of the injected weather sample.
    #[serde(default = "default_wind_speed")]
    pub wind_speed: Decimal,

    /// Rainfall of the injected weather sample.
    #[serde(default = "default_rainfall")]
    pub rainfall: Decimal,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            seed: None,
            volunteer_count: default_volunteer_count(),
            team_count: default_team_count(),
            base_lat: default_base_lat(),
            base_lon: default_base_lon(),
            jitter: default_jitter(),
            wind_speed: default_wind_speed(),
            rainfall: default_rainfall(),
        }
    }
}

const fn default_volunteer_count() -> u32 {
    20
}

const fn default_team_count() -> u32 {
    5
}

const fn default_base_lat() -> f64 {
    34.0522
}

const fn default_base_lon() -> f64 {
    -118.2437
}

const fn default_jitter() -> f64 {
    0.1
}

const fn default_wind_speed() -> Decimal {
    Decimal::from_parts(60, 0, 0, false, 0)
}

const fn default_rainfall() -> Decimal {
    Decimal::from_parts(5, 0, 0, false, 0)
}

/// Create the run's RNG.
pub fn demo_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)
}

// -----------------------------------------------------------------------
// Volunteers and teams
// -----------------------------------------------------------------------

/// Skills per demo volunteer.
const SKILLS_PER_VOLUNTEER: RangeInclusive<usize> = 1..=3;

/// Build `count` available volunteers at base camp, each with one to
/// three distinct skills.
pub fn demo_volunteers<R: Rng>(rng: &mut R, count: u32) -> Vec<Volunteer> {
    (1..=count)
        .map(|i| {
            let k = rng.random_range(SKILLS_PER_VOLUNTEER);
            let skills: BTreeSet<Skill> = Skill::ALL.choose_multiple(rng, k).copied().collect();
            Volunteer {
                id: VolunteerId::new(format!("vol_{i}")),
                name: format!("Volunteer {i}"),
                skills,
                location: "Base Camp".to_owned(),
                available: true,
            }
        })
        .collect()
}

/// Build `count` field teams scattered around the configured base.
pub fn demo_teams<R: Rng>(rng: &mut R, config: &DemoConfig) -> Vec<Receiver> {
    (1..=config.team_count)
        .map(|i| Receiver {
            id: AgentId::new(format!("rescue_team_{i}")),
            location: Coordinates {
                lat: config.base_lat + (rng.random::<f64>() - 0.5) * config.jitter,
                lon: config.base_lon + (rng.random::<f64>() - 0.5) * config.jitter,
            },
        })
        .collect()
}

/// The weather sample injected after startup.
pub fn weather_stimulus(config: &DemoConfig) -> Reading {
    Reading::new()
        .with(WIND_SPEED, config.wind_speed)
        .with("rainfall", config.rainfall)
}

// -----------------------------------------------------------------------
// Area assessments
// -----------------------------------------------------------------------

/// An [`AreaSource`] drawing severity and population uniformly from the
/// configured ranges.
#[derive(Debug)]
pub struct RandomAreaSource {
    rng: StdRng,
    count: u32,
    severity: RangeInclusive<u8>,
    population: RangeInclusive<u32>,
    needs: BTreeSet<ResourceKind>,
}

impl RandomAreaSource {
    /// Create a source from the assessment parameters.
    ///
    /// Inverted ranges are collapsed onto their lower bound.
    pub fn new(rng: StdRng, config: &AssessmentConfig) -> Self {
        Self {
            rng,
            count: config.area_count,
            severity: config.severity_min..=config.severity_max.max(config.severity_min),
            population: config.population_min..=config.population_max.max(config.population_min),
            needs: config.area_needs.clone(),
        }
    }
}

impl AreaSource for RandomAreaSource {
    fn assess(&mut self, _disaster_type: &str, location: &str) -> Vec<AreaDemand> {
        (1..=self.count)
            .map(|i| AreaDemand {
                name: format!("{location}_Area_{i}"),
                severity: self.rng.random_range(self.severity.clone()),
                population: self.rng.random_range(self.population.clone()),
                needs: self.needs.clone(),
            })
            .collect()
    }
}
