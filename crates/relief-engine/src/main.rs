//! Driver binary for the Relief agents.
//!
//! Wires the shared context, the bus, and the four agents together, runs
//! the startup cascade, injects one weather sample, and logs a summary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `relief-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the shared context and the bus
//! 4. Generate demo data (volunteers, teams, area source)
//! 5. Build and register the agents
//! 6. Start coordinator, distribution, broadcast, assessment in that order
//! 7. Inject the weather stimulus
//! 8. Log the result

mod demo;
mod error;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;
use relief_agents::{AssessmentAgent, BroadcastAgent, CoordinationAgent, DistributionAgent};
use relief_core::{
    Agent, AgentDirectory, Bus, DeliveryReport, LogFormat, ReliefConfig, SharedContext,
    TracingSink,
};
use relief_types::{AgentId, AllocationPlan, DataSource, Message, Payload};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::demo::{DemoConfig, RandomAreaSource};
use crate::error::EngineError;

/// Path of the configuration file, relative to the working directory.
const CONFIG_PATH: &str = "relief-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or the agents
/// cannot be wired together.
#[allow(clippy::too_many_lines)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so the fallback
    //    notice is logged after init.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config);
    info!("relief-engine starting");
    if !from_file {
        info!("Config file not found, using defaults");
    }
    info!(
        disaster_type = config.situation.disaster_type,
        location = config.situation.location,
        severity = config.situation.severity,
        max_hops = config.bus.max_hops,
        "Configuration loaded"
    );

    // 3. Shared context and bus.
    let context = SharedContext::new(config.situation.to_situation());
    let bus = Arc::new(Bus::new(config.bus.max_hops, Arc::new(TracingSink)));
    let directory = config.agents.clone();

    // 4. Demo data.
    let demo_config = load_demo_config()?;
    let mut rng = demo::demo_rng(demo_config.seed);
    let volunteers = demo::demo_volunteers(&mut rng, demo_config.volunteer_count);
    let teams = demo::demo_teams(&mut rng, &demo_config);
    let area_source = RandomAreaSource::new(demo::demo_rng(Some(rng.random())), &config.assessment);
    info!(
        volunteers = volunteers.len(),
        teams = teams.len(),
        seeded = demo_config.seed.is_some(),
        "Demo data generated"
    );

    // 5. Agents.
    let coordinator = Arc::new(Mutex::new(CoordinationAgent::new(
        &directory,
        Arc::clone(&bus),
        context.claim_resources()?,
        config.inventory.clone(),
    )));
    let distribution = Arc::new(Mutex::new(DistributionAgent::new(
        &directory,
        Arc::clone(&bus),
        context.claim_volunteers()?,
        config.distribution.clone(),
        volunteers,
    )));
    let broadcast = Arc::new(Mutex::new(BroadcastAgent::new(
        &directory,
        Arc::clone(&bus),
        context.claim_receivers()?,
        teams,
    )));
    let assessment = Arc::new(Mutex::new(AssessmentAgent::new(
        &directory,
        Arc::clone(&bus),
        Arc::clone(&context),
        config.assessment.clone(),
        Box::new(area_source),
    )));

    bus.register(directory.coordinator.clone(), coordinator.clone());
    bus.register(directory.distribution.clone(), distribution.clone());
    bus.register(directory.broadcast.clone(), broadcast);
    bus.register(directory.assessment.clone(), assessment.clone());
    info!(agents = bus.registered().len(), "System initialized");

    // 6. Start in a fixed order.
    for id in start_order(&directory) {
        let report = bus
            .start_agent(id)
            .ok_or_else(|| EngineError::NotRegistered(id.clone()))?;
        log_report(id, "start", &report);
    }

    // 7. Weather stimulus.
    let stimulus = Message::new(
        directory.broadcast.clone(),
        directory.assessment.clone(),
        Payload::NewData {
            source: DataSource::Weather,
            data: demo::weather_stimulus(&demo_config),
        },
    );
    let report = bus.publish(stimulus);
    log_report(&directory.assessment, "weather", &report);

    // 8. Summary.
    let snapshot = context.snapshot();
    let plan = lock(&coordinator).current_plan().cloned();
    if let Some(plan) = &plan {
        match serde_json::to_string(plan) {
            Ok(json) => debug!(plan = %json, "Final allocation plan"),
            Err(e) => warn!(error = %e, "Failed to serialize allocation plan"),
        }
    }
    let pending_tasks = lock(&distribution).pending_tasks().len();
    let (predictions, messages) = {
        let assessment = lock(&assessment);
        (
            assessment.predictions().len(),
            assessment.core().history().len(),
        )
    };

    info!(
        planned_areas = plan.as_ref().map_or(0, |p| p.areas.len()),
        allocations = plan.as_ref().map_or(0, AllocationPlan::entry_count),
        pending_tasks,
        predictions,
        assessment_messages = messages,
        volunteers = snapshot.volunteers.len(),
        receivers = snapshot.receivers.len(),
        "Simulation completed"
    );

    Ok(())
}

/// Agent start order: coordinator first so its assessment request kicks
/// off the allocation cascade.
fn start_order(directory: &AgentDirectory) -> [&AgentId; 4] {
    [
        &directory.coordinator,
        &directory.distribution,
        &directory.broadcast,
        &directory.assessment,
    ]
}

fn log_report(agent: &AgentId, phase: &str, report: &DeliveryReport) {
    info!(
        agent = %agent,
        phase,
        delivered = report.delivered,
        unroutable = report.unroutable.len(),
        truncated = report.truncated,
        "Cascade finished"
    );
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(config: &ReliefConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    match config.logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

/// Load the main configuration from `relief-config.yaml`.
///
/// Returns the config and whether it came from the file.
fn load_config() -> Result<(ReliefConfig, bool), EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok((ReliefConfig::from_file(config_path)?, true))
    } else {
        Ok((ReliefConfig::parse("")?, false))
    }
}

/// Load demo parameters from the `demo` section of `relief-config.yaml`.
///
/// A missing file or section yields the defaults.
fn load_demo_config() -> Result<DemoConfig, EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if !config_path.exists() {
        return Ok(DemoConfig::default());
    }
    let contents = std::fs::read_to_string(config_path).map_err(|e| EngineError::Demo {
        message: format!("failed to read config file: {e}"),
    })?;
    let raw: serde_yml::Value = serde_yml::from_str(&contents).map_err(|e| EngineError::Demo {
        message: format!("failed to parse config YAML: {e}"),
    })?;
    raw.get("demo").map_or_else(
        || Ok(DemoConfig::default()),
        |section| {
            serde_yml::from_value(section.clone()).map_err(|e| EngineError::Demo {
                message: format!("failed to parse demo config: {e}"),
            })
        },
    )
}
