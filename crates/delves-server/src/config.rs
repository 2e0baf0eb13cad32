//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use delves_conditions::tree::ProgressAggregation;
use delves_core::location::{Location, WorldLocation};
use delves_instances::settings::{InstanceSettings, RetryPolicy};
use delves_provisioning::PipelineSettings;

use crate::error::AppError;

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Directory instance worlds are created in.
    pub world_container: PathBuf,
    /// Directory holding one sub-directory per template.
    pub template_dir: PathBuf,
    /// YAML file describing the templates.
    pub template_catalog: PathBuf,
    /// Name prefix of every instance world.
    pub world_prefix: String,
    /// Where players are sent when they leave or are refused.
    pub primary_spawn: WorldLocation,
    /// Time between reaper sweeps.
    pub reaper_interval: Duration,
    /// How AND composites aggregate progress.
    pub aggregation: ProgressAggregation,
    /// Instance lifecycle settings.
    pub instances: InstanceSettings,
    /// Where the cooldown snapshot is written on shutdown.
    pub cooldown_snapshot: PathBuf,
}

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, falling back to defaults
    /// for absent keys.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a value is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        let primary_world = text("DELVES_PRIMARY_WORLD", "world");
        let spawn = text("DELVES_PRIMARY_SPAWN", "0,64,0");
        let location = Location::parse_tolerant(&spawn)
            .map_err(|e| AppError::Config(format!("DELVES_PRIMARY_SPAWN is invalid: {e}")))?;

        let world_prefix = text("DELVES_WORLD_PREFIX", "dungeon_");
        if world_prefix.is_empty() {
            return Err(AppError::Config(
                "DELVES_WORLD_PREFIX must not be empty".to_owned(),
            ));
        }

        let max_instances = match parse(&lookup, "DELVES_MAX_INSTANCES", 0usize)? {
            0 => None,
            limit => Some(limit),
        };
        let max_attempts = parse(&lookup, "DELVES_DELETE_RETRY_LIMIT", 5u32)?;
        if max_attempts == 0 {
            return Err(AppError::Config(
                "DELVES_DELETE_RETRY_LIMIT must be at least 1".to_owned(),
            ));
        }
        let reaper_secs = parse(&lookup, "DELVES_REAPER_INTERVAL_SECS", 5u64)?;
        if reaper_secs == 0 {
            return Err(AppError::Config(
                "DELVES_REAPER_INTERVAL_SECS must be at least 1".to_owned(),
            ));
        }

        Ok(Self {
            host: text("HOST", "0.0.0.0"),
            port: parse(&lookup, "PORT", 3000u16)?,
            world_container: PathBuf::from(text("DELVES_WORLD_CONTAINER", "./worlds")),
            template_dir: PathBuf::from(text("DELVES_TEMPLATE_DIR", "./templates")),
            template_catalog: PathBuf::from(text("DELVES_TEMPLATE_CATALOG", "./templates.yaml")),
            world_prefix,
            primary_spawn: WorldLocation {
                world: primary_world,
                location,
            },
            reaper_interval: Duration::from_secs(reaper_secs),
            aggregation: parse_aggregation(&text("DELVES_PROGRESS_AGGREGATION", "mean"))?,
            instances: InstanceSettings {
                grace: Duration::from_secs(parse(&lookup, "DELVES_GRACE_SECS", 30u64)?),
                max_instances,
                retry: RetryPolicy {
                    base_delay: Duration::from_millis(parse(
                        &lookup,
                        "DELVES_DELETE_RETRY_BASE_MS",
                        1000u64,
                    )?),
                    max_attempts,
                },
            },
            cooldown_snapshot: PathBuf::from(text("DELVES_COOLDOWN_SNAPSHOT", "./cooldowns.json")),
        })
    }

    /// The socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn bind_address(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }

    /// Settings for the provisioning pipeline.
    #[must_use]
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            template_root: self.template_dir.clone(),
            world_container: self.world_container.clone(),
            world_prefix: self.world_prefix.clone(),
        }
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
        None => Ok(default),
    }
}

fn parse_aggregation(raw: &str) -> Result<ProgressAggregation, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "mean" => Ok(ProgressAggregation::Mean),
        "minimum" | "min" => Ok(ProgressAggregation::Minimum),
        other => Err(AppError::Config(format!(
            "DELVES_PROGRESS_AGGREGATION must be mean or minimum, got {other}"
        ))),
    }
}
