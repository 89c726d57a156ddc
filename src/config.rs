// src/config.rs
//
// Server configuration: defaults, then an optional JSON file named by
// DRIFT_CONFIG, then single-value environment overrides. Validation runs once
// here and hands the core its immutable records.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::drift_core::{
    ControlConfig, EngineCurve, IntegratorConfig, ParamError, SimSetup, VehicleParameters,
    VehicleSpec,
};

pub const CONFIG_ENV: &str = "DRIFT_CONFIG";
pub const BIND_ENV: &str = "DRIFT_BIND";
pub const TICK_HZ_ENV: &str = "DRIFT_TICK_HZ";

/// Highest frame rate the server loop will run at.
pub const MAX_TICK_HZ: u32 = 1000;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Json { path: PathBuf, source: serde_json::Error },
    Env { var: &'static str, value: String },
    TickRate { hz: u32 },
    Param(ParamError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "reading {}: {source}", path.display()),
            Self::Json { path, source } => write!(f, "parsing {}: {source}", path.display()),
            Self::Env { var, value } => write!(f, "{var}={value:?} is not a valid value"),
            Self::TickRate { hz } => {
                write!(f, "server.tick_hz must be in 1..={MAX_TICK_HZ} (got {hz})")
            }
            Self::Param(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::Env { .. } | Self::TickRate { .. } => None,
            Self::Param(err) => Some(err),
        }
    }
}

impl From<ParamError> for ConfigError {
    fn from(err: ParamError) -> Self {
        Self::Param(err)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub tick_hz: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:9001".to_string(), tick_hz: 60 }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_hz == 0 || self.tick_hz > MAX_TICK_HZ {
            return Err(ConfigError::TickRate { hz: self.tick_hz });
        }
        Ok(())
    }

    /// Wall-clock length of one frame.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz.clamp(1, MAX_TICK_HZ)))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub vehicle: VehicleSpec,
    pub engine: EngineCurve,
    pub control: ControlConfig,
    pub integrator: IntegratorConfig,
    pub server: ServerConfig,
}

impl SimConfig {
    /// Defaults → `$DRIFT_CONFIG` file → `$DRIFT_BIND` / `$DRIFT_TICK_HZ`.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.setup()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "loaded drift config");
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// `lookup` stands in for `std::env::var` so tests don't touch the process env.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup(BIND_ENV) {
            debug!(%bind, "bind address from environment");
            self.server.bind = bind;
        }
        if let Some(value) = lookup(TICK_HZ_ENV) {
            self.server.tick_hz = match value.trim().parse::<u32>() {
                Ok(hz) if hz > 0 => hz,
                _ => return Err(ConfigError::Env { var: TICK_HZ_ENV, value }),
            };
        }
        Ok(())
    }

    /// Validate everything and build the core's immutable records.
    pub fn setup(&self) -> Result<SimSetup, ConfigError> {
        self.server.validate()?;
        let vehicle = VehicleParameters::new(&self.vehicle)?;
        self.engine.validate()?;
        self.control.validate()?;
        self.integrator.validate()?;
        Ok(SimSetup {
            vehicle,
            engine: self.engine,
            control: self.control,
            integrator: self.integrator,
        })
    }
}
