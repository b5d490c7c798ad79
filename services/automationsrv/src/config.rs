//! Service configuration
//!
//! Loaded from defaults, then `config/automationsrv.yaml` (or `--config`),
//! then `AUTOMATION_*` environment variables. Nested keys use `__`, e.g.
//! `AUTOMATION_SCHEDULE__PERIOD_SECS=60`.

use anyhow::{bail, Result};
use common::config_loader::{load_layered, ConfigSource};
use common::logging::LoggingConfig;
use facility_rules::TickSchedule;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/automationsrv.yaml";
pub const ENV_PREFIX: &str = "AUTOMATION_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub service: ServiceSection,
    pub schedule: ScheduleSection,
    pub data: DataSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub name: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: "automationsrv".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    pub period_secs: u64,
    pub initial_delay_secs: u64,
    pub evaluator_timeout_secs: u64,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        let schedule = TickSchedule::default();
        Self {
            period_secs: schedule.period.as_secs(),
            initial_delay_secs: schedule.initial_delay.as_secs(),
            evaluator_timeout_secs: schedule.evaluator_timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// YAML or JSON file with `assets`, `stock_items` and `tasks` rows
    pub fixture_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    /// Service log directory; console only when unset
    pub dir: Option<PathBuf>,
    /// Root for per-rule execution logs
    pub rule_log_dir: Option<PathBuf>,
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            rule_log_dir: None,
            json: false,
        }
    }
}

impl AutomationConfig {
    /// Load with the standard layering; `explicit` must exist when given
    pub fn load(explicit: Option<PathBuf>) -> Result<Self> {
        let source = ConfigSource::new(DEFAULT_CONFIG_PATH, ENV_PREFIX).with_explicit(explicit);
        let config: Self = load_layered(&source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service.name.trim().is_empty() {
            bail!("service.name must not be empty");
        }
        if self.schedule.period_secs == 0 {
            bail!("schedule.period_secs must be greater than 0");
        }
        if self.schedule.evaluator_timeout_secs == 0 {
            bail!("schedule.evaluator_timeout_secs must be greater than 0");
        }
        Ok(())
    }

    pub fn tick_schedule(&self) -> TickSchedule {
        TickSchedule {
            period: Duration::from_secs(self.schedule.period_secs),
            initial_delay: Duration::from_secs(self.schedule.initial_delay_secs),
            evaluator_timeout: Duration::from_secs(self.schedule.evaluator_timeout_secs),
        }
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            service_name: self.service.name.clone(),
            level: self.logging.level.clone(),
            dir: self.logging.dir.clone(),
            json: self.logging.json,
        }
    }
}
