use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context};
use cron::Schedule;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// One downstream webhook: the URL to POST and the base images it depends on.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HubConfig {
    pub post: String,
    pub base: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub log_level: String,
    /// Crontab expression deciding when builds run.
    pub schedule: String,
    pub state_path: PathBuf,
    pub pull_timeout_secs: u64,
    pub trigger_timeout_secs: u64,
    pub hub: Vec<HubConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            schedule: String::new(),
            state_path: "state.json".into(),
            pull_timeout_secs: 600,
            trigger_timeout_secs: 30,
            hub: Vec::new(),
        }
    }
}

/// Settings derived from a [`Config`] by [`Config::validate`].
pub struct Validated {
    pub log_level: LevelFilter,
    pub schedule: Schedule,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("chainreactor.toml"))
            .merge(Json::file("chainreactor.json"))
            .merge(Env::prefixed("CHAINREACTOR_"))
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
    }

    /// Check the parts the build cycle depends on, returning the parsed
    /// log level and schedule.
    pub fn validate(&self) -> anyhow::Result<Validated> {
        let log_level = LevelFilter::from_str(&self.log_level)
            .map_err(|_| anyhow::anyhow!("bad log level {:?}", self.log_level))?;

        if self.schedule.trim().is_empty() {
            bail!("build schedule missing");
        }
        let schedule = parse_schedule(&self.schedule)
            .with_context(|| format!("bad build schedule {:?}", self.schedule))?;

        for hub in &self.hub {
            if hub.post.trim().is_empty() {
                bail!("trigger URL missing");
            }
        }

        Ok(Validated {
            log_level,
            schedule,
        })
    }
}

/// Parse a cron expression, accepting the classic 5-field crontab form by
/// prefixing a seconds field.
fn parse_schedule(expr: &str) -> anyhow::Result<Schedule> {
    match Schedule::from_str(expr) {
        Ok(schedule) => Ok(schedule),
        Err(_) => Schedule::from_str(&format!("0 {expr}")).map_err(Into::into),
    }
}
