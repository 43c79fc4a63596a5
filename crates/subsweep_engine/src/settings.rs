use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default page listing every subscribed channel.
pub const DEFAULT_LISTING_URL: &str = "https://www.youtube.com/feed/channels";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Parse(String),
}

/// All tunables, loadable from a RON file. Missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub readiness: ReadinessSettings,
    pub executor: ExecutorSettings,
    pub scroll: ScrollSettings,
}

impl Settings {
    /// Upper bound for a whole export: reaching the executor, opening the
    /// listing and every scroll round.
    pub fn export_timeout(&self) -> Duration {
        let rounds = self.scroll.max_attempts.saturating_add(1);
        let rounds = u32::try_from(rounds).unwrap_or(u32::MAX);
        self.readiness
            .timeout()
            .saturating_add(self.engine.navigation_timeout())
            .saturating_add(self.scroll.settle().saturating_mul(rounds))
    }
}

/// Orchestrator loop timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Delay between two items.
    pub pacing_ms: u64,
    /// Wait after a navigation completes before probing the page.
    pub settle_ms: u64,
    pub navigation_timeout_ms: u64,
    pub listing_url: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            pacing_ms: 750,
            settle_ms: 1250,
            navigation_timeout_ms: 30_000,
            listing_url: DEFAULT_LISTING_URL.to_string(),
        }
    }
}

impl EngineSettings {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

/// Bootstrap and dispatch bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessSettings {
    /// Wait after injecting an executor before probing again.
    pub inject_settle_ms: u64,
    pub probe_attempts: usize,
    pub probe_interval_ms: u64,
    /// Upper bound for readiness and for a single dispatched action.
    pub timeout_ms: u64,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            inject_settle_ms: 2000,
            probe_attempts: 10,
            probe_interval_ms: 500,
            timeout_ms: 30_000,
        }
    }
}

impl ReadinessSettings {
    pub fn inject_settle(&self) -> Duration {
        Duration::from_millis(self.inject_settle_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Bounded control lookup inside the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    pub primary_attempts: usize,
    pub secondary_attempts: usize,
    pub confirm_attempts: usize,
    pub poll_interval_ms: u64,
    /// Pause after each click so the page can react.
    pub step_delay_ms: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            primary_attempts: 5,
            secondary_attempts: 3,
            confirm_attempts: 3,
            poll_interval_ms: 450,
            step_delay_ms: 750,
        }
    }
}

impl ExecutorSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollSettings {
    pub settle_ms: u64,
    pub max_attempts: usize,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            settle_ms: 2000,
            max_attempts: 100,
        }
    }
}

impl ScrollSettings {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

pub fn parse_settings(text: &str) -> Result<Settings, SettingsError> {
    ron::from_str(text).map_err(|err| SettingsError::Parse(err.to_string()))
}

pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let text = fs::read_to_string(path)?;
    parse_settings(&text)
}
