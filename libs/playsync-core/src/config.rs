use std::{str::FromStr, time::Duration};

use crate::{
    constants::{DEFAULT_BROADCAST_INTERVAL, DEFAULT_CHANNEL_CAPACITY, DEFAULT_DRIFT_TOLERANCE_SECS, TIGHT_BROADCAST_INTERVAL},
    SyncError, SyncResult,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Seconds of disagreement tolerated before a follower seeks.
    pub drift_tolerance: f64,
    /// Period of the authority's position broadcast.
    pub broadcast_interval: Duration,
    /// Capacity of the event bus and in-memory room channels.
    pub channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drift_tolerance: DEFAULT_DRIFT_TOLERANCE_SECS,
            broadcast_interval: DEFAULT_BROADCAST_INTERVAL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

fn parse<T: FromStr>(key: &str, value: Option<String>) -> SyncResult<Option<T>> {
    match value {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| SyncError::Config(format!("{key}={value} is not a valid value"))),
        None => Ok(None),
    }
}

impl SyncConfig {
    /// One second broadcasts for deployments with a lower tolerance.
    pub fn tight() -> Self {
        Self {
            broadcast_interval: TIGHT_BROADCAST_INTERVAL,
            ..Self::default()
        }
    }

    /// Reads `PLAYSYNC_*` variables, a `.env` file is honored.
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(tolerance) = parse::<f64>("PLAYSYNC_DRIFT_TOLERANCE", lookup("PLAYSYNC_DRIFT_TOLERANCE"))? {
            config.drift_tolerance = tolerance;
        }
        if let Some(interval) = parse::<u64>(
            "PLAYSYNC_BROADCAST_INTERVAL_MS",
            lookup("PLAYSYNC_BROADCAST_INTERVAL_MS"),
        )? {
            config.broadcast_interval = Duration::from_millis(interval);
        }
        if let Some(capacity) = parse::<usize>("PLAYSYNC_CHANNEL_CAPACITY", lookup("PLAYSYNC_CHANNEL_CAPACITY"))? {
            config.channel_capacity = capacity;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if !self.drift_tolerance.is_finite() || self.drift_tolerance < 0.0 {
            return Err(SyncError::Config(format!(
                "drift tolerance must be a non negative number, got {}",
                self.drift_tolerance
            )));
        }
        if self.broadcast_interval.is_zero() {
            return Err(SyncError::Config("broadcast interval must be positive".into()));
        }
        if self.channel_capacity == 0 {
            return Err(SyncError::Config("channel capacity must be positive".into()));
        }
        Ok(())
    }
}
