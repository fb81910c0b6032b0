//! Run configuration.

use std::str::FromStr;
use std::time::Duration;

/// Knobs for one run. Defaults match the classic demo shape: five workers
/// contending for two permits, four one-second steps each, fifty seconds of
/// patience overall.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// How many workers contend for the gate.
    pub pool_size: usize,
    /// Maximum concurrent permit holders.
    pub permit_capacity: usize,
    /// Work steps each admitted worker performs.
    pub steps_per_worker: u32,
    /// Suspension between steps.
    pub step_delay: Duration,
    /// How long the dispatcher waits before giving up on the run.
    pub overall_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            pool_size: 5,
            permit_capacity: 2,
            steps_per_worker: 4,
            step_delay: Duration::from_millis(1000),
            overall_timeout: Duration::from_secs(50),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("pool size must be positive")]
    ZeroPoolSize,
    #[error("permit capacity must be positive")]
    ZeroPermitCapacity,
    #[error("steps per worker must be positive")]
    ZeroSteps,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }
        if self.permit_capacity == 0 {
            return Err(ConfigError::ZeroPermitCapacity);
        }
        if self.steps_per_worker == 0 {
            return Err(ConfigError::ZeroSteps);
        }
        Ok(())
    }

    /// Overlay `WORKGATE_*` environment variables onto `self`. Unparseable
    /// values are ignored with a warning.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse("WORKGATE_POOL_SIZE") {
            self.pool_size = v;
        }
        if let Some(v) = env_parse("WORKGATE_PERMIT_CAPACITY") {
            self.permit_capacity = v;
        }
        if let Some(v) = env_parse("WORKGATE_STEPS") {
            self.steps_per_worker = v;
        }
        if let Some(v) = env_parse::<u64>("WORKGATE_STEP_DELAY_MS") {
            self.step_delay = Duration::from_millis(v);
        }
        if let Some(v) = env_parse::<u64>("WORKGATE_TIMEOUT_S") {
            self.overall_timeout = Duration::from_secs(v);
        }
        self
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_demo() {
        let config = RunConfig::default();
        assert_eq!(config.pool_size, 5);
        assert_eq!(config.permit_capacity, 2);
        assert_eq!(config.steps_per_worker, 4);
        assert_eq!(config.step_delay, Duration::from_millis(1000));
        assert_eq!(config.overall_timeout, Duration::from_secs(50));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_values_are_rejected() {
        let config = RunConfig {
            permit_capacity: 0,
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroPermitCapacity)
        ));

        let config = RunConfig {
            pool_size: 0,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroPoolSize)));

        let config = RunConfig {
            steps_per_worker: 0,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroSteps)));
    }

    #[test]
    fn env_overrides_apply_and_bad_values_are_ignored() {
        unsafe {
            std::env::set_var("WORKGATE_POOL_SIZE", "9");
            std::env::set_var("WORKGATE_STEP_DELAY_MS", "not-a-number");
        }

        let config = RunConfig::default().with_env_overrides();
        assert_eq!(config.pool_size, 9);
        assert_eq!(config.step_delay, Duration::from_millis(1000));

        unsafe {
            std::env::remove_var("WORKGATE_POOL_SIZE");
            std::env::remove_var("WORKGATE_STEP_DELAY_MS");
        }
    }
}
