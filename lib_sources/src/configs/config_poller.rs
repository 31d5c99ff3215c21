use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::PollerError;

/// Section prefix for poller keys in flattened configuration maps.
pub const SECTION: &str = "Poller";

/// # Poller Config
///
/// Timing and sizing for a [`PollerRunner`](crate::core::runner::PollerRunner).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollerConfig {
    /// Seconds between scheduled poll cycles.
    pub interval_secs: u64,
    /// Seconds before the first scheduled cycle.
    pub initial_delay_secs: u64,
    /// Milliseconds a single probe may run before it is recorded as timed out.
    pub check_timeout_ms: u64,
    /// Minimum seconds between two on-demand rechecks of the same source.
    pub min_recheck_secs: u64,
    /// Upper bound on probes running at the same time.
    pub max_concurrent_checks: usize,
}

impl Default for PollerConfig {
    /// Every 60 seconds starting immediately, 30 second probe timeout, rechecks
    /// at most every 10 seconds, 32 concurrent probes.
    fn default() -> Self {
        Self {
            interval_secs: 60,
            initial_delay_secs: 0,
            check_timeout_ms: 30_000,
            min_recheck_secs: 10,
            max_concurrent_checks: 32,
        }
    }
}

impl PollerConfig {
    /// The interval between scheduled cycles.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// The delay before the first scheduled cycle.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    /// The per-probe timeout.
    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }

    /// The minimum spacing between on-demand rechecks.
    pub fn min_recheck_interval(&self) -> Duration {
        Duration::from_secs(self.min_recheck_secs)
    }

    /// Rejects settings the runner cannot work with.
    pub fn validate(&self) -> Result<(), PollerError> {
        if self.interval_secs == 0 {
            return Err(invalid("intervalSecs", "must be greater than zero"));
        }
        if self.check_timeout_ms == 0 {
            return Err(invalid("checkTimeoutMs", "must be greater than zero"));
        }
        if self.max_concurrent_checks == 0 {
            return Err(invalid("maxConcurrentChecks", "must be greater than zero"));
        }
        Ok(())
    }

    /// # From Options
    ///
    /// Reads settings from a flattened key/value map such as the one produced
    /// by layered JSON loading. Keys are matched case-insensitively under the
    /// `Poller` section (`Poller:IntervalSecs`, `Poller:CheckTimeoutMs`, ...).
    /// Missing keys keep their defaults; unknown keys are ignored.
    pub fn from_options(options: &BTreeMap<String, String>) -> Result<Self, PollerError> {
        let mut config = Self::default();

        for (key, value) in options {
            let Some((section, name)) = key.split_once(':') else {
                continue;
            };
            if !section.eq_ignore_ascii_case(SECTION) {
                continue;
            }

            match name.to_ascii_lowercase().as_str() {
                "intervalsecs" => config.interval_secs = parse(key, value)?,
                "initialdelaysecs" => config.initial_delay_secs = parse(key, value)?,
                "checktimeoutms" => config.check_timeout_ms = parse(key, value)?,
                "minrechecksecs" => config.min_recheck_secs = parse(key, value)?,
                "maxconcurrentchecks" => config.max_concurrent_checks = parse(key, value)?,
                _ => log::debug!("Ignoring unknown poller option '{}'", key),
            }
        }

        config.validate()?;
        Ok(config)
    }
}

impl fmt::Display for PollerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PollerConfig
    Interval: {}s,
    Initial delay: {}s,
    Check timeout: {}ms,
    Min recheck: {}s,
    Max concurrent checks: {}
",
            self.interval_secs,
            self.initial_delay_secs,
            self.check_timeout_ms,
            self.min_recheck_secs,
            self.max_concurrent_checks
        )
    }
}

fn invalid(field: &str, reason: &str) -> PollerError {
    PollerError::InvalidConfig {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, PollerError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, &e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_are_valid() {
        let config = PollerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.interval(), Duration::from_secs(60));
        assert_eq!(config.initial_delay(), Duration::ZERO);
    }

    #[test]
    fn options_override_defaults_case_insensitively() {
        let config = PollerConfig::from_options(&options(&[
            ("poller:intervalsecs", "15"),
            ("Poller:CheckTimeoutMs", " 250 "),
            ("Other:IntervalSecs", "999"),
            ("Poller:Unrelated", "x"),
        ]))
        .expect("valid options");

        assert_eq!(config.interval_secs, 15);
        assert_eq!(config.check_timeout(), Duration::from_millis(250));
        assert_eq!(config.max_concurrent_checks, 32);
    }

    #[test]
    fn unparsable_and_zero_values_are_rejected() {
        let err = PollerConfig::from_options(&options(&[("Poller:IntervalSecs", "soon")]))
            .expect_err("should not parse");
        assert!(matches!(err, PollerError::InvalidConfig { .. }));

        let err = PollerConfig::from_options(&options(&[("Poller:MaxConcurrentChecks", "0")]))
            .expect_err("zero concurrency");
        assert!(err.to_string().contains("maxConcurrentChecks"));
    }

    #[test]
    fn json_uses_camel_case_and_fills_gaps() {
        let config: PollerConfig =
            serde_json::from_str(r#"{ "intervalSecs": 5, "minRecheckSecs": 1 }"#).expect("json");
        assert_eq!(config.interval_secs, 5);
        assert_eq!(config.min_recheck_secs, 1);
        assert_eq!(config.check_timeout_ms, 30_000);
    }
}
