use serde::{Deserialize, Serialize};

use bloodlink_core::{MAX_RADIUS_KM, MIN_RADIUS_KM};

/// Engine configuration with per-section defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub alert: AlertSettings,
    #[serde(default)]
    pub propagation: PropagationSettings,
    #[serde(default)]
    pub sweep: SweepSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSettings {
    /// Alert lifetime in hours.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
    /// Search radius applied when the caller does not supply one.
    #[serde(default = "default_radius_km")]
    pub default_radius_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationSettings {
    /// Maximum facilities offered per propagation round.
    #[serde(default = "default_fanout")]
    pub fanout: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Seconds between expiry sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,
}

fn default_ttl_hours() -> i64 {
    bloodlink_core::DEFAULT_TTL_HOURS
}

fn default_radius_km() -> f64 {
    10.0
}

fn default_fanout() -> usize {
    5
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            default_radius_km: default_radius_km(),
        }
    }
}

impl Default for PropagationSettings {
    fn default() -> Self {
        Self {
            fanout: default_fanout(),
        }
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML configuration document.
    pub fn from_toml(input: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(input).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.alert.ttl_hours <= 0 {
            return Err("alert.ttl_hours must be > 0".into());
        }
        if !(MIN_RADIUS_KM..=MAX_RADIUS_KM).contains(&self.alert.default_radius_km) {
            return Err(format!(
                "alert.default_radius_km must be within {MIN_RADIUS_KM}..={MAX_RADIUS_KM}"
            ));
        }
        if self.propagation.fanout == 0 {
            return Err("propagation.fanout must be > 0".into());
        }
        if self.sweep.interval_secs == 0 {
            return Err("sweep.interval_secs must be > 0".into());
        }
        Ok(())
    }

    pub fn ttl(&self) -> time::Duration {
        time::Duration::hours(self.alert.ttl_hours)
    }
}
