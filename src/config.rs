use std::time::Duration;

use uuid::Uuid;

use crate::partition::id::HostId;

/// Sync engine configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// This host's network identity
    pub host_id: HostId,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Minimum time between local captures of a partition
    pub local_update_interval: Duration,
    /// Inbound queue capacity (batches)
    pub inbound_capacity: usize,
    /// Port for the metrics endpoint
    pub metrics_port: u16,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            host_id: Uuid::new_v4(),
            tick_rate: 60,
            local_update_interval: Duration::from_millis(25),
            inbound_capacity: 1024,
            metrics_port: 9090,
        }
    }
}

impl SyncConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("CELLSYNC_HOST_ID") {
            if let Ok(parsed) = host.parse() {
                config.host_id = parsed;
            } else {
                tracing::warn!("Invalid CELLSYNC_HOST_ID '{}', using random id", host);
            }
        }

        if let Ok(rate) = std::env::var("CELLSYNC_TICK_RATE") {
            if let Ok(parsed) = rate.parse::<u32>() {
                if (1..=240).contains(&parsed) {
                    config.tick_rate = parsed;
                } else {
                    tracing::warn!("CELLSYNC_TICK_RATE must be 1-240, using default");
                }
            } else {
                tracing::warn!("Invalid CELLSYNC_TICK_RATE '{}', using default", rate);
            }
        }

        if let Ok(interval) = std::env::var("CELLSYNC_LOCAL_UPDATE_INTERVAL_MS") {
            if let Ok(parsed) = interval.parse::<u64>() {
                if (1..=1000).contains(&parsed) {
                    config.local_update_interval = Duration::from_millis(parsed);
                } else {
                    tracing::warn!("CELLSYNC_LOCAL_UPDATE_INTERVAL_MS must be 1-1000, using default");
                }
            } else {
                tracing::warn!(
                    "Invalid CELLSYNC_LOCAL_UPDATE_INTERVAL_MS '{}', using default",
                    interval
                );
            }
        }

        if let Ok(capacity) = std::env::var("CELLSYNC_INBOUND_CAPACITY") {
            if let Ok(parsed) = capacity.parse::<usize>() {
                if parsed > 0 {
                    config.inbound_capacity = parsed;
                } else {
                    tracing::warn!("CELLSYNC_INBOUND_CAPACITY must be > 0, using default");
                }
            } else {
                tracing::warn!("Invalid CELLSYNC_INBOUND_CAPACITY '{}', using default", capacity);
            }
        }

        if let Ok(port) = std::env::var("METRICS_PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                if parsed > 0 {
                    config.metrics_port = parsed;
                } else {
                    tracing::warn!("METRICS_PORT must be > 0, using default");
                }
            } else {
                tracing::warn!("Invalid METRICS_PORT '{}', using default", port);
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 || self.tick_rate > 240 {
            return Err(ConfigError::TickRate(self.tick_rate));
        }
        if self.local_update_interval.is_zero() {
            return Err(ConfigError::UpdateInterval);
        }
        if self.inbound_capacity == 0 {
            return Err(ConfigError::InboundCapacity);
        }
        if self.metrics_port == 0 {
            return Err(ConfigError::MetricsPort);
        }
        Ok(())
    }

    /// Duration of one simulation tick
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate.max(1)
    }

    /// Same settings under a different host identity
    pub fn for_host(&self, host_id: HostId) -> Self {
        Self {
            host_id,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("tick rate {0} out of range 1-240")]
    TickRate(u32),
    #[error("local update interval must be non-zero")]
    UpdateInterval,
    #[error("inbound capacity must be at least 1")]
    InboundCapacity,
    #[error("metrics port cannot be 0")]
    MetricsPort,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.local_update_interval, Duration::from_millis(25));
        assert_eq!(config.inbound_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = SyncConfig::load_or_default();
        assert!(config.tick_rate > 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SyncConfig::default();
        config.tick_rate = 0;
        assert_eq!(config.validate(), Err(ConfigError::TickRate(0)));

        let mut config = SyncConfig::default();
        config.local_update_interval = Duration::ZERO;
        assert_eq!(config.validate(), Err(ConfigError::UpdateInterval));

        let mut config = SyncConfig::default();
        config.inbound_capacity = 0;
        assert_eq!(config.validate(), Err(ConfigError::InboundCapacity));
    }

    #[test]
    fn test_tick_interval() {
        let mut config = SyncConfig::default();
        config.tick_rate = 50;
        assert_eq!(config.tick_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_for_host() {
        let config = SyncConfig::default();
        let other = Uuid::new_v4();
        let derived = config.for_host(other);
        assert_eq!(derived.host_id, other);
        assert_eq!(derived.tick_rate, config.tick_rate);
    }
}
