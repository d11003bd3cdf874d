//! Coordinator configuration, read from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for the room coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Address the HTTP/WebSocket server binds to
    pub bind_addr: SocketAddr,
    /// How long an empty lobby survives before it is deleted
    pub lobby_grace: Duration,
    /// How long an empty started game survives before it is deleted
    pub active_grace: Duration,
    /// Rooms with no activity for this long are swept even with connections
    pub idle_threshold: Duration,
    /// How often the idle sweep runs
    pub sweep_interval: Duration,
    /// Trailing chat/clue/system messages kept per room
    pub message_history: usize,
    /// Directory for the JSON document store (None = no persistence)
    pub data_dir: Option<PathBuf>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            // 7796 is "SPYM" on a phone keypad
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7796)),
            lobby_grace: Duration::from_secs(60),
            active_grace: Duration::from_secs(30),
            idle_threshold: Duration::from_secs(2 * 60 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
            message_history: 50,
            data_dir: None,
        }
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

impl CoordinatorConfig {
    /// Load config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = match std::env::var("SPYMASTER_BIND") {
            Ok(v) => v.trim().parse().unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid SPYMASTER_BIND {:?}: {}", v, e);
                defaults.bind_addr
            }),
            Err(_) => defaults.bind_addr,
        };

        let message_history = std::env::var("SPYMASTER_MESSAGE_HISTORY")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.message_history);

        let data_dir = std::env::var("SPYMASTER_DATA_DIR")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let config = Self {
            bind_addr,
            lobby_grace: env_secs("SPYMASTER_LOBBY_GRACE_SECS", defaults.lobby_grace),
            active_grace: env_secs("SPYMASTER_ACTIVE_GRACE_SECS", defaults.active_grace),
            idle_threshold: env_secs("SPYMASTER_IDLE_THRESHOLD_SECS", defaults.idle_threshold),
            sweep_interval: env_secs("SPYMASTER_SWEEP_INTERVAL_SECS", defaults.sweep_interval),
            message_history,
            data_dir,
        };

        tracing::info!(
            bind = %config.bind_addr,
            lobby_grace_secs = config.lobby_grace.as_secs(),
            active_grace_secs = config.active_grace.as_secs(),
            idle_threshold_secs = config.idle_threshold.as_secs(),
            sweep_interval_secs = config.sweep_interval.as_secs(),
            message_history = config.message_history,
            data_dir = ?config.data_dir,
            "Coordinator config loaded"
        );

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "SPYMASTER_BIND",
        "SPYMASTER_LOBBY_GRACE_SECS",
        "SPYMASTER_ACTIVE_GRACE_SECS",
        "SPYMASTER_IDLE_THRESHOLD_SECS",
        "SPYMASTER_SWEEP_INTERVAL_SECS",
        "SPYMASTER_MESSAGE_HISTORY",
        "SPYMASTER_DATA_DIR",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = CoordinatorConfig::from_env();

        assert_eq!(config.bind_addr.port(), 7796);
        assert_eq!(config.lobby_grace, Duration::from_secs(60));
        assert_eq!(config.active_grace, Duration::from_secs(30));
        assert_eq!(config.idle_threshold, Duration::from_secs(7200));
        assert_eq!(config.message_history, 50);
        assert!(config.data_dir.is_none());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("SPYMASTER_BIND", "127.0.0.1:9000");
        std::env::set_var("SPYMASTER_LOBBY_GRACE_SECS", "5");
        std::env::set_var("SPYMASTER_MESSAGE_HISTORY", "10");
        std::env::set_var("SPYMASTER_DATA_DIR", "/tmp/spymaster");

        let config = CoordinatorConfig::from_env();
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.lobby_grace, Duration::from_secs(5));
        assert_eq!(config.message_history, 10);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/spymaster")));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("SPYMASTER_BIND", "not-an-address");
        std::env::set_var("SPYMASTER_ACTIVE_GRACE_SECS", "soon");
        std::env::set_var("SPYMASTER_MESSAGE_HISTORY", "0");

        let config = CoordinatorConfig::from_env();
        assert_eq!(config.bind_addr.port(), 7796);
        assert_eq!(config.active_grace, Duration::from_secs(30));
        assert_eq!(config.message_history, 50);

        clear_env();
    }
}
