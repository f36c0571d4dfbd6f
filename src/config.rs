//! Command-line and environment configuration

use std::time::Duration;

use clap::Parser;

use crate::server::RelaySettings;

/// `--database-url` value that selects the in-process store
pub const MEMORY_DATABASE_URL: &str = "memory";

/// Query conversation relay
#[derive(Parser, Clone, Debug)]
#[command(name = "query_relay", version, about = "WebSocket relay for query conversations")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "RELAY_BIND", default_value = "127.0.0.1:8765")]
    pub bind: String,

    /// Message database URL, or "memory" to keep messages in process
    #[arg(long, env = "RELAY_DATABASE_URL", default_value = "sqlite://relay.db?mode=rwc")]
    pub database_url: String,

    /// Milliseconds a single outbound send may wait before it counts as failed
    #[arg(long, env = "RELAY_SEND_TIMEOUT_MS", default_value_t = 5000)]
    pub send_timeout_ms: u64,

    /// Capacity of each connection's outbound queue
    #[arg(long, env = "RELAY_OUTBOUND_BUFFER", default_value_t = 32, value_parser = clap::value_parser!(u64).range(1..))]
    pub outbound_buffer: u64,

    /// Emit logs as JSON
    #[arg(long, env = "RELAY_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            outbound_buffer: usize::try_from(self.outbound_buffer).unwrap_or(usize::MAX),
        }
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE_URL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["query_relay"]).unwrap();
        assert_eq!(config.bind, "127.0.0.1:8765");
        assert!(!config.uses_memory_store());

        let settings = config.relay_settings();
        assert_eq!(settings.send_timeout, Duration::from_secs(5));
        assert_eq!(settings.outbound_buffer, 32);
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "query_relay",
            "--bind",
            "0.0.0.0:9000",
            "--database-url",
            "memory",
            "--send-timeout-ms",
            "250",
            "--json-logs",
        ])
        .unwrap();

        assert_eq!(config.bind, "0.0.0.0:9000");
        assert!(config.uses_memory_store());
        assert!(config.json_logs);
        assert_eq!(config.relay_settings().send_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_zero_buffer_rejected() {
        assert!(Config::try_parse_from(["query_relay", "--outbound-buffer", "0"]).is_err());
    }
}
