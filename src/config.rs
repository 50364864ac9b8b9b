//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use resource_framework::TaskConfig;

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "virt-api", version, about = "REST API for a virtualization host")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "VIRT_API_LISTEN", default_value = "127.0.0.1:8000")]
    pub listen: SocketAddr,

    /// Default log filter; RUST_LOG takes precedence
    #[arg(long, env = "VIRT_API_LOG", default_value = "info")]
    pub log_filter: String,

    /// How long finished tasks stay queryable, in seconds (0 keeps them forever)
    #[arg(long, env = "VIRT_API_TASK_RETENTION_SECS", default_value_t = 3600)]
    pub task_retention_secs: u64,

    /// Host statistics sampling interval, in milliseconds
    #[arg(long, env = "VIRT_API_STATS_INTERVAL_MS", default_value_t = 1000,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub stats_interval_ms: u64,

    /// Simulated storage volume allocation time, in milliseconds
    #[arg(long, env = "VIRT_API_VOLUME_ALLOC_DELAY_MS", default_value_t = 500)]
    pub volume_alloc_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8000)),
            log_filter: "info".to_string(),
            task_retention_secs: 3600,
            stats_interval_ms: 1000,
            volume_alloc_delay_ms: 500,
        }
    }
}

impl Config {
    pub fn task_config(&self) -> TaskConfig {
        TaskConfig {
            retention: (self.task_retention_secs > 0)
                .then(|| Duration::from_secs(self.task_retention_secs)),
        }
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }

    pub fn volume_alloc_delay(&self) -> Duration {
        Duration::from_millis(self.volume_alloc_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn flags_override_defaults() {
        let config = Config::parse_from([
            "virt-api",
            "--listen",
            "0.0.0.0:9000",
            "--task-retention-secs",
            "0",
            "--volume-alloc-delay-ms",
            "5",
        ]);
        assert_eq!(config.listen.port(), 9000);
        assert_eq!(config.task_config().retention, None);
        assert_eq!(config.volume_alloc_delay(), Duration::from_millis(5));
    }

    #[test]
    fn default_matches_an_empty_command_line() {
        assert_eq!(Config::default(), Config::parse_from(["virt-api"]));
    }

    #[test]
    fn every_flag_has_an_environment_variable() {
        let command = Config::command();
        for arg in command.get_arguments() {
            let id = arg.get_id().as_str();
            if matches!(id, "help" | "version") {
                continue;
            }
            let expected = format!("VIRT_API_{}", id.to_uppercase());
            let expected = expected.replace("LOG_FILTER", "LOG");
            assert_eq!(
                arg.get_env().and_then(|v| v.to_str()),
                Some(expected.as_str()),
                "{id}"
            );
        }
    }

    #[test]
    fn zero_stats_interval_is_rejected() {
        assert!(Config::try_parse_from(["virt-api", "--stats-interval-ms", "0"]).is_err());
    }
}
