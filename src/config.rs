//! CLI configuration surface. Parsed with `clap`'s derive API, mirroring
//! the teacher's `dsl_cli`/`batch_test_harness` binaries. No persisted
//! config file — everything is expressed as flags.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::error::{HarnessError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Auto,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "rpc-prober",
    author,
    version,
    about = "Adaptive concurrency prober for a single-consumer-queue RPC service"
)]
pub struct Cli {
    #[arg(long, value_enum, default_value_t = Mode::Auto)]
    pub mode: Mode,

    /// Manual-mode concurrency levels, e.g. "10,20,50,100".
    #[arg(long)]
    pub concurrency: Option<String>,

    /// If set, skip the embedded server and point the client at this address.
    #[arg(long)]
    pub external_server: Option<String>,

    #[arg(long, default_value_t = 0.999)]
    pub success_rate: f64,

    #[arg(long, default_value_t = 200)]
    pub p99_threshold: u64,

    #[arg(long, default_value_t = 5)]
    pub warmup_duration: u64,

    #[arg(long, default_value_t = 10)]
    pub test_duration: u64,

    #[arg(long, default_value_t = 30)]
    pub stability_duration: u64,

    #[arg(long, default_value_t = 50_051)]
    pub port: u16,

    #[arg(long, default_value_t = 8)]
    pub channel_pool_size: usize,

    #[arg(long, default_value_t = 500)]
    pub request_timeout: u64,

    #[arg(long, default_value_t = 10)]
    pub min_service_us: u64,

    #[arg(long, default_value_t = 50)]
    pub max_service_ms: u64,

    #[arg(long, default_value_t = 20)]
    pub initial_concurrency: usize,

    #[arg(long, default_value_t = 2000)]
    pub max_concurrency: usize,

    #[arg(long, default_value_t = 10)]
    pub bisection_tolerance: usize,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.success_rate) || self.success_rate == 0.0 {
            return Err(HarnessError::InvalidConfig(format!(
                "success_rate must be in (0,1], got {}",
                self.success_rate
            )));
        }
        if self.mode == Mode::Manual {
            match &self.concurrency {
                None => {
                    return Err(HarnessError::InvalidConfig(
                        "manual mode requires --concurrency".to_string(),
                    ))
                }
                Some(csv) if parse_concurrency_csv(csv)?.is_empty() => {
                    return Err(HarnessError::InvalidConfig(
                        "--concurrency must name at least one level".to_string(),
                    ))
                }
                _ => {}
            }
        }
        if self.min_service_us == 0 {
            return Err(HarnessError::InvalidConfig(
                "min_service_us must be at least 1".to_string(),
            ));
        }
        if self.max_service_ms * 1000 < self.min_service_us {
            return Err(HarnessError::InvalidConfig(
                "max_service_ms must be >= min_service_us".to_string(),
            ));
        }
        Ok(())
    }

    pub fn manual_levels(&self) -> Result<Vec<usize>> {
        match &self.concurrency {
            Some(csv) => parse_concurrency_csv(csv),
            None => Ok(Vec::new()),
        }
    }

    pub fn p99_threshold_duration(&self) -> Duration {
        Duration::from_millis(self.p99_threshold)
    }

    pub fn request_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }

    pub fn warmup_duration_secs(&self) -> Duration {
        Duration::from_secs(self.warmup_duration)
    }

    pub fn test_duration_secs(&self) -> Duration {
        Duration::from_secs(self.test_duration)
    }

    pub fn stability_duration_secs(&self) -> Duration {
        Duration::from_secs(self.stability_duration)
    }
}

fn parse_concurrency_csv(csv: &str) -> Result<Vec<usize>> {
    csv.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| HarnessError::InvalidConfig(format!("invalid concurrency level: {s}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_cli() -> Cli {
        Cli {
            mode: Mode::Auto,
            concurrency: None,
            external_server: None,
            success_rate: 0.999,
            p99_threshold: 200,
            warmup_duration: 5,
            test_duration: 10,
            stability_duration: 30,
            port: 50_051,
            channel_pool_size: 8,
            request_timeout: 500,
            min_service_us: 10,
            max_service_ms: 50,
            initial_concurrency: 20,
            max_concurrency: 2000,
            bisection_tolerance: 10,
            log_format: LogFormat::Text,
        }
    }

    #[test]
    fn valid_cli_passes_validation() {
        assert!(valid_cli().validate().is_ok());
    }

    #[test]
    fn rejects_success_rate_of_zero() {
        let cli = Cli {
            success_rate: 0.0,
            ..valid_cli()
        };
        assert!(matches!(cli.validate(), Err(HarnessError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_success_rate_above_one() {
        let cli = Cli {
            success_rate: 1.5,
            ..valid_cli()
        };
        assert!(cli.validate().is_err());
    }

    #[test]
    fn rejects_manual_mode_without_concurrency() {
        let cli = Cli {
            mode: Mode::Manual,
            concurrency: None,
            ..valid_cli()
        };
        assert!(cli.validate().is_err());
    }

    #[test]
    fn rejects_manual_mode_with_empty_concurrency() {
        let cli = Cli {
            mode: Mode::Manual,
            concurrency: Some("".to_string()),
            ..valid_cli()
        };
        assert!(cli.validate().is_err());
    }

    #[test]
    fn accepts_manual_mode_with_concurrency_list() {
        let cli = Cli {
            mode: Mode::Manual,
            concurrency: Some("10,20,30".to_string()),
            ..valid_cli()
        };
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn parses_concurrency_csv_into_levels() {
        let csv_parsed = parse_concurrency_csv("10,20,30").unwrap();
        assert_eq!(csv_parsed, vec![10, 20, 30]);
    }

    #[test]
    fn empty_concurrency_csv_parses_to_empty_list() {
        assert!(parse_concurrency_csv("").unwrap().is_empty());
    }

    #[test]
    fn rejects_non_numeric_concurrency() {
        assert!(parse_concurrency_csv("10,abc").is_err());
    }
}
