use std::env;

use shopkeep_application::{
    AuditQueueOptions, AuditQueueThresholds, DEFAULT_AUDIT_COLLECTION, DEFAULT_BATCH_SIZE,
    DEFAULT_FLUSH_INTERVAL_MS, client_context,
};
use shopkeep_core::{AppError, AppResult};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditSinkConfig {
    Console,
    Postgres { database_url: String },
    Http { base_url: Url, api_key: String },
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub migrate_only: bool,
    pub sink: AuditSinkConfig,
    pub collection: String,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub report_failures: bool,
    pub default_user_agent: String,
}

impl RelayConfig {
    pub fn load() -> AppResult<Self> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        Self::from_lookup(migrate_only, |name| env::var(name).ok())
    }

    pub fn from_lookup<F>(migrate_only: bool, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let sink = match lookup("AUDIT_SINK")
            .unwrap_or_else(|| "console".to_owned())
            .as_str()
        {
            "console" => AuditSinkConfig::Console,
            "postgres" => AuditSinkConfig::Postgres {
                database_url: required_non_empty(&lookup, "DATABASE_URL")?,
            },
            "http" => {
                let base_url = required_non_empty(&lookup, "AUDIT_HTTP_BASE_URL")?;
                let base_url = Url::parse(base_url.as_str()).map_err(|error| {
                    AppError::Validation(format!("invalid AUDIT_HTTP_BASE_URL: {error}"))
                })?;
                AuditSinkConfig::Http {
                    base_url,
                    api_key: required_non_empty(&lookup, "AUDIT_HTTP_API_KEY")?,
                }
            }
            other => {
                return Err(AppError::Validation(format!(
                    "AUDIT_SINK must be one of 'console', 'postgres' or 'http', got '{other}'"
                )));
            }
        };

        let collection = lookup("AUDIT_COLLECTION")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_AUDIT_COLLECTION.to_owned());
        let batch_size = parse_usize(&lookup, "AUDIT_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        let flush_interval_ms =
            parse_u64(&lookup, "AUDIT_FLUSH_INTERVAL_MS", DEFAULT_FLUSH_INTERVAL_MS)?;
        let report_failures =
            parse_bool(&lookup, "AUDIT_REPORT_FAILURES", cfg!(debug_assertions))?;
        let default_user_agent = lookup("AUDIT_USER_AGENT")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(default_relay_user_agent);

        if batch_size == 0 {
            return Err(AppError::Validation(
                "AUDIT_BATCH_SIZE must be greater than zero".to_owned(),
            ));
        }

        if flush_interval_ms == 0 {
            return Err(AppError::Validation(
                "AUDIT_FLUSH_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            migrate_only,
            sink,
            collection,
            batch_size,
            flush_interval_ms,
            report_failures,
            default_user_agent,
        })
    }

    pub fn queue_options(&self) -> AppResult<AuditQueueOptions> {
        let mut options = AuditQueueOptions::new(self.collection.as_str())?;
        options.thresholds = AuditQueueThresholds::new(self.batch_size, self.flush_interval_ms)?;
        options.default_user_agent = self.default_user_agent.clone();
        options.report_failures = self.report_failures;
        Ok(options)
    }

    pub fn sink_label(&self) -> &'static str {
        match self.sink {
            AuditSinkConfig::Console => "console",
            AuditSinkConfig::Postgres { .. } => "postgres",
            AuditSinkConfig::Http { .. } => "http",
        }
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn default_relay_user_agent() -> String {
    client_context(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

fn required_non_empty<F>(lookup: &F, name: &str) -> AppResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(name).ok_or_else(|| AppError::Validation(format!("{name} is required")))?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn parse_usize<F>(lookup: &F, name: &str, default: usize) -> AppResult<usize>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => value.trim().parse::<usize>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

fn parse_u64<F>(lookup: &F, name: &str, default: u64) -> AppResult<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => value.trim().parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, name: &str, default: bool) -> AppResult<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if value.eq_ignore_ascii_case("true") || value == "1" => Ok(true),
        Some(value) if value.eq_ignore_ascii_case("false") || value == "0" => Ok(false),
        Some(value) => Err(AppError::Validation(format!(
            "invalid {name} value '{value}': expected true or false"
        ))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{AuditSinkConfig, RelayConfig};

    fn load(pairs: &[(&str, &str)]) -> Result<RelayConfig, shopkeep_core::AppError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        RelayConfig::from_lookup(false, |name| values.get(name).cloned())
    }

    #[test]
    fn defaults_use_console_sink_and_standard_thresholds() {
        let config = match load(&[]) {
            Ok(config) => config,
            Err(error) => panic!("default config failed: {error}"),
        };

        assert_eq!(config.sink, AuditSinkConfig::Console);
        assert_eq!(config.collection, "audit_logs");
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.flush_interval_ms, 2000);
        assert!(config.default_user_agent.starts_with("shopkeep-audit-relay/"));

        let options = match config.queue_options() {
            Ok(options) => options,
            Err(error) => panic!("queue options failed: {error}"),
        };
        assert_eq!(options.thresholds.flush_interval(), Duration::from_millis(2000));
    }

    #[test]
    fn http_sink_requires_url_and_key() {
        assert!(load(&[("AUDIT_SINK", "http")]).is_err());
        assert!(load(&[("AUDIT_SINK", "http"), ("AUDIT_HTTP_BASE_URL", "not a url")]).is_err());

        let config = load(&[
            ("AUDIT_SINK", "http"),
            ("AUDIT_HTTP_BASE_URL", "https://shop.example.com"),
            ("AUDIT_HTTP_API_KEY", "anon-key"),
        ]);
        assert!(matches!(
            config.map(|config| config.sink),
            Ok(AuditSinkConfig::Http { .. })
        ));
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        assert!(load(&[("AUDIT_BATCH_SIZE", "0")]).is_err());
        assert!(load(&[("AUDIT_BATCH_SIZE", "ten")]).is_err());
        assert!(load(&[("AUDIT_FLUSH_INTERVAL_MS", "0")]).is_err());
        assert!(load(&[("AUDIT_REPORT_FAILURES", "maybe")]).is_err());
        assert!(load(&[("AUDIT_SINK", "kafka")]).is_err());
    }

    #[test]
    fn postgres_sink_reads_database_url() {
        let config = load(&[
            ("AUDIT_SINK", "postgres"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("AUDIT_REPORT_FAILURES", "false"),
            ("AUDIT_BATCH_SIZE", "25"),
        ]);

        let config = match config {
            Ok(config) => config,
            Err(error) => panic!("postgres config failed: {error}"),
        };
        assert_eq!(config.sink_label(), "postgres");
        assert_eq!(config.batch_size, 25);
        assert!(!config.report_failures);
    }
}
