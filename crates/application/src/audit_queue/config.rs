use std::time::Duration;

use shopkeep_core::{AppError, AppResult, NonEmptyString};

/// Default queue length that forces an immediate flush.
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Default debounce interval in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 2000;
/// Default storage collection for audit rows.
pub const DEFAULT_AUDIT_COLLECTION: &str = "audit_logs";

/// Size and time thresholds that trigger a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditQueueThresholds {
    batch_size: usize,
    flush_interval: Duration,
}

impl AuditQueueThresholds {
    /// Creates validated thresholds.
    pub fn new(batch_size: usize, flush_interval_ms: u64) -> AppResult<Self> {
        if batch_size == 0 {
            return Err(AppError::Validation(
                "audit batch size must be greater than zero".to_owned(),
            ));
        }

        if flush_interval_ms == 0 {
            return Err(AppError::Validation(
                "audit flush interval must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            batch_size,
            flush_interval: Duration::from_millis(flush_interval_ms),
        })
    }

    /// Returns the queue length that forces an immediate flush.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns how long a partially filled queue may wait.
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Applies overrides, keeping the current value for every missing or zero field.
    pub fn apply(&mut self, overrides: ThresholdOverrides) {
        if let Some(batch_size) = overrides.batch_size.filter(|value| *value > 0) {
            self.batch_size = batch_size;
        }

        if let Some(flush_interval_ms) = overrides.flush_interval_ms.filter(|value| *value > 0) {
            self.flush_interval = Duration::from_millis(flush_interval_ms);
        }
    }
}

impl Default for AuditQueueThresholds {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
        }
    }
}

/// Runtime threshold changes, mostly used by tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThresholdOverrides {
    /// New batch size; `None` or zero keeps the current value.
    pub batch_size: Option<usize>,
    /// New debounce interval; `None` or zero keeps the current value.
    pub flush_interval_ms: Option<u64>,
}

/// Construction options for an audit queue.
#[derive(Debug, Clone)]
pub struct AuditQueueOptions {
    /// Storage collection receiving the rows.
    pub collection: NonEmptyString,
    /// Initial thresholds.
    pub thresholds: AuditQueueThresholds,
    /// User-agent written when the producer did not supply one.
    pub default_user_agent: String,
    /// Whether dropped batches are logged.
    pub report_failures: bool,
}

impl AuditQueueOptions {
    /// Creates options for `collection` with default thresholds.
    pub fn new(collection: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            collection: NonEmptyString::new(collection)?,
            thresholds: AuditQueueThresholds::default(),
            default_user_agent: default_client_context(),
            report_failures: cfg!(debug_assertions),
        })
    }
}

/// Identifies the running process when a producer supplies no user-agent.
#[must_use]
pub fn default_client_context() -> String {
    client_context(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Builds a `name/version (os)` client context for `package`.
#[must_use]
pub fn client_context(package: &str, version: &str) -> String {
    format!("{package}/{version} ({})", std::env::consts::OS)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{
        AuditQueueThresholds, DEFAULT_BATCH_SIZE, ThresholdOverrides, client_context,
        default_client_context,
    };

    #[test]
    fn zero_thresholds_are_rejected() {
        assert!(AuditQueueThresholds::new(0, 100).is_err());
        assert!(AuditQueueThresholds::new(5, 0).is_err());
    }

    #[test]
    fn overrides_ignore_missing_and_zero_values() {
        let mut thresholds = AuditQueueThresholds::default();
        thresholds.apply(ThresholdOverrides {
            batch_size: Some(0),
            flush_interval_ms: Some(250),
        });

        assert_eq!(thresholds.batch_size(), DEFAULT_BATCH_SIZE);
        assert_eq!(thresholds.flush_interval(), Duration::from_millis(250));

        thresholds.apply(ThresholdOverrides::default());
        assert_eq!(thresholds.flush_interval(), Duration::from_millis(250));
    }

    #[test]
    fn client_context_names_package_version_and_os() {
        let context = client_context("shopkeep-audit-relay", "1.2.3");
        assert_eq!(
            context,
            format!("shopkeep-audit-relay/1.2.3 ({})", std::env::consts::OS)
        );
        assert!(default_client_context().starts_with("shopkeep-application/"));
    }
}
