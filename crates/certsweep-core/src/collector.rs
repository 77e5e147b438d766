//! The capability every certificate source implements.

use async_trait::async_trait;

use crate::error::{Result, SweepError};
use crate::types::{CollectorConfig, Harvest};

/// A source-specific adapter that discovers and normalizes certificates.
///
/// Implementations process their items sequentially. A failure on a single
/// item is recorded in the returned [`Harvest`] as skipped; only source-level
/// failures (unreachable, unauthenticated, unenumerable) are returned as
/// errors.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Unique registry name, also stamped into every record's `source` tag
    fn name(&self) -> &'static str;

    /// One-line human description
    fn description(&self) -> &'static str;

    /// Configuration keys that must be present and truthy, in check order
    fn required_parameters(&self) -> &'static [&'static str] {
        &[]
    }

    /// Check the configuration before any I/O
    fn validate(&self, config: &CollectorConfig) -> Result<()> {
        validate_required(self.name(), self.required_parameters(), config)
    }

    /// Fetch and normalize every certificate from the source
    async fn collect(&self, config: &CollectorConfig) -> Result<Harvest>;
}

/// Fail with [`SweepError::Configuration`] naming the first absent or falsy key
pub fn validate_required(
    collector: &str,
    required: &[&str],
    config: &CollectorConfig,
) -> Result<()> {
    match required.iter().find(|key| !config.is_truthy(key)) {
        Some(missing) => Err(SweepError::Configuration {
            collector: collector.to_string(),
            parameter: (*missing).to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordInput;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Collector for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Returns one record per configured name"
        }

        fn required_parameters(&self) -> &'static [&'static str] {
            &["names", "owner"]
        }

        async fn collect(&self, config: &CollectorConfig) -> Result<Harvest> {
            self.validate(config)?;
            let mut harvest = Harvest::new(self.name());
            for name in config.string_list("names") {
                harvest.push(RecordInput::new().domain(name).classify(config).finish(self.name()));
            }
            Ok(harvest)
        }
    }

    #[test]
    fn first_missing_parameter_is_named() {
        let err = Echo.validate(&CollectorConfig::new()).unwrap_err();
        assert!(matches!(
            err,
            SweepError::Configuration { ref parameter, .. } if parameter == "names"
        ));

        let partial = CollectorConfig::new().with("names", json!(["a"])).with("owner", "");
        let err = Echo.validate(&partial).unwrap_err();
        assert!(err.to_string().contains("'owner'"));
    }

    #[test]
    fn validate_passes_when_all_truthy() {
        let cfg = CollectorConfig::new()
            .with("names", json!(["a"]))
            .with("owner", "ops")
            .with("unrelated", false);
        assert!(Echo.validate(&cfg).is_ok());
    }

    #[test]
    fn falsy_values_fail_validation() {
        for falsy in [json!(null), json!(false), json!(0), json!(""), json!([]), json!({})] {
            let cfg = CollectorConfig::new().with("names", falsy).with("owner", "ops");
            assert!(Echo.validate(&cfg).is_err());
        }
    }

    #[test]
    fn collect_validates_before_work() {
        assert!(tokio_test::block_on(Echo.collect(&CollectorConfig::new())).is_err());

        let cfg = CollectorConfig::new()
            .with("names", json!(["a.example", "b.example"]))
            .with("owner", "ops")
            .with("environment", "prod");
        let harvest = tokio_test::block_on(Echo.collect(&cfg)).unwrap();
        assert_eq!(harvest.len(), 2);
        for record in harvest.records() {
            assert_eq!(record.source(), "echo");
            assert_eq!(record.tags["environment"], json!("prod"));
        }
    }
}
