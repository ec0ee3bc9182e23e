//! Runtime configuration for an SVP identity.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, ServiceConfig, SvpError, constants};

/// Timing and voting configuration shared by every component of one identity.
///
/// Durations are whole milliseconds in JSON, e.g. `{"cycle_interval": 250}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Delay between two scans of a polling lifecycle.
    #[serde(with = "duration_ms")]
    pub cycle_interval: Duration,
    /// Cooldown the write queue waits after every write attempt.
    #[serde(with = "duration_ms")]
    pub write_cooldown: Duration,
    /// Delay between two polls of the buyer's delivery mailbox.
    #[serde(with = "duration_ms")]
    pub delivery_poll_interval: Duration,
    /// Weight of every payment vote a buyer casts.
    pub vote_weight: u16,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_millis(constants::DEFAULT_CYCLE_MS),
            write_cooldown: Duration::from_millis(constants::DEFAULT_WRITE_COOLDOWN_MS),
            delivery_poll_interval: Duration::from_millis(constants::DEFAULT_DELIVERY_POLL_MS),
            vote_weight: constants::MAX_VOTE_WEIGHT,
        }
    }
}

impl MarketConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    /// Returns `Configuration` if the document is malformed or invalid.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|e| SvpError::Configuration(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// Returns `Configuration` for a zero duration or an out-of-range weight.
    pub fn validate(&self) -> Result<()> {
        if self.cycle_interval.is_zero() {
            return Err(SvpError::Configuration("cycle_interval must be non-zero".into()));
        }
        if self.write_cooldown.is_zero() {
            return Err(SvpError::Configuration("write_cooldown must be non-zero".into()));
        }
        if self.delivery_poll_interval.is_zero() {
            return Err(SvpError::Configuration(
                "delivery_poll_interval must be non-zero".into(),
            ));
        }
        if self.vote_weight == 0 || self.vote_weight > constants::MAX_VOTE_WEIGHT {
            return Err(SvpError::Configuration(format!(
                "vote_weight must be in 1..={}",
                constants::MAX_VOTE_WEIGHT
            )));
        }
        Ok(())
    }
}

/// `Duration` as an integer count of milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Everything needed to bring up a seller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub account: crate::AccountName,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

impl IdentityConfig {
    /// # Errors
    /// Returns `Configuration` if the document is malformed, or the first
    /// validation error of the market or of any service.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|e| SvpError::Configuration(e.to_string()))?;
        cfg.market.validate()?;
        for service in &cfg.services {
            service.validate()?;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_config_defaults() {
        let cfg = MarketConfig::default();
        assert_eq!(cfg.cycle_interval.as_millis(), 500);
        assert_eq!(cfg.write_cooldown.as_millis(), 1000);
        assert_eq!(cfg.delivery_poll_interval.as_millis(), 1000);
        assert_eq!(cfg.vote_weight, 10_000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_document_falls_back_to_defaults() {
        let cfg = MarketConfig::from_json_str(r#"{"vote_weight": 5000}"#).unwrap();
        assert_eq!(cfg.vote_weight, 5000);
        assert_eq!(cfg.cycle_interval, Duration::from_millis(500));
    }

    #[test]
    fn zero_cycle_rejected() {
        let err = MarketConfig::from_json_str(r#"{"cycle_interval": 0}"#).unwrap_err();
        assert!(matches!(err, SvpError::Configuration(_)));
    }

    #[test]
    fn zero_write_cooldown_rejected() {
        let cfg = MarketConfig {
            write_cooldown: Duration::ZERO,
            ..MarketConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(SvpError::Configuration(_))));

        let err = MarketConfig::from_json_str(r#"{"write_cooldown": 0}"#).unwrap_err();
        assert!(matches!(err, SvpError::Configuration(_)));
    }

    #[test]
    fn durations_are_milliseconds() {
        let cfg = MarketConfig::from_json_str(
            r#"{"cycle_interval": 250, "write_cooldown": 100, "delivery_poll_interval": 2000}"#,
        )
        .unwrap();
        assert_eq!(cfg.cycle_interval, Duration::from_millis(250));
        assert_eq!(cfg.write_cooldown, Duration::from_millis(100));
        assert_eq!(cfg.delivery_poll_interval, Duration::from_secs(2));

        let json = serde_json::to_value(MarketConfig::default()).unwrap();
        assert_eq!(json["cycle_interval"], 500);
        assert_eq!(json["write_cooldown"], 1000);

        let err = MarketConfig::from_json_str(r#"{"cycle_interval": {"secs": 1, "nanos": 0}}"#)
            .unwrap_err();
        assert!(matches!(err, SvpError::Configuration(_)));
    }

    #[test]
    fn malformed_document_is_configuration_error() {
        let err = MarketConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, SvpError::Configuration(_)));
    }

    #[test]
    fn identity_config_validates_services() {
        let err = IdentityConfig::from_json_str(
            r#"{"account":"alice","services":[{"title":"T","description":"D","permlink":"p","terms":{"cost":0}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SvpError::InvalidTerms { .. }));

        let ok = IdentityConfig::from_json_str(r#"{"account":"alice"}"#).unwrap();
        assert_eq!(ok.account.as_str(), "alice");
        assert!(ok.services.is_empty());
    }
}
