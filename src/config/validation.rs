//! Configuration validation.
//!
//! Serde handles syntax; this checks value ranges and duplicate breaker
//! names. Every problem is reported, not just the first.

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::{BreakerSettings, BreakerTuning, StoreBackend};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check the breaker thresholds and timeouts, prefixing field names with `scope`.
pub fn validate_tuning(scope: &str, tuning: &BreakerTuning, errors: &mut Vec<ValidationError>) {
    if tuning.failure_threshold < 1 {
        errors.push(ValidationError::new(
            format!("{scope}.failure_threshold"),
            "must be at least 1",
        ));
    }
    if tuning.success_threshold < 1 {
        errors.push(ValidationError::new(
            format!("{scope}.success_threshold"),
            "must be at least 1",
        ));
    }
    if tuning.recovery_timeout_ms == 0 {
        errors.push(ValidationError::new(
            format!("{scope}.recovery_timeout_ms"),
            "must be greater than 0",
        ));
    }
    if tuning.call_timeout_ms == 0 {
        errors.push(ValidationError::new(
            format!("{scope}.call_timeout_ms"),
            "must be greater than 0",
        ));
    }
}

/// Validate a complete configuration.
pub fn validate_settings(settings: &BreakerSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_tuning("defaults", &settings.defaults, &mut errors);

    let mut seen = HashSet::new();
    for (i, o) in settings.breakers.iter().enumerate() {
        let scope = format!("breakers[{i}]");
        if o.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("{scope}.name"), "must not be empty"));
        } else if !seen.insert(o.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{scope}.name"),
                format!("duplicate breaker '{}'", o.name),
            ));
        }
        validate_tuning(&scope, &settings.tuning_for(&o.name), &mut errors);
    }

    if settings.store.ttl_secs == 0 {
        errors.push(ValidationError::new("store.ttl_secs", "must be greater than 0"));
    }
    if settings.store.timeout_ms == 0 {
        errors.push(ValidationError::new("store.timeout_ms", "must be greater than 0"));
    }
    if settings.store.backend == StoreBackend::File && settings.store.path.trim().is_empty() {
        errors.push(ValidationError::new(
            "store.path",
            "required for the file backend",
        ));
    }

    let rate = settings.health.degraded_success_rate;
    if !(0.0..=1.0).contains(&rate) {
        errors.push(ValidationError::new(
            "health.degraded_success_rate",
            "must be between 0 and 1",
        ));
    }
    if settings.health.interval_secs == 0 {
        errors.push(ValidationError::new("health.interval_secs", "must be greater than 0"));
    }

    if settings.observability.metrics_enabled
        && settings
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a valid socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BreakerOverride;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(validate_settings(&BreakerSettings::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut settings = BreakerSettings::default();
        settings.defaults.failure_threshold = 0;
        settings.defaults.call_timeout_ms = 0;
        settings.store.ttl_secs = 0;
        settings.health.degraded_success_rate = 1.5;

        let errors = validate_settings(&settings).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "defaults.failure_threshold",
                "defaults.call_timeout_ms",
                "store.ttl_secs",
                "health.degraded_success_rate",
            ]
        );
    }

    #[test]
    fn test_duplicate_and_invalid_overrides() {
        let mut settings = BreakerSettings::default();
        let o = BreakerOverride {
            name: "ads-api".into(),
            failure_threshold: None,
            recovery_timeout_ms: Some(0),
            success_threshold: None,
            call_timeout_ms: None,
        };
        settings.breakers.push(o.clone());
        settings.breakers.push(o);

        let errors = validate_settings(&settings).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.field == "breakers[1].name" && e.message.contains("duplicate")));
        assert!(errors
            .iter()
            .any(|e| e.field == "breakers[0].recovery_timeout_ms"));
    }
}
