//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacities and buffer lengths > 0)
//! - Detect tag collisions within a service and across services sharing an irq
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ChannelsConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - The shared-irq tag check is about the host, not this crate: each
//!   lifecycle owns its own ring, but a host that raises one interrupt line
//!   for both sinks can only be told apart by tag

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{ChannelsConfig, ServiceConfig};

/// A single semantic problem in a loaded config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{service}: queue_capacity must be at least 1")]
    ZeroQueueCapacity { service: &'static str },

    #[error("{service}: {field} must be at least 1 byte")]
    ZeroBuffer {
        service: &'static str,
        field: &'static str,
    },

    #[error("{service}: network_tag and channel_tag are both {tag}")]
    DuplicateTag { service: &'static str, tag: u32 },

    /// Both services registered on one interrupt line with a common tag.
    /// Each lifecycle still drains its own ring.
    #[error("log and http share irq {irq} but their tags overlap")]
    SharedIrqTagOverlap { irq: u32 },

    #[error("{service}: endpoint must not be empty")]
    EmptyEndpoint { service: &'static str },

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check every rule and report all violations.
pub fn validate_config(config: &ChannelsConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_service("log", &config.log, &mut errors);
    validate_service("http", &config.http, &mut errors);

    if config.log.endpoint.is_empty() {
        errors.push(ValidationError::EmptyEndpoint { service: "log" });
    }

    if config.log.irq == config.http.irq {
        let log_tags = [config.log.network_tag, config.log.channel_tag];
        let http_tags = [config.http.network_tag, config.http.channel_tag];
        if log_tags.iter().any(|t| http_tags.contains(t)) {
            errors.push(ValidationError::SharedIrqTagOverlap { irq: config.log.irq });
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_service(service: &'static str, config: &ServiceConfig, errors: &mut Vec<ValidationError>) {
    if config.queue_capacity == 0 {
        errors.push(ValidationError::ZeroQueueCapacity { service });
    }
    if config.receive_buffer_len == 0 {
        errors.push(ValidationError::ZeroBuffer {
            service,
            field: "receive_buffer_len",
        });
    }
    if config.send_buffer_len == 0 {
        errors.push(ValidationError::ZeroBuffer {
            service,
            field: "send_buffer_len",
        });
    }
    if config.network_tag == config.channel_tag {
        errors.push(ValidationError::DuplicateTag {
            service,
            tag: config.network_tag,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ChannelsConfig::default()), Ok(()));
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = ChannelsConfig::default();
        config.log.queue_capacity = 0;
        config.log.endpoint.clear();
        config.http.send_buffer_len = 0;
        config.http.channel_tag = config.http.network_tag;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::ZeroQueueCapacity { service: "log" }));
        assert!(errors.contains(&ValidationError::EmptyEndpoint { service: "log" }));
        assert!(errors.contains(&ValidationError::DuplicateTag { service: "http", tag: 1 }));
    }

    #[test]
    fn test_shared_irq_needs_disjoint_tags() {
        let mut config = ChannelsConfig::default();
        config.http.irq = config.log.irq;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::SharedIrqTagOverlap { irq: 43 }]);

        config.http.network_tag = 3;
        config.http.channel_tag = 4;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = ChannelsConfig::default();
        config.observability.metrics_address = "not-an-address".to_string();
        assert_eq!(validate_config(&config), Ok(()));

        config.observability.metrics_enabled = true;
        assert!(matches!(
            validate_config(&config).unwrap_err()[..],
            [ValidationError::InvalidMetricsAddress(_)]
        ));
    }
}
