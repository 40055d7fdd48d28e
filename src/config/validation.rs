//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, buffers > 0, session limit within semaphore capacity)
//! - Check the upstream host forms a valid URL authority
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use tokio::sync::Semaphore;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("upstream.host must not be empty")]
    EmptyUpstreamHost,

    #[error("upstream.host `{0}` must be a bare host[:port] without scheme or path")]
    UpstreamHost(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: usize },

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let host = config.upstream.host.trim();
    if host.is_empty() {
        errors.push(ValidationError::EmptyUpstreamHost);
    } else if !is_bare_authority(host) {
        errors.push(ValidationError::UpstreamHost(config.upstream.host.clone()));
    }

    if config.websocket.connect_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "websocket.connect_timeout_secs" });
    }
    if config.websocket.max_pending_messages == 0 {
        errors.push(ValidationError::Zero { field: "websocket.max_pending_messages" });
    }
    if config.websocket.max_sessions == 0 {
        errors.push(ValidationError::Zero { field: "websocket.max_sessions" });
    } else if config.websocket.max_sessions > Semaphore::MAX_PERMITS {
        errors.push(ValidationError::TooLarge {
            field: "websocket.max_sessions",
            max: Semaphore::MAX_PERMITS,
        });
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.connect_secs" });
    }
    if config.timeouts.response_secs == Some(0) {
        errors.push(ValidationError::Zero { field: "timeouts.response_secs" });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// True when `host` parses as the authority of an https URL and nothing more.
fn is_bare_authority(host: &str) -> bool {
    if host.contains(['/', '?', '#', '@']) || host.contains(char::is_whitespace) {
        return false;
    }
    match url::Url::parse(&format!("https://{host}")) {
        Ok(parsed) => parsed.host_str().is_some() && parsed.path() == "/",
        Err(_) => false,
    }
}
