//! Lifecycle error types.

use thiserror::Error;

use crate::provider::{ChannelKind, ProviderError, Resource};

/// Why a release did not leave its handle at zero.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReleaseFailure {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The provider reported success but the handle is still non-zero.
    #[error("handle was not zeroed")]
    HandleNotZeroed,
}

/// Errors surfaced by `ResourceLifecycle` and `ChannelIo`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The provider rejected an acquisition step.
    #[error("{service}: setting up {stage} failed: {source}")]
    Setup {
        service: String,
        stage: Resource,
        #[source]
        source: ProviderError,
    },

    #[error("{service}: network not connected after {waited_ms} ms")]
    NetworkTimeout { service: String, waited_ms: u64 },

    /// Shutdown was triggered while waiting.
    #[error("{service}: wait cancelled by shutdown")]
    Cancelled { service: String },

    #[error("channel is not open")]
    ChannelNotOpen,

    #[error("no data-readable notification pending")]
    NotReadable,

    #[error("operation requires a {expected:?} channel")]
    WrongChannelKind { expected: ChannelKind },

    /// The network or channel dropped while an exchange was in flight.
    #[error("connection dropped")]
    Disconnected,

    #[error("no response within {0} ms")]
    ResponseTimeout(u64),

    /// A handle did not return to zero. The lifecycle is now faulted.
    #[error("{service}: releasing {resource} failed: {cause}")]
    ReleaseFailed {
        service: String,
        resource: Resource,
        #[source]
        cause: ReleaseFailure,
    },

    #[error("lifecycle is faulted after a failed release")]
    Faulted,

    #[error("{op} failed: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl LifecycleError {
    /// Failures worth another acquisition attempt after backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, LifecycleError::Setup { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Status;

    #[test]
    fn test_only_setup_failures_are_transient() {
        let setup = LifecycleError::Setup {
            service: "log".into(),
            stage: Resource::Network,
            source: ProviderError::Status(Status::Unavailable),
        };
        assert!(setup.is_transient());
        assert!(!LifecycleError::Faulted.is_transient());
        assert!(!LifecycleError::NetworkTimeout { service: "log".into(), waited_ms: 5 }.is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = LifecycleError::ReleaseFailed {
            service: "http".into(),
            resource: Resource::Channel,
            cause: ReleaseFailure::HandleNotZeroed,
        };
        assert_eq!(err.to_string(), "http: releasing channel failed: handle was not zeroed");
    }
}
