//! Error types for the synthesis pipeline.

/// Errors that can occur while preparing or dispatching a synthesis request.
#[derive(Debug, thiserror::Error)]
pub enum ArchiError {
    /// An uploaded image could not be decoded.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// No credential could be resolved from any source.
    #[error("no API credential available")]
    CredentialMissing,

    /// The remote API rejected the credential (billing, permission, entitlement).
    #[error("credential rejected: {0}")]
    Credential(String),

    /// The remote API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The remote API returned a well-formed but unusable response.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A precondition on the request was not met.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (e.g., credential store access).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The four failure classes a host UI switches on.
///
/// Remote failures collapse into either [`FailureClass::Credential`] or
/// [`FailureClass::TransientOrUnknown`]; nothing is retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Malformed uploaded image; blocks dependent steps locally.
    Decode,
    /// No resolvable credential; blocks any network call.
    CredentialMissing,
    /// Remote rejection attributable to billing/permission; triggers re-acquisition.
    Credential,
    /// Any other failure; surfaced as a generic, non-retried notice.
    TransientOrUnknown,
}

impl ArchiError {
    /// Collapses this error into its [`FailureClass`].
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Decode(_) => FailureClass::Decode,
            Self::CredentialMissing => FailureClass::CredentialMissing,
            Self::Credential(_) => FailureClass::Credential,
            _ => FailureClass::TransientOrUnknown,
        }
    }

    /// Returns true if this error should re-surface the credential flow.
    pub fn is_credential(&self) -> bool {
        matches!(
            self.class(),
            FailureClass::Credential | FailureClass::CredentialMissing
        )
    }
}

/// Result type alias for synthesis operations.
pub type Result<T> = std::result::Result<T, ArchiError>;
