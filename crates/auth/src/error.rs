use thiserror::Error;

/// Result type alias for credential operations.
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Errors produced by the OAuth credential store.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The anti-CSRF state echoed back by the provider did not match the
    /// value we generated for this sign-in attempt.
    #[error("OAuth state parameter mismatch")]
    StateMismatch,

    /// The token endpoint rejected the authorization-code exchange.
    #[error("Authorization code exchange failed ({status}): {message}")]
    ExchangeFailed { status: u16, message: String },

    /// The refresh grant was rejected. The session cannot be recovered
    /// without a new interactive sign-in.
    #[error("Token refresh failed: {message}")]
    RefreshFailed { message: String },

    /// An operation required a signed-in session and none is held.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// A request still came back 401 after a refresh-and-retry cycle.
    #[error("Request unauthorized after token refresh")]
    Unauthorized,

    /// The request could not be retried because its body is not cloneable.
    #[error("Request cannot be retried: {0}")]
    NonRetryableRequest(String),

    /// The persisted token document could not be read or written.
    #[error("Token storage error: {0}")]
    Storage(String),

    /// HTTP transport failure while talking to the identity provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The token endpoint returned a body we could not parse.
    #[error("Malformed token response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

impl AuthError {
    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        AuthError::Storage(message.into())
    }

    /// Create an exchange failure from a response status and body.
    pub fn exchange_failed(status: u16, message: impl Into<String>) -> Self {
        AuthError::ExchangeFailed {
            status,
            message: message.into(),
        }
    }

    /// Create a refresh failure.
    pub fn refresh_failed(message: impl Into<String>) -> Self {
        AuthError::RefreshFailed {
            message: message.into(),
        }
    }

    /// True when the error means the user must sign in again interactively.
    pub fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            AuthError::RefreshFailed { .. }
                | AuthError::NotAuthenticated
                | AuthError::Unauthorized
        )
    }
}
