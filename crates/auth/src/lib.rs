//! Verdant Auth Crate
//!
//! OAuth 2.0 authorization-code sessions for the Verdant Earth-observation
//! stack, modeled on the NASA Earthdata Login flow.
//!
//! # Overview
//!
//! The auth crate provides:
//! - Authorization-URL construction with anti-CSRF state
//! - Code exchange, token refresh, and bearer-authenticated requests
//! - Session persistence across restarts (file-backed or in-memory)
//! - A broadcast bus announcing sign-in, refresh, and sign-out transitions
//! - A background watchdog that refreshes tokens before they expire
//!
//! # Core Types
//!
//! - [`CredentialStore`] - owns the session and the token lifecycle
//! - [`AccessToken`] - access/refresh pair with absolute expiry
//! - [`TokenStore`] - persistence seam ([`FileTokenStore`], [`MemoryTokenStore`])
//! - [`AuthEventBus`] - fan-out of [`AuthEvent`] transitions

pub mod credentials;
pub mod error;
pub mod events;
pub mod store;
pub mod token;

pub use credentials::{
    spawn_expiry_watchdog, CredentialStore, OAuthConfig, REFRESH_MARGIN_SECS, WATCHDOG_INTERVAL,
};
pub use error::{AuthError, AuthResult};
pub use events::{AuthEvent, AuthEventBus, SignOutReason};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{AccessToken, UserInfo};
