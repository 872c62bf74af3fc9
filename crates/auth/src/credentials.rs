use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::{AuthError, AuthResult};
use crate::events::{AuthEvent, AuthEventBus, SignOutReason};
use crate::store::TokenStore;
use crate::token::{AccessToken, UserInfo};

/// How close to expiry a token may get before the watchdog refreshes it.
pub const REFRESH_MARGIN_SECS: i64 = 300;

/// How often the background watchdog re-checks the token.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(60);

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Endpoints and client identity for the OAuth authorization-code flow.
#[derive(Clone, Debug)]
pub struct OAuthConfig {
    pub authorize_url: String,
    pub token_url: String,
    /// Optional profile endpoint queried once after sign-in. When `None`
    /// the session carries no user details.
    pub profile_url: Option<String>,
    pub client_id: String,
    pub redirect_uri: String,
    pub timeout: Duration,
}

impl OAuthConfig {
    /// Configuration pointing at the NASA Earthdata Login endpoints.
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        OAuthConfig {
            authorize_url: "https://urs.earthdata.nasa.gov/oauth/authorize".to_string(),
            token_url: "https://urs.earthdata.nasa.gov/oauth/token".to_string(),
            profile_url: None,
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Point both OAuth endpoints at a different provider base URL.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.authorize_url = format!("{base}/oauth/authorize");
        self.token_url = format!("{base}/oauth/token");
        self
    }

    pub fn with_profile_url(mut self, url: impl Into<String>) -> Self {
        self.profile_url = Some(url.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    uid: String,
    #[serde(default, alias = "email_address")]
    email: Option<String>,
    #[serde(default, alias = "name")]
    display_name: Option<String>,
}

impl From<ProfileResponse> for UserInfo {
    fn from(profile: ProfileResponse) -> Self {
        UserInfo {
            uid: profile.uid,
            email: profile.email,
            display_name: profile.display_name,
        }
    }
}

/// Owns the OAuth session: token exchange, refresh, persistence, and the
/// bearer-authenticated request path used by the data adapters.
///
/// The token lives behind an `RwLock`. Readers take the cheap path while the
/// token is valid; an expired token funnels every caller through the write
/// lock, where a double-check ensures only the first of them performs the
/// network refresh and the rest reuse its result.
pub struct CredentialStore {
    config: OAuthConfig,
    http: Client,
    token: RwLock<Option<AccessToken>>,
    store: Arc<dyn TokenStore>,
    events: AuthEventBus,
}

impl CredentialStore {
    /// Build a store, restoring any persisted session. A document that fails
    /// to load is discarded with a warning and the store starts signed out.
    pub fn new(config: OAuthConfig, store: Arc<dyn TokenStore>) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        let restored = match store.load() {
            Ok(token) => token,
            Err(e) => {
                warn!("Discarding unreadable persisted session: {e}");
                None
            }
        };
        if let Some(token) = &restored {
            debug!("Restored session, token valid until {}", token.expires_at);
        }

        CredentialStore {
            config,
            http,
            token: RwLock::new(restored),
            store,
            events: AuthEventBus::default(),
        }
    }

    pub fn events(&self) -> &AuthEventBus {
        &self.events
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// URL to open in the user's browser to begin the sign-in flow. The
    /// caller generates `state` and must pass the same value back to
    /// [`exchange_code`](Self::exchange_code).
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&state={}",
            self.config.authorize_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(state),
        )
    }

    /// True while a non-expired token is held. Makes no network calls.
    pub async fn is_authenticated(&self) -> bool {
        let guard = self.token.read().await;
        guard.as_ref().map(|t| !t.is_expired()).unwrap_or(false)
    }

    pub async fn current_user(&self) -> Option<UserInfo> {
        let guard = self.token.read().await;
        guard.as_ref().and_then(|t| t.user.clone())
    }

    /// Complete the authorization-code flow after the provider redirect.
    ///
    /// The echoed state is compared byte-for-byte against the expected value
    /// before any network traffic; a mismatch aborts the exchange.
    pub async fn exchange_code(
        &self,
        code: &str,
        returned_state: &str,
        expected_state: &str,
    ) -> AuthResult<()> {
        if returned_state.as_bytes() != expected_state.as_bytes() {
            warn!("Rejecting OAuth callback with mismatched state");
            return Err(AuthError::StateMismatch);
        }

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("client_id", self.config.client_id.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::exchange_failed(
                status.as_u16(),
                truncate_body(&body),
            ));
        }

        let text = response.text().await?;
        let body: TokenEndpointResponse = serde_json::from_str(&text)?;
        let refresh_token = body.refresh_token.ok_or_else(|| {
            AuthError::exchange_failed(status.as_u16(), "token endpoint omitted refresh_token")
        })?;

        let mut token = AccessToken {
            access_token: body.access_token,
            refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(body.expires_in),
            user: None,
        };
        token.user = self.fetch_profile(&token.access_token).await;

        {
            let mut guard = self.token.write().await;
            *guard = Some(token.clone());
        }
        if let Err(e) = self.store.save(&token) {
            warn!("Failed to persist session: {e}");
        }
        info!("Signed in, token valid until {}", token.expires_at);
        self.events.publish(AuthEvent::SignedIn { user: token.user });
        Ok(())
    }

    /// Current token if one is valid, refreshing an expired one at most once.
    /// Returns `None` when signed out or when the refresh fails (which also
    /// signs the session out).
    pub async fn get_valid_token(&self) -> Option<AccessToken> {
        {
            let guard = self.token.read().await;
            match guard.as_ref() {
                Some(token) if !token.is_expired() => return Some(token.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: re-check under the write lock since another task may have
        // refreshed while we waited for it.
        let mut guard = self.token.write().await;
        match guard.as_ref() {
            Some(token) if !token.is_expired() => Some(token.clone()),
            Some(_) => self.refresh_locked(&mut guard).await.ok(),
            None => None,
        }
    }

    /// Refresh the token unless a concurrent caller already left a fresh one
    /// behind. Any failure clears the session.
    pub async fn refresh(&self) -> AuthResult<()> {
        let mut guard = self.token.write().await;
        if let Some(token) = guard.as_ref() {
            if !token.expires_within(chrono::Duration::seconds(REFRESH_MARGIN_SECS)) {
                debug!("Skipping refresh, token is still fresh");
                return Ok(());
            }
        }
        self.refresh_locked(&mut guard).await.map(|_| ())
    }

    /// Send `request` with a bearer token, refreshing and retrying exactly
    /// once on a 401. Any other status is returned to the caller untouched.
    pub async fn authenticated_fetch(&self, request: RequestBuilder) -> AuthResult<Response> {
        let retry = request.try_clone();
        let token = self
            .get_valid_token()
            .await
            .ok_or(AuthError::NotAuthenticated)?;

        let response = request.bearer_auth(&token.access_token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let retry = retry.ok_or_else(|| {
            AuthError::NonRetryableRequest("body cannot be cloned for the retry".to_string())
        })?;
        debug!("Request returned 401, refreshing token and retrying once");
        let fresh = self.refresh_after_unauthorized(&token.access_token).await?;
        let response = retry.bearer_auth(&fresh.access_token).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(AuthError::Unauthorized);
        }
        Ok(response)
    }

    /// Clear the session everywhere and announce it.
    pub async fn sign_out(&self) {
        {
            let mut guard = self.token.write().await;
            *guard = None;
        }
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear persisted session: {e}");
        }
        info!("Signed out");
        self.events.publish(AuthEvent::SignedOut {
            reason: SignOutReason::UserRequested,
        });
    }

    async fn fetch_profile(&self, access_token: &str) -> Option<UserInfo> {
        let url = self.config.profile_url.as_ref()?;
        match self.http.get(url).bearer_auth(access_token).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<ProfileResponse>().await {
                    Ok(profile) => Some(profile.into()),
                    Err(e) => {
                        warn!("Could not parse profile response: {e}");
                        None
                    }
                }
            }
            Ok(response) => {
                warn!("Profile request returned {}", response.status());
                None
            }
            Err(e) => {
                warn!("Profile request failed: {e}");
                None
            }
        }
    }

    /// Refresh for the 401 path, keyed on the token the failed request used.
    /// If the current token is already a different, live one, a concurrent
    /// caller refreshed first and we reuse it.
    async fn refresh_after_unauthorized(&self, seen_access_token: &str) -> AuthResult<AccessToken> {
        let mut guard = self.token.write().await;
        if let Some(existing) = guard.as_ref() {
            if existing.access_token != seen_access_token && !existing.is_expired() {
                return Ok(existing.clone());
            }
        }
        self.refresh_locked(&mut guard).await
    }

    /// Perform the refresh grant while holding the write lock. The stored
    /// token is replaced in one assignment, so readers never observe a
    /// half-updated session.
    async fn refresh_locked(
        &self,
        guard: &mut Option<AccessToken>,
    ) -> AuthResult<AccessToken> {
        let current = guard.as_ref().ok_or(AuthError::NotAuthenticated)?;
        let refresh_token = current.refresh_token.clone();
        let user = current.user.clone();

        let result = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", self.config.client_id.as_str()),
            ])
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => return self.fail_refresh(guard, format!("transport: {e}")),
        };
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return self.fail_refresh(guard, format!("{status}: {}", truncate_body(&body)));
        }
        let body: TokenEndpointResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => return self.fail_refresh(guard, format!("malformed body: {e}")),
        };

        let token = AccessToken {
            access_token: body.access_token,
            refresh_token: body.refresh_token.unwrap_or(refresh_token),
            expires_at: Utc::now() + chrono::Duration::seconds(body.expires_in),
            user,
        };
        *guard = Some(token.clone());
        if let Err(e) = self.store.save(&token) {
            warn!("Failed to persist refreshed session: {e}");
        }
        info!("Access token refreshed, valid until {}", token.expires_at);
        self.events.publish(AuthEvent::TokenRefreshed);
        Ok(token)
    }

    /// A failed refresh ends the session: drop the token, clear the disk
    /// copy, tell everyone.
    fn fail_refresh(
        &self,
        guard: &mut Option<AccessToken>,
        message: String,
    ) -> AuthResult<AccessToken> {
        warn!("Token refresh failed, signing out: {message}");
        *guard = None;
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear persisted session: {e}");
        }
        self.events.publish(AuthEvent::SignedOut {
            reason: SignOutReason::RefreshFailed,
        });
        Err(AuthError::refresh_failed(message))
    }

    async fn needs_refresh(&self) -> bool {
        let guard = self.token.read().await;
        guard
            .as_ref()
            .map(|t| t.expires_within(chrono::Duration::seconds(REFRESH_MARGIN_SECS)))
            .unwrap_or(false)
    }
}

/// Keep refreshing the token in the background until the handle is dropped
/// or aborted. Failures are logged; a failed refresh already signs the
/// session out, so the watchdog simply idles until the next sign-in.
/// `WATCHDOG_INTERVAL` is the production cadence.
pub fn spawn_expiry_watchdog(
    store: Arc<CredentialStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if store.needs_refresh().await {
                if let Err(e) = store.refresh().await {
                    warn!("Background token refresh failed: {e}");
                }
            }
        }
    })
}

fn truncate_body(body: &str) -> String {
    body.chars().take(200).collect()
}
