//! Fixed-window rate limiter for source adapters.
//!
//! Implements per-adapter request pacing with a counter that resets every
//! fixed window. A request over the window's quota waits for the next
//! window instead of failing, so requests are delayed, never dropped.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

use super::capabilities::RateQuota;

/// Request counting window for a single adapter.
#[derive(Debug)]
struct FetchWindow {
    /// When the current window started.
    started: Instant,
    /// Requests already granted in the current window.
    used: u32,
    quota: RateQuota,
}

impl FetchWindow {
    fn new(quota: RateQuota) -> Self {
        Self {
            started: Instant::now(),
            used: 0,
            quota,
        }
    }

    /// Start a fresh window when the current one has fully elapsed.
    fn roll_if_elapsed(&mut self) {
        if self.started.elapsed() >= self.quota.window {
            self.started = Instant::now();
            self.used = 0;
        }
    }

    /// Try to take one request slot immediately.
    /// Returns true if the window had room, false otherwise.
    fn try_acquire(&mut self) -> bool {
        self.roll_if_elapsed();

        if self.used < self.quota.max_requests {
            self.used += 1;
            true
        } else {
            false
        }
    }

    /// How long until the current window resets.
    fn time_until_reset(&self) -> Duration {
        self.quota.window.saturating_sub(self.started.elapsed())
    }

    fn remaining(&mut self) -> u32 {
        self.roll_if_elapsed();
        self.quota.max_requests.saturating_sub(self.used)
    }
}

/// Fixed-window rate limiter for multiple adapters.
///
/// Thread-safe limiter maintaining one counting window per adapter.
/// Windows are created on demand with default settings, or can be
/// pre-configured from each adapter's declared quota.
pub struct WindowRateLimiter {
    /// Per-adapter counting windows.
    windows: Mutex<HashMap<String, FetchWindow>>,
    /// Per-adapter quota overrides.
    quotas: Mutex<HashMap<String, RateQuota>>,
}

impl WindowRateLimiter {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            quotas: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the windows mutex, recovering from poison if necessary.
    ///
    /// For rate limiting it is safe to recover from a poisoned mutex: the
    /// worst case is slightly inaccurate pacing, which beats panicking.
    fn lock_windows(&self) -> MutexGuard<'_, HashMap<String, FetchWindow>> {
        self.windows.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter windows mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_quotas(&self) -> MutexGuard<'_, HashMap<String, RateQuota>> {
        self.quotas.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter quotas mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Configure the quota for a specific adapter.
    pub fn configure(&self, provider: &str, quota: RateQuota) {
        let mut quotas = self.lock_quotas();
        quotas.insert(provider.to_string(), quota);
        drop(quotas);

        // Restart the window if one already exists
        let mut windows = self.lock_windows();
        windows.remove(provider);
    }

    /// Take a request slot for the given adapter.
    ///
    /// Waits (asynchronously) until the window has room. If the adapter has
    /// no window yet, one is created from its configured or default quota.
    pub async fn acquire(&self, provider: &str) {
        loop {
            let wait_time = {
                let mut windows = self.lock_windows();

                let window = windows
                    .entry(provider.to_string())
                    .or_insert_with(|| self.create_window(provider));

                if window.try_acquire() {
                    debug!("Rate limiter: granted request slot for '{}'", provider);
                    return;
                }

                window.time_until_reset()
            };

            debug!(
                "Rate limiter: window exhausted for '{}', waiting {:?}",
                provider, wait_time
            );
            tokio::time::sleep(wait_time).await;
        }
    }

    /// Try to take a request slot without waiting.
    ///
    /// Returns true if the window had room, false if rate limited.
    pub fn try_acquire(&self, provider: &str) -> bool {
        let mut windows = self.lock_windows();

        let window = windows
            .entry(provider.to_string())
            .or_insert_with(|| self.create_window(provider));

        window.try_acquire()
    }

    /// Request slots left in the adapter's current window.
    pub fn remaining(&self, provider: &str) -> u32 {
        let mut windows = self.lock_windows();

        if let Some(window) = windows.get_mut(provider) {
            window.remaining()
        } else {
            self.quota_for(provider).max_requests
        }
    }

    /// Forget the adapter's current window, restoring its full quota.
    pub fn reset(&self, provider: &str) {
        let mut windows = self.lock_windows();
        windows.remove(provider);
    }

    fn create_window(&self, provider: &str) -> FetchWindow {
        FetchWindow::new(self.quota_for(provider))
    }

    fn quota_for(&self, provider: &str) -> RateQuota {
        let quotas = self.lock_quotas();
        quotas.get(provider).copied().unwrap_or_default()
    }
}

impl Default for WindowRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
