//! Per-user fixed window command counter.
//!
//! The limiter has no notion of roles: deciding who bypasses it is up to the
//! caller.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Duration, Utc};

use crate::{Clock, EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Window length in milliseconds.
    pub window_ms: i64,
    pub max_per_window: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_per_window: 10,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct RateWindow {
    count: u32,
    reset_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<String, RateWindow>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts one command for `user`, failing with
    /// [`EngineError::RateLimited`] once the window is full.
    pub fn check(&self, user: &str) -> ResultEngine<()> {
        if self.allow(user) {
            Ok(())
        } else {
            Err(EngineError::RateLimited)
        }
    }

    /// Counts one command for `user` and returns whether it is allowed.
    pub fn allow(&self, user: &str) -> bool {
        let now = self.clock.now();
        let mut windows = self.windows();

        match windows.get_mut(user) {
            Some(window) if now <= window.reset_at => {
                if window.count >= self.config.max_per_window {
                    tracing::debug!("rate limit hit for {user}");
                    return false;
                }
                window.count += 1;
                true
            }
            _ => {
                windows.insert(
                    user.to_string(),
                    RateWindow {
                        count: 1,
                        reset_at: now + Duration::milliseconds(self.config.window_ms),
                    },
                );
                true
            }
        }
    }

    /// Drops windows that already expired. They would be reset lazily anyway;
    /// this only bounds memory for users that stopped sending commands.
    pub fn prune(&self) -> usize {
        let now = self.clock.now();
        let mut windows = self.windows();
        let before = windows.len();
        windows.retain(|_, window| now <= window.reset_at);
        before - windows.len()
    }
}
