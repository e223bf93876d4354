//! Per-provider rate-limit state.
//!
//! Each provider owns one [`Cooldown`]. Once a registry signals that the
//! caller is over its quota, the provider disables itself until a deadline
//! and refuses further calls without touching the network. The state lives
//! for the process lifetime only.

use chrono::{DateTime, TimeDelta, Utc};
use modsync_common::ProviderDescriptor;

use super::ProviderError;
use crate::http::RegistryResponse;

/// Remaining-quota header reported by quota-aware registries.
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Quota-size header reported by quota-aware registries.
pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
/// Quota reset time (Unix seconds) reported by quota-aware registries.
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// A "disabled until" timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cooldown {
    disabled_until: Option<DateTime<Utc>>,
}

impl Cooldown {
    /// Check whether a call may proceed at `now`.
    ///
    /// A cooldown whose deadline has passed is cleared, re-enabling the
    /// provider.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::RateLimited`] while the cooldown is active.
    pub fn check(
        &mut self,
        descriptor: &ProviderDescriptor,
        now: DateTime<Utc>,
    ) -> Result<(), ProviderError> {
        match self.disabled_until {
            Some(until) if now > until => {
                log::info!("{} re-enabled after rate-limit cooldown", descriptor.name);
                self.disabled_until = None;
                Ok(())
            }
            Some(until) => Err(ProviderError::RateLimited {
                provider: descriptor.name.clone(),
                until,
            }),
            None => Ok(()),
        }
    }

    /// Disable the provider until `until`.
    pub fn engage(&mut self, until: DateTime<Utc>) {
        self.disabled_until = Some(until);
    }

    /// Deadline of the active cooldown, if any.
    #[must_use]
    pub const fn disabled_until(&self) -> Option<DateTime<Utc>> {
        self.disabled_until
    }
}

/// Quota information parsed from response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Requests left in the current window.
    pub remaining: Option<u64>,
    /// Window size.
    pub limit: Option<u64>,
    /// When the window resets.
    pub reset: Option<DateTime<Utc>>,
}

impl Quota {
    /// Read quota headers from a response; absent or malformed headers are
    /// `None`.
    #[must_use]
    pub fn from_response(response: &RegistryResponse) -> Self {
        let number = |name: &str| {
            response
                .header(name)
                .and_then(|value| value.trim().parse::<u64>().ok())
        };
        let reset = number(RESET_HEADER)
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        Self {
            remaining: number(REMAINING_HEADER),
            limit: number(LIMIT_HEADER),
            reset,
        }
    }

    /// Returns true when the registry reports an exhausted quota.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Deadline to cool down until: the reported reset time when it lies in
    /// the future, otherwise `now + fallback`.
    #[must_use]
    pub fn cooldown_until(&self, now: DateTime<Utc>, fallback: TimeDelta) -> DateTime<Utc> {
        self.reset
            .filter(|reset| *reset > now)
            .unwrap_or_else(|| now + fallback)
    }
}

/// Returns true for statuses that are definitive rate-limit signals.
#[must_use]
pub const fn is_rate_limit_status(status: u16) -> bool {
    matches!(status, 403 | 429)
}
