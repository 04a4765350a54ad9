//! Rate limiting for drop-relay.
//!
//! Peers are browsers reaching the relay directly, so limits are keyed by
//! remote IP address:
//! - **WebSocket upgrades** per IP per minute
//! - **Session creations** per IP per minute
//!
//! Both use the governor crate's keyed rate limiters backed by DashMap.

use crate::config::LimitsConfig;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Type alias for a keyed rate limiter using DashMap.
type KeyedLimiter<K> = RateLimiter<
    K,
    dashmap::DashMap<K, InMemoryState>,
    DefaultClock,
    NoOpMiddleware<governor::clock::QuantaInstant>,
>;

/// Rate limiters for the relay server.
#[derive(Clone)]
pub struct RateLimits {
    /// Limits WebSocket upgrades per IP.
    connection_limiter: Arc<KeyedLimiter<IpAddr>>,
    /// Limits `POST /sessions` per IP.
    session_limiter: Arc<KeyedLimiter<IpAddr>>,
}

impl std::fmt::Debug for RateLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimits")
            .field("connection_limiter", &"KeyedLimiter<IpAddr>")
            .field("session_limiter", &"KeyedLimiter<IpAddr>")
            .finish()
    }
}

/// A zero quota is treated as one per minute rather than rejected.
fn per_minute(n: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN))
}

impl RateLimits {
    /// Create rate limiters from configuration.
    pub fn new(config: &LimitsConfig) -> Self {
        Self {
            connection_limiter: Arc::new(RateLimiter::keyed(per_minute(
                config.connections_per_minute,
            ))),
            session_limiter: Arc::new(RateLimiter::keyed(per_minute(config.sessions_per_minute))),
        }
    }

    /// Check if a WebSocket upgrade from `ip` is allowed.
    pub fn check_connection(&self, ip: IpAddr) -> Result<(), RateLimitError> {
        self.connection_limiter
            .check_key(&ip)
            .map_err(|_| RateLimitError::ConnectionLimitExceeded)
    }

    /// Check if `ip` may create another session.
    pub fn check_session(&self, ip: IpAddr) -> Result<(), RateLimitError> {
        self.session_limiter
            .check_key(&ip)
            .map_err(|_| RateLimitError::SessionLimitExceeded)
    }

    /// Number of tracked IPs across both limiters (for metrics).
    pub fn tracked_keys(&self) -> usize {
        self.connection_limiter.len() + self.session_limiter.len()
    }

    /// Evict entries whose cells have fully recharged.
    ///
    /// Called from the sweep task so idle IPs do not accumulate.
    pub fn shrink(&self) {
        self.connection_limiter.retain_recent();
        self.session_limiter.retain_recent();
    }
}

/// Refusal from a rate limiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    /// Too many WebSocket upgrades from this IP.
    #[error("connection rate limit exceeded")]
    ConnectionLimitExceeded,
    /// Too many sessions created from this IP.
    #[error("session rate limit exceeded")]
    SessionLimitExceeded,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(connections: u32, sessions: u32) -> LimitsConfig {
        LimitsConfig {
            connections_per_minute: connections,
            sessions_per_minute: sessions,
            ..LimitsConfig::default()
        }
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([198, 51, 100, last])
    }

    #[test]
    fn connection_limit_allows_within_quota() {
        let limits = RateLimits::new(&config(5, 100));

        for _ in 0..5 {
            assert!(limits.check_connection(ip(1)).is_ok());
        }
        assert_eq!(
            limits.check_connection(ip(1)),
            Err(RateLimitError::ConnectionLimitExceeded)
        );
    }

    #[test]
    fn session_limit_allows_within_quota() {
        let limits = RateLimits::new(&config(100, 3));

        for _ in 0..3 {
            assert!(limits.check_session(ip(1)).is_ok());
        }
        assert_eq!(
            limits.check_session(ip(1)),
            Err(RateLimitError::SessionLimitExceeded)
        );
        // Upgrades are counted separately.
        assert!(limits.check_connection(ip(1)).is_ok());
    }

    #[test]
    fn different_ips_have_independent_limits() {
        let limits = RateLimits::new(&config(2, 2));

        assert!(limits.check_connection(ip(1)).is_ok());
        assert!(limits.check_connection(ip(1)).is_ok());
        assert!(limits.check_connection(ip(1)).is_err());

        assert!(limits.check_connection(ip(2)).is_ok());
        assert!(limits.check_connection(ip(2)).is_ok());
        assert!(limits.check_connection(ip(2)).is_err());
        assert_eq!(limits.tracked_keys(), 2);
    }

    #[test]
    fn zero_quota_still_admits_one() {
        let limits = RateLimits::new(&config(0, 0));
        assert!(limits.check_connection(ip(3)).is_ok());
        assert!(limits.check_connection(ip(3)).is_err());
    }

    #[test]
    fn rate_limit_error_display() {
        assert_eq!(
            RateLimitError::ConnectionLimitExceeded.to_string(),
            "connection rate limit exceeded"
        );
        assert_eq!(
            RateLimitError::SessionLimitExceeded.to_string(),
            "session rate limit exceeded"
        );
    }

    #[test]
    fn shrink_does_not_panic() {
        let limits = RateLimits::new(&config(5, 5));
        let _ = limits.check_connection(ip(1));
        let _ = limits.check_session(ip(2));
        limits.shrink();
        assert!(format!("{:?}", limits).contains("RateLimits"));
    }
}
