//! Rate limiter for failed logins
//!
//! Tracks failed login attempts per client IP. After a configurable number of
//! failures inside the window, the IP is blocked for a configurable duration.
//! Entries whose block and window have both run out are swept while new
//! failures are recorded, so the table only holds recently active addresses.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Configuration for the rate limiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum number of failed attempts before blocking
    pub max_failures: u32,

    /// Duration to block an IP after max failures
    pub block_duration: Duration,

    /// Window in which failures accumulate; older failures are forgotten
    pub window_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_failures: 10,
            block_duration: Duration::from_secs(300),
            window_duration: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone)]
struct FailureEntry {
    count: u32,
    window_start: Instant,
    blocked_at: Option<Instant>,
}

impl FailureEntry {
    fn empty(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            blocked_at: None,
        }
    }
}

#[derive(Debug)]
struct FailureTable {
    entries: HashMap<IpAddr, FailureEntry>,
    last_sweep: Instant,
}

/// Thread-safe failed-login tracker keyed by client IP
pub struct RateLimiter {
    config: RateLimitConfig,
    table: RwLock<FailureTable>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            table: RwLock::new(FailureTable {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    // A panic while holding the lock leaves the map itself intact.
    fn read(&self) -> RwLockReadGuard<'_, FailureTable> {
        self.table.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, FailureTable> {
        self.table.write().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, entry: &FailureEntry, now: Instant) -> bool {
        match entry.blocked_at {
            Some(blocked_at) => now.duration_since(blocked_at) >= self.config.block_duration,
            None => now.duration_since(entry.window_start) >= self.config.window_duration,
        }
    }

    // At most one full pass per shortest expiry period.
    fn sweep_if_due(&self, table: &mut FailureTable, now: Instant) {
        let interval = self.config.block_duration.min(self.config.window_duration);
        if now.duration_since(table.last_sweep) < interval {
            return;
        }

        let before = table.entries.len();
        table.entries.retain(|_, entry| !self.is_expired(entry, now));
        table.last_sweep = now;

        let removed = before - table.entries.len();
        if removed > 0 {
            tracing::debug!(
                removed,
                tracked = table.entries.len(),
                "Expired login failures swept"
            );
        }
    }

    /// Record a failed login for an IP
    ///
    /// Returns `true` if the IP is now blocked
    pub fn record_failure(&self, ip: IpAddr) -> bool {
        let mut table = self.write();
        let now = Instant::now();

        self.sweep_if_due(&mut table, now);

        let entry = table
            .entries
            .entry(ip)
            .or_insert_with(|| FailureEntry::empty(now));

        if let Some(blocked_at) = entry.blocked_at {
            if now.duration_since(blocked_at) < self.config.block_duration {
                return true;
            }
            *entry = FailureEntry::empty(now);
        } else if now.duration_since(entry.window_start) >= self.config.window_duration {
            *entry = FailureEntry::empty(now);
        }

        entry.count += 1;

        if entry.count >= self.config.max_failures {
            entry.blocked_at = Some(now);
            true
        } else {
            false
        }
    }

    /// Forget an IP's failures (after a successful login)
    pub fn reset(&self, ip: IpAddr) {
        self.write().entries.remove(&ip);
    }

    /// Number of failures for an IP in the current window
    pub fn failure_count(&self, ip: IpAddr) -> u32 {
        let table = self.read();

        match table.entries.get(&ip) {
            Some(entry)
                if entry.blocked_at.is_some()
                    || entry.window_start.elapsed() < self.config.window_duration =>
            {
                entry.count
            }
            _ => 0,
        }
    }

    /// Remaining block time for an IP, `None` if not blocked
    pub fn remaining_block_time(&self, ip: IpAddr) -> Option<Duration> {
        let table = self.read();

        let blocked_at = table.entries.get(&ip)?.blocked_at?;
        self.config
            .block_duration
            .checked_sub(blocked_at.elapsed())
            .filter(|remaining| !remaining.is_zero())
    }

    #[cfg(test)]
    pub(crate) fn tracked_ips_count(&self) -> usize {
        self.read().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn test_ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))
    }

    fn test_ip2() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2))
    }

    fn is_blocked(limiter: &RateLimiter, ip: IpAddr) -> bool {
        limiter.remaining_block_time(ip).is_some()
    }

    fn limiter(max_failures: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_failures,
            block_duration: Duration::from_secs(60),
            window_duration: Duration::from_secs(120),
        })
    }

    // Test 1: New rate limiter is empty
    #[test]
    fn test_new_rate_limiter_is_empty() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        assert_eq!(limiter.tracked_ips_count(), 0);
    }

    // Test 2: Every failure counts, including the first
    #[test]
    fn test_record_failure_increments_count() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let ip = test_ip();

        limiter.record_failure(ip);
        assert_eq!(limiter.failure_count(ip), 1);

        limiter.record_failure(ip);
        assert_eq!(limiter.failure_count(ip), 2);
    }

    // Test 3: Blocked exactly at max failures
    #[test]
    fn test_blocked_at_max_failures() {
        let limiter = limiter(3);
        let ip = test_ip();

        assert!(!limiter.record_failure(ip));
        assert!(!limiter.record_failure(ip));
        assert!(!is_blocked(&limiter, ip));

        assert!(limiter.record_failure(ip));
        assert!(is_blocked(&limiter, ip));
    }

    // Test 4: Reset clears failures
    #[test]
    fn test_reset_clears_failures() {
        let limiter = limiter(3);
        let ip = test_ip();

        limiter.record_failure(ip);
        limiter.record_failure(ip);
        limiter.reset(ip);

        assert_eq!(limiter.failure_count(ip), 0);
        assert!(!is_blocked(&limiter, ip));
    }

    // Test 5: Different IPs are tracked separately
    #[test]
    fn test_different_ips_tracked_separately() {
        let limiter = limiter(2);

        limiter.record_failure(test_ip());
        limiter.record_failure(test_ip());

        assert!(is_blocked(&limiter, test_ip()));
        assert!(!is_blocked(&limiter, test_ip2()));
    }

    // Test 6: Remaining block time
    #[test]
    fn test_remaining_block_time() {
        let limiter = limiter(1);
        let ip = test_ip();

        assert!(limiter.remaining_block_time(ip).is_none());

        limiter.record_failure(ip);
        let remaining = limiter.remaining_block_time(ip).unwrap();
        assert!(remaining <= Duration::from_secs(60));
    }

    // Test 7: Failures on a blocked IP keep it blocked
    #[test]
    fn test_record_failure_on_blocked_ip() {
        let limiter = limiter(1);
        let ip = test_ip();

        assert!(limiter.record_failure(ip));
        assert!(limiter.record_failure(ip));
        assert!(is_blocked(&limiter, ip));
    }

    // Test 8: Block expires
    #[test]
    fn test_block_expires() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_failures: 1,
            block_duration: Duration::from_millis(1),
            window_duration: Duration::from_secs(120),
        });
        let ip = test_ip();

        limiter.record_failure(ip);
        std::thread::sleep(Duration::from_millis(5));

        assert!(!is_blocked(&limiter, ip));
    }

    // Test 9: Recording a failure sweeps expired entries
    #[test]
    fn test_record_failure_sweeps_expired_entries() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_failures: 10,
            block_duration: Duration::from_millis(1),
            window_duration: Duration::from_millis(1),
        });

        for last in 1..=200u8 {
            limiter.record_failure(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)));
        }
        assert!(limiter.tracked_ips_count() >= 1);

        std::thread::sleep(Duration::from_millis(5));
        limiter.record_failure(test_ip());
        assert_eq!(limiter.tracked_ips_count(), 1);
    }

    // Test 10: Live entries survive a sweep
    #[test]
    fn test_sweep_keeps_blocked_ips() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_failures: 1,
            block_duration: Duration::from_secs(60),
            window_duration: Duration::from_millis(1),
        });

        limiter.record_failure(test_ip());
        std::thread::sleep(Duration::from_millis(5));
        limiter.record_failure(test_ip2());

        assert!(is_blocked(&limiter, test_ip()));
        assert_eq!(limiter.tracked_ips_count(), 2);
    }

    // Test 11: Default config
    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_failures, 10);
        assert_eq!(config.block_duration, Duration::from_secs(300));
        assert_eq!(config.window_duration, Duration::from_secs(600));
    }

    // Test 12: Unknown IP
    #[test]
    fn test_unknown_ip() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        assert!(!is_blocked(&limiter, test_ip()));
        assert_eq!(limiter.failure_count(test_ip()), 0);
    }
}
