//! Distributed rate limiting over a shared counter store.
//!
//! The check is a single atomic increment-with-expiry against redis, so
//! it is correct across workers and across hosts. When the store is
//! unreachable the configured fallback mode decides between failing
//! closed (`strict`), failing open (`degraded`) and a process-local
//! counter (`local`, development only).
//!
//! Every decision emits one structured event line for audit tooling.

use anyhow::bail;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Behavior when the backing store is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimiterMode {
	/// Fail closed: callers surface a 503-equivalent.
	Strict,
	/// Fail open with a warning event.
	Degraded,
	/// Per-process in-memory counters. Not cross-worker safe.
	#[default]
	Local,
}

impl FromStr for LimiterMode {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s.to_ascii_lowercase().as_str() {
			"strict" => LimiterMode::Strict,
			"degraded" => LimiterMode::Degraded,
			"local" => LimiterMode::Local,
			_ => bail!("unknown rate limiter mode '{s}' (expected strict, degraded or local)"),
		})
	}
}

#[derive(Debug, Error)]
pub enum LimiterError {
	#[error("rate limiting service temporarily unavailable")]
	ServiceUnavailable,
}

struct LocalCounter {
	count: u64,
	expires_at: Instant,
}

pub struct RateLimiter {
	mode: LimiterMode,
	client: Option<redis::Client>,
	connection: tokio::sync::Mutex<Option<redis::aio::ConnectionManager>>,
	local: Mutex<HashMap<String, LocalCounter>>,
}

impl RateLimiter {
	/// Builds a limiter. Without a store URL every mode degenerates to
	/// its no-redis behavior immediately.
	pub fn new(redis_url: Option<&str>, mode: LimiterMode) -> anyhow::Result<RateLimiter> {
		let client = match redis_url {
			Some(url) => Some(redis::Client::open(url)?),
			None => None,
		};
		Ok(RateLimiter {
			mode,
			client,
			connection: tokio::sync::Mutex::new(None),
			local: Mutex::new(HashMap::new()),
		})
	}

	/// Returns whether the request under `key` is within `limit` per
	/// `window`. The decision at exactly `limit` is allow.
	pub async fn check(&self, key: &str, limit: u64, window: Duration) -> Result<bool, LimiterError> {
		match self.check_distributed(key, limit, window).await {
			Ok(allowed) => Ok(allowed),
			Err(e) => {
				log::warn!("rate limiter store unavailable: {e}");
				self.fallback(key, limit, window)
			}
		}
	}

	async fn check_distributed(&self, key: &str, limit: u64, window: Duration) -> anyhow::Result<bool> {
		let Some(client) = &self.client else {
			bail!("no backing store configured");
		};

		let mut guard = self.connection.lock().await;
		if guard.is_none() {
			*guard = Some(client.get_connection_manager().await?);
		}
		let mut conn = guard.as_ref().expect("connection just established").clone();
		drop(guard);

		let (current,): (u64,) = redis::pipe()
			.atomic()
			.incr(key, 1u64)
			.expire(key, window.as_secs() as i64)
			.ignore()
			.query_async(&mut conn)
			.await?;

		let allowed = current <= limit;
		emit_event(key, allowed, current, limit, window);
		Ok(allowed)
	}

	fn fallback(&self, key: &str, limit: u64, window: Duration) -> Result<bool, LimiterError> {
		match self.mode {
			LimiterMode::Strict => {
				log::error!("rate limiter failing closed for '{key}' (strict mode)");
				Err(LimiterError::ServiceUnavailable)
			}
			LimiterMode::Degraded => {
				log::warn!("rate limiting degraded for '{key}': allowing without a counter");
				emit_event(key, true, 0, limit, window);
				Ok(true)
			}
			LimiterMode::Local => Ok(self.check_local(key, limit, window)),
		}
	}

	fn check_local(&self, key: &str, limit: u64, window: Duration) -> bool {
		let now = Instant::now();
		let mut counters = self.local.lock().expect("local limiter poisoned");
		counters.retain(|_, c| c.expires_at > now);

		let counter = counters.entry(key.to_string()).or_insert(LocalCounter {
			count: 0,
			expires_at: now + window,
		});
		counter.count += 1;
		let allowed = counter.count <= limit;
		emit_event(key, allowed, counter.count, limit, window);
		allowed
	}
}

/// One structured line per decision:
/// `rate_limit key=<k> allowed=<bool> current=<n> limit=<n> window=<s>s`.
fn emit_event(key: &str, allowed: bool, current: u64, limit: u64, window: Duration) {
	log::info!(
		target: "demserve::events",
		"rate_limit key={key} allowed={allowed} current={current} limit={limit} window={}s",
		window.as_secs()
	);
	if !allowed {
		log::warn!("rate limit exceeded for '{key}': {current}/{limit} in {}s", window.as_secs());
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn local_limiter() -> RateLimiter {
		RateLimiter::new(None, LimiterMode::Local).unwrap()
	}

	#[tokio::test]
	async fn local_mode_counts_per_key() {
		let limiter = local_limiter();
		for _ in 0..3 {
			assert!(limiter.check("a", 3, Duration::from_secs(60)).await.unwrap());
		}
		// Decision flips only past the limit; current == limit allows.
		assert!(!limiter.check("a", 3, Duration::from_secs(60)).await.unwrap());
		// Other keys are unaffected.
		assert!(limiter.check("b", 3, Duration::from_secs(60)).await.unwrap());
	}

	#[tokio::test]
	async fn local_windows_expire() {
		let limiter = local_limiter();
		assert!(limiter.check("k", 1, Duration::from_millis(10)).await.unwrap());
		assert!(!limiter.check("k", 1, Duration::from_millis(10)).await.unwrap());
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert!(limiter.check("k", 1, Duration::from_millis(10)).await.unwrap());
	}

	#[tokio::test]
	async fn strict_mode_fails_closed_without_store() {
		let limiter = RateLimiter::new(None, LimiterMode::Strict).unwrap();
		let err = limiter.check("k", 1, Duration::from_secs(1)).await.unwrap_err();
		assert!(matches!(err, LimiterError::ServiceUnavailable));
	}

	#[tokio::test]
	async fn degraded_mode_fails_open_without_store() {
		let limiter = RateLimiter::new(None, LimiterMode::Degraded).unwrap();
		for _ in 0..10 {
			assert!(limiter.check("k", 1, Duration::from_secs(1)).await.unwrap());
		}
	}

	#[test]
	fn mode_parsing() {
		assert_eq!("strict".parse::<LimiterMode>().unwrap(), LimiterMode::Strict);
		assert_eq!("DEGRADED".parse::<LimiterMode>().unwrap(), LimiterMode::Degraded);
		assert!("open".parse::<LimiterMode>().is_err());
	}
}
