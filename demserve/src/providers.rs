//! External elevation HTTP providers.
//!
//! Providers form a fixed ordered chain that the orchestrator walks when
//! the tile corpus cannot answer. Each provider wraps its requests in a
//! rate-limit check against the shared limiter and reports rate-limit
//! signals distinctly so callers can apply a cool-off.

use crate::catalog::SourceDescriptor;
use crate::limiter::{LimiterError, RateLimiter};
use crate::settings::Settings;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// How a provider request failed.
#[derive(Debug, Error)]
pub enum ProviderError {
	/// The provider (or our own quota) signalled exhaustion. The caller
	/// skips this provider for a cool-off period.
	#[error("provider rate limited")]
	RateLimited,

	#[error("provider returned HTTP {0}")]
	Http(u16),

	#[error("provider request failed: {0}")]
	Transport(String),

	#[error("provider response unparseable: {0}")]
	BadResponse(String),
}

/// One external elevation service in the fallback chain.
#[async_trait]
pub trait ElevationProvider: Send + Sync {
	fn name(&self) -> &str;

	/// Consults the shared limiter for this provider's own quotas.
	/// `Ok(false)` means our budget for it is exhausted.
	async fn check_rate_limit(&self, limiter: &RateLimiter) -> Result<bool, LimiterError>;

	/// Fetches elevations for the given points, preserving order.
	/// `None` entries are points the provider has no data for.
	async fn fetch_elevations(
		&self,
		points: &[(f64, f64)],
		timeout: Duration,
	) -> Result<Vec<Option<f64>>, ProviderError>;
}

/// Wire dialects of the supported public APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStyle {
	/// `?locations=lat,lng|lat,lng&key=...` with a `status` field
	/// (Google Elevation API and compatible services).
	Google,
	/// `?locations=lat,lon|lat,lon` (Open Topo Data and compatibles).
	OpenTopoData,
}

/// HTTP-backed provider configured from a catalog descriptor.
pub struct HttpProvider {
	id: String,
	endpoint: String,
	style: ProviderStyle,
	api_key: Option<String>,
	daily_quota: u64,
	per_second: u64,
	client: reqwest::Client,
}

impl HttpProvider {
	/// Builds a provider from its catalog entry, pulling the API key and
	/// quota overrides from the environment.
	pub fn from_descriptor(descriptor: &SourceDescriptor) -> Result<HttpProvider> {
		let style = match descriptor.meta_str("style") {
			Some("google") => ProviderStyle::Google,
			Some("opentopodata") | None => ProviderStyle::OpenTopoData,
			Some(other) => anyhow::bail!("provider '{}' has unknown style '{other}'", descriptor.id),
		};
		let api_key = descriptor
			.meta_str("api_key_env")
			.and_then(|name| std::env::var(name).ok())
			.filter(|k| !k.is_empty());
		let daily_quota = Settings::provider_override(&descriptor.id, "DAILY_QUOTA")
			.or_else(|| descriptor.meta_u64("daily_quota"))
			.unwrap_or(1000);
		let per_second = Settings::provider_override(&descriptor.id, "PER_SECOND")
			.or_else(|| descriptor.meta_u64("per_second"))
			.unwrap_or(10);

		Ok(HttpProvider {
			id: descriptor.id.clone(),
			endpoint: descriptor.path.clone(),
			style,
			api_key,
			daily_quota,
			per_second,
			client: reqwest::Client::builder()
				.tcp_keepalive(Duration::from_secs(600))
				.build()?,
		})
	}
}

#[derive(Deserialize)]
struct WireResponse {
	status: Option<String>,
	#[serde(default)]
	results: Vec<WireResult>,
}

#[derive(Deserialize)]
struct WireResult {
	elevation: Option<f64>,
}

#[async_trait]
impl ElevationProvider for HttpProvider {
	fn name(&self) -> &str {
		&self.id
	}

	async fn check_rate_limit(&self, limiter: &RateLimiter) -> Result<bool, LimiterError> {
		let per_second = limiter
			.check(&format!("provider:{}:rps", self.id), self.per_second, Duration::from_secs(1))
			.await?;
		if !per_second {
			return Ok(false);
		}
		limiter
			.check(
				&format!("provider:{}:daily", self.id),
				self.daily_quota,
				Duration::from_secs(86_400),
			)
			.await
	}

	async fn fetch_elevations(
		&self,
		points: &[(f64, f64)],
		timeout: Duration,
	) -> Result<Vec<Option<f64>>, ProviderError> {
		if points.is_empty() {
			return Ok(Vec::new());
		}

		let locations = points
			.iter()
			.map(|(lat, lon)| format!("{lat},{lon}"))
			.collect::<Vec<_>>()
			.join("|");
		let mut request = self
			.client
			.get(&self.endpoint)
			.query(&[("locations", locations.as_str())])
			.timeout(timeout);
		if let (ProviderStyle::Google, Some(key)) = (self.style, &self.api_key) {
			request = request.query(&[("key", key.as_str())]);
		}

		let response = request
			.send()
			.await
			.map_err(|e| ProviderError::Transport(e.to_string()))?;

		match response.status().as_u16() {
			200 => {}
			429 => return Err(ProviderError::RateLimited),
			status => return Err(ProviderError::Http(status)),
		}

		let body: WireResponse = response
			.json()
			.await
			.map_err(|e| ProviderError::BadResponse(e.to_string()))?;

		match body.status.as_deref() {
			None | Some("OK") => {}
			Some("OVER_QUERY_LIMIT") => return Err(ProviderError::RateLimited),
			Some(status) => return Err(ProviderError::BadResponse(format!("status '{status}'"))),
		}

		if body.results.len() != points.len() {
			return Err(ProviderError::BadResponse(format!(
				"{} results for {} points",
				body.results.len(),
				points.len()
			)));
		}
		Ok(body.results.into_iter().map(|r| r.elevation).collect())
	}
}

/// Builds the ordered provider chain from the catalog's enabled
/// `http-api` sources.
pub fn provider_chain(descriptors: &[&SourceDescriptor]) -> Result<Vec<Box<dyn ElevationProvider>>> {
	let mut chain: Vec<Box<dyn ElevationProvider>> = Vec::new();
	for descriptor in descriptors {
		chain.push(Box::new(HttpProvider::from_descriptor(descriptor)?));
		log::info!("registered elevation provider '{}'", descriptor.id);
	}
	Ok(chain)
}
