//! HTTP surface of the engine.
//!
//! Composition only: handlers live in [`handlers`], this module wires
//! them into a router, applies the global middleware stack (timeouts,
//! load shedding, concurrency limits) and owns the listen/shutdown
//! lifecycle.

pub mod handlers;

use crate::engine::Engine;
use anyhow::{Context, Result};
use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{BoxError, Router};
use std::sync::Arc;
use std::time::Duration;
use tower::{ServiceBuilder, limit::ConcurrencyLimitLayer, load_shed::LoadShedLayer, timeout::TimeoutLayer};

/// Requests beyond the orchestrator's own ceiling are cut off here.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(35);
const MAX_IN_FLIGHT: usize = 1024;

/// Builds the full application router.
#[must_use]
pub fn router(engine: Arc<Engine>) -> Router {
	Router::new()
		.route("/status", get(handlers::status))
		.route("/api/v1/health", get(handlers::health))
		.route(
			"/api/v1/elevation/point",
			get(handlers::point_query).post(handlers::point_body),
		)
		.route("/api/v1/elevation/points", post(handlers::points_body))
		.route("/api/v1/elevation/sources", get(handlers::sources))
		.route("/api/v1/campaigns", get(handlers::campaigns_list))
		.route("/api/v1/campaigns/in-bounds", get(handlers::campaigns_in_bounds))
		.route("/api/v1/campaigns/clusters", get(handlers::campaign_clusters))
		.route("/api/v1/campaigns/{id}", get(handlers::campaign_get))
		.layer(
			ServiceBuilder::new()
				.layer(HandleErrorLayer::new(middleware_error))
				.layer(LoadShedLayer::new())
				.layer(ConcurrencyLimitLayer::new(MAX_IN_FLIGHT))
				.layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
		)
		.with_state(engine)
}

async fn middleware_error(err: BoxError) -> (StatusCode, String) {
	if err.is::<tower::timeout::error::Elapsed>() {
		(StatusCode::REQUEST_TIMEOUT, "request timed out".to_string())
	} else if err.is::<tower::load_shed::error::Overloaded>() {
		(StatusCode::SERVICE_UNAVAILABLE, "server overloaded".to_string())
	} else {
		(StatusCode::INTERNAL_SERVER_ERROR, format!("unhandled error: {err}"))
	}
}

/// Binds and serves until ctrl-c.
pub async fn serve(engine: Arc<Engine>, ip: &str, port: u16) -> Result<()> {
	let app = router(engine);
	let addr = format!("{ip}:{port}");
	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.with_context(|| format!("binding {addr}"))?;
	log::info!("listening on http://{addr}");
	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("server terminated")?;
	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		log::warn!("cannot listen for shutdown signal: {e}");
		return;
	}
	log::info!("shutdown signal received, draining connections");
}
