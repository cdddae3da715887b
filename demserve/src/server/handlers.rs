//! Concrete HTTP handlers and their request/response shapes.

use crate::engine::Engine;
use crate::limiter::LimiterError;
use crate::orchestrator::{ElevationResult, QueryError, QueryOptions};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use demserve_core::{Bounds, DataType, SelectionPolicy};
use demserve_index::coverage::{self, CampaignFilters};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Error envelope for every non-2xx response.
#[derive(Debug)]
pub enum ApiError {
	BadRequest(String),
	NotFound(String),
	ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let (status, message) = match self {
			ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
			ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
			ApiError::ServiceUnavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
		};
		(status, Json(json!({ "error": message }))).into_response()
	}
}

impl From<QueryError> for ApiError {
	fn from(err: QueryError) -> ApiError {
		match err {
			QueryError::Validation(m) => ApiError::BadRequest(m),
			QueryError::ServiceUnavailable(LimiterError::ServiceUnavailable) => {
				ApiError::ServiceUnavailable("rate limiting service temporarily unavailable".to_string())
			}
		}
	}
}

/// Liveness probe.
pub async fn status() -> &'static str {
	"ok"
}

/// Index generation metadata plus engine counters.
pub async fn health(State(engine): State<Arc<Engine>>) -> Json<serde_json::Value> {
	let index = engine.corpus().index();
	Json(json!({
		"status": "healthy",
		"schema_version": index.schema_version,
		"generated_at": index.generated_at,
		"bucket": index.bucket,
		"total_tile_count": index.total_tile_count,
		"campaign_count": index.campaigns().count(),
		"selector": engine.orchestrator().selector().stats(),
		"providers": engine.orchestrator().provider_counters(),
	}))
}

#[derive(Debug, Deserialize)]
pub struct PointRequest {
	pub lat: f64,
	pub lon: f64,
	#[serde(default)]
	pub source_id: Option<String>,
	#[serde(default)]
	pub policy: Option<SelectionPolicy>,
}

impl PointRequest {
	fn options(&self) -> QueryOptions {
		QueryOptions {
			policy: self.policy.unwrap_or_default(),
			source_id: self.source_id.clone(),
			deadline: None,
		}
	}
}

pub async fn point_query(
	State(engine): State<Arc<Engine>>,
	Query(request): Query<PointRequest>,
) -> Result<Json<ElevationResult>, ApiError> {
	resolve_point(&engine, &request).await
}

pub async fn point_body(
	State(engine): State<Arc<Engine>>,
	Json(request): Json<PointRequest>,
) -> Result<Json<ElevationResult>, ApiError> {
	resolve_point(&engine, &request).await
}

async fn resolve_point(engine: &Engine, request: &PointRequest) -> Result<Json<ElevationResult>, ApiError> {
	let result = engine
		.orchestrator()
		.get_elevation(request.lat, request.lon, &request.options())
		.await?;
	Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct BulkPoint {
	pub lat: f64,
	pub lon: f64,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
	pub points: Vec<BulkPoint>,
	#[serde(default)]
	pub source_id: Option<String>,
	#[serde(default)]
	pub policy: Option<SelectionPolicy>,
}

pub async fn points_body(
	State(engine): State<Arc<Engine>>,
	Json(request): Json<BulkRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
	let points: Vec<(f64, f64)> = request.points.iter().map(|p| (p.lat, p.lon)).collect();
	let opts = QueryOptions {
		policy: request.policy.unwrap_or_default(),
		source_id: request.source_id.clone(),
		deadline: None,
	};
	let results = engine.orchestrator().get_elevations(&points, &opts).await?;
	Ok(Json(json!({ "results": results })))
}

#[derive(Debug, Deserialize)]
pub struct SourcesRequest {
	pub lat: f64,
	pub lon: f64,
	#[serde(default)]
	pub policy: Option<SelectionPolicy>,
}

/// Selection diagnostics: ranked candidates and the reasoning line.
pub async fn sources(
	State(engine): State<Arc<Engine>>,
	Query(request): Query<SourcesRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
	let summary = engine
		.orchestrator()
		.selector()
		.summary(
			engine.corpus(),
			request.lat,
			request.lon,
			request.policy.unwrap_or_default(),
		)
		.map_err(|e| ApiError::BadRequest(e.to_string()))?;
	Ok(Json(serde_json::to_value(summary).unwrap_or_default()))
}

#[derive(Debug, Deserialize)]
pub struct CampaignListParams {
	#[serde(default)]
	pub page: Option<usize>,
	#[serde(default)]
	pub page_size: Option<usize>,
	/// `min_lat,min_lon,max_lat,max_lon`
	#[serde(default)]
	pub bbox: Option<String>,
	#[serde(default)]
	pub min_resolution_m: Option<f64>,
	#[serde(default)]
	pub max_resolution_m: Option<f64>,
	/// Comma-separated list, e.g. `LiDAR,DEM`.
	#[serde(default)]
	pub data_types: Option<String>,
	#[serde(default)]
	pub providers: Option<String>,
	#[serde(default)]
	pub regions: Option<String>,
	#[serde(default)]
	pub year_from: Option<u16>,
	#[serde(default)]
	pub year_to: Option<u16>,
	#[serde(default)]
	pub include_tiles: Option<bool>,
	#[serde(default)]
	pub include_geometry: Option<bool>,
}

fn parse_bbox(text: &str) -> Result<Bounds, ApiError> {
	let parts: Vec<f64> = text
		.split(',')
		.map(|p| p.trim().parse::<f64>())
		.collect::<Result<_, _>>()
		.map_err(|_| ApiError::BadRequest(format!("bbox '{text}' is not four numbers")))?;
	if parts.len() != 4 {
		return Err(ApiError::BadRequest(format!(
			"bbox must be min_lat,min_lon,max_lat,max_lon (got {} values)",
			parts.len()
		)));
	}
	Bounds::new(parts[0], parts[2], parts[1], parts[3]).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn csv_list(text: &Option<String>) -> Option<Vec<String>> {
	text.as_ref().map(|t| {
		t.split(',')
			.map(|p| p.trim().to_string())
			.filter(|p| !p.is_empty())
			.collect()
	})
}

pub async fn campaigns_list(
	State(engine): State<Arc<Engine>>,
	Query(params): Query<CampaignListParams>,
) -> Result<Json<coverage::CampaignPage>, ApiError> {
	let filters = CampaignFilters {
		bbox: params.bbox.as_deref().map(parse_bbox).transpose()?,
		min_resolution_m: params.min_resolution_m,
		max_resolution_m: params.max_resolution_m,
		data_types: csv_list(&params.data_types)
			.map(|types| types.iter().map(|t| DataType::parse_str(t)).collect()),
		providers: csv_list(&params.providers),
		regions: csv_list(&params.regions),
		year_from: params.year_from,
		year_to: params.year_to,
	};
	let page = coverage::list(
		engine.corpus(),
		&filters,
		params.page.unwrap_or(1),
		params.page_size.unwrap_or(50),
		params.include_tiles.unwrap_or(false),
		params.include_geometry.unwrap_or(false),
	);
	Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct CampaignGetParams {
	#[serde(default)]
	pub include_tiles: Option<bool>,
	#[serde(default)]
	pub include_geometry: Option<bool>,
}

pub async fn campaign_get(
	State(engine): State<Arc<Engine>>,
	Path(id): Path<String>,
	Query(params): Query<CampaignGetParams>,
) -> Result<Json<coverage::CampaignView>, ApiError> {
	coverage::get(
		engine.corpus(),
		&id,
		params.include_tiles.unwrap_or(true),
		params.include_geometry.unwrap_or(false),
	)
	.map(Json)
	.ok_or_else(|| ApiError::NotFound(format!("campaign '{id}' not found")))
}

#[derive(Debug, Deserialize)]
pub struct BoundsParams {
	pub min_lat: f64,
	pub max_lat: f64,
	pub min_lon: f64,
	pub max_lon: f64,
	#[serde(default)]
	pub zoom: Option<u8>,
}

impl BoundsParams {
	fn bounds(&self) -> Result<Bounds, ApiError> {
		Bounds::new(self.min_lat, self.max_lat, self.min_lon, self.max_lon)
			.map_err(|e| ApiError::BadRequest(e.to_string()))
	}
}

pub async fn campaigns_in_bounds(
	State(engine): State<Arc<Engine>>,
	Query(params): Query<BoundsParams>,
) -> Result<Json<Vec<coverage::CampaignView>>, ApiError> {
	Ok(Json(coverage::in_bounds(engine.corpus(), &params.bounds()?)))
}

pub async fn campaign_clusters(
	State(engine): State<Arc<Engine>>,
	Query(params): Query<BoundsParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
	let zoom = params.zoom.unwrap_or(6);
	let clusters = coverage::clusters(engine.corpus(), &params.bounds()?, zoom);
	Ok(Json(json!({
		"zoom": zoom,
		"total": clusters.len(),
		"clusters": clusters,
	})))
}
