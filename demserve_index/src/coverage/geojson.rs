//! Campaign footprints as GeoJSON geometry.
//!
//! The footprint of a campaign is the union of its tile rectangles,
//! dissolved into as few polygons as the geometry allows. Campaigns
//! without a tile list fall back to their bounding box.

use crate::model::Campaign;
use demserve_core::Bounds;
use geo::{Coord, LineString, MultiPolygon, Polygon, Rect, unary_union};
use serde_json::{Value, json};

/// GeoJSON geometry (`Polygon` or `MultiPolygon`) covering the campaign.
#[must_use]
pub fn campaign_footprint(campaign: &Campaign) -> Value {
	if campaign.files.is_empty() {
		return json!({
			"type": "Polygon",
			"coordinates": [ring_coordinates(&bounds_ring(&campaign.bounds))],
		});
	}

	let rectangles: Vec<Polygon<f64>> = campaign
		.files
		.iter()
		.map(|tile| {
			Rect::new(
				Coord {
					x: tile.bounds.min_lon,
					y: tile.bounds.min_lat,
				},
				Coord {
					x: tile.bounds.max_lon,
					y: tile.bounds.max_lat,
				},
			)
			.to_polygon()
		})
		.collect();

	let union: MultiPolygon<f64> = unary_union(&rectangles);
	multipolygon_to_geojson(&union)
}

fn multipolygon_to_geojson(mp: &MultiPolygon<f64>) -> Value {
	let polygons: Vec<Value> = mp.0.iter().map(polygon_coordinates).collect();
	match polygons.len() {
		1 => json!({ "type": "Polygon", "coordinates": polygons.into_iter().next().expect("one polygon") }),
		_ => json!({ "type": "MultiPolygon", "coordinates": polygons }),
	}
}

fn polygon_coordinates(polygon: &Polygon<f64>) -> Value {
	let mut rings = vec![ring_coordinates(polygon.exterior())];
	rings.extend(polygon.interiors().iter().map(ring_coordinates));
	Value::Array(rings)
}

fn ring_coordinates(ring: &LineString<f64>) -> Value {
	Value::Array(ring.coords().map(|c| json!([c.x, c.y])).collect())
}

fn bounds_ring(bounds: &Bounds) -> LineString<f64> {
	LineString::from(vec![
		(bounds.min_lon, bounds.min_lat),
		(bounds.max_lon, bounds.min_lat),
		(bounds.max_lon, bounds.max_lat),
		(bounds.min_lon, bounds.max_lat),
		(bounds.min_lon, bounds.min_lat),
	])
}
