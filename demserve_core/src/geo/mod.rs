//! Pure geodesy: transverse-mercator transforms and bbox reprojection.

mod reproject;
mod utm;

pub use reproject::{bbox_from_wgs84, bbox_to_wgs84, point_from_wgs84, point_to_wgs84, reproject_bbox};
pub use utm::{TmProjection, utm_zone_for_lon};
