//! Leaf types and pure geodesy for demserve: bounding boxes, CRS handling,
//! enumerated metadata classes and UTM↔WGS84 transforms.

pub mod error;
pub mod geo;
pub mod types;

pub use error::*;
pub use types::*;
