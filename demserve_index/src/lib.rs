//! Tile corpus handling for demserve: object-storage access, GeoTIFF
//! header/pixel reads, the metadata extractor, the hierarchical spatial
//! index with its builder, and the coverage query service.

pub mod builder;
pub mod coverage;
pub mod extract;
pub mod geotiff;
pub mod index;
pub mod model;
pub mod storage;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use model::{Campaign, Collection, SpatialIndex, TileEntry};
pub use storage::{ObjectRef, TileStore};
