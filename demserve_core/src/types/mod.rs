//! Value types shared across the workspace.

mod bounds;
mod crs;
mod data_type;
mod method;
mod policy;
mod precision;

pub use bounds::Bounds;
pub use crs::{Crs, CrsFamily, REGION_ENVELOPE, detect_crs_family};
pub use data_type::DataType;
pub use method::ExtractMethod;
pub use policy::SelectionPolicy;
pub use precision::PrecisionClass;
