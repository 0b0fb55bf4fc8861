pub mod position;
pub mod result;
pub mod route;

pub use position::*;
pub use result::*;
pub use route::*;

/// Anything that sits at a latitude/longitude in decimal degrees
pub trait LatLon {
    fn latitude(&self) -> f64;
    fn longitude(&self) -> f64;
}
