pub mod gpx_route;

pub use gpx_route::*;
