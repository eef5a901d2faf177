pub mod config;
pub mod errors;
pub mod geo;
pub mod models;
pub mod ports;

pub use config::AppConfig;
pub use errors::{OutageError, OutageResult};
pub use geo::{haversine_km, GeoPoint};
pub use ports::{GridDataSource, Topology};
