//! Hazard model, storage and the proximity stages of the alert pipeline

pub mod model;
pub mod store;
pub mod locator;
pub mod dedup;
pub mod filter;

pub use model::{Hazard, HazardId, HazardType, Severity};
pub use store::{HazardStore, InMemoryHazardStore, JsonHazardStore};
pub use locator::{HazardLocator, NearbyHazard, DEFAULT_RADIUS_METERS};
pub use dedup::{ClusterMode, HazardDeduplicator, DEFAULT_DEDUP_RADIUS_METERS};
pub use filter::{filter_by_severity, DEFAULT_SEVERITY_THRESHOLD};
