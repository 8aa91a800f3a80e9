//! Finds hazards around a driver by scanning the whole store
//!
//! There is no spatial index: every lookup is a full O(n) scan, which is fine
//! for the small hazard sets this service handles.

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use super::model::Hazard;
use super::store::HazardStore;

/// Default search radius around the driver
pub const DEFAULT_RADIUS_METERS: f64 = 300.0;

/// A hazard paired with its distance to the driver
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyHazard {
    pub hazard: Hazard,
    pub distance_m: f64,
}

pub struct HazardLocator {
    store: Arc<dyn HazardStore>,
}

impl HazardLocator {
    pub fn new(store: Arc<dyn HazardStore>) -> Self {
        Self { store }
    }

    /// Hazards within `radius_meters` of the driver, closest first.
    ///
    /// The sort is stable, so equal distances keep store order.
    pub fn locate(&self, latitude: f64, longitude: f64, radius_meters: f64) -> Result<Vec<NearbyHazard>> {
        let all = self.store.list_all()?;
        let scanned = all.len();

        let mut nearby: Vec<NearbyHazard> = all
            .into_iter()
            .filter_map(|hazard| {
                let distance_m = hazard.distance_to(latitude, longitude);
                (distance_m <= radius_meters).then_some(NearbyHazard { hazard, distance_m })
            })
            .collect();

        nearby.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

        debug!(scanned, found = nearby.len(), radius_m = radius_meters, "Located nearby hazards");
        Ok(nearby)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hazard::model::{HazardType, Severity};
    use crate::hazard::store::InMemoryHazardStore;

    const DRIVER: (f64, f64) = (37.7749, -122.4194);

    fn hazard(id: u64, lat: f64, lon: f64) -> Hazard {
        Hazard::new(id, HazardType::Accident, Severity::new(3).unwrap(), lat, lon)
    }

    #[test]
    fn test_filters_by_radius_and_sorts_by_distance() {
        let store = InMemoryHazardStore::with_hazards(vec![
            hazard(1, 37.7760, -122.4194), // ~122 m
            hazard(2, 37.7830, -122.4194), // ~900 m
            hazard(3, 37.7752, -122.4194), // ~33 m
        ]);
        let locator = HazardLocator::new(Arc::new(store));

        let found = locator.locate(DRIVER.0, DRIVER.1, DEFAULT_RADIUS_METERS).unwrap();
        let ids: Vec<_> = found.iter().map(|n| n.hazard.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert!(found[0].distance_m < found[1].distance_m);
    }

    #[test]
    fn test_radius_is_inclusive() {
        let store = InMemoryHazardStore::with_hazards(vec![hazard(1, 37.7760, -122.4194)]);
        let locator = HazardLocator::new(Arc::new(store));
        let exact = crate::geo::haversine_distance(DRIVER.0, DRIVER.1, 37.7760, -122.4194);

        assert_eq!(locator.locate(DRIVER.0, DRIVER.1, exact).unwrap().len(), 1);
    }

    #[test]
    fn test_ties_keep_store_order() {
        let store = InMemoryHazardStore::with_hazards(vec![
            hazard(9, 37.7752, -122.4194),
            hazard(4, 37.7752, -122.4194),
        ]);
        let locator = HazardLocator::new(Arc::new(store));

        let ids: Vec<_> = locator
            .locate(DRIVER.0, DRIVER.1, DEFAULT_RADIUS_METERS)
            .unwrap()
            .iter()
            .map(|n| n.hazard.id)
            .collect();
        assert_eq!(ids, vec![9, 4]);
    }

    #[test]
    fn test_empty_store() {
        let locator = HazardLocator::new(Arc::new(InMemoryHazardStore::new()));
        assert!(locator.locate(DRIVER.0, DRIVER.1, 300.0).unwrap().is_empty());
    }
}
