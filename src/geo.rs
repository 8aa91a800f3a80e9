//! Great-circle distance between WGS84 coordinates

/// Mean Earth radius in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters between two decimal-degree coordinates.
///
/// Callers are expected to pass well-formed coordinates; nothing is validated here.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}

/// Whether two points are at most `threshold_meters` apart
pub fn is_within(lat1: f64, lon1: f64, lat2: f64, lon2: f64, threshold_meters: f64) -> bool {
    haversine_distance(lat1, lon1, lat2, lon2) <= threshold_meters
}

/// Human readable distance: meters below 1 km, kilometers above
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{:.1} meters", meters)
    } else {
        format!("{:.2} km", meters / 1000.0)
    }
}
