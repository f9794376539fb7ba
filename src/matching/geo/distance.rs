//! Geodesic distance.

use crate::matching::core::item::GeoPoint;

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometers (haversine).
#[must_use]
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn test_zero_distance() {
        let p = point(6.9271, 79.8612);
        assert_eq!(haversine_km(p, p), 0.0);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = haversine_km(point(0.0, 0.0), point(1.0, 0.0));
        assert!((d - 111.19).abs() < 0.5, "got {d}");
    }

    #[test]
    fn test_london_to_paris() {
        let d = haversine_km(point(51.5074, -0.1278), point(48.8566, 2.3522));
        assert!((d - 343.5).abs() < 2.0, "got {d}");
    }

    #[test]
    fn test_symmetry() {
        let a = point(6.9271, 79.8612);
        let b = point(6.9000, 79.9000);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
    }
}
