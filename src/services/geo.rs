//! Geographic calculations

/// Earth radius in meters
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per statute mile. Used consistently for both directions of
/// conversion so radius checks and display distances agree.
pub const MILE_IN_METERS: f64 = 1609.34;

/// Great-circle (Haversine) distance between two points in meters.
///
/// Returns `None` when any input is not a finite number — callers treat that
/// as "undeterminable distance" and skip the candidate, not as an error.
pub fn haversine_distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Option<f64> {
    if !(lat1.is_finite() && lon1.is_finite() && lat2.is_finite() && lon2.is_finite()) {
        return None;
    }

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    Some(EARTH_RADIUS_M * c)
}

pub fn miles_to_meters(miles: f64) -> f64 {
    miles * MILE_IN_METERS
}

pub fn meters_to_miles(meters: f64) -> f64 {
    meters / MILE_IN_METERS
}

/// Display rounding for distances — one decimal place
pub fn round_miles_1dp(miles: f64) -> f64 {
    (miles * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_boston_new_york() {
        // Boston to NYC is approximately 306 km great-circle
        let distance = haversine_distance_meters(42.3601, -71.0589, 40.7128, -74.0060).unwrap();
        assert!((distance - 306_000.0).abs() < 5_000.0);
    }

    #[test]
    fn test_haversine_same_point() {
        let distance = haversine_distance_meters(42.3601, -71.0589, 42.3601, -71.0589).unwrap();
        assert!(distance.abs() < 0.001);
    }

    #[test]
    fn test_haversine_non_finite_input_is_undeterminable() {
        assert!(haversine_distance_meters(f64::NAN, -71.0, 42.0, -71.0).is_none());
        assert!(haversine_distance_meters(42.0, f64::INFINITY, 42.0, -71.0).is_none());
        assert!(haversine_distance_meters(42.0, -71.0, f64::NEG_INFINITY, -71.0).is_none());
    }

    #[test]
    fn test_mile_conversion_round_trips() {
        assert!((miles_to_meters(5.0) - 8046.7).abs() < 0.001);
        assert!((meters_to_miles(8046.7) - 5.0).abs() < 0.001);
        let miles = 17.3;
        assert!((meters_to_miles(miles_to_meters(miles)) - miles).abs() < 1e-9);
    }

    #[test]
    fn test_round_miles_one_decimal() {
        assert_eq!(round_miles_1dp(5.0007), 5.0);
        assert_eq!(round_miles_1dp(5.07), 5.1);
        assert_eq!(round_miles_1dp(12.34), 12.3);
    }
}
