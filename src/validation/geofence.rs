use crate::models::{Coordinates, GeofenceResult};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Default geofence radius around a restaurant, in meters.
pub const DEFAULT_MAX_DISTANCE_M: f64 = 150.0;

/// Great-circle distance in meters (Haversine).
pub fn calculate_gps_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Whether the user stood within `max_distance` meters of the restaurant.
///
/// Both sides unknown-aware: a missing position yields an unknown result.
pub fn check_geofence(
    user: Option<Coordinates>,
    restaurant: Option<Coordinates>,
    max_distance: f64,
) -> GeofenceResult {
    let (user, restaurant) = match (user, restaurant) {
        (Some(u), Some(r)) => (u, r),
        _ => return GeofenceResult::unknown(),
    };

    let distance = calculate_gps_distance(
        user.latitude,
        user.longitude,
        restaurant.latitude,
        restaurant.longitude,
    );

    GeofenceResult {
        within_geofence: Some(distance <= max_distance),
        distance: Some((distance * 10.0).round() / 10.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Ban Jelačić Square and Zagreb Cathedral.
    const SQUARE: Coordinates = Coordinates { latitude: 45.8131, longitude: 15.9772 };
    const CATHEDRAL: Coordinates = Coordinates { latitude: 45.8144, longitude: 15.9798 };

    #[test]
    fn test_zero_distance() {
        assert_eq!(calculate_gps_distance(45.0, 15.0, 45.0, 15.0), 0.0);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = calculate_gps_distance(45.0, 15.0, 46.0, 15.0);
        assert!((d - 111_195.0).abs() < 10.0, "got {}", d);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let ab = calculate_gps_distance(SQUARE.latitude, SQUARE.longitude, CATHEDRAL.latitude, CATHEDRAL.longitude);
        let ba = calculate_gps_distance(CATHEDRAL.latitude, CATHEDRAL.longitude, SQUARE.latitude, SQUARE.longitude);
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn test_geofence_inside_and_outside() {
        let inside = check_geofence(Some(SQUARE), Some(CATHEDRAL), 300.0);
        assert_eq!(inside.within_geofence, Some(true));

        let outside = check_geofence(Some(SQUARE), Some(CATHEDRAL), DEFAULT_MAX_DISTANCE_M);
        assert_eq!(outside.within_geofence, Some(false));

        let distance = outside.distance.unwrap();
        assert!(distance > 150.0 && distance < 300.0, "got {}", distance);
        assert_eq!(distance, (distance * 10.0).round() / 10.0);
    }

    #[test]
    fn test_missing_coordinates_yield_unknown() {
        assert_eq!(check_geofence(None, Some(CATHEDRAL), 150.0), GeofenceResult::unknown());
        assert_eq!(check_geofence(Some(SQUARE), None, 150.0), GeofenceResult::unknown());
    }
}
