use crate::models::Airport;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Great-circle distance between two coordinates, in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Closest airport to a point, or `None` for an empty list.
pub fn nearest_airport(airports: &[Airport], lat: f64, lng: f64) -> Option<&Airport> {
    airports
        .iter()
        .map(|a| (a, haversine_km(lat, lng, a.latitude, a.longitude)))
        .min_by(|(_, d1), (_, d2)| d1.total_cmp(d2))
        .map(|(a, _)| a)
}

pub fn valid_coordinates(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}
