//! Qibla bearing and great-circle distance.

/// Kaaba latitude in degrees.
pub const KAABA_LAT: f64 = 21.4225;
/// Kaaba longitude in degrees.
pub const KAABA_LON: f64 = 39.8262;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Initial great-circle bearing from `(latitude, longitude)` to the Kaaba,
/// in whole degrees clockwise from true north, within `0..360`.
pub fn qibla_direction(latitude: f64, longitude: f64) -> u16 {
    let d_lon = (KAABA_LON - longitude).to_radians();
    let lat1 = latitude.to_radians();
    let lat2 = KAABA_LAT.to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    let bearing = (y.atan2(x).to_degrees() + 360.0) % 360.0;
    (bearing.round() as u16) % 360
}

/// Haversine distance in kilometres.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}
