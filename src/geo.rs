// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

/// Mean radius of Earth, in meters.
/// Source: https://en.wikipedia.org/wiki/Earth_radius#Arithmetic_mean_radius
pub(crate) const EARTH_RADIUS: f64 = 6_371_000.0;

/// Calculates the great-circle distance between two lat-lon positions
/// on Earth using the [haversine formula](https://en.wikipedia.org/wiki/Haversine_formula).
/// Returns the result in meters.
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();

    let sin_dlat_half = ((lat2 - lat1).to_radians() * 0.5).sin();
    let sin_dlon_half = ((lon2 - lon1).to_radians() * 0.5).sin();

    let h = sin_dlat_half * sin_dlat_half + phi1.cos() * phi2.cos() * sin_dlon_half * sin_dlon_half;

    EARTH_RADIUS * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Calculates the initial (forward) [bearing](https://en.wikipedia.org/wiki/Bearing_(navigation))
/// from the first to the second lat-lon position. Returns degrees in `[0, 360)`,
/// measured clockwise from north.
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlam = (lon2 - lon1).to_radians();

    let y = dlam.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlam.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const FERRY_BUILDING: (f64, f64) = (37.7955, -122.3937);
    const EMBARCADERO: (f64, f64) = (37.7946, -122.4010);
    const DOLORES_PARK: (f64, f64) = (37.7596, -122.4269);

    #[test]
    fn ferry_building_embarcadero() {
        let d = haversine(
            FERRY_BUILDING.0,
            FERRY_BUILDING.1,
            EMBARCADERO.0,
            EMBARCADERO.1,
        );
        assert!((d - 649.19).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn ferry_building_dolores_park() {
        let d = haversine(
            FERRY_BUILDING.0,
            FERRY_BUILDING.1,
            DOLORES_PARK.0,
            DOLORES_PARK.1,
        );
        assert!((d - 4944.62).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn haversine_is_zero_on_identical_points() {
        assert_eq!(haversine(37.7955, -122.3937, 37.7955, -122.3937), 0.0);
    }

    #[test]
    fn haversine_is_symmetric() {
        let there = haversine(
            FERRY_BUILDING.0,
            FERRY_BUILDING.1,
            DOLORES_PARK.0,
            DOLORES_PARK.1,
        );
        let back = haversine(
            DOLORES_PARK.0,
            DOLORES_PARK.1,
            FERRY_BUILDING.0,
            FERRY_BUILDING.1,
        );
        assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn bearing_cardinal_directions() {
        assert!((bearing(0.0, 0.0, 0.001, 0.0) - 0.0).abs() < 1e-6);
        assert!((bearing(0.0, 0.0, 0.0, 0.001) - 90.0).abs() < 1e-6);
        assert!((bearing(0.0, 0.0, -0.001, 0.0) - 180.0).abs() < 1e-6);
        assert!((bearing(0.0, 0.0, 0.0, -0.001) - 270.0).abs() < 1e-6);
    }

    #[test]
    fn bearing_diagonal() {
        let b = bearing(0.0, 0.0, 0.001, 0.001);
        assert!((b - 45.0).abs() < 1e-3, "got {}", b);
    }
}
