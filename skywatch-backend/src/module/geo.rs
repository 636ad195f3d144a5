///! Great-circle distance and search-box helpers

use skywatch_common::QueryBox;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Rough length of one degree of latitude
const KM_PER_DEGREE: f64 = 111.0;

/// Haversine distance between two points, in kilometers
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Approximate box around a circle of `radius_km`.
///
/// The box is a superset of the circle; callers still filter with [`distance`].
/// Edges are clamped to valid coordinates, so near the poles the box spans
/// every longitude and it never wraps across the antimeridian.
pub fn bounding_box(lat: f64, lon: f64, radius_km: f64) -> QueryBox {
    let lat_delta = radius_km / KM_PER_DEGREE;
    let lon_delta = radius_km / (KM_PER_DEGREE * lat.to_radians().cos());

    QueryBox {
        north: (lat + lat_delta).min(90.0),
        south: (lat - lat_delta).max(-90.0),
        east: (lon + lon_delta).min(180.0),
        west: (lon - lon_delta).max(-180.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_one_degree_at_equator() {
        let d = distance(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.19).abs() < 111.19 * 0.005, "got {}", d);
    }

    #[test]
    fn test_distance_symmetric_and_zero() {
        let points = [
            (52.2297, 21.0122),
            (40.6413, -73.7781),
            (-33.9399, 151.1753),
            (0.0, 179.9),
        ];
        for &(lat1, lon1) in &points {
            assert_eq!(distance(lat1, lon1, lat1, lon1), 0.0);
            for &(lat2, lon2) in &points {
                let ab = distance(lat1, lon1, lat2, lon2);
                let ba = distance(lat2, lon2, lat1, lon1);
                assert!((ab - ba).abs() <= ab.abs() * 1e-12);
            }
        }
    }

    #[test]
    fn test_distance_warsaw_new_york() {
        // Chopin to JFK, about 6850 km
        let d = distance(52.1657, 20.9671, 40.6413, -73.7781);
        assert!(d > 6800.0 && d < 6900.0, "got {}", d);
    }

    #[test]
    fn test_bounding_box_contains_radius() {
        let (lat, lon, radius) = (52.2297, 21.0122, 50.0);
        let bbox = bounding_box(lat, lon, radius);

        assert!((bbox.north - lat - 50.0 / 111.0).abs() < 1e-12);
        assert!((lat - bbox.south - 50.0 / 111.0).abs() < 1e-12);
        assert!(bbox.east > lon && bbox.west < lon);

        // Points straight north and east at the radius are inside the box
        assert!(distance(lat, lon, bbox.north, lon) >= radius * 0.99);
        assert!(distance(lat, lon, lat, bbox.east) >= radius * 0.99);
    }

    #[test]
    fn test_bounding_box_stays_within_coordinate_range() {
        let pole = bounding_box(90.0, 21.0, 50.0);
        assert_eq!(pole.north, 90.0);
        assert_eq!((pole.west, pole.east), (-180.0, 180.0));

        let antimeridian = bounding_box(-16.5, 179.9, 100.0);
        assert_eq!(antimeridian.east, 180.0);
        assert!(antimeridian.west < 179.9 && antimeridian.west > 178.0);

        let south = bounding_box(-89.9, -179.5, 500.0);
        assert_eq!(south.south, -90.0);
        assert_eq!(south.west, -180.0);
    }

    #[test]
    fn test_bounding_box_widens_with_latitude() {
        let equator = bounding_box(0.0, 0.0, 100.0);
        let north = bounding_box(60.0, 0.0, 100.0);
        assert!((north.east - north.west) > (equator.east - equator.west) * 1.9);
    }
}
