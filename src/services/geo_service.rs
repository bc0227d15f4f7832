use serde::Serialize;

use crate::error::BoardError;
use crate::models::{Coordinate, Post};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Radius choices offered by the feed selector.
pub const RADIUS_OPTIONS_KM: [u32; 9] = [1, 3, 5, 10, 25, 50, 100, 200, 500];

pub const DEFAULT_RADIUS_KM: u32 = 5;

/// A radius that is guaranteed to be one of [`RADIUS_OPTIONS_KM`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RadiusKm(u32);

impl RadiusKm {
    pub fn km(self) -> u32 {
        self.0
    }

    pub fn meters(self) -> f64 {
        f64::from(self.0) * 1000.0
    }
}

impl Default for RadiusKm {
    fn default() -> Self {
        RadiusKm(DEFAULT_RADIUS_KM)
    }
}

impl TryFrom<u32> for RadiusKm {
    type Error = BoardError;

    fn try_from(km: u32) -> Result<Self, Self::Error> {
        if RADIUS_OPTIONS_KM.contains(&km) {
            Ok(RadiusKm(km))
        } else {
            Err(BoardError::InvalidRadius(km))
        }
    }
}

/// Great-circle distance in kilometres (haversine).
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let to_rad = |deg: f64| deg.to_radians();
    let dlat = to_rad(b.lat - a.lat);
    let dlon = to_rad(b.lng - a.lng);
    let h = (dlat / 2.0).sin().powi(2)
        + to_rad(a.lat).cos() * to_rad(b.lat).cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    let c = 2.0 * h.min(1.0).sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Posts visible from `current` within `radius_km`.
///
/// Posts without a coordinate are always kept, and without a current
/// coordinate nothing is filtered at all.
pub fn visible_posts<'a>(
    posts: &'a [Post],
    current: Option<Coordinate>,
    radius_km: f64,
) -> Vec<&'a Post> {
    let Some(origin) = current else {
        return posts.iter().collect();
    };

    posts
        .iter()
        .filter(|post| match post.coordinate() {
            Some(at) => haversine_km(origin, at) <= radius_km,
            None => true,
        })
        .collect()
}

/// Leaflet zoom level that keeps the radius circle on screen.
pub fn map_zoom_for_radius(radius: RadiusKm) -> u8 {
    match radius.km() {
        km if km >= 100 => 7,
        km if km >= 25 => 10,
        _ => 13,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate { lat, lng }
    }

    fn post(id: i64, coord: Option<(f64, f64)>) -> Post {
        Post {
            id,
            text: format!("post {}", id),
            created_at: Utc::now(),
            lat: coord.map(|(lat, _)| lat),
            lng: coord.map(|(_, lng)| lng),
            owner: None,
        }
    }

    #[test]
    fn one_degree_of_longitude_at_the_equator() {
        let d = haversine_km(c(0.0, 0.0), c(0.0, 1.0));
        assert!((d - 111.19).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn distance_properties_hold_on_a_grid() {
        let points = [
            c(0.0, 0.0),
            c(52.37, 4.89),
            c(-33.87, 151.21),
            c(89.9, -179.9),
            c(-90.0, 180.0),
            c(40.42, -3.70),
            c(0.0, 180.0),
        ];
        for &a in &points {
            assert_eq!(haversine_km(a, a), 0.0);
            for &b in &points {
                let ab = haversine_km(a, b);
                let ba = haversine_km(b, a);
                assert!(ab >= 0.0);
                assert!((ab - ba).abs() < 1e-6, "{:?} {:?}", a, b);
                for &m in &points {
                    let via = haversine_km(a, m) + haversine_km(m, b);
                    assert!(ab <= via + 1e-6, "{:?} {:?} {:?}", a, m, b);
                }
            }
        }
    }

    #[test]
    fn antipodes_do_not_produce_nan() {
        let d = haversine_km(c(0.0, 0.0), c(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn filter_keeps_nearby_and_unlocated_posts() {
        let posts = vec![
            post(1, Some((0.0, 0.0))),
            post(2, None),
            post(3, Some((10.0, 10.0))),
        ];
        let ids: Vec<i64> = visible_posts(&posts, Some(c(0.0, 0.0)), 5.0)
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn filter_is_open_without_current_location() {
        let posts = vec![post(1, Some((0.0, 0.0))), post(2, None), post(3, Some((10.0, 10.0)))];
        for radius in RADIUS_OPTIONS_KM {
            assert_eq!(visible_posts(&posts, None, f64::from(radius)).len(), 3);
        }
    }

    #[test]
    fn boundary_distance_is_inclusive() {
        let posts = vec![post(1, Some((0.0, 1.0)))];
        let exact = haversine_km(c(0.0, 0.0), c(0.0, 1.0));
        assert_eq!(visible_posts(&posts, Some(c(0.0, 0.0)), exact).len(), 1);
        assert!(visible_posts(&posts, Some(c(0.0, 0.0)), exact - 0.001).is_empty());
    }

    #[test]
    fn radius_must_come_from_the_fixed_set() {
        assert_eq!(RadiusKm::default().km(), 5);
        assert!(RadiusKm::try_from(25).is_ok());
        assert!(matches!(
            RadiusKm::try_from(7),
            Err(BoardError::InvalidRadius(7))
        ));
    }

    #[test]
    fn zoom_follows_radius() {
        let zoom = |km| map_zoom_for_radius(RadiusKm::try_from(km).unwrap());
        assert_eq!(zoom(1), 13);
        assert_eq!(zoom(10), 13);
        assert_eq!(zoom(25), 10);
        assert_eq!(zoom(50), 10);
        assert_eq!(zoom(100), 7);
        assert_eq!(zoom(500), 7);
    }
}
