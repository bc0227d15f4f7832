use serde::{Deserialize, Serialize};

use crate::error::BoardError;

/// WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Validates ranges; use for anything that came from a request.
    pub fn new(lat: f64, lng: f64) -> Result<Self, BoardError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(BoardError::InvalidCoordinate(format!(
                "latitude {} must be between -90 and 90",
                lat
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(BoardError::InvalidCoordinate(format!(
                "longitude {} must be between -180 and 180",
                lng
            )));
        }
        Ok(Self { lat, lng })
    }

    /// Pairs two nullable columns; a half-filled pair counts as no coordinate.
    pub fn from_parts(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        let (lat, lng) = lat.zip(lng)?;
        Self::new(lat, lng).ok()
    }

    pub fn label(&self) -> String {
        format!("{:.4}, {:.4}", self.lat, self.lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range() {
        assert!(Coordinate::new(91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn half_pair_is_no_coordinate() {
        assert_eq!(Coordinate::from_parts(Some(1.0), None), None);
        assert_eq!(
            Coordinate::from_parts(Some(1.0), Some(2.0)),
            Some(Coordinate { lat: 1.0, lng: 2.0 })
        );
    }
}
