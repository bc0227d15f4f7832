use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Coordinate;

// Row as projected by the feed read: id, text, created_at, lat, lng, owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(default)]
    pub owner: Option<String>,
}

impl Post {
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::from_parts(self.lat, self.lng)
    }
}

// Insert payload. Nulls are sent explicitly so the backend stores "no location".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPost {
    pub text: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub owner: Option<String>,
}
