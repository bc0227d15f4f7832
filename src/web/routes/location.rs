use axum::{http::StatusCode, response::IntoResponse, Extension, Json};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::Coordinate;
use crate::services::location_service::{LocationFix, PositionError};
use crate::services::viewer_service::Viewer;

/// What the browser's ambient `getCurrentPosition` call produced.
#[derive(Debug, Deserialize)]
pub struct LocationReport {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// `GeolocationPositionError.code`, or 0 when the API is missing.
    pub error_code: Option<u16>,
}

pub async fn report_location(
    Extension(viewer): Extension<Arc<Viewer>>,
    Json(report): Json<LocationReport>,
) -> impl IntoResponse {
    let fix = match (report.lat, report.lng) {
        (Some(lat), Some(lng)) => match Coordinate::new(lat, lng) {
            Ok(c) => LocationFix::Available(c),
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        },
        _ => {
            let reason = position_error(report.error_code);
            debug!("📍 Browser reported no position: {}", reason);
            LocationFix::Unavailable
        }
    };

    if let LocationFix::Available(c) = fix {
        info!("📍 Ambient location reported: {}", c.label());
    }
    viewer.set_location(fix).await;
    Json(viewer.location().await).into_response()
}

fn position_error(code: Option<u16>) -> PositionError {
    match code {
        Some(1) => PositionError::PermissionDenied,
        Some(2) => PositionError::Unavailable,
        Some(3) => PositionError::Timeout,
        _ => PositionError::Unsupported,
    }
}
