use askama::Template;
use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::BoardError;
use crate::models::Coordinate;
use crate::services::board_service::{Board, BoardView};
use crate::services::location_service::FixedPosition;
use crate::services::viewer_service::Viewer;

#[derive(Template)]
#[template(path = "board.html")]
pub struct BoardTemplate {
    pub view: BoardView,
    pub build_id: &'static str,
}

#[derive(Template)]
#[template(path = "feed.html")]
pub struct FeedTemplate {
    pub view: BoardView,
}

pub async fn board_page(
    State(board): State<Arc<Board>>,
    Extension(viewer): Extension<Arc<Viewer>>,
) -> Result<Html<String>, BoardError> {
    board.resume(&viewer).await;
    let mut view = board.view(&viewer).await;
    view.notice = viewer.take_notice().await;
    let template = BoardTemplate {
        view,
        build_id: option_env!("NEEDS_BUILD_ID").unwrap_or("dev"),
    };
    Ok(Html(template.render()?))
}

// Polled by the page; must not consume the pending notice.
pub async fn feed_fragment(
    State(board): State<Arc<Board>>,
    Extension(viewer): Extension<Arc<Viewer>>,
) -> Result<Html<String>, BoardError> {
    let template = FeedTemplate {
        view: board.view(&viewer).await,
    };
    Ok(Html(template.render()?))
}

pub async fn feed_json(
    State(board): State<Arc<Board>>,
    Extension(viewer): Extension<Arc<Viewer>>,
) -> Json<BoardView> {
    Json(board.view(&viewer).await)
}

#[derive(Debug, Deserialize)]
pub struct RadiusForm {
    pub radius_km: u32,
}

pub async fn radius_handler(
    Extension(viewer): Extension<Arc<Viewer>>,
    Form(form): Form<RadiusForm>,
) -> Result<Redirect, BoardError> {
    viewer.set_radius(form.radius_km).await?;
    Ok(Redirect::to("/"))
}

#[derive(Debug, Deserialize)]
pub struct PublishForm {
    pub text: String,
    // Fresh fix taken by the browser on submit; empty when it had none.
    pub lat: Option<String>,
    pub lng: Option<String>,
}

pub async fn publish_handler(
    State(board): State<Arc<Board>>,
    Extension(viewer): Extension<Arc<Viewer>>,
    Form(form): Form<PublishForm>,
) -> Response {
    let fix = parse_coordinate(form.lat.as_deref(), form.lng.as_deref());
    let outcome = board
        .publish(&viewer, &form.text, &FixedPosition::new(fix))
        .await;
    debug!("📝 Publish outcome: {:?}", outcome);
    Redirect::to("/").into_response()
}

pub async fn delete_handler(
    State(board): State<Arc<Board>>,
    Extension(viewer): Extension<Arc<Viewer>>,
    Path(id): Path<i64>,
) -> Redirect {
    // Failures are already queued as a notice for the next render.
    let _ = board.delete(&viewer, id).await;
    Redirect::to("/")
}

pub(crate) fn parse_coordinate(lat: Option<&str>, lng: Option<&str>) -> Option<Coordinate> {
    let parse = |v: Option<&str>| {
        v.map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<f64>().ok())
    };
    Coordinate::from_parts(parse(lat), parse(lng))
}
