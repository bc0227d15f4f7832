use axum::{
    routing::{get, post},
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::services::board_service::Board;

pub mod middleware;
pub mod routes;

use routes::{auth, board, location};

pub fn router(state: Arc<Board>) -> Router {
    Router::new()
        .route("/", get(board::board_page))
        .route("/feed", get(board::feed_fragment))
        .route("/api/feed", get(board::feed_json))
        .route("/api/location", post(location::report_location))
        .route("/radius", post(board::radius_handler))
        .route("/publish", post(board::publish_handler))
        .route("/posts/:post_id/delete", post(board::delete_handler))
        .route("/login", get(auth::login_page).post(auth::login_handler))
        .route("/logout", post(auth::logout_handler))
        // Layers
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::attach_viewer,
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        // State
        .with_state(state)
}
