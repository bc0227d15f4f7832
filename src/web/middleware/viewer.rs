use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use cookie::Cookie;
use http::HeaderValue;
use std::sync::Arc;
use tracing::warn;

use crate::services::board_service::Board;

/// Cookie carrying the viewer id the server handed out.
pub const VIEW_COOKIE: &str = "needs_view";

/// Resolves the browser's viewer from its cookie and puts it in the request
/// extensions. A missing or unknown id gets a new viewer and a new cookie.
pub async fn attach_viewer(
    State(board): State<Arc<Board>>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(header::COOKIE)
        .and_then(|hv| hv.to_str().ok())
        .and_then(|cookies| {
            Cookie::split_parse(cookies)
                .filter_map(Result::ok)
                .find(|c| c.name() == VIEW_COOKIE)
                .map(|c| c.value().to_string())
        });

    let viewer = board.open_view(presented.as_deref()).await;
    let issued = presented.as_deref() != Some(viewer.id());
    let id = viewer.id().to_string();
    request.extensions_mut().insert(viewer);

    let mut response = next.run(request).await;
    if issued {
        let mut view_cookie = Cookie::new(VIEW_COOKIE, id);
        view_cookie.set_path("/");
        view_cookie.set_http_only(true);
        view_cookie.set_same_site(cookie::SameSite::Lax);
        match HeaderValue::from_str(&view_cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!("🍪 Could not set viewer cookie: {}", e),
        }
    }
    response
}
