use askama::Template;
use axum::{
    extract::State,
    Extension,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::BoardError;
use crate::services::board_service::Board;
use crate::services::viewer_service::Viewer;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub email: String,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

pub async fn login_page() -> Result<Html<String>, BoardError> {
    let template = LoginTemplate {
        email: String::new(),
        error: None,
    };
    Ok(Html(template.render()?))
}

pub async fn login_handler(
    State(board): State<Arc<Board>>,
    Extension(viewer): Extension<Arc<Viewer>>,
    Form(form): Form<LoginForm>,
) -> Result<Response, BoardError> {
    match board.sign_in(&viewer, &form.email, &form.password).await {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(e) => {
            // The board queued a notice too; drop it, the form shows the error.
            viewer.take_notice().await;
            let template = LoginTemplate {
                email: form.email,
                error: Some(e.to_string()),
            };
            Ok((StatusCode::UNAUTHORIZED, Html(template.render()?)).into_response())
        }
    }
}

pub async fn logout_handler(
    State(board): State<Arc<Board>>,
    Extension(viewer): Extension<Arc<Viewer>>,
) -> Redirect {
    board.sign_out(&viewer).await;
    Redirect::to("/")
}
