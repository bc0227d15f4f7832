use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::database::Backend;
use crate::error::BoardError;
use crate::models::{NewPost, Post, Session, SessionEnded};

const POST_COLUMNS: &str = "id,text,created_at,lat,lng,owner";

/// Hosted backend-as-a-service: PostgREST for rows, GoTrue for auth. Each
/// browser's calls run with that browser's access token.
pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    table: String,
    ended: broadcast::Sender<SessionEnded>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: String,
    email: Option<String>,
}

#[derive(Deserialize)]
struct JwtPayload {
    exp: Option<i64>,
}

impl RestBackend {
    pub fn new(base_url: &str, anon_key: &str, table: &str) -> Self {
        let (ended, _) = broadcast::channel(64);
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            table: table.to_string(),
            ended,
        }
    }

    fn rest_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    // Row calls run as the signed-in user when there is one, else anonymously.
    fn headers(&self, token: Option<&str>) -> HeaderMap {
        let bearer = token.unwrap_or(&self.anon_key);
        let mut headers = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", v);
        }
        if let Ok(v) = HeaderValue::from_str(&format!("Bearer {}", bearer)) {
            headers.insert(AUTHORIZATION, v);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    async fn send(&self, req: RequestBuilder, token: Option<&str>) -> Result<Response, BoardError> {
        let resp = req.headers(self.headers(token)).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        self.note_rejection(status, token);
        let body: Option<Value> = resp.json().await.ok();
        Err(BoardError::backend(
            status.as_u16(),
            error_message(status, body.as_ref()),
        ))
    }

    /// A 401 on a call made with a user token means the service dropped that
    /// session.
    fn note_rejection(&self, status: StatusCode, token: Option<&str>) {
        if let Some(token) = rejected_token(status, token) {
            warn!("🔐 Backend rejected an access token, ending its session");
            self.end(token);
        }
    }

    fn end(&self, token: &str) {
        let _ = self.ended.send(SessionEnded {
            access_token: token.to_string(),
        });
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn fetch_posts(&self) -> Result<Vec<Post>, BoardError> {
        let req = self
            .client
            .get(self.rest_url())
            .query(&[("select", POST_COLUMNS), ("order", "id.desc")]);
        let resp = self.send(req, None).await?;
        Ok(resp.json::<Vec<Post>>().await?)
    }

    async fn insert_post(
        &self,
        session: Option<&Session>,
        post: &NewPost,
    ) -> Result<(), BoardError> {
        let req = self
            .client
            .post(self.rest_url())
            .header("Prefer", "return=minimal")
            .json(&[post]);
        self.send(req, session.map(|s| s.access_token.as_str()))
            .await?;
        Ok(())
    }

    async fn delete_post(&self, session: &Session, id: i64) -> Result<(), BoardError> {
        let req = self
            .client
            .delete(self.rest_url())
            .query(&[("id", format!("eq.{}", id))]);
        self.send(req, Some(&session.access_token)).await?;
        Ok(())
    }

    async fn current_session(&self, session: &Session) -> Result<Option<Session>, BoardError> {
        if token_expired(&session.access_token, chrono::Utc::now().timestamp()) {
            info!("🔐 Access token for {} expired", session.display_name());
            self.end(&session.access_token);
            return Ok(None);
        }
        Ok(Some(session.clone()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BoardError> {
        let req = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({
                "email": email.trim(),
                "password": password,
            }));
        let resp = self.send(req, None).await?;
        let token: TokenResponse = resp.json().await?;

        let session = Session {
            user_id: token.user.id,
            email: token.user.email,
            access_token: token.access_token,
        };
        info!("🔐 Signed in as {}", session.display_name());
        Ok(session)
    }

    async fn sign_out(&self, session: &Session) -> Result<(), BoardError> {
        let result = self
            .send(
                self.client.post(self.auth_url("logout")),
                Some(&session.access_token),
            )
            .await
            .map(|_| ());
        // Ended here whatever the service said.
        self.end(&session.access_token);
        result
    }

    fn subscribe_session_ends(&self) -> broadcast::Receiver<SessionEnded> {
        self.ended.subscribe()
    }
}

fn rejected_token(status: StatusCode, token: Option<&str>) -> Option<&str> {
    token.filter(|_| status == StatusCode::UNAUTHORIZED)
}

/// Pulls the human-readable message out of a PostgREST or GoTrue error body.
fn error_message(status: StatusCode, body: Option<&Value>) -> String {
    ["message", "error_description", "msg", "error"]
        .iter()
        .find_map(|key| {
            body.and_then(|b| b.get(*key))
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("backend returned {}", status))
}

fn token_expired(token: &str, now: i64) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return false;
    }
    let Ok(payload_bytes) = general_purpose::URL_SAFE_NO_PAD.decode(parts[1]) else {
        return false;
    };
    match serde_json::from_slice::<JwtPayload>(&payload_bytes) {
        Ok(JwtPayload { exp: Some(exp) }) => exp <= now,
        _ => false,
    }
}
