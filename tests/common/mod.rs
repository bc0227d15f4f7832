#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Notify};

use needs_nearby::database::Backend;
use needs_nearby::models::{Coordinate, NewPost, Post, Session, SessionEnded};
use needs_nearby::services::location_service::{PositionError, PositionOptions, PositionSource};
use needs_nearby::BoardError;

/// In-memory backend that records every call the board makes.
pub struct RecordingBackend {
    pub posts: Mutex<Vec<Post>>,
    pub inserts: Mutex<Vec<NewPost>>,
    pub deletes: Mutex<Vec<i64>>,
    pub fetch_calls: AtomicUsize,
    pub fail_fetch: AtomicBool,
    pub fail_insert: Mutex<Option<String>>,
    pub fail_delete: Mutex<Option<String>>,
    pub revoked: Mutex<HashSet<String>>,
    pub ended: broadcast::Sender<SessionEnded>,
    next_id: AtomicI64,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        let (ended, _) = broadcast::channel(16);
        Arc::new(Self {
            posts: Mutex::new(Vec::new()),
            inserts: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            fetch_calls: AtomicUsize::new(0),
            fail_fetch: AtomicBool::new(false),
            fail_insert: Mutex::new(None),
            fail_delete: Mutex::new(None),
            revoked: Mutex::new(HashSet::new()),
            ended,
            next_id: AtomicI64::new(1),
        })
    }

    pub fn seed(&self, text: &str, coord: Option<(f64, f64)>, owner: Option<&str>) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.posts.lock().unwrap().push(Post {
            id,
            text: text.to_string(),
            created_at: Utc::now(),
            lat: coord.map(|c| c.0),
            lng: coord.map(|c| c.1),
            owner: owner.map(str::to_string),
        });
        id
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn inserted(&self) -> Vec<NewPost> {
        self.inserts.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<i64> {
        self.deletes.lock().unwrap().clone()
    }

    /// Stops honouring `session`'s token, the way an expired JWT would be.
    pub fn revoke(&self, session: &Session) {
        self.revoked
            .lock()
            .unwrap()
            .insert(session.access_token.clone());
    }

    /// Announces that `session`'s token ended.
    pub fn end(&self, session: &Session) {
        let _ = self.ended.send(SessionEnded {
            access_token: session.access_token.clone(),
        });
    }

    fn is_revoked(&self, session: &Session) -> bool {
        self.revoked.lock().unwrap().contains(&session.access_token)
    }
}

pub fn session(user_id: &str) -> Session {
    Session {
        user_id: user_id.to_string(),
        email: Some(format!("{}@example.org", user_id)),
        access_token: format!("token-{}", user_id),
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn fetch_posts(&self) -> Result<Vec<Post>, BoardError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(BoardError::backend(503, "service unavailable"));
        }
        let mut posts = self.posts.lock().unwrap().clone();
        posts.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(posts)
    }

    async fn insert_post(
        &self,
        session: Option<&Session>,
        post: &NewPost,
    ) -> Result<(), BoardError> {
        self.inserts.lock().unwrap().push(post.clone());
        if let Some(message) = self.fail_insert.lock().unwrap().clone() {
            return Err(BoardError::backend(409, message));
        }
        if session.is_some_and(|s| self.is_revoked(s)) {
            return Err(BoardError::backend(401, "JWT expired"));
        }
        if post.owner.is_some() && post.owner.as_deref() != session.map(|s| s.user_id.as_str()) {
            return Err(BoardError::backend(403, "row-level security violation"));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.posts.lock().unwrap().push(Post {
            id,
            text: post.text.clone(),
            created_at: Utc::now(),
            lat: post.lat,
            lng: post.lng,
            owner: post.owner.clone(),
        });
        Ok(())
    }

    async fn delete_post(&self, session: &Session, id: i64) -> Result<(), BoardError> {
        self.deletes.lock().unwrap().push(id);
        if let Some(message) = self.fail_delete.lock().unwrap().clone() {
            return Err(BoardError::backend(403, message));
        }
        if self.is_revoked(session) {
            return Err(BoardError::backend(401, "JWT expired"));
        }
        let mut posts = self.posts.lock().unwrap();
        let before = posts.len();
        posts.retain(|p| !(p.id == id && p.owner.as_deref() == Some(session.user_id.as_str())));
        if posts.len() == before {
            return Err(BoardError::backend(404, "no matching row"));
        }
        Ok(())
    }

    async fn current_session(&self, session: &Session) -> Result<Option<Session>, BoardError> {
        if self.is_revoked(session) {
            return Ok(None);
        }
        Ok(Some(session.clone()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BoardError> {
        if password == "bad" {
            return Err(BoardError::backend(400, "Invalid login credentials"));
        }
        let user_id = email.split('@').next().unwrap_or(email);
        Ok(session(user_id))
    }

    async fn sign_out(&self, session: &Session) -> Result<(), BoardError> {
        self.end(session);
        Ok(())
    }

    fn subscribe_session_ends(&self) -> broadcast::Receiver<SessionEnded> {
        self.ended.subscribe()
    }
}

/// Position source that answers only once `release` is notified.
pub struct GatedPosition {
    pub release: Arc<Notify>,
    pub coordinate: Coordinate,
}

#[async_trait]
impl PositionSource for GatedPosition {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinate, PositionError> {
        self.release.notified().await;
        Ok(self.coordinate)
    }
}

/// Platform that never answers.
pub struct SilentPosition;

#[async_trait]
impl PositionSource for SilentPosition {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinate, PositionError> {
        std::future::pending().await
    }
}
