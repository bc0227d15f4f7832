use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::database::Backend;
use crate::models::{Post, Session, SessionEnded};
use crate::services::viewer_service::ViewerRegistry;

/// Who is signed in on one viewer. Drives what the page offers; the backend
/// makes the actual authorization decisions from the token.
#[derive(Default)]
pub struct SessionGate {
    current: RwLock<Option<Session>>,
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn set(&self, session: Option<Session>) {
        *self.current.write().await = session;
    }

    pub async fn take(&self) -> Option<Session> {
        self.current.write().await.take()
    }

    /// Clears the session if it holds `token`.
    pub async fn end_if_token(&self, token: &str) -> bool {
        let mut current = self.current.write().await;
        if current.as_ref().is_some_and(|s| s.access_token == token) {
            *current = None;
            return true;
        }
        false
    }

    /// Asks the backend whether the held session is still good. A failed
    /// query counts as signed out.
    pub async fn revalidate(&self, backend: &dyn Backend) -> Option<Session> {
        let held = self.current().await?;
        let checked = match backend.current_session(&held).await {
            Ok(s) => s,
            Err(e) => {
                warn!("🔐 Could not check session of {}: {}", held.display_name(), e);
                None
            }
        };
        // Only replace what was checked; a sign-in meanwhile wins.
        let mut current = self.current.write().await;
        if current.as_ref() == Some(&held) {
            *current = checked.clone();
        }
        checked
    }
}

/// Signs viewers out as the backend ends their tokens, until the task is
/// aborted, which also drops the subscription.
pub fn spawn_session_listener(
    viewers: Arc<ViewerRegistry>,
    mut ends: broadcast::Receiver<SessionEnded>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match ends.recv().await {
                Ok(SessionEnded { access_token }) => {
                    let count = viewers.end_session(&access_token).await;
                    if count > 0 {
                        info!("🔐 Session ended on {} viewer(s)", count);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("🔐 Missed {} session events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Whether to offer a delete control for `post`. Cosmetic only.
pub fn can_delete(session: Option<&Session>, post: &Post) -> bool {
    match (session, post.owner.as_deref()) {
        (Some(s), Some(owner)) => s.user_id == owner,
        _ => false,
    }
}
