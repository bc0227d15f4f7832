use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::BoardError;
use crate::models::{NewPost, Post, Session, SessionEnded};

pub mod accounts_repo;
pub mod posts_repo;
pub mod rest_backend;
pub mod sqlite_backend;

pub use rest_backend::RestBackend;
pub use sqlite_backend::SqliteBackend;

/// The calls the board makes against its backend.
///
/// Writes carry the caller's session; ownership and access policy are decided
/// here from its token, never from anything the board checked itself.
#[async_trait]
pub trait Backend: Send + Sync {
    /// All posts, newest (highest id) first.
    async fn fetch_posts(&self) -> Result<Vec<Post>, BoardError>;

    /// Inserts as `session`'s user, or anonymously when `None`.
    async fn insert_post(&self, session: Option<&Session>, post: &NewPost)
        -> Result<(), BoardError>;

    async fn delete_post(&self, session: &Session, id: i64) -> Result<(), BoardError>;

    /// Re-checks a session obtained earlier; `None` once it is no longer valid.
    async fn current_session(&self, session: &Session) -> Result<Option<Session>, BoardError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BoardError>;

    async fn sign_out(&self, session: &Session) -> Result<(), BoardError>;

    /// Tokens the backend stopped honouring. Dropping the receiver
    /// unsubscribes.
    fn subscribe_session_ends(&self) -> broadcast::Receiver<SessionEnded>;
}
