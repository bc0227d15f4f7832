use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{accounts_repo, posts_repo, Backend};
use crate::error::BoardError;
use crate::models::{NewPost, Post, Session, SessionEnded};

/// Local backend on SQLite. Sign-in issues an opaque token per browser, and
/// every write is authorized from that token, the way a hosted backend applies
/// row-level security to its JWT.
pub struct SqliteBackend {
    pool: SqlitePool,
    ended: broadcast::Sender<SessionEnded>,
}

impl SqliteBackend {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, BoardError> {
        let mut options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
        // Every connection to an in-memory database is its own database, and
        // closing the last one drops it.
        if database_url.contains(":memory:") {
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options.connect(database_url).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, BoardError> {
        for ddl in [
            posts_repo::SQL_CREATE_POSTS,
            accounts_repo::SQL_CREATE_ACCOUNTS,
            accounts_repo::SQL_CREATE_SESSIONS,
        ] {
            sqlx::query(ddl).execute(&pool).await?;
        }

        let (ended, _) = broadcast::channel(64);
        Ok(Self { pool, ended })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Registers a local account and returns its user id.
    pub async fn create_account(&self, email: &str, password: &str) -> Result<String, BoardError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(BoardError::backend(400, "email and password are required"));
        }
        let user_id = Uuid::new_v4().to_string();
        let hash = hash_password(password)?;
        accounts_repo::insert_account(&self.pool, &user_id, email, &hash).await?;
        info!("👤 Account created for {}", email);
        Ok(user_id)
    }

    /// User id behind `session`'s token. A token the database no longer knows
    /// is reported as ended.
    async fn authorize(&self, session: &Session) -> Result<String, BoardError> {
        match accounts_repo::load_session_user(&self.pool, &session.access_token).await? {
            Some(row) => Ok(row.user_id),
            None => {
                self.end(&session.access_token);
                Err(BoardError::backend(401, "session expired, sign in again"))
            }
        }
    }

    fn end(&self, token: &str) {
        // No subscribers is fine.
        let _ = self.ended.send(SessionEnded {
            access_token: token.to_string(),
        });
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn fetch_posts(&self) -> Result<Vec<Post>, BoardError> {
        Ok(posts_repo::list_posts(&self.pool).await?)
    }

    async fn insert_post(
        &self,
        session: Option<&Session>,
        post: &NewPost,
    ) -> Result<(), BoardError> {
        if let Some(owner) = post.owner.as_deref() {
            let user_id = match session {
                Some(s) => Some(self.authorize(s).await?),
                None => None,
            };
            if user_id.as_deref() != Some(owner) {
                return Err(BoardError::backend(
                    403,
                    "new row violates row-level security policy for table \"posts\"",
                ));
            }
        }
        let id = posts_repo::insert_post(&self.pool, post).await?;
        info!("📝 Post {} stored", id);
        Ok(())
    }

    async fn delete_post(&self, session: &Session, id: i64) -> Result<(), BoardError> {
        let user_id = self.authorize(session).await?;
        let deleted = posts_repo::delete_owned_post(&self.pool, id, &user_id).await?;
        if deleted == 0 {
            warn!("🗑️ Delete of post {} by {} matched nothing", id, user_id);
            return Err(BoardError::backend(
                404,
                format!("post {} does not exist or is not yours", id),
            ));
        }
        info!("🗑️ Post {} deleted", id);
        Ok(())
    }

    async fn current_session(&self, session: &Session) -> Result<Option<Session>, BoardError> {
        let row = accounts_repo::load_session_user(&self.pool, &session.access_token).await?;
        Ok(row.map(|row| Session {
            user_id: row.user_id,
            email: Some(row.email),
            access_token: session.access_token.clone(),
        }))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BoardError> {
        let Some(account) = accounts_repo::load_account_by_email(&self.pool, email.trim()).await?
        else {
            return Err(BoardError::InvalidCredentials);
        };
        verify_password(password, &account.password_hash)?;

        let token = Uuid::new_v4().to_string();
        accounts_repo::insert_session(&self.pool, &token, &account.user_id).await?;
        Ok(Session {
            user_id: account.user_id,
            email: Some(account.email),
            access_token: token,
        })
    }

    async fn sign_out(&self, session: &Session) -> Result<(), BoardError> {
        accounts_repo::delete_session(&self.pool, &session.access_token).await?;
        self.end(&session.access_token);
        Ok(())
    }

    fn subscribe_session_ends(&self) -> broadcast::Receiver<SessionEnded> {
        self.ended.subscribe()
    }
}

pub fn hash_password(password: &str) -> Result<String, BoardError> {
    let salt = SaltString::generate(rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| BoardError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<(), BoardError> {
    let parsed = PasswordHash::new(hash).map_err(|e| BoardError::PasswordHash(e.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| BoardError::InvalidCredentials)
}
