use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{AccountRow, SessionUserRow};

pub const SQL_CREATE_ACCOUNTS: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
  user_id TEXT PRIMARY KEY,
  email TEXT NOT NULL UNIQUE COLLATE NOCASE,
  password_hash TEXT NOT NULL
)
"#;

pub const SQL_CREATE_SESSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
  token TEXT PRIMARY KEY,
  user_id TEXT NOT NULL REFERENCES accounts(user_id) ON DELETE CASCADE,
  created_at TEXT NOT NULL
)
"#;

const SQL_INSERT_ACCOUNT: &str = r#"
INSERT INTO accounts (
  user_id,
  email,
  password_hash
) VALUES (?1, ?2, ?3)
"#;

pub async fn insert_account(
    pool: &SqlitePool,
    user_id: &str,
    email: &str,
    password_hash: &str,
) -> sqlx::Result<()> {
    sqlx::query(SQL_INSERT_ACCOUNT)
        .bind(user_id)
        .bind(email)
        .bind(password_hash)
        .execute(pool)
        .await?;
    Ok(())
}

const SQL_LOAD_ACCOUNT_BY_EMAIL: &str = r#"
SELECT
  user_id,
  email,
  password_hash
FROM accounts
WHERE email = ?1
LIMIT 1
"#;

pub async fn load_account_by_email(
    pool: &SqlitePool,
    email: &str,
) -> sqlx::Result<Option<AccountRow>> {
    sqlx::query_as::<_, AccountRow>(SQL_LOAD_ACCOUNT_BY_EMAIL)
        .bind(email)
        .fetch_optional(pool)
        .await
}

const SQL_INSERT_SESSION: &str = r#"
INSERT INTO sessions (
  token,
  user_id,
  created_at
) VALUES (?1, ?2, ?3)
"#;

pub async fn insert_session(pool: &SqlitePool, token: &str, user_id: &str) -> sqlx::Result<()> {
    sqlx::query(SQL_INSERT_SESSION)
        .bind(token)
        .bind(user_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(())
}

const SQL_LOAD_SESSION_USER: &str = r#"
SELECT
  a.user_id,
  a.email
FROM sessions s
JOIN accounts a ON a.user_id = s.user_id
WHERE s.token = ?1
LIMIT 1
"#;

pub async fn load_session_user(
    pool: &SqlitePool,
    token: &str,
) -> sqlx::Result<Option<SessionUserRow>> {
    sqlx::query_as::<_, SessionUserRow>(SQL_LOAD_SESSION_USER)
        .bind(token)
        .fetch_optional(pool)
        .await
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> sqlx::Result<u64> {
    let res = sqlx::query("DELETE FROM sessions WHERE token = ?1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
