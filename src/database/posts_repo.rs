use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{NewPost, Post};

pub const SQL_CREATE_POSTS: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  text TEXT NOT NULL,
  created_at TEXT NOT NULL,
  lat REAL,
  lng REAL,
  owner TEXT
)
"#;

const SQL_LIST_POSTS: &str = r#"
SELECT
  id,
  text,
  created_at,
  lat,
  lng,
  owner
FROM posts
ORDER BY id DESC
"#;

pub async fn list_posts(pool: &SqlitePool) -> sqlx::Result<Vec<Post>> {
    sqlx::query_as::<_, Post>(SQL_LIST_POSTS)
        .fetch_all(pool)
        .await
}

const SQL_INSERT_POST: &str = r#"
INSERT INTO posts (
  text,
  created_at,
  lat,
  lng,
  owner
) VALUES (?1, ?2, ?3, ?4, ?5)
"#;

pub async fn insert_post(pool: &SqlitePool, post: &NewPost) -> sqlx::Result<i64> {
    let res = sqlx::query(SQL_INSERT_POST)
        .bind(&post.text)
        .bind(Utc::now())
        .bind(post.lat)
        .bind(post.lng)
        .bind(post.owner.as_deref())
        .execute(pool)
        .await?;
    Ok(res.last_insert_rowid())
}

// Owner-only delete; the owner predicate plays the part of a row-level policy.
const SQL_DELETE_OWNED_POST: &str = r#"
DELETE FROM posts
WHERE id = ?1
  AND owner = ?2
"#;

pub async fn delete_owned_post(pool: &SqlitePool, id: i64, owner: &str) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_DELETE_OWNED_POST)
        .bind(id)
        .bind(owner)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
