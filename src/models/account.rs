#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub user_id: String,
    pub email: String,
    pub password_hash: String,
}

// Account behind a live session token.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionUserRow {
    pub user_id: String,
    pub email: String,
}
