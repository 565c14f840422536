//! Document database: user profiles, notifications and activity records

use regolith_common::models::UserInfo;
use regolith_common::{Error, Result};
use sqlx::SqlitePool;

/// A user profile row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DbUser {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub non_secret_password: String,
    pub data_collection: bool,
    pub expiration_unix_sec: i64,
}

impl DbUser {
    pub fn info(&self) -> UserInfo {
        UserInfo::new(&self.user_id, &self.name, &self.email)
    }
}

pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            non_secret_password TEXT NOT NULL DEFAULT '',
            data_collection INTEGER NOT NULL DEFAULT 0,
            expiration_unix_sec INTEGER NOT NULL DEFAULT 0,
            notification_prefs TEXT NOT NULL DEFAULT '{}'
        );
        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            contents TEXT NOT NULL DEFAULT '',
            sent_unix_sec INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS activity_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            method TEXT NOT NULL,
            path TEXT NOT NULL,
            status INTEGER NOT NULL,
            recorded_unix_sec INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_user(pool: &SqlitePool, user_id: &str) -> Result<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(
        "SELECT user_id, name, email, non_secret_password, data_collection, expiration_unix_sec \
         FROM users WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn upsert_user(pool: &SqlitePool, user: &DbUser) -> Result<()> {
    sqlx::query(
        "INSERT INTO users (user_id, name, email, non_secret_password, data_collection, expiration_unix_sec) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT(user_id) DO UPDATE SET \
           name = excluded.name, email = excluded.email, \
           non_secret_password = excluded.non_secret_password, \
           data_collection = excluded.data_collection, \
           expiration_unix_sec = excluded.expiration_unix_sec",
    )
    .bind(&user.user_id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.non_secret_password)
    .bind(user.data_collection)
    .bind(user.expiration_unix_sec)
    .execute(pool)
    .await?;
    Ok(())
}

/// Current name/email for a creator id, for refreshing persisted summaries
pub async fn creator_details(pool: &SqlitePool, user_id: &str) -> Result<UserInfo> {
    get_user(pool, user_id)
        .await?
        .map(|u| u.info())
        .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))
}

pub async fn data_collection_enabled(pool: &SqlitePool, user_id: &str) -> Result<bool> {
    Ok(get_user(pool, user_id)
        .await?
        .map(|u| u.data_collection)
        .unwrap_or(false))
}

pub async fn insert_notification(
    pool: &SqlitePool,
    user_id: &str,
    subject: &str,
    contents: &str,
    sent_unix_sec: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO notifications (user_id, subject, contents, sent_unix_sec) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(subject)
    .bind(contents)
    .bind(sent_unix_sec)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_activity(
    pool: &SqlitePool,
    user_id: &str,
    method: &str,
    path: &str,
    status: u16,
    recorded_unix_sec: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO activity_log (user_id, method, path, status, recorded_unix_sec) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(method)
    .bind(path)
    .bind(status as i64)
    .bind(recorded_unix_sec)
    .execute(pool)
    .await?;
    Ok(())
}
