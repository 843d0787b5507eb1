//! Per-user credential storage
//!
//! Access tokens and instance hosts arrive as chat messages, so both
//! go through the same sanitization before persisting: take the first
//! line, trim surrounding whitespace. Hosts additionally drop any
//! scheme prefix so the stored value is a bare hostname.

use sqlx::Row;

use crate::db::Database;
use crate::error::{DbError, Result, TootboxError};
use crate::types::UserCredentials;

#[derive(Clone)]
pub struct SettingsStore {
    db: Database,
}

impl SettingsStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store the user's access token, replacing any previous one.
    /// The instance host, if set, is untouched.
    pub async fn set_access_token(&self, user_id: i64, raw: &str) -> Result<()> {
        let token = sanitize_line(raw);
        if token.is_empty() {
            return Err(TootboxError::InvalidInput(
                "access token is empty".to_string(),
            ));
        }
        self.upsert(user_id, Some(&token), None).await
    }

    /// Store the user's instance host, replacing any previous one.
    /// The access token, if set, is untouched.
    pub async fn set_instance_host(&self, user_id: i64, raw: &str) -> Result<()> {
        let host = normalize_host(&sanitize_line(raw));
        if host.is_empty() {
            return Err(TootboxError::InvalidInput(
                "instance host is empty".to_string(),
            ));
        }
        self.upsert(user_id, None, Some(&host)).await
    }

    async fn upsert(&self, user_id: i64, token: Option<&str>, host: Option<&str>) -> Result<()> {
        let updated_at = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO user_settings (user_id, access_token, instance_host, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (user_id) DO UPDATE SET
                access_token = COALESCE(excluded.access_token, access_token),
                instance_host = COALESCE(excluded.instance_host, instance_host),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(host)
        .bind(updated_at)
        .execute(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Full credentials for the user, or `None` while either half is
    /// still missing.
    pub async fn credentials(&self, user_id: i64) -> Result<Option<UserCredentials>> {
        let row = sqlx::query(
            r#"
            SELECT access_token, instance_host
            FROM user_settings
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let token: Option<String> = row.get("access_token");
        let host: Option<String> = row.get("instance_host");

        match (token, host) {
            (Some(token), Some(host)) if !token.is_empty() && !host.is_empty() => {
                Ok(Some(UserCredentials {
                    user_id,
                    access_token: token,
                    instance_host: host,
                }))
            }
            _ => Ok(None),
        }
    }
}

/// First line of the input, trimmed. Pasted tokens often carry a
/// trailing newline or stray second line from the chat client.
fn sanitize_line(raw: &str) -> String {
    raw.lines().next().unwrap_or("").trim().to_string()
}

/// Strip a scheme prefix and trailing slashes so users can paste a
/// full instance URL where a hostname is expected.
fn normalize_host(host: &str) -> String {
    let host = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host);
    host.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SettingsStore {
        SettingsStore::new(Database::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_credentials_missing_until_both_set() {
        let store = test_store().await;

        assert!(store.credentials(1).await.unwrap().is_none());

        store.set_access_token(1, "tok123").await.unwrap();
        assert!(store.credentials(1).await.unwrap().is_none());

        store.set_instance_host(1, "mastodon.social").await.unwrap();
        let creds = store.credentials(1).await.unwrap().unwrap();
        assert_eq!(creds.access_token, "tok123");
        assert_eq!(creds.instance_host, "mastodon.social");
    }

    #[tokio::test]
    async fn test_replacing_token_keeps_host() {
        let store = test_store().await;

        store.set_instance_host(1, "mastodon.social").await.unwrap();
        store.set_access_token(1, "old").await.unwrap();
        store.set_access_token(1, "new").await.unwrap();

        let creds = store.credentials(1).await.unwrap().unwrap();
        assert_eq!(creds.access_token, "new");
        assert_eq!(creds.instance_host, "mastodon.social");
    }

    #[tokio::test]
    async fn test_sanitizes_multiline_input() {
        let store = test_store().await;

        store.set_access_token(1, "  tok456  \nextra junk").await.unwrap();
        store.set_instance_host(1, "fosstodon.org\n").await.unwrap();

        let creds = store.credentials(1).await.unwrap().unwrap();
        assert_eq!(creds.access_token, "tok456");
        assert_eq!(creds.instance_host, "fosstodon.org");
    }

    #[tokio::test]
    async fn test_host_scheme_stripped() {
        let store = test_store().await;

        store.set_access_token(1, "tok").await.unwrap();
        store
            .set_instance_host(1, "https://mastodon.social/")
            .await
            .unwrap();

        let creds = store.credentials(1).await.unwrap().unwrap();
        assert_eq!(creds.instance_host, "mastodon.social");
        assert_eq!(creds.instance_url(), "https://mastodon.social");
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let store = test_store().await;

        let result = store.set_access_token(1, "   \n").await;
        assert!(matches!(result, Err(TootboxError::InvalidInput(_))));

        let result = store.set_instance_host(1, "").await;
        assert!(matches!(result, Err(TootboxError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_settings_are_per_user() {
        let store = test_store().await;

        store.set_access_token(1, "one").await.unwrap();
        store.set_instance_host(1, "a.example").await.unwrap();
        store.set_access_token(2, "two").await.unwrap();
        store.set_instance_host(2, "b.example").await.unwrap();

        assert_eq!(store.credentials(1).await.unwrap().unwrap().access_token, "one");
        assert_eq!(store.credentials(2).await.unwrap().unwrap().access_token, "two");
    }
}
