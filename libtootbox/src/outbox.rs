//! Durable per-user outbox
//!
//! One row per queued item; the outbox is the sole writer and deleter
//! of `queue_items`. Items leave the queue only through
//! [`Outbox::remove_confirmed`], after the scheduler has seen a
//! successful publish.

use sqlx::Row;

use crate::db::Database;
use crate::error::{DbError, Result};
use crate::types::QueuedItem;

#[derive(Clone)]
pub struct Outbox {
    db: Database,
}

impl Outbox {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Durably append a new item for the user. The returned item
    /// carries the database-assigned key, which is unique within the
    /// user's queue even for back-to-back calls in the same second.
    pub async fn enqueue(&self, user_id: i64, body: String) -> Result<QueuedItem> {
        let created_at = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO queue_items (user_id, created_at, body)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(created_at)
        .bind(&body)
        .execute(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        Ok(QueuedItem {
            key: result.last_insert_rowid(),
            user_id,
            created_at,
            body,
        })
    }

    /// Return the oldest queued item for the user without removing
    /// it. Ties on created_at resolve by insertion order.
    pub async fn peek_oldest(&self, user_id: i64) -> Result<Option<QueuedItem>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, created_at, body
            FROM queue_items
            WHERE user_id = ?
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| QueuedItem {
            key: r.get("id"),
            user_id: r.get("user_id"),
            created_at: r.get("created_at"),
            body: r.get("body"),
        }))
    }

    /// Durably delete the identified item. Idempotent: removing an
    /// already-absent key is a no-op, so a retry after a crash
    /// between publish and delete cannot fail here.
    pub async fn remove_confirmed(&self, user_id: i64, key: i64) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM queue_items WHERE user_id = ? AND id = ?
            "#,
        )
        .bind(user_id)
        .bind(key)
        .execute(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Distinct users that currently have at least one queued item.
    pub async fn users_with_pending(&self) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT user_id FROM queue_items ORDER BY user_id
            "#,
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(|r| r.get("user_id")).collect())
    }

    /// Number of items queued for the user.
    pub async fn pending_count(&self, user_id: i64) -> Result<u64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM queue_items WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.0 as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_outbox() -> Outbox {
        Outbox::new(Database::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_peek_empty_queue() {
        let outbox = test_outbox().await;
        assert_eq!(outbox.peek_oldest(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let outbox = test_outbox().await;

        let first = outbox.enqueue(1, "first".to_string()).await.unwrap();
        let second = outbox.enqueue(1, "second".to_string()).await.unwrap();
        let third = outbox.enqueue(1, "third".to_string()).await.unwrap();

        let oldest = outbox.peek_oldest(1).await.unwrap().unwrap();
        assert_eq!(oldest.key, first.key);
        assert_eq!(oldest.body, "first");

        outbox.remove_confirmed(1, first.key).await.unwrap();
        let oldest = outbox.peek_oldest(1).await.unwrap().unwrap();
        assert_eq!(oldest.key, second.key);

        outbox.remove_confirmed(1, second.key).await.unwrap();
        let oldest = outbox.peek_oldest(1).await.unwrap().unwrap();
        assert_eq!(oldest.key, third.key);
    }

    #[tokio::test]
    async fn test_keys_unique_within_same_second() {
        let outbox = test_outbox().await;

        // Back-to-back enqueues will share a created_at timestamp;
        // the database key must still distinguish them and FIFO must
        // fall back to insertion order.
        let a = outbox.enqueue(1, "a".to_string()).await.unwrap();
        let b = outbox.enqueue(1, "b".to_string()).await.unwrap();

        assert_ne!(a.key, b.key);
        assert!(b.key > a.key);

        let oldest = outbox.peek_oldest(1).await.unwrap().unwrap();
        assert_eq!(oldest.body, "a");
    }

    #[tokio::test]
    async fn test_remove_confirmed_is_idempotent() {
        let outbox = test_outbox().await;

        let item = outbox.enqueue(1, "once".to_string()).await.unwrap();
        outbox.remove_confirmed(1, item.key).await.unwrap();
        assert_eq!(outbox.peek_oldest(1).await.unwrap(), None);

        // Second removal of the same key is a no-op, not an error
        let result = outbox.remove_confirmed(1, item.key).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_remove_requires_matching_user() {
        let outbox = test_outbox().await;

        let item = outbox.enqueue(1, "mine".to_string()).await.unwrap();

        // A different user's removal must not touch the item
        outbox.remove_confirmed(2, item.key).await.unwrap();
        assert!(outbox.peek_oldest(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_users_with_pending() {
        let outbox = test_outbox().await;

        assert!(outbox.users_with_pending().await.unwrap().is_empty());

        outbox.enqueue(3, "x".to_string()).await.unwrap();
        outbox.enqueue(1, "y".to_string()).await.unwrap();
        outbox.enqueue(3, "z".to_string()).await.unwrap();

        let users = outbox.users_with_pending().await.unwrap();
        assert_eq!(users, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_pending_count() {
        let outbox = test_outbox().await;

        assert_eq!(outbox.pending_count(1).await.unwrap(), 0);

        outbox.enqueue(1, "a".to_string()).await.unwrap();
        let item = outbox.enqueue(1, "b".to_string()).await.unwrap();
        outbox.enqueue(2, "other".to_string()).await.unwrap();

        assert_eq!(outbox.pending_count(1).await.unwrap(), 2);

        outbox.remove_confirmed(1, item.key).await.unwrap();
        assert_eq!(outbox.pending_count(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_queues_are_per_user() {
        let outbox = test_outbox().await;

        outbox.enqueue(1, "for one".to_string()).await.unwrap();
        outbox.enqueue(2, "for two".to_string()).await.unwrap();

        assert_eq!(outbox.peek_oldest(1).await.unwrap().unwrap().body, "for one");
        assert_eq!(outbox.peek_oldest(2).await.unwrap().unwrap().body, "for two");
    }
}
