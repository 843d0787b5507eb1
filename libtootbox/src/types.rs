//! Core types for Tootbox

use serde::{Deserialize, Serialize};

/// A single durably-queued item awaiting publication.
///
/// `key` is assigned by the database and is unique within a user's
/// queue even when two flushes land in the same clock second.
/// FIFO order is `(created_at, key)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueuedItem {
    pub key: i64,
    pub user_id: i64,
    pub created_at: i64,
    pub body: String,
}

/// The two credentials needed to act on a user's behalf, plus the
/// chat identity they belong to. Snapshots of this struct are copied
/// out of the settings store per scheduler cycle; nothing mutates a
/// snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserCredentials {
    pub user_id: i64,
    pub access_token: String,
    pub instance_host: String,
}

impl UserCredentials {
    /// Instance base URL with an https:// prefix, however the host
    /// was entered.
    pub fn instance_url(&self) -> String {
        if self.instance_host.starts_with("http://") || self.instance_host.starts_with("https://") {
            self.instance_host.clone()
        } else {
            format!("https://{}", self.instance_host)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_url_adds_scheme() {
        let creds = UserCredentials {
            user_id: 1,
            access_token: "token".to_string(),
            instance_host: "mastodon.social".to_string(),
        };
        assert_eq!(creds.instance_url(), "https://mastodon.social");
    }

    #[test]
    fn test_instance_url_preserves_scheme() {
        let creds = UserCredentials {
            user_id: 1,
            access_token: "token".to_string(),
            instance_host: "http://localhost:3000".to_string(),
        };
        assert_eq!(creds.instance_url(), "http://localhost:3000");

        let creds = UserCredentials {
            instance_host: "https://fosstodon.org".to_string(),
            ..creds
        };
        assert_eq!(creds.instance_url(), "https://fosstodon.org");
    }

    #[test]
    fn test_queued_item_serialization() {
        let item = QueuedItem {
            key: 7,
            user_id: 42,
            created_at: 1234567890,
            body: "hello\n\nworld".to_string(),
        };

        let json = serde_json::to_string(&item).unwrap();
        let deserialized: QueuedItem = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, item);
    }
}
