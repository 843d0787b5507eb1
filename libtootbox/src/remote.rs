//! Remote rate gating
//!
//! Eligibility to post is decided from the remote account's own
//! timeline, never from local bookkeeping. A user may post when the
//! cooldown has fully elapsed since their most recent original
//! (non-reply) status. Posts made outside this relay count, because
//! they appear on the timeline like any other.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::{ObservationError, PublishError};
use crate::types::UserCredentials;

/// The slice of a remote status the gate actually inspects.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub created_at: DateTime<Utc>,
    pub is_reply: bool,
}

/// Timestamp of the most recent original post among the given
/// statuses. Replies never count. An account with no original posts
/// at all is indistinguishable from a failed observation, so it is
/// reported as an error rather than treated as eligible.
pub fn last_original_post(
    statuses: &[StatusSnapshot],
) -> std::result::Result<DateTime<Utc>, ObservationError> {
    statuses
        .iter()
        .filter(|s| !s.is_reply)
        .map(|s| s.created_at)
        .max()
        .ok_or(ObservationError::NoOriginalPost)
}

/// True when at least `cooldown` has passed since `last_post` as of
/// `now`. Exactly at the boundary counts as eligible.
pub fn cooldown_elapsed(last_post: DateTime<Utc>, now: DateTime<Utc>, cooldown: Duration) -> bool {
    now - last_post >= cooldown
}

/// Decides whether a user's remote account is currently allowed to
/// receive a post.
#[async_trait]
pub trait RateGate: Send + Sync {
    async fn is_eligible(
        &self,
        creds: &UserCredentials,
    ) -> std::result::Result<bool, ObservationError>;
}

/// Delivers one body of text to the user's remote account. On
/// success, returns a URL or other human-readable reference to the
/// created post.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        creds: &UserCredentials,
        body: &str,
    ) -> std::result::Result<String, PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_last_original_post_skips_replies() {
        let statuses = vec![
            StatusSnapshot {
                created_at: at(12),
                is_reply: true,
            },
            StatusSnapshot {
                created_at: at(9),
                is_reply: false,
            },
            StatusSnapshot {
                created_at: at(7),
                is_reply: false,
            },
        ];

        let last = last_original_post(&statuses).unwrap();
        assert_eq!(last, at(9));
    }

    #[test]
    fn test_no_original_posts_is_an_error() {
        let only_replies = vec![StatusSnapshot {
            created_at: at(10),
            is_reply: true,
        }];

        assert!(matches!(
            last_original_post(&only_replies),
            Err(ObservationError::NoOriginalPost)
        ));
        assert!(matches!(
            last_original_post(&[]),
            Err(ObservationError::NoOriginalPost)
        ));
    }

    #[test]
    fn test_cooldown_boundary_is_eligible() {
        let cooldown = Duration::hours(4);

        assert!(!cooldown_elapsed(at(8), at(11), cooldown));
        // One second short of the cooldown is still ineligible;
        // exactly at the boundary is eligible
        assert!(!cooldown_elapsed(
            at(8),
            at(12) - Duration::seconds(1),
            cooldown
        ));
        assert!(cooldown_elapsed(at(8), at(12), cooldown));
        assert!(cooldown_elapsed(at(8), at(13), cooldown));
    }
}
