//! Mastodon gateway
//!
//! Implements both the rate gate and the publisher on top of the
//! megalodon library. A fresh client is built per call from the
//! user's stored credentials; nothing about the remote account is
//! cached between cycles, so a revoked token or a post made from
//! another app is observed on the next cycle.

use async_trait::async_trait;
use chrono::Duration;
use megalodon::SNS;

use crate::error::{ObservationError, PublishError};
use crate::remote::{self, Publisher, RateGate, StatusSnapshot};
use crate::types::UserCredentials;

pub struct MastodonGateway {
    cooldown: Duration,
}

impl MastodonGateway {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    fn client(
        &self,
        creds: &UserCredentials,
    ) -> std::result::Result<Box<dyn megalodon::Megalodon + Send + Sync>, ObservationError> {
        megalodon::generator(
            SNS::Mastodon,
            creds.instance_url(),
            Some(creds.access_token.clone()),
            None,
        )
        .map_err(|e| {
            ObservationError::MalformedResponse(format!("failed to create client: {:?}", e))
        })
    }

    /// Recent statuses of the authenticated account, reduced to the
    /// fields the gate inspects.
    async fn recent_statuses(
        &self,
        creds: &UserCredentials,
    ) -> std::result::Result<Vec<StatusSnapshot>, ObservationError> {
        let client = self.client(creds)?;

        let account = client
            .verify_account_credentials()
            .await
            .map_err(map_observation_error)?;

        let statuses = client
            .get_account_statuses(account.json.id, None)
            .await
            .map_err(map_observation_error)?;

        Ok(statuses
            .json
            .iter()
            .map(|status| StatusSnapshot {
                created_at: status.created_at,
                is_reply: status.in_reply_to_id.is_some(),
            })
            .collect())
    }
}

#[async_trait]
impl RateGate for MastodonGateway {
    async fn is_eligible(
        &self,
        creds: &UserCredentials,
    ) -> std::result::Result<bool, ObservationError> {
        let statuses = self.recent_statuses(creds).await?;
        let last_post = remote::last_original_post(&statuses)?;
        Ok(remote::cooldown_elapsed(
            last_post,
            chrono::Utc::now(),
            self.cooldown,
        ))
    }
}

#[async_trait]
impl Publisher for MastodonGateway {
    async fn publish(
        &self,
        creds: &UserCredentials,
        body: &str,
    ) -> std::result::Result<String, PublishError> {
        let client = self.client(creds).map_err(|e| PublishError {
            status_code: None,
            message: e.to_string(),
        })?;

        let response = client
            .post_status(body.to_string(), None)
            .await
            .map_err(map_publish_error)?;

        let reference = match response.json {
            megalodon::megalodon::PostStatusOutput::Status(status) => {
                status.url.unwrap_or(status.uri)
            }
            megalodon::megalodon::PostStatusOutput::ScheduledStatus(scheduled) => {
                format!("scheduled status {}", scheduled.id)
            }
        };

        Ok(reference)
    }
}

fn map_observation_error(error: megalodon::error::Error) -> ObservationError {
    let error_str = error.to_string();

    match extract_http_status(&error_str) {
        Some(status) => ObservationError::Http {
            status,
            message: error_str,
        },
        None => {
            let lower = error_str.to_lowercase();
            if lower.contains("parse") || lower.contains("json") || lower.contains("deserialize") {
                ObservationError::MalformedResponse(error_str)
            } else {
                ObservationError::Network(error_str)
            }
        }
    }
}

fn map_publish_error(error: megalodon::error::Error) -> PublishError {
    let error_str = error.to_string();

    PublishError {
        status_code: extract_http_status(&error_str),
        message: error_str,
    }
}

/// Pull an HTTP status code out of an error message, if one is
/// present. Looks for "HTTP 401", "status 403", "429:" and the like.
fn extract_http_status(error_str: &str) -> Option<u16> {
    let prefixes = ["HTTP ", "status ", "code: ", "status_code: "];

    for prefix in &prefixes {
        if let Some(pos) = error_str.find(prefix) {
            let after_prefix = &error_str[pos + prefix.len()..];
            if let Some(code_str) = after_prefix.get(0..3) {
                if let Ok(code) = code_str.parse::<u16>() {
                    if (100..=599).contains(&code) {
                        return Some(code);
                    }
                }
            }
        }
    }

    for (i, window) in error_str.as_bytes().windows(4).enumerate() {
        if window[0].is_ascii_digit()
            && window[1].is_ascii_digit()
            && window[2].is_ascii_digit()
            && (window[3] == b':' || window[3] == b' ')
        {
            if let Ok(code_str) = std::str::from_utf8(&window[0..3]) {
                if let Ok(code) = code_str.parse::<u16>() {
                    if (100..=599).contains(&code) {
                        // Guard against matching the tail of a longer number
                        if i == 0 || !error_str.as_bytes()[i - 1].is_ascii_digit() {
                            return Some(code);
                        }
                    }
                }
            }
        }
    }

    None
}
