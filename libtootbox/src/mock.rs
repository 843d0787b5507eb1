//! Mock gateway and notifier for testing
//!
//! Available for all builds so integration tests and downstream
//! crates can drive the scheduler without a live instance.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ObservationError, PublishError};
use crate::remote::{Publisher, RateGate};
use crate::scheduler::Notifier;
use crate::types::UserCredentials;

/// A gateway with scripted eligibility and publish outcomes.
///
/// Every call is counted, and successful publishes record the body
/// they were given, so tests can assert both what was attempted and
/// what was delivered.
pub struct MockGateway {
    eligibility: Mutex<std::result::Result<bool, ObservationError>>,
    publish_result: Mutex<std::result::Result<String, PublishError>>,
    pub eligibility_calls: AtomicUsize,
    pub publish_calls: AtomicUsize,
    pub published: Mutex<Vec<(i64, String)>>,
}

impl MockGateway {
    /// Gateway that reports eligible and accepts every publish.
    pub fn eligible() -> Self {
        Self {
            eligibility: Mutex::new(Ok(true)),
            publish_result: Mutex::new(Ok("https://example.test/posts/1".to_string())),
            eligibility_calls: AtomicUsize::new(0),
            publish_calls: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Gateway that reports the cooldown as still running.
    pub fn ineligible() -> Self {
        let gateway = Self::eligible();
        *gateway.eligibility.lock().unwrap() = Ok(false);
        gateway
    }

    pub fn set_eligibility(&self, result: std::result::Result<bool, ObservationError>) {
        *self.eligibility.lock().unwrap() = result;
    }

    pub fn set_publish_result(&self, result: std::result::Result<String, PublishError>) {
        *self.publish_result.lock().unwrap() = result;
    }

    pub fn published_bodies(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }
}

#[async_trait]
impl RateGate for MockGateway {
    async fn is_eligible(
        &self,
        _creds: &UserCredentials,
    ) -> std::result::Result<bool, ObservationError> {
        self.eligibility_calls.fetch_add(1, Ordering::SeqCst);
        self.eligibility.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for MockGateway {
    async fn publish(
        &self,
        creds: &UserCredentials,
        body: &str,
    ) -> std::result::Result<String, PublishError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.publish_result.lock().unwrap().clone();
        if result.is_ok() {
            self.published
                .lock()
                .unwrap()
                .push((creds.user_id, body.to_string()));
        }
        result
    }
}

/// A notifier that remembers every message it was asked to deliver.
#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(i64, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages_for(&self, user_id: i64) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == user_id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: i64, text: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((user_id, text.to_string()));
    }
}
