//! Scheduler-to-Telegram notifications
//!
//! The scheduler reports publish results through this notifier. A
//! private chat's id equals the user's id, so messages go straight to
//! the DM. Failures are logged and dropped; the queue has already
//! moved on by the time a notification is sent.

use async_trait::async_trait;
use libtootbox::Notifier;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::warn;

pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, user_id: i64, text: &str) {
        if let Err(e) = self
            .bot
            .send_message(ChatId(user_id), text.to_string())
            .await
        {
            warn!(user_id, error = %e, "failed to deliver notification");
        }
    }
}
