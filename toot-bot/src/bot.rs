//! Telegram front end
//!
//! One dispatcher handles commands and freeform text in private
//! chats. Freeform messages feed the per-user buffer; commands manage
//! credentials and move the buffer into the durable queue. Group and
//! channel messages are ignored entirely.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use libtootbox::{InputAccumulator, Outbox, SettingsStore, TootboxError};
use teloxide::prelude::*;
use teloxide::types::ChatKind;
use teloxide::utils::command::BotCommands;
use tracing::{debug, warn};

/// What the next freeform message from a user will be interpreted as.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Pending {
    AccessToken,
    InstanceHost,
}

pub struct AppState {
    pub outbox: Outbox,
    pub settings: SettingsStore,
    pub accumulator: InputAccumulator,
    pending: Mutex<HashMap<i64, Pending>>,
}

impl AppState {
    pub fn new(outbox: Outbox, settings: SettingsStore, accumulator: InputAccumulator) -> Self {
        Self {
            outbox,
            settings,
            accumulator,
            pending: Mutex::new(HashMap::new()),
        }
    }
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    #[command(description = "set your Mastodon access token")]
    Token,
    #[command(description = "set your Mastodon instance domain")]
    Domain,
    #[command(description = "queue the buffered messages for posting")]
    Send,
    #[command(description = "show how many posts are waiting")]
    Queue,
    #[command(description = "throw away the current buffer")]
    Discard,
    #[command(description = "show this help")]
    Help,
}

/// Build the dispatcher for the bot. Call `dispatch()` on the result
/// to start long polling.
pub fn build_dispatcher(
    bot: Bot,
    state: Arc<AppState>,
) -> Dispatcher<Bot, teloxide::RequestError, teloxide::dispatching::DefaultKey> {
    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::endpoint(handle_text));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|_| async {})
        .build()
}

fn is_dm(msg: &Message) -> bool {
    matches!(msg.chat.kind, ChatKind::Private(_))
}

fn sender_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().map(|u| u.id.0 as i64)
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    if !is_dm(&msg) {
        debug!(chat_id = msg.chat.id.0, "ignoring non-DM command");
        return Ok(());
    }
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };

    let reply = match cmd {
        Command::Token => {
            state
                .pending
                .lock()
                .unwrap()
                .insert(user_id, Pending::AccessToken);
            "Send me your Mastodon access token.".to_string()
        }
        Command::Domain => {
            state
                .pending
                .lock()
                .unwrap()
                .insert(user_id, Pending::InstanceHost);
            "Send me your Mastodon instance domain, e.g. mastodon.social.".to_string()
        }
        Command::Send => match state.accumulator.flush(&state.outbox, user_id).await {
            Ok(Some(_)) => "Message saved. It will be posted when your account is ready."
                .to_string(),
            Ok(None) => "No messages to save.".to_string(),
            Err(e) => {
                warn!(user_id, error = %e, "failed to queue buffer");
                "Could not save your message, please try again.".to_string()
            }
        },
        Command::Queue => {
            let buffered = !state.accumulator.is_empty(user_id);
            match state.outbox.pending_count(user_id).await {
                Ok(count) => {
                    let mut text = match count {
                        0 => "No posts waiting.".to_string(),
                        1 => "1 post waiting.".to_string(),
                        n => format!("{} posts waiting.", n),
                    };
                    if buffered {
                        text.push_str(" You also have unsaved buffered messages.");
                    }
                    text
                }
                Err(e) => {
                    warn!(user_id, error = %e, "failed to count queue");
                    "Could not read your queue, please try again.".to_string()
                }
            }
        }
        Command::Discard => {
            if state.accumulator.is_empty(user_id) {
                "Nothing to discard.".to_string()
            } else {
                state.accumulator.clear(user_id);
                "Buffer discarded.".to_string()
            }
        }
        Command::Help => Command::descriptions().to_string(),
    };

    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn handle_text(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if !is_dm(&msg) {
        return Ok(());
    }
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        debug!(msg_id = msg.id.0, "ignoring non-text message");
        return Ok(());
    };

    // A /token or /domain command leaves the next message earmarked
    // as the value to store.
    let reply = match take_capture(&state, user_id, text) {
        Some(Pending::AccessToken) => match state.settings.set_access_token(user_id, text).await {
            Ok(()) => "Access token saved.".to_string(),
            Err(TootboxError::InvalidInput(_)) => {
                "That token looks empty, try /token again.".to_string()
            }
            Err(e) => {
                warn!(user_id, error = %e, "failed to store token");
                "Could not save your token, please try again.".to_string()
            }
        },
        Some(Pending::InstanceHost) => {
            match state.settings.set_instance_host(user_id, text).await {
                Ok(()) => "Instance domain saved.".to_string(),
                Err(TootboxError::InvalidInput(_)) => {
                    "That domain looks empty, try /domain again.".to_string()
                }
                Err(e) => {
                    warn!(user_id, error = %e, "failed to store domain");
                    "Could not save your domain, please try again.".to_string()
                }
            }
        }
        None if text.starts_with('/') => "Unknown command. Try /help.".to_string(),
        None => {
            state.accumulator.append(user_id, text);
            "Added to buffer. Use /send when the post is complete.".to_string()
        }
    };

    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

/// Pending capture consumed by this message, if any. Anything shaped
/// like a command never consumes a capture: known commands were
/// already routed to the command handler, and a mistyped one must
/// not end up stored as a credential, so the capture stays armed for
/// the next real message.
fn take_capture(state: &AppState, user_id: i64, text: &str) -> Option<Pending> {
    if text.starts_with('/') {
        return None;
    }
    state.pending.lock().unwrap().remove(&user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use libtootbox::db::Database;

    async fn test_state() -> AppState {
        let db = Database::in_memory().await.unwrap();
        AppState::new(
            Outbox::new(db.clone()),
            SettingsStore::new(db),
            InputAccumulator::new(),
        )
    }

    #[tokio::test]
    async fn test_mistyped_command_does_not_consume_capture() {
        let state = test_state().await;
        state
            .pending
            .lock()
            .unwrap()
            .insert(1, Pending::AccessToken);

        // A typo like /quue must not be stored as the token
        assert_eq!(take_capture(&state, 1, "/quue"), None);

        // The capture is still armed for the next real message
        assert_eq!(
            take_capture(&state, 1, "real-token"),
            Some(Pending::AccessToken)
        );
        assert_eq!(take_capture(&state, 1, "later text"), None);
    }

    #[tokio::test]
    async fn test_capture_is_per_user() {
        let state = test_state().await;
        state
            .pending
            .lock()
            .unwrap()
            .insert(1, Pending::InstanceHost);

        assert_eq!(take_capture(&state, 2, "mastodon.social"), None);
        assert_eq!(
            take_capture(&state, 1, "mastodon.social"),
            Some(Pending::InstanceHost)
        );
    }
}
