//! Per-user input accumulation
//!
//! Freeform messages pile up in memory until the user flushes them
//! into the outbox as a single item. Buffers are volatile; only the
//! flushed item is durable.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;
use crate::outbox::Outbox;
use crate::types::QueuedItem;

/// Separator inserted between successive messages of one buffer.
const MESSAGE_SEPARATOR: &str = "\n\n";

#[derive(Default)]
pub struct InputAccumulator {
    buffers: Mutex<HashMap<i64, String>>,
}

impl InputAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the user's buffer, joining onto earlier
    /// content with a blank line.
    pub fn append(&self, user_id: i64, text: &str) {
        let mut buffers = self.buffers.lock().unwrap();
        match buffers.get_mut(&user_id) {
            Some(buffer) => {
                buffer.push_str(MESSAGE_SEPARATOR);
                buffer.push_str(text);
            }
            None => {
                buffers.insert(user_id, text.to_string());
            }
        }
    }

    pub fn is_empty(&self, user_id: i64) -> bool {
        let buffers = self.buffers.lock().unwrap();
        buffers.get(&user_id).map_or(true, |b| b.is_empty())
    }

    /// Discard the user's buffer without writing anything.
    pub fn clear(&self, user_id: i64) {
        self.buffers.lock().unwrap().remove(&user_id);
    }

    /// Move the user's buffer into the outbox as one queued item.
    /// Returns `Ok(None)` when the buffer is empty, in which case
    /// nothing is written.
    ///
    /// The buffer is taken under the lock before the durable write,
    /// so a concurrent append during the write starts a fresh buffer
    /// instead of being wiped afterwards. If the enqueue fails, the
    /// taken text is put back in front of any such fresh content.
    pub async fn flush(&self, outbox: &Outbox, user_id: i64) -> Result<Option<QueuedItem>> {
        let body = {
            let mut buffers = self.buffers.lock().unwrap();
            match buffers.remove(&user_id) {
                Some(b) if !b.is_empty() => b,
                _ => return Ok(None),
            }
        };

        match outbox.enqueue(user_id, body.clone()).await {
            Ok(item) => Ok(Some(item)),
            Err(e) => {
                restore_buffer(&mut self.buffers.lock().unwrap(), user_id, body);
                Err(e)
            }
        }
    }
}

/// Put a taken buffer back after a failed enqueue. Text appended
/// while the write was in flight goes after the restored content, in
/// arrival order.
fn restore_buffer(buffers: &mut HashMap<i64, String>, user_id: i64, body: String) {
    let restored = match buffers.remove(&user_id) {
        Some(late) => format!("{}{}{}", body, MESSAGE_SEPARATOR, late),
        None => body,
    };
    buffers.insert(user_id, restored);
}
