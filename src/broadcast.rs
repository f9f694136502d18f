//! Sequential message fan-out with rate limiting.
//!
//! Sends are strictly sequential with a fixed delay between them, honoring
//! the gateway's outbound rate limit. A failed delivery (blocked bot,
//! deleted chat) is logged and skipped; remaining recipients still receive
//! the message. Deliberately best-effort, never all-or-nothing.

use crate::gateway::Gateway;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_SEND_DELAY: Duration = Duration::from_millis(1000);

pub async fn broadcast(gateway: &dyn Gateway, chats: &[i64], message: &str, delay: Duration) {
    for (i, &chat_id) in chats.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Err(err) = gateway.send_message(chat_id, message).await {
            warn!(chat_id, ?err, "message delivery failed; continuing fan-out");
        }
    }
}
