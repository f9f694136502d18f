//! Messaging gateway collaborator.
//!
//! The engine emits plain text with legacy-Markdown emphasis (`*bold*`,
//! `[label](url)`); the gateway owns delivery. The real implementation
//! wraps a teloxide `Bot`.

use anyhow::Result;
use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Deliver one message to one chat.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
}

pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Gateway for TelegramGateway {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Markdown)
            .await?;
        Ok(())
    }
}

/// Escape the characters that break the legacy Markdown dialect's bold and
/// link syntax. Applied to scraped text before it is embedded in a message.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '`' | '[' | ']') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
