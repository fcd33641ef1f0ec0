//! Outbound side of the bot.
//!
//! Sends and deletes are best effort: the dispatcher and the handlers log a
//! failure and move on, nothing is retried.

use std::fmt;

use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{ChatId, MessageId},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid chat id: {0}")]
    InvalidChat(String),
    #[error("invalid message reference: {0}")]
    InvalidMessage(String),
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),
}

#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), TransportError>;

    async fn delete_message(&self, chat_id: &str, message_ref: &str)
    -> Result<(), TransportError>;
}

/// [`Transport`] over the Telegram Bot API.
#[derive(Clone, Debug)]
pub struct TelegramTransport {
    bot: teloxide::Bot,
}

impl TelegramTransport {
    pub fn new(bot: teloxide::Bot) -> Self {
        Self { bot }
    }
}

fn chat_id(raw: &str) -> Result<ChatId, TransportError> {
    raw.parse()
        .map(ChatId)
        .map_err(|_| TransportError::InvalidChat(raw.to_string()))
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, chat: &str, text: &str) -> Result<(), TransportError> {
        self.bot.send_message(chat_id(chat)?, text).await?;
        Ok(())
    }

    async fn delete_message(&self, chat: &str, message_ref: &str) -> Result<(), TransportError> {
        let message_id = message_ref
            .parse()
            .map(MessageId)
            .map_err(|_| TransportError::InvalidMessage(message_ref.to_string()))?;
        self.bot.delete_message(chat_id(chat)?, message_id).await?;
        Ok(())
    }
}
