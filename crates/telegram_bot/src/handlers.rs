use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::dispatcher::{Dispatcher, InboundMessage};

/// Maps a Telegram message onto the transport-neutral form. Service messages
/// without an author are skipped.
pub(crate) fn inbound_message(msg: &Message) -> Option<InboundMessage> {
    let from = msg.from.as_ref()?;
    let sender_id = from.id.0.to_string();
    let text = msg.text().or_else(|| msg.caption()).unwrap_or_default();

    Some(InboundMessage {
        participant_id: sender_id.clone(),
        sender_id,
        chat_id: msg.chat.id.0.to_string(),
        is_group: msg.chat.is_group() || msg.chat.is_supergroup(),
        text: text.to_string(),
        message_ref: msg.id.0.to_string(),
        quoted_sender_id: msg
            .reply_to_message()
            .and_then(|quoted| quoted.from.as_ref())
            .map(|user| user.id.0.to_string()),
    })
}

pub(crate) async fn handle_message(msg: Message, dispatcher: Arc<Dispatcher>) -> ResponseResult<()> {
    let Some(inbound) = inbound_message(&msg) else {
        return Ok(());
    };
    dispatcher.dispatch(inbound).await;
    Ok(())
}
