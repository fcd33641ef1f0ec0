//! Turns inbound messages into command invocations.
//!
//! Checks run in a fixed order: group mute, command lookup, rate limit
//! (skipped for admins and above, sudo included), permission. The handler
//! runs in its own task so a panic only fails that one command.

use std::{sync::Arc, time::Instant};

use engine::Role;

use crate::{
    context::{CommandContext, Services},
    parsing::parse_command,
    registry::CommandError,
};

/// A message as delivered by the transport. Identifiers are opaque strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender_id: String,
    pub chat_id: String,
    pub is_group: bool,
    /// Author inside a group; equals `sender_id` on the transports we have.
    pub participant_id: String,
    pub text: String,
    pub message_ref: String,
    pub quoted_sender_id: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    NotACommand,
    MutedMessageDeleted,
    UnknownCommand,
    RateLimited,
    PermissionDenied { required: Role },
    Handled,
    Failed,
}

#[derive(Clone, Debug)]
pub struct Dispatcher {
    services: Arc<Services>,
}

impl Dispatcher {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    async fn reply(&self, chat_id: &str, text: &str) {
        if let Err(err) = self.services.transport.send(chat_id, text).await {
            tracing::warn!("failed to send reply to chat {chat_id}: {err}");
        }
    }

    pub async fn dispatch(&self, message: InboundMessage) -> DispatchOutcome {
        let services = &self.services;

        if message.is_group
            && services
                .permissions
                .is_muted(&message.participant_id, &message.chat_id)
        {
            tracing::debug!(
                "deleting message {} of muted user {} in {}",
                message.message_ref,
                message.participant_id,
                message.chat_id
            );
            if let Err(err) = services
                .transport
                .delete_message(&message.chat_id, &message.message_ref)
                .await
            {
                tracing::warn!(
                    "failed to delete message {} in {}: {err}",
                    message.message_ref,
                    message.chat_id
                );
            }
            return DispatchOutcome::MutedMessageDeleted;
        }

        let Some(parsed) = parse_command(&services.settings.prefix, &message.text) else {
            return DispatchOutcome::NotACommand;
        };
        let Some(spec) = services.registry.get(&parsed.name) else {
            tracing::debug!("unknown command {} from {}", parsed.name, message.sender_id);
            return DispatchOutcome::UnknownCommand;
        };

        let role = services.permissions.effective_role(&message.sender_id);
        if role < Role::Admin
            && let Err(err) = services.limiter.check(&message.sender_id)
        {
            let config = services.limiter.config();
            self.reply(
                &message.chat_id,
                &format!(
                    "⏳ Slow down! You can run {} commands every {} seconds.",
                    config.max_per_window,
                    config.window_ms / 1000
                ),
            )
            .await;
            tracing::info!(
                "command {} from {} ({role}): {err}",
                spec.name,
                message.sender_id
            );
            return DispatchOutcome::RateLimited;
        }

        if !services
            .permissions
            .has_permission(&message.sender_id, spec.name, spec.min_role)
        {
            let required = services.required_role(spec);
            self.reply(
                &message.chat_id,
                &format!(
                    "⛔ {}{} requires {}. Your role: {}.",
                    services.settings.prefix,
                    spec.name,
                    required.label(),
                    role.label()
                ),
            )
            .await;
            tracing::info!(
                "command {} from {} ({role}): permission denied, requires {required}",
                spec.name,
                message.sender_id
            );
            return DispatchOutcome::PermissionDenied { required };
        }

        let ctx = CommandContext {
            services: services.clone(),
            command: spec.name.to_string(),
            sender_id: message.sender_id.clone(),
            chat_id: message.chat_id.clone(),
            is_group: message.is_group,
            args: parsed.args,
            quoted_sender_id: message.quoted_sender_id.clone(),
            received_at: Instant::now(),
        };
        let handler = spec.handler.clone();
        let joined = tokio::spawn(async move { handler.handle(ctx).await }).await;
        services.count_command();

        let outcome = match joined {
            Ok(Ok(())) => DispatchOutcome::Handled,
            Ok(Err(CommandError::Usage(usage))) => {
                self.reply(&message.chat_id, &format!("ℹ️ Usage: {usage}"))
                    .await;
                DispatchOutcome::Handled
            }
            Ok(Err(err)) => {
                tracing::error!(
                    "command {} from {} failed: {err}",
                    spec.name,
                    message.sender_id
                );
                self.reply(&message.chat_id, "❌ Something went wrong while running that command.")
                    .await;
                DispatchOutcome::Failed
            }
            Err(err) => {
                tracing::error!(
                    "command {} from {} panicked: {err}",
                    spec.name,
                    message.sender_id
                );
                self.reply(&message.chat_id, "❌ Something went wrong while running that command.")
                    .await;
                DispatchOutcome::Failed
            }
        };

        tracing::info!(
            "command {} from {} ({role}) in {}: {outcome:?}",
            spec.name,
            message.sender_id,
            message.chat_id
        );
        outcome
    }
}
