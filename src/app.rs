use std::time::Duration;

use anyhow::{bail, Result};

use crate::{
    backend,
    cli::{Cli, Command},
    domain::{self, chat::Chat, chat_store::ChatSnapshot, credential::Credential, message::Message},
    infra::{self, error::AppError},
    realtime,
    usecases::{self, bootstrap, chat_service::ChatHandle, context::AppContext},
};

const CONNECT_WAIT: Duration = Duration::from_secs(10);
const APP_CONNECT_TIMEOUT: &str = "APP_CONNECT_TIMEOUT";
const APP_CONNECTION_CHANGED: &str = "APP_CONNECTION_CHANGED";

pub fn run(cli: Cli) -> Result<()> {
    tracing::debug!(
        backend = backend::module_name(),
        domain = domain::module_name(),
        realtime = realtime::module_name(),
        usecases = usecases::module_name(),
        infra = infra::module_name(),
        "module boundaries loaded"
    );

    let context = bootstrap::bootstrap(cli.config.as_deref())?;
    let credential = context.credential(cli.token.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;

    runtime.block_on(run_command(&context, credential, cli.command_or_default()))
}

async fn run_command(context: &AppContext, credential: Credential, command: Command) -> Result<()> {
    let local_user_id = credential.user_id.clone();
    let (client, handle) = bootstrap::compose_client(context, Some(credential))?;
    let client_task = tokio::spawn(client.run());

    let result = match command {
        Command::Run => watch_activity(&handle, local_user_id.as_deref()).await,
        Command::Chats => {
            handle.load_chats().await?;
            for line in chat_lines(&handle.chats(), local_user_id.as_deref()) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Messages { chat, page } => {
            match handle.load_messages(&chat, page).await? {
                usecases::load_messages::LoadMessagesOutcome::Loaded(messages) => {
                    for message in &messages {
                        println!("{}", message_line(message));
                    }
                }
                usecases::load_messages::LoadMessagesOutcome::AlreadyInFlight => {
                    bail!("another history request is still running")
                }
            }
            Ok(())
        }
        Command::Send { chat, text } => {
            connect_and_wait(&handle).await?;
            handle.send_message(&chat, &text).await?;
            println!("sent to {chat}");
            Ok(())
        }
        Command::NewChat { participants, name } => {
            let listing = handle.create_chat(participants, name).await?;
            println!("created chat {}", listing.chat.chat_id);
            Ok(())
        }
    };

    handle.shutdown();
    let _ = client_task.await;
    result
}

async fn connect_and_wait(handle: &ChatHandle) -> Result<()> {
    handle.connect().await?;

    let mut connection = handle.subscribe_connection();
    let waited = tokio::time::timeout(
        CONNECT_WAIT,
        connection.wait_for(|snapshot| snapshot.is_connected() || snapshot.gave_up),
    )
    .await;

    match waited {
        Ok(Ok(snapshot)) if snapshot.is_connected() => Ok(()),
        Ok(Ok(snapshot)) => bail!(
            "chat socket unavailable: {}",
            snapshot.last_error.as_deref().unwrap_or("connection closed")
        ),
        Ok(Err(_)) => bail!("chat client stopped while connecting"),
        Err(_) => {
            tracing::warn!(code = APP_CONNECT_TIMEOUT, "chat socket did not open in time");
            bail!("timed out waiting for the chat socket")
        }
    }
}

async fn watch_activity(handle: &ChatHandle, local_user_id: Option<&str>) -> Result<()> {
    handle.connect().await?;

    let mut connection = handle.subscribe_connection();
    let mut chats = handle.subscribe_chats();
    let mut last_state = connection.borrow_and_update().state;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = connection.borrow_and_update().clone();
                if snapshot.state != last_state {
                    last_state = snapshot.state;
                    tracing::info!(
                        code = APP_CONNECTION_CHANGED,
                        state = snapshot.state.as_label(),
                        attempts = snapshot.reconnect_attempts,
                        gave_up = snapshot.gave_up,
                        "connection state changed"
                    );
                }
                if snapshot.gave_up {
                    bail!("gave up reconnecting to the chat socket");
                }
            }
            changed = chats.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = chats.borrow_and_update().clone();
                tracing::info!(chats = snapshot.chats.len(), "chat list updated");
                if let Some(top) = snapshot.chats.first() {
                    tracing::debug!(line = %chat_line(top, local_user_id), "most recent chat");
                }
            }
        }
    }

    handle.disconnect().await?;
    Ok(())
}

fn chat_lines(snapshot: &ChatSnapshot, local_user_id: Option<&str>) -> Vec<String> {
    snapshot
        .chats
        .iter()
        .map(|chat| chat_line(chat, local_user_id))
        .collect()
}

fn chat_line(chat: &Chat, local_user_id: Option<&str>) -> String {
    let preview = chat
        .last_message
        .as_ref()
        .map(|last| last.content.preview())
        .unwrap_or_default();
    let unread = if chat.unread_count > 0 {
        format!(" ({})", chat.unread_count)
    } else {
        String::new()
    };

    format!(
        "{}\t{}{}\t{}",
        chat.chat_id,
        chat.display_title(local_user_id),
        unread,
        preview
    )
}

fn message_line(message: &Message) -> String {
    format!(
        "{} [{}] {}: {}",
        message.timestamp.format("%Y-%m-%d %H:%M"),
        message.status.as_label(),
        message.sender_id.as_deref().unwrap_or("?"),
        message.content.preview()
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::message::{MessageContent, MessageStatus};

    #[test]
    fn chat_line_shows_unread_count_only_when_present() {
        let mut chat = Chat {
            chat_id: "c1".to_owned(),
            is_group: true,
            group_name: Some("Crew".to_owned()),
            ..Chat::default()
        };

        assert_eq!(chat_line(&chat, None), "c1\tCrew\t");

        chat.unread_count = 3;
        assert_eq!(chat_line(&chat, None), "c1\tCrew (3)\t");
    }

    #[test]
    fn message_line_includes_sender_and_status() {
        let message = Message {
            message_id: "m1".to_owned(),
            chat_id: "c1".to_owned(),
            sender_id: Some("u2".to_owned()),
            content: MessageContent::text("hello"),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            status: MessageStatus::Read,
        };

        let line = message_line(&message);

        assert!(line.starts_with("2024-03-01 09:30"));
        assert!(line.ends_with("u2: hello"));
        assert!(line.contains(MessageStatus::Read.as_label()));
    }
}
