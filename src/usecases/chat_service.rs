//! The chat client service: one event loop task that owns the transport,
//! the chat store and every timer, plus a cloneable handle for callers.
//!
//! Socket events, timer firings, REST completions and caller commands all
//! arrive over channels drained by a single biased `select!`, so handlers
//! never run concurrently and subscribers only ever see whole snapshots.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};

use crate::{
    domain::{
        chat_store::{ChatListing, ChatSnapshot, ChatStore},
        credential::Credential,
        message::Message,
        status::ConnectionSnapshot,
    },
    infra::config::AppConfig,
    realtime::{
        router::{MessageRouter, TypingChange},
        timer::KeyedTimers,
        transport::{SocketConnector, TransportError, TransportInput, TransportOutcome, TransportSession},
    },
    usecases::{
        contracts::ChatBackend,
        create_chat::{create_chat, CreateChatError, CreateChatRequest},
        load_chats::{load_chats, LoadChatsError},
        load_messages::{load_messages, LoadMessagesError, LoadMessagesOutcome, LoadMessagesQuery},
        send_message::{send_message, SendMessageCommand, SendMessageError},
        set_typing::{SetTypingError, TypingTimers},
    },
};

const CHAT_CLIENT_STARTED: &str = "CHAT_CLIENT_STARTED";
const CHAT_CLIENT_STOPPED: &str = "CHAT_CLIENT_STOPPED";
const CHAT_SESSION_CLEARED: &str = "CHAT_SESSION_CLEARED";
const CHATS_LOAD_FAILED: &str = "CHATS_LOAD_FAILED";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("no credential is set")]
    MissingCredential,
    #[error("cannot derive socket endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("chat client is shut down")]
    ClientClosed,
}

enum Command {
    Connect {
        reply: oneshot::Sender<Result<(), ConnectError>>,
    },
    SetCredential {
        credential: Option<Credential>,
        reply: oneshot::Sender<Result<(), ConnectError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    SendMessage {
        command: SendMessageCommand,
        reply: oneshot::Sender<Result<(), SendMessageError>>,
    },
    SetTyping {
        chat_id: String,
        is_typing: bool,
        reply: oneshot::Sender<Result<(), SetTypingError>>,
    },
    LoadChats {
        reply: oneshot::Sender<Result<usize, LoadChatsError>>,
    },
    LoadMessages {
        chat_id: String,
        page: u32,
        reply: oneshot::Sender<Result<LoadMessagesOutcome, LoadMessagesError>>,
    },
    CreateChat {
        participants: Vec<String>,
        name: Option<String>,
        reply: oneshot::Sender<Result<ChatListing, CreateChatError>>,
    },
    Shutdown,
}

type PageReply = oneshot::Sender<Result<LoadMessagesOutcome, LoadMessagesError>>;

/// Work finished outside the loop. `epoch` identifies the credential
/// session the work was started for; results from older sessions are not
/// applied.
enum InternalEvent {
    TypingIdle {
        chat_id: String,
        generation: u64,
    },
    RemoteTypingExpired {
        chat_id: String,
        generation: u64,
    },
    ChatsLoaded {
        epoch: u64,
        result: Result<Vec<ChatListing>, LoadChatsError>,
        reply: Option<oneshot::Sender<Result<usize, LoadChatsError>>>,
    },
    PageLoaded {
        epoch: u64,
        chat_id: String,
        /// `None` when the request task ended without a result.
        result: Option<Result<Vec<Message>, LoadMessagesError>>,
        reply: Option<PageReply>,
    },
    ChatCreated {
        epoch: u64,
        result: Result<ChatListing, CreateChatError>,
        reply: oneshot::Sender<Result<ChatListing, CreateChatError>>,
    },
}

/// Reports the outcome of a page request exactly once, including when the
/// request task is aborted or panics, so the in-flight flag is always
/// released.
struct PageRequestGuard {
    internal_tx: mpsc::UnboundedSender<InternalEvent>,
    epoch: u64,
    chat_id: String,
    reply: Option<PageReply>,
}

impl PageRequestGuard {
    fn finish(mut self, result: Result<Vec<Message>, LoadMessagesError>) {
        self.report(Some(result));
    }

    fn report(&mut self, result: Option<Result<Vec<Message>, LoadMessagesError>>) {
        if let Some(reply) = self.reply.take() {
            let _ = self.internal_tx.send(InternalEvent::PageLoaded {
                epoch: self.epoch,
                chat_id: std::mem::take(&mut self.chat_id),
                result,
                reply: Some(reply),
            });
        }
    }
}

impl Drop for PageRequestGuard {
    fn drop(&mut self) {
        self.report(None);
    }
}

pub struct ChatClient {
    backend: Arc<dyn ChatBackend>,
    transport: TransportSession,
    transport_rx: mpsc::UnboundedReceiver<TransportInput>,
    commands_rx: mpsc::UnboundedReceiver<Command>,
    internal_tx: mpsc::UnboundedSender<InternalEvent>,
    internal_rx: mpsc::UnboundedReceiver<InternalEvent>,
    chats_tx: watch::Sender<ChatSnapshot>,
    store: ChatStore,
    router: MessageRouter,
    credential: Option<Credential>,
    epoch: u64,
    typing: TypingTimers,
    remote_typing: KeyedTimers,
    remote_typing_expiry: Duration,
    page_size: u32,
    page_in_flight: bool,
    chat_loads_in_flight: usize,
    load_chats_on_open: bool,
}

impl ChatClient {
    pub fn new(
        config: &AppConfig,
        backend: Arc<dyn ChatBackend>,
        connector: Arc<dyn SocketConnector>,
        credential: Option<Credential>,
    ) -> (Self, ChatHandle) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (chats_tx, chats_rx) = watch::channel(ChatSnapshot::default());
        let (status_tx, status_rx) = watch::channel(ConnectionSnapshot::default());

        let (transport, transport_rx) = TransportSession::new(
            &config.realtime,
            &config.backend.api_url,
            connector,
            status_tx,
        );
        let local_user_id = credential.as_ref().and_then(|c| c.user_id.clone());

        let client = Self {
            backend,
            transport,
            transport_rx,
            commands_rx,
            internal_tx,
            internal_rx,
            chats_tx,
            store: ChatStore::default(),
            router: MessageRouter::new(local_user_id),
            credential,
            epoch: 0,
            typing: TypingTimers::new(Duration::from_millis(config.realtime.typing_idle_ms)),
            remote_typing: KeyedTimers::default(),
            remote_typing_expiry: Duration::from_millis(config.realtime.remote_typing_expiry_ms),
            page_size: config.rest.messages_page_size,
            page_in_flight: false,
            chat_loads_in_flight: 0,
            load_chats_on_open: false,
        };
        let handle = ChatHandle {
            commands: commands_tx,
            chats: chats_rx,
            connection: status_rx,
        };

        (client, handle)
    }

    /// Runs until [`ChatHandle::shutdown`] is called or every handle is
    /// dropped.
    pub async fn run(mut self) {
        tracing::info!(code = CHAT_CLIENT_STARTED, "chat client started");

        loop {
            tokio::select! {
                biased;
                Some(input) = self.transport_rx.recv() => self.on_transport(input),
                Some(event) = self.internal_rx.recv() => self.on_internal(event),
                command = self.commands_rx.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
            }
        }

        self.typing.cancel_all();
        self.remote_typing.cancel_all();
        self.transport.disconnect();
        tracing::info!(code = CHAT_CLIENT_STOPPED, "chat client stopped");
    }

    fn local_user_id(&self) -> Option<String> {
        self.credential.as_ref().and_then(|c| c.user_id.clone())
    }

    fn token(&self) -> Option<String> {
        self.credential.as_ref().map(|c| c.token.clone())
    }

    fn publish(&self) {
        self.chats_tx.send_replace(self.store.snapshot());
    }

    /// Recomputes the store's loading flag from the requests still in flight.
    fn sync_loading(&mut self) -> bool {
        let loading = self.page_in_flight || self.chat_loads_in_flight > 0;
        self.store.set_loading(loading)
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect { reply } => {
                let _ = reply.send(self.connect());
            }
            Command::SetCredential { credential, reply } => {
                let _ = reply.send(self.set_credential(credential));
            }
            Command::Disconnect { reply } => {
                self.typing.cancel_all();
                self.load_chats_on_open = false;
                self.transport.disconnect();
                let _ = reply.send(());
            }
            Command::SendMessage { command, reply } => {
                let chat_id = command.chat_id.clone();
                let user_id = self.local_user_id();
                let result =
                    send_message(&mut self.transport, command, user_id.as_deref(), Utc::now());
                if result.is_ok() {
                    self.typing
                        .stop_if_active(&mut self.transport, &chat_id, user_id.as_deref());
                }
                let _ = reply.send(result);
            }
            Command::SetTyping {
                chat_id,
                is_typing,
                reply,
            } => {
                let user_id = self.local_user_id();
                let internal_tx = self.internal_tx.clone();
                let timer_chat_id = chat_id.clone();
                let result = self.typing.set_typing(
                    &mut self.transport,
                    &chat_id,
                    is_typing,
                    user_id.as_deref(),
                    move |generation| {
                        let _ = internal_tx.send(InternalEvent::TypingIdle {
                            chat_id: timer_chat_id,
                            generation,
                        });
                    },
                );
                let _ = reply.send(result);
            }
            Command::LoadChats { reply } => self.spawn_load_chats(Some(reply)),
            Command::LoadMessages {
                chat_id,
                page,
                reply,
            } => self.spawn_load_messages(chat_id, page, reply),
            Command::CreateChat {
                participants,
                name,
                reply,
            } => self.spawn_create_chat(participants, name, reply),
            Command::Shutdown => {}
        }
    }

    fn connect(&mut self) -> Result<(), ConnectError> {
        let Some(credential) = self.credential.clone() else {
            return Err(ConnectError::MissingCredential);
        };

        self.transport
            .connect(&credential)
            .map_err(|error| match error {
                TransportError::InvalidEndpoint(error) => {
                    ConnectError::InvalidEndpoint(error.to_string())
                }
                other => ConnectError::InvalidEndpoint(other.to_string()),
            })?;
        self.load_chats_on_open = true;
        Ok(())
    }

    fn set_credential(&mut self, credential: Option<Credential>) -> Result<(), ConnectError> {
        if credential == self.credential {
            return Ok(());
        }

        let same_user = matches!(
            (&self.credential, &credential),
            (Some(current), Some(next)) if current.user_id == next.user_id
        );
        if !same_user {
            self.clear_session();
        }

        self.router
            .set_local_user(credential.as_ref().and_then(|c| c.user_id.clone()));
        self.credential = credential;

        match self.credential {
            Some(_) => self.connect(),
            None => {
                self.transport.reset();
                Ok(())
            }
        }
    }

    fn clear_session(&mut self) {
        self.epoch += 1;
        self.page_in_flight = false;
        self.chat_loads_in_flight = 0;
        self.load_chats_on_open = false;
        self.typing.cancel_all();
        self.remote_typing.cancel_all();
        self.store.clear();
        self.publish();
        tracing::info!(code = CHAT_SESSION_CLEARED, epoch = self.epoch, "chat state cleared");
    }

    fn on_transport(&mut self, input: TransportInput) {
        match self.transport.handle(input) {
            TransportOutcome::Opened => {
                if std::mem::take(&mut self.load_chats_on_open) {
                    self.spawn_load_chats(None);
                }
            }
            TransportOutcome::Frame(text) => {
                let outcome = self.router.route(&text, &mut self.store);
                if let Some(change) = outcome.typing {
                    self.track_remote_typing(change);
                }
                if outcome.changed {
                    self.publish();
                }
            }
            TransportOutcome::Closed => self.typing.cancel_all(),
            TransportOutcome::Idle => {}
        }
    }

    fn track_remote_typing(&mut self, change: TypingChange) {
        if !change.active {
            self.remote_typing.cancel(&change.chat_id);
            return;
        }

        let internal_tx = self.internal_tx.clone();
        let chat_id = change.chat_id.clone();
        self.remote_typing
            .arm(&change.chat_id, self.remote_typing_expiry, move |generation| {
                let _ = internal_tx.send(InternalEvent::RemoteTypingExpired {
                    chat_id,
                    generation,
                });
            });
    }

    fn on_internal(&mut self, event: InternalEvent) {
        match event {
            InternalEvent::TypingIdle {
                chat_id,
                generation,
            } => {
                let user_id = self.local_user_id();
                self.typing
                    .on_idle(&mut self.transport, &chat_id, generation, user_id.as_deref());
            }
            InternalEvent::RemoteTypingExpired {
                chat_id,
                generation,
            } => {
                if self.remote_typing.accept(&chat_id, generation)
                    && self.store.clear_remote_typing(&chat_id)
                {
                    self.publish();
                }
            }
            InternalEvent::ChatsLoaded {
                epoch,
                result,
                reply,
            } => {
                let current = epoch == self.epoch;
                let mut changed = false;
                if current {
                    self.chat_loads_in_flight = self.chat_loads_in_flight.saturating_sub(1);
                    changed = self.sync_loading();
                }
                let reply_value = match result {
                    Ok(listings) => {
                        let count = listings.len();
                        if current {
                            self.store.replace_chats(listings);
                            changed = true;
                        }
                        Ok(count)
                    }
                    Err(error) => {
                        tracing::warn!(code = CHATS_LOAD_FAILED, error = %error, "chat list load failed");
                        Err(error)
                    }
                };
                if changed {
                    self.publish();
                }
                if let Some(reply) = reply {
                    let _ = reply.send(reply_value);
                }
            }
            InternalEvent::PageLoaded {
                epoch,
                chat_id,
                result,
                reply,
            } => {
                if epoch == self.epoch {
                    self.page_in_flight = false;
                    let mut changed = self.sync_loading();
                    if let Some(Ok(page)) = &result {
                        changed |= self.store.merge_page(&chat_id, page.clone()) > 0;
                    }
                    if changed {
                        self.publish();
                    }
                }

                let reply_value = match result {
                    Some(Ok(page)) => Ok(LoadMessagesOutcome::Loaded(page)),
                    Some(Err(error)) => Err(error),
                    None => Err(LoadMessagesError::TemporarilyUnavailable),
                };
                if let Some(reply) = reply {
                    let _ = reply.send(reply_value);
                }
            }
            InternalEvent::ChatCreated {
                epoch,
                result,
                reply,
            } => {
                if let (Ok(listing), true) = (&result, epoch == self.epoch) {
                    self.store
                        .upsert_chat(listing.chat.clone(), listing.messages.clone());
                    self.publish();
                }
                let _ = reply.send(result);
            }
        }
    }

    fn spawn_load_chats(&mut self, reply: Option<oneshot::Sender<Result<usize, LoadChatsError>>>) {
        let Some(token) = self.token() else {
            if let Some(reply) = reply {
                let _ = reply.send(Err(LoadChatsError::Unauthorized));
            }
            return;
        };

        self.chat_loads_in_flight += 1;
        if self.sync_loading() {
            self.publish();
        }

        let backend = Arc::clone(&self.backend);
        let internal_tx = self.internal_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = load_chats(backend.as_ref(), &token).await;
            let _ = internal_tx.send(InternalEvent::ChatsLoaded {
                epoch,
                result,
                reply,
            });
        });
    }

    fn spawn_load_messages(&mut self, chat_id: String, page: u32, reply: PageReply) {
        if self.page_in_flight {
            let _ = reply.send(Ok(LoadMessagesOutcome::AlreadyInFlight));
            return;
        }
        let Some(token) = self.token() else {
            let _ = reply.send(Err(LoadMessagesError::Unauthorized));
            return;
        };

        self.page_in_flight = true;
        if self.sync_loading() {
            self.publish();
        }

        let backend = Arc::clone(&self.backend);
        let query = LoadMessagesQuery::new(chat_id.clone(), page).with_page_size(self.page_size);
        let guard = PageRequestGuard {
            internal_tx: self.internal_tx.clone(),
            epoch: self.epoch,
            chat_id,
            reply: Some(reply),
        };
        tokio::spawn(async move {
            let result = load_messages(backend.as_ref(), &token, query).await;
            guard.finish(result);
        });
    }

    fn spawn_create_chat(
        &mut self,
        participants: Vec<String>,
        name: Option<String>,
        reply: oneshot::Sender<Result<ChatListing, CreateChatError>>,
    ) {
        let Some(token) = self.token() else {
            let _ = reply.send(Err(CreateChatError::Unauthorized));
            return;
        };

        let user_id = self.local_user_id();
        let request = CreateChatRequest::new(user_id.as_deref(), &participants, name.as_deref());
        let backend = Arc::clone(&self.backend);
        let internal_tx = self.internal_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = create_chat(backend.as_ref(), &token, &request).await;
            let _ = internal_tx.send(InternalEvent::ChatCreated {
                epoch,
                result,
                reply,
            });
        });
    }
}

/// Cheap, cloneable front door to a running [`ChatClient`].
#[derive(Clone)]
pub struct ChatHandle {
    commands: mpsc::UnboundedSender<Command>,
    chats: watch::Receiver<ChatSnapshot>,
    connection: watch::Receiver<ConnectionSnapshot>,
}

impl ChatHandle {
    async fn request<T, F>(&self, build: F) -> Option<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> Command,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands.send(build(reply_tx)).ok()?;
        reply_rx.await.ok()
    }

    /// Opens the socket with the current credential, resetting the
    /// reconnect budget. The chat list is loaded once the socket opens.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        self.request(|reply| Command::Connect { reply })
            .await
            .unwrap_or(Err(ConnectError::ClientClosed))
    }

    /// Installs a new credential and reconnects; `None` logs out, closing
    /// the socket and clearing all chat state.
    pub async fn set_credential(&self, credential: Option<Credential>) -> Result<(), ConnectError> {
        self.request(|reply| Command::SetCredential { credential, reply })
            .await
            .unwrap_or(Err(ConnectError::ClientClosed))
    }

    pub async fn disconnect(&self) -> Result<(), ConnectError> {
        self.request(|reply| Command::Disconnect { reply })
            .await
            .ok_or(ConnectError::ClientClosed)
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), SendMessageError> {
        let command = SendMessageCommand {
            chat_id: chat_id.to_owned(),
            text: text.to_owned(),
        };
        self.request(|reply| Command::SendMessage { command, reply })
            .await
            .unwrap_or(Err(SendMessageError::ClientClosed))
    }

    pub async fn set_typing(&self, chat_id: &str, is_typing: bool) -> Result<(), SetTypingError> {
        let chat_id = chat_id.to_owned();
        self.request(|reply| Command::SetTyping {
            chat_id,
            is_typing,
            reply,
        })
        .await
        .unwrap_or(Err(SetTypingError::ClientClosed))
    }

    /// Replaces the chat list from REST. Returns the number of chats.
    pub async fn load_chats(&self) -> Result<usize, LoadChatsError> {
        self.request(|reply| Command::LoadChats { reply })
            .await
            .unwrap_or(Err(LoadChatsError::ClientClosed))
    }

    pub async fn load_messages(
        &self,
        chat_id: &str,
        page: u32,
    ) -> Result<LoadMessagesOutcome, LoadMessagesError> {
        let chat_id = chat_id.to_owned();
        self.request(|reply| Command::LoadMessages {
            chat_id,
            page,
            reply,
        })
        .await
        .unwrap_or(Err(LoadMessagesError::ClientClosed))
    }

    /// Creates a chat with the local user and `participants`.
    pub async fn create_chat(
        &self,
        participants: Vec<String>,
        name: Option<String>,
    ) -> Result<ChatListing, CreateChatError> {
        self.request(|reply| Command::CreateChat {
            participants,
            name,
            reply,
        })
        .await
        .unwrap_or(Err(CreateChatError::ClientClosed))
    }

    pub fn chats(&self) -> ChatSnapshot {
        self.chats.borrow().clone()
    }

    pub fn connection(&self) -> ConnectionSnapshot {
        self.connection.borrow().clone()
    }

    pub fn subscribe_chats(&self) -> watch::Receiver<ChatSnapshot> {
        self.chats.clone()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.connection.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}
