use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard,
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, Notify};
use url::Url;

use crate::{
    domain::{chat_store::ChatListing, message::Message},
    realtime::transport::{SocketConnector, SocketLink, TransportError, TransportInput},
    usecases::{
        contracts::SourceError,
        create_chat::{ChatCreator, CreateChatReply, CreateChatRequest},
        load_chats::ChatsSource,
        load_messages::MessagesSource,
    },
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().expect("env lock should not be poisoned")
}

#[derive(Debug, Default)]
struct SocketLog {
    opened: Vec<(u64, Url)>,
    sent: Vec<String>,
    closed: Vec<u64>,
    events: Option<mpsc::UnboundedSender<TransportInput>>,
}

/// Socket connector that records traffic instead of touching the network.
/// Tests play the server by pushing events through [`FakeConnector::emit`].
#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    log: Arc<Mutex<SocketLog>>,
}

impl FakeConnector {
    fn log(&self) -> MutexGuard<'_, SocketLog> {
        self.log.lock().expect("socket log lock")
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.log()
            .opened
            .iter()
            .map(|(_, url)| url.to_string())
            .collect()
    }

    pub fn last_connection_id(&self) -> Option<u64> {
        self.log().opened.last().map(|(id, _)| *id)
    }

    pub fn closed_ids(&self) -> Vec<u64> {
        self.log().closed.clone()
    }

    pub fn sent_frames(&self) -> Vec<Value> {
        self.log()
            .sent
            .iter()
            .map(|text| serde_json::from_str(text).expect("sent frames are JSON"))
            .collect()
    }

    pub fn sent_kinds(&self) -> Vec<String> {
        self.sent_frames()
            .iter()
            .map(|frame| frame["type"].as_str().unwrap_or_default().to_owned())
            .collect()
    }

    pub fn emit(&self, input: TransportInput) {
        let events = self.log().events.clone().expect("a socket was opened");
        events.send(input).expect("transport queue is open");
    }

    /// Completes the handshake of the most recent connection.
    pub fn accept_latest(&self) {
        let connection_id = self.last_connection_id().expect("a socket was opened");
        self.emit(TransportInput::Opened { connection_id });
    }

    /// Delivers a server frame on the most recent connection.
    pub fn push_frame(&self, frame: Value) {
        let connection_id = self.last_connection_id().expect("a socket was opened");
        self.emit(TransportInput::Frame {
            connection_id,
            text: frame.to_string(),
        });
    }

    pub fn drop_latest(&self) {
        let connection_id = self.last_connection_id().expect("a socket was opened");
        self.emit(TransportInput::Closed {
            connection_id,
            reason: "dropped by test".to_owned(),
        });
    }
}

impl SocketConnector for FakeConnector {
    fn open(
        &self,
        connection_id: u64,
        url: Url,
        events: mpsc::UnboundedSender<TransportInput>,
    ) -> Box<dyn SocketLink> {
        let mut log = self.log();
        log.opened.push((connection_id, url));
        log.events = Some(events);

        Box::new(FakeLink {
            connection_id,
            log: Arc::clone(&self.log),
            open: true,
        })
    }
}

struct FakeLink {
    connection_id: u64,
    log: Arc<Mutex<SocketLog>>,
    open: bool,
}

impl SocketLink for FakeLink {
    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotConnected);
        }
        self.log.lock().expect("socket log lock").sent.push(text);
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.log
                .lock()
                .expect("socket log lock")
                .closed
                .push(self.connection_id);
        }
    }
}

/// In-memory REST backend with canned answers.
#[derive(Debug, Default)]
pub struct FakeBackend {
    chats: Vec<ChatListing>,
    created: Option<ChatListing>,
    pages_fail: bool,
    page_gate: Option<Arc<Notify>>,
    chat_gate: Mutex<Option<Arc<Notify>>>,
    chat_list_calls: AtomicUsize,
    page_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn with_chats(chats: Vec<ChatListing>) -> Self {
        Self {
            chats,
            ..Self::default()
        }
    }

    pub fn with_created(created: ChatListing) -> Self {
        Self {
            created: Some(created),
            ..Self::default()
        }
    }

    /// Page requests block until `gate` is notified.
    pub fn with_page_gate(gate: Arc<Notify>) -> Self {
        Self {
            page_gate: Some(gate),
            ..Self::default()
        }
    }

    /// Later chat-list requests block until `gate` is notified.
    pub fn gate_chat_lists(&self, gate: Arc<Notify>) {
        *self.chat_gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(gate);
    }

    pub fn failing_pages() -> Self {
        Self {
            pages_fail: true,
            ..Self::default()
        }
    }

    pub fn chat_list_calls(&self) -> usize {
        self.chat_list_calls.load(Ordering::SeqCst)
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatsSource for FakeBackend {
    async fn list_chats(&self, _token: &str) -> Result<Vec<ChatListing>, SourceError> {
        self.chat_list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self
            .chat_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self.chats.clone())
    }
}

#[async_trait]
impl MessagesSource for FakeBackend {
    async fn list_messages(
        &self,
        _token: &str,
        _chat_id: &str,
        _page: u32,
        _page_size: u32,
    ) -> Result<Vec<Message>, SourceError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.page_gate {
            gate.notified().await;
        }
        if self.pages_fail {
            return Err(SourceError::Unavailable);
        }
        Ok(Vec::new())
    }
}

#[async_trait]
impl ChatCreator for FakeBackend {
    async fn create_chat(
        &self,
        _token: &str,
        _request: &CreateChatRequest,
    ) -> Result<CreateChatReply, SourceError> {
        Ok(CreateChatReply {
            success: self.created.is_some(),
            message: None,
            chat: self.created.clone(),
        })
    }
}
