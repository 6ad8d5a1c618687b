use std::collections::HashMap;

use super::{
    chat::{infer_participants_info, sort_chats, Chat, ChatPatch, LastMessage},
    message::{merge_messages, Message, MessageStatus},
};

/// Immutable view handed to subscribers after every mutation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatSnapshot {
    pub chats: Vec<Chat>,
    pub messages: HashMap<String, Vec<Message>>,
    pub loading: bool,
}

impl ChatSnapshot {
    pub fn chat(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.iter().find(|chat| chat.chat_id == chat_id)
    }

    pub fn messages_for(&self, chat_id: &str) -> &[Message] {
        self.messages
            .get(chat_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// One entry of the chat list endpoint: the chat and its embedded recent
/// messages.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatListing {
    pub chat: ChatPatch,
    pub messages: Vec<Message>,
}

/// Owner of all chat and message state for the session.
///
/// Every mutation builds the touched list anew and swaps it in, restoring
/// the chat order (newest activity first) and message order (oldest first)
/// before returning. Methods return whether anything changed so callers
/// only publish real updates.
#[derive(Debug, Default)]
pub struct ChatStore {
    chats: Vec<Chat>,
    messages: HashMap<String, Vec<Message>>,
    loading: bool,
}

impl ChatStore {
    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            chats: self.chats.clone(),
            messages: self.messages.clone(),
            loading: self.loading,
        }
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn messages_for(&self, chat_id: &str) -> &[Message] {
        self.messages
            .get(chat_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn set_loading(&mut self, loading: bool) -> bool {
        let changed = self.loading != loading;
        self.loading = loading;
        changed
    }

    pub fn clear(&mut self) {
        self.chats = Vec::new();
        self.messages = HashMap::new();
        self.loading = false;
    }

    /// Inserts a new chat or merges the patch into the existing one.
    pub fn upsert_chat(&mut self, patch: ChatPatch, embedded: Vec<Message>) -> bool {
        let chat_id = patch.chat_id.clone();
        let mut chats = self.chats.clone();

        match chats.iter_mut().find(|chat| chat.chat_id == chat_id) {
            Some(chat) => chat.apply(patch),
            None => {
                let chat = new_chat_from(&chats, patch);
                chats.insert(0, chat);
            }
        }

        sort_chats(&mut chats);
        self.chats = chats;
        self.merge_into(&chat_id, embedded);
        true
    }

    /// Applies a pushed message. Returns `false` when the message id is
    /// already known for its chat, in which case nothing is touched.
    ///
    /// `seed` describes the chat when the message is the first one seen for
    /// an unknown chat.
    pub fn apply_incoming_message(
        &mut self,
        message: Message,
        seed: ChatPatch,
        local_user_id: Option<&str>,
    ) -> bool {
        let chat_id = message.chat_id.clone();
        let known = self.messages_for(&chat_id);
        if known.iter().any(|m| m.message_id == message.message_id) {
            return false;
        }

        let from_local_user = message.is_from(local_user_id);
        let (merged, _) = merge_messages(known, [message.clone()]);

        let mut chats = self.chats.clone();
        match chats.iter_mut().find(|chat| chat.chat_id == chat_id) {
            Some(chat) => {
                let is_newer = chat
                    .last_message
                    .as_ref()
                    .and_then(|last| last.timestamp)
                    .map_or(true, |last| last <= message.timestamp);
                if is_newer {
                    chat.last_message = Some(LastMessage::from(&message));
                    chat.updated_at = Some(message.timestamp);
                }
                if !from_local_user {
                    chat.unread_count = chat.unread_count.saturating_add(1);
                    chat.is_typing = false;
                    chat.typing_user_id = None;
                }
            }
            None => {
                let mut chat = new_chat_from(&chats, seed);
                chat.chat_id = chat_id.clone();
                chat.last_message = Some(LastMessage::from(&message));
                chat.unread_count = u32::from(!from_local_user);
                chat.created_at = chat.created_at.or(Some(message.timestamp));
                chat.updated_at = Some(message.timestamp);
                chat.is_active = chat.is_active.or(Some(true));
                chats.insert(0, chat);
            }
        }

        sort_chats(&mut chats);
        self.chats = chats;
        self.messages.insert(chat_id, merged);
        true
    }

    /// Sets or clears the remote typing flag. Unknown chats are ignored.
    pub fn set_remote_typing(&mut self, chat_id: &str, user_id: &str, is_typing: bool) -> bool {
        let typing_user_id = is_typing.then(|| user_id.to_owned());
        self.update_chat(chat_id, |chat| {
            if chat.is_typing == is_typing && chat.typing_user_id == typing_user_id {
                return false;
            }
            chat.is_typing = is_typing;
            chat.typing_user_id = typing_user_id;
            true
        })
    }

    pub fn clear_remote_typing(&mut self, chat_id: &str) -> bool {
        self.update_chat(chat_id, |chat| {
            if !chat.is_typing {
                return false;
            }
            chat.is_typing = false;
            chat.typing_user_id = None;
            true
        })
    }

    pub fn mark_read(&mut self, chat_id: &str, message_id: &str) -> bool {
        let known = self.messages_for(chat_id);
        if !known
            .iter()
            .any(|m| m.message_id == message_id && m.status != MessageStatus::Read)
        {
            return false;
        }

        let updated = known
            .iter()
            .cloned()
            .map(|mut message| {
                if message.message_id == message_id {
                    message.status = MessageStatus::Read;
                }
                message
            })
            .collect();
        self.messages.insert(chat_id.to_owned(), updated);
        true
    }

    /// Replaces the chat list with a fresh listing and merges every chat's
    /// embedded messages into the message map. Message lists of chats that
    /// are no longer listed are dropped.
    pub fn replace_chats(&mut self, listings: Vec<ChatListing>) {
        let mut chats: Vec<Chat> = Vec::with_capacity(listings.len());

        for listing in listings {
            let chat_id = listing.chat.chat_id.clone();
            match chats.iter_mut().find(|chat| chat.chat_id == chat_id) {
                Some(chat) => chat.apply(listing.chat),
                None => chats.push(Chat::from_patch(listing.chat)),
            }
            self.merge_into(&chat_id, listing.messages);
        }

        self.messages
            .retain(|chat_id, _| chats.iter().any(|chat| &chat.chat_id == chat_id));
        sort_chats(&mut chats);
        self.chats = chats;
    }

    /// Merges one page of history into a chat. Returns the number of new
    /// messages.
    pub fn merge_page(&mut self, chat_id: &str, page: Vec<Message>) -> usize {
        self.merge_into(chat_id, page)
    }

    fn merge_into(&mut self, chat_id: &str, incoming: Vec<Message>) -> usize {
        if incoming.is_empty() {
            return 0;
        }

        let (merged, inserted) = merge_messages(self.messages_for(chat_id), incoming);
        if inserted > 0 {
            self.messages.insert(chat_id.to_owned(), merged);
        }
        inserted
    }

    fn update_chat<F>(&mut self, chat_id: &str, mutator: F) -> bool
    where
        F: FnOnce(&mut Chat) -> bool,
    {
        let Some(index) = self.chats.iter().position(|chat| chat.chat_id == chat_id) else {
            return false;
        };

        let mut chats = self.chats.clone();
        if !mutator(&mut chats[index]) {
            return false;
        }
        sort_chats(&mut chats);
        self.chats = chats;
        true
    }
}

fn new_chat_from(existing: &[Chat], patch: ChatPatch) -> Chat {
    let mut chat = Chat::from_patch(patch);
    if chat.participants_info.is_empty() {
        chat.participants_info = infer_participants_info(existing, &chat.participants);
    }
    chat
}
