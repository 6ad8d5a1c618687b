use chrono::{DateTime, Utc};

use super::message::{Message, MessageContent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantInfo {
    pub user_id: String,
    pub full_name: Option<String>,
}

/// Preview of the most recent message in a chat. The chat list endpoint
/// sometimes returns a partial object, so every field except the content is
/// optional.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LastMessage {
    pub message_id: Option<String>,
    pub sender_id: Option<String>,
    pub content: MessageContent,
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<&Message> for LastMessage {
    fn from(message: &Message) -> Self {
        Self {
            message_id: Some(message.message_id.clone()),
            sender_id: message.sender_id.clone(),
            content: message.content.clone(),
            timestamp: Some(message.timestamp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chat {
    pub chat_id: String,
    pub participants: Vec<String>,
    pub participants_info: Vec<ParticipantInfo>,
    pub is_group: bool,
    pub group_name: Option<String>,
    pub group_picture: Option<String>,
    pub group_admin: Option<String>,
    pub last_message: Option<LastMessage>,
    pub unread_count: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    /// Whether a remote participant is currently typing.
    pub is_typing: bool,
    pub typing_user_id: Option<String>,
}

/// Partial chat record as pushed by the server or returned from REST.
/// `None` (and empty participant lists) mean "not present in the update".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatPatch {
    pub chat_id: String,
    pub participants: Option<Vec<String>>,
    pub participants_info: Option<Vec<ParticipantInfo>>,
    pub is_group: Option<bool>,
    pub group_name: Option<String>,
    pub group_picture: Option<String>,
    pub group_admin: Option<String>,
    pub last_message: Option<LastMessage>,
    pub unread_count: Option<u32>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl ChatPatch {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            ..Self::default()
        }
    }
}

impl Chat {
    pub fn from_patch(patch: ChatPatch) -> Self {
        let mut chat = Self {
            chat_id: patch.chat_id.clone(),
            ..Self::default()
        };
        chat.apply(patch);
        chat
    }

    /// Overlays the fields present in `patch`, keeping everything else.
    pub fn apply(&mut self, patch: ChatPatch) {
        if let Some(participants) = patch.participants.filter(|p| !p.is_empty()) {
            self.participants = participants;
        }
        if let Some(info) = patch.participants_info.filter(|p| !p.is_empty()) {
            self.participants_info = info;
        }
        if let Some(is_group) = patch.is_group {
            self.is_group = is_group;
        }
        if patch.group_name.is_some() {
            self.group_name = patch.group_name;
        }
        if patch.group_picture.is_some() {
            self.group_picture = patch.group_picture;
        }
        if patch.group_admin.is_some() {
            self.group_admin = patch.group_admin;
        }
        if patch.last_message.is_some() {
            self.last_message = patch.last_message;
        }
        if let Some(unread_count) = patch.unread_count {
            self.unread_count = unread_count;
        }
        if patch.created_at.is_some() {
            self.created_at = patch.created_at;
        }
        if patch.updated_at.is_some() {
            self.updated_at = patch.updated_at;
        }
        if patch.is_active.is_some() {
            self.is_active = patch.is_active;
        }
    }

    /// Ordering key for the chat list: last message time, else creation time.
    pub fn activity_at(&self) -> Option<DateTime<Utc>> {
        self.last_message
            .as_ref()
            .and_then(|last| last.timestamp)
            .or(self.created_at)
    }

    /// Group name for groups, otherwise the names of the other participants.
    pub fn display_title(&self, local_user_id: Option<&str>) -> String {
        if self.is_group {
            if let Some(name) = self.group_name.as_deref().filter(|n| !n.trim().is_empty()) {
                return name.to_owned();
            }
        }

        let others: Vec<&str> = self
            .participants_info
            .iter()
            .filter(|info| Some(info.user_id.as_str()) != local_user_id)
            .map(|info| info.full_name.as_deref().unwrap_or(info.user_id.as_str()))
            .collect();

        if others.is_empty() {
            self.chat_id.clone()
        } else {
            others.join(", ")
        }
    }
}

/// Sorts chats descending by [`Chat::activity_at`]; chats without any
/// timestamp go last. The sort is stable.
pub fn sort_chats(chats: &mut [Chat]) {
    chats.sort_by(|a, b| b.activity_at().cmp(&a.activity_at()));
}

/// Borrows participant info from the first chat that knows any of
/// `participants`, keeping only its entries for those participants.
pub fn infer_participants_info(chats: &[Chat], participants: &[String]) -> Vec<ParticipantInfo> {
    let overlaps = |info: &ParticipantInfo| participants.contains(&info.user_id);

    chats
        .iter()
        .find(|chat| chat.participants_info.iter().any(overlaps))
        .map(|chat| {
            chat.participants_info
                .iter()
                .filter(|info| overlaps(info))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn info(user_id: &str, name: &str) -> ParticipantInfo {
        ParticipantInfo {
            user_id: user_id.to_owned(),
            full_name: Some(name.to_owned()),
        }
    }

    #[test]
    fn apply_keeps_fields_missing_from_patch() {
        let mut chat = Chat::from_patch(ChatPatch {
            group_name: Some("Hikers".to_owned()),
            participants: Some(vec!["u1".to_owned(), "u2".to_owned()]),
            participants_info: Some(vec![info("u1", "Ada"), info("u2", "Bo")]),
            unread_count: Some(2),
            ..ChatPatch::new("c1")
        });

        chat.apply(ChatPatch {
            updated_at: Some(at(5)),
            participants_info: Some(vec![]),
            ..ChatPatch::new("c1")
        });

        assert_eq!(chat.group_name.as_deref(), Some("Hikers"));
        assert_eq!(chat.participants_info.len(), 2);
        assert_eq!(chat.unread_count, 2);
        assert_eq!(chat.updated_at, Some(at(5)));
    }

    #[test]
    fn activity_prefers_last_message_time() {
        let chat = Chat {
            created_at: Some(at(1)),
            last_message: Some(LastMessage {
                timestamp: Some(at(3)),
                ..LastMessage::default()
            }),
            ..Chat::default()
        };

        assert_eq!(chat.activity_at(), Some(at(3)));
    }

    #[test]
    fn activity_falls_back_to_creation_time() {
        let chat = Chat {
            created_at: Some(at(1)),
            last_message: Some(LastMessage::default()),
            ..Chat::default()
        };

        assert_eq!(chat.activity_at(), Some(at(1)));
    }

    #[test]
    fn sort_orders_newest_first_and_undated_last() {
        let mut chats = vec![
            Chat {
                chat_id: "undated".to_owned(),
                ..Chat::default()
            },
            Chat {
                chat_id: "old".to_owned(),
                created_at: Some(at(1)),
                ..Chat::default()
            },
            Chat {
                chat_id: "new".to_owned(),
                created_at: Some(at(9)),
                ..Chat::default()
            },
        ];

        sort_chats(&mut chats);

        let ids: Vec<_> = chats.iter().map(|c| c.chat_id.as_str()).collect();
        assert_eq!(ids, ["new", "old", "undated"]);
    }

    #[test]
    fn infers_participant_info_from_first_overlapping_chat() {
        let chats = vec![
            Chat {
                participants_info: vec![info("u1", "Ada"), info("u2", "Bo")],
                ..Chat::default()
            },
            Chat {
                participants_info: vec![info("u1", "Ada"), info("u3", "Cy")],
                ..Chat::default()
            },
        ];

        let inferred = infer_participants_info(&chats, &["u1".to_owned(), "u3".to_owned()]);

        assert_eq!(inferred, vec![info("u1", "Ada")]);
    }

    #[test]
    fn skips_chats_without_overlap_when_inferring() {
        let chats = vec![
            Chat {
                participants_info: vec![info("u7", "Gus")],
                ..Chat::default()
            },
            Chat {
                participants_info: vec![info("u2", "Bo"), info("u3", "Cy")],
                ..Chat::default()
            },
        ];

        let inferred = infer_participants_info(&chats, &["u3".to_owned(), "u9".to_owned()]);

        assert_eq!(inferred, vec![info("u3", "Cy")]);
        assert!(infer_participants_info(&chats, &["u9".to_owned()]).is_empty());
    }

    #[test]
    fn display_title_uses_group_name_or_other_participants() {
        let group = Chat {
            chat_id: "c1".to_owned(),
            is_group: true,
            group_name: Some("Climbing".to_owned()),
            ..Chat::default()
        };
        let direct = Chat {
            chat_id: "c2".to_owned(),
            participants_info: vec![info("me", "Me"), info("u2", "Bo")],
            ..Chat::default()
        };

        assert_eq!(group.display_title(Some("me")), "Climbing");
        assert_eq!(direct.display_title(Some("me")), "Bo");
        assert_eq!(Chat::default().display_title(None), "");
    }
}
