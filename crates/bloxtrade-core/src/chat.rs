//! Chat and participant model

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CoreError, Result};
use crate::message::Message;
use crate::types::{ChatId, Timestamp, UserId};
use crate::{MAX_CHAT_NAME_LENGTH, MIN_GROUP_PARTICIPANTS};

/// Chat kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    /// Two-party conversation
    Direct,
    /// N-party conversation with admin roles
    Group,
}

/// Role of a participant within a chat
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Member,
    Admin,
}

/// A user's membership record within a chat
///
/// Participants are soft-removed (`is_active = false`) rather than deleted,
/// preserving message history attribution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Participant {
    /// User reference
    pub user_id: UserId,
    /// Role within the chat
    pub role: ParticipantRole,
    /// False once the user left or was removed
    pub is_active: bool,
    /// When the user joined
    pub joined_at: Timestamp,
    /// Last time the user opened the chat
    pub last_seen_at: Option<Timestamp>,
}

impl Participant {
    /// Create an active participant
    pub fn new(user_id: UserId, role: ParticipantRole) -> Self {
        Self {
            user_id,
            role,
            is_active: true,
            joined_at: Timestamp::now(),
            last_seen_at: None,
        }
    }
}

/// Per-chat settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatSettings {
    /// Whether non-admin members may invite others (group chats)
    pub allow_member_invites: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            allow_member_invites: false,
        }
    }
}

/// Cached summary of the most recent message
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LastMessage {
    /// Message reference
    pub message_id: crate::types::MessageId,
    /// Sender reference
    pub sender_id: UserId,
    /// Content preview
    pub content: String,
    /// When it was sent
    pub sent_at: Timestamp,
}

/// A direct or group conversation container
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chat {
    /// Chat ID
    pub id: ChatId,
    /// Direct or group
    pub chat_type: ChatType,
    /// Display name (group chats; direct chats derive it from the counterpart)
    pub name: Option<String>,
    /// Avatar URL (group chats)
    pub avatar_url: Option<String>,
    /// Membership records, including soft-removed ones
    pub participants: Vec<Participant>,
    /// Cached most recent message
    pub last_message: Option<LastMessage>,
    /// Unread message count per user
    pub unread_counts: HashMap<UserId, u32>,
    /// Total messages ever sent
    pub message_count: u64,
    /// False once the chat is soft-deleted
    pub is_active: bool,
    /// Chat settings
    pub settings: ChatSettings,
    /// Creation time
    pub created_at: Timestamp,
    /// Last activity time
    pub updated_at: Timestamp,
}

impl Chat {
    /// Create a direct chat between two distinct users
    pub fn direct(a: UserId, b: UserId) -> Result<Self> {
        if a == b {
            return Err(CoreError::Validation(
                "cannot create a direct chat with yourself".to_string(),
            ));
        }
        let now = Timestamp::now();
        Ok(Self {
            id: ChatId::new(),
            chat_type: ChatType::Direct,
            name: None,
            avatar_url: None,
            participants: vec![
                Participant::new(a, ParticipantRole::Member),
                Participant::new(b, ParticipantRole::Member),
            ],
            last_message: None,
            unread_counts: HashMap::new(),
            message_count: 0,
            is_active: true,
            settings: ChatSettings::default(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Create a group chat; the creator becomes the first admin
    pub fn group(creator: UserId, others: Vec<UserId>, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_CHAT_NAME_LENGTH {
            return Err(CoreError::Validation(format!(
                "group name must be 1..={} characters",
                MAX_CHAT_NAME_LENGTH
            )));
        }
        let mut members: Vec<UserId> = others;
        members.retain(|u| *u != creator);
        members.sort();
        members.dedup();
        if members.len() < MIN_GROUP_PARTICIPANTS {
            return Err(CoreError::Validation(format!(
                "a group chat needs at least {} other participants",
                MIN_GROUP_PARTICIPANTS
            )));
        }
        let mut participants = vec![Participant::new(creator, ParticipantRole::Admin)];
        participants.extend(
            members
                .into_iter()
                .map(|u| Participant::new(u, ParticipantRole::Member)),
        );
        let now = Timestamp::now();
        Ok(Self {
            id: ChatId::new(),
            chat_type: ChatType::Group,
            name: Some(name),
            avatar_url: None,
            participants,
            last_message: None,
            unread_counts: HashMap::new(),
            message_count: 0,
            is_active: true,
            settings: ChatSettings::default(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Canonical lookup key for a direct chat: the unordered user pair
    pub fn direct_pair_key(a: &UserId, b: &UserId) -> String {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        format!("{}:{}", lo, hi)
    }

    /// Pair key of this chat, if it is a direct chat
    pub fn pair_key(&self) -> Option<String> {
        if self.chat_type != ChatType::Direct {
            return None;
        }
        let mut ids: Vec<&UserId> = self.participants.iter().map(|p| &p.user_id).collect();
        ids.sort();
        match ids.as_slice() {
            [a, b] => Some(Self::direct_pair_key(a, b)),
            _ => None,
        }
    }

    /// Find a participant record by user
    pub fn participant(&self, user_id: &UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.user_id == user_id)
    }

    fn participant_mut(&mut self, user_id: &UserId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| &p.user_id == user_id)
    }

    /// Whether the user is an active participant
    pub fn is_active_participant(&self, user_id: &UserId) -> bool {
        self.participant(user_id).is_some_and(|p| p.is_active)
    }

    /// Whether the user is an active admin
    pub fn is_admin(&self, user_id: &UserId) -> bool {
        self.participant(user_id)
            .is_some_and(|p| p.is_active && p.role == ParticipantRole::Admin)
    }

    /// Active participants
    pub fn active_participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.is_active)
    }

    /// Number of active admins
    pub fn active_admin_count(&self) -> usize {
        self.active_participants()
            .filter(|p| p.role == ParticipantRole::Admin)
            .count()
    }

    /// Add a participant, reactivating a soft-removed record if one exists
    pub fn add_participant(&mut self, user_id: UserId) -> Result<()> {
        if let Some(p) = self.participant_mut(&user_id) {
            if p.is_active {
                return Err(CoreError::Conflict(format!(
                    "user {} is already a participant",
                    user_id
                )));
            }
            p.is_active = true;
            p.role = ParticipantRole::Member;
            p.joined_at = Timestamp::now();
        } else {
            self.participants
                .push(Participant::new(user_id, ParticipantRole::Member));
        }
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Soft-remove a participant
    ///
    /// The last active admin of a group chat cannot be removed.
    pub fn remove_participant(&mut self, user_id: &UserId) -> Result<()> {
        if self.is_admin(user_id) && self.active_admin_count() == 1 {
            return Err(CoreError::LastAdmin(user_id.clone()));
        }
        let p = self
            .participant_mut(user_id)
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::NotParticipant(user_id.clone()))?;
        p.is_active = false;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Change a participant's role
    ///
    /// Demoting the last active admin is rejected.
    pub fn set_role(&mut self, user_id: &UserId, role: ParticipantRole) -> Result<()> {
        if role == ParticipantRole::Member
            && self.is_admin(user_id)
            && self.active_admin_count() == 1
        {
            return Err(CoreError::LastAdmin(user_id.clone()));
        }
        let p = self
            .participant_mut(user_id)
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::NotParticipant(user_id.clone()))?;
        p.role = role;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Record a newly sent message into the chat's caches
    pub fn record_message(&mut self, message: &Message) {
        self.last_message = Some(LastMessage {
            message_id: message.id.clone(),
            sender_id: message.sender_id.clone(),
            content: message.content.clone(),
            sent_at: message.created_at,
        });
        self.message_count += 1;
        self.updated_at = message.created_at;
    }

    /// Increment a user's unread counter
    pub fn increment_unread(&mut self, user_id: &UserId) {
        *self.unread_counts.entry(user_id.clone()).or_insert(0) += 1;
    }

    /// Reset a user's unread counter, returning the prior value
    pub fn reset_unread(&mut self, user_id: &UserId) -> u32 {
        self.unread_counts.remove(user_id).unwrap_or(0)
    }

    /// Current unread count for a user
    pub fn unread_for(&self, user_id: &UserId) -> u32 {
        self.unread_counts.get(user_id).copied().unwrap_or(0)
    }

    /// Mark the chat as opened by a user
    pub fn touch_seen(&mut self, user_id: &UserId) {
        if let Some(p) = self.participant_mut(user_id) {
            p.last_seen_at = Some(Timestamp::now());
        }
    }
}
