use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WorkspaceId(pub Uuid);

impl WorkspaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkspaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChannelId(pub Uuid);

impl ChannelId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Topic string feed implementations key their upstream subscriptions
    /// by for this channel.
    pub fn to_topic(&self) -> String {
        format!("channel:{}", self.0)
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message identifier.
///
/// The persistence service assigns canonical ids whose shape we do not
/// control, so this is a string newtype rather than a UUID.  Messages
/// appended optimistically carry a `local-` prefixed temporary id until
/// the send is confirmed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    const LOCAL_PREFIX: &'static str = "local-";

    /// Generate a fresh temporary id for an optimistic message.
    pub fn local() -> Self {
        Self(format!("{}{}", Self::LOCAL_PREFIX, Uuid::new_v4()))
    }

    /// Whether this id is a locally-generated temporary id.
    pub fn is_local(&self) -> bool {
        self.0.starts_with(Self::LOCAL_PREFIX)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Actor identifier, supplied by the external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub String);

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform-wide role of an actor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// External client user; may not see internal channels.
    Client,
    /// Regular staff member.
    Member,
    /// Workspace manager.
    Manager,
    /// Platform administrator.
    Admin,
}

impl Role {
    /// Non-client roles; these may see `internal` channels.
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Client)
    }

    /// Roles allowed to manage channels (create/update/delete, moderate).
    pub fn can_manage(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

/// Denormalised snapshot of an actor, embedded in messages so history
/// stays readable even if the identity record later changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub name: String,
    /// Avatar glyph or URL; display-only.
    pub avatar: Option<String>,
    pub role: Role,
}

impl ActorSnapshot {
    /// The synthetic sender used for platform-generated system messages.
    pub fn system() -> Self {
        Self {
            id: ActorId(crate::constants::SYSTEM_ACTOR_ID.to_string()),
            name: crate::constants::SYSTEM_ACTOR_NAME.to_string(),
            avatar: None,
            role: Role::Admin,
        }
    }
}
