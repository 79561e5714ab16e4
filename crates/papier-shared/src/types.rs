use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a composite key string cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid key `{0}`")]
pub struct KeyParseError(pub String);

// A repository is the remote sync scope: `owner/name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RepoKey {
    pub owner: String,
    pub name: String,
}

impl RepoKey {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, KeyParseError> {
        match s.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => {
                Ok(Self::new(owner, name))
            }
            _ => Err(KeyParseError(s.to_string())),
        }
    }
}

impl std::fmt::Display for RepoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A channel is one directory of message files inside a repository,
/// addressed as `owner/name/channel`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub repo: RepoKey,
    pub channel: String,
}

impl ChannelKey {
    pub fn new(repo: RepoKey, channel: impl Into<String>) -> Self {
        Self {
            repo,
            channel: channel.into(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, KeyParseError> {
        let mut parts = s.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), Some(channel))
                if !owner.is_empty() && !name.is_empty() && !channel.is_empty() =>
            {
                Ok(Self::new(RepoKey::new(owner, name), channel))
            }
            _ => Err(KeyParseError(s.to_string())),
        }
    }

    /// Directory path of the channel within its repository.
    pub fn dir_path(&self) -> &str {
        &self.channel
    }

    /// Remote path of a file inside this channel's directory.
    pub fn file_path(&self, filename: &str) -> String {
        format!("{}/{}", self.channel, filename)
    }
}

impl std::fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.repo, self.channel)
    }
}

/// A message id: the message filename with its extension stripped.
/// Unique within a channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque token identifying the exact remote content of a file at a point
/// in time.  Holding one is the precondition for update/delete; the sync
/// layer refuses conditional writes without it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct VersionToken(pub String);

impl VersionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Opaque marker handed back by the remote's cheap "anything changed?"
/// probe.  Reused verbatim on the next probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevisionMarker(pub String);

impl RevisionMarker {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
