//! Spark message payloads

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::MessageError;

/// Rendering mode of a message body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum MessageFormat {
    #[default]
    Text,
    Markdown,
    Html,
}

impl MessageFormat {
    /// Every format, in the order offered to users
    pub const ALL: [MessageFormat; 3] = [Self::Text, Self::Markdown, Self::Html];

    /// JSON key the body is sent under
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Html => "html",
        }
    }
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageFormat {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MessageError::UnknownFormat(s.to_string()))
    }
}

impl TryFrom<String> for MessageFormat {
    type Error = MessageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A room or space that receives messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Display name, informational only
    pub name: Option<String>,
    /// Recipient key used by the API
    pub id: String,
}

impl Target {
    pub fn new(id: impl Into<String>) -> Self {
        Self { name: None, id: id.into() }
    }

    pub fn named(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            id: id.into(),
        }
    }
}

/// A validated message ready to be posted.
///
/// Serializes as `{"roomId": ..., "<format>": body}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    room_id: String,
    body: String,
    format: MessageFormat,
}

impl Message {
    pub fn new(
        room_id: impl Into<String>,
        body: impl Into<String>,
        format: MessageFormat,
    ) -> Result<Self, MessageError> {
        let room_id = room_id.into();
        let body = body.into();

        if !Self::is_message_valid(&body) {
            return Err(MessageError::EmptyBody);
        }
        if !Self::is_target_id_valid(&room_id) {
            return Err(MessageError::EmptyTargetId);
        }

        Ok(Self { room_id, body, format })
    }

    /// A message needs at least one non-whitespace character
    pub fn is_message_valid(message: &str) -> bool {
        !message.trim().is_empty()
    }

    pub fn is_target_id_valid(id: &str) -> bool {
        !id.trim().is_empty()
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn format(&self) -> MessageFormat {
        self.format
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("roomId", &self.room_id)?;
        map.serialize_entry(self.format.as_str(), &self.body)?;
        map.end()
    }
}
