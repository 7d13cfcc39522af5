use serde::{Deserialize, Deserializer, Serialize};

/// Server message ids and locally generated ids share one space.
pub type MessageId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "lenient_id")]
    pub id: MessageId,
    #[serde(default, deserialize_with = "non_empty")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub image_url: Option<String>,
    /// `true` for messages from the agent, `false` for the user's own.
    #[serde(default, deserialize_with = "flag")]
    pub is_reply: bool,
    /// Already read.
    #[serde(default, deserialize_with = "flag")]
    pub is_view: bool,
    /// Unix seconds.
    #[serde(default)]
    pub create_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Message {
    /// An outbound message created on this device before the server knows about it.
    pub fn outgoing(
        id: MessageId,
        content: Option<String>,
        image_url: Option<String>,
        create_time: i64,
    ) -> Self {
        Message {
            id,
            content: content.filter(|c| !c.is_empty()),
            image_url: image_url.filter(|u| !u.is_empty()),
            is_reply: false,
            is_view: true,
            create_time,
            title: None,
        }
    }

    pub fn is_inbound(&self) -> bool {
        self.is_reply
    }

    pub fn is_unread(&self) -> bool {
        !self.is_view
    }

    /// Inbound and not yet read: the only messages a read confirmation can target.
    pub fn awaits_read(&self) -> bool {
        self.is_reply && !self.is_view
    }
}

/// Client-only delivery annotation for messages sent from this device.
/// Anything without an entry in the overlay is `Confirmed`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum DeliveryState {
    #[default]
    Confirmed = 0, // Acknowledged by the server, or never sent from here
    Pending = 1,   // Waiting for the send to complete
    Failed = 2,    // Send or upload failed
}

impl DeliveryState {
    /// The numeric status presentation layers historically used; `None` once confirmed.
    pub fn status_code(self) -> Option<u8> {
        match self {
            DeliveryState::Confirmed => None,
            other => Some(other as u8),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnreadState {
    pub count: usize,
    /// Earliest unread inbound message in the last fetched batch, `0` when there is none.
    pub earliest_inbound_id: MessageId,
}

impl UnreadState {
    pub fn clear(&mut self) {
        self.count = 0;
        self.earliest_inbound_id = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The id a read confirmation should target, if any.
    pub fn read_target(&self) -> Option<MessageId> {
        (self.earliest_inbound_id != 0).then_some(self.earliest_inbound_id)
    }
}

/// One page of history as the server returns it, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryPage {
    pub greeting: Vec<Message>,
    pub messages: Vec<Message>,
}

/// The chat-record endpoint answers either with a bare list or with greeting and list sections.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum HistoryPayload {
    Flat(Vec<Message>),
    Sectioned {
        #[serde(default)]
        greeting: Vec<Message>,
        #[serde(default)]
        list: Vec<Message>,
    },
}

impl From<HistoryPayload> for HistoryPage {
    fn from(payload: HistoryPayload) -> Self {
        match payload {
            HistoryPayload::Flat(messages) => HistoryPage {
                greeting: Vec::new(),
                messages,
            },
            HistoryPayload::Sectioned { greeting, list } => HistoryPage {
                greeting,
                messages: list,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordModel {
    #[serde(default)]
    pub key_world: String,
}

/// Flatten per-model newline-delimited suggestions into one ordered list.
pub fn flatten_keywords(models: &[KeywordModel]) -> Vec<String> {
    models
        .iter()
        .flat_map(|model| model.key_world.lines())
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Signing descriptor for a direct-to-storage upload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadCredentials {
    pub upload_url: String,
    /// Public URL the file is reachable at once uploaded.
    pub url: String,
    pub key: String,
    pub access_key_id: String,
    pub policy: String,
    pub signature: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireFlag {
    Bool(bool),
    Int(i64),
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<WireFlag>::deserialize(deserializer)? {
        Some(WireFlag::Bool(value)) => value,
        Some(WireFlag::Int(value)) => value != 0,
        None => false,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(i64),
    Text(String),
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<MessageId, D::Error> {
    match WireId::deserialize(deserializer)? {
        WireId::Number(id) => Ok(id),
        WireId::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn non_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}
