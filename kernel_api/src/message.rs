//! Messages carried through mailboxes

use core_types::EventId;
use serde::{Deserialize, Serialize};

/// Type-erased message payload
///
/// Payloads are serialized at the sender and deserialized at the receiver,
/// so a mailbox can carry any message shape without the kernel knowing
/// about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Serialized data (JSON for now)
    data: Vec<u8>,
}

impl MessagePayload {
    /// Creates a new payload from serializable data
    pub fn new<T: Serialize>(data: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_vec(data)?;
        Ok(Self { data: json })
    }

    /// Deserializes the payload into a specific type
    pub fn deserialize<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }

    /// Returns the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// A message stored in a mailbox
///
/// Either an event notification (the fixed payload an event trigger posts
/// to every attached mailbox, identifying the event that fired) or a
/// caller-supplied payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Notification that the named event fired
    Event(EventId),
    /// Caller-supplied data
    Payload(MessagePayload),
}

impl Message {
    /// Creates a payload message from serializable data
    pub fn payload<T: Serialize>(data: &T) -> Result<Self, serde_json::Error> {
        Ok(Message::Payload(MessagePayload::new(data)?))
    }

    /// Returns the event id if this is an event notification
    pub fn as_event(&self) -> Option<EventId> {
        match self {
            Message::Event(event) => Some(*event),
            Message::Payload(_) => None,
        }
    }

    /// Deserializes a payload message into a specific type
    ///
    /// Returns `None` for event notifications.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Option<Result<T, serde_json::Error>> {
        match self {
            Message::Payload(payload) => Some(payload.deserialize()),
            Message::Event(_) => None,
        }
    }
}
