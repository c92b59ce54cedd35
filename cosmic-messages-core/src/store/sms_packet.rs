//! SMS Messages Packet Body
//!
//! Conversations synchronized from the phone arrive as the body of a
//! `cconnect.sms.messages` packet:
//!
//! ```json
//! {
//!   "conversations": [
//!     {
//!       "thread_id": 42,
//!       "messages": [
//!         { "_id": 1, "thread_id": 42, "address": "+1234567890",
//!           "body": "Hi", "date": 1700000000000, "type": 1, "read": 0 }
//!       ]
//!     }
//!   ]
//! }
//! ```

use crate::Result;
use serde::{Deserialize, Serialize};

/// Packet type carrying SMS messages
pub const PACKET_TYPE_SMS_MESSAGES: &str = "cconnect.sms.messages";

/// Message type value for received messages
pub const MESSAGE_TYPE_RECEIVED: i32 = 1;

/// Message type value for sent messages
pub const MESSAGE_TYPE_SENT: i32 = 2;

/// SMS message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsMessage {
    /// Message ID
    #[serde(rename = "_id")]
    pub id: i64,

    /// Thread ID
    pub thread_id: i64,

    /// Phone number/address
    pub address: String,

    /// Message body
    pub body: String,

    /// Timestamp (milliseconds since epoch)
    pub date: i64,

    /// Message type (1 = received, 2 = sent)
    #[serde(rename = "type")]
    pub message_type: i32,

    /// Read status (0 = unread, 1 = read)
    pub read: i32,
}

impl SmsMessage {
    pub fn is_sent(&self) -> bool {
        self.message_type == MESSAGE_TYPE_SENT
    }

    pub fn is_read(&self) -> bool {
        self.read != 0
    }
}

/// SMS conversation thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsConversation {
    /// Thread ID
    pub thread_id: i64,

    /// Messages in this conversation
    pub messages: Vec<SmsMessage>,
}

/// SMS messages packet body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsMessages {
    /// List of conversations
    pub conversations: Vec<SmsConversation>,
}

impl SmsMessages {
    /// Decode a packet body
    pub fn from_body(body: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(body)?)
    }

    /// Decode a packet body from its JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Total number of messages across all conversations
    pub fn message_count(&self) -> usize {
        self.conversations.iter().map(|c| c.messages.len()).sum()
    }
}
