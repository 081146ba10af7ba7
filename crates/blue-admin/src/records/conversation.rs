use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::clock::Clock;
use super::domain::{
    Attachment, RequestStatus, Role, CONVERSATION_FIELD, STATUS_FIELD, UPDATED_AT_FIELD,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationError {
    #[error("request is closed to replies")]
    Closed,
    #[error("reply text is empty")]
    EmptyText,
}

/// A message added to a request's conversation. Only admin replies carry
/// attachment metadata.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reply {
    pub sender: Role,
    pub text: String,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

fn status_is(record: &Map<String, Value>, status: RequestStatus) -> bool {
    record.get(STATUS_FIELD).and_then(Value::as_str) == Some(status.label())
}

fn set_status(record: &mut Map<String, Value>, status: RequestStatus) {
    record.insert(STATUS_FIELD.to_string(), Value::from(status.label()));
}

pub fn is_closed(record: &Map<String, Value>) -> bool {
    status_is(record, RequestStatus::Closed)
}

/// Moves an open request to in progress once an admin looks at it.
/// Returns whether the status changed; `updatedAt` is left alone.
pub fn begin_handling(record: &mut Map<String, Value>) -> bool {
    if !status_is(record, RequestStatus::Open) {
        return false;
    }
    set_status(record, RequestStatus::InProgress);
    true
}

/// Appends a trimmed reply and refreshes `updatedAt`.
///
/// Admin replies also move an open request to in progress and are stamped
/// in epoch milliseconds; student replies are stamped with RFC 3339 text.
pub fn append_reply(
    record: &mut Map<String, Value>,
    reply: &Reply,
    clock: &dyn Clock,
) -> Result<(), ConversationError> {
    let text = reply.text.trim();
    if text.is_empty() {
        return Err(ConversationError::EmptyText);
    }
    if is_closed(record) {
        return Err(ConversationError::Closed);
    }

    let now = clock.now();
    let timestamp = match reply.sender {
        Role::Admin => Value::from(now.timestamp_millis()),
        Role::Student => Value::from(clock.timestamp()),
    };
    let mut entry = json!({
        "sender": reply.sender.label(),
        "text": text,
        "timestamp": timestamp,
    });
    if let (Role::Admin, Some(attachment)) = (reply.sender, &reply.attachment) {
        entry["attachment"] = json!(attachment);
    }

    if reply.sender == Role::Admin {
        begin_handling(record);
    }
    match record.get_mut(CONVERSATION_FIELD) {
        Some(Value::Array(conversation)) => conversation.push(entry),
        _ => {
            record.insert(CONVERSATION_FIELD.to_string(), Value::Array(vec![entry]));
        }
    }
    record.insert(UPDATED_AT_FIELD.to_string(), Value::from(clock.timestamp()));
    Ok(())
}

/// Closes the request. Returns false, touching nothing, when it was
/// already closed.
pub fn close(record: &mut Map<String, Value>, clock: &dyn Clock) -> bool {
    if is_closed(record) {
        return false;
    }
    set_status(record, RequestStatus::Closed);
    record.insert(UPDATED_AT_FIELD.to_string(), Value::from(clock.timestamp()));
    true
}
