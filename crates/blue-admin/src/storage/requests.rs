use serde_json::{Map, Value};
use tracing::info;

use super::collection::{CollectionStore, REQUESTS};
use super::kv::{KeyValueStore, StorageError};
use super::remote::DOCUMENT_ID_FIELD;
use crate::records::clock::Clock;
use crate::records::conversation::{self, ConversationError, Reply};
use crate::records::domain::ID_FIELD;

#[derive(Debug, thiserror::Error)]
pub enum RequestUpdateError {
    #[error("no request matches {0}")]
    NotFound(String),
    #[error(transparent)]
    Conversation(#[from] ConversationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Positions of the requests addressed by `key`: the record whose document
/// id is `key`, otherwise every record with that `idNumber`.
fn targets(requests: &[Value], key: &str) -> Vec<usize> {
    let field_matches = |field: &str| -> Vec<usize> {
        requests
            .iter()
            .enumerate()
            .filter(|(_, request)| request.get(field).and_then(Value::as_str) == Some(key))
            .map(|(index, _)| index)
            .collect()
    };
    let by_document = field_matches(DOCUMENT_ID_FIELD);
    if by_document.is_empty() {
        field_matches(ID_FIELD)
    } else {
        by_document
    }
}

/// Status changes and replies on the reconciled requests collection.
pub struct RequestDesk<'a, S: ?Sized> {
    collections: &'a CollectionStore<S>,
}

impl<'a, S> RequestDesk<'a, S>
where
    S: KeyValueStore + ?Sized,
{
    pub fn new(collections: &'a CollectionStore<S>) -> Self {
        Self { collections }
    }

    /// Applies `update` to every addressed request and writes the collection
    /// back when any of them changed. Nothing is written if `update` fails
    /// for one of them.
    fn update<F>(&self, key: &str, mut update: F) -> Result<Vec<Value>, RequestUpdateError>
    where
        F: FnMut(&mut Map<String, Value>) -> Result<bool, ConversationError>,
    {
        let mut requests = self.collections.read_all(REQUESTS)?;
        let positions = targets(&requests, key);
        if positions.is_empty() {
            return Err(RequestUpdateError::NotFound(key.to_string()));
        }

        let mut changed = false;
        for &index in &positions {
            if let Some(record) = requests[index].as_object_mut() {
                changed |= update(record)?;
            }
        }
        if changed {
            self.collections.write_all(REQUESTS, &requests)?;
        }
        Ok(positions.into_iter().map(|index| requests[index].clone()).collect())
    }

    /// Admin opened the request: open becomes in progress.
    pub fn open_request(&self, key: &str) -> Result<Vec<Value>, RequestUpdateError> {
        let updated = self.update(key, |record| Ok(conversation::begin_handling(record)))?;
        info!(request = %key, matched = updated.len(), "request opened for handling");
        Ok(updated)
    }

    pub fn reply(
        &self,
        key: &str,
        reply: &Reply,
        clock: &dyn Clock,
    ) -> Result<Vec<Value>, RequestUpdateError> {
        let updated = self.update(key, |record| {
            conversation::append_reply(record, reply, clock).map(|()| true)
        })?;
        info!(request = %key, sender = reply.sender.label(), "reply added");
        Ok(updated)
    }

    pub fn close(&self, key: &str, clock: &dyn Clock) -> Result<Vec<Value>, RequestUpdateError> {
        let updated = self.update(key, |record| Ok(conversation::close(record, clock)))?;
        info!(request = %key, "request closed");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{FixedClock, Reconciler, Role};
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2025, 10, 3, 11, 0, 0).unwrap())
    }

    fn collections() -> CollectionStore<MemoryStore> {
        let reconciler = Arc::new(Reconciler::seeded(2, Arc::new(clock())));
        let collections = CollectionStore::new(Arc::new(MemoryStore::new()), reconciler);
        collections
            .write_all(
                REQUESTS,
                &[
                    json!({ "idNumber": "213233430", "name": "נועם", "status": "פתוחה" }),
                    json!({ "idNumber": "111222333", "name": "מיה בר", "status": "נסגרה" }),
                    json!({ "id": "doc-000007", "idNumber": "444555666", "name": "רן בר", "status": "פתוחה" }),
                ],
            )
            .expect("requests");
        collections
    }

    fn admin_reply(text: &str) -> Reply {
        Reply {
            sender: Role::Admin,
            text: text.to_string(),
            attachment: None,
        }
    }

    #[test]
    fn admin_reply_is_persisted_and_starts_handling() {
        let collections = collections();
        let desk = RequestDesk::new(&collections);

        let updated = desk.reply("213233430", &admin_reply("נבדק"), &clock()).expect("reply");

        assert_eq!(updated.len(), 1);
        let stored = collections.load(REQUESTS).expect("load");
        assert_eq!(stored[0]["status"], "בטיפול");
        assert_eq!(stored[0]["conversation"][0]["text"], "נבדק");
        assert_eq!(stored[0]["updatedAt"], "2025-10-03T11:00:00.000Z");
    }

    #[test]
    fn closed_requests_refuse_replies_without_writing() {
        let collections = collections();
        let desk = RequestDesk::new(&collections);
        let before = collections.read_all(REQUESTS).expect("read");

        let result = desk.reply("111222333", &admin_reply("שלום"), &clock());

        assert!(matches!(
            result,
            Err(RequestUpdateError::Conversation(ConversationError::Closed))
        ));
        assert_eq!(collections.load(REQUESTS).expect("load"), before);
    }

    #[test]
    fn document_id_is_preferred_over_id_number() {
        let collections = collections();
        let desk = RequestDesk::new(&collections);

        let updated = desk.close("doc-000007", &clock()).expect("close");

        assert_eq!(updated[0]["idNumber"], "444555666");
        assert_eq!(collections.load(REQUESTS).expect("load")[2]["status"], "נסגרה");
    }

    #[test]
    fn opening_moves_open_requests_only() {
        let collections = collections();
        let desk = RequestDesk::new(&collections);

        let opened = desk.open_request("213233430").expect("open");
        let closed = desk.open_request("111222333").expect("open");

        assert_eq!(opened[0]["status"], "בטיפול");
        assert_eq!(closed[0]["status"], "נסגרה");
    }

    #[test]
    fn unknown_requests_are_reported() {
        let collections = collections();
        let desk = RequestDesk::new(&collections);

        assert!(matches!(
            desk.close("999999999", &clock()),
            Err(RequestUpdateError::NotFound(key)) if key == "999999999"
        ));
    }
}
