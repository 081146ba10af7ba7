use serde_json::{Map, Value};

use super::collection::{CollectionStore, REQUESTS, USERS};
use super::kv::{KeyValueStore, StorageError};
use crate::records::clock::Clock;
use crate::records::domain::{ID_FIELD, UPDATED_AT_FIELD};

fn id_of(record: &Value) -> Option<&str> {
    record.get(ID_FIELD).and_then(Value::as_str)
}

/// The users collection plus the request lookups user screens need.
pub struct UserDirectory<'a, S: ?Sized> {
    collections: &'a CollectionStore<S>,
}

impl<'a, S> UserDirectory<'a, S>
where
    S: KeyValueStore + ?Sized,
{
    pub fn new(collections: &'a CollectionStore<S>) -> Self {
        Self { collections }
    }

    pub fn read_all_users(&self) -> Result<Vec<Value>, StorageError> {
        self.collections.load(USERS)
    }

    pub fn write_all_users(&self, users: &[Value]) -> Result<(), StorageError> {
        self.collections.write_all(USERS, users)
    }

    pub fn append_user(&self, user: Value) -> Result<(), StorageError> {
        let mut users = self.read_all_users()?;
        users.push(user);
        self.write_all_users(&users)
    }

    /// Merges `patch` into the user and refreshes `updatedAt`. Returns false
    /// when no user has `id_number`.
    pub fn update_user(
        &self,
        id_number: &str,
        patch: &Map<String, Value>,
        clock: &dyn Clock,
    ) -> Result<bool, StorageError> {
        let mut users = self.read_all_users()?;
        let Some(user) = users
            .iter_mut()
            .find(|user| id_of(user) == Some(id_number))
            .and_then(Value::as_object_mut)
        else {
            return Ok(false);
        };

        user.extend(patch.clone());
        user.insert(UPDATED_AT_FIELD.to_string(), Value::String(clock.timestamp()));
        self.write_all_users(&users)?;
        Ok(true)
    }

    /// Removes every user with `id_number`; returns how many were removed.
    pub fn delete_user(&self, id_number: &str) -> Result<usize, StorageError> {
        let mut users = self.read_all_users()?;
        let before = users.len();
        users.retain(|user| id_of(user) != Some(id_number));
        let removed = before - users.len();
        self.write_all_users(&users)?;
        Ok(removed)
    }

    pub fn user_exists(&self, id_number: &str) -> Result<bool, StorageError> {
        Ok(self
            .read_all_users()?
            .iter()
            .any(|user| id_of(user) == Some(id_number)))
    }

    /// Checked against the reconciled requests collection.
    pub fn has_user_requests(&self, id_number: &str) -> Result<bool, StorageError> {
        Ok(self
            .collections
            .read_all(REQUESTS)?
            .iter()
            .any(|request| id_of(request) == Some(id_number)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{FixedClock, Reconciler};
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2025, 10, 2, 7, 0, 0).unwrap())
    }

    fn collections() -> CollectionStore<MemoryStore> {
        let reconciler = Arc::new(Reconciler::seeded(1, Arc::new(clock())));
        CollectionStore::new(Arc::new(MemoryStore::new()), reconciler)
    }

    #[test]
    fn update_merges_patch_and_refreshes_timestamp() {
        let collections = collections();
        let users = UserDirectory::new(&collections);
        users
            .append_user(json!({ "idNumber": "213233430", "fullName": "נועם", "isActive": true }))
            .expect("append");

        let mut patch = Map::new();
        patch.insert("isActive".to_string(), json!(false));
        assert!(users.update_user("213233430", &patch, &clock()).expect("update"));
        assert!(!users.update_user("000000000", &patch, &clock()).expect("update"));

        let stored = users.read_all_users().expect("read");
        assert_eq!(stored[0]["isActive"], false);
        assert_eq!(stored[0]["fullName"], "נועם");
        assert_eq!(stored[0]["updatedAt"], "2025-10-02T07:00:00.000Z");
    }

    #[test]
    fn delete_and_exists_match_on_id_number() {
        let collections = collections();
        let users = UserDirectory::new(&collections);
        users.append_user(json!({ "idNumber": "111111111" })).expect("append");
        users.append_user(json!({ "idNumber": "222222222" })).expect("append");

        assert!(users.user_exists("111111111").expect("exists"));
        assert_eq!(users.delete_user("111111111").expect("delete"), 1);
        assert!(!users.user_exists("111111111").expect("exists"));
        assert!(users.user_exists("222222222").expect("exists"));
    }

    #[test]
    fn request_ownership_uses_reconciled_requests() {
        let collections = collections();
        collections
            .write_all(REQUESTS, &[json!({ "idNumber": "213233430", "name": "נועם אברהמי" })])
            .expect("write");
        let users = UserDirectory::new(&collections);

        assert!(users.has_user_requests("213233430").expect("lookup"));
        assert!(!users.has_user_requests("214305047").expect("lookup"));
    }
}
