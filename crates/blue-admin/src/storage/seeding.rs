use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::collection::{CollectionStore, REQUESTS, USERS};
use super::kv::{KeyValueStore, StorageError};
use crate::records::clock::Clock;
use crate::records::seed::{seed_requests, seed_users};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub requests_seeded: usize,
    pub users_seeded: usize,
}

/// Writes the demo requests and users into collections that are empty, or
/// into every collection when `force` is set.
pub fn seed_demo_data<S, R>(
    collections: &CollectionStore<S>,
    rng: &mut R,
    clock: &dyn Clock,
    force: bool,
) -> Result<SeedReport, StorageError>
where
    S: KeyValueStore + ?Sized,
    R: Rng + ?Sized,
{
    let mut report = SeedReport::default();

    if force || collections.load(REQUESTS)?.is_empty() {
        let requests = seed_requests(rng, clock);
        collections.write_all(REQUESTS, &requests)?;
        report.requests_seeded = requests.len();
    }

    if force || collections.load(USERS)?.is_empty() {
        let users = seed_users(rng, clock)
            .into_iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;
        collections.write_all(USERS, &users)?;
        report.users_seeded = users.len();
    }

    if report != SeedReport::default() {
        info!(
            requests = report.requests_seeded,
            users = report.users_seeded,
            "demo data seeded"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{FixedClock, Reconciler};
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;
    use std::sync::Arc;

    fn collections(clock: FixedClock) -> CollectionStore<MemoryStore> {
        let reconciler = Arc::new(Reconciler::seeded(2, Arc::new(clock)));
        CollectionStore::new(Arc::new(MemoryStore::new()), reconciler)
    }

    #[test]
    fn seeds_only_empty_collections_unless_forced() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0).unwrap());
        let collections = collections(clock);
        collections
            .write_all(USERS, &[json!({ "idNumber": "123456789" })])
            .expect("write");
        let mut rng = StdRng::seed_from_u64(4);

        let report = seed_demo_data(&collections, &mut rng, &clock, false).expect("seed");
        assert_eq!(report.requests_seeded, 15);
        assert_eq!(report.users_seeded, 0);

        let again = seed_demo_data(&collections, &mut rng, &clock, false).expect("seed");
        assert_eq!(again, SeedReport::default());

        let forced = seed_demo_data(&collections, &mut rng, &clock, true).expect("seed");
        assert_eq!(forced.users_seeded, 8);
    }

    #[test]
    fn seeded_requests_need_no_reconciliation() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0).unwrap());
        let collections = collections(clock);
        seed_demo_data(&collections, &mut StdRng::seed_from_u64(4), &clock, false).expect("seed");

        let read = collections.read_all_reconciled(REQUESTS).expect("read");

        assert!(!read.report.changed());
    }
}
