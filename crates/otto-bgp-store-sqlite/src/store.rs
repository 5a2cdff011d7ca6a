// crates/otto-bgp-store-sqlite/src/store.rs
// ============================================================================
// Module: Durable Rollout Event store
// Description: Append-only SQLite table keyed by run_id, queryable sorted by
// recorded_at (section 4.6, section 6, section 8 property 6).
// Purpose: Let a crashed-and-restarted process read the last event per run
// and resume inspection; resuming execution is out of scope for v1.
// Dependencies: otto-bgp-core, rusqlite, serde_json, time
// ============================================================================

//! ## Overview
//! [`EventStore`] is a thin append-only wrapper over a single `SQLite`
//! connection. A Rollout Event is never mutated after insertion (§3); the
//! store enforces that by only exposing `append` and read queries, no
//! update/delete.

use std::path::Path;
use std::sync::Mutex;

use otto_bgp_core::EventId;
use otto_bgp_core::RolloutEvent;
use otto_bgp_core::RolloutEventType;
use otto_bgp_core::RunId;
use otto_bgp_core::Timestamp;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::StoreError;

const SCHEMA_VERSION: i64 = 1;

/// Durable, append-only Rollout Event log backed by `SQLite`.
///
/// # Invariants
/// - Events are never updated or deleted once appended.
/// - Access to the single connection is serialized through a mutex.
pub struct EventStore {
    connection: Mutex<Connection>,
}

impl EventStore {
    /// Open (creating if absent) the event store at `path`, running schema
    /// migration as needed.
    ///
    /// # Errors
    /// Returns [`StoreError::Open`] if the database cannot be opened or
    /// migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let connection = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })?;
        connection
            .pragma_update(None, "journal_mode", "WAL")
            .map_err(StoreError::Query)?;
        migrate(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Open an in-memory store, used by tests and short-lived CLI
    /// invocations that don't need persistence across processes.
    ///
    /// # Errors
    /// Returns [`StoreError::Open`] if the in-memory database cannot be
    /// initialized.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: ":memory:".to_owned(),
            source,
        })?;
        migrate(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Append one event. Never mutates an existing row.
    ///
    /// # Errors
    /// Returns [`StoreError::Payload`] if the event or its payload cannot be
    /// serialized, or [`StoreError::Query`]/[`StoreError::Corrupt`] if the
    /// underlying mutex is poisoned or the insert fails.
    pub fn append(&self, event: &RolloutEvent) -> Result<(), StoreError> {
        let event_type_json = serde_json::to_string(event.event_type()).map_err(StoreError::Payload)?;
        let payload_json = serde_json::to_string(event.payload()).map_err(StoreError::Payload)?;
        let recorded_at = event.recorded_at().to_rfc3339();

        let guard = self
            .connection
            .lock()
            .map_err(|_| StoreError::Corrupt("event store mutex poisoned".to_owned()))?;
        guard
            .execute(
                "INSERT INTO rollout_events (event_id, run_id, event_type, payload, recorded_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    event.event_id().as_str(),
                    event.run_id().as_str(),
                    event_type_json,
                    payload_json,
                    recorded_at,
                ],
            )
            .map_err(StoreError::Query)?;
        Ok(())
    }

    /// All events recorded for `run_id`, sorted by `recorded_at` then
    /// insertion order (§3, §6: "a run's events MUST be queryable by
    /// `run_id` sorted by `recorded_at`").
    ///
    /// # Errors
    /// Returns [`StoreError::Query`] if the query fails, or
    /// [`StoreError::Payload`]/[`StoreError::Corrupt`] if a stored row
    /// cannot be decoded back into a [`RolloutEvent`].
    pub fn events_for_run(&self, run_id: &RunId) -> Result<Vec<RolloutEvent>, StoreError> {
        let guard = self
            .connection
            .lock()
            .map_err(|_| StoreError::Corrupt("event store mutex poisoned".to_owned()))?;
        let mut statement = guard
            .prepare(
                "SELECT event_id, run_id, event_type, payload, recorded_at FROM rollout_events \
                 WHERE run_id = ?1 ORDER BY recorded_at ASC, id ASC",
            )
            .map_err(StoreError::Query)?;
        let rows = statement
            .query_map(params![run_id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(StoreError::Query)?;

        let mut events = Vec::new();
        for row in rows {
            let (event_id, run_id, event_type_json, payload_json, recorded_at) = row.map_err(StoreError::Query)?;
            events.push(decode_event(event_id, run_id, &event_type_json, &payload_json, &recorded_at)?);
        }
        Ok(events)
    }

    /// The most recently recorded event for `run_id`, if any. Used to
    /// resume inspection of a run after a crash (§4.6).
    ///
    /// # Errors
    /// Same as [`EventStore::events_for_run`].
    pub fn last_event_for_run(&self, run_id: &RunId) -> Result<Option<RolloutEvent>, StoreError> {
        let guard = self
            .connection
            .lock()
            .map_err(|_| StoreError::Corrupt("event store mutex poisoned".to_owned()))?;
        let row = guard
            .query_row(
                "SELECT event_id, run_id, event_type, payload, recorded_at FROM rollout_events \
                 WHERE run_id = ?1 ORDER BY recorded_at DESC, id DESC LIMIT 1",
                params![run_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(StoreError::Query)?;

        row.map(|(event_id, run_id, event_type_json, payload_json, recorded_at)| {
            decode_event(event_id, run_id, &event_type_json, &payload_json, &recorded_at)
        })
        .transpose()
    }
}

fn decode_event(
    event_id: String,
    run_id: String,
    event_type_json: &str,
    payload_json: &str,
    recorded_at: &str,
) -> Result<RolloutEvent, StoreError> {
    let event_type: RolloutEventType = serde_json::from_str(event_type_json).map_err(StoreError::Payload)?;
    let payload = serde_json::from_str(payload_json).map_err(StoreError::Payload)?;
    let instant = OffsetDateTime::parse(recorded_at, &Rfc3339)
        .map_err(|err| StoreError::Corrupt(format!("bad recorded_at {recorded_at:?}: {err}")))?;
    Ok(RolloutEvent::new(
        EventId::new(event_id),
        RunId::new(run_id),
        event_type,
        payload,
        Timestamp::new(instant),
    ))
}

fn migrate(connection: &Connection) -> Result<(), StoreError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_meta (version INTEGER NOT NULL);
             CREATE TABLE IF NOT EXISTS rollout_events (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 event_id TEXT NOT NULL UNIQUE,
                 run_id TEXT NOT NULL,
                 event_type TEXT NOT NULL,
                 payload TEXT NOT NULL,
                 recorded_at TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_rollout_events_run_id
                 ON rollout_events (run_id, recorded_at);",
        )
        .map_err(StoreError::Query)?;

    let current: Option<i64> = connection
        .query_row("SELECT version FROM schema_meta LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(StoreError::Query)?;
    if current.is_none() {
        connection
            .execute("INSERT INTO schema_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
            .map_err(StoreError::Query)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use otto_bgp_core::EventId;

    use super::*;

    fn event(run: &str, id: &str, kind: RolloutEventType, at: Timestamp) -> RolloutEvent {
        RolloutEvent::new(EventId::new(id), RunId::new(run), kind, serde_json::json!({}), at)
    }

    #[test]
    fn events_for_run_are_sorted_by_recorded_at() {
        let store = EventStore::open_in_memory().unwrap();
        let t0 = Timestamp::now();
        let t1 = Timestamp::new(t0.as_offset_date_time() + time::Duration::seconds(5));
        store.append(&event("run-1", "e2", RolloutEventType::RunStarted, t1)).unwrap();
        store.append(&event("run-1", "e1", RolloutEventType::RunPlanned, t0)).unwrap();

        let events = store.events_for_run(&RunId::new("run-1")).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_id().as_str(), "e1");
        assert_eq!(events[1].event_id().as_str(), "e2");
    }

    #[test]
    fn last_event_for_run_returns_the_most_recent() {
        let store = EventStore::open_in_memory().unwrap();
        let t0 = Timestamp::now();
        let t1 = Timestamp::new(t0.as_offset_date_time() + time::Duration::seconds(5));
        store.append(&event("run-1", "e1", RolloutEventType::RunPlanned, t0)).unwrap();
        store.append(&event("run-1", "e2", RolloutEventType::RunStarted, t1)).unwrap();

        let last = store.last_event_for_run(&RunId::new("run-1")).unwrap().unwrap();
        assert_eq!(last.event_id().as_str(), "e2");
    }

    #[test]
    fn events_are_isolated_per_run() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .append(&event("run-1", "e1", RolloutEventType::RunPlanned, Timestamp::now()))
            .unwrap();
        store
            .append(&event("run-2", "e2", RolloutEventType::RunPlanned, Timestamp::now()))
            .unwrap();
        assert_eq!(store.events_for_run(&RunId::new("run-1")).unwrap().len(), 1);
        assert_eq!(store.events_for_run(&RunId::new("run-2")).unwrap().len(), 1);
    }
}
