//! SQLite-backed `StoreAdapter`.
//!
//! Grounded on `shared_knowledge/database.rs`'s `Arc<Mutex<Connection>>` +
//! schema-on-open idiom: the connection is opened once, wrapped in a mutex
//! for interior mutability across async callers, and the schema is created
//! idempotently with `CREATE TABLE IF NOT EXISTS` on construction. Blocking
//! rusqlite calls run on `spawn_blocking` so they never stall the async
//! runtime.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tokio::sync::Mutex;
use tokio::task::spawn_blocking;

use super::StoreAdapter;
use crate::error::{Error, Result};
use crate::model::{Author, Itinerary, Revision, Task, TaskStatus, TripMetadata};

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS itineraries (
                id TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                body TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS revisions (
                itinerary_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (itinerary_id, version)
            );
            CREATE TABLE IF NOT EXISTS trip_metadata (
                itinerary_id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                body TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                itinerary_id TEXT NOT NULL,
                status TEXT NOT NULL,
                next_attempt_at TEXT,
                updated_at TEXT NOT NULL,
                idempotency_key TEXT,
                body TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_idempotency_key ON tasks (idempotency_key);",
        )?;
        Ok(())
    }
}

#[async_trait]
impl StoreAdapter for SqliteStore {
    async fn get_itinerary(&self, id: &str) -> Result<Option<Itinerary>> {
        let conn = self.conn.clone();
        let id = id.to_string();
        spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare("SELECT body FROM itineraries WHERE id = ?1")?;
            let mut rows = stmt.query(params![id])?;
            if let Some(row) = rows.next()? {
                let body: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&body)?))
            } else {
                Ok(None)
            }
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    }

    async fn put_itinerary(&self, itinerary: &Itinerary, expected_version: Option<u64>) -> Result<u64> {
        let conn = self.conn.clone();
        let itinerary_for_write = itinerary.clone();
        let is_create = spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let itinerary = itinerary_for_write;
            let current: Option<u64> = conn
                .query_row(
                    "SELECT version FROM itineraries WHERE id = ?1",
                    params![itinerary.id],
                    |row| row.get(0),
                )
                .ok();
            let is_create = match (current, expected_version) {
                (None, None) => true,
                (None, Some(_)) => return Err(Error::NotFound(itinerary.id.clone())),
                (Some(found), Some(expected)) if found == expected => false,
                (Some(found), expected) => {
                    return Err(Error::VersionConflict {
                        itinerary_id: itinerary.id.clone(),
                        expected: expected.unwrap_or(found),
                        found,
                    })
                }
            };
            let body = serde_json::to_string(&itinerary)?;
            conn.execute(
                "INSERT INTO itineraries (id, version, body) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET version = excluded.version, body = excluded.body",
                params![itinerary.id, itinerary.version as i64, body],
            )?;
            Ok(is_create)
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))??;

        if is_create {
            // Seeds version 1 so `undo()`'s `current_version - 1` lookup resolves
            // right after creation, without waiting for a first `apply`.
            self.put_revision(Revision::of(itinerary.clone(), Author::User, itinerary.updated_at), 1)
                .await?;
        }

        Ok(itinerary.version)
    }

    async fn put_revision(&self, revision: Revision, retain: usize) -> Result<()> {
        let conn = self.conn.clone();
        spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let body = serde_json::to_string(&revision)?;
            conn.execute(
                "INSERT OR REPLACE INTO revisions (itinerary_id, version, body) VALUES (?1, ?2, ?3)",
                params![revision.itinerary_id, revision.version as i64, body],
            )?;
            let mut stmt = conn.prepare(
                "SELECT version FROM revisions WHERE itinerary_id = ?1 ORDER BY version DESC",
            )?;
            let versions: Vec<i64> = stmt
                .query_map(params![revision.itinerary_id], |row| row.get(0))?
                .collect::<std::result::Result<_, _>>()?;
            for stale in versions.into_iter().skip(retain) {
                conn.execute(
                    "DELETE FROM revisions WHERE itinerary_id = ?1 AND version = ?2",
                    params![revision.itinerary_id, stale],
                )?;
            }
            Ok(())
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    }

    async fn list_revisions(&self, itinerary_id: &str) -> Result<Vec<Revision>> {
        let conn = self.conn.clone();
        let itinerary_id = itinerary_id.to_string();
        spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT body FROM revisions WHERE itinerary_id = ?1 ORDER BY version ASC",
            )?;
            let rows = stmt.query_map(params![itinerary_id], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(serde_json::from_str(&row?)?);
            }
            Ok(out)
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    }

    async fn get_revision(&self, itinerary_id: &str, version: u64) -> Result<Option<Revision>> {
        let conn = self.conn.clone();
        let itinerary_id = itinerary_id.to_string();
        spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT body FROM revisions WHERE itinerary_id = ?1 AND version = ?2",
            )?;
            let mut rows = stmt.query(params![itinerary_id, version as i64])?;
            if let Some(row) = rows.next()? {
                let body: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&body)?))
            } else {
                Ok(None)
            }
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    }

    async fn put_trip_metadata(&self, metadata: TripMetadata) -> Result<()> {
        let conn = self.conn.clone();
        spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let body = serde_json::to_string(&metadata)?;
            conn.execute(
                "INSERT INTO trip_metadata (itinerary_id, owner, body) VALUES (?1, ?2, ?3)
                 ON CONFLICT(itinerary_id) DO UPDATE SET owner = excluded.owner, body = excluded.body",
                params![metadata.itinerary_id, metadata.owner, body],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    }

    async fn list_trip_metadata(&self, owner: &str) -> Result<Vec<TripMetadata>> {
        let conn = self.conn.clone();
        let owner = owner.to_string();
        spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare("SELECT body FROM trip_metadata WHERE owner = ?1")?;
            let rows = stmt.query_map(params![owner], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(serde_json::from_str(&row?)?);
            }
            Ok(out)
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    }

    async fn update_trip_status(&self, itinerary_id: &str, status: &str) -> Result<()> {
        let conn = self.conn.clone();
        let itinerary_id = itinerary_id.to_string();
        let status = status.to_string();
        spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM trip_metadata WHERE itinerary_id = ?1",
                    params![itinerary_id],
                    |row| row.get(0),
                )
                .ok();
            let body = body.ok_or_else(|| Error::NotFound(itinerary_id.clone()))?;
            let mut metadata: TripMetadata = serde_json::from_str(&body)?;
            metadata.status = status;
            let body = serde_json::to_string(&metadata)?;
            conn.execute(
                "UPDATE trip_metadata SET body = ?1 WHERE itinerary_id = ?2",
                params![body, itinerary_id],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    }

    async fn create_task(&self, task: Task) -> Result<()> {
        self.upsert_task(task).await
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let conn = self.conn.clone();
        let id = id.to_string();
        spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare("SELECT body FROM tasks WHERE id = ?1")?;
            let mut rows = stmt.query(params![id])?;
            if let Some(row) = rows.next()? {
                let body: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&body)?))
            } else {
                Ok(None)
            }
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    }

    async fn update_task(&self, task: Task) -> Result<()> {
        self.upsert_task(task).await
    }

    async fn list_due_tasks(&self, now: DateTime<Utc>, stale_before: DateTime<Utc>) -> Result<Vec<Task>> {
        let conn = self.conn.clone();
        spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT body FROM tasks WHERE
                    (status = 'pending' AND (next_attempt_at IS NULL OR next_attempt_at <= ?1))
                    OR (status = 'running' AND updated_at < ?2)",
            )?;
            let rows = stmt.query_map(
                params![now.to_rfc3339(), stale_before.to_rfc3339()],
                |row| row.get::<_, String>(0),
            )?;
            let mut out = Vec::new();
            for row in rows {
                out.push(serde_json::from_str(&row?)?);
            }
            Ok(out)
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    }

    async fn list_running_tasks_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<Task>> {
        let conn = self.conn.clone();
        spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT body FROM tasks WHERE status = 'running' AND updated_at < ?1",
            )?;
            let rows = stmt.query_map(params![cutoff.to_rfc3339()], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(serde_json::from_str(&row?)?);
            }
            Ok(out)
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    }

    async fn find_task_by_idempotency_key(&self, key: &str) -> Result<Option<Task>> {
        let conn = self.conn.clone();
        let key = key.to_string();
        spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare("SELECT body FROM tasks WHERE idempotency_key = ?1")?;
            let mut rows = stmt.query(params![key])?;
            if let Some(row) = rows.next()? {
                let body: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&body)?))
            } else {
                Ok(None)
            }
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    }

    async fn list_tasks_by_status(&self, itinerary_id: &str, status: TaskStatus) -> Result<Vec<Task>> {
        let conn = self.conn.clone();
        let itinerary_id = itinerary_id.to_string();
        let status_str = serde_json::to_value(status)?
            .as_str()
            .unwrap_or_default()
            .to_string();
        spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT body FROM tasks WHERE itinerary_id = ?1 AND status = ?2",
            )?;
            let rows = stmt.query_map(params![itinerary_id, status_str], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(serde_json::from_str(&row?)?);
            }
            Ok(out)
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    }
}

impl SqliteStore {
    async fn upsert_task(&self, task: Task) -> Result<()> {
        let conn = self.conn.clone();
        spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let status_str = serde_json::to_value(task.status)?
                .as_str()
                .unwrap_or_default()
                .to_string();
            let body = serde_json::to_string(&task)?;
            conn.execute(
                "INSERT INTO tasks (id, itinerary_id, status, next_attempt_at, updated_at, idempotency_key, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    status = excluded.status,
                    next_attempt_at = excluded.next_attempt_at,
                    updated_at = excluded.updated_at,
                    idempotency_key = excluded.idempotency_key,
                    body = excluded.body",
                params![
                    task.id,
                    task.itinerary_id,
                    status_str,
                    task.next_attempt_at.map(|t| t.to_rfc3339()),
                    task.updated_at.to_rfc3339(),
                    task.idempotency_key,
                    body
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Author;
    use chrono::Utc;

    #[tokio::test]
    async fn put_and_get_itinerary_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let it = Itinerary::new("it_1", "user_1", "USD", Utc::now());
        store.put_itinerary(&it, None).await.unwrap();
        let fetched = store.get_itinerary("it_1").await.unwrap().unwrap();
        assert_eq!(fetched.id, "it_1");
    }

    #[tokio::test]
    async fn put_itinerary_enforces_cas() {
        let store = SqliteStore::open_in_memory().unwrap();
        let it = Itinerary::new("it_1", "user_1", "USD", Utc::now());
        store.put_itinerary(&it, None).await.unwrap();
        let err = store.put_itinerary(&it, Some(99)).await.unwrap_err();
        assert!(matches!(err, Error::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn creating_an_itinerary_seeds_a_version_one_revision() {
        let store = SqliteStore::open_in_memory().unwrap();
        let it = Itinerary::new("it_1", "user_1", "USD", Utc::now());
        store.put_itinerary(&it, None).await.unwrap();

        let seeded = store.get_revision("it_1", 1).await.unwrap().unwrap();
        assert_eq!(seeded.version, 1);
        assert_eq!(seeded.author, Author::User);
    }

    #[tokio::test]
    async fn revision_retention_prunes_oldest() {
        let store = SqliteStore::open_in_memory().unwrap();
        for v in 1..=4u64 {
            let mut it = Itinerary::new("it_1", "user_1", "USD", Utc::now());
            it.version = v;
            store
                .put_revision(Revision::of(it, Author::Agent, Utc::now()), 2)
                .await
                .unwrap();
        }
        let revisions = store.list_revisions("it_1").await.unwrap();
        assert_eq!(revisions.len(), 2);
        assert_eq!(revisions[0].version, 3);
    }

    #[tokio::test]
    async fn find_task_by_idempotency_key_returns_the_matching_task() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut task = crate::model::Task::new("t1", "generate", "it_1", "user_1", serde_json::Value::Null, 3, Utc::now());
        task.idempotency_key = Some("client-key-1".to_string());
        store.create_task(task).await.unwrap();

        let found = store.find_task_by_idempotency_key("client-key-1").await.unwrap();
        assert_eq!(found.unwrap().id, "t1");
        assert!(store.find_task_by_idempotency_key("nope").await.unwrap().is_none());
    }
}
