//! Whisper history repository and its in-memory mirror
//!
//! The durable `history` table keeps every (sender, receiver) pair ever
//! written. The mirror holds only the most recent
//! [`MAX_RECEIVERS_PER_SENDER`] receivers per sender, in insertion order,
//! and is what inline suggestions are built from.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use super::DbPool;
use crate::{Error, Result};

/// Maximum receivers remembered per sender in the in-memory mirror
pub const MAX_RECEIVERS_PER_SENDER: usize = 10;

/// A receiver a sender has previously whispered to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Telegram user ID (or `@username` placeholder) of the receiver
    pub receiver_id: String,
    /// Name shown in inline suggestions
    pub display_name: String,
    /// Receiver's first name
    pub first_name: String,
    /// Cached profile photo reference, if any
    pub profile_photo_url: Option<String>,
}

/// Durable history table operations
#[derive(Debug, Clone)]
pub struct HistoryRepo {
    pool: DbPool,
}

impl HistoryRepo {
    /// Create a new repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Upsert the row keyed by (`sender_id`, `receiver_id`), replacing any
    /// prior values for the pair
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn upsert(&self, sender_id: &str, record: &HistoryRecord) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            r"INSERT INTO history (sender_id, receiver_id, display_name, first_name, profile_photo_url)
              VALUES (?1, ?2, ?3, ?4, ?5)
              ON CONFLICT(sender_id, receiver_id) DO UPDATE SET
                display_name = excluded.display_name,
                first_name = excluded.first_name,
                profile_photo_url = excluded.profile_photo_url",
            rusqlite::params![
                sender_id,
                record.receiver_id,
                record.display_name,
                record.first_name,
                record.profile_photo_url,
            ],
        )?;

        Ok(())
    }

    /// Fetch one (sender, receiver) row
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn get(&self, sender_id: &str, receiver_id: &str) -> Result<Option<HistoryRecord>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let result = conn.query_row(
            "SELECT receiver_id, display_name, first_name, profile_photo_url
             FROM history WHERE sender_id = ?1 AND receiver_id = ?2",
            [sender_id, receiver_id],
            |row| {
                Ok(HistoryRecord {
                    receiver_id: row.get(0)?,
                    display_name: row.get(1)?,
                    first_name: row.get(2)?,
                    profile_photo_url: row.get(3)?,
                })
            },
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read every row in insertion order
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn load_all(&self) -> Result<Vec<(String, HistoryRecord)>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT sender_id, receiver_id, display_name, first_name, profile_photo_url
             FROM history ORDER BY rowid",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    HistoryRecord {
                        receiver_id: row.get(1)?,
                        display_name: row.get(2)?,
                        first_name: row.get(3)?,
                        profile_photo_url: row.get(4)?,
                    },
                ))
            })?
            .flatten()
            .collect();

        Ok(rows)
    }
}

/// History store combining the durable table with a capped in-memory mirror
///
/// The mirror is loaded wholesale at process start and updated incrementally
/// on writes; it never exceeds [`MAX_RECEIVERS_PER_SENDER`] entries per
/// sender (oldest-first eviction by insertion order).
#[derive(Debug)]
pub struct HistoryStore {
    repo: HistoryRepo,
    mirror: Mutex<HashMap<String, Vec<HistoryRecord>>>,
}

impl HistoryStore {
    /// Create a store with an empty mirror
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self {
            repo: HistoryRepo::new(pool),
            mirror: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the mirror with a fresh snapshot of durable storage
    ///
    /// Each sender's sequence is truncated to the most recent
    /// [`MAX_RECEIVERS_PER_SENDER`] rows; the durable table itself is never
    /// pruned.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn load(&self) -> Result<()> {
        let rows = self.repo.load_all()?;

        let mut map: HashMap<String, Vec<HistoryRecord>> = HashMap::new();
        for (sender_id, record) in rows {
            map.entry(sender_id).or_default().push(record);
        }
        for records in map.values_mut() {
            if records.len() > MAX_RECEIVERS_PER_SENDER {
                records.drain(..records.len() - MAX_RECEIVERS_PER_SENDER);
            }
        }

        let senders = map.len();
        *self.lock() = map;
        tracing::info!(senders, "history loaded");
        Ok(())
    }

    /// Upsert the durable row, then record the receiver in the mirror
    ///
    /// A (sender, receiver) pair already present in the mirror keeps its
    /// existing mirror entry; only the durable row is refreshed. A new pair
    /// is appended and the sender's sequence truncated to the cap.
    ///
    /// # Errors
    ///
    /// Returns error if the durable write fails; the mirror is left
    /// untouched in that case.
    pub fn save(&self, sender_id: &str, record: HistoryRecord) -> Result<()> {
        self.repo.upsert(sender_id, &record)?;

        let mut mirror = self.lock();
        let records = mirror.entry(sender_id.to_string()).or_default();

        if records.iter().any(|r| r.receiver_id == record.receiver_id) {
            return Ok(());
        }

        records.push(record);
        if records.len() > MAX_RECEIVERS_PER_SENDER {
            records.drain(..records.len() - MAX_RECEIVERS_PER_SENDER);
        }

        Ok(())
    }

    /// The sender's recent receivers, oldest first
    #[must_use]
    pub fn recent(&self, sender_id: &str) -> Vec<HistoryRecord> {
        self.lock().get(sender_id).cloned().unwrap_or_default()
    }

    /// Direct access to the durable repository
    #[must_use]
    pub const fn repo(&self) -> &HistoryRepo {
        &self.repo
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<HistoryRecord>>> {
        self.mirror.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn record(receiver_id: &str, display_name: &str) -> HistoryRecord {
        HistoryRecord {
            receiver_id: receiver_id.to_string(),
            display_name: display_name.to_string(),
            first_name: display_name.to_string(),
            profile_photo_url: None,
        }
    }

    // -- HistoryRepo ----------------------------------------------------------

    #[test]
    fn upsert_replaces_existing_pair() {
        let pool = db::init_memory().unwrap();
        let repo = HistoryRepo::new(pool);

        repo.upsert("s1", &record("a", "Alice")).unwrap();
        repo.upsert("s1", &record("a", "Alicia")).unwrap();

        let rows = repo.load_all().unwrap();
        assert_eq!(rows.len(), 1, "upsert must not duplicate the pair");

        let fetched = repo.get("s1", "a").unwrap().unwrap();
        assert_eq!(fetched.display_name, "Alicia");
    }

    #[test]
    fn pairs_are_scoped_per_sender() {
        let pool = db::init_memory().unwrap();
        let repo = HistoryRepo::new(pool);

        repo.upsert("s1", &record("a", "Alice")).unwrap();
        repo.upsert("s2", &record("a", "Alice")).unwrap();

        assert_eq!(repo.load_all().unwrap().len(), 2);
    }

    #[test]
    fn load_all_preserves_insertion_order() {
        let pool = db::init_memory().unwrap();
        let repo = HistoryRepo::new(pool);

        repo.upsert("s1", &record("a", "Alice")).unwrap();
        repo.upsert("s1", &record("b", "Bob")).unwrap();
        repo.upsert("s1", &record("c", "Cleo")).unwrap();

        let ids: Vec<String> = repo
            .load_all()
            .unwrap()
            .into_iter()
            .map(|(_, r)| r.receiver_id)
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    // -- HistoryStore ---------------------------------------------------------

    #[test]
    fn save_caps_mirror_at_ten_receivers() {
        let pool = db::init_memory().unwrap();
        let store = HistoryStore::new(pool);

        for id in ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k"] {
            store.save("s1", record(id, id)).unwrap();
        }

        let recent = store.recent("s1");
        assert_eq!(recent.len(), MAX_RECEIVERS_PER_SENDER);
        assert_eq!(recent[0].receiver_id, "b", "oldest receiver evicted first");
        assert_eq!(recent[9].receiver_id, "k");

        // The durable table keeps every row
        assert_eq!(store.repo().load_all().unwrap().len(), 11);
    }

    #[test]
    fn fifteen_inserts_leave_ten_most_recent() {
        let pool = db::init_memory().unwrap();
        let store = HistoryStore::new(pool);

        for i in 0..15 {
            let id = format!("r{i}");
            store.save("s1", record(&id, &id)).unwrap();
        }

        let ids: Vec<String> = store
            .recent("s1")
            .into_iter()
            .map(|r| r.receiver_id)
            .collect();
        let expected: Vec<String> = (5..15).map(|i| format!("r{i}")).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn save_existing_pair_leaves_mirror_untouched() {
        let pool = db::init_memory().unwrap();
        let store = HistoryStore::new(pool);

        store.save("s1", record("a", "Alice")).unwrap();
        store.save("s1", record("a", "Alicia")).unwrap();

        // Mirror keeps the original entry; durable storage has the update
        assert_eq!(store.recent("s1")[0].display_name, "Alice");
        let durable = store.repo().get("s1", "a").unwrap().unwrap();
        assert_eq!(durable.display_name, "Alicia");
    }

    #[test]
    fn load_truncates_mirror_to_cap() {
        let pool = db::init_memory().unwrap();
        let store = HistoryStore::new(pool.clone());

        let repo = HistoryRepo::new(pool);
        for i in 0..12 {
            let id = format!("r{i}");
            repo.upsert("s1", &record(&id, &id)).unwrap();
        }

        store.load().unwrap();

        let recent = store.recent("s1");
        assert_eq!(recent.len(), MAX_RECEIVERS_PER_SENDER);
        assert_eq!(recent[0].receiver_id, "r2");
        assert_eq!(recent[9].receiver_id, "r11");
    }

    #[test]
    fn load_groups_rows_by_sender() {
        let pool = db::init_memory().unwrap();
        let store = HistoryStore::new(pool.clone());

        let repo = HistoryRepo::new(pool);
        repo.upsert("s1", &record("a", "Alice")).unwrap();
        repo.upsert("s2", &record("b", "Bob")).unwrap();
        repo.upsert("s1", &record("c", "Cleo")).unwrap();

        store.load().unwrap();

        assert_eq!(store.recent("s1").len(), 2);
        assert_eq!(store.recent("s2").len(), 1);
    }

    #[test]
    fn recent_unknown_sender_is_empty() {
        let pool = db::init_memory().unwrap();
        let store = HistoryStore::new(pool);
        assert!(store.recent("nobody").is_empty());
    }
}
