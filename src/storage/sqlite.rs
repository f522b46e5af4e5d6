//! SQLite-backed insight source

use super::records::{
    as_text, AnswerRecord, KeyInsightRecord, PhaseNotesRecord, SessionRecords, StructuredInsightRecord,
    WorkshopRecords,
};
use super::traits::{InsightSource, OpenSource, StorageError, StorageResult, WorkshopSummary};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const STATUS_COMPLETED: &str = "completed";

/// Fold notes that repeat a phase into one record per phase. Buckets present
/// in both are concatenated, so no entry is lost to the one-row-per-phase
/// table.
fn merge_phase_notes(session_id: &str, notes: &[PhaseNotesRecord]) -> Vec<PhaseNotesRecord> {
    let mut merged: BTreeMap<&str, PhaseNotesRecord> = BTreeMap::new();
    for record in notes {
        match merged.get_mut(record.phase.as_str()) {
            None => {
                merged.insert(record.phase.as_str(), record.clone());
            }
            Some(existing) => {
                tracing::debug!(session = session_id, phase = %record.phase, "merging repeated phase notes");
                for (bucket, entries) in &record.buckets {
                    let slot = existing.buckets.entry(bucket.clone()).or_insert(Value::Null);
                    let mut combined = into_entries(std::mem::take(slot));
                    combined.extend(into_entries(entries.clone()));
                    *slot = Value::Array(combined);
                }
            }
        }
    }
    merged.into_values().collect()
}

fn into_entries(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    }
}

/// Workshop sessions and their raw records in one SQLite file.
///
/// Loosely typed records (insights, key insights, phase notes) are stored
/// as JSON payloads, ordered by their position in the session. Thread-safe
/// via an internal mutex on the connection.
pub struct SqliteSource {
    conn: Mutex<Connection>,
}

impl SqliteSource {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                workshop_id TEXT NOT NULL,
                run_type TEXT NOT NULL,
                participant_name TEXT,
                status TEXT NOT NULL DEFAULT 'completed',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_workshop
                ON sessions(workshop_id, run_type, status);

            CREATE TABLE IF NOT EXISTS insights (
                session_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                payload_json TEXT NOT NULL,
                PRIMARY KEY (session_id, position),
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS key_insights (
                session_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                payload_json TEXT NOT NULL,
                PRIMARY KEY (session_id, position),
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS phase_notes (
                session_id TEXT NOT NULL,
                phase TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                PRIMARY KEY (session_id, phase),
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS answers (
                session_id TEXT NOT NULL,
                key TEXT NOT NULL,
                text TEXT,
                PRIMARY KEY (session_id, key),
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
            );

            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Replace every session in the bundle with the bundle's contents.
    ///
    /// Sessions are imported as completed. Sessions of the same workshop
    /// that are not in the bundle are left alone. Returns the number of
    /// sessions written.
    pub fn import_workshop(&self, workshop: &WorkshopRecords) -> StorageResult<usize> {
        if workshop.workshop_id.trim().is_empty() {
            return Err(StorageError::InvalidData("workshopId is empty".to_string()));
        }
        if let Some(blank) = workshop.sessions.iter().find(|s| s.session_id.trim().is_empty()) {
            return Err(StorageError::InvalidData(format!(
                "session without id (participant {:?})",
                blank.participant()
            )));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().to_rfc3339();

        for session in &workshop.sessions {
            tx.execute("DELETE FROM sessions WHERE id = ?1", params![session.session_id])?;
            tx.execute(
                r#"
                INSERT INTO sessions (id, workshop_id, run_type, participant_name, status, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    session.session_id,
                    workshop.workshop_id,
                    workshop.run_type,
                    session.participant(),
                    STATUS_COMPLETED,
                    now,
                ],
            )?;

            for (position, insight) in session.structured_insights.iter().enumerate() {
                tx.execute(
                    "INSERT INTO insights (session_id, position, payload_json) VALUES (?1, ?2, ?3)",
                    params![session.session_id, position as i64, serde_json::to_string(insight)?],
                )?;
            }
            for (position, insight) in session.key_insights.iter().enumerate() {
                tx.execute(
                    "INSERT INTO key_insights (session_id, position, payload_json) VALUES (?1, ?2, ?3)",
                    params![session.session_id, position as i64, serde_json::to_string(insight)?],
                )?;
            }
            for notes in merge_phase_notes(&session.session_id, &session.phase_notes) {
                tx.execute(
                    "INSERT INTO phase_notes (session_id, phase, payload_json) VALUES (?1, ?2, ?3)",
                    params![session.session_id, notes.phase, serde_json::to_string(&notes)?],
                )?;
            }
            for answer in &session.answers {
                tx.execute(
                    r#"
                    INSERT INTO answers (session_id, key, text) VALUES (?1, ?2, ?3)
                    ON CONFLICT(session_id, key) DO UPDATE SET text = excluded.text
                    "#,
                    params![session.session_id, answer.key, as_text(answer.text.as_ref())],
                )?;
            }
        }

        tx.commit()?;
        tracing::info!(
            workshop = %workshop.workshop_id,
            run_type = %workshop.run_type,
            sessions = workshop.sessions.len(),
            "imported workshop"
        );
        Ok(workshop.sessions.len())
    }

    /// Import a JSON bundle (`WorkshopRecords` shape).
    pub fn import_json(&self, json: &str) -> StorageResult<usize> {
        let workshop: WorkshopRecords = serde_json::from_str(json)?;
        self.import_workshop(&workshop)
    }

    /// Change a session's status. Only completed sessions are loaded.
    pub fn set_session_status(&self, session_id: &str, status: &str) -> StorageResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE sessions SET status = ?2 WHERE id = ?1",
            params![session_id, status],
        )?;
        Ok(changed > 0)
    }

    /// Stored payloads in order. A payload that no longer parses is logged
    /// and skipped; only database errors fail the load.
    fn load_payloads<T: DeserializeOwned>(
        conn: &Connection,
        sql: &str,
        session_id: &str,
    ) -> StorageResult<Vec<T>> {
        let mut stmt = conn.prepare(sql)?;
        let payloads = stmt
            .query_map(params![session_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(payloads
            .iter()
            .filter_map(|p| match serde_json::from_str(p) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::debug!(session = session_id, error = %e, "skipped malformed stored record");
                    None
                }
            })
            .collect())
    }

    fn load_session(
        conn: &Connection,
        session_id: String,
        participant_name: Option<String>,
    ) -> StorageResult<SessionRecords> {
        let structured_insights: Vec<StructuredInsightRecord> = Self::load_payloads(
            conn,
            "SELECT payload_json FROM insights WHERE session_id = ?1 ORDER BY position",
            &session_id,
        )?;
        let key_insights: Vec<KeyInsightRecord> = Self::load_payloads(
            conn,
            "SELECT payload_json FROM key_insights WHERE session_id = ?1 ORDER BY position",
            &session_id,
        )?;
        let phase_notes: Vec<PhaseNotesRecord> = Self::load_payloads(
            conn,
            "SELECT payload_json FROM phase_notes WHERE session_id = ?1 ORDER BY phase",
            &session_id,
        )?;

        let mut stmt = conn.prepare("SELECT key, text FROM answers WHERE session_id = ?1 ORDER BY key")?;
        let answers = stmt
            .query_map(params![session_id], |row| {
                Ok(AnswerRecord {
                    key: row.get(0)?,
                    text: row.get::<_, Option<String>>(1)?.map(Value::String),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SessionRecords {
            session_id,
            participant_name: participant_name.map(Value::String),
            structured_insights,
            key_insights,
            phase_notes,
            answers,
        })
    }
}

impl OpenSource for SqliteSource {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

impl InsightSource for SqliteSource {
    fn load_workshop(&self, workshop_id: &str, run_type: &str) -> StorageResult<WorkshopRecords> {
        let conn = self.lock()?;

        let known: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM sessions WHERE workshop_id = ?1 AND run_type = ?2 LIMIT 1",
                params![workshop_id, run_type],
                |row| row.get(0),
            )
            .optional()?;
        if known.is_none() {
            return Err(StorageError::WorkshopNotFound {
                workshop_id: workshop_id.to_string(),
                run_type: run_type.to_string(),
            });
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT id, participant_name FROM sessions
            WHERE workshop_id = ?1 AND run_type = ?2 AND status = ?3
            ORDER BY id
            "#,
        )?;
        let rows = stmt
            .query_map(params![workshop_id, run_type, STATUS_COMPLETED], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let sessions = rows
            .into_iter()
            .map(|(id, name)| Self::load_session(&conn, id, name))
            .collect::<StorageResult<Vec<_>>>()?;

        tracing::debug!(workshop = workshop_id, run_type, sessions = sessions.len(), "loaded workshop");
        Ok(WorkshopRecords {
            workshop_id: workshop_id.to_string(),
            run_type: run_type.to_string(),
            sessions,
        })
    }

    fn list_workshops(&self) -> StorageResult<Vec<WorkshopSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT workshop_id, run_type, COUNT(*) FROM sessions
            WHERE status = ?1
            GROUP BY workshop_id, run_type
            ORDER BY workshop_id, run_type
            "#,
        )?;
        let summaries = stmt
            .query_map(params![STATUS_COMPLETED], |row| {
                Ok(WorkshopSummary {
                    workshop_id: row.get(0)?,
                    run_type: row.get(1)?,
                    session_count: row.get::<_, i64>(2)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }
}
