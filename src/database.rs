use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

// String constants for the kind column (keep in sync with as_str())
const LOG_ENTRY_RAW: &str = "raw";
const LOG_ENTRY_DISC_INFO: &str = "disc_info";

/// What a robot log entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEntryKind {
    /// One line exactly as the ripping tool printed it
    Raw,
    /// JSON snapshot of the decoded disc aggregate
    DiscInfo,
}

impl LogEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogEntryKind::Raw => LOG_ENTRY_RAW,
            LogEntryKind::DiscInfo => LOG_ENTRY_DISC_INFO,
        }
    }

    fn from_column(value: &str) -> Result<Self, sqlx::Error> {
        match value {
            LOG_ENTRY_RAW => Ok(LogEntryKind::Raw),
            LOG_ENTRY_DISC_INFO => Ok(LogEntryKind::DiscInfo),
            other => Err(sqlx::Error::Decode(
                format!("unknown log entry kind {:?}", other).into(),
            )),
        }
    }
}

/// One analysis session. A session may run the ripping tool several times
/// and is linked to the disc it ended up analyzing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbSession {
    pub id: String,
    pub disc_fingerprint_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One invocation of the ripping tool within a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbRobotLog {
    pub id: String,
    pub session_id: String,
    /// Full argument list, stored as a JSON array
    pub args: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbRobotLogEntry {
    /// Insertion order; replay follows it
    pub id: i64,
    pub robot_log_id: String,
    pub kind: LogEntryKind,
    pub entry: String,
    pub created_at: DateTime<Utc>,
}

/// A disc seen at least once, keyed by its fingerprint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbDiscFingerprint {
    pub id: String,
    pub fingerprint: Vec<u8>,
    pub name: String,
    pub volume_name: String,
    pub created_at: DateTime<Utc>,
}

/// A known disc with the most recent log that captured its description
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscSummary {
    pub disc: DbDiscFingerprint,
    pub robot_log_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Initialize database connection and create tables
    pub async fn new(database_path: &str) -> Result<Self, sqlx::Error> {
        // Use sqlite:// with ?mode=rwc to create if it doesn't exist
        let database_url = format!("sqlite://{}?mode=rwc", database_path);
        info!("Connecting to {}", database_url);
        let pool = SqlitePool::connect(&database_url).await?;

        let db = Database { pool };
        db.create_tables().await?;
        Ok(db)
    }

    async fn create_tables(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS disc_fingerprints (
                id TEXT PRIMARY KEY,
                fingerprint BLOB NOT NULL UNIQUE,
                name TEXT NOT NULL,
                volume_name TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                disc_fingerprint_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (disc_fingerprint_id) REFERENCES disc_fingerprints (id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS robot_logs (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                args TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (session_id) REFERENCES sessions (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Replay order is the rowid order
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS robot_log_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                robot_log_id TEXT NOT NULL,
                kind TEXT NOT NULL DEFAULT 'raw',
                entry TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (robot_log_id) REFERENCES robot_logs (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_robot_log_entries_log ON robot_log_entries (robot_log_id, id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn create_session(&self) -> Result<DbSession, sqlx::Error> {
        let session = DbSession::new();
        sqlx::query(
            r#"
            INSERT INTO sessions (id, disc_fingerprint_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.disc_fingerprint_id)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("Created session {}", session.id);
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<DbSession>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(DbSession {
                id: row.get("id"),
                disc_fingerprint_id: row.get("disc_fingerprint_id"),
                created_at: timestamp(&row, "created_at")?,
                updated_at: timestamp(&row, "updated_at")?,
            })
        })
        .transpose()
    }

    /// Link a session to the disc it analyzed
    pub async fn set_session_fingerprint(
        &self,
        session_id: &str,
        disc_fingerprint_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sessions SET disc_fingerprint_id = ?, updated_at = ? WHERE id = ?")
            .bind(disc_fingerprint_id)
            .bind(Utc::now().to_rfc3339())
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_robot_log(
        &self,
        session_id: &str,
        args: &[String],
    ) -> Result<DbRobotLog, sqlx::Error> {
        let log = DbRobotLog {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            args: args.to_vec(),
            created_at: Utc::now(),
        };
        let args_json =
            serde_json::to_string(&log.args).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        sqlx::query(
            r#"
            INSERT INTO robot_logs (id, session_id, args, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&log.id)
        .bind(&log.session_id)
        .bind(args_json)
        .bind(log.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(log)
    }

    pub async fn get_robot_log(&self, robot_log_id: &str) -> Result<Option<DbRobotLog>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM robot_logs WHERE id = ?")
            .bind(robot_log_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(robot_log_from_row).transpose()
    }

    pub async fn get_robot_logs_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<DbRobotLog>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM robot_logs WHERE session_id = ? ORDER BY created_at, rowid")
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(robot_log_from_row).collect()
    }

    pub async fn append_log_entry(
        &self,
        robot_log_id: &str,
        kind: LogEntryKind,
        entry: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO robot_log_entries (robot_log_id, kind, entry, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(robot_log_id)
        .bind(kind.as_str())
        .bind(entry)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Raw lines of a log in the order they were printed
    pub async fn get_log_entries(&self, robot_log_id: &str) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT entry FROM robot_log_entries WHERE robot_log_id = ? AND kind = ? ORDER BY id ASC",
        )
        .bind(robot_log_id)
        .bind(LogEntryKind::Raw.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("entry")).collect())
    }

    /// Every entry of a log, raw lines and snapshots interleaved
    pub async fn get_all_log_entries(
        &self,
        robot_log_id: &str,
    ) -> Result<Vec<DbRobotLogEntry>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM robot_log_entries WHERE robot_log_id = ? ORDER BY id ASC")
            .bind(robot_log_id)
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(DbRobotLogEntry {
                id: row.get("id"),
                robot_log_id: row.get("robot_log_id"),
                kind: LogEntryKind::from_column(&row.get::<String, _>("kind"))?,
                entry: row.get("entry"),
                created_at: timestamp(&row, "created_at")?,
            });
        }
        Ok(entries)
    }

    /// JSON of the last disc snapshot recorded in a log
    pub async fn latest_disc_snapshot(
        &self,
        robot_log_id: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT entry FROM robot_log_entries
            WHERE robot_log_id = ? AND kind = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(robot_log_id)
        .bind(LogEntryKind::DiscInfo.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| row.get("entry")))
    }

    /// Look up a disc by fingerprint, inserting it when unseen.
    ///
    /// The flag is true when this call created the row.
    pub async fn find_or_create_fingerprint(
        &self,
        fingerprint: &[u8],
        name: &str,
        volume_name: &str,
    ) -> Result<(DbDiscFingerprint, bool), sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO disc_fingerprints (id, fingerprint, name, volume_name, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (fingerprint) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(fingerprint)
        .bind(name)
        .bind(volume_name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        let created = result.rows_affected() != 0;

        let row = sqlx::query("SELECT * FROM disc_fingerprints WHERE fingerprint = ?")
            .bind(fingerprint)
            .fetch_one(&self.pool)
            .await?;
        Ok((fingerprint_from_row(&row)?, created))
    }

    /// Every known disc, oldest first, with the latest log that recorded a
    /// snapshot of it
    pub async fn get_all_discs(&self) -> Result<Vec<DiscSummary>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT f.*, (
                SELECT l.id FROM robot_logs l
                JOIN sessions s ON l.session_id = s.id
                WHERE s.disc_fingerprint_id = f.id
                  AND EXISTS (
                    SELECT 1 FROM robot_log_entries e
                    WHERE e.robot_log_id = l.id AND e.kind = ?
                  )
                ORDER BY l.created_at DESC, l.rowid DESC
                LIMIT 1
            ) AS robot_log_id
            FROM disc_fingerprints f
            ORDER BY f.created_at, f.rowid
            "#,
        )
        .bind(LogEntryKind::DiscInfo.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut discs = Vec::with_capacity(rows.len());
        for row in rows {
            discs.push(DiscSummary {
                disc: fingerprint_from_row(&row)?,
                robot_log_id: row.get("robot_log_id"),
            });
        }
        Ok(discs)
    }
}

impl DbSession {
    pub fn new() -> Self {
        let now = Utc::now();
        DbSession {
            id: Uuid::new_v4().to_string(),
            disc_fingerprint_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for DbSession {
    fn default() -> Self {
        Self::new()
    }
}

fn timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    let value: String = row.try_get(column)?;
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn robot_log_from_row(row: &SqliteRow) -> Result<DbRobotLog, sqlx::Error> {
    let args: String = row.try_get("args")?;
    Ok(DbRobotLog {
        id: row.get("id"),
        session_id: row.get("session_id"),
        args: serde_json::from_str(&args).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        created_at: timestamp(row, "created_at")?,
    })
}

fn fingerprint_from_row(row: &SqliteRow) -> Result<DbDiscFingerprint, sqlx::Error> {
    Ok(DbDiscFingerprint {
        id: row.get("id"),
        fingerprint: row.get("fingerprint"),
        name: row.get("name"),
        volume_name: row.get("volume_name"),
        created_at: timestamp(row, "created_at")?,
    })
}
