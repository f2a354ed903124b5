//! SQLite transcript store: one `transcripts` table holding text and audio.
//!
//! Every operation opens its own connection and drops it before returning,
//! so no handle outlives a request. Calls are blocking; async callers run
//! them through `tokio::task::spawn_blocking`.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::debug;

use vocalog_core::types::{AudioFormat, StoredAudio, Transcript};
use vocalog_core::{Result, VocalogError};

#[derive(Debug, Clone)]
pub struct TranscriptStore {
    db_path: PathBuf,
}

impl TranscriptStore {
    /// Open or create the database file and ensure the schema exists.
    pub fn new(db_path: PathBuf) -> Result<Self> {
        let this = Self { db_path };
        this.initialize()?;
        Ok(this)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(storage_err)
    }

    /// Create the table if absent. Idempotent.
    ///
    /// Databases created before the `audio_format` column existed get it added
    /// with a `webm` default, which is what every earlier row holds.
    pub fn initialize(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| VocalogError::Storage(format!("failed to create db dir: {e}")))?;
            }
        }
        let conn = self.open()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS transcripts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT,
                language TEXT,
                audio_blob BLOB,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                audio_format TEXT NOT NULL DEFAULT 'webm'
            );
            "#,
        )
        .map_err(storage_err)?;

        if !has_column(&conn, "transcripts", "audio_format")? {
            debug!("store: adding audio_format column");
            conn.execute(
                "ALTER TABLE transcripts ADD COLUMN audio_format TEXT NOT NULL DEFAULT 'webm'",
                [],
            )
            .map_err(storage_err)?;
        }
        Ok(())
    }

    /// Persist a new transcript and return its id.
    ///
    /// Blank `content` or empty `audio` is rejected before touching the database.
    pub fn insert(
        &self,
        content: &str,
        language: &str,
        audio: &[u8],
        format: AudioFormat,
    ) -> Result<i64> {
        if content.trim().is_empty() || audio.is_empty() {
            return Err(VocalogError::Validation("Missing audio or text".into()));
        }

        let conn = self.open()?;
        conn.execute(
            "INSERT INTO transcripts (content, language, audio_blob, audio_format) VALUES (?1, ?2, ?3, ?4)",
            params![content, language, audio, format.as_str()],
        )
        .map_err(storage_err)?;
        let id = conn.last_insert_rowid();
        debug!("store: inserted transcript {id} ({} audio bytes)", audio.len());
        Ok(id)
    }

    /// Audio blob for `id`. Rows with a NULL or empty blob count as missing.
    pub fn fetch_audio_by_id(&self, id: i64) -> Result<StoredAudio> {
        let conn = self.open()?;
        let row: Option<(Option<Vec<u8>>, String)> = conn
            .query_row(
                "SELECT audio_blob, audio_format FROM transcripts WHERE id = ?1",
                params![id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .map_err(storage_err)?;

        match row {
            Some((Some(bytes), format)) if !bytes.is_empty() => Ok(StoredAudio {
                bytes,
                format: AudioFormat::from_column(&format),
            }),
            _ => Err(VocalogError::NotFound(id)),
        }
    }

    /// Every transcript, newest first.
    pub fn list_all(&self) -> Result<Vec<Transcript>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, content, language, audio_format, timestamp FROM transcripts ORDER BY id DESC",
            )
            .map_err(storage_err)?;
        let rows = stmt
            .query_map([], |r| {
                let format: String = r.get(3)?;
                Ok(Transcript {
                    id: r.get(0)?,
                    content: r.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    language: r.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    audio_format: AudioFormat::from_column(&format),
                    timestamp: r.get::<_, Option<String>>(4)?.unwrap_or_default(),
                })
            })
            .map_err(storage_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_err)?;
        Ok(rows)
    }

    /// Number of stored transcripts.
    pub fn count(&self) -> Result<usize> {
        let conn = self.open()?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM transcripts", [], |r| r.get(0))
            .map_err(storage_err)?;
        Ok(n as usize)
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(storage_err)?;
    let names = stmt
        .query_map([], |r| r.get::<_, String>(1))
        .map_err(storage_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(storage_err)?;
    Ok(names.iter().any(|n| n == column))
}

fn storage_err(e: rusqlite::Error) -> VocalogError {
    VocalogError::Storage(e.to_string())
}
