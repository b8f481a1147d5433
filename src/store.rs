//! Read-only access to the Apple Notes Core Data store.
//!
//! The store is a WAL-journaled SQLite file, normally at
//! `~/Library/Group Containers/group.com.apple.notes/NoteStore.sqlite`.
//! Notes live in the `ZICCLOUDSYNCINGOBJECT` table (one row per synced
//! object; folders are rows in the same table, reached through a
//! self-join on `ZFOLDER`), and bodies live in `ZICNOTEDATA`:
//!
//! ```sql
//! ZICCLOUDSYNCINGOBJECT (
//!     Z_PK INTEGER PRIMARY KEY,
//!     ZTITLE1 TEXT,               -- note title (ZTITLE2 on folder rows)
//!     ZSNIPPET TEXT,              -- plain-text preview
//!     ZCREATIONDATE1 REAL,        -- seconds since 2001-01-01 UTC
//!     ZMODIFICATIONDATE1 REAL,
//!     ZFOLDER INTEGER,            -- FK to the folder's Z_PK
//!     ZNOTEDATA INTEGER,          -- FK to ZICNOTEDATA.Z_PK
//!     ZMARKEDFORDELETION INTEGER
//! )
//! ZICNOTEDATA (
//!     Z_PK INTEGER PRIMARY KEY,
//!     ZDATA BLOB,                 -- gzip-framed protobuf body
//!     ZCRYPTOINITIALIZATIONVECTOR BLOB,  -- present on locked notes
//!     ZCRYPTOTAG BLOB
//! )
//! ```
//!
//! Timestamps use the Core Data epoch (2001-01-01T00:00:00Z) and are
//! converted to Unix time on the way out. The database is never written.

use crate::error::StoreError;
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, warn};
use rusqlite::{Connection, OpenFlags, backup::Backup, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Seconds between the Unix epoch and the Core Data epoch.
pub const CORE_DATA_EPOCH_OFFSET: i64 = 978_307_200;

/// Default number of notes fetched when the caller does not say otherwise.
pub const DEFAULT_NOTE_LIMIT: usize = 50;

/// One note row as read from the store, body still undecoded.
///
/// Only rows with a non-empty title and a zero deletion flag are yielded.
#[derive(Debug, Clone)]
pub struct RawNote {
    pub note_id: i64,
    pub title: String,
    pub snippet: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub folder_name: Option<String>,
    /// Raw `ZDATA` bytes; `None` when the column is NULL or empty.
    pub body_blob: Option<Vec<u8>>,
    pub crypto_iv: Option<Vec<u8>>,
    pub crypto_tag: Option<Vec<u8>>,
}

impl RawNote {
    /// Locked notes carry an AES-GCM IV and tag alongside the ciphertext.
    /// We never attempt decryption; this only drives the fallback path.
    pub fn is_password_protected(&self) -> bool {
        self.crypto_iv.is_some() || self.crypto_tag.is_some()
    }
}

/// An open, read-only connection to a note store.
#[derive(Debug)]
pub struct StoreHandle {
    conn: Connection,
    path: PathBuf,
}

/// Open the store at `path` read-only and verify the expected schema.
pub fn open_store(path: &Path) -> Result<StoreHandle, StoreError> {
    if !path.exists() {
        return Err(StoreError::SourceUnavailable {
            path: path.to_path_buf(),
        });
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|source| StoreError::SourceUnreadable { source })?;

    verify_schema(&conn)?;

    Ok(StoreHandle {
        conn,
        path: path.to_path_buf(),
    })
}

const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    (
        "ZICCLOUDSYNCINGOBJECT",
        &[
            "Z_PK",
            "ZTITLE1",
            "ZSNIPPET",
            "ZFOLDER",
            "ZNOTEDATA",
            "ZMARKEDFORDELETION",
        ],
    ),
    ("ZICNOTEDATA", &["Z_PK", "ZDATA"]),
];

fn verify_schema(conn: &Connection) -> Result<(), StoreError> {
    for (table, columns) in REQUIRED_COLUMNS {
        for column in *columns {
            if !has_column(conn, table, column) {
                return Err(StoreError::SchemaMismatch {
                    missing: format!("{table}.{column}"),
                });
            }
        }
    }
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
    .unwrap_or(false)
}

const PRIMARY_QUERY: &str = "
    SELECT n.Z_PK, n.ZTITLE1, n.ZSNIPPET,
           n.ZCREATIONDATE1, n.ZMODIFICATIONDATE1,
           f.ZTITLE2,
           d.ZDATA, d.ZCRYPTOINITIALIZATIONVECTOR, d.ZCRYPTOTAG
    FROM ZICCLOUDSYNCINGOBJECT n
    LEFT JOIN ZICCLOUDSYNCINGOBJECT f ON n.ZFOLDER = f.Z_PK
    LEFT JOIN ZICNOTEDATA d ON n.ZNOTEDATA = d.Z_PK
    WHERE n.ZTITLE1 IS NOT NULL AND n.ZTITLE1 != ''
      AND n.ZMARKEDFORDELETION = 0
    ORDER BY n.ZMODIFICATIONDATE1 DESC
    LIMIT ?1";

impl StoreHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fetch up to `limit` note rows, newest modification first.
    ///
    /// If the full join errors (older schema revisions rename the
    /// timestamp columns), falls back once to a title/snippet-only query
    /// so the export can still produce something.
    pub fn list_notes(&self, limit: usize) -> Result<Vec<RawNote>, StoreError> {
        match self.query_full(limit) {
            Ok(notes) => Ok(notes),
            Err(e) => {
                warn!("primary note query failed ({e}), trying simple fallback");
                self.query_simple(limit)
                    .map_err(|source| StoreError::QueryFailed { source })
            }
        }
    }

    /// Ids of exportable notes, newest first. Used by the parallel
    /// driver to fan rows out to per-worker connections.
    pub fn note_ids(&self, limit: usize) -> Result<Vec<i64>, StoreError> {
        let order = self.modification_column();
        let sql = format!(
            "SELECT Z_PK FROM ZICCLOUDSYNCINGOBJECT
             WHERE ZTITLE1 IS NOT NULL AND ZTITLE1 != ''
               AND ZMARKEDFORDELETION = 0
             ORDER BY {order} DESC LIMIT ?1"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|source| StoreError::QueryFailed { source })?;
        let ids = stmt
            .query_map(params![limit as i64], |row| row.get(0))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<i64>>>())
            .map_err(|source| StoreError::QueryFailed { source })?;
        Ok(ids)
    }

    /// Fetch a single note row by primary key.
    pub fn fetch_note(&self, note_id: i64) -> Result<Option<RawNote>, StoreError> {
        let sql = PRIMARY_QUERY.replace(
            "WHERE n.ZTITLE1",
            "WHERE n.Z_PK = ?2 AND n.ZTITLE1",
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|source| StoreError::QueryFailed { source })?;
        let mut rows = stmt
            .query_map(params![1i64, note_id], row_to_note)
            .map_err(|source| StoreError::QueryFailed { source })?;
        match rows.next() {
            Some(Ok(note)) => Ok(Some(note)),
            Some(Err(source)) => Err(StoreError::QueryFailed { source }),
            None => Ok(None),
        }
    }

    fn query_full(&self, limit: usize) -> rusqlite::Result<Vec<RawNote>> {
        let mut stmt = self.conn.prepare(PRIMARY_QUERY)?;
        let rows = stmt.query_map(params![limit as i64], row_to_note)?;
        rows.collect()
    }

    /// Bare-minimum fallback: id, title, snippet. Bodies stay empty and
    /// timestamps become the current wall clock.
    fn query_simple(&self, limit: usize) -> rusqlite::Result<Vec<RawNote>> {
        let order = self.modification_column();
        let sql = format!(
            "SELECT Z_PK, ZTITLE1, ZSNIPPET FROM ZICCLOUDSYNCINGOBJECT
             WHERE ZTITLE1 IS NOT NULL AND ZTITLE1 != ''
               AND ZMARKEDFORDELETION = 0
             ORDER BY {order} DESC LIMIT ?1"
        );
        let now = Utc::now();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(RawNote {
                note_id: row.get(0)?,
                title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                snippet: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                created_at: now,
                modified_at: now,
                folder_name: None,
                body_blob: None,
                crypto_iv: None,
                crypto_tag: None,
            })
        })?;
        rows.collect()
    }

    /// Schema revisions disagree on the modification-date column name;
    /// probe for the variant this store actually has.
    fn modification_column(&self) -> &'static str {
        for candidate in ["ZMODIFICATIONDATE1", "ZMODIFICATIONDATE"] {
            if has_column(&self.conn, "ZICCLOUDSYNCINGOBJECT", candidate) {
                return candidate;
            }
        }
        debug!("no modification-date column found, ordering by Z_PK");
        "Z_PK"
    }
}

fn row_to_note(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawNote> {
    let body: Option<Vec<u8>> = row.get(6)?;
    Ok(RawNote {
        note_id: row.get(0)?,
        title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        snippet: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        created_at: core_data_to_utc(row.get::<_, Option<f64>>(3)?),
        modified_at: core_data_to_utc(row.get::<_, Option<f64>>(4)?),
        folder_name: row.get::<_, Option<String>>(5)?.filter(|s| !s.is_empty()),
        body_blob: body.filter(|b| !b.is_empty()),
        crypto_iv: row.get(7)?,
        crypto_tag: row.get(8)?,
    })
}

/// Shift a Core Data timestamp onto the Unix epoch.
pub fn core_data_to_utc(seconds: Option<f64>) -> DateTime<Utc> {
    let secs = seconds.unwrap_or(0.0) as i64 + CORE_DATA_EPOCH_OFFSET;
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

/// Copy the live database to a temporary file with the online backup API.
///
/// The Notes app holds the store open with WAL journaling; reading a
/// point-in-time snapshot sidesteps lock contention entirely.
pub fn snapshot_database(db_path: &Path) -> Result<NamedTempFile, StoreError> {
    if !db_path.exists() {
        return Err(StoreError::SourceUnavailable {
            path: db_path.to_path_buf(),
        });
    }

    let src = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|source| StoreError::SourceUnreadable { source })?;

    let tmp = NamedTempFile::new()?;
    let mut dst = Connection::open(tmp.path())
        .map_err(|source| StoreError::SourceUnreadable { source })?;

    {
        let backup = Backup::new(&src, &mut dst)
            .map_err(|source| StoreError::SourceUnreadable { source })?;
        backup
            .run_to_completion(1000, Duration::from_millis(5), None)
            .map_err(|source| StoreError::SourceUnreadable { source })?;
    }

    drop(src);
    Ok(tmp)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal schema-compatible fixture covering the columns we read.
    pub(crate) fn fixture_store(path: &Path) -> Connection {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE ZICCLOUDSYNCINGOBJECT (
                 Z_PK INTEGER PRIMARY KEY,
                 ZTITLE1 TEXT, ZTITLE2 TEXT, ZSNIPPET TEXT,
                 ZCREATIONDATE1 REAL, ZMODIFICATIONDATE1 REAL,
                 ZFOLDER INTEGER, ZNOTEDATA INTEGER,
                 ZMARKEDFORDELETION INTEGER DEFAULT 0
             );
             CREATE TABLE ZICNOTEDATA (
                 Z_PK INTEGER PRIMARY KEY,
                 ZDATA BLOB,
                 ZCRYPTOINITIALIZATIONVECTOR BLOB,
                 ZCRYPTOTAG BLOB
             );",
        )
        .unwrap();
        conn
    }

    pub(crate) fn insert_note(
        conn: &Connection,
        pk: i64,
        title: &str,
        snippet: &str,
        modified: f64,
        body: Option<&[u8]>,
    ) {
        conn.execute(
            "INSERT INTO ZICNOTEDATA (Z_PK, ZDATA) VALUES (?1, ?2)",
            params![pk, body],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO ZICCLOUDSYNCINGOBJECT
                 (Z_PK, ZTITLE1, ZSNIPPET, ZCREATIONDATE1, ZMODIFICATIONDATE1,
                  ZNOTEDATA, ZMARKEDFORDELETION)
             VALUES (?1, ?2, ?3, ?4, ?5, ?1, 0)",
            params![pk, title, snippet, modified, modified],
        )
        .unwrap();
    }

    #[test]
    fn epoch_conversion_lands_on_unix_time() {
        let dt = core_data_to_utc(Some(0.0));
        assert_eq!(dt.timestamp(), CORE_DATA_EPOCH_OFFSET);

        let dt = core_data_to_utc(Some(700_000_000.0));
        assert_eq!(dt.timestamp(), 700_000_000 + CORE_DATA_EPOCH_OFFSET);
    }

    #[test]
    fn missing_file_is_source_unavailable() {
        let err = open_store(Path::new("/nonexistent/NoteStore.sqlite")).unwrap_err();
        assert!(matches!(err, StoreError::SourceUnavailable { .. }));
    }

    #[test]
    fn schema_mismatch_names_the_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.sqlite");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE unrelated (x INTEGER)")
            .unwrap();

        let err = open_store(&path).unwrap_err();
        match err {
            StoreError::SchemaMismatch { missing } => {
                assert!(missing.contains("ZICCLOUDSYNCINGOBJECT"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn list_filters_deleted_and_untitled_and_orders_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite");
        let conn = fixture_store(&path);
        insert_note(&conn, 1, "Old", "old", 100.0, None);
        insert_note(&conn, 2, "New", "new", 200.0, None);
        insert_note(&conn, 3, "", "untitled", 300.0, None);
        conn.execute(
            "INSERT INTO ZICCLOUDSYNCINGOBJECT
                 (Z_PK, ZTITLE1, ZMODIFICATIONDATE1, ZMARKEDFORDELETION)
             VALUES (4, 'Deleted', 400.0, 1)",
            [],
        )
        .unwrap();
        drop(conn);

        let store = open_store(&path).unwrap();
        let notes = store.list_notes(DEFAULT_NOTE_LIMIT).unwrap();
        let titles: Vec<&str> = notes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["New", "Old"]);
        assert_eq!(
            notes[0].modified_at.timestamp(),
            200 + CORE_DATA_EPOCH_OFFSET
        );
    }

    #[test]
    fn folder_title_comes_from_self_join() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite");
        let conn = fixture_store(&path);
        conn.execute(
            "INSERT INTO ZICCLOUDSYNCINGOBJECT (Z_PK, ZTITLE2, ZMARKEDFORDELETION)
             VALUES (10, 'Recipes', 0)",
            [],
        )
        .unwrap();
        insert_note(&conn, 1, "Soup", "", 50.0, Some(b"blob"));
        conn.execute(
            "UPDATE ZICCLOUDSYNCINGOBJECT SET ZFOLDER = 10 WHERE Z_PK = 1",
            [],
        )
        .unwrap();
        drop(conn);

        let store = open_store(&path).unwrap();
        let notes = store.list_notes(10).unwrap();
        assert_eq!(notes[0].folder_name.as_deref(), Some("Recipes"));
        assert_eq!(notes[0].body_blob.as_deref(), Some(&b"blob"[..]));
    }

    #[test]
    fn fetch_note_by_id_matches_listing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite");
        let conn = fixture_store(&path);
        insert_note(&conn, 7, "Target", "snip", 60.0, None);
        drop(conn);

        let store = open_store(&path).unwrap();
        let note = store.fetch_note(7).unwrap().unwrap();
        assert_eq!(note.title, "Target");
        assert!(store.fetch_note(999).unwrap().is_none());
    }
}
