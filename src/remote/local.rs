/// Local SQLite + disk backend
///
/// Stands in for the managed backend: find records live in a SQLite
/// database, photos in an on-disk object directory, and the session in a
/// small JSON file. Everything sits under the user's data directory:
/// - Linux: ~/.local/share/rockhound/
/// - macOS: ~/Library/Application Support/rockhound/
/// - Windows: %APPDATA%\rockhound\
///
/// rusqlite::Connection is not Send, so each call opens a fresh
/// connection from the stored db path inside spawn_blocking instead of
/// sharing one connection across tasks.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use uuid::Uuid;

use crate::finds::{Coordinates, Find, NewFind, RockType};
use crate::remote::{FindStore, Identity, ObjectStore, RemoteError, User};

/// The local backend service
pub struct LocalService {
    db_path: PathBuf,
    objects_dir: PathBuf,
    session_path: PathBuf,
    /// Session-changed notifications; holds the current signed-in user
    session: watch::Sender<Option<User>>,
}

impl LocalService {
    /// Open the backend rooted at `data_dir`, creating it if needed
    pub fn new(data_dir: PathBuf) -> Result<Self, RemoteError> {
        let objects_dir = data_dir.join("objects");
        std::fs::create_dir_all(&objects_dir)
            .map_err(|e| RemoteError::Storage(format!("create data directory: {e}")))?;

        let db_path = data_dir.join("rockhound.db");
        let conn = Connection::open(&db_path)
            .map_err(|e| RemoteError::Storage(format!("open database: {e}")))?;
        init_schema(&conn).map_err(|e| RemoteError::Storage(format!("init schema: {e}")))?;

        println!("📁 Database initialized at: {}", db_path.display());

        // Restore the persisted session, if any
        let session_path = data_dir.join("session.json");
        let restored = load_session(&session_path);
        let (session, _) = watch::channel(restored);

        Ok(LocalService {
            db_path,
            objects_dir,
            session_path,
            session,
        })
    }
}

/// Create tables and indexes if they don't exist. Idempotent.
fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS finds (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            rock_type   TEXT NOT NULL
                        CHECK (rock_type IN ('Petoskey','Quartz','Copper','Agate','Other')),
            note        TEXT,
            photo_path  TEXT NOT NULL,
            lat         REAL NOT NULL,
            lng         REAL NOT NULL,
            created_at  TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_finds_created_at
         ON finds(created_at DESC)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id    TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    Ok(())
}

/// Read the persisted session file; any problem counts as signed out
fn load_session(path: &Path) -> Option<User> {
    let json = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&json) {
        Ok(user) => Some(user),
        Err(e) => {
            eprintln!("⚠️  Ignoring unreadable session file: {e}");
            None
        }
    }
}

/// Map one `finds` row to a Find
fn row_to_find(row: &rusqlite::Row) -> rusqlite::Result<Find> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let rock_type: String = row.get(2)?;
    let created_at: String = row.get(7)?;

    Ok(Find {
        id: parse_column(0, Uuid::parse_str(&id))?,
        user_id: parse_column(1, Uuid::parse_str(&user_id))?,
        rock_type: parse_column(2, RockType::parse(&rock_type))?,
        note: row.get(3)?,
        photo_path: row.get(4)?,
        lat: row.get(5)?,
        lng: row.get(6)?,
        created_at: parse_column(7, DateTime::parse_from_rfc3339(&created_at))?
            .with_timezone(&Utc),
    })
}

/// Lift a text-parse error into a rusqlite conversion error for `row.get`
/// style propagation
fn parse_column<T, E>(index: usize, result: Result<T, E>) -> rusqlite::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    result.map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Run a closure against a fresh connection on the blocking pool
async fn with_connection<T, F>(db_path: PathBuf, f: F) -> Result<T, RemoteError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let conn = Connection::open(&db_path)
            .map_err(|e| RemoteError::Storage(format!("open database: {e}")))?;
        f(&conn).map_err(|e| RemoteError::Storage(e.to_string()))
    })
    .await
    .map_err(|e| RemoteError::Storage(format!("task join error: {e}")))?
}

impl FindStore for LocalService {
    async fn recent_finds(&self, limit: usize) -> Result<Vec<Find>, RemoteError> {
        with_connection(self.db_path.clone(), move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, rock_type, note, photo_path, lat, lng, created_at
                 FROM finds
                 ORDER BY created_at DESC
                 LIMIT ?1",
            )?;

            let find_iter = stmt.query_map([limit], row_to_find)?;

            let mut finds = Vec::new();
            for find in find_iter {
                finds.push(find?);
            }
            Ok(finds)
        })
        .await
    }

    async fn insert_find(&self, find: NewFind) -> Result<Find, RemoteError> {
        if Coordinates::new(find.lat, find.lng).is_none() {
            return Err(RemoteError::Storage(format!(
                "coordinates out of range: {}, {}",
                find.lat, find.lng
            )));
        }

        // The backend assigns id and created_at. The row stores microsecond
        // precision, so truncate now() to keep the returned record equal to
        // what a later query reads back.
        let now = Utc::now();
        let created_at =
            now - chrono::Duration::nanoseconds(i64::from(now.timestamp_subsec_nanos() % 1_000));

        let created = Find {
            id: Uuid::new_v4(),
            user_id: find.user_id,
            rock_type: find.rock_type,
            note: find.note,
            photo_path: find.photo_path,
            lat: find.lat,
            lng: find.lng,
            created_at,
        };

        let row = created.clone();
        with_connection(self.db_path.clone(), move |conn| {
            conn.execute(
                "INSERT INTO finds (id, user_id, rock_type, note, photo_path, lat, lng, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    row.id.to_string(),
                    row.user_id.to_string(),
                    row.rock_type.as_str(),
                    row.note,
                    row.photo_path,
                    row.lat,
                    row.lng,
                    // Fixed-width fraction keeps lexicographic order == time order
                    row.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                ],
            )?;
            Ok(())
        })
        .await?;

        Ok(created)
    }
}

impl ObjectStore for LocalService {
    async fn upload(
        &self,
        key: String,
        bytes: Vec<u8>,
        _content_type: &'static str,
    ) -> Result<(), RemoteError> {
        // Keys look like "<user_id>/<uuid>.<ext>"; the user id segment
        // becomes a subdirectory
        let path = self.objects_dir.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RemoteError::ObjectStore(format!("create object directory: {e}")))?;
        }

        // No upsert: a fresh key is generated per attempt, so an existing
        // file means a collision and the upload fails
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| RemoteError::ObjectStore(format!("store object {key}: {e}")))?;

        file.write_all(&bytes)
            .await
            .map_err(|e| RemoteError::ObjectStore(format!("write object {key}: {e}")))?;

        // The bytes must be on disk before the caller records the key;
        // a drop-time flush would swallow write errors
        file.flush()
            .await
            .map_err(|e| RemoteError::ObjectStore(format!("flush object {key}: {e}")))?;

        Ok(())
    }

    fn object_url(&self, key: &str) -> PathBuf {
        self.objects_dir.join(key)
    }
}

impl Identity for LocalService {
    async fn current_user(&self) -> Result<Option<User>, RemoteError> {
        Ok(self.session.borrow().clone())
    }

    async fn sign_in(&self, email: String) -> Result<User, RemoteError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(RemoteError::Auth("enter a valid email address".to_string()));
        }

        // Find or create the user row for this address
        let lookup_email = email.clone();
        let user = with_connection(self.db_path.clone(), move |conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM users WHERE email = ?1",
                    [&lookup_email],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;

            let id = match existing {
                Some(id) => parse_column(0, Uuid::parse_str(&id))?,
                None => {
                    let id = Uuid::new_v4();
                    conn.execute(
                        "INSERT INTO users (id, email) VALUES (?1, ?2)",
                        rusqlite::params![id.to_string(), lookup_email],
                    )?;
                    id
                }
            };

            Ok(User {
                id,
                email: lookup_email,
            })
        })
        .await
        .map_err(|e| RemoteError::Auth(e.to_string()))?;

        // Persist the session so it survives restarts
        let json = serde_json::to_string(&user)
            .map_err(|e| RemoteError::Auth(format!("encode session: {e}")))?;
        tokio::fs::write(&self.session_path, json)
            .await
            .map_err(|e| RemoteError::Auth(format!("persist session: {e}")))?;

        self.session.send_replace(Some(user.clone()));
        println!("🔑 Signed in as {}", user.email);

        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        match tokio::fs::remove_file(&self.session_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(RemoteError::Auth(format!("clear session: {e}"))),
        }

        self.session.send_replace(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.session.subscribe()
    }
}

impl std::fmt::Debug for LocalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalService")
            .field("db_path", &self.db_path)
            .field("objects_dir", &self.objects_dir)
            .finish()
    }
}
