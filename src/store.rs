// Copyright 2026 Placefind Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::Result;
use fs2::FileExt;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::params_from_iter;
use sha2::Digest;
use sha2::Sha256;

use crate::error::SearchError;
use crate::executor::Cancellation;
use crate::executor::PlaceSource;
use crate::geometry::GeometryPayload;
use crate::mapper::PlaceRecord;
use crate::model::Place;
use crate::spatial::register_spatial_functions;
use crate::sql::BoundQuery;
use crate::sql::register_text_functions;
use crate::sql::PLACE_COLUMNS;

pub struct Store {
    pub conn: Connection,
    pub path: PathBuf,
    lock: Option<StoreLock>,
}

struct StoreLock {
    _file: File,
    path: PathBuf,
    mode: StoreMode,
}

impl StoreLock {
    fn new(file: File, path: PathBuf, mode: StoreMode) -> Self {
        Self {
            _file: file,
            path,
            mode,
        }
    }
}

const SCHEMA_VERSION: i64 = 1;
/// SQLite VM instructions between cancellation checks.
const PROGRESS_OPS: i32 = 1000;

#[derive(Debug, Clone, Copy)]
pub enum StoreMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub place_count: i64,
    pub public_count: i64,
    pub db_size_bytes: u64,
}

impl Store {
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("store already exists at {}", path.display());
        }
        let _lock = Self::acquire_lock(path, StoreMode::ReadWrite)?;
        let conn = Self::open_connection(path, StoreMode::ReadWrite)?;
        Self::apply_pragmas(&conn, StoreMode::ReadWrite)?;
        Self::create_schema(&conn)?;
        Self::set_meta(&conn, "schema_version", &SCHEMA_VERSION.to_string())?;
        Ok(())
    }

    pub fn open(path: &Path, mode: StoreMode) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("store not found at {}", path.display());
        }
        let mut lock = Self::acquire_lock(path, mode)?;
        let mut conn = Self::open_connection(path, mode)?;
        Self::apply_pragmas(&conn, mode)?;
        if matches!(mode, StoreMode::ReadWrite) {
            Self::migrate(&conn)?;
            return Ok(Self {
                conn,
                path: path.to_path_buf(),
                lock: Some(lock),
            });
        }

        let version = Self::schema_version(&conn)?;
        if version != SCHEMA_VERSION {
            drop(conn);
            drop(lock);
            let lock_rw = Self::acquire_lock(path, StoreMode::ReadWrite)?;
            let conn_rw = Self::open_connection(path, StoreMode::ReadWrite)?;
            Self::apply_pragmas(&conn_rw, StoreMode::ReadWrite)?;
            Self::migrate(&conn_rw)?;
            drop(conn_rw);
            drop(lock_rw);

            lock = Self::acquire_lock(path, StoreMode::ReadOnly)?;
            conn = Self::open_connection(path, StoreMode::ReadOnly)?;
            Self::apply_pragmas(&conn, StoreMode::ReadOnly)?;
        }

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            lock: Some(lock),
        })
    }

    fn open_connection(path: &Path, mode: StoreMode) -> Result<Connection> {
        let flags = match mode {
            StoreMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            StoreMode::ReadWrite => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        };
        let conn = Connection::open_with_flags(path, flags)
            .with_context(|| format!("open {}", path.display()))?;
        conn.busy_timeout(Duration::from_millis(5000))
            .context("set busy timeout")?;
        register_spatial_functions(&conn).context("register spatial functions")?;
        register_text_functions(&conn).context("register text functions")?;
        Ok(conn)
    }

    fn apply_pragmas(conn: &Connection, mode: StoreMode) -> Result<()> {
        let mut batch = String::from("PRAGMA foreign_keys=ON;");
        if matches!(mode, StoreMode::ReadWrite) {
            batch = format!("PRAGMA journal_mode=DELETE;\nPRAGMA synchronous=NORMAL;\n{batch}");
        }
        conn.execute_batch(&batch).context("apply pragmas")?;
        Ok(())
    }

    fn lock_path_for(path: &Path) -> Result<PathBuf> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string_lossy().as_bytes());
        let hash = hex::encode(hasher.finalize());
        let mut dir = std::env::temp_dir();
        dir.push("placefind");
        fs::create_dir_all(&dir).with_context(|| format!("create lock dir {}", dir.display()))?;
        Ok(dir.join(format!("placefind-{hash}.lock")))
    }

    fn acquire_lock(path: &Path, mode: StoreMode) -> Result<StoreLock> {
        let lock_path = Self::lock_path_for(path)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("open lock file {}", lock_path.display()))?;
        let deadline = Instant::now() + Duration::from_millis(5000);
        loop {
            let locked = match mode {
                StoreMode::ReadOnly => file.try_lock_shared().map_err(|err| err.to_string()),
                StoreMode::ReadWrite => file.try_lock_exclusive().map_err(|err| err.to_string()),
            };
            match locked {
                Ok(()) => return Ok(StoreLock::new(file, lock_path, mode)),
                Err(_) if Instant::now() >= deadline => {
                    let mode_label = match mode {
                        StoreMode::ReadOnly => "read",
                        StoreMode::ReadWrite => "write",
                    };
                    anyhow::bail!(
                        "store is locked for {mode_label} access; another process may be using {}",
                        path.display()
                    );
                }
                Err(_) => {
                    sleep(Duration::from_millis(50));
                }
            }
        }
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS meta (
  key TEXT PRIMARY KEY,
  value TEXT
);

CREATE TABLE IF NOT EXISTS place (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  description TEXT,
  place_type TEXT,
  location TEXT,
  bounds TEXT,
  address TEXT,
  city TEXT,
  state TEXT,
  country TEXT,
  postal_code TEXT,
  categories TEXT NOT NULL DEFAULT '[]',
  tags TEXT NOT NULL DEFAULT '[]',
  rating_avg REAL,
  rating_count INTEGER NOT NULL DEFAULT 0,
  is_public INTEGER NOT NULL DEFAULT 1,
  created_by TEXT,
  created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_place_created_at ON place(created_at);
CREATE INDEX IF NOT EXISTS idx_place_city ON place(city);",
        )
        .context("create schema")?;
        Ok(())
    }

    fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .context("set meta")?;
        Ok(())
    }

    fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                params![name],
                |row| row.get(0),
            )
            .context("check table")?;
        Ok(count > 0)
    }

    fn schema_version(conn: &Connection) -> Result<i64> {
        if !Self::table_exists(conn, "meta")? {
            return Ok(0);
        }
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key='schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("read schema_version")?;
        Ok(value.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0))
    }

    fn migrate(conn: &Connection) -> Result<()> {
        let version = Self::schema_version(conn)?;
        if version > SCHEMA_VERSION {
            anyhow::bail!(
                "store schema version {} is newer than supported {}",
                version,
                SCHEMA_VERSION
            );
        }
        if version == SCHEMA_VERSION {
            return Ok(());
        }

        Self::create_schema(conn)?;
        Self::set_meta(conn, "schema_version", &SCHEMA_VERSION.to_string())?;
        Ok(())
    }

    /// Inserts or replaces a place. Every value, geometry included, is bound.
    pub fn insert_place(&self, place: &Place) -> Result<()> {
        let location = place.location.map(|c| GeometryPayload::point(c).encode());
        let bounds = place
            .bounds
            .as_deref()
            .map(|ring| GeometryPayload::polygon(ring).encode());
        let categories =
            serde_json::to_string(&place.categories).context("serialize categories")?;
        let tags = serde_json::to_string(&place.tags).context("serialize tags")?;

        let columns: Vec<&str> = PLACE_COLUMNS.iter().map(|col| col.name()).collect();
        let markers: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT OR REPLACE INTO place ({}) VALUES ({})",
            columns.join(", "),
            markers.join(", ")
        );
        self.conn
            .execute(
                &sql,
                params![
                    place.id,
                    place.name,
                    place.description,
                    place.place_type,
                    location,
                    bounds,
                    place.address,
                    place.city,
                    place.state,
                    place.country,
                    place.postal_code,
                    categories,
                    tags,
                    place.rating_avg,
                    place.rating_count,
                    place.is_public,
                    place.created_by,
                    place.created_at,
                ],
            )
            .with_context(|| format!("insert place {}", place.id))?;
        Ok(())
    }

    /// Inserts all places in one transaction.
    pub fn insert_places<'p>(&self, places: impl IntoIterator<Item = &'p Place>) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin insert transaction")?;
        let mut inserted = 0usize;
        for place in places {
            self.insert_place(place)?;
            inserted += 1;
        }
        tx.commit().context("commit places")?;
        Ok(inserted)
    }

    /// Every stored place in id order, regardless of visibility.
    pub fn all_places(&self) -> Result<Vec<Place>> {
        let columns: Vec<&str> = PLACE_COLUMNS.iter().map(|col| col.sql()).collect();
        let sql = format!(
            "SELECT {}, NULL AS distance_m FROM place ORDER BY place.id ASC",
            columns.join(", ")
        );
        let mut stmt = self.conn.prepare(&sql).context("prepare export")?;
        let rows = stmt.query_map([], PlaceRecord::from_row)?;
        let mut places = Vec::new();
        for row in rows {
            places.push(crate::mapper::map_record(row?));
        }
        Ok(places)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let place_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM place", [], |row| row.get(0))
            .context("count places")?;
        let public_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM place WHERE is_public = 1", [], |row| {
                row.get(0)
            })
            .context("count public places")?;
        let db_size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        Ok(StoreStats {
            place_count,
            public_count,
            db_size_bytes,
        })
    }

    /// Runs `f` with a progress handler that interrupts the statement once
    /// `cancel` fires.
    fn with_cancellation<T>(
        &self,
        cancel: &Cancellation,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> crate::error::Result<T> {
        cancel.check()?;
        let token = cancel.clone();
        self.conn
            .progress_handler(PROGRESS_OPS, Some(move || token.is_cancelled()));
        let result = f(&self.conn);
        self.conn.progress_handler(0, None::<fn() -> bool>);
        result.map_err(|err| match err {
            rusqlite::Error::SqliteFailure(ref failure, _)
                if failure.code == ErrorCode::OperationInterrupted =>
            {
                SearchError::Cancelled
            }
            other => SearchError::Store(other),
        })
    }
}

impl PlaceSource for Store {
    fn fetch(
        &self,
        query: &BoundQuery,
        cancel: &Cancellation,
    ) -> crate::error::Result<Vec<PlaceRecord>> {
        self.with_cancellation(cancel, |conn| {
            let mut stmt = conn.prepare(&query.sql)?;
            let rows = stmt.query_map(params_from_iter(query.params.iter()), PlaceRecord::from_row)?;
            rows.collect()
        })
    }

    fn count(&self, query: &BoundQuery, cancel: &Cancellation) -> crate::error::Result<u64> {
        self.with_cancellation(cancel, |conn| {
            let total: i64 =
                conn.query_row(&query.sql, params_from_iter(query.params.iter()), |row| {
                    row.get(0)
                })?;
            Ok(total.max(0) as u64)
        })
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            let path = lock.path.clone();
            let mode = lock.mode;
            drop(lock);
            if matches!(mode, StoreMode::ReadWrite) {
                let _ = fs::remove_file(path);
            }
        }
    }
}
