//! Database module for the persistent image index

use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::path::Path;

/// Image record stored in the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// Absolute path of the image
    pub path: String,
    /// Canonical parent directory
    pub parent: String,
    /// File name without path
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// Modification time as Unix timestamp
    pub mtime: i64,
    /// File hash (MD5 or partial hash)
    pub hash: Option<String>,
}

/// Database manager for the image index
pub struct ScanDatabase {
    conn: Connection,
}

impl ScanDatabase {
    /// Open or create database
    pub fn open(path: &Path) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> SqliteResult<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS images (
                path TEXT PRIMARY KEY,
                parent TEXT NOT NULL,
                name TEXT NOT NULL,
                size INTEGER NOT NULL,
                mtime INTEGER NOT NULL,
                hash TEXT,
                indexed_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_images_parent ON images(parent);
            CREATE INDEX IF NOT EXISTS idx_images_hash ON images(hash);
            ",
        )?;
        Ok(())
    }

    /// Insert or update the given records, skipping rows that are unchanged.
    ///
    /// Returns the number of rows actually written.
    pub fn upsert_if_changed(&mut self, records: &[ImageRecord]) -> SqliteResult<u64> {
        let now = chrono::Utc::now().timestamp();
        let mut changed = 0u64;

        let tx = self.conn.transaction()?;
        {
            let mut select = tx.prepare("SELECT size, mtime, hash FROM images WHERE path = ?1")?;
            let mut upsert = tx.prepare(
                "INSERT OR REPLACE INTO images (path, parent, name, size, mtime, hash, indexed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for record in records {
                let existing: Option<(i64, i64, Option<String>)> = select
                    .query_row(params![record.path], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                    })
                    .optional()?;

                let unchanged = matches!(
                    &existing,
                    Some((size, mtime, hash))
                        if *size as u64 == record.size
                            && *mtime == record.mtime
                            && (record.hash.is_none() || *hash == record.hash)
                );
                if unchanged {
                    continue;
                }

                upsert.execute(params![
                    record.path,
                    record.parent,
                    record.name,
                    record.size as i64,
                    record.mtime,
                    record.hash,
                    now,
                ])?;
                changed += 1;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Look up one image by absolute path
    pub fn get_image(&self, path: &str) -> SqliteResult<Option<ImageRecord>> {
        self.conn
            .query_row(
                "SELECT path, parent, name, size, mtime, hash FROM images WHERE path = ?1",
                params![path],
                |row| {
                    Ok(ImageRecord {
                        path: row.get(0)?,
                        parent: row.get(1)?,
                        name: row.get(2)?,
                        size: row.get::<_, i64>(3)? as u64,
                        mtime: row.get(4)?,
                        hash: row.get(5)?,
                    })
                },
            )
            .optional()
    }

    /// Get image count
    pub fn image_count(&self) -> SqliteResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Get image count below one parent directory
    pub fn image_count_in(&self, parent: &str) -> SqliteResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM images WHERE parent = ?1",
            params![parent],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
