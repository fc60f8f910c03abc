//! Category tree blob store: contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist one opaque byte blob per `(owner, tree id)` pair.
//! - Keep compression and SQL details inside the repository boundary.
//!
//! # Invariants
//! - `load` returns exactly the bytes last passed to `save`.
//! - `revision` starts at 1 and increases by one on every successful save.
//! - A save carrying a stale expected revision never overwrites data.
//! - Owners never see each other's trees, even under the same tree id.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{Read, Write};

/// Result type used by tree store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from tree store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Blob (de)compression failed.
    Io(std::io::Error),
    /// Stored revision differs from the revision the caller loaded.
    Conflict {
        owner: String,
        tree_id: String,
        expected: Option<i64>,
        actual: Option<i64>,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "tree blob encoding failed: {err}"),
            Self::Conflict {
                owner,
                tree_id,
                expected,
                actual,
            } => write!(
                f,
                "tree {tree_id} of {owner} was modified concurrently (expected revision {}, found {})",
                revision_label(*expected),
                revision_label(*actual)
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "tree store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "tree store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "tree store requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// One persisted tree blob with its revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTree {
    /// Exactly the bytes handed to `save`.
    pub data: Vec<u8>,
    pub revision: i64,
}

/// Blob persistence keyed by owner and tree id.
pub trait TreeStore {
    /// Loads one tree blob, `None` when the tree was never saved or was deleted.
    fn load(&self, owner: &str, tree_id: &str) -> StoreResult<Option<StoredTree>>;
    /// Writes one tree blob and returns the new revision.
    ///
    /// `expected_revision = None` means "must not exist yet".
    fn save(
        &self,
        owner: &str,
        tree_id: &str,
        data: &[u8],
        expected_revision: Option<i64>,
    ) -> StoreResult<i64>;
    /// Deletes one tree blob. Deleting an absent tree is a no-op.
    fn delete(&self, owner: &str, tree_id: &str) -> StoreResult<()>;
}

impl<S: TreeStore + ?Sized> TreeStore for &S {
    fn load(&self, owner: &str, tree_id: &str) -> StoreResult<Option<StoredTree>> {
        (**self).load(owner, tree_id)
    }

    fn save(
        &self,
        owner: &str,
        tree_id: &str,
        data: &[u8],
        expected_revision: Option<i64>,
    ) -> StoreResult<i64> {
        (**self).save(owner, tree_id, data, expected_revision)
    }

    fn delete(&self, owner: &str, tree_id: &str) -> StoreResult<()> {
        (**self).delete(owner, tree_id)
    }
}

/// SQLite-backed tree store writing gzip-compressed blobs.
pub struct SqliteTreeStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTreeStore<'conn> {
    /// Creates store from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TreeStore for SqliteTreeStore<'_> {
    fn load(&self, owner: &str, tree_id: &str) -> StoreResult<Option<StoredTree>> {
        let row: Option<(Vec<u8>, i64)> = self
            .conn
            .query_row(
                "SELECT data, revision
                 FROM category_trees
                 WHERE owner_id = ?1 AND tree_id = ?2;",
                [owner, tree_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((compressed, revision)) => Ok(Some(StoredTree {
                data: gunzip(&compressed)?,
                revision,
            })),
        }
    }

    fn save(
        &self,
        owner: &str,
        tree_id: &str,
        data: &[u8],
        expected_revision: Option<i64>,
    ) -> StoreResult<i64> {
        let compressed = gzip(data)?;
        let changed = match expected_revision {
            None => self.conn.execute(
                "INSERT INTO category_trees (owner_id, tree_id, data, revision)
                 VALUES (?1, ?2, ?3, 1)
                 ON CONFLICT(owner_id, tree_id) DO NOTHING;",
                params![owner, tree_id, compressed],
            )?,
            Some(revision) => self.conn.execute(
                "UPDATE category_trees
                 SET data = ?3,
                     revision = revision + 1,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE owner_id = ?1
                   AND tree_id = ?2
                   AND revision = ?4;",
                params![owner, tree_id, compressed, revision],
            )?,
        };

        if changed == 0 {
            let actual = current_revision(self.conn, owner, tree_id)?;
            warn!(
                "event=tree_save module=store status=conflict tree_id={tree_id} expected={} actual={}",
                revision_label(expected_revision),
                revision_label(actual)
            );
            return Err(StoreError::Conflict {
                owner: owner.to_string(),
                tree_id: tree_id.to_string(),
                expected: expected_revision,
                actual,
            });
        }

        let revision = expected_revision.map_or(1, |revision| revision + 1);
        debug!(
            "event=tree_save module=store status=ok tree_id={tree_id} revision={revision} raw_bytes={} stored_bytes={}",
            data.len(),
            compressed.len()
        );
        Ok(revision)
    }

    fn delete(&self, owner: &str, tree_id: &str) -> StoreResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM category_trees WHERE owner_id = ?1 AND tree_id = ?2;",
            [owner, tree_id],
        )?;
        debug!("event=tree_delete module=store status=ok tree_id={tree_id} removed={changed}");
        Ok(())
    }
}

fn current_revision(conn: &Connection, owner: &str, tree_id: &str) -> StoreResult<Option<i64>> {
    let revision = conn
        .query_row(
            "SELECT revision FROM category_trees WHERE owner_id = ?1 AND tree_id = ?2;",
            [owner, tree_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(revision)
}

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoded = Vec::new();
    GzDecoder::new(data).read_to_end(&mut decoded)?;
    Ok(decoded)
}

fn revision_label(revision: Option<i64>) -> String {
    revision.map_or_else(|| "none".to_string(), |value| value.to_string())
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "category_trees")? {
        return Err(StoreError::MissingRequiredTable("category_trees"));
    }

    for column in ["owner_id", "tree_id", "data", "revision", "created_at", "updated_at"] {
        if !table_has_column(conn, "category_trees", column)? {
            return Err(StoreError::MissingRequiredColumn {
                table: "category_trees",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::{gunzip, gzip};

    #[test]
    fn gzip_round_trips_bytes() {
        let raw = br#"{"id":"t","name":"n","categories":[]}"#;
        let packed = gzip(raw).unwrap();
        assert_ne!(packed.as_slice(), raw.as_slice());
        assert_eq!(gunzip(&packed).unwrap(), raw.to_vec());
    }

    #[test]
    fn gunzip_rejects_plain_bytes() {
        assert!(gunzip(b"not gzip").is_err());
    }
}
