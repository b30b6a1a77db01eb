//! libSQL storage layer for service snapshots.
//!
//! The [`Storage`] struct wraps a local libSQL database that holds the
//! persisted state of pipeline services. A service serializes its in-memory
//! state to JSON and hands it over on `save_all`; `load_all` reads it back.
//! Nothing is written implicitly.

mod migrations;

use std::path::Path;

use chrono::Utc;
use gransk_shared::{GranskError, Result};
use libsql::{Connection, Database, params};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

/// Summary row returned by [`Storage::list_snapshots`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub service: String,
    pub saved_at: String,
}

impl Storage {
    /// Open or create a database at `path`, applying pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GranskError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| GranskError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| GranskError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        GranskError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Snapshot operations
    // -----------------------------------------------------------------------

    /// Store the serialized state of `service`, replacing any previous snapshot.
    pub async fn save_snapshot(&self, service: &str, state_json: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO service_snapshots (service, state_json, saved_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(service) DO UPDATE SET
                   state_json = excluded.state_json,
                   saved_at = excluded.saved_at",
                params![service, state_json, now.as_str()],
            )
            .await
            .map_err(|e| GranskError::Storage(e.to_string()))?;
        tracing::debug!(service, bytes = state_json.len(), "saved snapshot");
        Ok(())
    }

    /// Fetch the serialized state of `service`, if one was saved.
    pub async fn load_snapshot(&self, service: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT state_json FROM service_snapshots WHERE service = ?1",
                params![service],
            )
            .await
            .map_err(|e| GranskError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let state: String = row
                    .get(0)
                    .map_err(|e| GranskError::Storage(e.to_string()))?;
                Ok(Some(state))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(GranskError::Storage(e.to_string())),
        }
    }

    /// Remove the snapshot of `service`. Missing snapshots are not an error.
    pub async fn delete_snapshot(&self, service: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM service_snapshots WHERE service = ?1",
                params![service],
            )
            .await
            .map_err(|e| GranskError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List every stored snapshot, ordered by service name.
    pub async fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>> {
        let mut rows = self
            .conn
            .query(
                "SELECT service, saved_at FROM service_snapshots ORDER BY service",
                params![],
            )
            .await
            .map_err(|e| GranskError::Storage(e.to_string()))?;

        let mut snapshots = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            snapshots.push(SnapshotInfo {
                service: row
                    .get(0)
                    .map_err(|e| GranskError::Storage(e.to_string()))?,
                saved_at: row
                    .get(1)
                    .map_err(|e| GranskError::Storage(e.to_string()))?,
            });
        }
        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_storage(dir: &tempfile::TempDir) -> Storage {
        Storage::open(&dir.path().join("gransk.db"))
            .await
            .expect("open test db")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let dir = tempfile::tempdir().unwrap();
        let storage = test_storage(&dir).await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gransk.db");
        let s1 = Storage::open(&path).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&path).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("gransk.db");
        Storage::open(&path).await.expect("open nested");
        assert!(path.parent().unwrap().is_dir());
    }

    #[tokio::test]
    async fn snapshot_save_load_replace() {
        let dir = tempfile::tempdir().unwrap();
        let storage = test_storage(&dir).await;

        assert!(storage.load_snapshot("related_entities").await.unwrap().is_none());

        storage
            .save_snapshot("related_entities", r#"{"pairs":{}}"#)
            .await
            .expect("save");
        storage
            .save_snapshot("related_entities", r#"{"pairs":{"a":1}}"#)
            .await
            .expect("replace");

        let state = storage.load_snapshot("related_entities").await.unwrap();
        assert_eq!(state.as_deref(), Some(r#"{"pairs":{"a":1}}"#));
        assert_eq!(storage.list_snapshots().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn snapshot_delete_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let storage = test_storage(&dir).await;

        storage.save_snapshot("entity_network", "{}").await.unwrap();
        storage.save_snapshot("related_documents", "{}").await.unwrap();

        let names: Vec<String> = storage
            .list_snapshots()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.service)
            .collect();
        assert_eq!(names, vec!["entity_network", "related_documents"]);

        storage.delete_snapshot("entity_network").await.unwrap();
        storage.delete_snapshot("never_saved").await.unwrap();
        assert!(storage.load_snapshot("entity_network").await.unwrap().is_none());
        assert_eq!(storage.list_snapshots().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn snapshots_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gransk.db");
        {
            let storage = Storage::open(&path).await.unwrap();
            storage.save_snapshot("related_documents", "[1,2]").await.unwrap();
        }
        let storage = Storage::open(&path).await.unwrap();
        assert_eq!(
            storage.load_snapshot("related_documents").await.unwrap().as_deref(),
            Some("[1,2]")
        );
    }
}
