//! # Storage Module - State Document Persistence
//!
//! The whole game lives in one JSON document owned by [`StateStore`]. Every
//! mutation goes through [`StateStore::transact`], which serializes writers,
//! applies the change to a working copy and only swaps it in once the closure
//! succeeded and the copy is on disk. Readers only wait for the swap, never
//! for disk I/O.
//!
//! ## Layout
//!
//! ```text
//! data/
//! ├── state.json          ← live document
//! └── backups/
//!     ├── manifest.json   ← id → created_at, size, sha256
//!     └── backup_YYYYMMDD_HHMMSS_mmm.json
//! ```
//!
//! ## Durability
//!
//! - **Atomic writes**: temp file + fsync + rename under an `fs2` exclusive lock
//! - **Ordered persistence**: writers hold one gate from read to fsync, so
//!   snapshots reach disk in commit order and a failed write commits nothing
//! - **Loud failures**: a non-empty state file that fails to parse is an error,
//!   never silently replaced by an empty world
//!
//! ```rust,no_run
//! use oxmarket::storage::StateStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = StateStore::open("./data", 10).await?;
//!     let players = store.read(|doc| doc.players.len()).await;
//!     println!("{} players", players);
//!     Ok(())
//! }
//! ```

pub mod backup;

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::market::errors::{GameError, GameResult};
use crate::market::types::{GameState, Player, TaxPool};
use backup::{BackupManager, BackupMetadata};

const STATE_FILE: &str = "state.json";
const BACKUP_DIR: &str = "backups";

/// Owner of the canonical game document and its backing file.
pub struct StateStore {
    state_path: PathBuf,
    backups: BackupManager,
    /// Last document known to be on disk.
    inner: Mutex<GameState>,
    /// Held by a writer from reading the document until its snapshot is written.
    writer: Mutex<()>,
    backup_lock: Mutex<()>,
}

impl StateStore {
    /// Open (or create) the store rooted at `data_dir` and load the document.
    pub async fn open(data_dir: impl AsRef<Path>, backups_to_keep: usize) -> GameResult<Self> {
        let base = data_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&base).await?;
        let backups = BackupManager::new(base.join(BACKUP_DIR), backups_to_keep)?;
        let store = Self {
            state_path: base.join(STATE_FILE),
            backups,
            inner: Mutex::new(GameState::default()),
            writer: Mutex::new(()),
            backup_lock: Mutex::new(()),
        };
        store.load().await?;
        Ok(store)
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Materialize the document from disk. A missing file yields the empty
    /// document (which is written out), an empty or whitespace-only file is
    /// treated the same way, and any other parse failure is returned.
    pub async fn load(&self) -> GameResult<()> {
        let loaded = match tokio::fs::read_to_string(&self.state_path).await {
            Ok(raw) if raw.trim().is_empty() => {
                warn!("state file {} is empty; starting from an empty document", self.state_path.display());
                None
            }
            Ok(raw) => Some(serde_json::from_str::<GameState>(&raw).map_err(|e| {
                GameError::Internal(format!(
                    "state file {} is malformed: {}",
                    self.state_path.display(),
                    e
                ))
            })?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        match loaded {
            Some(doc) => {
                let mut inner = self.inner.lock().await;
                info!("loaded state: {} players", doc.players.len());
                *inner = doc;
            }
            None => {
                self.replace_document(GameState::default()).await?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Run one read-modify-write against the document.
    ///
    /// The closure sees a working copy. On `Err` nothing is committed. On `Ok`
    /// the copy is written to disk first and only then replaces the document,
    /// so a failed write leaves memory and disk on the previous state.
    pub async fn transact<T, F>(&self, f: F) -> GameResult<T>
    where
        F: FnOnce(&mut GameState) -> GameResult<T>,
    {
        let _writer = self.writer.lock().await;
        let mut working = self.inner.lock().await.clone();
        let value = f(&mut working)?;
        let payload = serde_json::to_string_pretty(&working)?;
        self.persist(payload).await?;
        *self.inner.lock().await = working;
        Ok(value)
    }

    /// Consistent read-only access to the current document.
    pub async fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&GameState) -> T,
    {
        let inner = self.inner.lock().await;
        f(&inner)
    }

    async fn replace_document(&self, doc: GameState) -> GameResult<()> {
        self.transact(move |current| {
            *current = doc;
            Ok(())
        })
        .await
    }

    async fn persist(&self, payload: String) -> GameResult<()> {
        let path = self.state_path.clone();
        let bytes = payload.len();
        tokio::task::spawn_blocking(move || write_file_locked(&path, &payload))
            .await
            .map_err(|e| GameError::Internal(format!("persist task failed: {}", e)))?
            .map_err(|e| {
                warn!("writing {} failed, change discarded: {}", self.state_path.display(), e);
                GameError::from(e)
            })?;
        debug!("persisted {} bytes to {}", bytes, self.state_path.display());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Per-key accessors
    // ------------------------------------------------------------------

    pub async fn get_player(&self, id: &str) -> Option<Player> {
        self.read(|doc| doc.players.get(id).cloned()).await
    }

    pub async fn list_players(&self) -> Vec<Player> {
        self.read(|doc| doc.players.values().cloned().collect()).await
    }

    /// Overwrite a player's record.
    pub async fn save_player(&self, player: Player) -> GameResult<()> {
        self.transact(move |doc| {
            doc.players.insert(player.player_id.clone(), player);
            Ok(())
        })
        .await
    }

    pub async fn delete_player(&self, id: &str) -> GameResult<bool> {
        let id = id.to_string();
        self.transact(move |doc| {
            doc.transactions.remove(&id);
            Ok(doc.players.remove(&id).is_some())
        })
        .await
    }

    pub async fn list_admins(&self) -> Vec<String> {
        self.read(|doc| doc.admins.iter().cloned().collect()).await
    }

    pub async fn is_admin(&self, id: &str) -> bool {
        self.read(|doc| doc.is_admin(id)).await
    }

    /// Returns false when the id was already an admin.
    pub async fn add_admin(&self, id: &str) -> GameResult<bool> {
        let id = id.to_string();
        self.transact(move |doc| Ok(doc.admins.insert(id))).await
    }

    pub async fn remove_admin(&self, id: &str) -> GameResult<bool> {
        let id = id.to_string();
        self.transact(move |doc| Ok(doc.admins.remove(&id))).await
    }

    pub async fn is_disabled(&self) -> bool {
        self.read(|doc| doc.disabled).await
    }

    pub async fn set_disabled(&self, disabled: bool) -> GameResult<()> {
        self.transact(move |doc| {
            doc.disabled = disabled;
            Ok(())
        })
        .await
    }

    pub async fn system_balance(&self) -> i64 {
        self.read(|doc| doc.system_balance).await
    }

    pub async fn tax_pool(&self) -> TaxPool {
        self.read(|doc| doc.tax_pool.clone()).await
    }

    /// Full copy of the current document.
    pub async fn snapshot(&self) -> GameState {
        self.read(|doc| doc.clone()).await
    }

    pub async fn to_json(&self) -> GameResult<String> {
        let inner = self.inner.lock().await;
        Ok(serde_json::to_string_pretty(&*inner)?)
    }

    // ------------------------------------------------------------------
    // Backups
    // ------------------------------------------------------------------

    /// Write a timestamped copy of the document and prune to the newest N.
    pub async fn snapshot_backup(&self, now: DateTime<Utc>) -> GameResult<BackupMetadata> {
        let _guard = self.backup_lock.lock().await;
        let payload = self.to_json().await?;
        let manager = self.backups.clone();
        let meta = tokio::task::spawn_blocking(move || -> GameResult<BackupMetadata> {
            let meta = manager.create_backup(&payload, now)?;
            manager.apply_retention()?;
            Ok(meta)
        })
        .await
        .map_err(|e| GameError::Internal(format!("backup task failed: {}", e)))??;
        info!("backup created: {} ({} bytes)", meta.id, meta.size_bytes);
        Ok(meta)
    }

    /// Backups on disk, newest first.
    pub async fn list_backups(&self) -> GameResult<Vec<BackupMetadata>> {
        let _guard = self.backup_lock.lock().await;
        let manager = self.backups.clone();
        tokio::task::spawn_blocking(move || manager.list_backups())
            .await
            .map_err(|e| GameError::Internal(format!("backup task failed: {}", e)))?
    }

    /// Replace the live document with the named backup. The backup is fully
    /// parsed before anything is swapped, so a bad file leaves state untouched.
    pub async fn restore_backup(&self, name: &str) -> GameResult<()> {
        let _guard = self.backup_lock.lock().await;
        let manager = self.backups.clone();
        let owned = name.to_string();
        let raw = tokio::task::spawn_blocking(move || manager.read_backup(&owned))
            .await
            .map_err(|e| GameError::Internal(format!("backup task failed: {}", e)))??;
        let doc: GameState = serde_json::from_str(&raw)
            .map_err(|e| GameError::precondition(format!("Backup {} is unreadable: {}", name, e)))?;
        self.replace_document(doc).await?;
        info!("restored backup {}", name);
        Ok(())
    }

    /// Replace the document with the empty document.
    pub async fn reset(&self) -> GameResult<()> {
        self.replace_document(GameState::default()).await?;
        warn!("game state reset to empty document");
        Ok(())
    }
}

/// Atomically replace `path` with `content`.
///
/// Takes an exclusive lock on the destination, writes a unique temp file in
/// the same directory, fsyncs it, renames it over the destination and fsyncs
/// the directory.
pub(crate) fn write_file_locked(path: &Path, content: &str) -> std::io::Result<()> {
    // Lock the destination before the rename so two processes pointed at the
    // same data dir can't interleave their replacements.
    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)?;

    lock_file.lock_exclusive()?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let base = path.file_name().and_then(|s| s.to_str()).unwrap_or("state.json");
    let mut counter = 0u32;
    let tmp_path = loop {
        let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut tmp) => {
                tmp.write_all(content.as_bytes())?;
                tmp.flush()?;
                let _ = tmp.sync_all();
                break candidate;
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                counter = counter.saturating_add(1);
                continue;
            }
            Err(e) => return Err(e),
        }
    };

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    // Persist the rename (best-effort)
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }

    drop(lock_file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_creates_empty_document() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path(), 10).await.unwrap();
        assert!(store.list_players().await.is_empty());
        assert!(dir.path().join(STATE_FILE).exists());
    }

    #[tokio::test]
    async fn failed_transaction_leaves_document_untouched() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path(), 10).await.unwrap();
        let result: GameResult<()> = store
            .transact(|doc| {
                doc.system_balance = 999;
                Err(GameError::precondition("nope"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(store.system_balance().await, 0);
    }

    #[tokio::test]
    async fn committed_transaction_is_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path(), 10).await.unwrap();
        store.add_admin("console:root").await.unwrap();
        let raw = std::fs::read_to_string(dir.path().join(STATE_FILE)).unwrap();
        let doc: GameState = serde_json::from_str(&raw).unwrap();
        assert!(doc.admins.contains("console:root"));
    }

    #[test]
    fn write_file_locked_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.json");
        write_file_locked(&path, "one").unwrap();
        write_file_locked(&path, "two").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
