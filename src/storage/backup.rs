//! Snapshot backups of the state document.
//!
//! Each backup is a full JSON copy named `backup_<YYYYMMDD_HHMMSS_mmm>.json`.
//! A manifest records the SHA-256 checksum of each file so a restore can
//! detect tampering or truncation. Retention keeps the newest N files and
//! deletes the oldest first.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::market::errors::{GameError, GameResult};

const MANIFEST: &str = "manifest.json";
const PREFIX: &str = "backup_";
const SUFFIX: &str = ".json";

/// Backup metadata kept in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// File name, which doubles as the backup id
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    /// SHA256 checksum for verification
    pub checksum: String,
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_path: PathBuf,
    keep: usize,
}

impl BackupManager {
    pub fn new(backup_path: PathBuf, keep: usize) -> io::Result<Self> {
        fs::create_dir_all(&backup_path)?;
        Ok(Self { backup_path, keep: keep.max(1) })
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    fn load_manifest(&self) -> io::Result<BTreeMap<String, BackupMetadata>> {
        let path = self.backup_path.join(MANIFEST);
        match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }

    fn save_manifest(&self, manifest: &BTreeMap<String, BackupMetadata>) -> io::Result<()> {
        let contents = serde_json::to_string_pretty(manifest)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        super::write_file_locked(&self.backup_path.join(MANIFEST), &contents)
    }

    /// Write `payload` as a new backup file.
    pub fn create_backup(&self, payload: &str, now: DateTime<Utc>) -> io::Result<BackupMetadata> {
        let stem = format!("{}{}", PREFIX, now.format("%Y%m%d_%H%M%S_%3f"));
        let mut id = format!("{}{}", stem, SUFFIX);
        let mut counter = 1u32;
        while self.backup_path.join(&id).exists() {
            id = format!("{}_{:02}{}", stem, counter, SUFFIX);
            counter += 1;
        }
        let file = self.backup_path.join(&id);
        super::write_file_locked(&file, payload)?;

        let metadata = BackupMetadata {
            id: id.clone(),
            created_at: now,
            size_bytes: fs::metadata(&file)?.len(),
            checksum: calculate_checksum(&file)?,
        };

        let mut manifest = self.load_manifest()?;
        manifest.insert(id, metadata.clone());
        self.save_manifest(&manifest)?;
        Ok(metadata)
    }

    /// Backup file names on disk, oldest first.
    fn backup_files(&self) -> io::Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(&self.backup_path)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_backup_name(name))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Delete everything but the newest `keep` backups, oldest first.
    pub fn apply_retention(&self) -> io::Result<Vec<String>> {
        let names = self.backup_files()?;
        if names.len() <= self.keep {
            return Ok(Vec::new());
        }
        let excess = names.len() - self.keep;
        let mut manifest = self.load_manifest()?;
        let mut deleted = Vec::with_capacity(excess);
        for name in names.into_iter().take(excess) {
            fs::remove_file(self.backup_path.join(&name))?;
            manifest.remove(&name);
            log::info!("Deleted old backup: {}", name);
            deleted.push(name);
        }
        self.save_manifest(&manifest)?;
        Ok(deleted)
    }

    /// All backups, newest first. Files missing from the manifest are still
    /// listed, with metadata read from the file itself.
    pub fn list_backups(&self) -> GameResult<Vec<BackupMetadata>> {
        let manifest = self.load_manifest()?;
        let mut out = Vec::new();
        for name in self.backup_files()?.into_iter().rev() {
            match manifest.get(&name) {
                Some(meta) => out.push(meta.clone()),
                None => {
                    let path = self.backup_path.join(&name);
                    let modified = fs::metadata(&path)?.modified()?;
                    out.push(BackupMetadata {
                        id: name,
                        created_at: DateTime::<Utc>::from(modified),
                        size_bytes: fs::metadata(&path)?.len(),
                        checksum: calculate_checksum(&path)?,
                    });
                }
            }
        }
        Ok(out)
    }

    /// Read a backup's contents, verifying its checksum when the manifest
    /// knows the file.
    pub fn read_backup(&self, name: &str) -> GameResult<String> {
        if !is_backup_name(name) {
            return Err(GameError::not_found(format!("Backup {} not found.", name)));
        }
        let path = self.backup_path.join(name);
        if !path.is_file() {
            return Err(GameError::not_found(format!("Backup {} not found.", name)));
        }
        if let Some(meta) = self.load_manifest()?.get(name) {
            let current = calculate_checksum(&path)?;
            if current != meta.checksum {
                log::error!("Backup verification FAILED: {} (checksum mismatch)", name);
                return Err(GameError::precondition(format!(
                    "Backup {} failed checksum verification.",
                    name
                )));
            }
        }
        Ok(fs::read_to_string(&path)?)
    }
}

/// Only plain `backup_*.json` file names, never paths.
pub fn is_backup_name(name: &str) -> bool {
    name.starts_with(PREFIX)
        && name.ends_with(SUFFIX)
        && name.len() > PREFIX.len() + SUFFIX.len()
        && !name.contains(|c: char| c == '/' || c == '\\')
        && !name.contains("..")
}

/// Calculate SHA256 checksum of a file
fn calculate_checksum(path: &Path) -> io::Result<String> {
    use sha2::{Digest, Sha256};

    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_create_backup_records_checksum() {
        let temp = TempDir::new().unwrap();
        let manager = BackupManager::new(temp.path().join("backups"), 10).unwrap();
        let meta = manager.create_backup("{\"players\":{}}", base_time()).unwrap();
        assert_eq!(meta.id, "backup_20240301_080000_000.json");
        assert_eq!(meta.checksum.len(), 64);
        assert!(manager.backup_path().join(&meta.id).exists());
    }

    #[test]
    fn test_same_timestamp_gets_unique_names() {
        let temp = TempDir::new().unwrap();
        let manager = BackupManager::new(temp.path().join("backups"), 10).unwrap();
        let a = manager.create_backup("{}", base_time()).unwrap();
        let b = manager.create_backup("{}", base_time()).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(manager.list_backups().unwrap().len(), 2);
    }

    #[test]
    fn test_retention_deletes_oldest_first() {
        let temp = TempDir::new().unwrap();
        let manager = BackupManager::new(temp.path().join("backups"), 2).unwrap();
        for i in 0..5 {
            manager.create_backup("{}", base_time() + Duration::seconds(i)).unwrap();
        }
        let deleted = manager.apply_retention().unwrap();
        assert_eq!(
            deleted,
            vec![
                "backup_20240301_080000_000.json".to_string(),
                "backup_20240301_080001_000.json".to_string(),
                "backup_20240301_080002_000.json".to_string(),
            ]
        );
        let remaining: Vec<String> = manager.list_backups().unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(
            remaining,
            vec![
                "backup_20240301_080004_000.json".to_string(),
                "backup_20240301_080003_000.json".to_string(),
            ]
        );
    }

    #[test]
    fn test_tampered_backup_is_rejected() {
        let temp = TempDir::new().unwrap();
        let manager = BackupManager::new(temp.path().join("backups"), 10).unwrap();
        let meta = manager.create_backup("{}", base_time()).unwrap();
        fs::write(manager.backup_path().join(&meta.id), "{\"system_balance\":1}").unwrap();
        let err = manager.read_backup(&meta.id).unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));
    }

    #[test]
    fn test_unknown_or_unsafe_names_are_not_found() {
        let temp = TempDir::new().unwrap();
        let manager = BackupManager::new(temp.path().join("backups"), 10).unwrap();
        for name in ["backup_missing.json", "../state.json", "backup_/../../x.json", "manifest.json"] {
            let err = manager.read_backup(name).unwrap_err();
            assert!(matches!(err, GameError::NotFound(_)), "{name}");
        }
    }
}
