//! Backup management for local snapshots taken before destructive operations.

use crate::error::{ErrorType, IntoResult, Res};
use crate::store::Bundle;
use crate::{utils, Config, Result};
use anyhow::Context;
use chrono::Local;
use std::path::{Path, PathBuf};

/// Prefix for the snapshot taken before a pull replaces local data.
pub const SYNC_DOWN_PRE: &str = "sync-down-pre";

/// Prefix for the snapshot taken before an import.
pub const PRE_IMPORT: &str = "pre-import";

/// Prefix for the snapshot taken before all data is cleared.
pub const PRE_CLEAR: &str = "pre-clear";

const EXTENSION: &str = "json";

/// Manages backup file creation and rotation.
///
/// The `Backup` struct is immutable and owns copies of the paths and settings it needs.
/// Create a new instance via `Config::backup()` or `Backup::new()`.
#[derive(Debug, Clone)]
pub struct Backup {
    backups_dir: PathBuf,
    backup_copies: u32,
}

impl Backup {
    /// Creates a new `Backup` instance from a `Config`.
    pub fn new(config: &Config) -> Self {
        Self::in_dir(config.backups(), config.backup_copies())
    }

    pub(crate) fn in_dir(backups_dir: impl Into<PathBuf>, backup_copies: u32) -> Self {
        Self {
            backups_dir: backups_dir.into(),
            backup_copies,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Saves a `Bundle` as a pretty-printed JSON backup file.
    ///
    /// The filename format is `{prefix}.YYYY-MM-DD-NNN.json` where NNN is a sequence number.
    /// Automatically rotates old backups, keeping only `backup_copies` files.
    ///
    /// Returns the path to the created backup file.
    pub async fn save_json(&self, prefix: &str, bundle: &Bundle) -> Result<PathBuf> {
        self.save_json_inner(prefix, bundle)
            .await
            .pub_result(ErrorType::Persistence)
    }

    async fn save_json_inner(&self, prefix: &str, bundle: &Bundle) -> Res<PathBuf> {
        let date = today();
        let seq = self.next_sequence_number(prefix, &date).await?;
        let filename = format!("{prefix}.{date}-{seq:03}.{EXTENSION}");
        let path = self.backups_dir.join(&filename);

        let json = bundle.to_json().context("Failed to serialize the backup")?;
        utils::write(&path, json).await?;

        self.rotate(prefix).await?;

        Ok(path)
    }

    /// Scans the backups directory for existing files with the given prefix and date,
    /// and returns the next sequence number.
    async fn next_sequence_number(&self, prefix: &str, date: &str) -> Res<u32> {
        let mut max_seq: u32 = 0;

        let mut dir = utils::read_dir(&self.backups_dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if let Some(seq) = parse_sequence_number(&name, prefix, date) {
                max_seq = max_seq.max(seq);
            }
        }

        Ok(max_seq + 1)
    }

    /// Rotates old backup files, keeping only `backup_copies` files with the given prefix.
    async fn rotate(&self, prefix: &str) -> Res<()> {
        let mut files: Vec<(PathBuf, String)> = Vec::new();

        let mut dir = utils::read_dir(&self.backups_dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_backup_file(&name, prefix) {
                files.push((entry.path(), name));
            }
        }

        // Filenames sort by date, then sequence number
        files.sort_by(|a, b| a.1.cmp(&b.1));

        let to_delete = files.len().saturating_sub(self.backup_copies as usize);
        for (path, _) in files.into_iter().take(to_delete) {
            utils::remove(&path).await?;
        }

        Ok(())
    }
}

/// Returns today's date in YYYY-MM-DD format.
fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Parses the sequence number from a backup filename, `{prefix}.{date}-{NNN}.json`.
fn parse_sequence_number(filename: &str, prefix: &str, date: &str) -> Option<u32> {
    filename
        .strip_prefix(&format!("{prefix}.{date}-"))?
        .strip_suffix(&format!(".{EXTENSION}"))?
        .parse()
        .ok()
}

/// Checks if a filename is a backup file with the given prefix.
fn is_backup_file(filename: &str, prefix: &str) -> bool {
    filename
        .strip_prefix(&format!("{prefix}."))
        .and_then(|rest| rest.strip_suffix(&format!(".{EXTENSION}")))
        // "pre-import" must not match "pre-import-extra.…"
        .is_some_and(|middle| middle.chars().next().is_some_and(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dataset;
    use crate::store::export_snapshot;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_parse_sequence_number() {
        assert_eq!(
            parse_sequence_number(
                "sync-down-pre.2025-12-14-001.json",
                "sync-down-pre",
                "2025-12-14"
            ),
            Some(1)
        );
        assert_eq!(
            parse_sequence_number("pre-import.2025-12-14-042.json", "pre-import", "2025-12-14"),
            Some(42)
        );
        // Wrong prefix
        assert_eq!(
            parse_sequence_number("pre-clear.2025-12-14-001.json", "pre-import", "2025-12-14"),
            None
        );
        // Wrong date
        assert_eq!(
            parse_sequence_number("pre-import.2025-12-13-001.json", "pre-import", "2025-12-14"),
            None
        );
        // Wrong extension
        assert_eq!(
            parse_sequence_number("pre-import.2025-12-14-001.csv", "pre-import", "2025-12-14"),
            None
        );
    }

    #[test]
    fn test_is_backup_file() {
        assert!(is_backup_file(
            "sync-down-pre.2025-12-14-001.json",
            "sync-down-pre"
        ));
        assert!(is_backup_file("pre-clear.2025-12-14-001.json", "pre-clear"));
        assert!(!is_backup_file(
            "sync-down-pre.2025-12-14-001.json",
            "pre-clear"
        ));
        assert!(!is_backup_file("pre-clear.2025-12-14-001.csv", "pre-clear"));
        assert!(!is_backup_file("pre-clear.notes.json", "pre-clear"));
    }

    #[tokio::test]
    async fn test_save_json_rotates() {
        let dir = TempDir::new().unwrap();
        let backup = Backup::in_dir(dir.path(), 2);
        let bundle = export_snapshot(&Dataset::with_defaults(), Utc::now());

        let first = backup.save_json(PRE_IMPORT, &bundle).await.unwrap();
        assert!(first.is_file());
        let saved = Bundle::from_json(&utils::read(&first).await.unwrap()).unwrap();
        assert_eq!(saved, bundle);

        backup.save_json(PRE_IMPORT, &bundle).await.unwrap();
        let third = backup.save_json(PRE_IMPORT, &bundle).await.unwrap();
        backup.save_json(PRE_CLEAR, &bundle).await.unwrap();

        assert!(!first.exists());
        assert!(third.to_string_lossy().ends_with("-003.json"));

        let mut names = Vec::new();
        let mut entries = utils::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names.iter().filter(|n| n.starts_with(PRE_IMPORT)).count(), 2);
        assert_eq!(names.iter().filter(|n| n.starts_with(PRE_CLEAR)).count(), 1);
    }
}
