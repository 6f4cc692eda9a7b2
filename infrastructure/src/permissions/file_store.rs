//! File-backed permission store.
//!
//! The table is a small line-oriented file:
//!
//! ```text
//! key	decision
//! github/create_issue	allow_always
//! shell/run	reject_always
//! ```
//!
//! The file is created on the first `set`, rewritten atomically (temp file
//! in the same directory, then rename) on every change, and deleted once
//! it holds no decisions. Each change is applied to the file as it is on
//! disk at that moment, so several stores on one path (for example a
//! running `call` and a `permissions forget`) keep each other's keys.
//! Reads are served from memory, refreshed on `open` and on every change.

use conductor_application::{PermissionStore, PermissionStoreError};
use conductor_domain::{PermissionDecision, PermissionKey, PermissionRecord};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockWriteGuard};
use tracing::{debug, info};

const HEADER: &str = "key\tdecision";

type Table = BTreeMap<PermissionKey, PermissionDecision>;

/// Permission store persisted to a table file.
pub struct FilePermissionStore {
    path: PathBuf,
    entries: RwLock<Table>,
}

impl FilePermissionStore {
    /// Load the table at `path`. A missing file is an empty table.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PermissionStoreError> {
        let path = path.into();
        let entries = read_table(&path)?;
        debug!(path = %path.display(), entries = entries.len(), "Permission table loaded");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<'_, Table>, PermissionStoreError> {
        self.entries
            .write()
            .map_err(|_| PermissionStoreError::Poisoned)
    }

    /// Persist `entries`, deleting the file when empty.
    fn persist(&self, entries: &Table) -> Result<(), PermissionStoreError> {
        if entries.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => {
                    info!(path = %self.path.display(), "Permission table removed");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(io_error(&self.path, e)),
            };
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;

        let mut file = tempfile::NamedTempFile::new_in(&dir).map_err(|e| io_error(&dir, e))?;
        file.write_all(render_table(entries).as_bytes())
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| io_error(file.path(), e))?;
        file.persist(&self.path)
            .map_err(|e| io_error(&self.path, e.error))?;
        Ok(())
    }
}

impl PermissionStore for FilePermissionStore {
    fn get(&self, key: &PermissionKey) -> Result<Option<PermissionDecision>, PermissionStoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| PermissionStoreError::Poisoned)?;
        Ok(entries.get(key).copied())
    }

    fn set(
        &self,
        key: &PermissionKey,
        decision: PermissionDecision,
    ) -> Result<(), PermissionStoreError> {
        let encoded = key.encode();
        if encoded.contains(['\t', '\n', '\r']) {
            return Err(PermissionStoreError::Malformed {
                line: 0,
                message: format!("key {encoded:?} contains a tab or line break"),
            });
        }

        let mut entries = self.write_lock()?;
        let mut next = read_table(&self.path)?;
        if next.get(key) == Some(&decision) {
            *entries = next;
            return Ok(());
        }
        next.insert(key.clone(), decision);
        self.persist(&next)?;
        *entries = next;
        debug!(key = %key, decision = decision.as_str(), "Permission remembered");
        Ok(())
    }

    fn remove(&self, key: &PermissionKey) -> Result<bool, PermissionStoreError> {
        let mut entries = self.write_lock()?;
        let mut next = read_table(&self.path)?;
        if next.remove(key).is_none() {
            *entries = next;
            return Ok(false);
        }
        self.persist(&next)?;
        *entries = next;
        Ok(true)
    }

    fn clear(&self) -> Result<(), PermissionStoreError> {
        let mut entries = self.write_lock()?;
        let empty = Table::new();
        self.persist(&empty)?;
        *entries = empty;
        Ok(())
    }

    fn list(&self) -> Result<Vec<PermissionRecord>, PermissionStoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| PermissionStoreError::Poisoned)?;
        Ok(entries
            .iter()
            .map(|(key, decision)| PermissionRecord {
                server_name: key.server.clone(),
                tool_name: key.tool.clone(),
                decision: *decision,
            })
            .collect())
    }
}

fn io_error(path: &Path, e: std::io::Error) -> PermissionStoreError {
    PermissionStoreError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Current table on disk; a missing file is an empty table.
fn read_table(path: &Path) -> Result<Table, PermissionStoreError> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_table(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Table::new()),
        Err(e) => Err(io_error(path, e)),
    }
}

fn render_table(entries: &Table) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for (key, decision) in entries {
        out.push_str(&key.encode());
        out.push('\t');
        out.push_str(decision.as_str());
        out.push('\n');
    }
    out
}

fn parse_table(text: &str) -> Result<Table, PermissionStoreError> {
    let mut entries = Table::new();
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || (index == 0 && line == HEADER) {
            continue;
        }
        let malformed = |message: &str| PermissionStoreError::Malformed {
            line: line_no,
            message: message.to_string(),
        };
        let (key, decision) = line
            .split_once('\t')
            .ok_or_else(|| malformed("expected `key<TAB>decision`"))?;
        let key = PermissionKey::decode(key).ok_or_else(|| malformed("key is not server/tool"))?;
        let decision = PermissionDecision::parse(decision.trim())
            .ok_or_else(|| malformed("unknown decision"))?;
        entries.insert(key, decision);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(server: &str, tool: &str) -> PermissionKey {
        PermissionKey::new(server, tool)
    }

    #[test]
    fn test_open_missing_file_does_not_create_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permissions.tsv");
        let store = FilePermissionStore::open(&path).unwrap();

        assert_eq!(store.get(&key("A", "echo")).unwrap(), None);
        assert!(store.list().unwrap().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_set_creates_file_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("permissions.tsv");
        let store = FilePermissionStore::open(&path).unwrap();

        store
            .set(&key("github", "create_issue"), PermissionDecision::AllowAlways)
            .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "key\tdecision\ngithub/create_issue\tallow_always\n");
    }

    #[test]
    fn test_round_trip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permissions.tsv");
        {
            let store = FilePermissionStore::open(&path).unwrap();
            store.set(&key("A", "echo"), PermissionDecision::AllowAlways).unwrap();
            store.set(&key("B", "rm"), PermissionDecision::RejectAlways).unwrap();
            store.set(&key("A", "echo"), PermissionDecision::RejectAlways).unwrap();
        }

        let reopened = FilePermissionStore::open(&path).unwrap();
        assert_eq!(
            reopened.get(&key("A", "echo")).unwrap(),
            Some(PermissionDecision::RejectAlways)
        );
        assert_eq!(
            reopened.get(&key("B", "rm")).unwrap(),
            Some(PermissionDecision::RejectAlways)
        );
        assert_eq!(reopened.list().unwrap().len(), 2);
    }

    #[test]
    fn test_remove_last_entry_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permissions.tsv");
        let store = FilePermissionStore::open(&path).unwrap();
        store.set(&key("A", "echo"), PermissionDecision::AllowAlways).unwrap();
        store.set(&key("A", "shout"), PermissionDecision::AllowAlways).unwrap();

        assert!(store.remove(&key("A", "echo")).unwrap());
        assert!(path.exists());
        assert!(!store.remove(&key("A", "echo")).unwrap());
        assert!(store.remove(&key("A", "shout")).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_two_stores_on_one_path_keep_each_others_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permissions.tsv");
        let running = FilePermissionStore::open(&path).unwrap();
        let cli = FilePermissionStore::open(&path).unwrap();

        running.set(&key("A", "echo"), PermissionDecision::AllowAlways).unwrap();
        cli.set(&key("B", "rm"), PermissionDecision::RejectAlways).unwrap();
        running.set(&key("A", "shout"), PermissionDecision::AllowAlways).unwrap();
        assert!(cli.remove(&key("A", "echo")).unwrap());

        let on_disk = FilePermissionStore::open(&path).unwrap();
        assert_eq!(on_disk.get(&key("A", "echo")).unwrap(), None);
        assert_eq!(
            on_disk.get(&key("A", "shout")).unwrap(),
            Some(PermissionDecision::AllowAlways)
        );
        assert_eq!(
            on_disk.get(&key("B", "rm")).unwrap(),
            Some(PermissionDecision::RejectAlways)
        );
        assert_eq!(cli.list().unwrap().len(), 2);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permissions.tsv");
        let store = FilePermissionStore::open(&path).unwrap();
        store.set(&key("A", "echo"), PermissionDecision::AllowAlways).unwrap();

        store.clear().unwrap();
        assert!(!path.exists());
        store.clear().unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_table_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permissions.tsv");
        std::fs::write(&path, "key\tdecision\nA/echo\tallow_always\nA/shout maybe\n").unwrap();

        match FilePermissionStore::open(&path) {
            Err(PermissionStoreError::Malformed { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected malformed error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_unknown_decision_rejected() {
        assert!(matches!(
            parse_table("key\tdecision\nA/echo\tallow_once\n"),
            Err(PermissionStoreError::Malformed { line: 2, .. })
        ));
    }

    #[test]
    fn test_key_with_tab_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePermissionStore::open(dir.path().join("p.tsv")).unwrap();
        assert!(store
            .set(&key("A", "bad\tname"), PermissionDecision::AllowAlways)
            .is_err());
    }

    #[test]
    fn test_headerless_table_accepted() {
        let table = parse_table("A/echo\tallow_always\r\n\nB/x\treject_always").unwrap();
        assert_eq!(table.len(), 2);
    }
}
