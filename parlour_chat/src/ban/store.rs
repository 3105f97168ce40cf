use crate::identity::Identity;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::{
    fs::OpenOptions,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

/// A single ban. The field names on disk are kept as `Addr` and `ID` so that
/// existing ban files continue to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanEntry {
    #[serde(rename = "Addr")]
    pub address: String,
    #[serde(rename = "ID")]
    pub fingerprint: String,
}

impl BanEntry {
    /// A ban matches when either the address or the fingerprint matches.
    pub fn matches(&self, identity: &Identity) -> bool {
        self.address == identity.address || self.fingerprint == identity.fingerprint
    }
}

impl From<&Identity> for BanEntry {
    fn from(identity: &Identity) -> Self {
        Self {
            address: identity.address.clone(),
            fingerprint: identity.fingerprint.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BanStoreError {
    #[error("Couldn't access ban file {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("Malformed ban file {0}: {1}")]
    Malformed(PathBuf, serde_json::Error),
}

/// The ban list, mirrored to a JSON file.
///
/// Lookups, additions and saves are serialised through one lock, so a save
/// always writes a consistent list.
#[derive(Debug)]
pub struct BanStore {
    path: PathBuf,
    bans: Mutex<Vec<BanEntry>>,
}

impl BanStore {
    /// Load the ban list from `path`. A missing file gives an empty list;
    /// an unreadable or malformed one is an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, BanStoreError> {
        let path = path.into();
        let bans = Self::read_file(&path)?;
        tracing::debug!(path = %path.display(), count = bans.len(), "Loaded ban list");

        Ok(Self {
            path,
            bans: Mutex::new(bans),
        })
    }

    fn read_file(path: &Path) -> Result<Vec<BanEntry>, BanStoreError> {
        match std::fs::read(path) {
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|e| BanStoreError::Malformed(path.to_owned(), e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(BanStoreError::Io(path.to_owned(), e)),
        }
    }

    /// Check that [`save`](Self::save) will be able to write the file,
    /// without creating or modifying it.
    pub fn check_writable(&self) -> Result<(), BanStoreError> {
        let io_error = |e: io::Error| BanStoreError::Io(self.path.clone(), e);

        if self.path.exists() {
            return OpenOptions::new()
                .append(true)
                .open(&self.path)
                .map(drop)
                .map_err(io_error);
        }

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let metadata = std::fs::metadata(dir).map_err(io_error)?;
        if !metadata.is_dir() {
            return Err(io_error(io::Error::new(
                ErrorKind::Other,
                format!("{} is not a directory", dir.display()),
            )));
        }
        if metadata.permissions().readonly() {
            return Err(io_error(io::Error::new(
                ErrorKind::PermissionDenied,
                format!("{} is read-only", dir.display()),
            )));
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.bans.lock().iter().any(|ban| ban.matches(identity))
    }

    /// Append a ban unconditionally.
    pub fn add(&self, entry: BanEntry) {
        tracing::info!(address = %entry.address, fingerprint = %entry.fingerprint, "Adding ban");
        self.bans.lock().push(entry);
    }

    /// Append a ban for `identity` unless one already matches it. Returns
    /// whether anything was added.
    pub fn add_if_absent(&self, identity: &Identity) -> bool {
        let mut bans = self.bans.lock();
        if bans.iter().any(|ban| ban.matches(identity)) {
            return false;
        }
        tracing::info!(address = %identity.address, fingerprint = %identity.fingerprint, "Adding ban");
        bans.push(identity.into());
        true
    }

    pub fn entries(&self) -> Vec<BanEntry> {
        self.bans.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.bans.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bans.lock().is_empty()
    }

    /// Write the current list to disk, replacing the file's contents.
    pub fn save(&self) -> Result<(), BanStoreError> {
        let bans = self.bans.lock();

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"   ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        bans.serialize(&mut serializer)
            .map_err(|e| BanStoreError::Malformed(self.path.clone(), e))?;
        buf.push(b'\n');

        std::fs::write(&self.path, buf).map_err(|e| BanStoreError::Io(self.path.clone(), e))?;
        tracing::debug!(path = %self.path.display(), count = bans.len(), "Saved ban list");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn identity(address: &str, fingerprint: &str) -> Identity {
        Identity {
            address: address.to_owned(),
            fingerprint: fingerprint.to_owned(),
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = BanStore::load(dir.path().join("bans.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bans.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(BanStore::load(&path), Err(BanStoreError::Malformed(..))));
    }

    #[test]
    fn missing_directory_is_not_writable() {
        let dir = tempfile::tempdir().unwrap();
        let store = BanStore::load(dir.path().join("no_such_dir").join("bans.json")).unwrap();

        assert!(matches!(store.check_writable(), Err(BanStoreError::Io(..))));
    }

    #[test]
    fn writable_check_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bans.json");
        let store = BanStore::load(&path).unwrap();

        store.check_writable().unwrap();
        assert!(!path.exists());

        store.save().unwrap();
        store.check_writable().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]\n");
    }

    #[test]
    fn either_field_matches() {
        let dir = tempfile::tempdir().unwrap();
        let store = BanStore::load(dir.path().join("bans.json")).unwrap();
        store.add(BanEntry {
            address: "1.2.3.4".to_owned(),
            fingerprint: "abc".to_owned(),
        });

        assert!(store.contains(&identity("1.2.3.4", "zzz")));
        assert!(store.contains(&identity("9.9.9.9", "abc")));
        assert!(!store.contains(&identity("9.9.9.9", "zzz")));
    }

    #[test]
    fn add_if_absent_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = BanStore::load(dir.path().join("bans.json")).unwrap();
        let id = identity("1.2.3.4", "abc");

        assert!(store.add_if_absent(&id));
        assert!(!store.add_if_absent(&id));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn saved_file_uses_legacy_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bans.json");
        let store = BanStore::load(&path).unwrap();
        store.add(BanEntry {
            address: "1.2.3.4".to_owned(),
            fingerprint: "abc".to_owned(),
        });
        store.save().unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "[\n   {\n      \"Addr\": \"1.2.3.4\",\n      \"ID\": \"abc\"\n   }\n]\n"
        );

        let reloaded = BanStore::load(&path).unwrap();
        assert_eq!(reloaded.entries(), store.entries());
    }
}
