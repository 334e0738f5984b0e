use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use eyre::Context;

/// Document store the ledgers are read from and written to.
///
/// Paths are relative to the ledger root. Reads of missing documents return
/// `None` rather than failing, writes create parent directories as needed.
pub trait Storage: Send + Sync + std::fmt::Debug {
    fn read(&self, path: &Path) -> eyre::Result<Option<String>>;

    fn write(&self, path: &Path, contents: &str) -> eyre::Result<()>;
}

#[derive(Debug)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Storage for FsStorage {
    fn read(&self, path: &Path) -> eyre::Result<Option<String>> {
        let path = self.root.join(path);

        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err)
                .with_context(|| format!("Reading from {}", path.display())),
        }
    }

    fn write(&self, path: &Path, contents: &str) -> eyre::Result<()> {
        let path = self.root.join(path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Creating {}", parent.display()))?;
        }

        std::fs::write(&path, contents)
            .with_context(|| format!("Writing to {}", path.display()))
    }
}

/// In-memory storage. Used by tests and by fork runs, where deployment
/// records must resolve but nothing may touch the on-disk ledgers.
#[derive(Debug, Default)]
pub struct MemStorage {
    documents: Mutex<BTreeMap<PathBuf, String>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the listed documents out of another storage, skipping the ones
    /// that do not exist there.
    pub fn seeded(
        source: &dyn Storage,
        paths: impl IntoIterator<Item = PathBuf>,
    ) -> eyre::Result<Self> {
        let storage = Self::new();

        for path in paths {
            if let Some(contents) = source.read(&path)? {
                storage.insert(path, contents);
            }
        }

        Ok(storage)
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.documents
            .lock()
            .expect("storage lock poisoned")
            .insert(path.into(), contents.into());
    }
}

impl Storage for MemStorage {
    fn read(&self, path: &Path) -> eyre::Result<Option<String>> {
        let documents = self.documents.lock().expect("storage lock poisoned");

        Ok(documents.get(path).cloned())
    }

    fn write(&self, path: &Path, contents: &str) -> eyre::Result<()> {
        self.insert(path, contents);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_round_trip() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = FsStorage::new(dir.path());

        let path = Path::new("addresses/goerli.json");

        assert_eq!(storage.read(path)?, None);

        storage.write(path, "{}")?;

        assert_eq!(storage.read(path)?.as_deref(), Some("{}"));

        Ok(())
    }

    #[test]
    fn mem_seeding_skips_missing_documents() -> eyre::Result<()> {
        let source = MemStorage::new();
        source.insert("addresses/goerli.json", "{}");

        let seeded = MemStorage::seeded(
            &source,
            [
                PathBuf::from("addresses/goerli.json"),
                PathBuf::from("addresses/mainnet.json"),
            ],
        )?;

        assert_eq!(
            seeded.read(Path::new("addresses/goerli.json"))?.as_deref(),
            Some("{}")
        );
        assert_eq!(seeded.read(Path::new("addresses/mainnet.json"))?, None);

        Ok(())
    }
}
