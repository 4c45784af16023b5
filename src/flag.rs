//! Durable named run flags — cross-process boolean signals.
//!
//! A flag is the presence or absence of a marker file under the store
//! root. An in-memory flag cannot be trusted across the "task object
//! created" / "task body running" boundary, so a launcher polls `is_set`
//! until the supervised loop touches its own marker. Deleting the marker
//! asks the loop to stop; absence means both "not started" and "asked to
//! stop".

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::FlagError;

/// File-backed store of named run flags.
#[derive(Debug, Clone)]
pub struct FlagStore {
    root: PathBuf,
}

impl FlagStore {
    /// Create a store rooted at the OS temp directory.
    pub fn new() -> Self {
        Self {
            root: std::env::temp_dir(),
        }
    }

    /// Create a store rooted at a specific directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn marker(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.flag"))
    }

    /// The directory markers are written under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Raise the named flag. Idempotent: setting an already-set flag
    /// succeeds without changing anything observable.
    pub fn set(&self, name: &str) -> Result<(), FlagError> {
        fs::write(self.marker(name), b"")?;
        Ok(())
    }

    /// Lower the named flag. Fails with `NotFound` if it was never set or
    /// has already been cleared.
    pub fn clear(&self, name: &str) -> Result<(), FlagError> {
        fs::remove_file(self.marker(name)).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                FlagError::NotFound {
                    name: name.to_string(),
                }
            } else {
                FlagError::Io(e)
            }
        })
    }

    /// Query the named flag without side effects. Never fails: an
    /// unreadable store reads as "not set".
    pub fn is_set(&self, name: &str) -> bool {
        self.marker(name).exists()
    }
}

impl Default for FlagStore {
    fn default() -> Self {
        Self::new()
    }
}
