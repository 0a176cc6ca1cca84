//! JSON Document Store
//!
//! Flat-file persistence for schemes, reports, ratings, and replays. Writes
//! go through a temp file and an atomic rename so a crash never leaves a
//! half-written document behind.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

/// Store failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Document failed to (de)serialize.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Directory layout under the store root.
#[derive(Clone, Debug)]
pub struct Dirs {
    /// Store root.
    pub root: PathBuf,
    /// Published map schemes.
    pub schemes: PathBuf,
    /// Player reports.
    pub reports: PathBuf,
    /// Ratings database.
    pub ratings: PathBuf,
    /// Completed match replays.
    pub replays: PathBuf,
}

/// The document store. Cheap to clone behind an `Arc`.
#[derive(Debug)]
pub struct Store {
    /// Resolved directory layout.
    pub dirs: Dirs,
}

impl Store {
    /// Open a store at `root`, creating the directory tree.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Store, StoreError> {
        let root = root.into();
        let dirs = Dirs {
            schemes: root.join("schemes"),
            reports: root.join("reports"),
            ratings: root.join("ratings"),
            replays: root.join("replays"),
            root,
        };
        for dir in [&dirs.root, &dirs.schemes, &dirs.reports, &dirs.ratings, &dirs.replays] {
            fs::create_dir_all(dir).await?;
        }
        Ok(Store { dirs })
    }

    /// Write a document atomically: temp file, then rename.
    pub async fn write_json<T: Serialize>(&self, path: &Path, doc: &T) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(doc)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, text).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Read and parse a document.
    pub async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, StoreError> {
        let raw = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// List the `.json` file names in a directory.
    pub async fn list_json(&self, dir: &Path) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// True when a document exists at `path`.
    pub async fn exists(&self, path: &Path) -> bool {
        fs::metadata(path).await.is_ok()
    }
}
