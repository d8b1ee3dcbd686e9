//! Workspace document storage.
//!
//! Every persisted document (config, registry, workflow, execution log) is a
//! JSON file under the workspace root. Reads take a shared advisory lock and
//! read-modify-write cycles take an exclusive one on a sibling `.lock` file,
//! so concurrent CLI invocations serialize per document. Writes go through a
//! temp file + rename.
//!
//! Locks are not re-entrant: never call `update_json` for a document while
//! already holding that document's lock.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};

/// Environment variable overriding the default workspace root.
pub const HOME_ENV: &str = "AGENTFLOW_HOME";

/// All canonical paths within a workspace root.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub projects_path: PathBuf,
    pub workflows_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_path: root.join("config.json"),
            projects_path: root.join("projects.json"),
            workflows_dir: root.join("workflows"),
            logs_dir: root.join("logs"),
            root,
        }
    }

    pub fn workflow_path(&self, workflow_id: &str) -> PathBuf {
        self.workflows_dir.join(format!("{workflow_id}.json"))
    }

    pub fn log_path(&self, project_id: &str) -> PathBuf {
        self.logs_dir.join(format!("{project_id}.log"))
    }

    /// Lock target serializing workflow activation within one project.
    pub fn project_lock_path(&self, project_id: &str) -> PathBuf {
        self.workflows_dir.join(format!(".project-{project_id}"))
    }
}

/// Default workspace root: `$AGENTFLOW_HOME`, else `~/.agentflow`.
pub fn default_root() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }
    let home = dirs::home_dir().context("cannot determine home directory")?;
    Ok(home.join(".agentflow"))
}

/// Service object owning the workspace root. Injected into every component.
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    paths: WorkspacePaths,
}

impl WorkspaceStore {
    /// Open (and create if needed) the workspace at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let paths = WorkspacePaths::new(root);
        for dir in [&paths.root, &paths.workflows_dir, &paths.logs_dir] {
            fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
        }
        debug!(root = %paths.root.display(), "workspace opened");
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    /// Read a document under a shared lock. Missing file yields `None`.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        let _lock = DocLock::shared(path)?;
        read_unlocked(path)
    }

    /// Overwrite a document under an exclusive lock.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let _lock = DocLock::exclusive(path)?;
        write_atomic_json(path, value)
    }

    /// Locked read-modify-write.
    ///
    /// `init` supplies the document when the file does not exist yet. The
    /// document is written back only when `f` succeeds.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn update_json<T, R, I, F>(&self, path: &Path, init: I, f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned,
        I: FnOnce() -> T,
        F: FnOnce(&mut T) -> Result<R>,
    {
        let _lock = DocLock::exclusive(path)?;
        let mut doc = match read_unlocked(path)? {
            Some(doc) => doc,
            None => init(),
        };
        let out = f(&mut doc)?;
        write_atomic_json(path, &doc)?;
        Ok(out)
    }

    /// Locked read-modify-write of a document that must already exist.
    ///
    /// Returns `None` without creating anything when the file is missing.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn update_existing_json<T, R, F>(&self, path: &Path, f: F) -> Result<Option<R>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T) -> Result<R>,
    {
        let _lock = DocLock::exclusive(path)?;
        let Some(mut doc) = read_unlocked(path)? else {
            return Ok(None);
        };
        let out = f(&mut doc)?;
        write_atomic_json(path, &doc)?;
        Ok(Some(out))
    }

    /// Write `value` only if no document exists at `path` yet.
    ///
    /// Returns `false` and leaves the existing file alone otherwise.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn create_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<bool> {
        let _lock = DocLock::exclusive(path)?;
        if path.exists() {
            return Ok(false);
        }
        write_atomic_json(path, value)?;
        Ok(true)
    }

    /// Hold an exclusive lock on `path` without touching the document.
    ///
    /// Used to serialize operations that read several documents before
    /// writing one. Take it before any per-document lock.
    pub fn lock(&self, path: &Path) -> Result<DocLock> {
        DocLock::exclusive(path)
    }

    /// List `*.json` documents in `dir`, sorted by file name.
    pub fn list_json_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
            let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Advisory lock held on `<doc>.lock` for the guard's lifetime.
#[must_use = "the lock is released when the guard is dropped"]
pub struct DocLock {
    file: File,
}

impl DocLock {
    fn exclusive(doc: &Path) -> Result<Self> {
        let file = open_lock_file(doc)?;
        file.lock_exclusive()
            .with_context(|| format!("lock {}", doc.display()))?;
        trace!(path = %doc.display(), "exclusive lock acquired");
        Ok(Self { file })
    }

    fn shared(doc: &Path) -> Result<Self> {
        let file = open_lock_file(doc)?;
        file.lock_shared()
            .with_context(|| format!("lock {}", doc.display()))?;
        Ok(Self { file })
    }
}

impl Drop for DocLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn lock_path(doc: &Path) -> PathBuf {
    let mut name = OsString::from(doc.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

fn open_lock_file(doc: &Path) -> Result<File> {
    if let Some(parent) = doc.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let path = lock_path(doc);
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))
}

fn read_unlocked<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(value))
}

/// Pretty JSON with trailing newline, written via temp file + rename.
fn write_atomic_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("document path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = OsString::from(path.as_os_str());
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    fs::write(&tmp_path, buf).with_context(|| format!("write temp {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
