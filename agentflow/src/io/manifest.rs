//! Per-project manifest at `<project>/.agentflow/project.toml`.
//!
//! Its presence marks a project as initialized for agentflow. The registry
//! snapshots it at registration time.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::types::ProjectMetadata;

pub const TOOL_DIR: &str = ".agentflow";
pub const MANIFEST_FILE: &str = "project.toml";
pub const AGENTS_DIR: &str = "agents";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectManifest {
    pub adapter: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
}

impl ProjectManifest {
    pub fn metadata(&self) -> ProjectMetadata {
        ProjectMetadata {
            description: self.description.clone(),
            version: self.version.clone(),
            features: self.features.clone(),
        }
    }
}

pub fn manifest_path(project_root: &Path) -> PathBuf {
    project_root.join(TOOL_DIR).join(MANIFEST_FILE)
}

pub fn agents_dir(project_root: &Path) -> PathBuf {
    project_root.join(TOOL_DIR).join(AGENTS_DIR)
}

/// Read the manifest; `Ok(None)` when the project is not initialized.
pub fn read_manifest(project_root: &Path) -> Result<Option<ProjectManifest>> {
    let path = manifest_path(project_root);
    if !path.is_file() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let manifest: ProjectManifest =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(manifest))
}

pub fn write_manifest(project_root: &Path, manifest: &ProjectManifest) -> Result<()> {
    let path = manifest_path(project_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let buf = toml::to_string_pretty(manifest).context("serialize manifest toml")?;
    fs::write(&path, buf).with_context(|| format!("write {}", path.display()))
}
