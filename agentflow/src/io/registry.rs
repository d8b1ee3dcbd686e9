//! Project registry stored in `projects.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::ids::{slugify, unique_slug};
use crate::core::types::{GitFlowOverride, GitFlowPolicy, Project};
use crate::error::AgentflowError;
use crate::io::config::{load_config, update_config};
use crate::io::manifest::read_manifest;
use crate::io::store::WorkspaceStore;

pub const REGISTRY_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistryDoc {
    pub version: u32,
    pub projects: Vec<Project>,
    pub updated: DateTime<Utc>,
}

impl Default for RegistryDoc {
    fn default() -> Self {
        Self {
            version: REGISTRY_VERSION,
            projects: Vec::new(),
            updated: Utc::now(),
        }
    }
}

impl RegistryDoc {
    /// Lookup by id, then name, then canonical path.
    fn find(&self, selector: &str) -> Option<usize> {
        if let Some(i) = self.projects.iter().position(|p| p.id == selector) {
            return Some(i);
        }
        if let Some(i) = self.projects.iter().position(|p| p.name == selector) {
            return Some(i);
        }
        let path = canonical_or_raw(Path::new(selector));
        self.projects.iter().position(|p| p.path == path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    pub name: Option<String>,
    pub force: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub enabled: Option<bool>,
    pub adapter: Option<String>,
}

/// Registry operations over the workspace's `projects.json`.
pub struct Registry<'a> {
    store: &'a WorkspaceStore,
}

impl<'a> Registry<'a> {
    pub fn new(store: &'a WorkspaceStore) -> Self {
        Self { store }
    }

    fn load(&self) -> Result<RegistryDoc> {
        Ok(self
            .store
            .read_json(&self.store.paths().projects_path)?
            .unwrap_or_default())
    }

    fn update<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut RegistryDoc) -> Result<R>,
    {
        self.store
            .update_json(&self.store.paths().projects_path, RegistryDoc::default, |doc| {
                let out = f(doc)?;
                doc.updated = Utc::now();
                Ok(out)
            })
    }

    /// Register the project at `path`, snapshotting its manifest.
    #[instrument(skip_all, fields(path = %path.display(), force = options.force))]
    pub fn register(&self, path: &Path, options: &RegisterOptions) -> Result<Project> {
        let canonical = path
            .canonicalize()
            .with_context(|| format!("resolve project path {}", path.display()))?;
        let manifest = read_manifest(&canonical)?.ok_or_else(|| AgentflowError::NotInitialized {
            path: canonical.clone(),
        })?;

        let name = options.name.clone().unwrap_or_else(|| {
            canonical
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "project".to_string())
        });

        let project = self.update(|doc| {
            let existing = doc.projects.iter().position(|p| p.path == canonical);
            if existing.is_some() && !options.force {
                return Err(AgentflowError::AlreadyRegistered {
                    path: canonical.clone(),
                }
                .into());
            }
            let id = match existing {
                Some(i) => doc.projects[i].id.clone(),
                None => unique_slug(&slugify(&name), |candidate| {
                    doc.projects.iter().any(|p| p.id == candidate)
                }),
            };
            let project = Project {
                id,
                name: name.clone(),
                path: canonical.clone(),
                adapter: manifest.adapter.clone(),
                enabled: existing.is_none_or(|i| doc.projects[i].enabled),
                metadata: manifest.metadata(),
                git_flow: existing.and_then(|i| doc.projects[i].git_flow.clone()),
                registered_at: Utc::now(),
            };
            match existing {
                Some(i) => doc.projects[i] = project.clone(),
                None => doc.projects.push(project.clone()),
            }
            Ok(project)
        })?;
        info!(id = %project.id, adapter = %project.adapter, "project registered");
        Ok(project)
    }

    /// Remove a project from the registry. The project directory is untouched.
    #[instrument(skip_all, fields(selector))]
    pub fn unregister(&self, selector: &str) -> Result<Project> {
        let removed = self.update(|doc| {
            let index = doc
                .find(selector)
                .ok_or_else(|| AgentflowError::ProjectNotFound(selector.to_string()))?;
            Ok(doc.projects.remove(index))
        })?;
        update_config(self.store, |cfg| {
            if cfg.current_project_id.as_deref() == Some(removed.id.as_str()) {
                cfg.current_project_id = None;
            }
            Ok(())
        })?;
        info!(id = %removed.id, "project unregistered");
        Ok(removed)
    }

    pub fn get(&self, selector: &str) -> Result<Option<Project>> {
        let doc = self.load()?;
        Ok(doc.find(selector).map(|i| doc.projects[i].clone()))
    }

    /// Like [`Registry::get`] but a missing project is an error.
    pub fn require(&self, selector: &str) -> Result<Project> {
        self.get(selector)?
            .ok_or_else(|| AgentflowError::ProjectNotFound(selector.to_string()).into())
    }

    /// Registered projects in registration order.
    pub fn list(&self, filter: &ListFilter) -> Result<Vec<Project>> {
        let doc = self.load()?;
        Ok(doc
            .projects
            .into_iter()
            .filter(|p| filter.enabled.is_none_or(|e| p.enabled == e))
            .filter(|p| filter.adapter.as_ref().is_none_or(|a| &p.adapter == a))
            .collect())
    }

    pub fn set_enabled(&self, selector: &str, enabled: bool) -> Result<Project> {
        self.update(|doc| {
            let index = doc
                .find(selector)
                .ok_or_else(|| AgentflowError::ProjectNotFound(selector.to_string()))?;
            doc.projects[index].enabled = enabled;
            Ok(doc.projects[index].clone())
        })
    }

    pub fn set_git_flow_override(
        &self,
        selector: &str,
        over: Option<GitFlowOverride>,
    ) -> Result<Project> {
        self.update(|doc| {
            let index = doc
                .find(selector)
                .ok_or_else(|| AgentflowError::ProjectNotFound(selector.to_string()))?;
            doc.projects[index].git_flow = over;
            Ok(doc.projects[index].clone())
        })
    }

    pub fn set_current(&self, selector: &str) -> Result<Project> {
        let project = self.require(selector)?;
        update_config(self.store, |cfg| {
            cfg.current_project_id = Some(project.id.clone());
            Ok(())
        })?;
        debug!(id = %project.id, "current project set");
        Ok(project)
    }

    pub fn get_current(&self) -> Result<Option<Project>> {
        let cfg = load_config(self.store)?;
        match cfg.current_project_id {
            Some(id) => self.get(&id),
            None => Ok(None),
        }
    }

    /// Resolve a command's target project.
    ///
    /// Order: explicit selector, current project, then the registered project
    /// whose path contains `cwd` (deepest match wins).
    pub fn resolve(&self, selector: Option<&str>, cwd: &Path) -> Result<Project> {
        if let Some(selector) = selector {
            return self.require(selector);
        }
        if let Some(current) = self.get_current()? {
            return Ok(current);
        }
        let cwd = canonical_or_raw(cwd);
        let doc = self.load()?;
        doc.projects
            .into_iter()
            .filter(|p| cwd.starts_with(&p.path))
            .max_by_key(|p| p.path.components().count())
            .ok_or_else(|| {
                AgentflowError::ProjectNotFound(format!(
                    "no project selected and {} is not inside a registered project",
                    cwd.display()
                ))
                .into()
            })
    }

    /// Global policy merged with the project's override.
    pub fn effective_policy(&self, project: &Project) -> Result<GitFlowPolicy> {
        let cfg = load_config(self.store)?;
        Ok(cfg.git_flow.merged(project.git_flow.as_ref()))
    }
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
