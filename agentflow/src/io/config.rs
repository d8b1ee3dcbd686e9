//! Workspace configuration stored in `config.json`.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::GitFlowPolicy;
use crate::io::store::WorkspaceStore;

pub const CONFIG_VERSION: u32 = 1;

/// Workspace configuration (JSON).
///
/// Missing fields default to sensible values, so hand-edited files only need
/// the keys they change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceConfig {
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_project_id: Option<String>,
    pub settings: Settings,
    pub git_flow: GitFlowPolicy,
    /// Named pre-push check commands (`name -> argv`).
    pub checks: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub parallel_execution: bool,
    pub max_parallel_jobs: usize,
    /// Wall-clock limit for each pre-push check command.
    pub check_timeout_secs: u64,
    /// Truncate captured agent/check output beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            parallel_execution: true,
            max_parallel_jobs: 4,
            check_timeout_secs: 10 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            current_project_id: None,
            settings: Settings::default(),
            git_flow: GitFlowPolicy::default(),
            checks: BTreeMap::new(),
        }
    }
}

impl WorkspaceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.settings.max_parallel_jobs == 0 {
            return Err(anyhow!("settings.maxParallelJobs must be > 0"));
        }
        if self.settings.check_timeout_secs == 0 {
            return Err(anyhow!("settings.checkTimeoutSecs must be > 0"));
        }
        if self.settings.output_limit_bytes == 0 {
            return Err(anyhow!("settings.outputLimitBytes must be > 0"));
        }
        for (name, argv) in &self.checks {
            if argv.is_empty() || argv[0].trim().is_empty() {
                return Err(anyhow!("checks.{name} must be a non-empty array"));
            }
        }
        let policy = &self.git_flow;
        if policy.production_branch.trim().is_empty() || policy.development_branch.trim().is_empty()
        {
            return Err(anyhow!("gitFlow branch names must not be empty"));
        }
        Ok(())
    }
}

/// Load the config, writing defaults on first run.
pub fn load_config(store: &WorkspaceStore) -> Result<WorkspaceConfig> {
    let path = &store.paths().config_path;
    let cfg = match store.read_json::<WorkspaceConfig>(path)? {
        Some(cfg) => cfg,
        None => {
            let cfg = WorkspaceConfig::default();
            store.update_json(path, WorkspaceConfig::default, |_| Ok(()))?;
            cfg
        }
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Locked read-modify-write of the config; rejects results that fail validation.
pub fn update_config<R, F>(store: &WorkspaceStore, f: F) -> Result<R>
where
    F: FnOnce(&mut WorkspaceConfig) -> Result<R>,
{
    store.update_json(
        &store.paths().config_path,
        WorkspaceConfig::default,
        |cfg| {
            let out = f(cfg)?;
            cfg.validate()?;
            Ok(out)
        },
    )
}
