//! Deterministic branch classification under a [`GitFlowPolicy`].

use serde::Serialize;

use crate::core::types::GitFlowPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKind {
    Protected,
    Feature,
    Release,
    Hotfix,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchClass {
    pub kind: BranchKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
}

/// Classify `name`.
///
/// - Exact production/development match is `Protected`.
/// - Otherwise the first matching prefix wins, checked feature, release, hotfix.
/// - Anything else is `Unknown`.
pub fn classify_branch(name: &str, policy: &GitFlowPolicy) -> BranchClass {
    if name == policy.production_branch || name == policy.development_branch {
        return BranchClass {
            kind: BranchKind::Protected,
            short_name: None,
        };
    }
    let prefixed = [
        (BranchKind::Feature, policy.feature_prefix.as_str()),
        (BranchKind::Release, policy.release_prefix.as_str()),
        (BranchKind::Hotfix, policy.hotfix_prefix.as_str()),
    ];
    for (kind, prefix) in prefixed {
        if prefix.is_empty() {
            continue;
        }
        if let Some(short) = name.strip_prefix(prefix) {
            return BranchClass {
                kind,
                short_name: Some(short.to_string()),
            };
        }
    }
    BranchClass {
        kind: BranchKind::Unknown,
        short_name: None,
    }
}

/// Branch family that can be started from a base branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Feature,
    Release,
    Hotfix,
}

impl FlowKind {
    pub fn branch_name(self, name: &str, policy: &GitFlowPolicy) -> String {
        let prefix = match self {
            Self::Feature => &policy.feature_prefix,
            Self::Release => &policy.release_prefix,
            Self::Hotfix => &policy.hotfix_prefix,
        };
        format!("{prefix}{name}")
    }

    /// Hotfixes branch from production; everything else from development.
    pub fn base_branch(self, policy: &GitFlowPolicy) -> &str {
        match self {
            Self::Hotfix => &policy.production_branch,
            Self::Feature | Self::Release => &policy.development_branch,
        }
    }
}

/// Reject names git would refuse or that would nest oddly under a prefix.
pub fn validate_flow_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("branch name must not be empty".to_string());
    }
    if name.starts_with('-') || name.starts_with('/') || name.ends_with('/') {
        return Err(format!("invalid branch name '{name}'"));
    }
    if name.contains("..")
        || name.ends_with(".lock")
        || name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
    {
        return Err(format!("invalid branch name '{name}'"));
    }
    Ok(())
}
