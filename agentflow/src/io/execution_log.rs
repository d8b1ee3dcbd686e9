//! Per-project execution history in `logs/<projectId>.log`.
//!
//! Each file is a JSON array of [`ExecutionLogEntry`] holding at most
//! [`MAX_LOG_ENTRIES`] records, oldest first.

use anyhow::Result;
use tracing::{debug, warn};

use crate::core::types::ExecutionLogEntry;
use crate::io::store::WorkspaceStore;

pub const MAX_LOG_ENTRIES: usize = 1000;

/// Append an entry, dropping the oldest ones beyond the cap.
pub fn append(store: &WorkspaceStore, entry: &ExecutionLogEntry) -> Result<()> {
    let path = store.paths().log_path(&entry.project_id);
    store.update_json(&path, Vec::<ExecutionLogEntry>::new, |entries| {
        entries.push(entry.clone());
        if entries.len() > MAX_LOG_ENTRIES {
            let excess = entries.len() - MAX_LOG_ENTRIES;
            entries.drain(..excess);
        }
        Ok(())
    })?;
    debug!(project = %entry.project_id, agent = %entry.agent_id, "execution logged");
    Ok(())
}

/// Append without failing the caller; errors are only logged.
pub fn append_best_effort(store: &WorkspaceStore, entry: &ExecutionLogEntry) {
    if let Err(err) = append(store, entry) {
        warn!(
            project = %entry.project_id,
            err = %format!("{err:#}"),
            "failed to write execution log"
        );
    }
}

/// The `limit` most recent entries for a project, newest first.
pub fn recent(store: &WorkspaceStore, project_id: &str, limit: usize) -> Result<Vec<ExecutionLogEntry>> {
    let path = store.paths().log_path(project_id);
    let entries: Vec<ExecutionLogEntry> = store.read_json(&path)?.unwrap_or_default();
    Ok(entries.into_iter().rev().take(limit).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RunResult;
    use chrono::{Duration, TimeZone, Utc};

    fn entry(project: &str, n: i64) -> ExecutionLogEntry {
        ExecutionLogEntry {
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(n),
            project_id: project.to_string(),
            agent_id: "builder".to_string(),
            tool_id: format!("run-{n}"),
            exit_code: Some(0),
            duration_ms: 5,
            result: RunResult::Success,
            output: String::new(),
        }
    }

    #[test]
    fn recent_returns_newest_first() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = WorkspaceStore::open(temp.path()).expect("open");
        for n in 0..3 {
            append(&store, &entry("web", n)).expect("append");
        }
        append(&store, &entry("api", 9)).expect("append");

        let tools: Vec<String> = recent(&store, "web", 2)
            .expect("recent")
            .into_iter()
            .map(|e| e.tool_id)
            .collect();
        assert_eq!(tools, vec!["run-2", "run-1"]);
        assert_eq!(recent(&store, "api", 10).expect("recent").len(), 1);
        assert!(recent(&store, "none", 10).expect("recent").is_empty());
    }

    #[test]
    fn log_is_capped_to_most_recent_entries() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = WorkspaceStore::open(temp.path()).expect("open");
        let path = store.paths().log_path("web");
        let seeded: Vec<ExecutionLogEntry> =
            (0..MAX_LOG_ENTRIES as i64).map(|n| entry("web", n)).collect();
        store.write_json(&path, &seeded).expect("seed");

        append(&store, &entry("web", 5000)).expect("append");

        let all: Vec<ExecutionLogEntry> = store.read_json(&path).expect("read").expect("doc");
        assert_eq!(all.len(), MAX_LOG_ENTRIES);
        assert_eq!(all[0].tool_id, "run-1");
        assert_eq!(all.last().unwrap().tool_id, "run-5000");
    }

    #[test]
    fn best_effort_swallows_errors() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = WorkspaceStore::open(temp.path()).expect("open");
        std::fs::write(store.paths().log_path("web"), "not json").expect("write");
        append_best_effort(&store, &entry("web", 1));
        assert!(append(&store, &entry("web", 2)).is_err());
    }
}
