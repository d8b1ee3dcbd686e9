//! Parser for `git status --porcelain=v2 --branch`.

use serde::Serialize;

/// One changed path from porcelain output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    /// 2-letter XY code, `??` for untracked, `UU`-style for conflicts.
    pub code: String,
    pub path: String,
}

/// Structured view of a working copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepoStatus {
    /// `None` when HEAD is detached.
    pub branch: Option<String>,
    pub upstream: Option<String>,
    pub ahead: u32,
    pub behind: u32,
    pub entries: Vec<StatusEntry>,
    /// Number of unmerged (`u`) entries.
    pub conflicts: usize,
}

impl RepoStatus {
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_detached(&self) -> bool {
        self.branch.is_none()
    }

    /// Compact summary, e.g. `develop ↑1 ↓2 ✚3`.
    pub fn summary(&self) -> String {
        let mut parts = vec![self.branch.clone().unwrap_or_else(|| "HEAD".to_string())];
        if self.ahead > 0 {
            parts.push(format!("↑{}", self.ahead));
        }
        if self.behind > 0 {
            parts.push(format!("↓{}", self.behind));
        }
        if !self.entries.is_empty() {
            parts.push(format!("✚{}", self.entries.len()));
        }
        if self.upstream.is_none() {
            parts.push("(no upstream)".to_string());
        }
        parts.join(" ")
    }
}

pub fn parse_porcelain_v2(output: &str) -> Result<RepoStatus, String> {
    let mut status = RepoStatus::default();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix("# ") {
            parse_header(header, &mut status)?;
            continue;
        }
        let (kind, rest) = line
            .split_once(' ')
            .ok_or_else(|| format!("unexpected porcelain line: '{line}'"))?;
        match kind {
            "1" => status.entries.push(changed_entry(rest, 7, line)?),
            "2" => {
                let mut entry = changed_entry(rest, 8, line)?;
                if let Some((path, _orig)) = entry.path.split_once('\t') {
                    entry.path = path.to_string();
                }
                status.entries.push(entry);
            }
            "u" => {
                status.entries.push(changed_entry(rest, 9, line)?);
                status.conflicts += 1;
            }
            "?" => status.entries.push(StatusEntry {
                code: "??".to_string(),
                path: rest.to_string(),
            }),
            // Ignored files never count as changes.
            "!" => {}
            _ => return Err(format!("unexpected porcelain line: '{line}'")),
        }
    }
    Ok(status)
}

fn parse_header(header: &str, status: &mut RepoStatus) -> Result<(), String> {
    let Some((key, value)) = header.split_once(' ') else {
        return Ok(());
    };
    match key {
        "branch.head" => {
            status.branch = (value != "(detached)").then(|| value.to_string());
        }
        "branch.upstream" => status.upstream = Some(value.to_string()),
        "branch.ab" => {
            let mut parts = value.split_whitespace();
            status.ahead = parse_count(parts.next(), '+', header)?;
            status.behind = parse_count(parts.next(), '-', header)?;
        }
        _ => {}
    }
    Ok(())
}

fn parse_count(token: Option<&str>, sign: char, header: &str) -> Result<u32, String> {
    token
        .and_then(|t| t.strip_prefix(sign))
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| format!("malformed header: '# {header}'"))
}

/// Entries carry `fields` space-separated fields before the path.
fn changed_entry(rest: &str, fields: usize, line: &str) -> Result<StatusEntry, String> {
    let mut parts = rest.splitn(fields + 1, ' ');
    let code = parts
        .next()
        .ok_or_else(|| format!("unexpected porcelain line: '{line}'"))?;
    let path = parts
        .nth(fields - 1)
        .ok_or_else(|| format!("unexpected porcelain line: '{line}'"))?;
    Ok(StatusEntry {
        code: code.to_string(),
        path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_branch_headers_and_counts() {
        let out = "# branch.oid 1234\n# branch.head develop\n# branch.upstream origin/develop\n# branch.ab +1 -3\n";
        let status = parse_porcelain_v2(out).expect("parse");
        assert_eq!(status.branch.as_deref(), Some("develop"));
        assert_eq!(status.upstream.as_deref(), Some("origin/develop"));
        assert_eq!((status.ahead, status.behind), (1, 3));
        assert!(status.is_clean());
    }

    #[test]
    fn detached_head_has_no_branch() {
        let status = parse_porcelain_v2("# branch.oid abc\n# branch.head (detached)\n").unwrap();
        assert!(status.is_detached());
        assert_eq!(status.upstream, None);
    }

    #[test]
    fn parses_changed_renamed_untracked_and_conflicted_entries() {
        let out = concat!(
            "# branch.head feature/x\n",
            "1 .M N... 100644 100644 100644 aaa aaa src/main.rs\n",
            "2 R. N... 100644 100644 100644 aaa aaa R100 new name.rs\told.rs\n",
            "u UU N... 100644 100644 100644 100644 a b c conflict.txt\n",
            "? notes.md\n",
            "! target/\n",
        );
        let status = parse_porcelain_v2(out).expect("parse");
        let paths: Vec<&str> = status.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["src/main.rs", "new name.rs", "conflict.txt", "notes.md"]
        );
        assert_eq!(status.entries[0].code, ".M");
        assert_eq!(status.conflicts, 1);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_porcelain_v2("garbage line").is_err());
        assert!(parse_porcelain_v2("# branch.ab 1 2").is_err());
    }

    #[test]
    fn summary_is_compact() {
        let status = RepoStatus {
            branch: Some("main".to_string()),
            upstream: Some("origin/main".to_string()),
            ahead: 1,
            behind: 2,
            entries: vec![StatusEntry {
                code: "??".to_string(),
                path: "a".to_string(),
            }],
            conflicts: 0,
        };
        assert_eq!(status.summary(), "main ↑1 ↓2 ✚1");
    }
}
