//! Deterministic identifier helpers.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

static WORKFLOW_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^wf-[0-9]{14}-[0-9a-f]{4}$").expect("valid workflow id regex")
});

/// Lowercase ASCII slug; runs of other characters collapse to `-`.
pub fn slugify(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let slug = NON_SLUG.replace_all(&lower, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "project".to_string()
    } else {
        slug.to_string()
    }
}

/// First of `base`, `base-2`, `base-3`, ... not rejected by `taken`.
pub fn unique_slug<F: Fn(&str) -> bool>(base: &str, taken: F) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut suffix = 2u32;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// `wf-<YYYYMMDDHHMMSS>-<4 hex>`.
pub fn workflow_id(now: DateTime<Utc>, suffix: u16) -> String {
    format!("wf-{}-{suffix:04x}", now.format("%Y%m%d%H%M%S"))
}

/// Whether `id` has the shape [`workflow_id`] produces.
pub fn is_workflow_id(id: &str) -> bool {
    WORKFLOW_ID.is_match(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("My Web App"), "my-web-app");
        assert_eq!(slugify("  api__server!! "), "api-server");
        assert_eq!(slugify("***"), "project");
    }

    #[test]
    fn unique_slug_appends_counter() {
        let taken = ["app", "app-2"];
        assert_eq!(unique_slug("app", |s| taken.contains(&s)), "app-3");
        assert_eq!(unique_slug("web", |s| taken.contains(&s)), "web");
    }

    #[test]
    fn workflow_id_is_stamped() {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(workflow_id(now, 0xab), "wf-20260102030405-00ab");
        assert!(is_workflow_id(&workflow_id(now, 0xffff)));
    }

    #[test]
    fn workflow_id_shape_rejects_paths() {
        for bad in ["../config", "wf-20260102030405-00ab/..", "wf-1-00ab", "", "WF-20260102030405-00AB"] {
            assert!(!is_workflow_id(bad), "{bad}");
        }
    }
}
