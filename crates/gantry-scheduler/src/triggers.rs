//! Trigger matching and evaluation.

use gantry_core::pipeline::TriggerConfig;
use gantry_core::trigger::{TriggerEvent, TriggerKind};
use tracing::debug;

/// Decides whether an event starts a run.
pub struct TriggerMatcher;

impl TriggerMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Check if a pipeline with the given triggers should run for an event.
    pub fn matches(&self, triggers: &[TriggerConfig], event: &TriggerEvent) -> bool {
        if event.branch.trim().is_empty() {
            debug!(kind = %event.kind, "Ignoring event without a branch");
            return false;
        }

        if triggers.is_empty() {
            // Default: trigger on push to any branch
            return event.kind == TriggerKind::Push;
        }

        triggers
            .iter()
            .any(|trigger| trigger.kind == event.kind && self.branch_matches(&trigger.branches, &event.branch))
    }

    /// Evaluate an unparsed event. Unknown kinds and empty branches never
    /// start a run.
    pub fn evaluate_raw(&self, triggers: &[TriggerConfig], kind: &str, branch: &str) -> bool {
        match kind.parse::<TriggerKind>() {
            Ok(TriggerKind::Push) => self.matches(triggers, &TriggerEvent::push(branch)),
            Ok(TriggerKind::PullRequest) => {
                self.matches(triggers, &TriggerEvent::pull_request("", branch))
            }
            Err(reason) => {
                debug!(%reason, "Ignoring unrecognized event");
                false
            }
        }
    }

    fn branch_matches(&self, patterns: &[String], branch: &str) -> bool {
        if patterns.is_empty() {
            return true; // Match all branches if no patterns specified
        }
        patterns.iter().any(|p| self.glob_match(p, branch))
    }

    fn glob_match(&self, pattern: &str, text: &str) -> bool {
        if pattern == "*" || pattern == "**" {
            return true;
        }
        if let Some(prefix) = pattern.strip_suffix("/**") {
            return text.starts_with(&format!("{}/", prefix));
        }
        if let Some(prefix) = pattern.strip_suffix("/*") {
            let prefix_slash = format!("{}/", prefix);
            if let Some(rest) = text.strip_prefix(&prefix_slash) {
                return !rest.is_empty() && !rest.contains('/');
            }
            return false;
        }
        if pattern.contains('*') {
            let parts: Vec<&str> = pattern.split('*').collect();
            if parts.len() == 2 {
                return text.len() >= parts[0].len() + parts[1].len()
                    && text.starts_with(parts[0])
                    && text.ends_with(parts[1]);
            }
        }
        pattern == text
    }
}

impl Default for TriggerMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watch(kind: TriggerKind, branches: &[&str]) -> TriggerConfig {
        TriggerConfig {
            kind,
            branches: branches.iter().map(|b| b.to_string()).collect(),
        }
    }

    #[test]
    fn test_branch_match_exact() {
        let matcher = TriggerMatcher::new();
        assert!(matcher.branch_matches(&["main".to_string()], "main"));
        assert!(!matcher.branch_matches(&["main".to_string()], "develop"));
    }

    #[test]
    fn test_branch_match_glob() {
        let matcher = TriggerMatcher::new();
        assert!(matcher.branch_matches(&["feature/*".to_string()], "feature/foo"));
        assert!(!matcher.branch_matches(&["feature/*".to_string()], "feature/foo/bar"));
        assert!(matcher.branch_matches(&["release/**".to_string()], "release/v1/hotfix"));
        assert!(!matcher.branch_matches(&["release/**".to_string()], "releases"));
        assert!(matcher.branch_matches(&["v*-lts".to_string()], "v2-lts"));
    }

    #[test]
    fn test_empty_patterns_match_all() {
        let matcher = TriggerMatcher::new();
        assert!(matcher.branch_matches(&[], "any-branch"));
    }

    #[test]
    fn test_push_and_pull_request_watch_lists() {
        let matcher = TriggerMatcher::new();
        let triggers = vec![
            watch(TriggerKind::Push, &["master"]),
            watch(TriggerKind::PullRequest, &["master"]),
        ];

        assert!(matcher.matches(&triggers, &TriggerEvent::push("master")));
        assert!(!matcher.matches(&triggers, &TriggerEvent::push("feature/x")));
        assert!(matcher.matches(&triggers, &TriggerEvent::pull_request("feature/x", "master")));
        assert!(!matcher.matches(&triggers, &TriggerEvent::pull_request("master", "gh-pages")));
    }

    #[test]
    fn test_kind_must_be_watched() {
        let matcher = TriggerMatcher::new();
        let triggers = vec![watch(TriggerKind::Push, &[])];

        assert!(matcher.matches(&triggers, &TriggerEvent::push("anything")));
        assert!(!matcher.matches(&triggers, &TriggerEvent::pull_request("a", "anything")));
    }

    #[test]
    fn test_no_triggers_defaults_to_push() {
        let matcher = TriggerMatcher::new();
        assert!(matcher.matches(&[], &TriggerEvent::push("dev")));
        assert!(!matcher.matches(&[], &TriggerEvent::pull_request("dev", "main")));
    }

    #[test]
    fn test_malformed_events_do_not_run() {
        let matcher = TriggerMatcher::new();
        let triggers = vec![watch(TriggerKind::Push, &[])];

        assert!(matcher.evaluate_raw(&triggers, "push", "main"));
        assert!(!matcher.evaluate_raw(&triggers, "tag", "v1.0"));
        assert!(!matcher.evaluate_raw(&triggers, "", "main"));
        assert!(!matcher.evaluate_raw(&triggers, "push", ""));
        assert!(!matcher.evaluate_raw(&triggers, "push", "   "));
    }
}
