//! Ranking for completion lookups.
//!
//! Both functions work on records already fetched from the store.

use crate::filter::Filter;
use crate::storage::Command;

/// Most recent commands starting with `prefix`, newest first.
///
/// Ordering is `timestamp` desc with `id` desc as tie-break. Identical texts are
/// kept: this is recency ranking, not a distinct set.
pub fn rank_recent(records: &[Command], prefix: &str, limit: Option<usize>, filter: &Filter) -> Vec<String> {
    if limit == Some(0) {
        return Vec::new();
    }
    let mut hits: Vec<&Command> = records
        .iter()
        .filter(|c| c.command_text.starts_with(prefix) && filter.matches(c))
        .collect();
    hits.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
    hits.into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|c| c.command_text.clone())
        .collect()
}

/// Commands that historically followed `prev_cmd`, latest anchor first.
///
/// The history is treated as one global chronological sequence ordered by
/// `(timestamp, id)`. Each occurrence of the anchor yields the record right
/// after it, if any. Only the text part of `filter` applies.
pub fn predict_after(
    records: &[Command],
    prefix: &str,
    prev_cmd: &str,
    limit: Option<usize>,
    filter: &Filter,
) -> Vec<String> {
    if prev_cmd.is_empty() || limit == Some(0) {
        return Vec::new();
    }
    let mut chronological: Vec<&Command> = records.iter().collect();
    chronological.sort_by_key(|c| (c.timestamp, c.id));

    let limit = limit.unwrap_or(usize::MAX);
    let mut followers = Vec::new();
    for pair in chronological.windows(2).rev() {
        if followers.len() >= limit {
            break;
        }
        let (anchor, candidate) = (pair[0], pair[1]);
        if anchor.command_text != prev_cmd {
            continue;
        }
        let text = &candidate.command_text;
        if text.starts_with(prefix) && filter.matches_text(text) {
            followers.push(text.clone());
        }
    }
    followers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(id: i64, timestamp: i64, text: &str) -> Command {
        Command {
            id,
            command_text: text.to_string(),
            working_dir: "/work".to_string(),
            exit_status: 0,
            timestamp,
            duration: None,
            git_branch: None,
            git_repo: None,
            source_app: Some("zsh".to_string()),
            source_pid: Some(100),
            source_active: Some(true),
        }
    }

    fn git_session() -> Vec<Command> {
        vec![
            at(1, 100, "git commit"),
            at(2, 101, "git push origin a"),
            at(3, 200, "ls"),
            at(4, 300, "git commit"),
            at(5, 301, "git push origin b"),
            at(6, 400, "git commit"),
            at(7, 401, "git push origin c"),
            at(8, 500, "make"),
        ]
    }

    #[test]
    fn recent_orders_by_timestamp_then_id() {
        let records = vec![at(1, 10, "a1"), at(2, 30, "a2"), at(3, 30, "a3"), at(4, 20, "b")];
        let all = rank_recent(&records, "", None, &Filter::new());
        assert_eq!(all, vec!["a3", "a2", "b", "a1"]);
        assert_eq!(rank_recent(&records, "a", Some(2), &Filter::new()), vec!["a3", "a2"]);
        assert!(rank_recent(&records, "a", Some(0), &Filter::new()).is_empty());
    }

    #[test]
    fn recent_keeps_duplicates_and_case() {
        let records = vec![at(1, 1, "ls -la"), at(2, 2, "ls -la"), at(3, 3, "LS")];
        assert_eq!(rank_recent(&records, "ls", None, &Filter::new()), vec!["ls -la", "ls -la"]);
    }

    #[test]
    fn follows_most_recent_anchor_first() {
        let got = predict_after(&git_session(), "git push", "git commit", Some(2), &Filter::new());
        assert_eq!(got, vec!["git push origin c", "git push origin b"]);
    }

    #[test]
    fn every_result_satisfies_prefix() {
        let records = git_session();
        for prefix in ["", "git", "git push origin b", "l", "zzz"] {
            for text in predict_after(&records, prefix, "git commit", None, &Filter::new()) {
                assert!(text.starts_with(prefix));
            }
            for text in rank_recent(&records, prefix, None, &Filter::new()) {
                assert!(text.starts_with(prefix));
            }
        }
    }

    #[test]
    fn unknown_or_trailing_anchor_yields_nothing() {
        let records = git_session();
        assert!(predict_after(&records, "", "cargo test", None, &Filter::new()).is_empty());
        assert!(predict_after(&records, "", "make", None, &Filter::new()).is_empty());
        assert!(predict_after(&records, "", "", None, &Filter::new()).is_empty());
    }

    #[test]
    fn chronology_uses_timestamp_not_insertion_order() {
        // Writer skew: id 3 happened before id 2.
        let records = vec![at(1, 10, "cd src"), at(2, 30, "make"), at(3, 20, "vim main.c")];
        let got = predict_after(&records, "", "cd src", None, &Filter::new());
        assert_eq!(got, vec!["vim main.c"]);
    }

    #[test]
    fn self_loops_and_repeats_are_kept() {
        let records = vec![at(1, 1, "ls"), at(2, 2, "ls"), at(3, 3, "ls")];
        assert_eq!(predict_after(&records, "", "ls", None, &Filter::new()), vec!["ls", "ls"]);
    }

    #[test]
    fn self_invocations_need_opt_in() {
        let records = vec![at(1, 1, "git status"), at(2, 2, "cmdlog list"), at(3, 3, "git status"), at(4, 4, "git diff")];
        let hidden = predict_after(&records, "", "git status", None, &Filter::new());
        assert_eq!(hidden, vec!["git diff"]);
        let shown = predict_after(&records, "", "git status", None, &Filter::new().include_self(true));
        assert_eq!(shown, vec!["git diff", "cmdlog list"]);
    }

    #[test]
    fn prediction_ignores_scope_filters() {
        let f = Filter::new().working_dir("/elsewhere").exclude("git push origin c").unwrap();
        let got = predict_after(&git_session(), "git push", "git commit", None, &f);
        assert_eq!(got, vec!["git push origin b", "git push origin a"]);
    }
}
