//! Property-based tests for the pure selection and parsing rules.

#![allow(clippy::expect_used)]

use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use keel_cli::domain::config::{parse_env_assignment, parse_env_file};
use keel_cli::domain::release::{select_previous, select_prunable, sort_newest_first};
use keel_cli::domain::{AppName, Release, ReleaseId, ReleaseStatus};
use proptest::prelude::*;

fn releases(stamps: &[i64]) -> Vec<Release> {
    let mut out: Vec<Release> = stamps
        .iter()
        .enumerate()
        .map(|(i, secs)| Release {
            id: ReleaseId::parse(&format!("r{i}")).expect("id"),
            path: PathBuf::from(format!("/srv/demo/releases/r{i}")),
            installed_at: Utc.timestamp_opt(*secs, 0).single().expect("time"),
            status: ReleaseStatus::Installed,
            artifact_sha256: None,
        })
        .collect();
    sort_newest_first(&mut out);
    out
}

proptest! {
    #[test]
    fn prune_never_removes_current_and_leaves_keep(
        stamps in prop::collection::vec(0i64..1_000_000, 1..12),
        keep in 1usize..8,
        current_idx in any::<prop::sample::Index>(),
    ) {
        let all = releases(&stamps);
        let current = all[current_idx.index(all.len())].id.clone();

        let pruned = select_prunable(&all, Some(&current), keep);

        prop_assert!(pruned.iter().all(|r| r.id != current));
        prop_assert_eq!(all.len() - pruned.len(), keep.min(all.len()).max(1));
    }

    #[test]
    fn pruned_releases_are_older_than_kept_non_current_ones(
        stamps in prop::collection::vec(0i64..1_000_000, 1..12),
        keep in 1usize..8,
    ) {
        let all = releases(&stamps);
        let current = all[0].id.clone();
        let pruned = select_prunable(&all, Some(&current), keep);

        let kept: Vec<&Release> = all
            .iter()
            .filter(|r| r.id != current && !pruned.iter().any(|p| p.id == r.id))
            .collect();
        for p in &pruned {
            for k in &kept {
                prop_assert!(p.installed_at <= k.installed_at);
            }
        }
    }

    #[test]
    fn previous_is_never_current(
        stamps in prop::collection::vec(0i64..1_000_000, 1..12),
        current_idx in any::<prop::sample::Index>(),
    ) {
        let all = releases(&stamps);
        let current = all[current_idx.index(all.len())].id.clone();

        match select_previous(&all, Some(&current)) {
            Some(prev) => prop_assert_ne!(&prev.id, &current),
            None => prop_assert_eq!(all.len(), 1),
        }
    }

    #[test]
    fn env_assignment_keeps_everything_after_first_equals(
        key in "[A-Z_][A-Z0-9_]{0,15}",
        value in "[ -~]{0,40}",
    ) {
        let (k, v) = parse_env_assignment(&format!("{key}={value}")).expect("valid");
        prop_assert_eq!(k, key);
        prop_assert_eq!(v, value);
    }

    #[test]
    fn env_file_lines_parse_in_order(
        pairs in prop::collection::vec(("[A-Z][A-Z0-9_]{0,8}", "[a-z0-9:/.]{0,12}"), 0..8),
    ) {
        let content: String = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}\n# comment\n\n"))
            .collect();

        let parsed = parse_env_file(&content).expect("valid");

        prop_assert_eq!(parsed, pairs);
    }

    #[test]
    fn app_names_with_path_separators_are_rejected(
        prefix in "[a-z]{1,8}",
        suffix in "[a-z]{0,8}",
    ) {
        let joined = format!("{prefix}/{suffix}");
        prop_assert!(AppName::parse(&joined).is_err());
        prop_assert!(ReleaseId::parse(&joined).is_err());
    }
}
