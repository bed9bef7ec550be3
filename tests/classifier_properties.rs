// tests/classifier_properties.rs

use std::sync::Arc;

use proptest::prelude::*;

use snapvisor::milestones::{Milestone, MilestoneTable};
use snapvisor::supervisor::Supervisor;
use snapvisor::types::RunStatus;
use snapvisor_test_utils::builders::ScriptSpecBuilder;
use snapvisor_test_utils::fake_recorder::FakeRecorder;
use snapvisor_test_utils::{collect_run, output_lines, progress_values};

/// Lines a backup script might plausibly print, milestones included.
/// None of them contain a single quote, so they can be quoted for `sh`.
const VOCABULARY: &[&str] = &[
    "Formatting disk...",
    "Device mounted successfully",
    "Starting backup now",
    "Backup completed successfully.",
    "Checking serial number",
    "rsync: 12% done",
    "",
    "Formatting done; Starting backup",
];

#[test]
fn canonical_milestones_map_to_their_percent() {
    let table = MilestoneTable::default();

    assert_eq!(table.classify("Formatting disk..."), Some(25));
    assert_eq!(table.classify("Device mounted successfully"), Some(50));
    assert_eq!(table.classify("Starting backup now"), Some(75));
    assert_eq!(table.classify("Backup completed successfully."), Some(100));
    assert_eq!(table.classify("Checking serial number"), None);
    assert_eq!(table.classify(""), None);
}

#[test]
fn matching_is_case_sensitive_substring() {
    let table = MilestoneTable::default();

    assert_eq!(table.classify(">>> Formatting /dev/sdb1 <<<"), Some(25));
    assert_eq!(table.classify("formatting"), None);
    assert_eq!(table.classify("Mounted Successfully"), None);
}

#[test]
fn highest_percent_wins_when_several_patterns_match() {
    let table = MilestoneTable::default();
    assert_eq!(table.classify("Formatting done; Starting backup"), Some(75));

    // Same entries in reverse order: the answer must not change.
    let reversed = MilestoneTable::new(table.entries().iter().rev().cloned().collect());
    assert_eq!(reversed.classify("Formatting done; Starting backup"), Some(75));

    let overlapping = MilestoneTable::new(vec![
        Milestone::new("backup", 90),
        Milestone::new("Starting backup", 10),
    ]);
    assert_eq!(overlapping.classify("Starting backup"), Some(90));
}

proptest! {
    #[test]
    fn classify_is_deterministic(line in ".*") {
        let table = MilestoneTable::default();
        prop_assert_eq!(table.classify(&line), table.classify(&line));
    }

    #[test]
    fn classify_only_reports_percents_of_matching_patterns(
        prefix in "[a-z ]{0,8}",
        idx in 0..4usize,
        suffix in "[a-z ]{0,8}",
    ) {
        let table = MilestoneTable::default();
        let milestone = &table.entries()[idx];
        let line = format!("{}{}{}", prefix, milestone.pattern, suffix);

        let percent = table.classify(&line).expect("embedded pattern must match");
        prop_assert!(percent >= milestone.percent);
        prop_assert!(
            table
                .entries()
                .iter()
                .any(|m| m.percent == percent && line.contains(m.pattern.as_str()))
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn observed_progress_is_non_decreasing(
        picks in proptest::collection::vec(0..VOCABULARY.len(), 1..8),
    ) {
        let lines: Vec<&str> = picks.iter().map(|&i| VOCABULARY[i]).collect();
        let quoted: Vec<String> = lines.iter().map(|l| format!("'{}'", l)).collect();
        let script = format!("printf '%s\\n' {}", quoted.join(" "));

        let rt = tokio::runtime::Runtime::new().unwrap();
        let (events, run) = rt.block_on(async {
            let spec = ScriptSpecBuilder::new(&script).build();
            let supervisor = Supervisor::new(spec, Arc::new(FakeRecorder::new()));
            collect_run(supervisor.start().unwrap()).await
        });

        let progress = progress_values(&events);
        prop_assert!(progress.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {:?}", progress);
        prop_assert_eq!(output_lines(&events), lines.iter().map(|l| l.to_string()).collect::<Vec<_>>());
        prop_assert_eq!(run.status(), RunStatus::Completed);
        prop_assert_eq!(run.progress(), progress.last().copied().unwrap_or(0));
    }
}
