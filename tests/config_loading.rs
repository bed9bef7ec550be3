// tests/config_loading.rs

use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;

use snapvisor::config::{
    ConfigFile, DEFAULT_KILL_GRACE, DEFAULT_TIMEOUT, load_and_validate, load_or_default,
    parse_duration,
};
use snapvisor::errors::SnapvisorError;
use snapvisor::milestones::{Milestone, MilestoneTable};
use snapvisor_test_utils::builders::ConfigFileBuilder;

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

fn expect_config_error(contents: &str, needle: &str) {
    let file = write_config(contents);
    match load_and_validate(file.path()) {
        Err(SnapvisorError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "message {:?} should mention {:?}", msg, needle);
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn empty_file_yields_builtin_defaults() -> TestResult {
    let file = write_config("");
    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.command.program, "sudo");
    assert_eq!(cfg.command.args, vec!["./snapshot.sh".to_string()]);
    assert_eq!(cfg.timeout, Duration::from_secs(3600));
    assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
    assert_eq!(cfg.kill_grace, DEFAULT_KILL_GRACE);
    assert_eq!(cfg.record.path, PathBuf::from("last_run.json"));
    assert_eq!(cfg.manual.approved_serial, "ADD-YOUR-SN");
    assert_eq!(cfg.milestones, MilestoneTable::default());

    Ok(())
}

#[test]
fn full_config_is_parsed() -> TestResult {
    let file = write_config(
        r#"
[command]
program = "/usr/local/bin/snapshot"
args = ["--target", "/mnt/backup"]
timeout = "90m"

[record]
path = "/var/lib/snapvisor/last_run.json"

[manual]
approved_serial = "WD-123456"
methodology = "Incremental BTRFS Snapshots"

[[milestone]]
pattern = "Verifying serial"
percent = 10

[[milestone]]
pattern = "All done"
percent = 100
"#,
    );
    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.command.program, "/usr/local/bin/snapshot");
    assert_eq!(cfg.command.args, vec!["--target", "/mnt/backup"]);
    assert_eq!(cfg.command.to_string(), "/usr/local/bin/snapshot --target /mnt/backup");
    assert_eq!(cfg.timeout, Duration::from_secs(90 * 60));
    assert_eq!(cfg.record.path, PathBuf::from("/var/lib/snapvisor/last_run.json"));
    assert_eq!(cfg.manual.approved_serial, "WD-123456");
    assert_eq!(
        cfg.milestones.entries(),
        &[Milestone::new("Verifying serial", 10), Milestone::new("All done", 100)]
    );

    let spec = cfg.run_spec();
    assert_eq!(spec.command, cfg.command);
    assert_eq!(spec.timeout, cfg.timeout);
    assert_eq!(spec.milestones.classify("All done."), Some(100));
    assert_eq!(spec.milestones.classify("Formatting"), None);

    Ok(())
}

#[test]
fn zero_timeout_is_rejected() {
    expect_config_error("[command]\ntimeout = \"0s\"\n", "greater than zero");
}

#[test]
fn unknown_timeout_unit_is_rejected() {
    expect_config_error("[command]\ntimeout = \"10d\"\n", "unsupported duration unit");
}

#[test]
fn integer_timeout_is_taken_as_seconds() -> TestResult {
    let file = write_config("[command]\ntimeout = 3600\n");
    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.timeout, Duration::from_secs(3600));

    let file = write_config("[command]\ntimeout = \"120\"\n");
    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.timeout, Duration::from_secs(120));

    Ok(())
}

#[test]
fn zero_integer_timeout_is_rejected() {
    expect_config_error("[command]\ntimeout = 0\n", "greater than zero");
}

#[test]
fn negative_integer_timeout_is_a_toml_error() {
    let file = write_config("[command]\ntimeout = -5\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(SnapvisorError::TomlError(_))
    ));
}

#[test]
fn kill_grace_is_configurable() -> TestResult {
    let file = write_config("[command]\nkill_grace = \"250ms\"\n");
    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.kill_grace, Duration::from_millis(250));
    assert_eq!(cfg.run_spec().kill_grace, Duration::from_millis(250));

    let cfg = ConfigFileBuilder::new().kill_grace("0s").build();
    assert_eq!(cfg.kill_grace, Duration::ZERO);

    Ok(())
}

#[test]
fn bad_kill_grace_is_rejected() {
    expect_config_error("[command]\nkill_grace = \"later\"\n", "[command].kill_grace");
}

#[test]
fn empty_program_is_rejected() {
    expect_config_error("[command]\nprogram = \"  \"\n", "program");
}

#[test]
fn percent_above_hundred_is_rejected() {
    expect_config_error(
        "[[milestone]]\npattern = \"Formatting\"\npercent = 150\n",
        "must be 0..=100",
    );
}

#[test]
fn duplicate_milestone_pattern_is_rejected() {
    expect_config_error(
        "[[milestone]]\npattern = \"A\"\npercent = 10\n\n[[milestone]]\npattern = \"A\"\npercent = 20\n",
        "duplicate milestone pattern",
    );
}

#[test]
fn empty_milestone_pattern_is_rejected() {
    expect_config_error(
        "[[milestone]]\npattern = \"\"\npercent = 10\n",
        "must not be empty",
    );
}

#[test]
fn explicit_empty_milestone_list_is_rejected() {
    expect_config_error("milestone = []\n", "must not be empty");
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let file = write_config("[command\nprogram = ");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(SnapvisorError::TomlError(_))
    ));
}

#[test]
fn explicitly_requested_missing_file_is_an_error() {
    let result = load_or_default(Some(Path::new("/nonexistent/Snapvisor.toml")));
    assert!(matches!(result, Err(SnapvisorError::IoError(_))));
}

#[test]
fn builder_produces_validated_config() {
    let cfg = ConfigFileBuilder::new()
        .program("sh")
        .args(&["-c", "echo hi"])
        .timeout("5s")
        .milestone("hi", 100)
        .build();

    assert_eq!(cfg.command.to_string(), "sh -c echo hi");
    assert_eq!(cfg.timeout, Duration::from_secs(5));
    assert_eq!(cfg.milestones.classify("hi there"), Some(100));
}

#[test]
fn builder_rejects_invalid_raw_config() {
    let raw = ConfigFileBuilder::new().timeout("soon").raw();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(SnapvisorError::ConfigError(_))
    ));
}

#[test]
fn duration_strings_parse() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
    assert_eq!(parse_duration(" 2m "), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert_eq!(parse_duration("1H"), Ok(Duration::from_secs(3600)));

    assert!(parse_duration("").is_err());
    assert_eq!(parse_duration("10"), Ok(Duration::from_secs(10)));
    assert!(parse_duration("s").is_err());
    assert!(parse_duration("99999999999999999999h").is_err());
}

/// demos/Snapvisor.toml spells out the built-in defaults.
#[test]
fn demo_config_matches_builtin_defaults() -> TestResult {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let cfg = load_and_validate(manifest_dir.join("demos/Snapvisor.toml"))?;
    let defaults = ConfigFile::default();

    assert_eq!(cfg.command, defaults.command);
    assert_eq!(cfg.timeout, defaults.timeout);
    assert_eq!(cfg.kill_grace, defaults.kill_grace);
    assert_eq!(cfg.record, defaults.record);
    assert_eq!(cfg.manual, defaults.manual);
    assert_eq!(cfg.milestones, defaults.milestones);

    Ok(())
}
