//! Pins the reference scenario's final tick hash.
//!
//! Any change to tick order, movement, combat or economy math changes the
//! hash and fails this test. Regenerate deliberately with
//! `FRONTIER_BLESS=1 cargo test -p frontier_core --test golden_hash_tests`
//! and commit the updated file. A missing or malformed file fails the test
//! unless blessing.

use std::fs;
use std::path::PathBuf;

use frontier_test_utils::fixtures::{run_reference_scenario, REFERENCE_TICKS};

fn golden_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("golden")
        .join("reference_scenario.hash")
}

fn parse_golden(text: &str) -> Option<(u64, u64)> {
    let mut ticks = None;
    let mut hash = None;
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#')) {
        let (key, value) = line.split_once('=')?;
        match key.trim() {
            "ticks" => ticks = value.trim().parse().ok(),
            "hash" => hash = u64::from_str_radix(value.trim().trim_start_matches("0x"), 16).ok(),
            _ => {}
        }
    }
    Some((ticks?, hash?))
}

fn write_golden(hash: u64) {
    let path = golden_path();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(
        &path,
        format!(
            "# Final tick hash of the reference scenario. Regenerate with FRONTIER_BLESS=1.\n\
             ticks = {REFERENCE_TICKS}\nhash = {hash:#018x}\n"
        ),
    )
    .unwrap();
}

fn bless_requested() -> bool {
    std::env::var("FRONTIER_BLESS").is_ok_and(|v| v == "1")
}

/// Compare `actual` against the recorded golden text.
fn check_golden(recorded: Option<&str>, actual: u64) -> Result<(), String> {
    let path = golden_path();
    let text = recorded.ok_or_else(|| {
        format!(
            "golden file {} is missing; record it with FRONTIER_BLESS=1 and commit it",
            path.display()
        )
    })?;
    let (ticks, expected) =
        parse_golden(text).ok_or_else(|| format!("golden file {} is malformed", path.display()))?;
    if ticks != REFERENCE_TICKS {
        return Err(format!("golden file was recorded for {ticks} ticks, not {REFERENCE_TICKS}"));
    }
    if actual != expected {
        return Err(format!(
            "reference scenario hash changed: {actual:#018x} != {expected:#018x}; \
             if intentional, rerun with FRONTIER_BLESS=1"
        ));
    }
    Ok(())
}

#[test]
fn reference_scenario_matches_golden_hash() {
    let actual = run_reference_scenario();
    if bless_requested() {
        write_golden(actual);
        return;
    }
    let recorded = fs::read_to_string(golden_path()).ok();
    if let Err(message) = check_golden(recorded.as_deref(), actual) {
        panic!("{message}");
    }
}

#[test]
fn missing_or_stale_golden_fails() {
    let text = "ticks = 500\nhash = 0x0000000000000010\n";
    assert!(check_golden(None, 0x10).unwrap_err().contains("missing"));
    assert!(check_golden(Some("hash = 0x10\n"), 0x10).unwrap_err().contains("malformed"));
    assert!(check_golden(Some(text), 0x11).unwrap_err().contains("changed"));
    assert!(check_golden(Some("ticks = 499\nhash = 0x10\n"), 0x10).is_err());
    assert_eq!(check_golden(Some(text), 0x10), Ok(()));
}

#[test]
fn golden_parser_reads_hex_hash() {
    assert_eq!(
        parse_golden("# comment\nticks = 500\nhash = 0x00000000000000ff\n"),
        Some((500, 0xff))
    );
    assert_eq!(parse_golden("ticks = 500\n"), None);
}
