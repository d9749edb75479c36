//! Integration tests for CLI argument handling
//!
//! Tests subcommand parsing and site resolution from the command line.

use std::process::Command;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_plateau-water"))
        .args(args)
        .output()
        .expect("Failed to execute plateau-water")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("plateau-water"),
        "Help should mention plateau-water"
    );
    assert!(stdout.contains("conditions"), "Help should list subcommands");
    assert!(stdout.contains("drought"), "Help should list subcommands");
}

#[test]
fn test_missing_subcommand_fails() {
    let output = run_cli(&[]);
    assert!(
        !output.status.success(),
        "Expected bare invocation to fail with usage"
    );
}

#[test]
fn test_unknown_site_prints_error_and_exits() {
    let output = run_cli(&["flow", "atlantis"]);
    assert!(!output.status.success(), "Expected unknown site to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Unknown site") || stderr.contains("atlantis"),
        "Should print error message about the unknown site: {}",
        stderr
    );
}

#[test]
fn test_flow_help_mentions_days_flag() {
    let output = run_cli(&["flow", "--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--days"), "flow --help should mention --days");
}

#[test]
fn test_cache_stats_runs_offline() {
    // Cache inspection touches no network, so it should always succeed
    let output = run_cli(&["--no-cache", "cache", "stats"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Hit ratio"));
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use plateau_water::cli::{resolve_site, Cli, Command};

    #[test]
    fn test_cli_parse_conditions_default_sites() {
        let cli = Cli::parse_from(["plateau-water", "conditions"]);
        match cli.command {
            Command::Conditions { sites } => assert!(sites.is_empty()),
            _ => panic!("expected conditions command"),
        }
    }

    #[test]
    fn test_cli_parse_drought_site() {
        let cli = Cli::parse_from(["plateau-water", "drought", "lees-ferry"]);
        match cli.command {
            Command::Drought { site } => assert_eq!(site, "lees-ferry"),
            _ => panic!("expected drought command"),
        }
    }

    #[test]
    fn test_resolve_site_accepts_both_identifier_forms() {
        assert_eq!(resolve_site("greendale").unwrap().site_no, "09234500");
        assert_eq!(resolve_site("09234500").unwrap().id, "greendale");
    }

    #[test]
    fn test_resolve_site_rejects_unknown() {
        assert!(resolve_site("vancouver").is_err());
    }
}
