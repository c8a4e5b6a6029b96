// End-to-end tests for the kaitz binary: exit codes and the --json stdout
// contract.
//
// Run with: cargo test -p kaitz-cli --test cli_tests -- --nocapture

use std::path::Path;
use std::process::{Command, Output};

const COUNTY_TOML: &str = r#"
name = "county fixture"
grain = "county"
initial_year = 2010
last_year = 2010

[sources]
fips_master = "fips.csv"
labor_market = ["lmos/*.csv"]
demographics = ["demo/*.txt"]
minimum_wage = "minwage.csv"
pdmp = "pdmp.csv"
sector_composition = ["cbp/cbp*co.txt"]
wage_distribution = ["oes/*.csv"]
overdose = "overdose.csv"

[output]
panel = "out/merged_data.csv"
"#;

fn kaitz() -> Command {
    Command::new(env!("CARGO_BIN_EXE_kaitz"))
}

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Manhattan and Autauga County. Alabama has no minimum wage row, so the
/// minimum wage join drops it.
fn county_fixture(dir: &Path) {
    write(dir, "panel.toml", COUNTY_TOML);
    write(
        dir,
        "fips.csv",
        "fips,county_name,state_abbr,state_name\n\
         1001,Autauga County,AL,Alabama\n\
         36061,New York County,NY,New York\n",
    );
    write(
        dir,
        "lmos/lmos_data_2010.csv",
        "series_id,year,period,value\n\
         LAUCN360610000000006,2010,M01,45\n\
         LAUCN360610000000004,2010,M01,3\n\
         LAUCN010010000000006,2010,M01,20\n\
         LAUCN010010000000004,2010,M01,1\n",
    );
    write(
        dir,
        "demo/demo_2010.txt",
        "value\n\
         2010NY36061991010500000060\n\
         2010AL01001991010500000050\n",
    );
    write(
        dir,
        "minwage.csv",
        "State or otherjurisdiction,Year,Value\nFederal (FLSA),2010,7.25\nNew York,2010,7.25\n",
    );
    write(dir, "pdmp.csv", "state,Prescriber must-query\nNew York,8-2013\nAlabama,\n");
    write(
        dir,
        "cbp/cbp10co.txt",
        "fipstate,fipscty,naics,emp\n36,061,311812,30\n36,061,541110,70\n01,001,311812,10\n",
    );
    write(
        dir,
        "oes/oesm10in4.csv",
        "naics,occ_code,tot_emp,h_median\n\
         311000,00-0000,1000,10\n\
         541000,00-0000,2000,14.5\n",
    );
    write(
        dir,
        "overdose.csv",
        "FIPS,Year,Model-based Death Rate,Lower Confidence Limit,Upper Confidence Limit,Urban/Rural Category\n\
         36061,2010,9.5,8,11,Large Central Metro\n",
    );
}

fn run(dir: &Path, args: &[&str]) -> Output {
    kaitz().current_dir(dir).args(args).output().expect("run kaitz")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Assert stdout is a single, parseable JSON value with no extra lines.
fn assert_single_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let trimmed = stdout.trim();
    assert!(!trimmed.is_empty(), "stdout should not be empty");
    serde_json::from_str(trimmed)
        .unwrap_or_else(|e| panic!("stdout must be valid JSON.\nParse error: {}\nstdout:\n{}", e, trimmed))
}

// ===========================================================================
// kaitz validate
// ===========================================================================

#[test]
fn validate_accepts_fixture_config() {
    let dir = tempfile::tempdir().unwrap();
    county_fixture(dir.path());

    let output = run(dir.path(), &["validate", "panel.toml"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("config ok: 'county fixture'"));
}

#[test]
fn validate_rejects_reversed_years() {
    let dir = tempfile::tempdir().unwrap();
    county_fixture(dir.path());
    write(
        dir.path(),
        "panel.toml",
        &COUNTY_TOML.replace("initial_year = 2010", "initial_year = 2012"),
    );

    let output = run(dir.path(), &["validate", "panel.toml"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("initial_year 2012 is after last_year 2010"));
}

#[test]
fn missing_config_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();

    let output = run(dir.path(), &["validate", "nope.toml"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("error: cannot read config"));
    assert!(stderr(&output).contains("hint:"));
}

// ===========================================================================
// kaitz build
// ===========================================================================

#[test]
fn build_writes_panel() {
    let dir = tempfile::tempdir().unwrap();
    county_fixture(dir.path());

    let output = run(dir.path(), &["build", "panel.toml"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(output.stdout.is_empty(), "human output belongs on stderr");

    let panel = std::fs::read_to_string(dir.path().join("out/merged_data.csv")).unwrap();
    let mut lines = panel.lines();
    assert!(lines.next().unwrap().starts_with("fips,year,month"));
    assert!(lines.next().unwrap().starts_with("36061,2010,1"));
    assert!(lines.next().is_none());
    assert!(stderr(&output).contains("1 rows dropped"));
}

#[test]
fn build_output_flag_overrides_config() {
    let dir = tempfile::tempdir().unwrap();
    county_fixture(dir.path());
    let target = dir.path().join("elsewhere/panel.csv");

    let output = run(
        dir.path(),
        &["build", "panel.toml", "--output", target.to_str().unwrap(), "--report", "cov.json"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(target.exists());
    assert!(!dir.path().join("out/merged_data.csv").exists());
    assert!(dir.path().join("cov.json").exists());
}

#[test]
fn build_json_is_single_report() {
    let dir = tempfile::tempdir().unwrap();
    county_fixture(dir.path());

    let output = run(dir.path(), &["-q", "build", "panel.toml", "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let report = assert_single_json(&output);
    assert_eq!(report["meta"]["config_name"], "county fixture");
    assert_eq!(report["coverage"]["summary"]["panel_rows"], 1);
    let sources = report["sources"].as_array().unwrap();
    assert!(sources.iter().any(|s| s["source"] == "overdose"));
}

#[test]
fn attrition_fails_only_when_asked() {
    let dir = tempfile::tempdir().unwrap();
    county_fixture(dir.path());

    let output = run(dir.path(), &["build", "panel.toml", "--fail-on-attrition"]);
    assert_eq!(output.status.code(), Some(6));
    let err = stderr(&output);
    assert!(err.contains("inner joins dropped 1 rows"), "{err}");
    assert!(err.contains("minimum_wage"), "{err}");
    // The panel is still written before the exit.
    assert!(dir.path().join("out/merged_data.csv").exists());
}

#[test]
fn missing_source_exits_4() {
    let dir = tempfile::tempdir().unwrap();
    county_fixture(dir.path());
    std::fs::remove_file(dir.path().join("pdmp.csv")).unwrap();

    let output = run(dir.path(), &["build", "panel.toml"]);
    assert_eq!(output.status.code(), Some(4));
    let err = stderr(&output);
    assert!(err.contains("source 'pdmp'"), "{err}");
    assert!(err.contains("1 source(s) failed to load"), "{err}");
    assert!(!dir.path().join("out/merged_data.csv").exists());
}

// ===========================================================================
// kaitz check
// ===========================================================================

#[test]
fn check_json_lists_sources_and_failures() {
    let dir = tempfile::tempdir().unwrap();
    county_fixture(dir.path());
    std::fs::remove_file(dir.path().join("overdose.csv")).unwrap();

    let output = run(dir.path(), &["check", "panel.toml", "--json"]);
    assert_eq!(output.status.code(), Some(4));

    let val = assert_single_json(&output);
    let failures = val["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["source"], "overdose");
    let inputs = val["inputs"].as_array().unwrap();
    assert_eq!(inputs.len(), 7);
    assert!(inputs.iter().all(|i| i["sha256"].as_str().unwrap().starts_with("sha256:")));
}
