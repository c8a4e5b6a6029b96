use std::io::Write;
use std::path::Path;

use kaitz_io::table::parse_tables;
use kaitz_io::{load_sources, write_panel_csv, write_report, LoadError, RunReport};
use kaitz_recon::{run, PanelConfig};

const COUNTY_TOML: &str = r#"
name = "county fixture"
grain = "county"
initial_year = 2010
last_year = 2010

[sources]
fips_master = "fips/county_fips_master.csv"
labor_market = ["lmos/*.csv"]
demographics = ["demo/*.txt"]
minimum_wage = "minwage.csv"
pdmp = "pdmp.csv"
sector_composition = ["cbp/cbp*co.zip"]
wage_distribution = ["oes/*.zip"]
overdose = "overdose.csv"

[output]
panel = "out/merged_data.csv"
report = "out/coverage.json"
"#;

// -------------------------------------------------------------------------
// Fixture builders
// -------------------------------------------------------------------------

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn write_zip(dir: &Path, name: &str, member: &str, bytes: &[u8]) {
    let path = dir.join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    zip.start_file(member, zip::write::SimpleFileOptions::default()).unwrap();
    zip.write_all(bytes).unwrap();
    zip.finish().unwrap();
}

/// National industry workbook with two title rows above the header, like the
/// older wage releases.
fn oes_workbook() -> Vec<u8> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "National industry-specific estimates").unwrap();
    sheet.write_string(1, 0, "May 2010").unwrap();
    let header = ["naics", "occ_code", "tot_emp", "h_pct10", "h_pct25", "h_median", "h_pct75", "h_pct90"];
    for (col, name) in header.iter().enumerate() {
        sheet.write_string(2, col as u16, *name).unwrap();
    }
    let rows: [(&str, &str, [f64; 6]); 3] = [
        ("311000", "00-0000", [1000.0, 8.0, 9.0, 10.0, 12.0, 15.0]),
        ("541000", "00-0000", [2000.0, 12.0, 13.0, 14.5, 35.0, 50.0]),
        ("541000", "23-1011", [300.0, 30.0, 40.0, 55.0, 70.0, 90.0]),
    ];
    for (i, (naics, occ, values)) in rows.iter().enumerate() {
        let r = 3 + i as u32;
        sheet.write_string(r, 0, *naics).unwrap();
        sheet.write_string(r, 1, *occ).unwrap();
        for (j, v) in values.iter().enumerate() {
            sheet.write_number(r, 2 + j as u16, *v).unwrap();
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// Manhattan plus Autauga County, AL. Alabama has no minimum wage row.
fn county_fixture(dir: &Path) {
    write(dir, "panel.toml", COUNTY_TOML);
    write(
        dir,
        "fips/county_fips_master.csv",
        "fips,county_name,state_abbr,state_name,state\n\
         1001,Autauga County,AL,Alabama,1\n\
         36061,New York County,NY,New York,36\n",
    );
    write(
        dir,
        "lmos/lmos_data_2010.csv",
        "series_id,year,period,value,footnote_codes\n\
         LAUCN360610000000006,2010,M01,45,\n\
         LAUCN360610000000004,2010,M01,3,\n\
         LAUCN360610000000006,2010,M13,45,\n\
         LAUCN010010000000006,2010,M01,20,\n\
         LAUCN010010000000004,2010,M01,1,\n",
    );
    write(
        dir,
        "demo/demo_data_2010.txt",
        "value\n\
         2010NY36061991010200000040\n\
         2010NY36061991010500000020\n\
         2010NY36061991011000000040\n\
         2010AL01001991010500000050\n",
    );
    write(
        dir,
        "minwage.csv",
        "State or otherjurisdiction,Year,Value\nFederal (FLSA),2010,7.25\nNew York,2010,7.25\n",
    );
    write(dir, "pdmp.csv", "state,Prescriber must-query\nNew York,8-2013\nAlabama,\n");
    write_zip(
        dir,
        "cbp/cbp10co.zip",
        "cbp10co.txt",
        b"fipstate,fipscty,naics,emp\n36,061,------,100\n36,061,311812,30\n36,061,541110,70\n01,001,311812,10\n",
    );
    write_zip(dir, "oes/oesm10in4.zip", "nat4d_M2010_dl.xlsx", &oes_workbook());
    write(
        dir,
        "overdose.csv",
        "FIPS,Year,Model-based Death Rate,Lower Confidence Limit,Upper Confidence Limit,Urban/Rural Category\n\
         36061,2010,9.5,8,11,Large Central Metro\n",
    );
}

fn config(dir: &Path) -> PanelConfig {
    PanelConfig::from_toml(&std::fs::read_to_string(dir.join("panel.toml")).unwrap()).unwrap()
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------

#[test]
fn workbook_header_found_below_title_rows() {
    let dir = tempfile::tempdir().unwrap();
    county_fixture(dir.path());
    let path = dir.path().join("oes/oesm10in4.zip");
    let bytes = std::fs::read(&path).unwrap();
    let tables = parse_tables(bytes, &path, Some("occ_code")).unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].headers[0], "naics");
    assert_eq!(tables[0].len(), 3);
    assert_eq!(tables[0].cell(0, 0), "311000");
    assert_eq!(tables[0].cell(1, 5), "14.5");
    // Sheet rows: two titles, header on row 3, data from row 4.
    assert_eq!(tables[0].line(0), 4);
    assert_eq!(tables[0].line(2), 6);
}

#[test]
fn county_sources_load_and_build() {
    let dir = tempfile::tempdir().unwrap();
    county_fixture(dir.path());
    let config = config(dir.path());

    let loaded = load_sources(&config, dir.path());
    assert!(loaded.is_complete(), "{:?}", loaded.failures);
    assert_eq!(loaded.fingerprints.len(), 8);
    assert!(loaded
        .fingerprints
        .iter()
        .all(|f| f.sha256.starts_with("sha256:") && f.sha256.len() == 71));
    let labor = loaded.summaries.iter().find(|s| s.source == "labor_market").unwrap();
    assert_eq!(labor.records, 4);

    let summaries = loaded.summaries.clone();
    let fingerprints = loaded.fingerprints.clone();
    let inputs = loaded.into_inputs().unwrap();
    assert_eq!(inputs.sector.len(), 3);
    assert_eq!(inputs.wages.len(), 2);

    let result = run(&config, &inputs).unwrap();
    assert_eq!(result.panel.len(), 1);

    let panel_path = dir.path().join(config.panel_output());
    write_panel_csv(&result.panel, &panel_path).unwrap();
    let written = std::fs::read_to_string(&panel_path).unwrap();
    let mut lines = written.lines();
    let header: Vec<&str> = lines.next().unwrap().split(',').collect();
    let row: Vec<&str> = lines.next().unwrap().split(',').collect();
    assert!(lines.next().is_none());
    assert_eq!(header[..3], ["fips", "year", "month"]);
    assert_eq!(row[..3], ["36061", "2010", "1"]);

    let field = |name: &str| row[header.iter().position(|h| *h == name).unwrap()];
    assert_eq!(field("county_name"), "New York County");
    assert_eq!(field("h_pct50"), "14.5");
    assert_eq!(field("lab_force_rate"), "75");
    assert!((field("working_age_pop").parse::<f64>().unwrap() - 60.0).abs() < 1e-9);
    assert!(!dir.path().join("out/merged_data.csv.tmp").exists());

    let report_path = dir.path().join("out/coverage.json");
    write_report(&RunReport::new(&result, &summaries, &fingerprints), &report_path).unwrap();
    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(report_path).unwrap()).unwrap();
    assert_eq!(report["meta"]["config_name"], "county fixture");
    assert_eq!(report["coverage"]["summary"]["panel_rows"], 1);
    assert_eq!(report["inputs"].as_array().unwrap().len(), 8);
    let dropped = report["coverage"]["steps"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["step"] == "minimum_wage")
        .unwrap();
    assert_eq!(dropped["dropped_keys"][0], "Alabama|2010");
}

#[test]
fn every_failing_source_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    county_fixture(dir.path());
    std::fs::remove_file(dir.path().join("pdmp.csv")).unwrap();
    std::fs::remove_file(dir.path().join("overdose.csv")).unwrap();

    let loaded = load_sources(&config(dir.path()), dir.path());
    let failed: Vec<&str> = loaded.failures.iter().map(|f| f.source.as_str()).collect();
    assert_eq!(failed, ["pdmp", "overdose"]);
    assert!(loaded.summaries.iter().any(|s| s.source == "labor_market"));

    match loaded.into_inputs() {
        Err(LoadError::SourceFailed { source_name, .. }) => assert_eq!(source_name, "pdmp"),
        other => panic!("expected SourceFailed, got {other:?}"),
    }
}

#[test]
fn fips_failure_blocks_labor_market() {
    let dir = tempfile::tempdir().unwrap();
    county_fixture(dir.path());
    write(dir.path(), "fips/county_fips_master.csv", "code,name\n36061,New York County\n");

    let loaded = load_sources(&config(dir.path()), dir.path());
    let failed: Vec<&str> = loaded.failures.iter().map(|f| f.source.as_str()).collect();
    assert_eq!(failed, ["fips_master", "labor_market"]);
    assert!(loaded.failures[0].message.contains("missing column 'fips'"));
}

#[test]
fn malformed_record_points_at_line() {
    let dir = tempfile::tempdir().unwrap();
    county_fixture(dir.path());
    write(
        dir.path(),
        "overdose.csv",
        "FIPS,Year,Model-based Death Rate,Lower Confidence Limit,Upper Confidence Limit,Urban/Rural Category\n\
         36061,2010,9.5,8,11,Large Central Metro\n\
         NY,2010,1,1,1,Rural\n",
    );

    let loaded = load_sources(&config(dir.path()), dir.path());
    assert_eq!(loaded.failures.len(), 1);
    let message = &loaded.failures[0].message;
    assert!(message.contains("overdose.csv: line 3"), "{message}");
}
