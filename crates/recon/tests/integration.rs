use std::collections::BTreeMap;

use kaitz_recon::engine::run;
use kaitz_recon::join::JoinKind;
use kaitz_recon::percentile::{AreaWage, IndustryWage};
use kaitz_recon::policy::{MinimumWageRecord, OverdoseRecord, PolicyAdoption, PrescriptionRecord};
use kaitz_recon::sector::SectorEmployment;
use kaitz_recon::shares::PopulationCell;
use kaitz_recon::{
    GeoKey, IndustryCode, MeasureRecord, PanelConfig, PanelError, PanelInputs, SourceTable, TimeKey,
    Value, WageInput,
};

const COUNTY_TOML: &str = r#"
name = "county test"
grain = "county"
initial_year = 2010
last_year = 2010

[sources]
fips_master = "fips.csv"
labor_market = ["lmos/*.csv"]
demographics = ["demo/*.txt"]
minimum_wage = "minwage.csv"
pdmp = "pdmp.csv"
sector_composition = ["cbp/*.zip"]
wage_distribution = ["oes/*.zip"]
overdose = "overdose.csv"
"#;

const STATE_TOML: &str = r#"
name = "state test"
grain = "state"
initial_year = 2010
last_year = 2010

[sources]
fips_master = "fips.csv"
labor_market = ["lmos/*.csv"]
demographics = ["demo/*.txt"]
minimum_wage = "minwage.csv"
pdmp = "pdmp.csv"
sector_composition = ["cbp/*.zip"]
wage_distribution = ["oes/*.zip"]
job_openings = ["jolts/*.csv"]
prescriptions = ["arcos/*.csv"]
arcos_fips = "arcos_fips.csv"

[wages]
mode = "direct"
"#;

// -------------------------------------------------------------------------
// Fixture builders
// -------------------------------------------------------------------------

fn county(fips: &str) -> GeoKey {
    GeoKey::county(fips).unwrap()
}

fn measure(geo: &GeoKey, month: u8, variable: &str, value: f64) -> MeasureRecord {
    MeasureRecord {
        geo: geo.clone(),
        time: TimeKey::monthly(2010, month).unwrap(),
        variable: variable.into(),
        value: Value::Float(value),
    }
}

fn descriptors(entries: &[(&GeoKey, &str)]) -> BTreeMap<GeoKey, BTreeMap<String, String>> {
    entries
        .iter()
        .map(|(geo, state)| {
            (
                (*geo).clone(),
                BTreeMap::from([("state_name".to_string(), state.to_string())]),
            )
        })
        .collect()
}

fn population(geo: &GeoKey, age: u8, population: f64) -> PopulationCell {
    PopulationCell {
        geo: geo.clone(),
        year: 2010,
        race: 1,
        origin: 0,
        sex: 1,
        age,
        population,
    }
}

fn employment(geo: &GeoKey, code: &str, emp: f64) -> SectorEmployment {
    SectorEmployment {
        geo: geo.clone(),
        year: 2010,
        industry: IndustryCode::naics(code).unwrap(),
        emp,
    }
}

fn minimum_wage(state: &str, value: f64) -> MinimumWageRecord {
    MinimumWageRecord {
        jurisdiction: state.into(),
        year: 2010,
        value: Value::Float(value),
    }
}

/// Manhattan plus Autauga County, AL. Alabama has no minimum wage row, so
/// Autauga drops out at the minimum-wage join.
fn county_inputs() -> PanelInputs {
    let manhattan = county("36061");
    let autauga = county("01001");

    let labor = SourceTable::new(
        "laus",
        vec![
            measure(&manhattan, 1, "labor_force", 45.0),
            measure(&manhattan, 1, "unemployment", 3.0),
            measure(&autauga, 1, "labor_force", 20.0),
            measure(&autauga, 1, "unemployment", 1.0),
        ],
        descriptors(&[(&manhattan, "New York"), (&autauga, "Alabama")]),
    )
    .unwrap();

    PanelInputs {
        labor_market: vec![labor],
        demographics: vec![
            population(&manhattan, 2, 40.0),
            population(&manhattan, 5, 20.0),
            population(&manhattan, 10, 40.0),
            population(&autauga, 5, 50.0),
        ],
        minimum_wage: vec![minimum_wage("Federal (FLSA)", 7.25), minimum_wage("New York", 7.25)],
        pdmp: vec![
            PolicyAdoption {
                state_name: "New York".into(),
                must_query: Some("8-2013".into()),
            },
            PolicyAdoption {
                state_name: "Alabama".into(),
                must_query: None,
            },
        ],
        sector: vec![
            employment(&manhattan, "311812", 30.0),
            employment(&manhattan, "541110", 70.0),
            employment(&autauga, "311812", 10.0),
        ],
        wages: WageInput::Industry(vec![
            IndustryWage {
                year: 2010,
                industry: IndustryCode::naics("311000").unwrap(),
                percentiles: [Some(8.0), Some(9.0), Some(10.0), Some(12.0), Some(15.0)],
            },
            IndustryWage {
                year: 2010,
                industry: IndustryCode::naics("541000").unwrap(),
                percentiles: [Some(12.0), Some(13.0), Some(14.5), Some(35.0), Some(50.0)],
            },
        ]),
        overdose: Some(vec![OverdoseRecord {
            geo: manhattan,
            year: 2010,
            model_death_rate: Value::Float(9.5),
            lbound_death_rate: Value::Float(8.0),
            ubound_death_rate: Value::Float(11.0),
            urban_rural: Value::text("Large Central Metro"),
        }]),
        job_openings: None,
        prescriptions: None,
    }
}

// -------------------------------------------------------------------------
// County panel
// -------------------------------------------------------------------------

#[test]
fn county_panel_end_to_end() {
    let config = PanelConfig::from_toml(COUNTY_TOML).unwrap();
    let result = run(&config, &county_inputs()).unwrap();
    let panel = &result.panel;

    assert_eq!(panel.len(), 1);
    let row = &panel.rows()[0];
    assert_eq!(row.geo.code(), "36061");
    assert_eq!(row.time, TimeKey::monthly(2010, 1).unwrap());

    let num = |column: &str| {
        panel
            .value(row, column)
            .and_then(Value::as_f64)
            .unwrap_or_else(|| panic!("no numeric {column}"))
    };

    assert!((num("working_age_pop") - 60.0).abs() < 1e-9);
    assert_eq!(num("lab_force_rate"), 75.0);
    assert_eq!(num("min_wage"), 7.25);
    assert_eq!(num("first_treatment_pmq"), 644.0);
    assert_eq!(num("emp_31_ratio"), 0.3);
    assert_eq!(num("emp_54_ratio"), 0.7);
    assert_eq!(num("h_pct50"), 14.5);
    assert_eq!(num("model_death_rate"), 9.5);
    assert!((num("log_minw") - 1.9810).abs() < 1e-4);
    assert!((num("log_h_pct50") - 2.6741).abs() < 1e-4);
    assert!((num("kaitz_pct50") + 0.6931).abs() < 1e-4);

    let columns = panel.columns();
    assert_eq!(columns[..3], ["fips", "year", "month"]);
    assert_eq!(columns.last().map(String::as_str), Some("kaitz_pct90"));
    assert!(!columns.iter().any(|c| c == "w_population"));
}

#[test]
fn county_panel_records_attrition() {
    let config = PanelConfig::from_toml(COUNTY_TOML).unwrap();
    let result = run(&config, &county_inputs()).unwrap();
    let coverage = &result.coverage;

    let step = coverage
        .steps
        .iter()
        .find(|s| s.step == "minimum_wage")
        .unwrap();
    assert_eq!(step.kind, JoinKind::Inner);
    assert_eq!((step.rows_in, step.rows_out, step.rows_dropped), (2, 1, 1));
    assert_eq!(step.dropped_keys, ["Alabama|2010"]);

    for step in coverage.steps.iter().filter(|s| s.kind == JoinKind::Inner) {
        assert_eq!(step.rows_out + step.rows_dropped, step.rows_in, "{}", step.step);
    }

    assert_eq!(coverage.summary.rows_dropped, 1);
    assert_eq!(coverage.summary.panel_rows, 1);
    assert!(coverage.insufficient_weight.is_empty());
    assert_eq!(result.meta.rows, 1);
    assert_eq!(result.meta.engine_version, env!("CARGO_PKG_VERSION"));
}

#[test]
fn zero_population_stays_nan_through_panel() {
    let config = PanelConfig::from_toml(COUNTY_TOML).unwrap();
    let mut inputs = county_inputs();
    let manhattan = county("36061");
    inputs.demographics = vec![
        population(&manhattan, 2, 0.0),
        population(&manhattan, 5, 0.0),
        population(&manhattan, 10, 0.0),
        population(&county("01001"), 5, 50.0),
    ];

    let result = run(&config, &inputs).unwrap();
    let panel = &result.panel;
    assert_eq!(panel.len(), 1);
    let row = &panel.rows()[0];

    let cell = |column: &str| panel.value(row, column).cloned().unwrap_or_else(|| panic!("no {column}"));
    assert_eq!(cell("population"), Value::Float(0.0));
    for column in ["age5_population_ratio", "working_age_pop_weight", "working_age_pop", "lab_force_rate"] {
        let value = cell(column);
        assert!(value.as_f64().is_some_and(f64::is_nan), "{column}: {value:?}");
        assert_eq!(value.to_string(), "NaN");
    }
    // Measured but unrelated columns are untouched.
    assert_eq!(cell("h_pct50"), Value::Float(14.5));
}

#[test]
fn county_panel_requires_overdose() {
    let config = PanelConfig::from_toml(COUNTY_TOML).unwrap();
    let mut inputs = county_inputs();
    inputs.overdose = None;
    let err = run(&config, &inputs).unwrap_err();
    assert!(matches!(err, PanelError::SourceFailed { ref name, .. } if name == "overdose"));
}

#[test]
fn missing_state_names_abort_with_stage() {
    let config = PanelConfig::from_toml(COUNTY_TOML).unwrap();
    let mut inputs = county_inputs();
    let geo = county("36061");
    inputs.labor_market = vec![SourceTable::new(
        "laus",
        vec![measure(&geo, 1, "labor_force", 45.0)],
        BTreeMap::new(),
    )
    .unwrap()];
    let err = run(&config, &inputs).unwrap_err();
    match err {
        PanelError::Stage { stage, source } => {
            assert_eq!(stage, "minimum_wage");
            assert!(matches!(*source, PanelError::MissingJoinKey { ref key, .. } if key == "state_name"));
        }
        other => panic!("expected stage error, got {other}"),
    }
}

#[test]
fn duplicate_minimum_wage_rows_fail() {
    let config = PanelConfig::from_toml(COUNTY_TOML).unwrap();
    let mut inputs = county_inputs();
    inputs.minimum_wage.push(minimum_wage("New York", 8.0));
    let err = run(&config, &inputs).unwrap_err();
    assert!(err.to_string().contains("duplicate key [New York|2010]"));
}

#[test]
fn wage_rows_must_match_mode() {
    let config = PanelConfig::from_toml(COUNTY_TOML).unwrap();
    let mut inputs = county_inputs();
    inputs.wages = WageInput::Area(Vec::new());
    assert!(run(&config, &inputs).is_err());
}

// -------------------------------------------------------------------------
// State panel
// -------------------------------------------------------------------------

fn state_inputs() -> PanelInputs {
    let ny = GeoKey::state("36").unwrap();
    let manhattan = county("36061");

    let labor = SourceTable::new(
        "laus",
        vec![
            measure(&ny, 1, "labor_force", 45.0),
            measure(&ny, 2, "labor_force", 46.0),
        ],
        descriptors(&[(&ny, "New York")]),
    )
    .unwrap();
    let jobs = SourceTable::new(
        "jolts",
        vec![
            measure(&ny, 1, "job_openings", 300.0),
            measure(&ny, 1, "job_openings_rate", 3.1),
            measure(&ny, 2, "job_openings", 310.0),
            measure(&ny, 2, "job_openings_rate", 3.2),
        ],
        BTreeMap::new(),
    )
    .unwrap();

    PanelInputs {
        labor_market: vec![labor],
        demographics: vec![
            population(&manhattan, 2, 40.0),
            population(&manhattan, 5, 60.0),
        ],
        minimum_wage: vec![minimum_wage("New York", 7.25)],
        pdmp: vec![PolicyAdoption {
            state_name: "New York".into(),
            must_query: Some("8-2013".into()),
        }],
        sector: vec![employment(&manhattan, "311812", 10.0)],
        wages: WageInput::Area(vec![
            AreaWage {
                geo: ny.clone(),
                year: 2010,
                area_title: "New York".into(),
                percentiles: [Some(9.0), Some(11.0), Some(14.5), Some(25.0), Some(40.0)],
            },
            AreaWage {
                geo: GeoKey::state("72").unwrap(),
                year: 2010,
                area_title: "Puerto Rico".into(),
                percentiles: [Some(7.0); 5],
            },
        ]),
        overdose: None,
        job_openings: Some(vec![jobs]),
        prescriptions: Some(vec![PrescriptionRecord {
            geo: manhattan,
            time: TimeKey::monthly(2010, 1).unwrap(),
            dosage_unit: 100.0,
            mme_conversion_factor: 1.5,
            base_weight: 3.0,
        }]),
    }
}

#[test]
fn state_panel_end_to_end() {
    let config = PanelConfig::from_toml(STATE_TOML).unwrap();
    let result = run(&config, &state_inputs()).unwrap();
    let panel = &result.panel;

    assert_eq!(panel.len(), 2);
    assert_eq!(panel.columns()[0], "state_fip");

    let jan = &panel.rows()[0];
    let feb = &panel.rows()[1];
    assert_eq!(jan.time.month, Some(1));
    assert_eq!(feb.time.month, Some(2));

    assert_eq!(panel.value(jan, "job_openings"), Some(&Value::Float(300.0)));
    assert_eq!(panel.value(jan, "dosage_unit"), Some(&Value::Float(100.0)));
    // left join keeps months without shipments
    assert_eq!(panel.value(feb, "dosage_unit"), Some(&Value::Missing));
    assert_eq!(panel.value(feb, "h_pct50"), Some(&Value::Float(14.5)));

    let prescriptions = result
        .coverage
        .steps
        .iter()
        .find(|s| s.step == "prescriptions")
        .unwrap();
    assert_eq!(prescriptions.kind, JoinKind::Left);
    assert_eq!(prescriptions.rows_out, 2);

    let wages = result
        .coverage
        .steps
        .iter()
        .find(|s| s.step == "wage_distribution")
        .unwrap();
    assert_eq!(wages.right_unmatched, 0);
}

#[test]
fn state_panel_requires_job_openings() {
    let config = PanelConfig::from_toml(STATE_TOML).unwrap();
    let mut inputs = state_inputs();
    inputs.job_openings = None;
    let err = run(&config, &inputs).unwrap_err();
    assert!(matches!(err, PanelError::SourceFailed { ref name, .. } if name == "job_openings"));
}
