//! `kaitz build | check | validate`: config-driven panel construction.

use std::path::{Path, PathBuf};

use kaitz_io::{load_sources, write_panel_csv, write_report, LoadedSources, RunReport};
use kaitz_recon::PanelConfig;
use serde::Serialize;

use crate::exit_codes::{
    load_exit_code, panel_exit_code, EXIT_ATTRITION, EXIT_ERROR, EXIT_SOURCE_LOAD, EXIT_USAGE,
};
use crate::CliError;

fn panel_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

/// Read and validate the config. Returns it with the directory its relative
/// paths resolve against.
fn load_config(config_path: &Path) -> Result<(PanelConfig, PathBuf), CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        panel_err(EXIT_USAGE, format!("cannot read config {}: {e}", config_path.display()))
            .with_hint("pass the path to a panel TOML file")
    })?;
    let config = PanelConfig::from_toml(&config_str).map_err(|e| panel_err(panel_exit_code(&e), e.to_string()))?;
    let base_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    Ok((config, base_dir))
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn report_failures(loaded: &LoadedSources) -> Result<(), CliError> {
    if loaded.is_complete() {
        return Ok(());
    }
    for failure in &loaded.failures {
        eprintln!("  source '{}': {}", failure.source, failure.message);
    }
    Err(panel_err(
        EXIT_SOURCE_LOAD,
        format!("{} source(s) failed to load", loaded.failures.len()),
    )
    .with_hint("run `kaitz check <config>` to list every source"))
}

// ============================================================================
// build
// ============================================================================

pub fn cmd_build(
    config_path: PathBuf,
    output: Option<PathBuf>,
    report: Option<PathBuf>,
    json_output: bool,
    fail_on_attrition: bool,
) -> Result<(), CliError> {
    let (config, base_dir) = load_config(&config_path)?;

    let loaded = load_sources(&config, &base_dir);
    report_failures(&loaded)?;
    let summaries = loaded.summaries.clone();
    let fingerprints = loaded.fingerprints.clone();
    let inputs = loaded.into_inputs().map_err(|e| panel_err(load_exit_code(&e), e.to_string()))?;

    let result = kaitz_recon::run(&config, &inputs).map_err(|e| panel_err(panel_exit_code(&e), e.to_string()))?;

    let panel_path = match output {
        Some(path) => path,
        None => resolve(&base_dir, Path::new(config.panel_output())),
    };
    write_panel_csv(&result.panel, &panel_path).map_err(|e| panel_err(EXIT_ERROR, e.to_string()))?;

    let run_report = RunReport::new(&result, &summaries, &fingerprints);
    let report_path = report.or_else(|| {
        config
            .output
            .report
            .as_ref()
            .map(|r| resolve(&base_dir, Path::new(r)))
    });
    if let Some(ref path) = report_path {
        write_report(&run_report, path).map_err(|e| panel_err(EXIT_ERROR, e.to_string()))?;
    }

    if json_output {
        let json_str = kaitz_io::writer::report_json(&run_report)
            .map_err(|e| panel_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    // Human summary to stderr
    let s = &result.coverage.summary;
    eprintln!(
        "panel '{}': {} rows x {} columns -> {}",
        config.name,
        result.meta.rows,
        result.meta.columns,
        panel_path.display()
    );
    eprintln!(
        "coverage: {} joins ({} inner), {} with attrition, {} rows dropped",
        s.join_steps, s.inner_steps, s.steps_with_attrition, s.rows_dropped
    );
    if s.insufficient_weight_cells > 0 || s.taxonomy_mismatches > 0 {
        eprintln!(
            "wages: {} cells without usable weights, {} taxonomy mismatches",
            s.insufficient_weight_cells, s.taxonomy_mismatches
        );
    }
    if let Some(ref path) = report_path {
        eprintln!("wrote {}", path.display());
    }

    if fail_on_attrition && s.steps_with_attrition > 0 {
        let worst = result
            .coverage
            .steps
            .iter()
            .filter(|step| step.has_attrition())
            .max_by_key(|step| step.rows_dropped)
            .map(|step| format!(" (largest: '{}' dropped {})", step.step, step.rows_dropped))
            .unwrap_or_default();
        return Err(CliError {
            code: EXIT_ATTRITION,
            message: format!("inner joins dropped {} rows{worst}", result.coverage.attrition()),
            hint: Some("the coverage report lists the dropped keys per step".into()),
        });
    }

    Ok(())
}

// ============================================================================
// check
// ============================================================================

#[derive(Serialize)]
struct CheckOutput<'a> {
    sources: &'a [kaitz_io::SourceSummary],
    failures: &'a [kaitz_io::SourceFailure],
    inputs: &'a [kaitz_io::InputFingerprint],
}

pub fn cmd_check(config_path: PathBuf, json_output: bool) -> Result<(), CliError> {
    let (config, base_dir) = load_config(&config_path)?;
    let loaded = load_sources(&config, &base_dir);

    if json_output {
        let out = CheckOutput {
            sources: &loaded.summaries,
            failures: &loaded.failures,
            inputs: &loaded.fingerprints,
        };
        let json_str = serde_json::to_string_pretty(&out)
            .map_err(|e| panel_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    for s in &loaded.summaries {
        eprintln!("  {:<20} {:>4} file(s) {:>10} records", s.source, s.files, s.records);
    }
    report_failures(&loaded)?;
    eprintln!("all {} sources loaded", loaded.summaries.len());
    Ok(())
}

// ============================================================================
// validate
// ============================================================================

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let (config, _) = load_config(&config_path)?;
    eprintln!(
        "config ok: '{}' ({} grain, {}-{}, {} wages)",
        config.name, config.grain, config.initial_year, config.last_year, config.wages.mode
    );
    Ok(())
}
