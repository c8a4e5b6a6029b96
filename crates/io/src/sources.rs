//! Resolve configured patterns, decode every source, and collect per-source
//! failures instead of stopping at the first one.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use kaitz_recon::config::WageMode;
use kaitz_recon::{PanelConfig, PanelInputs, WageInput};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::LoadError;
use crate::extract::arcos::{extract_prescriptions, ArcosCrosswalk};
use crate::extract::cbp::extract_sector;
use crate::extract::jolts::extract_job_openings;
use crate::extract::laus::extract_labor_market;
use crate::extract::oes::{extract_area_wages, extract_industry_wages, HEADER_HINT};
use crate::extract::policy::{extract_minimum_wage, extract_overdose, extract_pdmp};
use crate::extract::seer::extract_demographics;
use crate::extract::SourceFile;
use crate::fips::FipsDirectory;
use crate::table::{parse_tables, read_bytes, RawTable};

/// Content hash and decoded row count of one input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputFingerprint {
    pub source: String,
    pub path: String,
    /// `"sha256:<64 hex>"`
    pub sha256: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub source: String,
    pub files: usize,
    pub records: usize,
}

/// Outcome of loading every configured source.
#[derive(Debug, Default)]
pub struct LoadedSources {
    pub inputs: PanelInputs,
    pub summaries: Vec<SourceSummary>,
    pub fingerprints: Vec<InputFingerprint>,
    pub failures: Vec<SourceFailure>,
}

impl LoadedSources {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The engine inputs, or the first recorded failure.
    pub fn into_inputs(self) -> Result<PanelInputs, LoadError> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(LoadError::SourceFailed {
                source_name: failure.source,
                message: failure.message,
            }),
            None => Ok(self.inputs),
        }
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(bytes))
}

/// Expand glob patterns relative to `base`. Matches are de-duplicated and
/// sorted; a source whose patterns match nothing is an error.
pub fn resolve_patterns(base: &Path, source: &str, patterns: &[String]) -> Result<Vec<PathBuf>, LoadError> {
    let mut paths = BTreeSet::new();
    for pattern in patterns {
        let full = if Path::new(pattern).is_absolute() {
            PathBuf::from(pattern)
        } else {
            base.join(pattern)
        };
        let entries = glob::glob(&full.to_string_lossy()).map_err(|e| LoadError::Pattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        for entry in entries {
            let path = entry.map_err(|e| {
                let path = e.path().to_path_buf();
                LoadError::io(path, e.into_error())
            })?;
            if path.is_file() {
                paths.insert(path);
            }
        }
    }
    if paths.is_empty() {
        return Err(LoadError::NoFiles {
            source_name: source.to_string(),
            patterns: patterns.to_vec(),
        });
    }
    Ok(paths.into_iter().collect())
}

fn first_table<'f>(source: &str, files: &'f [SourceFile]) -> Result<&'f RawTable, LoadError> {
    files
        .iter()
        .flat_map(|f| &f.tables)
        .next()
        .ok_or_else(|| LoadError::SourceFailed {
            source_name: source.to_string(),
            message: "no readable table".into(),
        })
}

struct Loader<'a> {
    base: &'a Path,
    loaded: LoadedSources,
}

impl<'a> Loader<'a> {
    fn read(&mut self, source: &str, patterns: &[String], header_hint: Option<&str>) -> Result<Vec<SourceFile>, LoadError> {
        let mut files = Vec::new();
        for path in resolve_patterns(self.base, source, patterns)? {
            let bytes = read_bytes(&path)?;
            let sha256 = sha256_hex(&bytes);
            let file = SourceFile {
                tables: parse_tables(bytes, &path, header_hint)?,
                path,
            };
            log::debug!("{source}: {} ({} rows)", file.path.display(), file.rows());
            self.loaded.fingerprints.push(InputFingerprint {
                source: source.to_string(),
                path: file.path.display().to_string(),
                sha256,
                rows: file.rows(),
            });
            files.push(file);
        }
        Ok(files)
    }

    fn fail(&mut self, source: &str, message: String) {
        log::error!("{source}: {message}");
        self.loaded.failures.push(SourceFailure {
            source: source.to_string(),
            message,
        });
    }

    /// Read and extract one source; failures are recorded and yield `None`.
    fn load<T, E, C>(&mut self, source: &str, patterns: &[String], header_hint: Option<&str>, extract: E, count: C) -> Option<T>
    where
        E: FnOnce(&[SourceFile]) -> Result<T, LoadError>,
        C: Fn(&T) -> usize,
    {
        let result = self
            .read(source, patterns, header_hint)
            .and_then(|files| extract(&files).map(|value| (value, files.len())));
        match result {
            Ok((value, files)) => {
                let records = count(&value);
                log::info!("{source}: {records} records from {files} file(s)");
                self.loaded.summaries.push(SourceSummary {
                    source: source.to_string(),
                    files,
                    records,
                });
                Some(value)
            }
            Err(e) => {
                self.fail(source, e.to_string());
                None
            }
        }
    }
}

/// Load every source the config names. Patterns resolve relative to
/// `base_dir` (the config file's directory).
pub fn load_sources(config: &PanelConfig, base_dir: &Path) -> LoadedSources {
    let sources = &config.sources;
    let grain = config.grain;
    let mut loader = Loader {
        base: base_dir,
        loaded: LoadedSources::default(),
    };

    let directory = loader.load(
        "fips_master",
        std::slice::from_ref(&sources.fips_master),
        None,
        |files| FipsDirectory::from_table(first_table("fips_master", files)?),
        FipsDirectory::len,
    );

    let labor_market = match &directory {
        Some(dir) => loader.load(
            "labor_market",
            sources.labor_market.as_slice(),
            None,
            |files| extract_labor_market(files, dir, grain),
            |tables| tables.iter().map(|t| t.records().len()).sum(),
        ),
        None => {
            loader.fail("labor_market", "requires fips_master, which failed to load".into());
            None
        }
    };

    let demographics = loader.load(
        "demographics",
        sources.demographics.as_slice(),
        None,
        extract_demographics,
        Vec::len,
    );
    let minimum_wage = loader.load(
        "minimum_wage",
        std::slice::from_ref(&sources.minimum_wage),
        None,
        extract_minimum_wage,
        Vec::len,
    );
    let pdmp = loader.load("pdmp", std::slice::from_ref(&sources.pdmp), None, extract_pdmp, Vec::len);
    let sector = loader.load(
        "sector_composition",
        sources.sector_composition.as_slice(),
        None,
        extract_sector,
        Vec::len,
    );

    let wages = match config.wages.mode {
        WageMode::Pooled => loader.load(
            "wage_distribution",
            sources.wage_distribution.as_slice(),
            Some(HEADER_HINT),
            |files| extract_industry_wages(files).map(WageInput::Industry),
            WageInput::len,
        ),
        WageMode::Direct => loader.load(
            "wage_distribution",
            sources.wage_distribution.as_slice(),
            Some(HEADER_HINT),
            |files| extract_area_wages(files, directory.as_ref()).map(WageInput::Area),
            WageInput::len,
        ),
    };

    let overdose = sources.overdose.as_ref().and_then(|path| {
        loader.load("overdose", std::slice::from_ref(path), None, extract_overdose, Vec::len)
    });
    let job_openings = sources.job_openings.as_ref().and_then(|patterns| {
        loader.load(
            "job_openings",
            patterns.as_slice(),
            None,
            extract_job_openings,
            |tables| tables.iter().map(|t| t.records().len()).sum(),
        )
    });

    let prescriptions = match (&sources.prescriptions, &sources.arcos_fips) {
        (Some(patterns), Some(crosswalk_path)) => loader
            .load(
                "arcos_fips",
                std::slice::from_ref(crosswalk_path),
                None,
                |files| ArcosCrosswalk::from_table(first_table("arcos_fips", files)?),
                ArcosCrosswalk::len,
            )
            .and_then(|crosswalk| {
                loader.load(
                    "prescriptions",
                    patterns.as_slice(),
                    None,
                    |files| extract_prescriptions(files, &crosswalk),
                    Vec::len,
                )
            }),
        (Some(_), None) => {
            loader.fail("prescriptions", "requires arcos_fips".into());
            None
        }
        (None, _) => None,
    };

    let mut loaded = loader.loaded;
    loaded.inputs = PanelInputs {
        labor_market: labor_market.unwrap_or_default(),
        demographics: demographics.unwrap_or_default(),
        minimum_wage: minimum_wage.unwrap_or_default(),
        pdmp: pdmp.unwrap_or_default(),
        sector: sector.unwrap_or_default(),
        wages: wages.unwrap_or_default(),
        overdose,
        job_openings,
        prescriptions,
    };
    loaded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_prefix() {
        assert_eq!(
            sha256_hex(b""),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_patterns_resolve_relative_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("lmos")).unwrap();
        for name in ["b_2011.csv", "a_2010.csv", "notes.txt"] {
            std::fs::write(dir.path().join("lmos").join(name), "x\n").unwrap();
        }
        let paths = resolve_patterns(
            dir.path(),
            "labor_market",
            &["lmos/*.csv".to_string(), "lmos/a_*.csv".to_string()],
        )
        .unwrap();
        let names: Vec<_> = paths.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(names, vec!["a_2010.csv", "b_2011.csv"]);
    }

    #[test]
    fn test_unmatched_pattern_names_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_patterns(dir.path(), "pdmp", &["missing/*.csv".to_string()]).unwrap_err();
        assert!(matches!(err, LoadError::NoFiles { ref source_name, .. } if source_name == "pdmp"));
    }
}
