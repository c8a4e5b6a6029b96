//! County/state name directory keyed by FIPS code.

use std::collections::BTreeMap;

use kaitz_recon::keys::{derive_state_fip, normalize_fips};
use kaitz_recon::GeoKey;

use crate::error::LoadError;
use crate::table::RawTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry {
    pub state_abbr: String,
    pub state_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountyEntry {
    pub county_name: String,
    pub state: StateEntry,
}

#[derive(Debug, Clone, Default)]
pub struct FipsDirectory {
    counties: BTreeMap<String, CountyEntry>,
    states: BTreeMap<String, StateEntry>,
}

impl FipsDirectory {
    /// Build from a table with `fips, county_name, state_abbr, state_name`.
    /// State entries come from the counties' two-digit prefix.
    pub fn from_table(table: &RawTable) -> Result<Self, LoadError> {
        let fips = table.require("fips")?;
        let county_name = table.require("county_name")?;
        let state_abbr = table.require("state_abbr")?;
        let state_name = table.require("state_name")?;

        let mut directory = Self::default();
        for row in 0..table.len() {
            let code = normalize_fips(table.cell(row, fips), 5)
                .map_err(|e| table.field_error(row, e.to_string()))?;
            let state = StateEntry {
                state_abbr: table.cell(row, state_abbr).to_string(),
                state_name: table.cell(row, state_name).to_string(),
            };
            let state_fip = derive_state_fip(&code).map_err(|e| table.field_error(row, e.to_string()))?;
            directory.states.entry(state_fip).or_insert_with(|| state.clone());
            directory.counties.insert(
                code,
                CountyEntry {
                    county_name: table.cell(row, county_name).to_string(),
                    state,
                },
            );
        }
        log::debug!(
            "fips directory: {} counties, {} states",
            directory.counties.len(),
            directory.states.len()
        );
        Ok(directory)
    }

    /// Number of counties.
    pub fn len(&self) -> usize {
        self.counties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counties.is_empty()
    }

    pub fn county(&self, fips: &str) -> Option<&CountyEntry> {
        self.counties.get(fips)
    }

    pub fn state(&self, state_fip: &str) -> Option<&StateEntry> {
        self.states.get(state_fip)
    }

    pub fn state_fip_by_name(&self, name: &str) -> Option<&str> {
        self.states
            .iter()
            .find(|(_, s)| s.state_name.eq_ignore_ascii_case(name.trim()))
            .map(|(fip, _)| fip.as_str())
    }

    pub fn contains(&self, geo: &GeoKey) -> bool {
        self.descriptors(geo).is_some()
    }

    /// Descriptor columns for a key: `county_name`, `state_abbr`, `state_name`
    /// for counties; `state_abbr`, `state_name` for states.
    pub fn descriptors(&self, geo: &GeoKey) -> Option<BTreeMap<String, String>> {
        let (county_name, state) = match geo {
            GeoKey::County(_) => {
                let entry = self.county(geo.code())?;
                (Some(&entry.county_name), &entry.state)
            }
            GeoKey::State(_) => (None, self.state(geo.code())?),
        };
        let mut fields = BTreeMap::from([
            ("state_abbr".to_string(), state.state_abbr.clone()),
            ("state_name".to_string(), state.state_name.clone()),
        ]);
        if let Some(name) = county_name {
            fields.insert("county_name".into(), name.clone());
        }
        Some(fields)
    }
}
