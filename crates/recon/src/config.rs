use serde::{Deserialize, Serialize};

use crate::error::PanelError;
use crate::keys::Grain;

/// Highest SEER age bin (85+).
pub const MAX_AGE_BIN: u8 = 18;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PanelConfig {
    pub name: String,
    pub grain: Grain,
    pub initial_year: i32,
    pub last_year: i32,
    /// First year of opioid shipment data; defaults to `initial_year`.
    #[serde(default)]
    pub prescriptions_initial_year: Option<i32>,
    pub sources: SourcesConfig,
    #[serde(default)]
    pub working_age: WorkingAgeConfig,
    #[serde(default)]
    pub minimum_wage: MinimumWageConfig,
    #[serde(default)]
    pub wages: WagesConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// One glob pattern or a list of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Patterns {
    One(String),
    Many(Vec<String>),
}

impl Patterns {
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::One(p) => std::slice::from_ref(p),
            Self::Many(ps) => ps,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().iter().all(|p| p.trim().is_empty())
    }
}

/// Paths are glob patterns resolved relative to the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    pub fips_master: String,
    pub labor_market: Patterns,
    pub demographics: Patterns,
    pub minimum_wage: String,
    pub pdmp: String,
    pub sector_composition: Patterns,
    pub wage_distribution: Patterns,
    #[serde(default)]
    pub overdose: Option<String>,
    #[serde(default)]
    pub job_openings: Option<Patterns>,
    #[serde(default)]
    pub prescriptions: Option<Patterns>,
    #[serde(default)]
    pub arcos_fips: Option<String>,
}

// ---------------------------------------------------------------------------
// Stage options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct WorkingAgeConfig {
    #[serde(default = "default_first_bin")]
    pub first_bin: u8,
    #[serde(default = "default_last_bin")]
    pub last_bin: u8,
}

fn default_first_bin() -> u8 {
    5
}

fn default_last_bin() -> u8 {
    13
}

impl Default for WorkingAgeConfig {
    fn default() -> Self {
        Self {
            first_bin: default_first_bin(),
            last_bin: default_last_bin(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinimumWageConfig {
    #[serde(default = "default_excluded_jurisdictions")]
    pub excluded_jurisdictions: Vec<String>,
}

fn default_excluded_jurisdictions() -> Vec<String> {
    vec!["Federal (FLSA)".into()]
}

impl Default for MinimumWageConfig {
    fn default() -> Self {
        Self {
            excluded_jurisdictions: default_excluded_jurisdictions(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WageMode {
    /// Pool 3-digit industry percentiles with employment weights.
    #[default]
    Pooled,
    /// Use per-area percentile rows as published.
    Direct,
}

impl std::fmt::Display for WageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pooled => write!(f, "pooled"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WagesConfig {
    #[serde(default)]
    pub mode: WageMode,
    #[serde(default = "default_excluded_areas")]
    pub excluded_areas: Vec<String>,
}

fn default_excluded_areas() -> Vec<String> {
    vec!["Guam".into(), "Puerto Rico".into(), "Virgin Islands".into()]
}

impl Default for WagesConfig {
    fn default() -> Self {
        Self {
            mode: WageMode::default(),
            excluded_areas: default_excluded_areas(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub panel: Option<String>,
    #[serde(default)]
    pub report: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl PanelConfig {
    pub fn from_toml(input: &str) -> Result<Self, PanelError> {
        let config: PanelConfig =
            toml::from_str(input).map_err(|e| PanelError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn prescriptions_first_year(&self) -> i32 {
        self.prescriptions_initial_year.unwrap_or(self.initial_year)
    }

    /// Panel output path as configured, or the grain's default file name.
    pub fn panel_output(&self) -> &str {
        self.output
            .panel
            .as_deref()
            .unwrap_or_else(|| self.grain.default_output())
    }

    pub fn validate(&self) -> Result<(), PanelError> {
        let invalid = |msg: String| Err(PanelError::ConfigValidation(msg));

        if self.initial_year > self.last_year {
            return invalid(format!(
                "initial_year {} is after last_year {}",
                self.initial_year, self.last_year
            ));
        }

        if let Some(year) = self.prescriptions_initial_year {
            if year < self.initial_year || year > self.last_year {
                return invalid(format!(
                    "prescriptions_initial_year {year} outside {}..={}",
                    self.initial_year, self.last_year
                ));
            }
        }

        let ages = &self.working_age;
        if ages.first_bin > ages.last_bin || ages.last_bin > MAX_AGE_BIN {
            return invalid(format!(
                "working_age bins {}..={} must be ordered within 0..={MAX_AGE_BIN}",
                ages.first_bin, ages.last_bin
            ));
        }

        let required = [
            ("labor_market", &self.sources.labor_market),
            ("demographics", &self.sources.demographics),
            ("sector_composition", &self.sources.sector_composition),
            ("wage_distribution", &self.sources.wage_distribution),
        ];
        for (name, patterns) in required {
            if patterns.is_empty() {
                return invalid(format!("sources.{name} needs at least one pattern"));
            }
        }

        match self.grain {
            Grain::County => {
                if self.sources.overdose.is_none() {
                    return invalid("county grain requires sources.overdose".into());
                }
                if self.wages.mode == WageMode::Direct {
                    return invalid("wages.mode = \"direct\" is only available at state grain".into());
                }
            }
            Grain::State => {
                if self.sources.job_openings.as_ref().map_or(true, Patterns::is_empty) {
                    return invalid("state grain requires sources.job_openings".into());
                }
            }
        }

        if self.sources.prescriptions.is_some() && self.sources.arcos_fips.is_none() {
            return invalid("sources.prescriptions requires sources.arcos_fips".into());
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
