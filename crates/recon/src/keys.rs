//! Geographic, time and industry keys, plus the pure normalizers that build them.
//!
//! FIPS codes are kept as zero-padded strings end to end: `"01001"` and `"1001"`
//! are the same county, `1001` as an integer is not a key.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PanelError;

pub const STATE_FIPS_WIDTH: usize = 2;
pub const COUNTY_FIPS_WIDTH: usize = 5;
pub const NAICS_WIDTH: usize = 6;
pub const SIC_WIDTH: usize = 4;

/// First year County Business Patterns and OES publish NAICS codes.
pub const NAICS_FIRST_YEAR: i32 = 1998;

// ---------------------------------------------------------------------------
// Normalizers
// ---------------------------------------------------------------------------

/// Left-pad a numeric code with `'0'` to `width`.
pub fn normalize_fips(raw: &str, width: usize) -> Result<String, PanelError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PanelError::malformed(raw, "empty code"));
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PanelError::malformed(raw, "code contains non-digit characters"));
    }
    if trimmed.len() > width {
        return Err(PanelError::malformed(
            raw,
            format!("{} digits exceeds width {width}", trimmed.len()),
        ));
    }
    Ok(format!("{trimmed:0>width$}"))
}

/// State FIPS of a 5-digit county FIPS.
pub fn derive_state_fip(county_fips: &str) -> Result<String, PanelError> {
    if county_fips.len() != COUNTY_FIPS_WIDTH || !county_fips.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PanelError::malformed(county_fips, "expected a 5-digit county FIPS"));
    }
    Ok(county_fips[..STATE_FIPS_WIDTH].to_string())
}

/// Truncate a NAICS code to 2, 3 or 6 digits.
///
/// The 3-digit level is right-padded with `"000"` so it keeps the 6-character
/// width the wage tables use (`"311"` → `"311000"`).
pub fn truncate_naics(code: &str, digits: usize) -> Result<String, PanelError> {
    if !matches!(digits, 2 | 3 | 6) {
        return Err(PanelError::malformed(
            code,
            format!("unsupported NAICS precision {digits}"),
        ));
    }
    if code.len() < digits || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PanelError::malformed(
            code,
            format!("cannot truncate to {digits} digits"),
        ));
    }
    let prefix = &code[..digits];
    Ok(if digits == 3 {
        format!("{prefix}000")
    } else {
        prefix.to_string()
    })
}

// ---------------------------------------------------------------------------
// Geography
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grain {
    County,
    State,
}

impl Grain {
    /// Name of the geography column in tables at this grain.
    pub fn geo_column(&self) -> &'static str {
        match self {
            Self::County => "fips",
            Self::State => "state_fip",
        }
    }

    pub fn default_output(&self) -> &'static str {
        match self {
            Self::County => "merged_data.csv",
            Self::State => "merged_data_states.csv",
        }
    }

}

impl fmt::Display for Grain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::County => write!(f, "county"),
            Self::State => write!(f, "state"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CountyKey {
    pub state_fip: String,
    pub county_fip: String,
    pub fips: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StateKey {
    pub state_fip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "grain", rename_all = "snake_case")]
pub enum GeoKey {
    County(CountyKey),
    State(StateKey),
}

impl GeoKey {
    /// Build a county key from any FIPS rendering up to 5 digits.
    pub fn county(raw_fips: &str) -> Result<Self, PanelError> {
        let fips = normalize_fips(raw_fips, COUNTY_FIPS_WIDTH)?;
        Ok(Self::County(CountyKey {
            state_fip: fips[..2].to_string(),
            county_fip: fips[2..].to_string(),
            fips,
        }))
    }

    /// Build a county key from separate state and county parts.
    pub fn county_parts(state_fip: &str, county_fip: &str) -> Result<Self, PanelError> {
        let state_fip = normalize_fips(state_fip, STATE_FIPS_WIDTH)?;
        let county_fip = normalize_fips(county_fip, 3)?;
        Ok(Self::County(CountyKey {
            fips: format!("{state_fip}{county_fip}"),
            state_fip,
            county_fip,
        }))
    }

    pub fn state(raw_fip: &str) -> Result<Self, PanelError> {
        Ok(Self::State(StateKey {
            state_fip: normalize_fips(raw_fip, STATE_FIPS_WIDTH)?,
        }))
    }

    /// Parse a key rendered at `grain` (the value of the grain's geo column).
    pub fn parse(raw: &str, grain: Grain) -> Result<Self, PanelError> {
        match grain {
            Grain::County => Self::county(raw),
            Grain::State => Self::state(raw),
        }
    }

    pub fn grain(&self) -> Grain {
        match self {
            Self::County(_) => Grain::County,
            Self::State(_) => Grain::State,
        }
    }

    /// The code written to the geo column: 5-digit FIPS or 2-digit state FIPS.
    pub fn code(&self) -> &str {
        match self {
            Self::County(c) => &c.fips,
            Self::State(s) => &s.state_fip,
        }
    }

    pub fn state_fip(&self) -> &str {
        match self {
            Self::County(c) => &c.state_fip,
            Self::State(s) => &s.state_fip,
        }
    }

    /// Project onto a coarser grain. Counties roll up to states; a state never
    /// projects down to a county.
    pub fn at_grain(&self, grain: Grain) -> Result<GeoKey, PanelError> {
        match (self, grain) {
            (Self::County(_), Grain::County) | (Self::State(_), Grain::State) => Ok(self.clone()),
            (Self::County(c), Grain::State) => Ok(Self::State(StateKey {
                state_fip: c.state_fip.clone(),
            })),
            (Self::State(s), Grain::County) => Err(PanelError::malformed(
                &s.state_fip,
                "state key cannot be projected to county grain",
            )),
        }
    }
}

impl fmt::Display for GeoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TimeKey {
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u8>,
}

impl TimeKey {
    pub fn annual(year: i32) -> Self {
        Self { year, month: None }
    }

    pub fn monthly(year: i32, month: u8) -> Result<Self, PanelError> {
        if !(1..=12).contains(&month) {
            return Err(PanelError::malformed(
                format!("{year}-{month}"),
                "month must be within 1..=12",
            ));
        }
        Ok(Self {
            year,
            month: Some(month),
        })
    }

    /// Parse a BLS period code: `M01`..`M12` are months, `M13` is the annual
    /// average and yields `None`.
    pub fn from_bls_period(year: i32, period: &str) -> Result<Option<Self>, PanelError> {
        let period = period.trim();
        let digits = period
            .strip_prefix('M')
            .ok_or_else(|| PanelError::malformed(period, "BLS period must start with 'M'"))?;
        let month: u8 = digits
            .parse()
            .map_err(|_| PanelError::malformed(period, "BLS period month is not a number"))?;
        if month == 13 {
            return Ok(None);
        }
        Self::monthly(year, month).map(Some)
    }

    /// Same year, and same month unless either side is annual.
    pub fn is_contemporaneous(&self, other: &TimeKey) -> bool {
        self.year == other.year
            && match (self.month, other.month) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
    }
}

impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.month {
            Some(m) => write!(f, "{}-{m:02}", self.year),
            None => write!(f, "{}", self.year),
        }
    }
}

// ---------------------------------------------------------------------------
// Industry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Taxonomy {
    Sic,
    Naics,
}

impl Taxonomy {
    /// Industry taxonomy in force for a data year.
    pub fn for_year(year: i32) -> Self {
        if year < NAICS_FIRST_YEAR {
            Self::Sic
        } else {
            Self::Naics
        }
    }

    pub fn width(&self) -> usize {
        match self {
            Self::Sic => SIC_WIDTH,
            Self::Naics => NAICS_WIDTH,
        }
    }
}

impl fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sic => write!(f, "SIC"),
            Self::Naics => write!(f, "NAICS"),
        }
    }
}

/// An industry code tagged with its taxonomy and the digit level it represents.
///
/// Equality includes the taxonomy, so a SIC code never matches a NAICS code
/// even when the digits coincide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IndustryCode {
    pub taxonomy: Taxonomy,
    pub code: String,
    pub precision: u8,
}

impl IndustryCode {
    /// Normalize a raw code for a data year. Codes carrying `-` or `/` are
    /// aggregate placeholders (e.g. `"11----"`) and are rejected.
    pub fn normalize(raw: &str, year: i32) -> Result<Self, PanelError> {
        Self::tagged(raw, Taxonomy::for_year(year))
    }

    /// Normalize a raw code whose taxonomy is known from the source layout
    /// (e.g. a `sic` vs `naics` column) rather than from the data year.
    pub fn tagged(raw: &str, taxonomy: Taxonomy) -> Result<Self, PanelError> {
        let trimmed = raw.trim();
        if trimmed.contains('-') || trimmed.contains('/') {
            return Err(PanelError::malformed(raw, "aggregate industry placeholder"));
        }
        let code = normalize_fips(trimmed, taxonomy.width())?;
        Ok(Self {
            taxonomy,
            precision: taxonomy.width() as u8,
            code,
        })
    }

    pub fn naics(raw: &str) -> Result<Self, PanelError> {
        Self::normalize(raw, NAICS_FIRST_YEAR)
    }

    /// The NAICS prefix at `digits` precision; `None` for SIC codes, which have
    /// no NAICS hierarchy to truncate into.
    pub fn naics_prefix(&self, digits: usize) -> Option<Result<IndustryCode, PanelError>> {
        if self.taxonomy != Taxonomy::Naics {
            return None;
        }
        Some(truncate_naics(&self.code, digits).map(|code| IndustryCode {
            taxonomy: Taxonomy::Naics,
            code,
            precision: digits as u8,
        }))
    }
}

impl fmt::Display for IndustryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.taxonomy, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_short_fips() {
        assert_eq!(normalize_fips("1001", 5).unwrap(), "01001");
        assert_eq!(normalize_fips(" 6 ", 2).unwrap(), "06");
        assert_eq!(normalize_fips("36061", 5).unwrap(), "36061");
    }

    #[test]
    fn rejects_bad_fips() {
        assert!(normalize_fips("360610", 5).is_err());
        assert!(normalize_fips("36O61", 5).is_err());
        assert!(normalize_fips("1001.0", 5).is_err());
        assert!(normalize_fips("  ", 5).is_err());
    }

    #[test]
    fn state_from_county() {
        assert_eq!(derive_state_fip("36061").unwrap(), "36");
        assert!(derive_state_fip("3606").is_err());
    }

    #[test]
    fn naics_truncation_levels() {
        assert_eq!(truncate_naics("311812", 2).unwrap(), "31");
        assert_eq!(truncate_naics("311812", 3).unwrap(), "311000");
        assert_eq!(truncate_naics("311812", 6).unwrap(), "311812");
        assert!(truncate_naics("311812", 4).is_err());
        assert!(truncate_naics("31", 3).is_err());
    }

    #[test]
    fn county_key_parts() {
        let key = GeoKey::county("1001").unwrap();
        match &key {
            GeoKey::County(c) => {
                assert_eq!(c.state_fip, "01");
                assert_eq!(c.county_fip, "001");
                assert_eq!(c.fips, "01001");
            }
            GeoKey::State(_) => panic!("expected county"),
        }
        assert_eq!(GeoKey::county_parts("1", "1").unwrap(), key);
    }

    #[test]
    fn county_rolls_up_to_state() {
        let county = GeoKey::county("36061").unwrap();
        assert_eq!(county.at_grain(Grain::State).unwrap(), GeoKey::state("36").unwrap());
        assert!(GeoKey::state("36").unwrap().at_grain(Grain::County).is_err());
    }

    #[test]
    fn bls_periods() {
        assert_eq!(
            TimeKey::from_bls_period(2010, "M03").unwrap(),
            Some(TimeKey::monthly(2010, 3).unwrap())
        );
        assert_eq!(TimeKey::from_bls_period(2010, "M13").unwrap(), None);
        assert!(TimeKey::from_bls_period(2010, "Q01").is_err());
        assert!(TimeKey::from_bls_period(2010, "M14").is_err());
    }

    #[test]
    fn contemporaneous_rule() {
        let march = TimeKey::monthly(2010, 3).unwrap();
        let april = TimeKey::monthly(2010, 4).unwrap();
        let annual = TimeKey::annual(2010);
        assert!(march.is_contemporaneous(&annual));
        assert!(annual.is_contemporaneous(&april));
        assert!(!march.is_contemporaneous(&april));
        assert!(!annual.is_contemporaneous(&TimeKey::annual(2011)));
    }

    #[test]
    fn industry_taxonomy_by_year() {
        let sic = IndustryCode::normalize("201", 1997).unwrap();
        assert_eq!(sic.taxonomy, Taxonomy::Sic);
        assert_eq!(sic.code, "0201");
        assert!(sic.naics_prefix(3).is_none());

        let naics = IndustryCode::normalize("311812", 2005).unwrap();
        let three = naics.naics_prefix(3).unwrap().unwrap();
        assert_eq!(three.code, "311000");
        assert_eq!(three.precision, 3);

        assert!(IndustryCode::normalize("11----", 2005).is_err());
        assert!(IndustryCode::normalize("31-33/", 2005).is_err());
    }

    #[test]
    fn taxonomies_never_compare_equal() {
        let a = IndustryCode { taxonomy: Taxonomy::Sic, code: "2011".into(), precision: 4 };
        let b = IndustryCode { taxonomy: Taxonomy::Naics, code: "2011".into(), precision: 4 };
        assert_ne!(a, b);
    }
}
