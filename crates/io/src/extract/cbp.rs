//! County Business Patterns employment by industry.

use kaitz_recon::sector::SectorEmployment;
use kaitz_recon::{GeoKey, IndustryCode, Taxonomy};

use super::{at_row, parse_amount, SourceFile};
use crate::error::LoadError;

/// Aggregate and range codes (`------`, `31----`, `311///`) carry
/// no single industry.
pub fn is_aggregate_code(raw: &str) -> bool {
    raw.is_empty() || raw.contains('-') || raw.contains('/')
}

/// Employment rows from `cbp{yy}co` files. The year comes from the file name;
/// files before 1998 carry a `sic` column instead of `naics`.
pub fn extract_sector(files: &[SourceFile]) -> Result<Vec<SectorEmployment>, LoadError> {
    let mut out = Vec::new();
    for file in files {
        let year = file.year()?;
        for table in &file.tables {
            let state = table.require("fipstate")?;
            let county = table.require("fipscty")?;
            let emp = table.require("emp")?;
            let (code, column) = table.require_any(&["naics", "sic"])?;
            let taxonomy = if column == "sic" { Taxonomy::Sic } else { Taxonomy::Naics };
            if taxonomy != Taxonomy::for_year(year) {
                log::warn!(
                    "{}: {column} codes in a {year} file (expected {})",
                    table.origin.display(),
                    Taxonomy::for_year(year)
                );
            }

            let before = out.len();
            for row in 0..table.len() {
                let raw = table.cell(row, code);
                if is_aggregate_code(raw) {
                    continue;
                }
                out.push(SectorEmployment {
                    geo: at_row(table, row, GeoKey::county_parts(table.cell(row, state), table.cell(row, county)))?,
                    year,
                    industry: at_row(table, row, IndustryCode::tagged(raw, taxonomy))?,
                    emp: parse_amount(table, row, emp)?,
                });
            }
            log::debug!("{}: {} industry rows", table.origin.display(), out.len() - before);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::parse_csv;
    use std::path::{Path, PathBuf};

    fn file(name: &str, content: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(name),
            tables: vec![parse_csv(content, Path::new(name)).unwrap()],
        }
    }

    #[test]
    fn test_naics_rows_with_uppercase_headers() {
        let f = file(
            "cbp15co.zip",
            "FIPSTATE,FIPSCTY,NAICS,EMPFLAG,EMP\n\
             36,61,------,,1000\n\
             36,61,31----,,300\n\
             36,61,311///,,300\n\
             36,61,311111,,120\n\
             36,61,312111,,20\n",
        );
        let rows = extract_sector(&[f]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].geo, GeoKey::county("36061").unwrap());
        assert_eq!(rows[0].year, 2015);
        assert_eq!(rows[0].industry, IndustryCode::naics("311111").unwrap());
        assert_eq!(rows[1].industry.code, "312111");
        assert_eq!(rows[0].emp, 120.0);
    }

    #[test]
    fn test_sic_era() {
        let f = file("cbp95co.zip", "fipstate,fipscty,sic,emp\n1,1,07--,10\n1,1,0700,12\n");
        let rows = extract_sector(&[f]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].year, 1995);
        assert_eq!(rows[0].industry.taxonomy, Taxonomy::Sic);
        assert_eq!(rows[0].geo, GeoKey::county("01001").unwrap());
    }

    #[test]
    fn test_year_required_in_file_name() {
        let f = file("cbp.csv", "fipstate,fipscty,naics,emp\n36,61,311111,1\n");
        assert!(extract_sector(&[f]).is_err());
    }
}
