// Tabular readers: CSV (with encoding fallback), zip members, Excel sheets.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use regex::Regex;

use crate::error::LoadError;

/// A decoded table: trimmed headers plus raw string cells. `origin` names the
/// file (and archive member) the rows came from; `lines` holds the 1-based
/// source line (or sheet row) of each entry in `rows`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub origin: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub lines: Vec<usize>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Case-insensitive header lookup.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    }

    pub fn require(&self, name: &str) -> Result<usize, LoadError> {
        self.column(name).ok_or_else(|| LoadError::MissingHeader {
            path: self.origin.clone(),
            column: name.to_string(),
        })
    }

    /// First of `names` present in the header, with the matched name.
    pub fn require_any<'n>(&self, names: &[&'n str]) -> Result<(usize, &'n str), LoadError> {
        names
            .iter()
            .find_map(|n| self.column(n).map(|i| (i, *n)))
            .ok_or_else(|| LoadError::MissingHeader {
                path: self.origin.clone(),
                column: names.join("|"),
            })
    }

    /// Trimmed cell; short rows read as empty.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|s| s.trim())
            .unwrap_or("")
    }

    /// 1-based file line (or sheet row) a data row was read from.
    pub fn line(&self, row: usize) -> usize {
        self.lines.get(row).copied().unwrap_or(row + 2)
    }

    pub fn field_error(&self, row: usize, message: impl Into<String>) -> LoadError {
        LoadError::field(self.origin.clone(), self.line(row), message)
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// UTF-8 first; on failure fall back to Windows-1252 (a superset of the
/// Latin-1 the FIPS directory ships in).
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    }
}

pub fn read_bytes(path: &Path) -> Result<Vec<u8>, LoadError> {
    let mut file = std::fs::File::open(path).map_err(|e| LoadError::io(path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| LoadError::io(path, e))?;
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Parse comma-separated text with a header row. Headers are trimmed (some
/// BLS exports pad them with spaces); ragged rows are accepted.
pub fn parse_csv(content: &str, origin: &Path) -> Result<RawTable, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

    let csv_error = |error| LoadError::Csv {
        path: origin.to_path_buf(),
        error,
    };

    let headers = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    let mut lines = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        lines.push(record.position().map_or(rows.len() + 2, |p| p.line() as usize));
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable {
        origin: origin.to_path_buf(),
        headers,
        rows,
        lines,
    })
}

// ---------------------------------------------------------------------------
// Excel
// ---------------------------------------------------------------------------

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Integral floats print without decimals (codes and counts)
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Data::Float(n) => format!("{n}"),
        Data::Int(n) => format!("{n}"),
        other => other.to_string(),
    }
}

/// Read the first sheet of an xls/xlsx workbook held in memory.
///
/// Older wage workbooks carry title rows above the header. With
/// `header_hint`, the header is the first row containing that label
/// (case-insensitive); otherwise it is the first row.
pub fn parse_excel(bytes: Vec<u8>, origin: &Path, header_hint: Option<&str>) -> Result<RawTable, LoadError> {
    let excel_error = |message: String| LoadError::Excel {
        path: origin.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| excel_error(format!("failed to open workbook: {e}")))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| excel_error("workbook contains no sheets".into()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| excel_error(format!("failed to read sheet '{sheet_name}': {e}")))?;

    let mut grid: Vec<Vec<String>> = range.rows().map(|r| r.iter().map(cell_text).collect()).collect();
    // Sheet row number of the first grid row (the used range may start lower).
    let first_row = range.start().map_or(1, |(r, _)| r as usize + 1);

    let header_row = match header_hint {
        Some(hint) => grid
            .iter()
            .position(|row| row.iter().any(|c| c.trim().eq_ignore_ascii_case(hint)))
            .ok_or_else(|| LoadError::MissingHeader {
                path: origin.to_path_buf(),
                column: hint.to_string(),
            })?,
        None => 0,
    };
    if grid.len() <= header_row {
        return Err(excel_error(format!("sheet '{sheet_name}' is empty")));
    }

    let rows = grid.split_off(header_row + 1);
    let headers = grid
        .pop()
        .unwrap_or_default()
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let (lines, rows): (Vec<usize>, Vec<Vec<String>>) = rows
        .into_iter()
        .enumerate()
        .filter(|(_, r)| r.iter().any(|c| !c.trim().is_empty()))
        .map(|(i, r)| (first_row + header_row + 1 + i, r))
        .unzip();

    Ok(RawTable {
        origin: origin.to_path_buf(),
        headers,
        rows,
        lines,
    })
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Excel,
    Zip,
}

fn format_of(name: &str) -> Format {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".zip") {
        Format::Zip
    } else if lower.ends_with(".xls") || lower.ends_with(".xlsx") {
        Format::Excel
    } else {
        Format::Csv
    }
}

fn parse_member(bytes: Vec<u8>, origin: &Path, header_hint: Option<&str>) -> Result<Option<RawTable>, LoadError> {
    let name = origin.to_string_lossy();
    match format_of(&name) {
        Format::Excel => parse_excel(bytes, origin, header_hint).map(Some),
        Format::Csv if name.to_ascii_lowercase().ends_with(".csv") || name.to_ascii_lowercase().ends_with(".txt") => {
            parse_csv(&decode_text(bytes), origin).map(Some)
        }
        // Readmes, layouts and nested archives
        _ => Ok(None),
    }
}

/// Every table in the file at `path`, given its raw bytes. Zip archives yield
/// one table per CSV/text/Excel member, in archive order.
pub fn parse_tables(bytes: Vec<u8>, path: &Path, header_hint: Option<&str>) -> Result<Vec<RawTable>, LoadError> {
    let name = path.to_string_lossy();
    match format_of(&name) {
        Format::Csv => Ok(vec![parse_csv(&decode_text(bytes), path)?]),
        Format::Excel => Ok(vec![parse_excel(bytes, path, header_hint)?]),
        Format::Zip => {
            let zip_error = |error| LoadError::Zip {
                path: path.to_path_buf(),
                error,
            };
            let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(zip_error)?;
            let mut tables = Vec::new();
            for i in 0..archive.len() {
                let mut member = archive.by_index(i).map_err(zip_error)?;
                if member.is_dir() {
                    continue;
                }
                let origin = path.join(member.name());
                let mut content = Vec::new();
                member
                    .read_to_end(&mut content)
                    .map_err(|e| LoadError::io(origin.clone(), e))?;
                if let Some(table) = parse_member(content, &origin, header_hint)? {
                    log::debug!("{}: {} rows", origin.display(), table.len());
                    tables.push(table);
                }
            }
            Ok(tables)
        }
    }
}

/// Data year encoded in a file name: a four-digit run in 1900..=2099, else the
/// first two-digit run (`cbp10co.zip` → 2010, `oes97in3.zip` → 1997).
pub fn year_from_file_name(path: &Path) -> Option<i32> {
    let stem = path.file_name()?.to_string_lossy().into_owned();
    let digits = Regex::new(r"\d+").ok()?;
    let runs: Vec<&str> = digits.find_iter(&stem).map(|m| m.as_str()).collect();

    if let Some(year) = runs
        .iter()
        .filter(|r| r.len() == 4)
        .filter_map(|r| r.parse::<i32>().ok())
        .find(|y| (1900..=2099).contains(y))
    {
        return Some(year);
    }
    runs.iter()
        .find(|r| r.len() == 2)
        .and_then(|r| r.parse::<i32>().ok())
        .map(|yy| if yy >= 90 { 1900 + yy } else { 2000 + yy })
}
