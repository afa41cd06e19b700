//! Reading the first worksheet of a workbook into a string table.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use calamine::{open_workbook_auto, Data, ExcelDateTime, Reader};
use time::macros::{datetime, format_description};
use time::{Duration, PrimitiveDateTime};

/// Day zero of Excel's 1900 date system, leap-year bug included.
const EXCEL_EPOCH: PrimitiveDateTime = datetime!(1899-12-30 0:00);
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Header row plus data rows, every row padded to the header width.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Build from raw rows where row 0 is the header row.
    ///
    /// Fails when there is no data row at all.
    pub fn from_rows(mut raw: Vec<Vec<String>>) -> Result<Self> {
        if raw.len() < 2 {
            bail!(
                "sheet must contain a header row and at least one data row (found {} row(s))",
                raw.len()
            );
        }
        let headers = raw.remove(0);
        let width = headers.len();
        let rows = raw
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();
        Ok(Self { headers, rows })
    }
}

/// Read the first sheet of any workbook format calamine understands.
pub fn read_first_sheet(path: &Path) -> Result<Table> {
    if !path.exists() {
        bail!("input file not found: {}", path.display());
    }

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| anyhow!("failed to open workbook {}: {}", path.display(), e))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook {} has no sheets", path.display()))?
        .map_err(|e| anyhow!("failed to read first sheet of {}: {}", path.display(), e))?;

    let raw: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    tracing::debug!(rows = raw.len(), path = %path.display(), "read worksheet");
    Table::from_rows(raw).with_context(|| format!("malformed sheet in {}", path.display()))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => format!("{}", f),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR({:?})", e),
        Data::DateTime(dt) => excel_datetime_to_string(dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Render a date-typed cell as ISO-8601 so it matches text exports of the
/// same sheet. Durations stay as their raw number.
fn excel_datetime_to_string(dt: &ExcelDateTime) -> String {
    let serial = dt.as_f64();
    if dt.is_duration() {
        return serial.to_string();
    }

    let seconds = (serial * SECONDS_PER_DAY).round() as i64;
    EXCEL_EPOCH
        .checked_add(Duration::seconds(seconds))
        .and_then(|moment| {
            moment
                .format(format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second]"
                ))
                .ok()
        })
        .unwrap_or_else(|| serial.to_string())
}
