// Spreadsheet and CSV/TSV import into a recon Table

use std::io::Read;
use std::path::Path;

use benchgrid_recon::{ReconError, Table, Value};
use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{Duration, NaiveDate};
use tracing::debug;

/// Load the first sheet (or the whole text file) of `path` as a table.
///
/// The first row holds the column headers. Dispatch is by extension:
/// xlsx/xlsm/xls/xlsb/ods go through calamine, csv is delimiter-sniffed,
/// tsv/tab are tab separated.
pub fn load_table(path: &Path) -> Result<Table, ReconError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let table = match ext.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => import_workbook(path),
        "csv" => {
            let content = read_file_as_utf8(path)?;
            let delimiter = sniff_delimiter(&content);
            Table::from_csv_reader(content.as_bytes(), delimiter)
        }
        "tsv" | "tab" => {
            let content = read_file_as_utf8(path)?;
            Table::from_csv_reader(content.as_bytes(), b'\t')
        }
        other => Err(ReconError::Io(format!(
            "{}: unsupported file type '{}' (expected xlsx, xls, xlsb, ods, csv or tsv)",
            path.display(),
            other
        ))),
    }?;

    debug!(path = %path.display(), rows = table.len(), columns = table.width(), "table loaded");
    Ok(table)
}

// ---------------------------------------------------------------------------
// Workbooks
// ---------------------------------------------------------------------------

fn import_workbook(path: &Path) -> Result<Table, ReconError> {
    let io_err = |e: String| ReconError::Io(format!("{}: {}", path.display(), e));

    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| io_err(format!("failed to open workbook: {}", e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| io_err("workbook contains no sheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| io_err(format!("failed to read sheet '{}': {}", sheet_name, e)))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Table::new(Vec::<String>::new()));
    };

    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell_value(cell).key_text() {
            Some(name) => name,
            None => format!("Unnamed: {}", i),
        })
        .collect();

    let mut table = Table::new(headers);
    for row in rows {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        table.push(row.iter().map(cell_value).collect());
    }
    Ok(table)
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => {
            if s.is_empty() {
                Value::Null
            } else {
                Value::Text(s.clone())
            }
        }
        Data::Float(n) => Value::Number(*n),
        Data::Int(n) => Value::Number(*n as f64),
        Data::Bool(b) => Value::text(if *b { "TRUE" } else { "FALSE" }),
        Data::Error(e) => Value::Text(format!("#{:?}", e)),
        Data::DateTime(dt) => serial_to_iso(dt.as_f64()).map(Value::Text).unwrap_or(Value::Null),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
    }
}

/// Excel serial date (1900 system) to ISO text. Dates without a time part
/// render as `YYYY-MM-DD`.
fn serial_to_iso(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    let dt = epoch.checked_add_signed(Duration::milliseconds(millis))?;
    let has_time = serial.fract().abs() > 0.0001;
    Some(if has_time {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        dt.format("%Y-%m-%d").to_string()
    })
}

// ---------------------------------------------------------------------------
// Text files
// ---------------------------------------------------------------------------

const DELIMITERS: [u8; 4] = [b',', b'\t', b';', b'|'];
const SNIFF_LINES: usize = 10;

/// Pick the delimiter whose records agree with the header's width.
///
/// Declaration exports are comma-separated far more often than not, so a
/// comma wins every tie and is the answer when nothing splits the header.
fn sniff_delimiter(content: &str) -> u8 {
    let sample: String = content
        .lines()
        .take(SNIFF_LINES)
        .flat_map(|line| [line, "\n"])
        .collect();

    let mut best = (b',', (0usize, 0usize));
    for delimiter in DELIMITERS {
        let widths: Vec<usize> = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(sample.as_bytes())
            .records()
            .map_while(Result::ok)
            .map(|record| record.len())
            .collect();

        let Some((&header, body)) = widths.split_first() else {
            continue;
        };
        if header < 2 {
            continue;
        }
        // Agreeing body rows first, then header width
        let score = (body.iter().filter(|&&w| w == header).count(), header);
        if score > best.1 {
            best = (delimiter, score);
        }
    }
    best.0
}

/// Read file and convert to UTF-8 if needed.
///
/// Declaration exports are often GB18030 (Excel "CSV" on a Chinese locale);
/// anything that is neither UTF-8 nor GB18030 is read as Windows-1252.
fn read_file_as_utf8(path: &Path) -> Result<String, ReconError> {
    let mut bytes = Vec::new();
    std::fs::File::open(path)
        .and_then(|mut f| f.read_to_end(&mut bytes))
        .map_err(|e| ReconError::Io(format!("{}: {}", path.display(), e)))?;
    Ok(decode_text(bytes))
}

fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, had_errors) = encoding_rs::GB18030.decode(&bytes);
            if !had_errors {
                return decoded.into_owned();
            }
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    }
}
