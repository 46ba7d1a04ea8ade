// XLSX report rendering for a reconciliation run

use std::path::{Path, PathBuf};

use benchgrid_recon::config::ReportSettings;
use benchgrid_recon::{ColumnClasses, ReconConfig, ReconError, RowSource, RunOutput, Value};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook as XlsxWorkbook, Worksheet};
use serde::Serialize;
use tracing::info;

const DECLARATION_FILL: u32 = 0xFFFF00;
const SEPARATOR_FILL: u32 = 0xF2F2F2;
const RED_FONT: u32 = 0xFF0000;

/// What was written, for the CLI summary and `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub separators: usize,
    pub merges: usize,
    pub formulas: usize,
}

/// `<prefix>_<YYYYmmdd_HHMMSS>.xlsx`
pub fn report_file_name(prefix: &str, at: chrono::NaiveDateTime) -> String {
    format!("{}_{}.xlsx", prefix, at.format("%Y%m%d_%H%M%S"))
}

/// Render `output` as a single-sheet workbook and save it to `path`.
pub fn write_report(output: &RunOutput, config: &ReconConfig, path: &Path) -> Result<ReportSummary, ReconError> {
    let mut workbook = XlsxWorkbook::new();
    let mut summary = render(output, config, &mut workbook)?;

    workbook
        .save(path)
        .map_err(|e| ReconError::Io(format!("failed to save {}: {}", path.display(), e)))?;

    summary.path = path.to_path_buf();
    info!(path = %path.display(), rows = summary.rows, "report written");
    Ok(summary)
}

/// Add the report sheet to `workbook`.
pub fn render(output: &RunOutput, config: &ReconConfig, workbook: &mut XlsxWorkbook) -> Result<ReportSummary, ReconError> {
    let settings = &config.report;
    let xlsx_err = |e: rust_xlsxwriter::XlsxError| ReconError::Io(format!("failed to write report: {}", e));

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(&settings.sheet_name).map_err(xlsx_err)?;

    let table = &output.table;
    let header = header_format(settings);
    for (col, name) in table.columns().iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, name, &header)
            .map_err(xlsx_err)?;
    }
    worksheet.set_freeze_panes(1, 0).map_err(xlsx_err)?;

    // Per-column formats for plain and declaration rows
    let body: Vec<Format> = table
        .columns()
        .iter()
        .map(|name| column_format(name, settings, &config.normalize))
        .collect();
    let highlighted: Vec<Format> = body
        .iter()
        .map(|f| f.clone().set_background_color(Color::RGB(DECLARATION_FILL)))
        .collect();
    let separator = base_format(settings).set_background_color(Color::RGB(SEPARATOR_FILL));

    let mut summary = ReportSummary {
        path: PathBuf::new(),
        rows: table.len(),
        separators: 0,
        merges: 0,
        formulas: 0,
    };

    for (i, row) in table.rows().iter().enumerate() {
        let excel_row = i as u32 + 1;
        if row.source == Some(RowSource::Separator) || row.cells.iter().all(Value::is_separator) {
            for col in 0..table.width() {
                worksheet
                    .write_blank(excel_row, col as u16, &separator)
                    .map_err(xlsx_err)?;
            }
            continue;
        }

        let formats = if output.declaration_indices.binary_search(&i).is_ok() {
            &highlighted
        } else {
            &body
        };
        for (col, value) in row.cells.iter().enumerate() {
            write_cell(worksheet, excel_row, col as u16, value, &formats[col]).map_err(xlsx_err)?;
        }
    }

    if output.report.separators {
        let merge = base_format(settings)
            .set_background_color(Color::RGB(SEPARATOR_FILL))
            .set_text_wrap()
            .set_align(FormatAlign::Left)
            .set_align(FormatAlign::Top);

        for &s in &output.separator_indices {
            let excel_row = s as u32 + 1;
            // 1-based row of the declaration that follows
            let declaration_row = excel_row + 2;
            worksheet
                .set_row_height(excel_row, settings.separator_row_height)
                .map_err(xlsx_err)?;

            for (index, span) in output.report.merge_regions.iter().enumerate() {
                let (first, last) = (span.first - 1, span.last - 1);
                worksheet
                    .merge_range(excel_row, first, excel_row, last, "", &merge)
                    .map_err(xlsx_err)?;
                let formula = output.report.formula(index, declaration_row);
                let formula = formula.strip_prefix('=').unwrap_or(&formula);
                worksheet
                    .write_formula_with_format(excel_row, first, formula, &merge)
                    .map_err(xlsx_err)?;
                summary.merges += 1;
                summary.formulas += 1;
            }
            summary.separators += 1;
        }
    }

    Ok(summary)
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
    format: &Format,
) -> Result<(), rust_xlsxwriter::XlsxError> {
    match value {
        Value::Number(n) if n.is_finite() => {
            worksheet.write_number_with_format(row, col, *n, format)?;
        }
        Value::Text(s) if !s.is_empty() => {
            worksheet.write_string_with_format(row, col, s, format)?;
        }
        _ => {
            worksheet.write_blank(row, col, format)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

fn base_format(settings: &ReportSettings) -> Format {
    Format::new()
        .set_font_name(&settings.font_name)
        .set_font_size(settings.font_size)
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::VerticalCenter)
}

fn header_format(settings: &ReportSettings) -> Format {
    base_format(settings)
        .set_bold()
        .set_text_wrap()
        .set_align(FormatAlign::Center)
}

fn column_format(name: &str, settings: &ReportSettings, classes: &ColumnClasses) -> Format {
    let mut format = base_format(settings);
    if let Some(num_format) = number_format(name, settings, classes) {
        format = format.set_num_format(num_format);
    }
    if settings.red_font_columns.iter().any(|c| c == name) {
        format = format.set_font_color(Color::RGB(RED_FONT));
    }
    format
}

/// Excel number format for a column, same precedence as normalization.
fn number_format(name: &str, settings: &ReportSettings, classes: &ColumnClasses) -> Option<&'static str> {
    let has = |list: &[String]| list.iter().any(|c| c == name);
    if has(&classes.force_text) {
        Some("@")
    } else if has(&classes.percent) || has(&settings.extra_percent_columns) {
        Some("0.00%")
    } else if has(&classes.decimal_2) {
        Some("0.00")
    } else if has(&classes.decimal_1) {
        Some("0.0")
    } else if has(&classes.integer) {
        Some("0")
    } else {
        None
    }
}
