// sopguard-core/src/infrastructure/tabular.rs
//
// File adapters for tables and reports. Delimited cells are loaded as text
// (empty cell = null); workbook cells keep their native number, boolean and
// date types. Numeric and date interpretation is left to the operations.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use encoding_rs::{UTF_8, WINDOWS_1252};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use tracing::{debug, info, instrument, warn};

use crate::domain::checklist::Checklist;
use crate::domain::report::ValidationReport;
use crate::domain::table::{Table, Value};
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::atomic_write;

/// Sheet name of the exported results workbook.
pub const RESULTS_SHEET: &str = "results";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Csv,
    Tsv,
    Json,
    Excel,
}

impl TabularFormat {
    pub fn from_path(path: &Path) -> Result<Self, InfrastructureError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "txt" => Ok(TabularFormat::Csv),
            "tsv" | "tab" => Ok(TabularFormat::Tsv),
            "json" => Ok(TabularFormat::Json),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(TabularFormat::Excel),
            _ => Err(InfrastructureError::UnsupportedFormat(path.display().to_string())),
        }
    }

    fn delimiter(self) -> u8 {
        match self {
            TabularFormat::Tsv => b'\t',
            _ => b',',
        }
    }
}

// --- LOADING ---

/// Loads a table. `sheet` picks a worksheet by name in workbooks (first sheet
/// when `None`) and is ignored for delimited files.
#[instrument]
pub fn load_table(path: &Path, sheet: Option<&str>) -> Result<Table, InfrastructureError> {
    let path_str = path.display().to_string();
    if !path.exists() {
        return Err(InfrastructureError::FileNotFound(path_str));
    }

    let (columns, rows) = match TabularFormat::from_path(path)? {
        TabularFormat::Json => return Err(InfrastructureError::UnsupportedFormat(path_str)),
        TabularFormat::Excel => read_sheet(path, sheet)?,
        format => {
            if let Some(sheet) = sheet {
                warn!(sheet, "⚠️ Sheet name ignored for delimited file {}", path_str);
            }
            read_delimited(path, format)?
        }
    };

    let table = Table::new(columns, rows).map_err(|source| InfrastructureError::InvalidTable {
        path: path_str.clone(),
        source,
    })?;
    info!(
        rows = table.len(),
        columns = table.columns().len(),
        "📄 Loaded {}",
        path_str
    );
    Ok(table)
}

pub fn load_checklist(path: &Path) -> Result<Checklist, InfrastructureError> {
    let table = load_table(path, None)?;
    Checklist::from_table(&table).map_err(|source| InfrastructureError::InvalidTable {
        path: path.display().to_string(),
        source,
    })
}

type RawTable = (Vec<String>, Vec<Vec<Value>>);

fn read_delimited(path: &Path, format: TabularFormat) -> Result<RawTable, InfrastructureError> {
    let path_str = path.display().to_string();
    let bytes = fs::read(path)?;
    let text = decode_text(&bytes, &path_str);

    let csv_err = |source| InfrastructureError::Csv {
        path: path_str.clone(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(format.delimiter())
        .has_headers(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        rows.push(record.iter().map(text_cell).collect());
    }
    Ok((columns, rows))
}

/// UTF-8 (BOM stripped) when the bytes are valid, Latin-1 otherwise.
fn decode_text<'a>(bytes: &'a [u8], path_str: &str) -> Cow<'a, str> {
    let (text, malformed) = UTF_8.decode_with_bom_removal(bytes);
    if !malformed {
        return text;
    }
    debug!("Falling back to Latin-1 for {}", path_str);
    WINDOWS_1252.decode_without_bom_handling(bytes).0
}

fn read_sheet(path: &Path, sheet: Option<&str>) -> Result<RawTable, InfrastructureError> {
    let path_str = path.display().to_string();
    let workbook_err = |source| InfrastructureError::Workbook {
        path: path_str.clone(),
        source,
    };

    let mut workbook = open_workbook_auto(path).map_err(workbook_err)?;
    let names = workbook.sheet_names();
    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| InfrastructureError::SheetNotFound {
                path: path_str.clone(),
                sheet: wanted.to_string(),
                available: names.join(", "),
            })?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| InfrastructureError::EmptyWorkbook(path_str.clone()))?,
    };
    debug!(sheet = %name, "Reading worksheet of {}", path_str);

    let range = workbook.worksheet_range(&name).map_err(workbook_err)?;
    let mut cells = range.rows();

    let columns = match cells.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(idx, cell)| match excel_cell(cell) {
                Value::Null => format!("Unnamed: {}", idx),
                value => value.to_string(),
            })
            .collect(),
        None => Vec::new(),
    };
    let rows = cells.map(|row| row.iter().map(excel_cell).collect()).collect();
    Ok((columns, rows))
}

fn text_cell(raw: &str) -> Value {
    if raw.trim().is_empty() {
        Value::Null
    } else {
        Value::text(raw)
    }
}

fn excel_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => text_cell(s),
        Data::Float(f) => Value::Number(*f),
        Data::Int(i) => Value::from(*i),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(Value::Date)
            .unwrap_or_else(|| Value::Number(dt.as_f64())),
    }
}

// --- EXPORT ---

/// Writes the report as CSV (`details` as compact JSON), as a JSON array or
/// as an Excel workbook, depending on the extension of `path`.
#[instrument(skip(report))]
pub fn export_report(report: &ValidationReport, path: &Path) -> Result<(), InfrastructureError> {
    let bytes = match TabularFormat::from_path(path)? {
        TabularFormat::Json => serde_json::to_vec_pretty(report.records())?,
        TabularFormat::Excel => report_to_xlsx(report)?,
        format => report_to_csv(report, format.delimiter())?,
    };
    atomic_write(path, bytes)?;
    info!(records = report.total(), "💾 Results written to {}", path.display());
    Ok(())
}

fn report_header(report: &ValidationReport) -> Vec<&'static str> {
    let mut header = vec!["check", "tool", "passed", "details"];
    if report.declares_id() {
        header.push("id");
    }
    if report.declares_severity() {
        header.push("severity");
    }
    header
}

pub fn report_to_csv(report: &ValidationReport, delimiter: u8) -> Result<Vec<u8>, InfrastructureError> {
    let csv_err = |source| InfrastructureError::Csv {
        path: "<report>".to_string(),
        source,
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer.write_record(report_header(report)).map_err(csv_err)?;

    for record in report.records() {
        let mut row = vec![
            record.check.clone(),
            record.tool.clone().unwrap_or_default(),
            record.passed.to_string(),
            serde_json::to_string(&record.details)?,
        ];
        if report.declares_id() {
            row.push(cell_text(record.id.as_ref()));
        }
        if report.declares_severity() {
            row.push(cell_text(record.severity.as_ref()));
        }
        writer.write_record(&row).map_err(csv_err)?;
    }

    writer
        .into_inner()
        .map_err(|e| InfrastructureError::Io(e.into_error()))
}

/// One `results` sheet with the CSV layout. `passed` is a real boolean cell.
pub fn report_to_xlsx(report: &ValidationReport) -> Result<Vec<u8>, InfrastructureError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(RESULTS_SHEET)?;

    for (col, name) in report_header(report).into_iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, name, &bold)?;
    }

    for (idx, record) in report.records().iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string(row, 0, record.check.as_str())?;
        if let Some(tool) = &record.tool {
            sheet.write_string(row, 1, tool.as_str())?;
        }
        sheet.write_boolean(row, 2, record.passed)?;
        sheet.write_string(row, 3, serde_json::to_string(&record.details)?)?;

        let mut col = 4;
        if report.declares_id() {
            write_value(sheet, row, col, record.id.as_ref())?;
            col += 1;
        }
        if report.declares_severity() {
            write_value(sheet, row, col, record.severity.as_ref())?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_value(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: Option<&Value>,
) -> Result<(), XlsxError> {
    match value {
        None | Some(Value::Null) => {}
        Some(Value::Number(n)) => {
            sheet.write_number(row, col, *n)?;
        }
        Some(Value::Bool(b)) => {
            sheet.write_boolean(row, col, *b)?;
        }
        Some(other) => {
            sheet.write_string(row, col, other.to_string())?;
        }
    }
    Ok(())
}

fn cell_text(value: Option<&Value>) -> String {
    value.map(Value::to_string).unwrap_or_default()
}
