//! Reading and writing vocabulary workbooks
//!
//! Reading goes through `calamine`, writing through `rust_xlsxwriter`. The
//! read-only sheets (ID Ranges, Prefixes) are not read back; they are
//! recomputed from configuration every time a workbook is written.

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::{Duration, NaiveDate};
use rust_xlsxwriter::{
    Color, DataValidation, Format, FormatBorder, Workbook, Worksheet, XlsxError,
};
use tracing::{debug, info, warn};

use crate::cell::CellKind;
use crate::error::VocabError;
use crate::staging::write_file_atomic;
use crate::table::{Row, Table, Tables, SCHEME_SHEET};

const SCHEME_HEADERS: [&str; 2] = ["Field", "Value"];

/// Excel list validations are limited to 255 characters
const MAX_LIST_VALIDATION_LEN: usize = 255;

/// Read the editable sheets of a workbook file
pub fn read_workbook(path: &Path) -> Result<Tables, VocabError> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|e| VocabError::workbook(path.display(), e))?;
    let tables = read_tables(&mut workbook, &path.display().to_string())?;
    info!(
        "Read workbook {}: {} concept rows, {} collection rows",
        path.display(),
        tables.concepts.rows.len(),
        tables.collections.rows.len()
    );
    Ok(tables)
}

/// Read a workbook held in memory
pub fn read_workbook_bytes(bytes: Vec<u8>, source_name: &str) -> Result<Tables, VocabError> {
    let mut workbook =
        Xlsx::new(Cursor::new(bytes)).map_err(|e| VocabError::workbook(source_name, e))?;
    read_tables(&mut workbook, source_name)
}

fn read_tables<RS: Read + Seek>(
    workbook: &mut Xlsx<RS>,
    source_name: &str,
) -> Result<Tables, VocabError> {
    let names = workbook.sheet_names();
    let mut tables = Tables::default();

    let scheme = sheet_rows(workbook, SCHEME_SHEET, source_name)?;
    tables.scheme = scheme
        .into_iter()
        .skip(1)
        .filter_map(|(_, cells)| {
            let key = cells.first().map(|k| k.trim().to_string())?;
            let value = cells.get(1).cloned().unwrap_or_default();
            (!key.is_empty()).then_some((key, value))
        })
        .collect();

    for table in [&mut tables.concepts, &mut tables.collections] {
        read_table(workbook, table, source_name)?;
    }
    if names.iter().any(|n| n == tables.mappings.name) {
        read_table(workbook, &mut tables.mappings, source_name)?;
    } else {
        debug!("{} has no {} sheet", source_name, tables.mappings.name);
    }
    Ok(tables)
}

/// Rows of a sheet as text, with their 1-based sheet row numbers
fn sheet_rows<RS: Read + Seek>(
    workbook: &mut Xlsx<RS>,
    sheet: &str,
    source_name: &str,
) -> Result<Vec<(usize, Vec<String>)>, VocabError> {
    let range = workbook.worksheet_range(sheet).map_err(|e| {
        VocabError::workbook(source_name, format!("cannot read sheet \"{}\": {}", sheet, e))
    })?;
    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    let rows = range
        .rows()
        .enumerate()
        .map(|(i, row)| {
            let mut cells = vec![String::new(); first_col as usize];
            cells.extend(row.iter().map(data_to_string));
            (first_row as usize + i + 1, cells)
        })
        .collect();
    Ok(rows)
}

fn read_table<RS: Read + Seek>(
    workbook: &mut Xlsx<RS>,
    table: &mut Table,
    source_name: &str,
) -> Result<(), VocabError> {
    let rows = sheet_rows(workbook, table.name, source_name)?;
    let mut rows = rows.into_iter();
    let Some((_, header)) = rows.next() else {
        return Err(VocabError::workbook(
            source_name,
            format!("sheet \"{}\" is empty", table.name),
        ));
    };
    for (i, expected) in table.headers().enumerate() {
        let found = header.get(i).map(|h| h.trim()).unwrap_or("");
        if found != expected {
            return Err(VocabError::workbook(
                source_name,
                format!(
                    "sheet \"{}\" column {}: expected header \"{}\", found \"{}\"",
                    table.name,
                    i + 1,
                    expected,
                    found
                ),
            ));
        }
    }

    let width = table.columns.len();
    for (number, mut cells) in rows {
        if cells.iter().skip(width).any(|c| !c.trim().is_empty()) {
            warn!(
                "{} row {}: ignoring content beyond the last column",
                table.name, number
            );
        }
        cells.resize(width, String::new());
        let row = Row::new(number, cells);
        if !row.is_blank() {
            table.rows.push(row);
        }
    }
    Ok(())
}

/// Cell text as an editor sees it
fn data_to_string(data: &Data) -> String {
    match data {
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::String(s) => s.clone(),
        Data::Bool(true) => "Yes".to_string(),
        Data::Bool(false) => "No".to_string(),
        Data::DateTime(dt) => excel_date(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => e.to_string(),
        Data::Empty => String::new(),
    }
}

/// Excel serial day number to an ISO date; day 0 is 1899-12-30
fn excel_date(serial: f64) -> String {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|epoch| epoch.checked_add_signed(Duration::days(serial.floor() as i64)))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| serial.to_string())
}

struct Formats {
    header: Format,
    text: Format,
    read_only_header: Format,
}

impl Formats {
    fn new() -> Self {
        Formats {
            header: Format::new()
                .set_bold()
                .set_background_color(Color::RGB(0x00D9_E1F2))
                .set_border(FormatBorder::Thin)
                .set_text_wrap(),
            text: Format::new().set_text_wrap(),
            read_only_header: Format::new()
                .set_bold()
                .set_background_color(Color::Gray)
                .set_font_color(Color::White)
                .set_border(FormatBorder::Thin),
        }
    }
}

fn row_num(index: usize) -> Result<u32, XlsxError> {
    u32::try_from(index).map_err(|_| XlsxError::RowColumnLimitError)
}

fn col_num(index: usize) -> Result<u16, XlsxError> {
    u16::try_from(index).map_err(|_| XlsxError::RowColumnLimitError)
}

fn column_width(kind: CellKind) -> f64 {
    match kind {
        CellKind::Text | CellKind::TextList => 40.0,
        CellKind::Language | CellKind::Flag => 12.0,
        CellKind::Choice(_) => 30.0,
        CellKind::Iri | CellKind::IriList | CellKind::Memberships => 24.0,
    }
}

fn list_validation(kind: CellKind) -> Result<Option<DataValidation>, XlsxError> {
    let values: &[&str] = match kind {
        CellKind::Flag => &["Yes", "No"],
        CellKind::Choice(allowed) => allowed,
        _ => return Ok(None),
    };
    let len: usize = values.iter().map(|v| v.len() + 1).sum();
    if len > MAX_LIST_VALIDATION_LEN {
        return Ok(None);
    }
    Ok(Some(DataValidation::new().allow_list_strings(values)?))
}

fn write_table(
    worksheet: &mut Worksheet,
    table: &Table,
    formats: &Formats,
    read_only: bool,
) -> Result<(), XlsxError> {
    let header_format = if read_only {
        &formats.read_only_header
    } else {
        &formats.header
    };
    for (c, column) in table.columns.iter().enumerate() {
        let col = col_num(c)?;
        worksheet.write_string_with_format(0, col, column.header, header_format)?;
        worksheet.set_column_width(col, column_width(column.kind))?;
        if !read_only {
            if let Some(validation) = list_validation(column.kind)? {
                worksheet.add_data_validation(1, col, 1_048_575, col, &validation)?;
            }
        }
    }
    for (r, row) in table.rows.iter().enumerate() {
        let r = row_num(r + 1)?;
        for (c, cell) in row.cells.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            worksheet.write_string_with_format(r, col_num(c)?, cell, &formats.text)?;
        }
    }
    worksheet.set_freeze_panes(1, 0)?;
    if read_only {
        worksheet.protect();
    }
    Ok(())
}

fn build_workbook(tables: &Tables) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let formats = Formats::new();

    let scheme = workbook.add_worksheet().set_name(SCHEME_SHEET)?;
    for (c, header) in SCHEME_HEADERS.iter().enumerate() {
        scheme.write_string_with_format(0, col_num(c)?, *header, &formats.read_only_header)?;
    }
    for (r, (key, value)) in tables.scheme.iter().enumerate() {
        let r = row_num(r + 1)?;
        scheme.write_string_with_format(r, 0, key, &formats.header)?;
        if !value.is_empty() {
            scheme.write_string_with_format(r, 1, value, &formats.text)?;
        }
    }
    scheme.set_column_width(0, 24)?;
    scheme.set_column_width(1, 80)?;
    scheme.protect();

    for (table, read_only) in [
        (&tables.concepts, false),
        (&tables.collections, false),
        (&tables.mappings, false),
        (&tables.id_ranges, true),
        (&tables.prefixes, true),
    ] {
        let worksheet = workbook.add_worksheet().set_name(table.name)?;
        write_table(worksheet, table, &formats, read_only)?;
    }
    Ok(workbook)
}

/// Serialize all sheets into xlsx bytes
pub fn workbook_bytes(tables: &Tables) -> Result<Vec<u8>, VocabError> {
    build_workbook(tables)
        .and_then(|mut workbook| workbook.save_to_buffer())
        .map_err(|e| VocabError::workbook("<memory>", e))
}

/// Write the workbook, replacing `path` atomically
pub fn write_workbook(tables: &Tables, path: &Path) -> Result<(), VocabError> {
    let bytes = build_workbook(tables)
        .and_then(|mut workbook| workbook.save_to_buffer())
        .map_err(|e| VocabError::workbook(path.display(), e))?;
    write_file_atomic(path, &bytes)?;
    info!("Wrote workbook {}", path.display());
    Ok(())
}
