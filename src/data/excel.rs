// Excel workbook data source and sink implementation
// Author: Gabriel Demetrios Lafis

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, IntoExcelData, Workbook, Worksheet, XlsxError};

use super::csv::{unique_headers, NA_VALUES};
use super::{parse_timestamp, DataError, DataSet, DataSink, DataSource, DataType, Field, Row, Schema, Value};

/// Largest row index a worksheet accepts
const MAX_ROWS: usize = 1_048_576;
/// Largest column count a worksheet accepts
const MAX_COLUMNS: usize = 16_384;
/// Column widths are capped at this many characters
const MAX_COLUMN_WIDTH: usize = 50;
/// Integers beyond this magnitude are written as text to keep every digit
const EXACT_NUMBER_LIMIT: i64 = 1 << 53;

impl From<XlsxError> for DataError {
    fn from(err: XlsxError) -> Self {
        DataError::Workbook(err.to_string())
    }
}

impl From<calamine::Error> for DataError {
    fn from(err: calamine::Error) -> Self {
        DataError::Workbook(err.to_string())
    }
}

/// Excel data source reading the first worksheet of a `.xlsx` or `.xls`
/// workbook. The first row holds the column names.
pub struct ExcelSource {
    path: PathBuf,
    name: String,
}

impl ExcelSource {
    /// Create a new Excel data source
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        ExcelSource {
            name: path.to_string_lossy().to_string(),
            path,
        }
    }

    /// Convert a worksheet cell to a data value. Integral numbers read as
    /// Integer, error cells as missing.
    fn cell_to_value(cell: &Data) -> Value {
        match cell {
            Data::Empty | Data::Error(_) => Value::Null,
            Data::Bool(b) => Value::Boolean(*b),
            Data::Int(i) => Value::Integer(*i),
            Data::Float(f) => {
                if f.fract() == 0.0 && f.abs() < EXACT_NUMBER_LIMIT as f64 {
                    Value::Integer(*f as i64)
                } else {
                    Value::Float(*f)
                }
            }
            Data::String(s) => {
                if NA_VALUES.contains(&s.trim()) {
                    Value::Null
                } else {
                    Value::String(s.clone())
                }
            }
            Data::DateTime(moment) => moment.as_datetime().map_or(Value::Null, Value::Timestamp),
            Data::DateTimeIso(text) => parse_timestamp(text).map_or_else(|| Value::String(text.clone()), Value::Timestamp),
            Data::DurationIso(text) => Value::String(text.clone()),
        }
    }

    /// Build a dataset from worksheet rows, the first being the header
    pub fn from_rows<'a, I>(mut rows: I) -> Result<DataSet, DataError>
    where
        I: Iterator<Item = &'a [Data]>,
    {
        let headers = match rows.next() {
            Some(header) => unique_headers(
                header
                    .iter()
                    .enumerate()
                    .map(|(i, cell)| match cell {
                        Data::Empty => format!("column_{}", i),
                        other => other.to_string().trim().to_string(),
                    })
                    .collect(),
            ),
            None => return Err(DataError::ParseError("Empty worksheet".to_string())),
        };
        let width = headers.len();

        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); width];
        for row in rows {
            let values: Vec<Value> = (0..width)
                .map(|i| row.get(i).map_or(Value::Null, Self::cell_to_value))
                .collect();
            if values.iter().all(Value::is_null) {
                continue;
            }
            for (column, value) in columns.iter_mut().zip(values) {
                column.push(value);
            }
        }

        let mut fields = Vec::with_capacity(width);
        for (name, values) in headers.into_iter().zip(columns.iter_mut()) {
            let data_type = values
                .iter()
                .filter_map(Value::data_type)
                .reduce(|a, b| a.widen(&b))
                .unwrap_or(DataType::String);
            for value in values.iter_mut() {
                *value = data_type.widen_value(std::mem::replace(value, Value::Null));
            }
            fields.push(Field::new(name, data_type, true));
        }

        let len = columns.first().map_or(0, Vec::len);
        let rows = (0..len)
            .map(|i| Row::new(columns.iter().map(|col| col[i].clone()).collect()))
            .collect();
        DataSet::with_rows(Schema::new(fields), rows)
    }
}

impl DataSource for ExcelSource {
    fn read(&self) -> Result<DataSet, DataError> {
        let mut workbook = open_workbook_auto(&self.path)?;
        let sheet = workbook.sheet_names().first().cloned().unwrap_or_default();
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| DataError::ParseError("Workbook has no worksheets".to_string()))??;

        let mut dataset = Self::from_rows(range.rows())?;
        dataset.metadata.add("source".to_string(), "excel".to_string());
        dataset.metadata.add("path".to_string(), self.name.clone());
        dataset.metadata.add("sheet".to_string(), sheet);

        Ok(dataset)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Header cells: bold white text on a blue fill
pub fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x366092))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin)
}

fn write_value<T: IntoExcelData>(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    data: T,
    format: Option<&Format>,
) -> Result<(), XlsxError> {
    match format {
        Some(format) => sheet.write_with_format(row, col, data, format)?,
        None => sheet.write(row, col, data)?,
    };
    Ok(())
}

/// Write one data value. Missing and non-finite values leave the cell blank.
pub fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
    format: Option<&Format>,
) -> Result<(), XlsxError> {
    match value {
        Value::Boolean(b) => write_value(sheet, row, col, *b, format),
        Value::Integer(i) if i.unsigned_abs() <= EXACT_NUMBER_LIMIT as u64 => write_value(sheet, row, col, *i as f64, format),
        Value::Integer(i) => write_value(sheet, row, col, i.to_string(), format),
        Value::Float(f) if f.is_finite() => write_value(sheet, row, col, *f, format),
        Value::String(s) => write_value(sheet, row, col, s.as_str(), format),
        Value::Timestamp(_) => write_value(sheet, row, col, value.to_string(), format),
        Value::Null | Value::Float(_) => {
            if let Some(format) = format {
                sheet.write_blank(row, col, format)?;
            }
            Ok(())
        }
    }
}

/// Display width of a column: longest rendered cell plus padding, capped
pub fn column_width<I: Iterator<Item = String>>(header: &str, cells: I) -> f64 {
    let longest = cells
        .map(|text| text.chars().count())
        .fold(header.chars().count(), usize::max);
    (longest + 2).min(MAX_COLUMN_WIDTH) as f64
}

/// Write a table with a header row into `sheet`. A styled sheet gets the
/// header format, thin borders, fitted column widths, a frozen header row
/// and an autofilter.
pub fn write_table_sheet(sheet: &mut Worksheet, data: &DataSet, styled: bool) -> Result<(), DataError> {
    let columns = data.schema.fields.len();
    if data.len() >= MAX_ROWS || columns > MAX_COLUMNS {
        return Err(DataError::ValidationError(format!(
            "{} rows x {} columns do not fit in a worksheet",
            data.len(),
            columns
        )));
    }

    let header = header_format();
    let body = Format::new().set_border(FormatBorder::Thin);
    let (header, body) = if styled { (Some(&header), Some(&body)) } else { (None, None) };

    for (col, field) in data.schema.fields.iter().enumerate() {
        write_value(sheet, 0, col as u16, field.name.as_str(), header)?;
    }
    for (r, row) in data.data.iter().enumerate() {
        for (col, value) in row.values.iter().enumerate() {
            write_cell(sheet, r as u32 + 1, col as u16, value, body)?;
        }
    }

    if styled && columns > 0 {
        for (col, field) in data.schema.fields.iter().enumerate() {
            let width = column_width(&field.name, data.column_values(col).map(Value::to_string));
            sheet.set_column_width(col as u16, width)?;
        }
        sheet.set_freeze_panes(1, 0)?;
        sheet.autofilter(0, 0, data.len() as u32, columns as u16 - 1)?;
    }

    Ok(())
}

/// Excel data sink writing one worksheet named `Data`
pub struct ExcelSink {
    path: PathBuf,
    name: String,
    styled: bool,
}

impl ExcelSink {
    /// Create a new plain Excel data sink
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        ExcelSink {
            name: path.to_string_lossy().to_string(),
            path,
            styled: false,
        }
    }

    /// Create an Excel data sink with header styling, borders and fitted widths
    pub fn styled<P: AsRef<Path>>(path: P) -> Self {
        let mut sink = Self::new(path);
        sink.styled = true;
        sink
    }
}

impl DataSink for ExcelSink {
    fn write(&self, data: &DataSet) -> Result<(), DataError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Data")?;
        write_table_sheet(sheet, data, self.styled)?;
        workbook.save(&self.path)?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
