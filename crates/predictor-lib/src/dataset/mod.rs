//! Tabular data handling
//!
//! A small row-major table of missing/numeric/text cells. Preparers and the
//! ingestion pipeline read rows directly; deduplication, null handling and
//! numeric coercion run on a polars `DataFrame` built from the table.
//! Every transforming operation returns a new table.

mod stats;
pub mod synthetic;

pub use stats::{iqr_bounds, mean, population_std, quantile};

use crate::error::{Error, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Cell tokens treated as missing when reading CSV files
const MISSING_TOKENS: &[&str] = &["", "na", "nan", "n/a", "null", "none", "-nan"];

/// A single table cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Number(f64),
    Text(String),
}

impl Value {
    /// Parse a raw CSV field
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if MISSING_TOKENS.contains(&trimmed.to_ascii_lowercase().as_str()) {
            return Value::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_nan() => Value::Missing,
            Ok(v) => Value::Number(v),
            Err(_) => Value::Text(trimmed.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    fn render(&self) -> String {
        match self {
            Value::Missing => String::new(),
            Value::Number(v) => v.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            Value::Missing
        } else {
            Value::Number(v)
        }
    }
}

/// Inferred type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Every present cell is a number (vacuously true for all-missing columns)
    Numeric,
    /// At least one present cell is text
    Text,
}

/// Row-major table with named columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table, padding or truncating rows to the header width
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Missing);
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Build a fully numeric table from named columns of equal length
    pub fn from_columns(columns: Vec<(&str, Vec<f64>)>) -> Self {
        let headers: Vec<String> = columns.iter().map(|(name, _)| name.to_string()).collect();
        let n_rows = columns.iter().map(|(_, values)| values.len()).max().unwrap_or(0);
        let rows = (0..n_rows)
            .map(|i| {
                columns
                    .iter()
                    .map(|(_, values)| values.get(i).copied().map(Value::from).unwrap_or(Value::Missing))
                    .collect()
            })
            .collect();
        Self { headers, rows }
    }

    /// Read a CSV file with a header row
    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(BufReader::new(file));

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(Value::parse).collect());
        }

        Ok(Self::new(headers, rows))
    }

    /// Read only the header row of a CSV file
    pub fn read_headers(path: &Path) -> Result<Vec<String>> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(BufReader::new(file));
        Ok(reader.headers()?.iter().map(str::to_string).collect())
    }

    /// Write the table as CSV with a header row
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(Value::render))?;
        }
        writer.flush().map_err(|e| Error::io(path, e))?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_columns(&self, names: &[&str]) -> bool {
        names.iter().all(|name| self.column_index(name).is_some())
    }

    /// Fail with a schema error naming every absent column
    pub fn require_columns(&self, names: &[&str]) -> Result<()> {
        let missing: Vec<String> = names
            .iter()
            .filter(|name| self.column_index(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Schema { missing })
        }
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[idx])
    }

    /// Present numeric values of a column
    pub fn numeric_values(&self, idx: usize) -> Vec<f64> {
        self.column(idx).filter_map(Value::as_f64).collect()
    }

    pub fn missing_count(&self, idx: usize) -> usize {
        self.column(idx).filter(|v| v.is_missing()).count()
    }

    pub fn column_type(&self, idx: usize) -> ColumnType {
        if self.column(idx).any(|v| matches!(v, Value::Text(_))) {
            ColumnType::Text
        } else {
            ColumnType::Numeric
        }
    }

    /// Indices of numeric columns, in header order
    pub fn numeric_columns(&self) -> Vec<usize> {
        (0..self.n_cols())
            .filter(|&idx| self.column_type(idx) == ColumnType::Numeric)
            .collect()
    }

    /// Keep rows matching a predicate
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[Value]) -> bool,
    {
        Table {
            headers: self.headers.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }

    /// Drop every row with at least one missing cell
    pub fn drop_missing_rows(&self) -> Result<Table> {
        Table::from_frame(&self.to_frame()?.drop_nulls::<String>(None)?)
    }

    /// Drop rows missing a value in any of the named columns
    pub fn drop_missing_in(&self, names: &[&str]) -> Result<Table> {
        let subset: Vec<String> = names
            .iter()
            .filter(|name| self.column_index(name).is_some())
            .map(|name| name.to_string())
            .collect();
        if subset.is_empty() {
            return Ok(self.clone());
        }
        Table::from_frame(&self.to_frame()?.drop_nulls(Some(subset.as_slice()))?)
    }

    /// Drop exact duplicate rows, keeping the first occurrence
    pub fn drop_duplicates(&self) -> Result<Table> {
        let frame = self.to_frame()?.unique_stable(None, UniqueKeepStrategy::First, None)?;
        Table::from_frame(&frame)
    }

    /// Replace missing cells in a column with a constant
    pub fn fill_missing(&self, name: &str, fill: f64) -> Result<Table> {
        if self.column_index(name).is_none() {
            return Ok(self.clone());
        }
        let mut frame = self.to_frame()?;
        let column = frame.column(name)?;
        let filled = match column.dtype() {
            DataType::String => {
                let text = fill.to_string();
                let ca: StringChunked = column.str()?.into_iter().map(|v| Some(v.unwrap_or(&text))).collect();
                ca.with_name(name.into()).into_series()
            }
            _ => column.f64()?.fill_null_with_values(fill)?.into_series(),
        };
        frame.replace(name, filled)?;
        Table::from_frame(&frame)
    }

    /// Turn text cells of the named columns into missing cells
    pub fn coerce_numeric(&self, names: &[&str]) -> Result<Table> {
        let mut frame = self.to_frame()?;
        for name in names.iter().filter(|name| self.column_index(name).is_some()) {
            let numeric = frame.column(name)?.as_materialized_series().cast(&DataType::Float64)?;
            frame.replace(name, numeric)?;
        }
        Table::from_frame(&frame)
    }

    /// One column per header: `Float64` for numeric columns, `String` otherwise
    pub fn to_frame(&self) -> Result<DataFrame> {
        let columns: Vec<Column> = self
            .headers
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let series = match self.column_type(idx) {
                    ColumnType::Numeric => {
                        // Normalize -0.0 so it deduplicates against 0.0
                        let values: Vec<Option<f64>> = self.column(idx).map(|v| v.as_f64().map(|x| x + 0.0)).collect();
                        Series::new(name.as_str().into(), values)
                    }
                    ColumnType::Text => {
                        let values: Vec<Option<String>> = self
                            .column(idx)
                            .map(|v| (!v.is_missing()).then(|| v.render()))
                            .collect();
                        Series::new(name.as_str().into(), values)
                    }
                };
                series.into()
            })
            .collect();
        Ok(DataFrame::new(columns)?)
    }

    /// Inverse of [`Table::to_frame`]; string cells are re-parsed like CSV fields
    pub fn from_frame(frame: &DataFrame) -> Result<Table> {
        let headers: Vec<String> = frame.get_column_names().iter().map(|name| name.to_string()).collect();
        let mut columns: Vec<Vec<Value>> = Vec::with_capacity(headers.len());
        for column in frame.get_columns() {
            let values: Vec<Value> = match column.dtype() {
                DataType::String => column
                    .str()?
                    .into_iter()
                    .map(|v| v.map(Value::parse).unwrap_or(Value::Missing))
                    .collect(),
                _ => column
                    .cast(&DataType::Float64)?
                    .f64()?
                    .into_iter()
                    .map(|v| v.map(Value::from).unwrap_or(Value::Missing))
                    .collect(),
            };
            columns.push(values);
        }

        let rows = (0..frame.height())
            .map(|i| columns.iter().map(|column| column[i].clone()).collect())
            .collect();
        Ok(Table { headers, rows })
    }

    /// Numeric value of a named column in a row, if present
    pub fn number(&self, row: &[Value], name: &str) -> Option<f64> {
        self.column_index(name).and_then(|idx| row[idx].as_f64())
    }
}
