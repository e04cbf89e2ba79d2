// 🧾 Tables - Tabular rows as returned by the data platform
// A table is a list of named columns and rows of typed cells. Every
// transformation returns a new table; nothing is mutated in place.

use crate::dates::{self, cmp_absent_last};
use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::io::{Read, Write};

// ============================================================================
// VALUE
// ============================================================================

/// A single cell
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Unbound / missing (an absent end date means "still open")
    Null,
    Text(String),
    Date(NaiveDate),
    Integer(i64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format(dates::DATE_FORMAT)),
            Value::Integer(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ============================================================================
// TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table, checking every row has one cell per column
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(Error::Structure(format!(
                "row {} has {} cells but the table has {} columns",
                i,
                row.len(),
                columns.len()
            )));
        }
        Ok(Table { columns, rows })
    }

    /// A table with columns and no rows
    pub fn empty<S: AsRef<str>>(columns: &[S]) -> Self {
        Table {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Position of a column, or `MissingColumn`
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::missing_column(name))
    }

    /// Cell at row `row` in the named column
    pub fn value(&self, row: usize, column: &str) -> Result<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[col]).ok_or_else(|| {
            Error::Structure(format!("row {} out of range for {} rows", row, self.rows.len()))
        })
    }

    /// All cells of the named column, in row order
    pub fn column_values(&self, column: &str) -> Result<Vec<&Value>> {
        let col = self.column_index(column)?;
        Ok(self.rows.iter().map(|r| &r[col]).collect())
    }

    /// All cells of the named column coerced to dates
    pub fn date_column(&self, column: &str) -> Result<Vec<Option<NaiveDate>>> {
        let col = self.column_index(column)?;
        self.rows.iter().map(|r| dates::coerce(&r[col])).collect()
    }

    /// Same columns, different rows
    pub fn with_rows(&self, rows: Vec<Vec<Value>>) -> Table {
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Keep the rows whose flag is set
    pub fn retain_by_mask(&self, keep: &[bool]) -> Table {
        let rows = self
            .rows
            .iter()
            .zip(keep)
            .filter(|(_, k)| **k)
            .map(|(r, _)| r.clone())
            .collect();
        self.with_rows(rows)
    }

    /// Project onto the named columns, in the given order
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> Result<Table> {
        let indices = columns
            .iter()
            .map(|c| self.column_index(c.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let rows = self
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Ok(Table {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows,
        })
    }

    /// Replace one column's values
    pub fn replace_column(&self, column: &str, values: Vec<Value>) -> Result<Table> {
        let col = self.column_index(column)?;
        if values.len() != self.rows.len() {
            return Err(Error::Structure(format!(
                "{} values supplied for a table of {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(r, v)| {
                let mut r = r.clone();
                r[col] = v;
                r
            })
            .collect();
        Ok(self.with_rows(rows))
    }

    /// Stable sort by a text column, then by a date column (absent dates last)
    pub fn sort_by_name_and_date(&self, name_col: &str, date_col: &str) -> Result<Table> {
        let name = self.column_index(name_col)?;
        let dates = self.date_column(date_col)?;

        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by(|&a, &b| {
            cmp_values(&self.rows[a][name], &self.rows[b][name])
                .then_with(|| cmp_absent_last(&dates[a], &dates[b]))
        });

        Ok(self.with_rows(order.into_iter().map(|i| self.rows[i].clone()).collect()))
    }

    /// Stable sort by a single column
    pub fn sort_by_column(&self, column: &str) -> Result<Table> {
        let col = self.column_index(column)?;
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| cmp_values(&a[col], &b[col]));
        Ok(self.with_rows(rows))
    }

    // ========================================================================
    // CSV
    // ========================================================================

    /// Read a table from CSV.
    ///
    /// Cells are trimmed; empty cells and `NA` are `Null`. Cells in
    /// `date_columns` must be `YYYY-MM-DD`.
    pub fn read_csv<R: Read>(reader: R, date_columns: &[&str]) -> Result<Table> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let is_date: Vec<bool> = columns
            .iter()
            .map(|c| date_columns.contains(&c.as_str()))
            .collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let row = record
                .iter()
                .zip(&is_date)
                .map(|(cell, &date)| match cell {
                    "" | "NA" => Ok(Value::Null),
                    s if date => dates::parse_iso_date(s).map(Value::Date),
                    s => Ok(Value::from(s)),
                })
                .collect::<Result<Vec<_>>>()?;
            rows.push(row);
        }

        Table::new(columns, rows)
    }

    pub fn from_csv_str(text: &str, date_columns: &[&str]) -> Result<Table> {
        Table::read_csv(text.trim().as_bytes(), date_columns)
    }

    /// Write the table as CSV with ISO dates and empty absent cells
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|v| v.to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Total order over cells used for sorting: absent last, then by content
fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Date(a), Value::Date(b)) => a.cmp(b),
        (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
        (a, b) => a.to_string().cmp(&b.to_string()),
    }
}

/// Drop every column whose name ends in `_id`, leaving the readable ones
pub fn readable(table: &Table) -> Table {
    let keep: Vec<&String> = table
        .columns()
        .iter()
        .filter(|c| !c.ends_with("_id"))
        .collect();
    // Every name comes from the table itself, so the projection cannot fail
    table.select(&keep).unwrap_or_else(|_| table.clone())
}
