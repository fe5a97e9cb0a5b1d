use std::{
    fmt,
    io::Read,
    ops::{Deref, DerefMut},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;

/// Text shown for blank cells when rendering a table.
const BLANK_CELL_DISPLAY: &str = "NaN";

/// A table loaded from CSV, with a header row.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Table {
    pub header: Row,
    pub rows: Vec<Row>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(pub Vec<String>);

impl Deref for Row {
    type Target = Vec<String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Row {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<C, S> From<C> for Row
where
    C: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn from(value: C) -> Self {
        Row(value.into_iter().map(Into::into).collect())
    }
}

/// Kind of values held in a column.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColumnKind {
    /// Every cell is blank.
    Empty,
    /// Every cell is an integer.
    Integer,
    /// Every cell is a number, or an integer column has blank cells.
    Float,
    Text,
}

impl Table {
    pub fn num_columns(&self) -> usize {
        self.header.len()
    }

    /// Returns a table with the same header and the first `n` rows.
    pub fn head(&self, n: usize) -> Table {
        Table {
            header: self.header.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Infers the kind of each column from its cells.
    pub fn column_kinds(&self) -> Vec<ColumnKind> {
        (0..self.num_columns())
            .map(|column| column_kind(self.rows.iter().map(|row| cell_at(row, column))))
            .collect()
    }
}

fn column_kind<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnKind {
    let mut any_blank = false;
    let mut any_value = false;
    let mut all_integer = true;
    let mut all_number = true;
    for cell in cells {
        let cell = cell.trim();
        if cell.is_empty() {
            any_blank = true;
            continue;
        }
        any_value = true;
        all_integer &= cell.parse::<i64>().is_ok();
        all_number &= cell.parse::<f64>().is_ok();
    }

    match (any_value, all_integer, all_number) {
        (false, _, _) => ColumnKind::Empty,
        (true, true, _) if !any_blank => ColumnKind::Integer,
        (true, _, true) => ColumnKind::Float,
        _ => ColumnKind::Text,
    }
}

/// Loads a [Table] from the CSV file at `path`.
pub fn load_csv(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path).with_context(|| format!("opening CSV file {:?}", path))?;
    from_reader(file).with_context(|| format!("loading table from {:?}", path))
}

/// Loads a [Table] from CSV data. The first record is the header. Rows with
/// fewer cells than the header are padded with blank cells; rows with more
/// are an error.
pub fn from_reader<R: Read>(reader: R) -> Result<Table> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header: Row = csv_reader.headers().context("reading CSV header")?.iter().into();
    if header.is_empty() {
        return Err(anyhow!("CSV data has no header row"));
    }

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.context("reading CSV record")?;
        if record.len() > header.len() {
            let line = record.position().map_or(0, csv::Position::line);
            return Err(anyhow!(
                "CSV record on line {} has {} fields, header has {}",
                line,
                record.len(),
                header.len()
            ));
        }
        let mut row: Row = record.iter().into();
        row.resize(header.len(), String::new());
        rows.push(row);
    }

    Ok(Table { header, rows })
}

fn cell_at(row: &Row, column: usize) -> &str {
    row.get(column).map_or("", String::as_str)
}

fn cell_display(cell: &str) -> &str {
    if cell.is_empty() {
        BLANK_CELL_DISPLAY
    } else {
        cell
    }
}

/// Renders the table as right-aligned columns, preceded by a row index column.
impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let index_width = self.rows.len().saturating_sub(1).to_string().len();
        let widths: Vec<usize> = self
            .header
            .iter()
            .enumerate()
            .map(|(column, name)| {
                self.rows
                    .iter()
                    .map(|row| cell_display(cell_at(row, column)).chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write!(f, "{:index_width$}", "")?;
        for (name, width) in self.header.iter().zip(&widths) {
            write!(f, "  {:>width$}", name)?;
        }
        for (index, row) in self.rows.iter().enumerate() {
            write!(f, "\n{:<index_width$}", index)?;
            for (cell, width) in row.iter().zip(&widths) {
                write!(f, "  {:>width$}", cell_display(cell))?;
            }
        }
        Ok(())
    }
}
