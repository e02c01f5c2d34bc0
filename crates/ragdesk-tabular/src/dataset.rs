//! In-memory department datasets.
//!
//! A dataset is parsed once and never mutated. Queries run against a
//! throwaway SQLite materialisation built from the snapshot.

use std::io::Read;
use std::path::Path;

use ragdesk_core::error::{RagDeskError, Result};
use rusqlite::Connection;
use rusqlite::types::Value;
use serde::Serialize;

/// Name of the single table every dataset is materialised into.
pub const TABLE_NAME: &str = "data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub department: String,
    /// File the dataset was loaded from.
    pub source: String,
    pub columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn from_path(department: &str, path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Self::from_reader(department, &source, file)
    }

    /// Parse CSV with a header row. Short rows are padded, long rows cut.
    pub fn from_reader<R: Read>(department: &str, source: &str, reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| RagDeskError::Tabular(format!("{source}: bad header: {e}")))?
            .clone();
        if headers.is_empty() {
            return Err(RagDeskError::Tabular(format!("{source}: no columns")));
        }
        let names = unique_column_names(headers.iter());

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| RagDeskError::Tabular(format!("{source}: {e}")))?;
            let mut row: Vec<String> = record.iter().take(names.len()).map(String::from).collect();
            row.resize(names.len(), String::new());
            rows.push(row);
        }

        let columns = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Column {
                kind: infer_type(rows.iter().map(|r| r[i].as_str())),
                name,
            })
            .collect();

        Ok(Self {
            department: department.to_string(),
            source: source.to_string(),
            columns,
            rows,
        })
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// `CREATE TABLE` statement describing the dataset.
    pub fn schema_sql(&self) -> String {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.kind.sql()))
            .collect();
        format!("CREATE TABLE {TABLE_NAME} ({})", cols.join(", "))
    }

    /// First `n` rows rendered as CSV, header included.
    pub fn sample(&self, n: usize) -> String {
        let mut out = self.column_names().join(",");
        for row in self.rows.iter().take(n) {
            out.push('\n');
            out.push_str(&row.join(","));
        }
        out
    }

    /// Build a private in-memory database holding this dataset.
    ///
    /// The connection is switched to `query_only` before it is returned.
    pub fn materialize(&self) -> Result<Connection> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        conn.execute_batch(&self.schema_sql()).map_err(sql_err)?;

        let placeholders = vec!["?"; self.columns.len()].join(", ");
        let insert = format!("INSERT INTO {TABLE_NAME} VALUES ({placeholders})");
        {
            let tx = conn.unchecked_transaction().map_err(sql_err)?;
            {
                let mut stmt = tx.prepare(&insert).map_err(sql_err)?;
                for row in &self.rows {
                    let values = row
                        .iter()
                        .zip(&self.columns)
                        .map(|(cell, col)| to_value(cell, col.kind));
                    stmt.execute(rusqlite::params_from_iter(values)).map_err(sql_err)?;
                }
            }
            tx.commit().map_err(sql_err)?;
        }
        conn.execute_batch("PRAGMA query_only = ON;").map_err(sql_err)?;
        Ok(conn)
    }
}

pub(crate) fn sql_err(e: rusqlite::Error) -> RagDeskError {
    RagDeskError::Tabular(e.to_string())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn unique_column_names<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for (i, raw) in headers.enumerate() {
        let base = if raw.is_empty() {
            format!("column_{}", i + 1)
        } else {
            raw.to_string()
        };
        let mut name = base.clone();
        let mut n = 2;
        while names.iter().any(|existing| existing.eq_ignore_ascii_case(&name)) {
            name = format!("{base}_{n}");
            n += 1;
        }
        names.push(name);
    }
    names
}

/// Narrowest type every non-empty cell parses as.
fn infer_type<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut kind = ColumnType::Integer;
    let mut seen = false;
    for cell in cells.filter(|c| !c.is_empty()) {
        seen = true;
        if kind == ColumnType::Integer && cell.parse::<i64>().is_err() {
            kind = ColumnType::Real;
        }
        if kind == ColumnType::Real && cell.parse::<f64>().is_err() {
            return ColumnType::Text;
        }
    }
    if seen { kind } else { ColumnType::Text }
}

fn to_value(cell: &str, kind: ColumnType) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match kind {
        ColumnType::Integer => cell.parse().map(Value::Integer).unwrap_or(Value::Null),
        ColumnType::Real => cell.parse().map(Value::Real).unwrap_or(Value::Null),
        ColumnType::Text => Value::Text(cell.to_string()),
    }
}
