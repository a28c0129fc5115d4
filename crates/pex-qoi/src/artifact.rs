use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use pex_core::{ErrorInfo, PexError};
use serde::{Deserialize, Serialize};

use crate::fallback::fallback_index_columns;
use crate::{qoi_error, wrap_csv};

/// Field separator detected from the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    /// Comma separated.
    Comma,
    /// Runs of spaces or tabs.
    Whitespace,
}

impl Delimiter {
    fn detect(header_line: &str) -> Self {
        if header_line.contains(',') {
            Delimiter::Comma
        } else {
            Delimiter::Whitespace
        }
    }
}

/// One artifact read from a single job's output directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QoiTable {
    /// Artifact file name as requested.
    pub name: String,
    /// Number of leading index columns.
    pub index_columns: usize,
    /// Header row.
    pub columns: Vec<String>,
    /// Data rows, each as wide as the header.
    pub rows: Vec<Vec<String>>,
}

impl QoiTable {
    /// Position of a named column.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    /// Parses the given columns of one row as floats.
    pub fn row_values(&self, row: usize, columns: &[String]) -> Result<Vec<f64>, PexError> {
        let cells = self
            .rows
            .get(row)
            .ok_or_else(|| qoi_error("qoi.missing_row", format!("{} has no row {row}", self.name)))?;
        columns
            .iter()
            .map(|column| {
                let idx = self.column_index(column).ok_or_else(|| {
                    PexError::Qoi(
                        ErrorInfo::new("qoi.missing_column", format!("column `{column}` not found"))
                            .with_context("artifact", self.name.clone()),
                    )
                })?;
                cells[idx].parse::<f64>().map_err(|err| {
                    PexError::Qoi(
                        ErrorInfo::new("qoi.not_numeric", err.to_string())
                            .with_context("artifact", self.name.clone())
                            .with_context("column", column.clone()),
                    )
                })
            })
            .collect()
    }
}

/// Reads `<output_dir>/<name>`.
///
/// Lines starting with `#` are comments; a `ROW=<n>` token inside one
/// declares the index-column count. The first non-comment line is the
/// header. `override_index` takes precedence over both the declaration and
/// the fallback table.
pub fn read_artifact(output_dir: &Path, name: &str, override_index: Option<usize>) -> Result<QoiTable, PexError> {
    let path = output_dir.join(name);
    let text = fs::read_to_string(&path).map_err(|err| {
        PexError::Qoi(
            ErrorInfo::new("qoi.missing_artifact", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    parse_artifact(name, &text, override_index).map_err(|err| match err {
        PexError::Qoi(info) => PexError::Qoi(info.with_context("path", path.display().to_string())),
        other => other,
    })
}

pub(crate) fn parse_artifact(name: &str, text: &str, override_index: Option<usize>) -> Result<QoiTable, PexError> {
    let mut declared = None;
    let mut body = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(comment) = trimmed.strip_prefix('#') {
            if declared.is_none() {
                declared = declared_index_columns(comment)?;
            }
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }
        body.push(trimmed);
    }
    let Some(header_line) = body.first() else {
        return Err(qoi_error("qoi.empty_artifact", format!("{name} has no header row")));
    };

    let (columns, rows) = match Delimiter::detect(header_line) {
        Delimiter::Comma => split_comma(name, &body)?,
        Delimiter::Whitespace => split_whitespace(&body),
    };
    if let Some((idx, column)) = columns
        .iter()
        .enumerate()
        .find(|(idx, column)| columns[..*idx].contains(*column))
    {
        return Err(PexError::Qoi(
            ErrorInfo::new("qoi.duplicate_column", format!("header repeats column `{column}`"))
                .with_context("artifact", name.to_string())
                .with_context("position", idx.to_string()),
        ));
    }
    for (line, row) in rows.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(PexError::Qoi(
                ErrorInfo::new(
                    "qoi.ragged_row",
                    format!("row has {} cells, header has {}", row.len(), columns.len()),
                )
                .with_context("artifact", name.to_string())
                .with_context("row", line.to_string()),
            ));
        }
    }

    let index_columns = override_index
        .or(declared)
        .unwrap_or_else(|| fallback_index_columns(&columns));
    if index_columns > columns.len() {
        return Err(PexError::Qoi(
            ErrorInfo::new(
                "qoi.index_columns",
                format!("{index_columns} index columns declared but only {} present", columns.len()),
            )
            .with_context("artifact", name.to_string()),
        ));
    }
    Ok(QoiTable {
        name: name.to_string(),
        index_columns,
        columns,
        rows,
    })
}

fn declared_index_columns(comment: &str) -> Result<Option<usize>, PexError> {
    let token = comment
        .split(|c: char| c == ',' || c.is_whitespace())
        .find_map(|token| token.trim().strip_prefix("ROW="));
    match token {
        None => Ok(None),
        Some(value) => value
            .trim_matches(|c| c == '\'' || c == '"')
            .parse::<usize>()
            .map(Some)
            .map_err(|err| qoi_error("qoi.row_declaration", format!("invalid ROW declaration `{value}`: {err}"))),
    }
}

type Split = (Vec<String>, Vec<Vec<String>>);

fn split_comma(name: &str, lines: &[&str]) -> Result<Split, PexError> {
    let joined = lines.join("\n");
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(joined.as_bytes());
    let columns = reader
        .headers()
        .map_err(|err| wrap_csv("qoi.header", Path::new(name), err))?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| wrap_csv("qoi.record", Path::new(name), err))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok((columns, rows))
}

fn split_whitespace(lines: &[&str]) -> Split {
    let mut rows = lines
        .iter()
        .map(|line| line.split_whitespace().map(str::to_string).collect::<Vec<_>>());
    let columns = rows.next().unwrap_or_default();
    (columns, rows.collect())
}
