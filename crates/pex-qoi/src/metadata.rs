use std::collections::BTreeMap;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use pex_core::{ErrorInfo, PexError};
use serde::{Deserialize, Serialize};

use crate::wrap_csv;

const BOX_COLUMN: &str = "box_id";

/// Timing and outcome of one job, kept for every job whether it passed or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRow {
    /// Parameter setting.
    pub parameter_id: usize,
    /// Repetition.
    pub run_id: usize,
    /// True only for exit code 0 with all requested artifacts extracted.
    pub success: bool,
    /// Wall time in seconds, NaN for failed jobs.
    pub wall_time: f64,
    /// Exit code of the executable, absent when it was killed or never started.
    pub exit_code: Option<i32>,
    /// Whether the job hit its timeout.
    pub timed_out: bool,
}

/// Metadata rows for a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataTable {
    /// Rows sorted by `(parameter_id, run_id)`.
    pub rows: Vec<MetadataRow>,
}

impl MetadataTable {
    /// Builds the table, sorting rows by key.
    pub fn new(mut rows: Vec<MetadataRow>) -> Self {
        rows.sort_by_key(|row| (row.parameter_id, row.run_id));
        Self { rows }
    }

    /// Number of successful jobs.
    pub fn passed(&self) -> usize {
        self.rows.iter().filter(|row| row.success).count()
    }

    /// Number of failed jobs.
    pub fn failed(&self) -> usize {
        self.rows.len() - self.passed()
    }

    /// Writes `parameter_id, run_id, <parameters...>, success, wall_time, exit_code, timed_out`.
    ///
    /// Parameter cells are joined from `parameters` by key; jobs missing from
    /// the parameter table get empty cells.
    pub fn write_joined_csv(&self, parameters: &ParameterTable, path: &Path) -> Result<(), PexError> {
        let lookup: BTreeMap<(usize, usize), &ParameterRow> = parameters
            .rows
            .iter()
            .map(|row| ((row.parameter_id, row.run_id), row))
            .collect();
        let with_box = parameters.has_box_ids();
        let mut writer = WriterBuilder::new()
            .from_path(path)
            .map_err(|err| wrap_csv("metadata.open", path, err))?;
        writer
            .write_record(
                parameters
                    .header()
                    .into_iter()
                    .chain(["success", "wall_time", "exit_code", "timed_out"].map(String::from)),
            )
            .map_err(|err| wrap_csv("metadata.header", path, err))?;
        for row in &self.rows {
            let mut record = vec![row.parameter_id.to_string(), row.run_id.to_string()];
            match lookup.get(&(row.parameter_id, row.run_id)) {
                Some(params) => record.extend(params.cells(with_box).into_iter().skip(2)),
                None => record.extend(
                    std::iter::repeat(String::new()).take(parameters.addresses.len() + usize::from(with_box)),
                ),
            }
            record.push(row.success.to_string());
            record.push(row.wall_time.to_string());
            record.push(row.exit_code.map(|code| code.to_string()).unwrap_or_default());
            record.push(row.timed_out.to_string());
            writer
                .write_record(&record)
                .map_err(|err| wrap_csv("metadata.row", path, err))?;
        }
        writer
            .flush()
            .map_err(|err| wrap_csv("metadata.flush", path, err.into()))
    }
}

/// Parameter assignment of one job rendered as table cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRow {
    /// Parameter setting.
    pub parameter_id: usize,
    /// Repetition.
    pub run_id: usize,
    /// Originating box for box/Ulam studies.
    pub box_id: Option<usize>,
    /// Cells aligned with [`ParameterTable::addresses`].
    pub values: Vec<String>,
}

impl ParameterRow {
    fn cells(&self, with_box: bool) -> Vec<String> {
        let mut cells = vec![self.parameter_id.to_string(), self.run_id.to_string()];
        if with_box {
            cells.push(self.box_id.map(|id| id.to_string()).unwrap_or_default());
        }
        cells.extend(self.values.iter().cloned());
        cells
    }
}

/// The `parameters.csv` table: one row per job with the value written at each address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable {
    /// Varied addresses, in sampling order.
    pub addresses: Vec<String>,
    /// One row per job.
    pub rows: Vec<ParameterRow>,
}

impl ParameterTable {
    fn has_box_ids(&self) -> bool {
        self.rows.iter().any(|row| row.box_id.is_some())
    }

    fn header(&self) -> Vec<String> {
        let mut header = vec!["parameter_id".to_string(), "run_id".to_string()];
        if self.has_box_ids() {
            header.push(BOX_COLUMN.to_string());
        }
        header.extend(self.addresses.iter().cloned());
        header
    }

    /// Row for a job key.
    pub fn row(&self, parameter_id: usize, run_id: usize) -> Option<&ParameterRow> {
        self.rows
            .iter()
            .find(|row| row.parameter_id == parameter_id && row.run_id == run_id)
    }

    /// Writes the table as CSV.
    pub fn write_csv(&self, path: &Path) -> Result<(), PexError> {
        let with_box = self.has_box_ids();
        let mut writer = WriterBuilder::new()
            .from_path(path)
            .map_err(|err| wrap_csv("parameters.open", path, err))?;
        writer
            .write_record(self.header())
            .map_err(|err| wrap_csv("parameters.header", path, err))?;
        for row in &self.rows {
            writer
                .write_record(row.cells(with_box))
                .map_err(|err| wrap_csv("parameters.row", path, err))?;
        }
        writer
            .flush()
            .map_err(|err| wrap_csv("parameters.flush", path, err.into()))
    }

    /// Reads a table previously written by [`ParameterTable::write_csv`].
    pub fn read_csv(path: &Path) -> Result<Self, PexError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|err| wrap_csv("parameters.read", path, err))?;
        let header: Vec<String> = reader
            .headers()
            .map_err(|err| wrap_csv("parameters.header", path, err))?
            .iter()
            .map(str::to_string)
            .collect();
        if header.len() < 2 || header[0] != "parameter_id" || header[1] != "run_id" {
            return Err(PexError::Qoi(
                ErrorInfo::new("parameters.header", "parameter table must start with parameter_id,run_id")
                    .with_context("path", path.display().to_string()),
            ));
        }
        let with_box = header.get(2).map(String::as_str) == Some(BOX_COLUMN);
        let skip = if with_box { 3 } else { 2 };
        let addresses = header[skip..].to_vec();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| wrap_csv("parameters.record", path, err))?;
            let parse = |idx: usize| -> Result<usize, PexError> {
                record
                    .get(idx)
                    .unwrap_or_default()
                    .parse::<usize>()
                    .map_err(|err| {
                        PexError::Qoi(
                            ErrorInfo::new("parameters.id", err.to_string())
                                .with_context("path", path.display().to_string())
                                .with_context("column", header[idx].clone()),
                        )
                    })
            };
            let parameter_id = parse(0)?;
            let run_id = parse(1)?;
            let box_id = if with_box && !record.get(2).unwrap_or_default().is_empty() {
                Some(parse(2)?)
            } else {
                None
            };
            rows.push(ParameterRow {
                parameter_id,
                run_id,
                box_id,
                values: record.iter().skip(skip).map(str::to_string).collect(),
            });
        }
        Ok(Self { addresses, rows })
    }
}
