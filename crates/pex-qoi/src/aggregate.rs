use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use pex_core::PexError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::artifact::QoiTable;
use crate::wrap_csv;

/// Key columns prepended to every aggregated row.
pub const KEY_COLUMNS: [&str; 2] = ["parameter_id", "run_id"];

/// One artifact concatenated across all successful jobs.
///
/// The first two columns are always `parameter_id` and `run_id`, followed by
/// the artifact's own index columns and then its data columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedTable {
    /// Artifact name.
    pub name: String,
    /// Index columns of the artifact (excluding the key columns).
    pub index_columns: Vec<String>,
    /// Data columns of the artifact.
    pub data_columns: Vec<String>,
    /// Rows sorted by `(parameter_id, run_id)`, then by position in the artifact.
    pub rows: Vec<AggregatedRow>,
}

/// Row of an [`AggregatedTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    /// Parameter setting.
    pub parameter_id: usize,
    /// Repetition.
    pub run_id: usize,
    /// Cells aligned with `index_columns` followed by `data_columns`.
    pub cells: Vec<String>,
}

impl AggregatedTable {
    /// Full header including the key columns.
    pub fn header(&self) -> Vec<String> {
        KEY_COLUMNS
            .iter()
            .map(|column| column.to_string())
            .chain(self.index_columns.iter().cloned())
            .chain(self.data_columns.iter().cloned())
            .collect()
    }

    /// Rows belonging to one job.
    pub fn rows_for(&self, parameter_id: usize, run_id: usize) -> impl Iterator<Item = &AggregatedRow> {
        self.rows
            .iter()
            .filter(move |row| row.parameter_id == parameter_id && row.run_id == run_id)
    }

    /// Writes the table as CSV.
    pub fn write_csv(&self, path: &Path) -> Result<(), PexError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| PexError::io("qoi.write_dir", parent, err))?;
        }
        let mut writer = WriterBuilder::new()
            .from_path(path)
            .map_err(|err| wrap_csv("qoi.write_open", path, err))?;
        writer
            .write_record(self.header())
            .map_err(|err| wrap_csv("qoi.write_header", path, err))?;
        for row in &self.rows {
            let record = [row.parameter_id.to_string(), row.run_id.to_string()]
                .into_iter()
                .chain(row.cells.iter().cloned());
            writer
                .write_record(record)
                .map_err(|err| wrap_csv("qoi.write_row", path, err))?;
        }
        writer
            .flush()
            .map_err(|err| wrap_csv("qoi.flush", path, err.into()))
    }
}

/// Aggregated quantities of interest.
///
/// When exactly one artifact was requested the table is returned directly;
/// otherwise tables are keyed by artifact name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QoiResult {
    /// A single requested artifact.
    Single(AggregatedTable),
    /// Several artifacts keyed by name.
    Many(BTreeMap<String, AggregatedTable>),
}

impl QoiResult {
    /// Table for an artifact name.
    pub fn table(&self, name: &str) -> Option<&AggregatedTable> {
        match self {
            QoiResult::Single(table) => (table.name == name).then_some(table),
            QoiResult::Many(tables) => tables.get(name),
        }
    }

    /// All tables in name order.
    pub fn tables(&self) -> Vec<&AggregatedTable> {
        match self {
            QoiResult::Single(table) => vec![table],
            QoiResult::Many(tables) => tables.values().collect(),
        }
    }

    /// Total number of QoI rows across all tables.
    pub fn row_count(&self) -> usize {
        self.tables().iter().map(|table| table.rows.len()).sum()
    }

    /// Writes one `qoi_<stem>.csv` per artifact into `dir` and returns the paths.
    pub fn write_csv_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, PexError> {
        self.tables()
            .into_iter()
            .map(|table| {
                let stem = Path::new(&table.name)
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or(table.name.as_str());
                let path = dir.join(format!("qoi_{stem}.csv"));
                table.write_csv(&path)?;
                Ok(path)
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct Pending {
    index_columns: Vec<String>,
    data_columns: Vec<String>,
    rows: Vec<(usize, usize, BTreeMap<String, String>)>,
}

impl Pending {
    fn absorb(&mut self, parameter_id: usize, run_id: usize, table: QoiTable) {
        let (index, data) = table.columns.split_at(table.index_columns);
        if !self.index_columns.is_empty() && (self.index_columns != index || self.data_columns != data) {
            warn!(
                artifact = %table.name,
                parameter_id,
                run_id,
                "artifact header differs between jobs, taking the union of columns"
            );
        }
        merge_columns(&mut self.index_columns, index);
        merge_columns(&mut self.data_columns, data);
        for row in table.rows {
            let cells = table.columns.iter().cloned().zip(row).collect();
            self.rows.push((parameter_id, run_id, cells));
        }
    }

    fn finish(self, name: String) -> AggregatedTable {
        let Pending {
            index_columns,
            data_columns,
            mut rows,
        } = self;
        rows.sort_by_key(|(parameter_id, run_id, _)| (*parameter_id, *run_id));
        let rows = rows
            .into_iter()
            .map(|(parameter_id, run_id, mut cells)| AggregatedRow {
                parameter_id,
                run_id,
                cells: index_columns
                    .iter()
                    .chain(&data_columns)
                    .map(|column| cells.remove(column).unwrap_or_default())
                    .collect(),
            })
            .collect();
        AggregatedTable {
            name,
            index_columns,
            data_columns,
            rows,
        }
    }
}

fn merge_columns(into: &mut Vec<String>, columns: &[String]) {
    for column in columns {
        if !into.contains(column) {
            into.push(column.clone());
        }
    }
}

/// Collects per-job QoI tables in any completion order and reassembles them by key.
#[derive(Debug)]
pub struct Aggregator {
    requested: Vec<String>,
    pending: BTreeMap<String, Pending>,
}

impl Aggregator {
    /// Starts an aggregation over the requested artifact names.
    pub fn new(requested: &[String]) -> Self {
        Self {
            requested: requested.to_vec(),
            pending: requested
                .iter()
                .map(|name| (name.clone(), Pending::default()))
                .collect(),
        }
    }

    /// Adds the tables extracted from one successful job. Tables for
    /// artifacts that were not requested are ignored.
    pub fn add(&mut self, parameter_id: usize, run_id: usize, tables: Vec<QoiTable>) {
        for table in tables {
            match self.pending.get_mut(&table.name) {
                Some(pending) => pending.absorb(parameter_id, run_id, table),
                None => warn!(artifact = %table.name, "ignoring artifact that was not requested"),
            }
        }
    }

    /// Concatenated result; the name wrapper is dropped for a single artifact.
    pub fn finish(mut self) -> QoiResult {
        let mut tables: BTreeMap<String, AggregatedTable> = BTreeMap::new();
        for name in &self.requested {
            if let Some(pending) = self.pending.remove(name) {
                tables.insert(name.clone(), pending.finish(name.clone()));
            }
        }
        if tables.len() == 1 {
            if let Some((_, table)) = tables.pop_first() {
                return QoiResult::Single(table);
            }
        }
        QoiResult::Many(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, columns: &[&str], rows: &[&[&str]]) -> QoiTable {
        QoiTable {
            name: name.to_string(),
            index_columns: 1,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn rows_are_reassembled_by_key() {
        let mut aggregator = Aggregator::new(&["t.txt".to_string()]);
        aggregator.add(1, 0, vec![table("t.txt", &["id", "v"], &[&["0", "b"]])]);
        aggregator.add(0, 1, vec![table("t.txt", &["id", "v"], &[&["0", "a1"]])]);
        aggregator.add(0, 0, vec![table("t.txt", &["id", "v"], &[&["0", "a0"], &["1", "a0b"]])]);
        let QoiResult::Single(result) = aggregator.finish() else {
            panic!("single artifact should not be wrapped");
        };
        let keys: Vec<_> = result.rows.iter().map(|r| (r.parameter_id, r.run_id)).collect();
        assert_eq!(keys, vec![(0, 0), (0, 0), (0, 1), (1, 0)]);
        assert_eq!(result.header(), vec!["parameter_id", "run_id", "id", "v"]);
        assert_eq!(result.rows_for(0, 0).count(), 2);
    }

    #[test]
    fn mismatched_headers_take_union() {
        let mut aggregator = Aggregator::new(&["t.txt".to_string()]);
        aggregator.add(0, 0, vec![table("t.txt", &["id", "a"], &[&["0", "1"]])]);
        aggregator.add(1, 0, vec![table("t.txt", &["id", "b"], &[&["0", "2"]])]);
        let result = aggregator.finish();
        let table = result.table("t.txt").unwrap();
        assert_eq!(table.data_columns, vec!["a", "b"]);
        assert_eq!(table.rows[0].cells, vec!["0", "1", ""]);
        assert_eq!(table.rows[1].cells, vec!["0", "", "2"]);
    }

    #[test]
    fn several_artifacts_stay_wrapped() {
        let names = vec!["a.txt".to_string(), "b.txt".to_string()];
        let mut aggregator = Aggregator::new(&names);
        aggregator.add(0, 0, vec![table("a.txt", &["id"], &[&["1"]])]);
        let result = aggregator.finish();
        assert!(matches!(result, QoiResult::Many(_)));
        assert_eq!(result.tables().len(), 2);
        assert_eq!(result.row_count(), 1);
        assert!(result.table("b.txt").unwrap().rows.is_empty());
    }
}
