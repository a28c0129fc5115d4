use pex_core::PexError;
use pex_qoi::ParameterTable;
use pex_sample::{BoxUlam, MarkovBoxModel, MarkovReport};
use tracing::{info, warn};

use crate::job::JobResult;
use crate::study::BoxUlamSpec;

/// Fits the box transition model from the last row of each successful job's
/// result artifact.
pub(crate) fn markov_report(
    strategy: &BoxUlam,
    spec: &BoxUlamSpec,
    parameters: &ParameterTable,
    results: &[JobResult],
) -> Result<MarkovReport, PexError> {
    let mut model = MarkovBoxModel::new(strategy.partition().clone());
    let mut recorded = 0usize;
    for result in results.iter().filter(|result| result.success) {
        let Some(start_box) = parameters
            .row(result.parameter_id, result.run_id)
            .and_then(|row| row.box_id)
        else {
            warn!(job = %result.name, "no start box recorded, skipping transition");
            continue;
        };
        let Some(table) = result
            .qoi
            .as_ref()
            .and_then(|tables| tables.iter().find(|table| table.name == spec.result_qoi))
        else {
            warn!(job = %result.name, artifact = %spec.result_qoi, "result artifact missing, skipping transition");
            continue;
        };
        let Some(last) = table.rows.len().checked_sub(1) else {
            warn!(job = %result.name, artifact = %spec.result_qoi, "result artifact is empty, skipping transition");
            continue;
        };
        match table.row_values(last, &spec.result_columns) {
            Ok(coords) => {
                model.record(start_box, &coords)?;
                recorded += 1;
            }
            Err(err) => warn!(job = %result.name, error = %err, "unreadable final state, skipping transition"),
        }
    }

    let initial: Vec<usize> = if spec.initial_boxes.is_empty() {
        (0..strategy.partition().box_count()).collect()
    } else {
        spec.initial_boxes.clone()
    };
    let report = model.report(&initial, spec.steps, spec.eigenpairs)?;
    info!(
        transitions = recorded,
        out_of_domain = report.out_of_domain,
        relaxation_time = ?report.relaxation_time,
        "fitted box transition model"
    );
    Ok(report)
}
