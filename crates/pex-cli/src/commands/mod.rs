pub mod collect;
pub mod materialize;
pub mod pack;
pub mod remote_worker;
pub mod resolve;
pub mod run;

use std::process::ExitCode;

use pex_run::BatchOutcome;

/// Exit status when at least one job failed.
pub const JOBS_FAILED: u8 = 2;

/// Prints the batch totals and one excerpt per failed job to stdout.
pub fn print_summary(outcome: &BatchOutcome) {
    let report = &outcome.report;
    println!(
        "{study} [{strategy}, {mode}]: {passed}/{total} jobs passed, {rows} qoi rows",
        study = report.study,
        strategy = report.strategy,
        mode = report.mode,
        passed = report.totals.passed,
        total = report.totals.total,
        rows = report.qoi_rows,
    );
    for failure in &report.failures {
        println!("  {} ({:?}): {}", failure.job, failure.kind, failure.message);
        for line in failure.excerpt.lines() {
            println!("    | {line}");
        }
    }
    if let Some(markov) = &outcome.markov {
        match markov.relaxation_time {
            Some(time) => println!("box transition model: relaxation time {time:.4}"),
            None => println!("box transition model: no relaxation time"),
        }
    }
}

/// 0 when every job passed, [`JOBS_FAILED`] otherwise.
pub fn exit_code(outcome: &BatchOutcome) -> ExitCode {
    if outcome.report.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(JOBS_FAILED)
    }
}
