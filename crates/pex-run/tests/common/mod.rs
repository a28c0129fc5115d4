//! Fixtures shared by the integration tests: a shell-script simulator and a
//! study builder.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use pex_doc::Node;
use pex_run::Study;
use pex_sample::{GridParameter, StrategySpec};

pub const QOI: &str = "evacuation_time.txt";

/// Simulator honoring the `--input/--output` contract. Variants whose input
/// mentions `1.2` finish quickly; every other variant stalls until killed.
const SIMULATOR: &str = r#"#!/bin/sh
input=""
output=""
while [ $# -gt 0 ]; do
  case "$1" in
    --input) input="$2"; shift 2 ;;
    --output) output="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if grep -q '1\.2' "$input"; then
  mkdir -p "$output"
  printf 'id evacuationTime\n0 12.5\n' > "$output/evacuation_time.txt"
  echo "done"
  exit 0
fi
echo "stalling"
exec sleep 30
"#;

/// Writes the simulator into `dir` and marks it executable.
pub fn write_simulator(dir: &Path) -> PathBuf {
    let path = dir.join("simulate.sh");
    fs::write(&path, SIMULATOR).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// The two-job speed study: `speed` in {1.0, 1.2}, one second per job.
pub fn speed_study(dir: &Path) -> Study {
    let base = dir.join("scenario.json");
    fs::write(&base, r#"{"speed": 1.0, "label": "", "fixedSeed": 0}"#).unwrap();
    Study {
        name: "speed".into(),
        base_document: base,
        executable: write_simulator(dir),
        workspace: dir.join("ws"),
        qoi: vec![QOI.into()],
        runs: 1,
        workers: 2,
        timeout_seconds: Some(1),
        id_width: 6,
        seed: 42,
        keep_output: true,
        extra_args: Vec::new(),
        index_columns: BTreeMap::new(),
        post_changes: Vec::new(),
        strategy: StrategySpec::FullGrid {
            parameters: vec![GridParameter {
                address: "speed".into(),
                values: vec![Node::Float(1.0), Node::Float(1.2)],
            }],
        },
        remote: None,
        box_ulam: None,
    }
}
