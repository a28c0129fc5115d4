use std::fs;
use std::process::Command;

fn pex() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pex"))
}

#[test]
fn resolve_prints_value_and_location() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("scenario.json");
    fs::write(
        &doc,
        r#"{"scenario": {"agents": [{"id": 1, "radius": 0.2}, {"id": 2, "radius": 0.3}]}}"#,
    )
    .unwrap();

    let output = pex()
        .args(["resolve", "--document"])
        .arg(&doc)
        .args(["--address", "agents.[id==2].radius", "--leaf"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let printed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(printed["path"], "scenario.agents[1].radius");
    assert_eq!(printed["value"], 0.3);
}

#[test]
fn unknown_address_exits_with_one() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("scenario.json");
    fs::write(&doc, r#"{"speed": 1.0}"#).unwrap();

    let output = pex()
        .args(["resolve", "--document"])
        .arg(&doc)
        .args(["--address", "velocity"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("velocity"));
}

#[test]
fn pack_writes_an_archive() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("out");
    fs::create_dir_all(root.join("000000_000000")).unwrap();
    fs::write(root.join("000000_000000").join("status.json"), "{}").unwrap();
    let archive = dir.path().join("out.zip");

    let status = pex()
        .args(["pack", "--root"])
        .arg(&root)
        .arg("--archive")
        .arg(&archive)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(archive.is_file());
}
