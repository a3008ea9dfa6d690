use gsn_engine::{Model, edit};

use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const MODEL: &str = r#"[
    {"id":"nsp/G1","type":"Goal","uuid":"u1","summary":"Top","solvedBy":["nsp/G1/S1"]},
    {"id":"nsp/G1/S1","type":"Strategy","uuid":"u2","solvedBy":["ext/G9"]},
    {"id":"ext/G9","type":"Goal","uuid":"u3"}
]"#;

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gsn-engine"))
        .current_dir(dir)
        .args(args)
        .env_remove("GSN_LOG")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn to_gsn_writes_one_file_per_namespace() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("model.json"), MODEL).unwrap();

    let out = run(dir.path(), &["to-gsn", "model.json", "-o", ".", "-i", "2"]);
    assert!(out.status.success(), "{}", stderr(&out));

    let ns = fs::read_to_string(dir.path().join("gsnModel/nsp.gsn")).unwrap();
    assert!(ns.starts_with("GOALS nsp\n{\n  goal G1\n"));
    assert!(ns.contains("ref_goal: ext.G9;"));
    assert!(dir.path().join("gsnModel/ext.gsn").is_file());
    assert!(stdout(&out).contains("Wrote"));
}

#[test]
fn to_gsn_refuses_an_existing_model_folder() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("model.json"), MODEL).unwrap();

    let first = run(dir.path(), &["to-gsn", "model.json", "-s", "-m", "one"]);
    assert!(first.status.success(), "{}", stderr(&first));
    assert!(dir.path().join("one/main.gsn").is_file());

    let second = run(dir.path(), &["to-gsn", "model.json", "-s", "-m", "one"]);
    assert!(!second.status.success());
    assert!(stderr(&second).contains("The model directory already exists!"));
}

#[test]
fn model_errors_are_reported_and_exit_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("bad.json"),
        r#"[{"id":"nsp/G1","type":"Goal","solvedBy":["nsp/G9"]}]"#,
    )
    .unwrap();

    let out = run(dir.path(), &["to-gsn", "bad.json"]);
    assert!(!out.status.success());

    let report = stdout(&out);
    assert!(report.contains("MODEL-ERROR: node index [0] id = nsp/G1\nReferenced node \"nsp/G9\" does not exist"));
    assert!(report.contains("Hint: "));
    assert!(stderr(&out).contains("1 model error(s)"));
    assert!(!dir.path().join("gsnModel").exists());

    let check = run(dir.path(), &["check", "bad.json"]);
    assert!(!check.status.success());
    assert!(stdout(&check).contains("MODEL-ERROR"));
}

#[test]
fn text_converts_back_to_the_same_model() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("model.json"), MODEL).unwrap();

    let out = run(dir.path(), &["to-gsn", "model.json"]);
    assert!(out.status.success(), "{}", stderr(&out));

    let back = run(
        dir.path(),
        &["to-json", "gsnModel/nsp.gsn", "gsnModel/ext.gsn", "-o", "back.json"],
    );
    assert!(back.status.success(), "{}", stderr(&back));

    let expected = Model::from_json(MODEL).unwrap();
    let parsed = Model::from_path(&dir.path().join("back.json").to_string_lossy()).unwrap();
    let mut ids: Vec<&str> = parsed.nodes().iter().map(|n| n.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["ext/G9", "nsp/G1", "nsp/G1/S1"]);
    assert_eq!(parsed.get("nsp/G1/S1").unwrap().solved_by, expected.get("nsp/G1/S1").unwrap().solved_by);
    assert_eq!(parsed.get("nsp/G1").unwrap().uuid.as_deref(), Some("u1"));
}

#[test]
fn hash_matches_the_library() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("model.json"), MODEL).unwrap();

    let out = run(dir.path(), &["hash", "model.json"]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out).trim(), edit::model_hash(&Model::from_json(MODEL).unwrap()));
}

#[test]
fn apply_rejects_a_stale_base_hash() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("model.json"), MODEL).unwrap();
    fs::write(
        dir.path().join("changes.json"),
        r#"[{"cmd":"onAttributeChange","nodeId":"nsp/G1","attr":"summary","newValue":"x"}]"#,
    )
    .unwrap();

    let stale = run(
        dir.path(),
        &["apply", "model.json", "changes.json", "--base-hash", "abc"],
    );
    assert!(!stale.status.success());

    let ok = run(dir.path(), &["apply", "model.json", "changes.json", "-o", "next.json"]);
    assert!(ok.status.success(), "{}", stderr(&ok));
    let next = Model::from_path(&dir.path().join("next.json").to_string_lossy()).unwrap();
    assert_eq!(next.get("nsp/G1").unwrap().summary.as_deref(), Some("x"));
}
