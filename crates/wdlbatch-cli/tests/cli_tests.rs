use harness::TestHarness;
use predicates::prelude::*;
use std::fs;

mod harness;

#[test]
fn test_help_lists_commands() {
    let harness = TestHarness::new();
    harness
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("make-inputs"))
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_init_sample_sheet() {
    let harness = TestHarness::new();
    let config = harness.write_batch_config();
    let sheet = harness.path("sheet.csv");

    harness
        .cmd()
        .arg("init-sample-sheet")
        .arg("-c")
        .arg(&config)
        .arg("-o")
        .arg(&sheet)
        .arg("--rows")
        .arg("2")
        .arg("--optional-column")
        .arg("ALL")
        .assert()
        .success();

    let text = fs::read_to_string(&sheet).unwrap();
    assert_eq!(text, "wf.sample,wf.reads,wf.threads\n,,4\n,,4\n");
}

#[test]
fn test_init_sample_sheet_unknown_optional_column() {
    let harness = TestHarness::new();
    let config = harness.write_batch_config();

    harness
        .cmd()
        .arg("init-sample-sheet")
        .arg("-c")
        .arg(&config)
        .arg("-o")
        .arg(harness.path("sheet.csv"))
        .arg("--optional-column")
        .arg("bogus")
        .assert()
        .failure()
        .stderr(predicate::str::contains("[ERROR]"))
        .stderr(predicate::str::contains("'bogus'"));
}

#[test]
fn test_merge_replicates() {
    let harness = TestHarness::new();
    let config = harness.write_batch_config();
    let sheet = harness.write_sample_sheet("sheet.csv", &[("S1", "a.fq"), ("S2", "c.fq"), ("S1", "b.fq")]);
    let merged = harness.path("merged.csv");

    harness
        .cmd()
        .arg("merge-replicates")
        .arg("-c")
        .arg(&config)
        .arg("-s")
        .arg(&sheet)
        .arg("-o")
        .arg(&merged)
        .assert()
        .success();

    let text = fs::read_to_string(&merged).unwrap();
    assert_eq!(text, "wf.sample,wf.reads\nS1,\"a.fq, b.fq\"\nS2,c.fq\n");
}

#[test]
fn test_make_inputs_reports_every_sheet_problem() {
    let harness = TestHarness::new();
    let config = harness.write_batch_config();
    let sheet = harness.write("sheet.csv", "wf.sample,wf.reads,wf.extra\nS1,,x\nS1,a.fq,y\n");

    harness
        .cmd()
        .arg("make-inputs")
        .arg("-c")
        .arg(&config)
        .arg("-s")
        .arg(&sheet)
        .arg("-b")
        .arg("B1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("sample ids are not unique: S1"))
        .stderr(predicate::str::contains("missing a value in required column 'wf.reads'"))
        .stderr(predicate::str::contains("'wf.extra'"));
}

#[test]
fn test_make_inputs_with_unreachable_server_is_advisory() {
    let harness = TestHarness::new();
    let config = harness.write_batch_config();
    let sheet = harness.write_sample_sheet("sheet.csv", &[("S1", "a.fq"), ("S2", "b.fq")]);
    let out = harness.path("out");

    harness
        .cmd()
        .arg("make-inputs")
        .arg("-c")
        .arg(&config)
        .arg("-s")
        .arg(&sheet)
        .arg("-b")
        .arg("B1")
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Batch 'B1' prepared"));

    assert_eq!(harness.files_matching(&out, "B1.make_batch.").len(), 4);

    harness
        .cmd()
        .arg("make-inputs")
        .arg("-c")
        .arg(&config)
        .arg("-s")
        .arg(&sheet)
        .arg("-b")
        .arg("B2")
        .arg("-o")
        .arg(&out)
        .arg("--unique-batch-name")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not reach the workflow server"));
}

#[test]
fn test_make_inputs_rejects_bad_sample_id_before_contacting_server() {
    let harness = TestHarness::new();
    let config = harness.write_batch_config();
    let sheet = harness.write_sample_sheet("sheet.csv", &[("bad sample", "a.fq"), ("S2", "b.fq")]);
    let out = harness.path("out");

    harness
        .cmd()
        .arg("make-inputs")
        .arg("-c")
        .arg(&config)
        .arg("-s")
        .arg(&sheet)
        .arg("-b")
        .arg("B1")
        .arg("-o")
        .arg(&out)
        .arg("--unique-batch-name")
        .assert()
        .failure()
        .stderr(predicate::str::contains("sample id 'bad sample'"))
        .stderr(predicate::str::contains("Could not reach").not());

    assert!(!out.exists());
}

#[test]
fn test_make_inputs_rejects_bad_batch_name() {
    let harness = TestHarness::new();
    let config = harness.write_batch_config();
    let sheet = harness.write_sample_sheet("sheet.csv", &[("S1", "a.fq")]);

    harness
        .cmd()
        .arg("make-inputs")
        .arg("-c")
        .arg(&config)
        .arg("-s")
        .arg(&sheet)
        .arg("-b")
        .arg("bad batch!")
        .assert()
        .failure()
        .stderr(predicate::str::contains("batch name"));
}

#[test]
fn test_submit_rejects_unknown_policy() {
    let harness = TestHarness::new();

    harness
        .cmd()
        .arg("submit")
        .arg("--wdl")
        .arg("wf.wdl")
        .arg("--inputs")
        .arg("inputs.json")
        .arg("--labels")
        .arg("labels.json")
        .arg("--conflict-policy")
        .arg("rerun-sometimes")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown conflict policy 'rerun-sometimes'"));
}

#[test]
fn test_status_against_unreachable_server() {
    let harness = TestHarness::new();

    harness
        .cmd()
        .arg("status")
        .arg("B1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("[ERROR] Could not reach the workflow server"));
}

#[test]
fn test_invalid_config_file() {
    let harness = TestHarness::new();
    let config = harness.write("config.toml", "server_url = 5\n");

    harness
        .cmd()
        .arg("--config")
        .arg(&config)
        .arg("abort")
        .arg("B1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("[ERROR]"));
}

#[test]
fn test_completions() {
    let harness = TestHarness::new();
    harness
        .cmd()
        .arg("completions")
        .arg("--shell")
        .arg("bash")
        .assert()
        .success()
        .stdout(predicate::str::contains("wdlbatch"));
}
