use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const STUB_RESPONSE: &str = "Here you go!\n\n\
Tweet 1: Shipping small patches every day keeps the project healthy\n\
Image suggestion: A tidy workbench\n\n\
Tweet 2: Thank you to everyone who reviewed code this week\n";

fn write_config(dir: &TempDir, providers: &str, extra: &str) -> PathBuf {
    let data = dir.path().join("data");
    let content = format!(
        r#"[general]
batch_path = "{batch}"
history_backend = "jsonl"
history_path = "{history}"
dry_run = true

[generation]
target_count = 2
positivity_check = false
max_rounds = 2
round_delay_secs = 0

[llm]
retries = 0
backoff_ms = 0

[publish]
delay_secs = 0
outbox_path = "{outbox}"

{extra}

{providers}
"#,
        batch = toml_path(&data.join("batch.json")),
        history = toml_path(&data.join("history.jsonl")),
        outbox = toml_path(&data.join("outbox.jsonl")),
        extra = extra,
        providers = providers,
    );

    let path = dir.path().join("config.toml");
    fs::write(&path, content).expect("write config");
    path
}

fn toml_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

fn stub_providers() -> String {
    format!(
        "[[providers]]\nname = \"scripted\"\nkind = \"stub\"\nresponses = [{:?}]\n",
        STUB_RESPONSE
    )
}

fn read_batch(dir: &TempDir) -> Value {
    let content = fs::read_to_string(dir.path().join("data/batch.json")).expect("read batch");
    serde_json::from_str(&content).expect("batch is JSON")
}

#[test]
fn config_init_writes_example_file() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");

    let mut cmd = cargo_bin_cmd!("post-batcher");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .success();

    let content = fs::read_to_string(&config_path).expect("read config");
    assert!(content.contains("target_count"));
    assert!(content.contains("dry_run = true"));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "# mine").expect("write config");

    let mut cmd = cargo_bin_cmd!("post-batcher");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(fs::read_to_string(&config_path).unwrap(), "# mine");
}

#[test]
fn generate_writes_batch_from_stub_provider() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = write_config(&dir, &stub_providers(), "");

    let mut cmd = cargo_bin_cmd!("post-batcher");
    cmd.arg("--config")
        .arg(&config_path)
        .arg("generate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Generation complete"));

    let batch = read_batch(&dir);
    let items = batch["items"].as_array().expect("items array");
    assert_eq!(items.len(), 2);
    assert_eq!(
        items[0]["text"],
        "Shipping small patches every day keeps the project healthy"
    );
    assert_eq!(items[0]["image_suggestion"], "A tidy workbench");
    assert_eq!(items[0]["origin"]["provider"], "scripted");
    assert_eq!(
        items[1]["text"],
        "Thank you to everyone who reviewed code this week"
    );
    assert_eq!(batch["target_count"], 2);
}

#[test]
fn second_generate_is_a_no_op() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = write_config(&dir, &stub_providers(), "");

    cargo_bin_cmd!("post-batcher")
        .arg("--config")
        .arg(&config_path)
        .arg("generate")
        .assert()
        .success();
    let first = fs::read_to_string(dir.path().join("data/batch.json")).unwrap();

    cargo_bin_cmd!("post-batcher")
        .arg("--config")
        .arg(&config_path)
        .arg("generate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Batch already exists"));

    let second = fs::read_to_string(dir.path().join("data/batch.json")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn generate_fills_from_reserve_when_provider_falls_short() {
    let dir = TempDir::new().expect("temp dir");
    let providers = "[[providers]]\nname = \"scripted\"\nkind = \"stub\"\nresponses = [\"Tweet 1: The only generated post\"]\n";
    let reserve = "[reserve]\nitems = [\"Reserve post one\", \"Reserve post two\"]\n";
    let config_path = write_config(&dir, providers, reserve);

    cargo_bin_cmd!("post-batcher")
        .arg("--config")
        .arg(&config_path)
        .arg("generate")
        .assert()
        .success()
        .stdout(predicate::str::contains("reserve used"));

    let batch = read_batch(&dir);
    let texts: Vec<&str> = batch["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["The only generated post", "Reserve post one"]);
}

#[test]
fn generate_fails_without_available_providers() {
    let dir = TempDir::new().expect("temp dir");
    let providers = "[[providers]]\nname = \"openai\"\nkind = \"openai\"\napi_key_env = \"POST_BATCHER_TEST_MISSING_KEY\"\nmodels = [\"gpt-4o-mini\"]\n";
    let config_path = write_config(&dir, providers, "");

    cargo_bin_cmd!("post-batcher")
        .env_remove("POST_BATCHER_TEST_MISSING_KEY")
        .arg("--config")
        .arg(&config_path)
        .arg("generate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Generation aborted"))
        .stdout(predicate::str::contains("accepted=0"))
        .stdout(predicate::str::contains("target=2"))
        .stderr(predicate::str::contains("No text provider"));

    assert!(!dir.path().join("data/batch.json").exists());
}

#[test]
fn batch_show_outputs_json() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = write_config(&dir, &stub_providers(), "");

    cargo_bin_cmd!("post-batcher")
        .arg("--config")
        .arg(&config_path)
        .arg("generate")
        .assert()
        .success();

    let output = cargo_bin_cmd!("post-batcher")
        .arg("--config")
        .arg(&config_path)
        .args(["batch", "show", "--json"])
        .output()
        .expect("run batch show");

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["items"].as_array().unwrap().len(), 2);
    assert_eq!(json["published"], 0);
}

#[test]
fn batch_show_without_batch_prints_message() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = write_config(&dir, &stub_providers(), "");

    cargo_bin_cmd!("post-batcher")
        .arg("--config")
        .arg(&config_path)
        .args(["batch", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No batch stored"));
}

#[test]
fn publish_dry_run_leaves_batch_untouched() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = write_config(&dir, &stub_providers(), "");

    cargo_bin_cmd!("post-batcher")
        .arg("--config")
        .arg(&config_path)
        .arg("generate")
        .assert()
        .success();

    cargo_bin_cmd!("post-batcher")
        .arg("--config")
        .arg(&config_path)
        .args(["publish", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run: would publish 1 of 2"));

    assert_eq!(read_batch(&dir)["items"].as_array().unwrap().len(), 2);
    assert!(!dir.path().join("data/history.jsonl").exists());
}

#[test]
fn publish_require_approval_writes_outbox_and_consumes_item() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = write_config(&dir, &stub_providers(), "");

    cargo_bin_cmd!("post-batcher")
        .arg("--config")
        .arg(&config_path)
        .arg("generate")
        .assert()
        .success();

    cargo_bin_cmd!("post-batcher")
        .arg("--config")
        .arg(&config_path)
        .args(["publish", "--require-approval"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Published 1 item(s), 1 remaining"));

    let outbox = fs::read_to_string(dir.path().join("data/outbox.jsonl")).expect("read outbox");
    let lines: Vec<&str> = outbox.lines().collect();
    assert_eq!(lines.len(), 1);
    let entry: Value = serde_json::from_str(lines[0]).expect("outbox entry is JSON");
    assert_eq!(
        entry["text"],
        "Shipping small patches every day keeps the project healthy"
    );
    assert_eq!(entry["platform"], "x");

    let batch = read_batch(&dir);
    assert_eq!(batch["published"], 1);
    assert_eq!(
        batch["items"][0]["text"],
        "Thank you to everyone who reviewed code this week"
    );

    let history = fs::read_to_string(dir.path().join("data/history.jsonl")).expect("history");
    assert!(history.contains("Shipping small patches every day keeps the project healthy"));
}

#[test]
fn publish_without_enabled_publisher_fails() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = write_config(&dir, &stub_providers(), "");

    cargo_bin_cmd!("post-batcher")
        .arg("--config")
        .arg(&config_path)
        .arg("generate")
        .assert()
        .success();

    cargo_bin_cmd!("post-batcher")
        .env("POST_BATCHER__GENERAL__DRY_RUN", "false")
        .arg("--config")
        .arg(&config_path)
        .arg("publish")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No publisher enabled"));
}

#[test]
fn doctor_reports_json() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = write_config(&dir, &stub_providers(), "");

    let output = cargo_bin_cmd!("post-batcher")
        .arg("--config")
        .arg(&config_path)
        .args(["doctor", "--json"])
        .output()
        .expect("run doctor");

    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["config"]["status"], "ok");
    assert_eq!(json["providers"]["status"], "ok");
    assert_eq!(json["providers"]["details"]["available"][0], "scripted");
}
