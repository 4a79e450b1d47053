//! CLI integration tests for the `brms` binary.
//!
//! Uses `assert_cmd` to spawn the binary inside a temporary workspace that
//! holds a `rules/` directory. Online tests run an in-process fake of the
//! decision service on its own thread and point the CLI at it through
//! `BRMS_API_URL`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

const RULE: &str = r#"{
  "nodes": [
    {"id": "in", "type": "inputNode", "name": "Request",
     "content": {"fields": [{"field": "age", "name": "Age", "type": "number-input"}]}},
    {"id": "out", "type": "outputNode", "name": "Response",
     "content": {"fields": [{"field": "eligible", "name": "Eligible"}]}}
  ],
  "edges": [{"id": "e1", "sourceId": "in", "targetId": "out"}]
}"#;

/// Temporary workspace with `rules/elig.json`.
fn workspace() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    fs::create_dir(dir.path().join("rules")).expect("rules dir");
    fs::write(dir.path().join("rules/elig.json"), RULE).expect("rule file");
    dir
}

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).expect("write fixture");
}

/// Helper: create a Command for the `brms` binary, rooted at `dir`.
fn brms(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("brms");
    cmd.current_dir(dir)
        .env_remove("BRMS_API_URL")
        .env_remove("BRMS_API_TOKEN")
        .env_remove("BRMS_RULE_DIR")
        .env_remove("BRMS_TIMEOUT_SECS")
        .env("RUST_LOG", "error");
    cmd
}

// ──────────────────────────────────────────────
// Fake decision service
// ──────────────────────────────────────────────

#[derive(Default)]
struct Service {
    scenarios: Mutex<Vec<Value>>,
    next_id: Mutex<u64>,
}

fn eligibility(context: &Value) -> Value {
    let age = context.get("age").and_then(Value::as_i64).unwrap_or(0);
    json!({"eligible": age >= 18})
}

fn to_object(pairs: &Value) -> Value {
    let mut object = serde_json::Map::new();
    for pair in pairs.as_array().into_iter().flatten() {
        if let Some(name) = pair["name"].as_str() {
            object.insert(name.to_string(), pair["value"].clone());
        }
    }
    Value::Object(object)
}

async fn rule_map() -> Json<Value> {
    Json(json!({
        "inputs": [{"field": "age", "name": "Age", "type": "number-input"}],
        "outputs": [{"field": "eligible"}],
        "resultOutputs": [{"field": "eligible"}]
    }))
}

async fn evaluate(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({"result": eligibility(&body["context"]), "trace": {}}))
}

async fn list(
    State(svc): State<Arc<Service>>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let filepath = query.get("filepath").cloned().unwrap_or_default();
    let all = svc.scenarios.lock().unwrap().clone();
    Json(Value::Array(
        all.into_iter().filter(|s| s["filepath"] == json!(filepath)).collect(),
    ))
}

async fn create(State(svc): State<Arc<Service>>, Json(mut body): Json<Value>) -> Json<Value> {
    let mut next = svc.next_id.lock().unwrap();
    *next += 1;
    body["_id"] = json!(format!("s{}", next));
    svc.scenarios.lock().unwrap().push(body.clone());
    Json(body)
}

async fn update(
    State(svc): State<Arc<Service>>,
    UrlPath(id): UrlPath<String>,
    Json(mut body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut all = svc.scenarios.lock().unwrap();
    match all.iter_mut().find(|s| s["_id"] == json!(id)) {
        Some(slot) => {
            body["_id"] = json!(id);
            *slot = body.clone();
            (StatusCode::OK, Json(body))
        }
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))),
    }
}

async fn delete(State(svc): State<Arc<Service>>, UrlPath(id): UrlPath<String>) -> StatusCode {
    let mut all = svc.scenarios.lock().unwrap();
    let before = all.len();
    all.retain(|s| s["_id"] != json!(id));
    if all.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn run_decisions(State(svc): State<Arc<Service>>, Json(body): Json<Value>) -> Json<Value> {
    let mut out = serde_json::Map::new();
    for s in svc.scenarios.lock().unwrap().iter() {
        if s["filepath"] != body["filepath"] {
            continue;
        }
        let inputs = to_object(&s["variables"]);
        let title = s["title"].as_str().unwrap_or_default().to_string();
        out.insert(title, json!({"inputs": inputs, "result": eligibility(&inputs)}));
    }
    Json(Value::Object(out))
}

/// Start the fake on an ephemeral port and return its API base URL.
fn start_service() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.set_nonblocking(true).expect("nonblocking");
    let addr = listener.local_addr().expect("addr");
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        runtime.block_on(async move {
            let app = Router::new()
                .route("/api/rulemap", post(rule_map))
                .route("/api/decisions/evaluate", post(evaluate))
                .route("/api/scenario", post(create))
                .route("/api/scenario/by-filepath", get(list))
                .route("/api/scenario/run-decisions", post(run_decisions))
                .route("/api/scenario/{id}", put(update).delete(delete))
                .with_state(Arc::new(Service::default()));
            let listener = tokio::net::TcpListener::from_std(listener).expect("listener");
            axum::serve(listener, app).await.expect("serve");
        });
    });
    format!("http://{}/api", addr)
}

fn online(dir: &Path, url: &str) -> Command {
    let mut cmd = brms(dir);
    cmd.env("BRMS_API_URL", url);
    cmd
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    let dir = workspace();
    brms(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Scenario workbench for JDM decision rules",
        ));
}

#[test]
fn version_exits_0() {
    let dir = workspace();
    brms(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("brms"));
}

// ──────────────────────────────────────────────
// 2. Offline commands
// ──────────────────────────────────────────────

#[test]
fn offline_template_lists_graph_fields() {
    let dir = workspace();
    brms(dir.path())
        .args(["--offline", "csv", "template", "rules/elig.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Scenario,Input: age,Expected Result: eligible",
        ));
}

#[test]
fn offline_template_writes_file() {
    let dir = workspace();
    brms(dir.path())
        .args(["--offline", "csv", "template", "rules/elig.json", "--out", "t.csv"])
        .assert()
        .success();
    let text = fs::read_to_string(dir.path().join("t.csv")).unwrap();
    assert!(text.starts_with("Scenario,"));
}

#[test]
fn offline_check_clean_graph() {
    let dir = workspace();
    brms(dir.path())
        .args(["--offline", "check", "rules/elig.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no misconnected fields"));
}

#[test]
fn check_reports_stale_rule_map() {
    let dir = workspace();
    write(
        dir.path(),
        "map.json",
        r#"{"inputs": [{"field": "legacy"}, {"field": "age"}], "outputs": [{"field": "eligible"}]}"#,
    );
    brms(dir.path())
        .args(["--offline", "check", "rules/elig.json", "--rule-map", "map.json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("UNUSED INPUT legacy"));
}

#[test]
fn check_json_output() {
    let dir = workspace();
    let output = brms(dir.path())
        .args(["--offline", "--output", "json", "check", "rules/elig.json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["filepath"], json!("elig.json"));
    assert_eq!(value["misconnected"], json!([]));
}

// ──────────────────────────────────────────────
// 3. Errors and configuration
// ──────────────────────────────────────────────

#[test]
fn missing_rule_file_fails() {
    let dir = workspace();
    brms(dir.path())
        .args(["--offline", "check", "rules/nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error reading"));
}

#[test]
fn json_errors_are_objects() {
    let dir = workspace();
    let output = brms(dir.path())
        .args(["--offline", "--output", "json", "check", "rules/nope.json"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let value: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert!(value["error"].as_str().unwrap().contains("nope.json"));
}

#[test]
fn quiet_suppresses_errors() {
    let dir = workspace();
    brms(dir.path())
        .args(["--offline", "--quiet", "check", "rules/nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::is_empty());
}

#[test]
fn bad_timeout_env_fails() {
    let dir = workspace();
    brms(dir.path())
        .env("BRMS_TIMEOUT_SECS", "soon")
        .args(["--offline", "check", "rules/elig.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("BRMS_TIMEOUT_SECS"));
}

#[test]
fn unreachable_service_fails() {
    let dir = workspace();
    write(
        dir.path(),
        "brms.toml",
        "[api]\nurl = \"http://127.0.0.1:9/api\"\ntimeout_secs = 2\n",
    );
    brms(dir.path())
        .args(["scenarios", "list", "rules/elig.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load scenarios"));
}

// ──────────────────────────────────────────────
// 4. Against the fake service
// ──────────────────────────────────────────────

#[test]
fn simulate_save_list_and_run() {
    let url = start_service();
    let dir = workspace();
    write(dir.path(), "adult.json", r#"{"age": 30}"#);
    write(dir.path(), "minor.json", r#"{"age": 12}"#);

    online(dir.path(), &url)
        .args(["simulate", "rules/elig.json", "--context", "adult.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"eligible\": true"));

    online(dir.path(), &url)
        .args([
            "simulate", "rules/elig.json", "--context", "adult.json", "--save", "Adult", "--yes",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("saved scenario 'Adult'"));

    // Expected result deliberately wrong so the run reports a failure.
    write(dir.path(), "wrong.json", r#"{"eligible": true}"#);
    online(dir.path(), &url)
        .args([
            "simulate", "rules/elig.json", "--context", "minor.json", "--expected", "wrong.json",
            "--save", "Minor", "--yes",
        ])
        .assert()
        .success();

    online(dir.path(), &url)
        .args(["scenarios", "list", "rules/elig.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Adult"))
        .stdout(predicate::str::contains("Minor"))
        .stdout(predicate::str::contains("page 1 of 1 (2 scenarios)"));

    online(dir.path(), &url)
        .args(["scenarios", "run", "rules/elig.json", "--errors-only"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Minor: fail"))
        .stdout(predicate::str::contains("eligible: expected true, got false"))
        .stdout(predicate::str::contains("1 passed, 1 failed"))
        .stdout(predicate::str::contains("Adult: pass").not());
}

#[test]
fn save_over_existing_title_updates() {
    let url = start_service();
    let dir = workspace();
    write(dir.path(), "ctx.json", r#"{"age": 30}"#);
    for title in ["Adult", "ADULT"] {
        online(dir.path(), &url)
            .args([
                "simulate", "rules/elig.json", "--context", "ctx.json", "--save", title, "--yes",
            ])
            .assert()
            .success();
    }
    let output = online(dir.path(), &url)
        .args(["--output", "json", "scenarios", "list", "rules/elig.json"])
        .output()
        .unwrap();
    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["total"], json!(1));
    assert_eq!(value["scenarios"][0]["title"], json!("ADULT"));
}

#[test]
fn rename_and_delete() {
    let url = start_service();
    let dir = workspace();
    write(dir.path(), "ctx.json", r#"{"age": 30}"#);
    for title in ["A", "B"] {
        online(dir.path(), &url)
            .args([
                "simulate", "rules/elig.json", "--context", "ctx.json", "--save", title, "--yes",
            ])
            .assert()
            .success();
    }

    online(dir.path(), &url)
        .args(["scenarios", "rename", "rules/elig.json", "s2", "a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    online(dir.path(), &url)
        .args(["scenarios", "rename", "rules/elig.json", "s2", "C"])
        .assert()
        .success()
        .stdout(predicate::str::contains("renamed s2 to 'C'"));

    online(dir.path(), &url)
        .args(["scenarios", "delete", "rules/elig.json", "s1", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted 'A'"));

    online(dir.path(), &url)
        .args(["scenarios", "delete", "rules/elig.json", "s1", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("scenario not found"));
}

#[test]
fn csv_test_and_import() {
    let url = start_service();
    let dir = workspace();
    write(
        dir.path(),
        "cases.csv",
        "Scenario,Input: age,Expected Result: eligible\nAdult,30,true\nMinor,12,true\n",
    );

    online(dir.path(), &url)
        .args(["csv", "test", "rules/elig.json", "cases.csv", "--report", "out.csv"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("1 passed, 1 failed"));
    let report = fs::read_to_string(dir.path().join("out.csv")).unwrap();
    assert!(report.contains("Results Match Expected (Pass/Fail)"));
    assert!(report.contains("Minor,Fail"));

    online(dir.path(), &url)
        .args(["csv", "import", "rules/elig.json", "cases.csv", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 saved, 0 failed"));

    online(dir.path(), &url)
        .args(["csv", "export", "rules/elig.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Adult,30,true"));
}
