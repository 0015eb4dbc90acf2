//! Integration tests for export and listing commands.


use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use fixtures::{
    can_bind_localhost, export_progress_sse, sse_response, temp_konyx_home, write_session,
    write_unverified_config,
};
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_export_watch_prints_progress_and_downloads() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_konyx_home();
    write_unverified_config(home.path());
    write_session(home.path(), "abc123");
    let downloads = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/export/progress"))
        .respond_with(sse_response(&export_progress_sse("Kissoro_holded_2026.csv")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/export/download/Kissoro_holded_2026.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Número;Importe\nF25010001;120.5\n"))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("konyx")
        .env("KONYX_HOME", home.path())
        .env("KONYX_BACKEND_URL", server.uri())
        .args(["export", "watch", "--download"])
        .arg(downloads.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Archivos cargados correctamente."))
        .stdout(predicate::str::contains("B1234567"))
        .stdout(predicate::str::contains("Export finished: Kissoro_holded_2026.csv"));

    let saved = fs::read_to_string(downloads.path().join("Kissoro_holded_2026.csv")).unwrap();
    assert!(saved.starts_with("Número;Importe"));
}

#[tokio::test]
async fn test_export_watch_reports_broken_stream() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_konyx_home();
    write_unverified_config(home.path());
    write_session(home.path(), "abc123");
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/export/progress"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    cargo_bin_cmd!("konyx")
        .env("KONYX_HOME", home.path())
        .env("KONYX_BACKEND_URL", server.uri())
        .args(["export", "watch"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Export progress stream closed"));
}

#[tokio::test]
async fn test_invoices_use_selected_company() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_konyx_home();
    write_unverified_config(home.path());
    write_session(home.path(), "abc123");
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/companies"))
        .and(header("authorization", "Bearer abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "kissoro", "name": "Kissoro"},
            {"id": "enplural", "name": "En Plural"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/invoices"))
        .and(header("x-company", "enplural"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "number": "F25010001", "total": 120.5}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("konyx")
        .env("KONYX_HOME", home.path())
        .env("KONYX_BACKEND_URL", server.uri())
        .args(["companies", "--select", "enplural"])
        .assert()
        .success()
        .stdout(predicate::str::contains("En Plural"));

    let config = fs::read_to_string(home.path().join("config.toml")).unwrap();
    assert!(config.contains(r#"company = "enplural""#));
    assert!(config.contains("verify = false"));

    cargo_bin_cmd!("konyx")
        .env("KONYX_HOME", home.path())
        .env("KONYX_BACKEND_URL", server.uri())
        .arg("invoices")
        .assert()
        .success()
        .stdout(predicate::str::contains("F25010001"))
        .stdout(predicate::str::contains("120.50"));
}
