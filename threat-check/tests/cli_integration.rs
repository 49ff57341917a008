// threat-check/tests/cli_integration.rs

use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Command running in `dir` with a clean environment, so no `.env`, config
/// file or TC_* variable from the host leaks in.
fn threat_check(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("threat-check").unwrap();
    cmd.current_dir(dir).env_clear();
    cmd
}

/// Helper to create a test URL list
fn create_test_urls_file(dir: &Path, urls: &[&str]) -> String {
    let path = dir.join("urls.csv");
    let mut content = String::from("Name,Link\n");
    for (i, url) in urls.iter().enumerate() {
        content.push_str(&format!("site{},{}\n", i, url));
    }
    fs::write(&path, content).expect("Failed to write URL list");
    path.to_string_lossy().into_owned()
}

#[test]
fn test_help_shows_flags() {
    let dir = TempDir::new().unwrap();
    threat_check(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--input"))
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--concurrency"))
        .stdout(predicate::str::contains("--threat-type"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_missing_input_path_fails_fast() {
    let dir = TempDir::new().unwrap();
    threat_check(dir.path())
        .args(["--output", "results.csv"])
        .env("TC_API_KEY", "test-key")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file path is not set"));

    assert!(!dir.path().join("results.csv").exists());
}

#[test]
fn test_missing_api_key_fails_fast() {
    let dir = TempDir::new().unwrap();
    let input = create_test_urls_file(dir.path(), &["https://example.com"]);

    threat_check(dir.path())
        .args(["--input", &input, "--output", "results.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key"));
}

#[test]
fn test_invalid_concurrency_rejected() {
    let dir = TempDir::new().unwrap();
    threat_check(dir.path())
        .args(["-i", "urls.csv", "-o", "results.csv", "--concurrency", "0"])
        .env("TC_API_KEY", "test-key")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Concurrency must be between 1 and 100"));
}

#[test]
fn test_missing_input_file_is_nothing_to_do() {
    let dir = TempDir::new().unwrap();
    threat_check(dir.path())
        .args(["-i", "does-not-exist.csv", "-o", "results.csv"])
        .env("TC_API_KEY", "test-key")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to do"));

    assert!(!dir.path().join("results.csv").exists());
}

#[test]
fn test_input_without_link_column_is_nothing_to_do() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("urls.csv"), "URL\nhttps://example.com\n").unwrap();

    threat_check(dir.path())
        .args(["-i", "urls.csv", "-o", "results.csv"])
        .env("TC_API_KEY", "test-key")
        .assert()
        .success()
        .stderr(predicate::str::contains("Missing 'Link' column"))
        .stdout(predicate::str::contains("Nothing to do"));
}

#[test]
fn test_dry_run_lists_urls_without_api_key() {
    let dir = TempDir::new().unwrap();
    let input =
        create_test_urls_file(dir.path(), &["https://example.com", "https://malware.com"]);

    threat_check(dir.path())
        .args(["--input", &input, "--output", "results.csv", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://example.com"))
        .stdout(predicate::str::contains("https://malware.com"))
        .stderr(predicate::str::contains("2 URLs would be checked"));

    assert!(!dir.path().join("results.csv").exists());
}

#[test]
fn test_env_aliases_and_config_file() {
    let dir = TempDir::new().unwrap();
    create_test_urls_file(dir.path(), &["https://example.com"]);
    fs::write(
        dir.path().join("threat-check.toml"),
        "[paths]\ninput = \"urls.csv\"\n",
    )
    .unwrap();

    threat_check(dir.path())
        .args(["--dry-run", "--json"])
        .env("RESULTS_FILE", "results.csv")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"https://example.com\""));
}

#[test]
fn test_end_to_end_against_mock_service() {
    let server = MockServer::start();
    let malware = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/uris:search")
            .query_param("key", "test-key")
            .query_param("uri", "https://malware.com");
        then.status(200)
            .json_body(serde_json::json!({"threat": {"threatTypes": ["MALWARE"]}}));
    });
    let safe = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/uris:search")
            .query_param("uri", "https://example.com");
        then.status(200).json_body(serde_json::json!({}));
    });

    let dir = TempDir::new().unwrap();
    let input =
        create_test_urls_file(dir.path(), &["https://example.com", "https://malware.com"]);

    threat_check(dir.path())
        .args([
            "--input",
            &input,
            "--output",
            "out/results.csv",
            "--chart",
            "out/chart.svg",
            "--endpoint",
            &server.base_url(),
        ])
        .env("GOOGLE_API_KEY", "test-key")
        .assert()
        .success()
        .stdout(predicate::str::contains("Processing your request....."))
        .stdout(predicate::str::contains("MALWARE"))
        .stdout(predicate::str::contains("50.00%"))
        .stdout(predicate::str::contains("The program took:"));

    malware.assert();
    safe.assert();

    let results = fs::read_to_string(dir.path().join("out/results.csv")).unwrap();
    assert_eq!(
        results,
        "URL,Threat Type\nhttps://example.com,SAFE\nhttps://malware.com,MALWARE\n"
    );
    assert!(dir.path().join("out/chart.svg").exists());

    let log = fs::read_to_string(dir.path().join("resources/log.txt")).unwrap();
    assert!(log.contains("https://example.com is safe."));
    assert!(log.contains("Threat detected on https://malware.com: MALWARE"));
}

#[test]
fn test_json_distribution_output() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/uris:search");
        then.status(200).json_body(serde_json::json!({}));
    });

    let dir = TempDir::new().unwrap();
    let input = create_test_urls_file(dir.path(), &["https://a.test", "https://b.test"]);

    let output = threat_check(dir.path())
        .args(["-i", &input, "-o", "results.csv", "--json", "--no-chart"])
        .args(["--endpoint", &server.base_url()])
        .env("TC_API_KEY", "test-key")
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["total"], 2);
    assert_eq!(json["shares"][0]["label"], "SAFE");
    assert_eq!(json["shares"][0]["percentage"], 100.0);
    assert!(!dir.path().join("resources/threat_analysis_chart.svg").exists());
}

#[test]
fn test_unrecognized_service_fault_exits_non_zero() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/uris:search");
        then.status(429).body("quota exceeded");
    });

    let dir = TempDir::new().unwrap();
    let input = create_test_urls_file(dir.path(), &["https://example.com"]);

    threat_check(dir.path())
        .args(["-i", &input, "-o", "results.csv", "--endpoint", &server.base_url()])
        .env("TC_API_KEY", "test-key")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unrecognized verdict source failure"));

    assert!(!dir.path().join("results.csv").exists());
}
