//! Integration tests for the parcel CLI.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Test context that sets up a temporary parcel home environment
struct TestContext {
    temp_dir: TempDir,
    parcel_home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let parcel_home = temp_dir.path().join(".parcel");
        std::fs::create_dir_all(&parcel_home).expect("failed to create parcel home");
        Self {
            temp_dir,
            parcel_home,
        }
    }

    fn parcel_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_parcel");
        let mut cmd = Command::new(bin_path);
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("PARCEL_HOME", &self.parcel_home);
        cmd.env_remove("PARCEL_CATALOG");
        cmd.env_remove("PARCEL_PLATFORM");
        cmd.env_remove("PARCEL_ARCH");
        cmd
    }

    fn write_catalog(&self, text: &str) -> PathBuf {
        let path = self.parcel_home.join("catalog.toml");
        std::fs::write(&path, text).expect("failed to write catalog");
        path
    }

    fn write_file(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, bytes).expect("failed to write file");
        path
    }

    fn run(&self, args: &[&str]) -> Output {
        self.parcel_cmd()
            .args(args)
            .output()
            .expect("failed to run parcel")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

const CATALOG: &str = r#"
[[msstore]]
store_id = "9NBLGGH4R315"
title = "Sample App"
description = "A sample application"
version = "1.0.0.0"
package_family_name = "Sample_8wekyb3d8bbwe"
allowed_platforms = ["desktop"]
architectures = ["x64"]
categories = ["Productivity"]
average_rating = 4.25
rating_count = 12
warnings = ["Offers in-app purchases"]
featured = true

[[msstore.instances]]
package_uri = "http://127.0.0.1:9/sample"
moniker = "Sample_1.0.0.0_x64__8wekyb3d8bbwe"
version = "1.0.0.0"

[[choco]]
package_id = "git"
title = "Git"
version = "2.45.1"
download_url = "http://127.0.0.1:9/git.exe"
"#;

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--help"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage:"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--version"]);
    assert!(output.status.success());
}

#[test]
fn test_urn_prints_reference_as_written() {
    let ctx = TestContext::new();
    let output = ctx.run(&["urn", "urn:choco:git:2.45.1"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.lines().next().unwrap().contains("urn:choco:git:2.45.1"));
    assert!(out.contains("choco"));
    assert!(out.contains("2.45.1"));
}

#[test]
fn test_urn_rejects_uppercase_scheme() {
    let ctx = TestContext::new();
    let output = ctx.run(&["urn", "URN:choco:git:2.45.1"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("lowercase"));
}

#[test]
fn test_urn_rejects_malformed_reference() {
    let ctx = TestContext::new();
    let output = ctx.run(&["urn", "choco:git"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("urn:"));
}

#[test]
fn test_classify_too_short_file_fails() {
    let ctx = TestContext::new();
    let file = ctx.write_file("tiny.bin", b"PK");
    let output = ctx.run(&["classify", file.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Malformed installer"));
}

#[test]
fn test_classify_unrecognized_file_is_unknown() {
    let ctx = TestContext::new();
    let file = ctx.write_file("setup.exe", b"MZ\x90\x00\x03\x00\x00\x00");
    let output = ctx.run(&["classify", file.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("unknown"));
}

#[test]
fn test_info_from_default_catalog() {
    let ctx = TestContext::new();
    ctx.write_catalog(CATALOG);

    let output = ctx.run(&["info", "urn:msstore:9nblggh4r315"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Sample App"));
    assert!(out.contains("urn:msstore:9NBLGGH4R315"));
    assert!(out.contains("Productivity"));
    assert!(out.contains("4.2 (12 ratings)") || out.contains("4.3 (12 ratings)"));
    assert!(out.contains("Offers in-app purchases"));
}

#[test]
fn test_info_json_by_web_url() {
    let ctx = TestContext::new();
    let catalog = ctx.write_catalog(CATALOG);

    let output = ctx.run(&[
        "--catalog",
        catalog.to_str().unwrap(),
        "info",
        "--json",
        "https://apps.microsoft.com/detail/9nblggh4r315",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["urn"], "urn:msstore:9NBLGGH4R315");
    assert_eq!(value["title"], "Sample App");
    assert_eq!(value["status"], "none");
    assert_eq!(value["average_rating"], 4.25);
    assert_eq!(value["rating_count"], 12);
    assert!(value["review_summary"].is_null());
}

#[test]
fn test_info_unknown_namespace_fails() {
    let ctx = TestContext::new();
    ctx.write_catalog(CATALOG);

    let output = ctx.run(&["info", "urn:nowhere:thing"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("nowhere"));
}

#[test]
fn test_choco_reference_requires_version() {
    let ctx = TestContext::new();
    ctx.write_catalog(CATALOG);

    let output = ctx.run(&["info", "urn:choco:git"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("requires a version"));
}

#[test]
fn test_search_spans_sources() {
    let ctx = TestContext::new();
    ctx.write_catalog(CATALOG);

    let output = ctx.run(&["search", "g"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("urn:choco:git:2.45.1"));

    let output = ctx.run(&["search", "sample"]);
    assert!(stdout(&output).contains("urn:msstore:9NBLGGH4R315"));
}

#[test]
fn test_search_without_catalog_is_empty() {
    let ctx = TestContext::new();
    let output = ctx.run(&["search", "anything"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("No packages found"));
}

#[test]
fn test_suggest_matches_title_prefix() {
    let ctx = TestContext::new();
    ctx.write_catalog(CATALOG);

    let output = ctx.run(&["suggest", "sam"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("urn:msstore:9NBLGGH4R315"));
    // The community feed has no suggestion service.
    assert!(!out.contains("urn:choco:"));
}

#[test]
fn test_featured_lists_store_picks() {
    let ctx = TestContext::new();
    ctx.write_catalog(CATALOG);

    let output = ctx.run(&["featured"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Sample App"));
}

#[test]
fn test_install_rejected_on_incompatible_platform() {
    let ctx = TestContext::new();
    ctx.write_catalog(CATALOG);

    let output = ctx
        .parcel_cmd()
        .env("PARCEL_PLATFORM", "mobile")
        .env("PARCEL_ARCH", "x64")
        .args(["install", "urn:msstore:9NBLGGH4R315"])
        .output()
        .expect("failed to run parcel");

    assert!(!output.status.success());
    assert!(stderr(&output).contains("does not support mobile"));
    assert!(stdout(&output).contains("failed"));
    // Rejected before any download was attempted.
    assert!(!ctx.parcel_home.join("cache").exists());
}

#[test]
fn test_bad_config_is_reported() {
    let ctx = TestContext::new();
    std::fs::write(ctx.parcel_home.join("config.toml"), "bogus_key = 1").unwrap();

    let output = ctx.run(&["search", "x"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("configuration"));
}

#[cfg(unix)]
fn sh_config(home: &Path, marker: &Path) -> String {
    format!(
        r#"
download_dir = "{cache}"
stall_timeout_secs = 5

[commands]
install = ["sh", "-c", "cp '{{path}}' '{marker}'"]
query = ["sh", "-c", "true"]
launch = ["sh", "-c", "true"]
"#,
        cache = home.join("downloads").display(),
        marker = marker.display(),
    )
}

#[cfg(unix)]
#[test]
fn test_install_downloads_and_runs_install_command() {
    let ctx = TestContext::new();
    let mut server = mockito::Server::new();
    let body = b"MZ installer payload".to_vec();
    let mock = server
        .mock("GET", "/git.exe")
        .with_status(200)
        .with_body(&body)
        .create();

    ctx.write_catalog(&CATALOG.replace("http://127.0.0.1:9", &server.url()));
    let marker = ctx.temp_dir.path().join("installed.bin");
    std::fs::write(
        ctx.parcel_home.join("config.toml"),
        sh_config(&ctx.parcel_home, &marker),
    )
    .unwrap();

    let output = ctx
        .parcel_cmd()
        .env("PARCEL_PLATFORM", "desktop")
        .args(["install", "urn:choco:git:2.45.1"])
        .output()
        .expect("failed to run parcel");

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    mock.assert();
    assert_eq!(std::fs::read(&marker).unwrap(), body);
    let out = stdout(&output);
    assert!(out.contains("downloaded"));
    assert!(out.contains("installed"));
}

#[cfg(unix)]
#[test]
fn test_quiet_download_prints_artifact_path() {
    let ctx = TestContext::new();
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/git.exe")
        .with_status(200)
        .with_body("MZ payload")
        .create();

    ctx.write_catalog(&CATALOG.replace("http://127.0.0.1:9", &server.url()));
    let marker = ctx.temp_dir.path().join("unused");
    std::fs::write(
        ctx.parcel_home.join("config.toml"),
        sh_config(&ctx.parcel_home, &marker),
    )
    .unwrap();

    let output = ctx.run(&["--quiet", "download", "urn:choco:git:2.45.1"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let path = PathBuf::from(stdout(&output).trim());
    assert!(path.starts_with(ctx.parcel_home.join("downloads")));
    assert_eq!(std::fs::read(&path).unwrap(), b"MZ payload");
}
