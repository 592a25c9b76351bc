use std::io::Write;

use stackpilot::adapter::outbound::BuildBackend;
use stackpilot::error::{ConfigError, Error};
use stackpilot::infrastructure::config::Config;
use stackpilot::testkit::config::env;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn full_config_loads() {
    let file = write_config(
        r#"
[logging]
level = "debug"
format = "json"

[session]
name = "dev"
services = ["vector-db", "functions"]

[deploy]
builder = "docker"
region = "europe-west4"
workspace_root = "/srv/backend"

[[services]]
name = "reranker"
port = 8081
cpu = 2
memory_gib = 4
concurrency = 4
max_instances = 2
timeout_seconds = 120
source_dir = "services/reranker"
"#,
    );

    let config = Config::load(file.path()).expect("config loads");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.session.name, "dev");
    assert_eq!(config.session.services, vec!["vector-db", "functions"]);
    assert_eq!(config.deploy.builder, BuildBackend::Docker);
    assert_eq!(config.registry().unwrap().len(), 6);
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.session.name, "stackpilot");
    assert_eq!(
        config.session.services,
        vec!["functions", "embeddings-api", "vector-db"]
    );
    assert_eq!(config.deploy.builder, BuildBackend::CloudBuild);
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::ReadFile(_))));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let file = write_config("[session\nname = ");
    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::Parse(_))));
}

#[test]
fn invalid_descriptor_in_config_is_rejected() {
    let file = write_config(
        r#"
[[services]]
name = "Bad_Name"
port = 8081
cpu = 1
memory_gib = 1
concurrency = 1
max_instances = 1
timeout_seconds = 60
"#,
    );
    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::InvalidDescriptor { .. })
    ));
}

#[test]
fn region_env_overrides_config_region() {
    let config = Config::parse_toml("[deploy]\nregion = \"europe-west4\"\n").unwrap();

    let ctx = config
        .project_context(&env(&[
            ("PROJECT_ID", "mason-b4c0a"),
            ("ARTIFACT_REPOSITORY", "docker-repo"),
        ]))
        .unwrap();
    assert_eq!(ctx.region, "europe-west4");

    let ctx = config
        .project_context(&env(&[
            ("PROJECT_ID", "mason-b4c0a"),
            ("ARTIFACT_REPOSITORY", "docker-repo"),
            ("REGION", "asia-east1"),
        ]))
        .unwrap();
    assert_eq!(ctx.region, "asia-east1");
}

#[test]
fn project_context_requires_project_id() {
    let config = Config::default();
    let err = config
        .project_context(&env(&[("ARTIFACT_REPOSITORY", "docker-repo")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnv { ref name } if name == "PROJECT_ID"));
}
