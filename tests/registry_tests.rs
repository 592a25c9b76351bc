use stackpilot::application::ServiceRegistry;
use stackpilot::domain::DescriptorSpec;
use stackpilot::error::ConfigError;

fn spec(toml: &str) -> DescriptorSpec {
    toml::from_str(toml).expect("valid descriptor toml")
}

#[test]
fn builtin_registry_keeps_registration_order() {
    let registry = ServiceRegistry::builtin().unwrap();
    assert_eq!(
        registry.names().collect::<Vec<_>>(),
        vec![
            "functions",
            "embeddings-api",
            "vector-db",
            "llm-api",
            "transcribe-api"
        ]
    );
}

#[test]
fn only_gpu_services_carry_gpus() {
    let registry = ServiceRegistry::builtin().unwrap();
    let gpu: Vec<_> = registry
        .descriptors()
        .iter()
        .filter(|d| d.envelope().gpu_count() > 0)
        .map(|d| d.name())
        .collect();
    assert_eq!(gpu, vec!["llm-api", "transcribe-api"]);
}

#[test]
fn override_replaces_builtin_in_place() {
    let registry = ServiceRegistry::with_overrides(vec![spec(
        r#"
name = "vector-db"
port = 6334
cpu = 4
memory_gib = 8
concurrency = 20
max_instances = 2
timeout_seconds = 300
source_dir = "services/vector-db"
"#,
    )])
    .unwrap();

    assert_eq!(registry.len(), 5);
    let vector_db = registry.lookup("vector-db").unwrap();
    assert_eq!(vector_db.port(), 6334);
    assert!(vector_db.local().is_none());
    assert_eq!(registry.names().nth(2), Some("vector-db"));
}

#[test]
fn new_service_is_appended() {
    let registry = ServiceRegistry::with_overrides(vec![spec(
        r#"
name = "reranker"
port = 8081
cpu = 2
memory_gib = 4
concurrency = 4
max_instances = 2
timeout_seconds = 120
source_dir = "services/reranker"
"#,
    )])
    .unwrap();

    assert_eq!(registry.len(), 6);
    assert_eq!(registry.names().last(), Some("reranker"));
    assert_eq!(registry.deployable().count(), 5);
}

#[test]
fn gpu_service_with_concurrency_is_rejected() {
    let err = ServiceRegistry::with_overrides(vec![spec(
        r#"
name = "llm-api"
port = 11434
cpu = 8
memory_gib = 32
gpu_count = 1
gpu_type = "nvidia-l4"
concurrency = 4
max_instances = 3
timeout_seconds = 600
"#,
    )])
    .unwrap_err();

    assert!(matches!(err, ConfigError::InvalidDescriptor { ref service, .. } if service == "llm-api"));
}

#[test]
fn duplicate_override_is_rejected() {
    let entry = r#"
name = "reranker"
port = 8081
cpu = 1
memory_gib = 1
concurrency = 1
max_instances = 1
timeout_seconds = 60
"#;
    let err = ServiceRegistry::with_overrides(vec![spec(entry), spec(entry)]).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateService(ref name) if name == "reranker"));
}
