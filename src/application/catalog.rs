//! Built-in service catalog.
//!
//! Each function returns the declared spec for one service; the registry
//! validates them at load time like any descriptor from the config file.

use std::path::PathBuf;

use crate::domain::{DescriptorSpec, LocalCommand, DEFAULT_IMAGE_TEMPLATE};

pub const FUNCTIONS: &str = "functions";
pub const EMBEDDINGS_API: &str = "embeddings-api";
pub const VECTOR_DB: &str = "vector-db";
pub const LLM_API: &str = "llm-api";
pub const TRANSCRIBE_API: &str = "transcribe-api";

/// Services started by `serve-all` when no list is configured, in pane order.
pub const DEFAULT_LOCAL_SERVICES: &[&str] = &[FUNCTIONS, EMBEDDINGS_API, VECTOR_DB];

/// Secret the transcription service needs to fetch its diarization model.
pub const HF_TOKEN: &str = "HF_TOKEN";

/// Inference parallelism knob forwarded unmodified to Ollama-based services.
pub const OLLAMA_NUM_PARALLEL: &str = "OLLAMA_NUM_PARALLEL";

pub const AUTH_EMULATOR_HOST_VAR: &str = "FIREBASE_AUTH_EMULATOR_HOST";
pub const AUTH_EMULATOR_HOST: &str = "127.0.0.1:9099";

const L4: &str = "nvidia-l4";

/// HTTP routes the deployed services expose. Listed, never called.
pub mod endpoints {
    /// LLM completion: `{model, prompt}`.
    pub const LLM_GENERATE: &str = "/api/generate";
    /// LLM chat: `{model, messages: [{role, content}], stream}`.
    pub const LLM_CHAT: &str = "/api/chat";
    pub const TRANSCRIBE_HEALTH: &str = "/health";
    /// Multipart upload with a `file` field.
    pub const TRANSCRIBE: &str = "/transcribe";

    /// Routes served by a built-in service; empty for services without
    /// a fixed contract.
    #[must_use]
    pub fn routes(service: &str) -> &'static [&'static str] {
        match service {
            super::LLM_API => &[LLM_GENERATE, LLM_CHAT],
            super::TRANSCRIBE_API => &[TRANSCRIBE_HEALTH, TRANSCRIBE],
            _ => &[],
        }
    }
}

/// All built-in specs in registration order.
#[must_use]
pub fn builtin() -> Vec<DescriptorSpec> {
    vec![functions(), embeddings_api(), vector_db(), llm_api(), transcribe_api()]
}

fn base(name: &str, port: u16) -> DescriptorSpec {
    DescriptorSpec {
        name: name.to_string(),
        image_template: DEFAULT_IMAGE_TEMPLATE.to_string(),
        port,
        cpu: 1,
        memory_gib: 1,
        gpu_count: 0,
        gpu_type: None,
        concurrency: 80,
        max_instances: 10,
        timeout_seconds: 300,
        cpu_throttling_disabled: false,
        allow_unauthenticated: false,
        required_secrets: Vec::new(),
        forwarded_env: Vec::new(),
        source_dir: None,
        local: None,
    }
}

/// Functions gateway, run locally under the Firebase emulator suite.
#[must_use]
pub fn functions() -> DescriptorSpec {
    DescriptorSpec {
        timeout_seconds: 120,
        local: Some(
            LocalCommand::new("firebase")
                .arg("emulators:start")
                .arg("--only")
                .arg("functions,auth")
                .env(AUTH_EMULATOR_HOST_VAR, AUTH_EMULATOR_HOST),
        ),
        ..base(FUNCTIONS, 5001)
    }
}

#[must_use]
pub fn embeddings_api() -> DescriptorSpec {
    DescriptorSpec {
        cpu: 4,
        memory_gib: 16,
        concurrency: 10,
        max_instances: 3,
        forwarded_env: vec![OLLAMA_NUM_PARALLEL.to_string()],
        source_dir: Some(PathBuf::from("services").join(EMBEDDINGS_API)),
        local: Some(
            LocalCommand::new("ollama")
                .arg("serve")
                .env("OLLAMA_HOST", "0.0.0.0:11434"),
        ),
        ..base(EMBEDDINGS_API, 11434)
    }
}

#[must_use]
pub fn vector_db() -> DescriptorSpec {
    DescriptorSpec {
        cpu: 2,
        memory_gib: 4,
        concurrency: 10,
        max_instances: 1,
        allow_unauthenticated: true,
        source_dir: Some(PathBuf::from("services").join(VECTOR_DB)),
        local: Some(
            LocalCommand::new("docker")
                .arg("run")
                .arg("--rm")
                .arg("-p")
                .arg("6333:6333")
                .arg("qdrant/qdrant"),
        ),
        ..base(VECTOR_DB, 6333)
    }
}

/// Ollama-based LLM service on one L4 GPU.
#[must_use]
pub fn llm_api() -> DescriptorSpec {
    DescriptorSpec {
        cpu: 8,
        memory_gib: 32,
        gpu_count: 1,
        gpu_type: Some(L4.to_string()),
        concurrency: 1,
        max_instances: 3,
        timeout_seconds: 600,
        cpu_throttling_disabled: true,
        allow_unauthenticated: true,
        forwarded_env: vec![OLLAMA_NUM_PARALLEL.to_string()],
        source_dir: Some(PathBuf::from("services").join(LLM_API)),
        ..base(LLM_API, 11434)
    }
}

/// Whisper + diarization service on one L4 GPU.
#[must_use]
pub fn transcribe_api() -> DescriptorSpec {
    DescriptorSpec {
        cpu: 8,
        memory_gib: 32,
        gpu_count: 1,
        gpu_type: Some(L4.to_string()),
        concurrency: 1,
        max_instances: 3,
        timeout_seconds: 600,
        cpu_throttling_disabled: true,
        allow_unauthenticated: true,
        required_secrets: vec![HF_TOKEN.to_string()],
        source_dir: Some(PathBuf::from("services").join(TRANSCRIBE_API)),
        ..base(TRANSCRIBE_API, 8080)
    }
}
