//! Cloud Run backend for the container platform port.
//!
//! Images are built either remotely with Cloud Build (`gcloud builds submit`,
//! which also pushes) or locally with Docker (`docker build` then
//! `docker push`). Deploys go through `gcloud run deploy`, which creates the
//! service on first use and adds a revision afterwards.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::command::{CommandRunner, CommandSpec};
use crate::domain::{DeploymentRequest, ProjectContext, Revision};
use crate::port::outbound::platform::{ContainerPlatform, PlatformError};

/// Exported to build subprocesses so build scripts can tag consistently.
pub const SERVICE_NAME_VAR: &str = "SERVICE_NAME";
pub const IMAGE_URL_VAR: &str = "IMAGE_URL";

/// Cloud Run serves linux/amd64 images only.
const TARGET_PLATFORM: &str = "linux/amd64";

/// Stands in for the runtime environment file in planned commands.
pub const PLANNED_ENV_FILE: &str = "<runtime-env.yaml>";

/// How container images are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildBackend {
    /// `gcloud builds submit --tag`; build and push in one remote step.
    #[default]
    CloudBuild,
    /// Local `docker build` followed by `docker push`.
    Docker,
}

impl std::fmt::Display for BuildBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CloudBuild => write!(f, "cloud-build"),
            Self::Docker => write!(f, "docker"),
        }
    }
}

/// Deploys to Cloud Run through the `gcloud` and `docker` CLIs.
#[derive(Debug, Clone)]
pub struct CloudRunPlatform {
    builder: BuildBackend,
    workspace_root: PathBuf,
    gcloud: String,
    docker: String,
}

impl CloudRunPlatform {
    #[must_use]
    pub fn new(builder: BuildBackend, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            builder,
            workspace_root: workspace_root.into(),
            gcloud: "gcloud".into(),
            docker: "docker".into(),
        }
    }

    #[must_use]
    pub fn builder(&self) -> BuildBackend {
        self.builder
    }

    fn source_path(&self, request: &DeploymentRequest) -> Result<PathBuf, PlatformError> {
        request
            .descriptor
            .source_dir()
            .map(|dir| self.workspace_root.join(dir))
            .ok_or_else(|| {
                PlatformError::Rejected(format!(
                    "service '{}' has no build source",
                    request.service()
                ))
            })
    }

    /// Command that builds (and for Cloud Build, pushes) the image.
    ///
    /// # Errors
    ///
    /// [`PlatformError::Rejected`] when the descriptor has no build source.
    pub fn build_command(
        &self,
        request: &DeploymentRequest,
        ctx: &ProjectContext,
    ) -> Result<CommandSpec, PlatformError> {
        let source = self.source_path(request)?;
        let source = source.to_string_lossy().into_owned();

        let spec = match self.builder {
            BuildBackend::CloudBuild => CommandSpec::new(&self.gcloud)
                .args(["builds", "submit"])
                .arg(source)
                .arg(format!("--tag={}", request.image_ref))
                .arg(format!("--project={}", ctx.project_id))
                .arg("--quiet"),
            BuildBackend::Docker => CommandSpec::new(&self.docker)
                .arg("build")
                .arg(format!("--platform={TARGET_PLATFORM}"))
                .args(["-t", request.image_ref.as_str()])
                .arg(source),
        };

        Ok(spec
            .current_dir(&self.workspace_root)
            .env(SERVICE_NAME_VAR, request.service())
            .env(IMAGE_URL_VAR, &request.image_ref))
    }

    /// Command that pushes the image; `None` when the build already pushed.
    #[must_use]
    pub fn push_command(&self, request: &DeploymentRequest) -> Option<CommandSpec> {
        match self.builder {
            BuildBackend::CloudBuild => None,
            BuildBackend::Docker => Some(
                CommandSpec::new(&self.docker)
                    .arg("push")
                    .arg(&request.image_ref)
                    .env(SERVICE_NAME_VAR, request.service())
                    .env(IMAGE_URL_VAR, &request.image_ref),
            ),
        }
    }

    /// `gcloud run deploy` for the request, reading the runtime environment
    /// from `env_file` (see [`deploy_args`]).
    #[must_use]
    pub fn deploy_command(
        &self,
        request: &DeploymentRequest,
        ctx: &ProjectContext,
        env_file: Option<&Path>,
    ) -> CommandSpec {
        CommandSpec::new(&self.gcloud).args(deploy_args(request, ctx, env_file))
    }

    /// Query for the revision currently receiving traffic.
    #[must_use]
    pub fn describe_command(&self, service: &str, ctx: &ProjectContext) -> CommandSpec {
        CommandSpec::new(&self.gcloud)
            .args(["run", "services", "describe", service])
            .arg(format!("--region={}", ctx.region))
            .arg(format!("--project={}", ctx.project_id))
            .arg("--format=value(status.latestReadyRevisionName)")
    }

    /// Every command a deploy would run. Secret values live only in the
    /// runtime environment file, so nothing here needs redacting.
    ///
    /// # Errors
    ///
    /// Same as [`build_command`](Self::build_command).
    pub fn plan_commands(
        &self,
        request: &DeploymentRequest,
        ctx: &ProjectContext,
    ) -> Result<Vec<CommandSpec>, PlatformError> {
        let mut commands = vec![self.build_command(request, ctx)?];
        commands.extend(self.push_command(request));
        commands.push(self.deploy_command(request, ctx, None));
        Ok(commands)
    }
}

#[async_trait]
impl ContainerPlatform for CloudRunPlatform {
    async fn build(
        &self,
        request: &DeploymentRequest,
        ctx: &ProjectContext,
    ) -> Result<(), PlatformError> {
        let spec = self.build_command(request, ctx)?;
        info!(service = request.service(), builder = %self.builder, "Starting image build");
        CommandRunner::run(&spec).await?;
        Ok(())
    }

    async fn push(&self, request: &DeploymentRequest) -> Result<(), PlatformError> {
        match self.push_command(request) {
            Some(spec) => {
                CommandRunner::run(&spec).await?;
            }
            None => {
                debug!(image = %request.image_ref, "Image pushed by Cloud Build");
            }
        }
        Ok(())
    }

    async fn deploy(
        &self,
        request: &DeploymentRequest,
        ctx: &ProjectContext,
    ) -> Result<Revision, PlatformError> {
        let env = request.runtime_env();
        // Dropping the handle deletes the file, so it must outlive the run.
        let env_file = if env.is_empty() {
            None
        } else {
            Some(write_env_file(&env).map_err(PlatformError::EnvFile)?)
        };

        let spec = self.deploy_command(request, ctx, env_file.as_ref().map(NamedTempFile::path));
        debug!(command = %spec, "Deploy command");
        CommandRunner::run(&spec).await?;
        drop(env_file);

        let described = CommandRunner::run(&self.describe_command(request.service(), ctx)).await?;
        let name = described.last_line().ok_or_else(|| {
            PlatformError::Rejected(format!(
                "service '{}' reports no ready revision",
                request.service()
            ))
        })?;

        Ok(Revision {
            service: request.service().to_string(),
            name: name.to_string(),
            image_ref: request.image_ref.clone(),
        })
    }
}

/// Translate a request into `gcloud run deploy` arguments.
///
/// Resource flags come straight from the envelope. The runtime environment
/// of the new revision is replaced wholesale: secrets and forwarded
/// variables go through `--env-vars-file` so values never reach the process
/// table, and an empty environment sends `--clear-env-vars` so nothing from
/// the previous revision survives. `env_file` is `None` while planning; the
/// flag then names [`PLANNED_ENV_FILE`].
#[must_use]
pub fn deploy_args(
    request: &DeploymentRequest,
    ctx: &ProjectContext,
    env_file: Option<&Path>,
) -> Vec<String> {
    let envelope = request.descriptor.envelope();

    let mut args = vec![
        "run".to_string(),
        "deploy".to_string(),
        request.service().to_string(),
        format!("--image={}", request.image_ref),
        format!("--region={}", ctx.region),
        format!("--project={}", ctx.project_id),
        format!("--port={}", request.descriptor.port()),
        format!("--cpu={}", envelope.cpu),
        format!("--memory={}Gi", envelope.memory_gib),
    ];

    if let Some(gpu) = &envelope.gpu {
        args.push(format!("--gpu={}", gpu.count));
        args.push(format!("--gpu-type={}", gpu.kind));
    }

    args.push(format!("--concurrency={}", envelope.concurrency));
    args.push(format!("--max-instances={}", envelope.max_instances));
    args.push(format!("--timeout={}", envelope.timeout_seconds));

    if envelope.cpu_throttling_disabled {
        args.push("--no-cpu-throttling".to_string());
    }

    args.push(if envelope.allow_unauthenticated {
        "--allow-unauthenticated".to_string()
    } else {
        "--no-allow-unauthenticated".to_string()
    });

    if request.runtime_env().is_empty() {
        args.push("--clear-env-vars".to_string());
    } else {
        let path = env_file.map_or_else(
            || PLANNED_ENV_FILE.to_string(),
            |path| path.display().to_string(),
        );
        args.push(format!("--env-vars-file={path}"));
    }

    args.push("--quiet".to_string());
    args
}

/// Write `env` as the YAML mapping `--env-vars-file` expects.
///
/// The file is created owner-only (0600) and removed when the returned
/// handle drops.
///
/// # Errors
///
/// Propagates I/O failures creating or writing the file.
pub fn write_env_file(env: &BTreeMap<String, String>) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("stackpilot-env-")
        .suffix(".yaml")
        .tempfile()?;
    file.write_all(env_file_contents(env).as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// One `"KEY": "value"` line per variable. JSON string literals are valid
/// YAML double-quoted scalars, so commas, colons and quotes survive intact.
fn env_file_contents(env: &BTreeMap<String, String>) -> String {
    env.iter()
        .map(|(key, value)| {
            format!(
                "{}: {}\n",
                serde_json::Value::from(key.as_str()),
                serde_json::Value::from(value.as_str())
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::application::{DeploymentController, ServiceRegistry};
    use crate::testkit::platform::RecordingPlatform;

    fn ctx() -> ProjectContext {
        ProjectContext::new("mason-b4c0a", "docker-repo")
    }

    fn request(name: &str, env: &HashMap<String, String>) -> DeploymentRequest {
        let registry = ServiceRegistry::builtin().unwrap();
        let platform = RecordingPlatform::new();
        DeploymentController::new(&registry, &platform, env)
            .plan(name, &ctx())
            .unwrap()
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn gpu_service_flags() {
        let args = deploy_args(&request("llm-api", &HashMap::new()), &ctx(), None);
        for flag in [
            "--image=us-central1-docker.pkg.dev/mason-b4c0a/docker-repo/llm-api",
            "--port=11434",
            "--cpu=8",
            "--memory=32Gi",
            "--gpu=1",
            "--gpu-type=nvidia-l4",
            "--concurrency=1",
            "--max-instances=3",
            "--timeout=600",
            "--no-cpu-throttling",
            "--allow-unauthenticated",
        ] {
            assert!(args.iter().any(|a| a == flag), "missing {flag} in {args:?}");
        }
        assert_eq!(&args[..3], &["run", "deploy", "llm-api"]);
    }

    #[test]
    fn cpu_service_has_no_gpu_flags() {
        let args = deploy_args(&request("vector-db", &HashMap::new()), &ctx(), None);
        assert!(args.iter().any(|a| a == "--port=6333"));
        assert!(args.iter().any(|a| a == "--concurrency=10"));
        assert!(!args.iter().any(|a| a.starts_with("--gpu")));
        assert!(!args.iter().any(|a| a == "--no-cpu-throttling"));
    }

    #[test]
    fn empty_runtime_env_clears_previous_revision_env() {
        let args = deploy_args(&request("vector-db", &HashMap::new()), &ctx(), None);
        assert!(args.iter().any(|a| a == "--clear-env-vars"));
        assert!(!args.iter().any(|a| a.starts_with("--env-vars-file")));
        assert!(!args.iter().any(|a| a.starts_with("--set-env-vars")));
    }

    #[test]
    fn secret_values_never_reach_argv() {
        let env = env(&[("HF_TOKEN", "hf_live_value")]);
        let request = request("transcribe-api", &env);

        let file = write_env_file(&request.runtime_env()).unwrap();
        let args = deploy_args(&request, &ctx(), Some(file.path()));

        assert!(args.iter().all(|a| !a.contains("hf_live_value")), "{args:?}");
        assert!(args.contains(&format!("--env-vars-file={}", file.path().display())));
        assert!(!args.iter().any(|a| a == "--clear-env-vars"));

        let written = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(written, "\"HF_TOKEN\": \"hf_live_value\"\n");
    }

    #[cfg(unix)]
    #[test]
    fn env_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let env: BTreeMap<String, String> =
            [("HF_TOKEN".to_string(), "hf_live_value".to_string())].into_iter().collect();
        let file = write_env_file(&env).unwrap();
        let mode = file.as_file().metadata().unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn env_file_quotes_awkward_values() {
        let env: BTreeMap<String, String> = [
            ("A".to_string(), "1,2".to_string()),
            ("B".to_string(), "say \"hi\": now".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            env_file_contents(&env),
            "\"A\": \"1,2\"\n\"B\": \"say \\\"hi\\\": now\"\n"
        );
    }

    #[test]
    fn cloud_build_pushes_on_submit() {
        let platform = CloudRunPlatform::new(BuildBackend::CloudBuild, "/work");
        let request = request("vector-db", &HashMap::new());

        let build = platform.build_command(&request, &ctx()).unwrap();
        assert_eq!(build.program, "gcloud");
        assert_eq!(&build.args[..3], &["builds", "submit", "/work/services/vector-db"]);
        assert!(build.env.contains(&(SERVICE_NAME_VAR.into(), "vector-db".into())));
        assert!(platform.push_command(&request).is_none());
    }

    #[test]
    fn docker_builds_for_amd64_then_pushes() {
        let platform = CloudRunPlatform::new(BuildBackend::Docker, "/work");
        let request = request("vector-db", &HashMap::new());

        let build = platform.build_command(&request, &ctx()).unwrap();
        assert_eq!(build.program, "docker");
        assert!(build.args.contains(&"--platform=linux/amd64".to_string()));

        let push = platform.push_command(&request).unwrap();
        assert_eq!(push.args, vec!["push".to_string(), request.image_ref.clone()]);
    }

    #[test]
    fn plan_commands_never_contain_secret_values() {
        let platform = CloudRunPlatform::new(BuildBackend::Docker, ".");
        let env = env(&[("HF_TOKEN", "hf_live_value")]);
        let request = request("transcribe-api", &env);

        let rendered: Vec<String> = platform
            .plan_commands(&request, &ctx())
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(rendered.len(), 3);
        assert!(rendered.iter().all(|cmd| !cmd.contains("hf_live_value")));
        assert!(rendered[2].contains("'--env-vars-file=<runtime-env.yaml>'"));
    }

    #[test]
    fn builder_parses_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            builder: BuildBackend,
        }
        let parsed: Wrapper = toml::from_str("builder = \"cloud-build\"").unwrap();
        assert_eq!(parsed.builder, BuildBackend::CloudBuild);
        let parsed: Wrapper = toml::from_str("builder = \"docker\"").unwrap();
        assert_eq!(parsed.builder, BuildBackend::Docker);
    }
}
