//! Handler for the `deploy` command.

use std::path::Path;

use dialoguer::{theme::ColorfulTheme, Confirm};

use crate::adapter::inbound::cli::command::DeployArgs;
use crate::adapter::inbound::cli::output;
use crate::adapter::outbound::CloudRunPlatform;
use crate::application::{DeploymentController, ServiceRegistry};
use crate::error::{BuildStage, DeployError, Result};
use crate::infrastructure::config::Config;
use crate::port::outbound::environment::EnvSource;

/// Build, push and deploy one service.
///
/// Everything is resolved before the prompt, so a missing secret or
/// environment value fails without asking.
pub async fn execute(
    args: &DeployArgs,
    config: &Config,
    registry: &ServiceRegistry,
    env: &dyn EnvSource,
    cwd: &Path,
) -> Result<()> {
    let ctx = config.project_context(env).map_err(DeployError::from)?;
    let platform = CloudRunPlatform::new(config.deploy.builder, config.workspace_root(cwd));
    let controller = DeploymentController::new(registry, &platform, env);

    let request = controller.plan(&args.service, &ctx)?;

    if args.dry_run {
        let commands = platform
            .plan_commands(&request, &ctx)
            .map_err(|source| DeployError::BuildFailure {
                image: request.image_ref.clone(),
                stage: BuildStage::Build,
                source,
            })?;
        output::deploy_plan(&request, &commands);
        return Ok(());
    }

    output::deploy_summary(&request, &ctx, platform.builder());

    if !args.yes && !output::is_json() {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Deploy {} to {}?", request.service(), ctx.region))
            .default(false)
            .interact()?;
        if !confirmed {
            output::note("Deploy cancelled");
            return Ok(());
        }
    }

    let spinner = output::spinner(&format!("Deploying {}", request.service()));
    let result = controller.execute(&request, &ctx).await;
    match &result {
        Ok(_) => output::finish(&spinner, true, &format!("Deployed {}", request.service())),
        Err(_) => output::finish(&spinner, false, &format!("Deploy of {} failed", request.service())),
    }

    output::revision(&result?, &ctx.region);
    Ok(())
}
