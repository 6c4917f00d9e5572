//! `inbizio-deploy --mode deploy|rollback`: run a sequence and report it.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::deploy::{self as service, DeployMode, DeployPorts, DeployReport};
use crate::domain::DeployVersion;
use crate::output::{OutputContext, json};

/// Run the sequence selected by `mode` for `version`.
///
/// # Errors
///
/// Returns the stage-labelled error of the first failing stage.
pub async fn run(app: &AppContext, mode: DeployMode, version: &DeployVersion) -> Result<()> {
    let reporter = app.terminal_reporter();
    let ports = DeployPorts {
        connector: &app.connector,
        runner: &app.runner,
        fs: &app.fs,
        reporter: &reporter,
    };

    tracing::info!(?mode, %version, host = %app.config.server.host, "starting");
    let report = service::run(&ports, &app.config, mode, version).await?;
    drop(reporter);

    if app.is_json() {
        println!("{}", json::format_report(&report)?);
    } else {
        print_summary(&report, &app.output);
    }
    Ok(())
}

fn print_summary(report: &DeployReport, ctx: &OutputContext) {
    if ctx.quiet {
        return;
    }
    let verb = match report.mode {
        DeployMode::Deploy => "Deployed",
        DeployMode::Rollback => "Rolled back to",
    };
    println!();
    ctx.header(&format!("{verb} inbizio {} on {}", report.version, report.host));
    if let Some(local) = &report.local_archive {
        ctx.kv("Local archive ", &local.display().to_string());
    }
    ctx.kv("Remote archive", &report.remote_archive);
    ctx.kv("Extracted to  ", &report.extracted_to);
    ctx.kv("Auth          ", report.auth);
}
