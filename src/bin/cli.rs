//! VitalDash CLI - Main entry point for CLI binary
//!
//! Runs the dashboard flow against a health store and prints the result.

use anyhow::{anyhow, Context};
use clap::Parser;
use vitaldash_lib::engine::{
    cli::{formatter::CliFormatter, Cli, Commands, OutputFormat},
    logging,
};
use vitaldash_lib::AppState;

/// How a command finished once its output was printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Done,
    /// Failure already shown in the command's own output
    FailedReported,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run_cli(cli).await {
        Ok(Completion::Done) => {}
        Ok(Completion::FailedReported) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run_cli(cli: Cli) -> anyhow::Result<Completion> {
    let config = cli.resolve_config().context("Failed to load configuration")?;
    logging::init(&config.log_filter);

    let json_output = cli.format == OutputFormat::Json;
    let app = AppState::from_config(&config).map_err(|e| anyhow!(e))?;

    match cli.command {
        Commands::Fetch => cmd_fetch(&app, json_output).await,
        Commands::Permissions => cmd_permissions(&app, json_output).await,
        Commands::Revoke => cmd_revoke(&app, json_output).await,
    }
}

async fn cmd_fetch(app: &AppState, json: bool) -> anyhow::Result<Completion> {
    vitaldash_lib::start(app).await.map_err(|e| anyhow!(e))?;
    let result = vitaldash_lib::trigger_fetch(app).await.map_err(|e| anyhow!(e))?;

    let state = app.controller.state();
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        CliFormatter::dashboard(&state, app.controller.window_hours());
    }

    // Both renderings already carry the error
    Ok(match state.error {
        Some(_) => Completion::FailedReported,
        None => Completion::Done,
    })
}

async fn cmd_permissions(app: &AppState, json: bool) -> anyhow::Result<Completion> {
    let started = vitaldash_lib::start(app).await.map_err(|e| anyhow!(e))?;
    if let Some(error) = started["error"].as_str() {
        return Err(anyhow!(error.to_string()));
    }

    if json {
        let permissions = vitaldash_lib::get_permissions(app).await.map_err(|e| anyhow!(e))?;
        println!("{}", serde_json::to_string_pretty(&permissions)?);
    } else {
        CliFormatter::permissions(&app.controller.granted().await);
    }
    Ok(Completion::Done)
}

async fn cmd_revoke(app: &AppState, json: bool) -> anyhow::Result<Completion> {
    vitaldash_lib::start(app).await.map_err(|e| anyhow!(e))?;

    if json {
        let result = vitaldash_lib::revoke_access(app).await.map_err(|e| anyhow!(e))?;
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let notice = app.controller.revoke_access().await;
        CliFormatter::revoke_notice(&notice);
        CliFormatter::divider();
        CliFormatter::dashboard(&app.controller.state(), app.controller.window_hours());
    }
    Ok(Completion::Done)
}
