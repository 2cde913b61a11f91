//! sql-quest: a sandboxed SQL puzzle game.

use std::io::Write;
use std::process::ExitCode;

use anyhow::Context;
use sql_quest::cli::{Action, Cli, OutputFormat};
use sql_quest::config::Config;
use sql_quest::logging;
use sql_quest::output;
use sql_quest::persistence::ProgressStore;
use sql_quest::scenario::Scenario;
use sql_quest::session::Session;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    logging::init_stderr_logging();

    let cli = Cli::parse_args();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Runs one invocation. Returns false when a submission or audit failed.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let action = cli.action().map_err(anyhow::Error::msg)?;
    let format = cli.parse_output_format().map_err(anyhow::Error::msg)?;

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.apply_env_overrides()?;
    cli.apply_overrides(&mut config);

    let scenario = resolve_scenario(&cli, &config)?;

    if action == Action::Schema {
        print(&output::render_schema(&scenario, format))?;
        return Ok(true);
    }

    let progress = if config.progress.enabled {
        let store = match &config.progress.path {
            Some(path) => ProgressStore::open(path).await,
            None => ProgressStore::open_default().await,
        };
        Some(store.context("Failed to open progress database")?)
    } else {
        None
    };

    let session = Session::open(scenario, config.sandbox.to_sandbox_config(), progress)
        .await
        .context("Failed to build the sandbox")?;

    let cancel = session.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling query");
            cancel.cancel();
        }
    });

    let succeeded = dispatch(&session, action, format).await;
    session.close().await;
    succeeded
}

async fn dispatch(session: &Session, action: Action, format: OutputFormat) -> anyhow::Result<bool> {
    match action {
        Action::List => {
            let statuses = session.level_statuses().await?;
            print(&output::render_levels(session.scenario(), &statuses, format))?;
            Ok(true)
        }
        Action::Schema => {
            print(&output::render_schema(session.scenario(), format))?;
            Ok(true)
        }
        Action::Check => {
            let report = session.audit().await;
            print(&output::render_audit(&report, format))?;
            Ok(report.all_passed())
        }
        Action::Submit { level_id, sql } => {
            let submission = session.submit(&level_id, &sql).await?;
            let level = session.level(&level_id)?;
            print(&output::render_submission(level, &submission, format))?;
            Ok(submission.passed())
        }
    }
}

/// Picks `--scenario-dir`, then a configured directory, then a built-in scenario.
fn resolve_scenario(cli: &Cli, config: &Config) -> anyhow::Result<Scenario> {
    if let Some(dir) = &cli.scenario_dir {
        return Scenario::load_from_dir(dir)
            .with_context(|| format!("Failed to load scenario from {}", dir.display()));
    }
    if let Some(dir) = config.scenario_dir(&cli.scenario) {
        return Scenario::load_from_dir(dir)
            .with_context(|| format!("Failed to load scenario '{}'", cli.scenario));
    }
    Ok(Scenario::builtin(&cli.scenario)?)
}

fn print(text: &str) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
