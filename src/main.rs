mod cli;

use clap::{CommandFactory, Parser};
use cli::{ActionCommands, Cli, Commands};
use std::path::PathBuf;
use std::sync::Arc;
use syncop::facade::OccFacade;
use syncop::relation::{is_leader, HookToolRelation};
use syncop::state::StateStore;
use syncop::workload::HostWorkload;
use syncop::{
    ActionKind, CharmConfig, Error as OpError, Event, EventContext, Outcome, Reconciler,
};

/// Exit code telling the substrate to redeliver the event later.
const EXIT_DEFERRED: i32 = 42;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if let Some(op_error) = e.downcast_ref::<OpError>() {
            eprintln!("Error: {}", op_error);
            if let Some(suggestion) = op_error.suggestion() {
                eprintln!("\nHint: {}", suggestion);
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // ── Commands that need no config ─────────────────────────────────
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        let bin_name = cmd.get_name().to_string();
        clap_complete::generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
        return Ok(());
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("syncop.yaml"));
    let config = CharmConfig::load_or_default(&config_path)?;

    // ── Commands that need config but no collaborators ───────────────
    match &cli.command {
        Commands::Validate => {
            println!(
                "Configuration OK: database '{}', app root {}",
                config.database_name,
                config.app_root.display()
            );
            return Ok(());
        }
        Commands::Status { json } => {
            let store = StateStore::new(cli.state_dir.join("state.json"));
            let state = store.load_or_init(&config.data_dir)?;
            let status = syncop::status::project(&state);
            if *json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{}", status);
            }
            return Ok(());
        }
        _ => {} // fall through to the reconciler path
    }

    // ── Commands that need the reconciler ────────────────────────────
    let reconciler = Reconciler::new(
        config.clone(),
        Arc::new(OccFacade::new(
            config.app_root.clone(),
            config.system_user.clone(),
        )),
        Arc::new(HostWorkload::new(
            config.app_root.clone(),
            config.system_user.clone(),
        )),
        Arc::new(HookToolRelation::new("cluster")),
        Arc::new(HookToolRelation::new("db")),
        StateStore::new(cli.state_dir.join("state.json")),
    );

    // Leadership is snapshotted exactly once per invocation.
    let ctx = EventContext {
        is_leader: is_leader().await?,
    };

    match cli.command {
        Commands::Hook { name, params } => {
            let event = Event::parse(&name, params.as_deref())?;
            match reconciler.dispatch(event, ctx).await? {
                Outcome::Handled => {}
                Outcome::Deferred(reason) => {
                    eprintln!("Deferred: {}", reason);
                    std::process::exit(EXIT_DEFERRED);
                }
            }
        }
        Commands::Action(action) => {
            let kind = match action {
                ActionCommands::SetTrustedDomain { domain } => {
                    ActionKind::SetTrustedDomain { domain }
                }
                ActionCommands::AddMissingIndices => ActionKind::AddMissingIndices,
                ActionCommands::ConvertFilecacheEncoding => ActionKind::ConvertFilecacheEncoding,
                ActionCommands::Maintenance { enable } => ActionKind::Maintenance { enable },
            };
            let output = reconciler.run_action_event(&kind, ctx).await?;
            println!("{}", output);
        }
        // Handled above
        Commands::Validate | Commands::Status { .. } | Commands::Completions { .. } => {
            unreachable!("handled before the reconciler is built");
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
