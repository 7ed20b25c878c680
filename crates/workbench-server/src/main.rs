use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use workbench_core::{impex, AlgorithmRegistry, ModelRegistry, OpaqueModel, Workspace};
use workbench_server::telemetry::init_tracing;
use workbench_server::{Account, Server, ServerConfig, ServerContext};

fn cli() -> Command {
    Command::new("workbench-server")
        .version(workbench_server::VERSION)
        .about("Remote model upload and algorithm execution for the workbench")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("listen")
                .long("listen")
                .value_name("ADDR")
                .help("Address to accept connections on"),
        )
        .arg(
            Arg::new("account")
                .long("account")
                .value_name("USER:PASS")
                .action(ArgAction::Append)
                .value_parser(value_parser!(Account))
                .help("Add an account to the login allow-list"),
        )
        .arg(
            Arg::new("payload-timeout-secs")
                .long("payload-timeout-secs")
                .value_name("SECS")
                .value_parser(value_parser!(u64))
                .help("Abort a payload after this many idle seconds"),
        )
        .arg(
            Arg::new("preload")
                .long("preload")
                .value_name("FILE")
                .action(ArgAction::Append)
                .value_parser(value_parser!(PathBuf))
                .help("Load a model file into the workspace at startup"),
        )
}

/// Command line values override the file
fn load_config(matches: &ArgMatches) -> anyhow::Result<ServerConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };

    if let Some(listen) = matches.get_one::<String>("listen") {
        config.listen.clone_from(listen);
    }
    if let Some(accounts) = matches.get_many::<Account>("account") {
        config.accounts.extend(accounts.cloned());
    }
    if let Some(secs) = matches.get_one::<u64>("payload-timeout-secs") {
        config.payload_timeout_secs = Some(*secs);
    }
    if let Some(paths) = matches.get_many::<PathBuf>("preload") {
        config.preload.extend(paths.cloned());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    init_tracing(&config.log_filter);
    config.validate()?;

    let models = ModelRegistry::new("model").with_fallback(OpaqueModel::deserializer());
    let workspace = Arc::new(Workspace::new());
    for path in &config.preload {
        let model = impex::load_model(&models, path)
            .with_context(|| format!("preloading {}", path.display()))?;
        tracing::info!(model = %model.id(), path = %path.display(), "model preloaded");
        workspace.insert(model);
    }

    // Algorithm types come from plugins registered by the embedding application
    let context = ServerContext::new(workspace, models, AlgorithmRegistry::new("algorithm"));
    let server = Server::bind(&config, context).await?;
    tracing::info!(
        addr = %server.local_addr()?,
        accounts = config.accounts.len(),
        "server listening"
    );

    server
        .serve_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;
    Ok(())
}
