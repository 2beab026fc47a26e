use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use tapr_changer::{ChangerRegistry, StatusMap};
use tapr_server::{ServerConfig, TaprServer};
use tapr_store::StoreRegistry;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Config(args) => cmd_config(args, cli.format),
        Command::ChangerStatus(args) => cmd_changer_status(args, cli.format),
        Command::Backends => cmd_backends(cli.format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(ServerConfig::default()),
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let server = TaprServer::from_config(
        config,
        &StoreRegistry::with_builtin(),
        &ChangerRegistry::with_builtin(),
    )?;
    println!(
        "{} tapr server on {} (store: {} [{}])",
        "▶".green().bold(),
        server.config().bind_addr.to_string().bold(),
        server.io().store().name().cyan(),
        server.io().store().backend(),
    );

    runtime()?.block_on(server.serve())?;
    println!("{} Server stopped.", "✓".green());
    Ok(())
}

fn cmd_config(args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    match format {
        OutputFormat::Text => print!("{}", config.to_toml()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}

fn cmd_changer_status(args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let Some(changer_config) = config.changer else {
        println!("No changer configured.");
        return Ok(());
    };

    let changer = ChangerRegistry::with_builtin().create(&changer_config.backend, &changer_config)?;
    let status = runtime()?.block_on(changer.status())?;

    match format {
        OutputFormat::Text => print_status(&status),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
    }
    Ok(())
}

fn print_status(status: &StatusMap) {
    for (category, slots) in status {
        let used = slots.iter().filter(|s| !s.is_empty()).count();
        println!("{} ({}/{} occupied)", category.to_string().bold(), used, slots.len());
        for slot in slots {
            match &slot.volume {
                Some(volume) => {
                    let home = volume
                        .home
                        .map(|h| format!(" (home {h})").dimmed().to_string())
                        .unwrap_or_default();
                    println!("  {:>4}  {}{}", slot.location.addr, volume.serial.yellow(), home);
                }
                None => println!("  {:>4}  {}", slot.location.addr, "empty".dimmed()),
            }
        }
    }
}

fn cmd_backends(format: OutputFormat) -> anyhow::Result<()> {
    let stores = StoreRegistry::with_builtin();
    let changers = ChangerRegistry::with_builtin();
    match format {
        OutputFormat::Text => {
            println!("Store backends: {}", stores.kinds().join(", ").cyan());
            println!("Changer backends: {}", changers.kinds().join(", ").cyan());
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "store": stores.kinds(), "changer": changers.kinds() })
        ),
    }
    Ok(())
}
