//! Command-line interface for authbridge
//!
//! `serve` starts the HTTP server; `check-config` validates and prints the
//! effective configuration.

use crate::Result;
use crate::config::Config;
use crate::http::{AppState, start_server};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// Main CLI entry point
pub async fn run() -> Result<()> {
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("serve", sub_matches)) => handle_serve_command(sub_matches).await,
        Some(("check-config", sub_matches)) => handle_check_config_command(sub_matches),
        _ => {
            eprintln!("No command specified. Use --help for usage information.");
            std::process::exit(1);
        }
    }
}

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .value_name("PATH")
        .default_value(crate::constants::CONFIG_FILE_NAME)
        .help("Path to the configuration file (JSON or YAML)")
}

/// Build the command tree
pub fn build_cli() -> Command {
    Command::new("authbridge")
        .about("authbridge - identity token broker for the cluster control plane")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand(
            Command::new("serve")
                .about("Start the authbridge HTTP server")
                .arg(config_arg())
                .arg(
                    Arg::new("debug")
                        .long("debug")
                        .action(ArgAction::SetTrue)
                        .help("Enable debug logging"),
                )
                .arg(
                    Arg::new("log")
                        .long("log")
                        .value_name("FILE")
                        .help("Write logs to FILE instead of stderr"),
                )
                .arg(
                    Arg::new("port")
                        .long("port")
                        .value_parser(clap::value_parser!(u16))
                        .help("Port to listen on"),
                )
                .arg(
                    Arg::new("private-key-file")
                        .long("private-key-file")
                        .value_name("FILE")
                        .env("AUTHBRIDGE_PRIVATE_KEY_FILE")
                        .help("PEM RSA private key used to sign tokens"),
                )
                .arg(
                    Arg::new("public-key-file")
                        .long("public-key-file")
                        .value_name("FILE")
                        .env("AUTHBRIDGE_PUBLIC_KEY_FILE")
                        .help("PEM RSA public key used to verify tokens"),
                ),
        )
        .subcommand(
            Command::new("check-config")
                .about("Load and validate the configuration, then print it")
                .arg(config_arg()),
        )
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(crate::constants::CONFIG_FILE_NAME);
    Config::load_from_path(path)
}

/// Apply `serve` flags on top of the file configuration
fn apply_serve_overrides(config: &mut Config, matches: &ArgMatches) -> Result<()> {
    if let Some(port) = matches.get_one::<u16>("port") {
        config.http.port = *port;
    }
    if let Some(file) = matches.get_one::<String>("private-key-file") {
        config.keys.private_key_file = Some(PathBuf::from(file));
    }
    if let Some(file) = matches.get_one::<String>("public-key-file") {
        config.keys.public_key_file = Some(PathBuf::from(file));
    }
    if let Some(file) = matches.get_one::<String>("log") {
        config.log.file = Some(PathBuf::from(file));
    }
    if matches.get_flag("debug") {
        config.log.level = Some("debug".to_string());
    }
    config.validate()
}

async fn handle_serve_command(matches: &ArgMatches) -> Result<()> {
    let mut config = load_config(matches)?;
    apply_serve_overrides(&mut config, matches)?;

    crate::init_logging(config.log.level.as_deref(), config.log.file.as_deref())?;

    let state = AppState::from_config(&config)?;

    if config.reload_on_startup {
        match state.manager.reload().await {
            Ok(()) => tracing::info!("Loaded the persisted auth configuration"),
            Err(e) => tracing::warn!("Could not reload the auth configuration at startup: {}", e),
        }
    }

    start_server(&config, state).await
}

fn handle_check_config_command(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let rendered = serde_json::to_string_pretty(&config)?;
    println!("{}", rendered);
    Ok(())
}
