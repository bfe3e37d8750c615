mod action;
mod catalog;
mod config;
mod cursor;
mod error;
mod gateway;
mod server;
mod telegram;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use config::Config;
use gateway::Gateway;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Telegram bot tool gateway")]
struct Cli {
    /// Path to TOML config file.
    #[arg(
        long,
        global = true,
        env = "TELEGATE_CONFIG",
        default_value = "telegate.toml"
    )]
    config: PathBuf,

    /// Log level filter, e.g. info,debug,trace.
    #[arg(long, global = true, env = "TELEGATE_LOG", default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum CliCommand {
    /// Serve the tool-call boundary on stdio.
    Run,
    /// Print the action catalog.
    Tools(ToolsArgs),
    /// Dispatch a single action and print its envelope.
    Call(CallArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct ToolsArgs {
    /// Emit the catalog as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Args)]
struct CallArgs {
    /// Action name, e.g. telegram_get_bot_info.
    action: String,
    /// Arguments as a JSON object.
    #[arg(long, default_value = "{}")]
    args: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log);

    let command = cli.command.clone().unwrap_or(CliCommand::Run);
    match command {
        CliCommand::Run => run_gateway(&cli).await,
        CliCommand::Tools(args) => run_tools(&cli, args),
        CliCommand::Call(args) => run_call(&cli, args).await,
    }
}

async fn run_gateway(cli: &Cli) -> Result<()> {
    let cfg = Config::load(&cli.config)?;
    cfg.validate()?;
    let gateway = Arc::new(Gateway::new(cfg));
    server::serve(gateway).await
}

fn run_tools(cli: &Cli, args: ToolsArgs) -> Result<()> {
    let cfg = Config::load(&cli.config)?;
    let gateway = Gateway::new(cfg);
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&gateway.catalog().listing())?
        );
    } else {
        for spec in gateway.catalog().entries() {
            println!("{}: {}", spec.name, spec.description);
        }
    }
    Ok(())
}

async fn run_call(cli: &Cli, args: CallArgs) -> Result<()> {
    let cfg = Config::load(&cli.config)?;
    cfg.validate()?;
    let arguments: Value = serde_json::from_str(&args.args)
        .map_err(|err| anyhow::anyhow!("--args must be a JSON object: {err}"))?;

    let gateway = Gateway::new(cfg);
    let outcome = gateway.dispatch(&args.action, &arguments).await;
    gateway.shutdown().await;
    let envelope = outcome?;
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn init_logging(filter: &str) {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    // stdout carries the protocol frames, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(env)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_run() {
        let cli = Cli::parse_from(["telegate"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("telegate.toml"));
        assert_eq!(cli.log, "info");
    }

    #[test]
    fn cli_parses_tools_command_with_json_flag() {
        let cli = Cli::parse_from(["telegate", "tools", "--json"]);
        match cli.command {
            Some(CliCommand::Tools(args)) => assert!(args.json),
            _ => panic!("expected tools command"),
        }
    }

    #[test]
    fn cli_parses_call_command_with_args_payload() {
        let cli = Cli::parse_from([
            "telegate",
            "call",
            "telegram_send_message",
            "--args",
            r#"{"text": "hi"}"#,
        ]);
        match cli.command {
            Some(CliCommand::Call(args)) => {
                assert_eq!(args.action, "telegram_send_message");
                assert_eq!(args.args, r#"{"text": "hi"}"#);
            }
            _ => panic!("expected call command"),
        }
    }

    #[test]
    fn cli_accepts_global_config_override() {
        let cli = Cli::parse_from(["telegate", "--config", "/tmp/alt.toml", "tools"]);
        assert_eq!(cli.config, PathBuf::from("/tmp/alt.toml"));
    }
}
