//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use qibot_core::config::{self, Config, StoreBackend};

mod commands;

#[derive(Parser)]
#[command(name = "qibot")]
#[command(version)]
#[command(about = "QI Telecom customer-service assistant")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: ./qibot.toml)
    #[arg(long, global = true, env = config::CONFIG_ENV_VAR, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve(ServeArgs),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
struct ServeArgs {
    /// Override the listening port
    #[arg(long)]
    port: Option<u16>,

    /// Override the directory served for non-API paths
    #[arg(long, value_name = "DIR")]
    static_dir: Option<PathBuf>,

    /// Keep sessions in memory instead of Redis
    #[arg(long)]
    memory_store: bool,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Print the config file path
    Path,
    /// Write the default config file
    Init,
    /// Print the default config template
    Generate,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config_path = config::config_path(cli.config.as_deref());

    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => {
            qibot_core::logging::init();
            let mut config = Config::load(&config_path).context("load config")?;
            apply_serve_args(&mut config, &args);
            qibot_server::serve(config).await
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path(&config_path);
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(&config_path),
            ConfigCommands::Generate => {
                commands::config::generate();
                Ok(())
            }
        },
    }
}

fn apply_serve_args(config: &mut Config, args: &ServeArgs) {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(dir) = &args.static_dir {
        config.server.static_dir.clone_from(dir);
    }
    if args.memory_store {
        config.session.backend = StoreBackend::Memory;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["qibot"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn serve_flags_override_config() {
        let cli = Cli::try_parse_from([
            "qibot",
            "serve",
            "--port",
            "9090",
            "--static-dir",
            "public",
            "--memory-store",
        ])
        .unwrap();
        let Some(Commands::Serve(args)) = cli.command else {
            panic!("expected serve");
        };

        let mut config = Config::default();
        apply_serve_args(&mut config, &args);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.static_dir, PathBuf::from("public"));
        assert_eq!(config.session.backend, StoreBackend::Memory);
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["qibot", "config", "path", "--config", "/tmp/q.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/q.toml")));
    }
}
