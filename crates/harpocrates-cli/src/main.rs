//! Harpocrates CLI entrypoint.

use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod handlers;
mod redact;
mod status;
mod writer;

use commands::Commands;
use config::CliArgs;

#[derive(Parser)]
#[command(name = "harpocrates")]
#[command(
    author,
    version,
    about = "Fetch secrets from HashiCorp Vault and write them to files",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    args: CliArgs,

    /// Inline secrets document, as JSON or YAML
    input: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.args.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Some(document) = handlers::load_document(&cli.args, cli.input.as_deref())? else {
        println!(
            "{} No secrets given: use --file, --secret or an inline document",
            style("!").yellow()
        );
        return Ok(());
    };

    if cli.args.validate {
        handlers::validate(&document);
        return Ok(());
    }

    match cli.command {
        Some(Commands::Dev { redact, command }) => {
            let code = handlers::dev(&cli.args, &document, redact, &command).await?;
            std::process::exit(code);
        }
        None => handlers::run(&cli.args, &document).await?,
    }

    Ok(())
}
