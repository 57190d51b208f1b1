use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use docchat::api::HttpApi;
use docchat::cli::{self, EchoLog};
use docchat::config::{self, DocChatConfig};
use docchat::logging::{self, LogTarget};
use docchat::session::{Session, SessionController};
use docchat::tui::{self, App};
use docchat::views::{DocumentList, Transcript};

#[derive(Parser)]
#[command(name = "docchat")]
#[command(about = "Chat with a document assistant server and upload PDFs for it to read")]
struct Cli {
    /// Config file (defaults to ~/.docchat/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server base URL, e.g. http://127.0.0.1:5000
    #[arg(short, long)]
    server: Option<String>,

    /// Line-mode interface instead of the TUI
    #[arg(long)]
    classic: bool,

    #[arg(long)]
    log_level: Option<String>,

    /// Override a config value, e.g. --set timeout=60
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,
}

fn load_config(cli: &Cli) -> Result<DocChatConfig> {
    let mut config = config::load_or_create_config(cli.config.as_deref())?;

    let mut overrides = cli
        .overrides
        .iter()
        .map(|raw| config::parse_override(raw))
        .collect::<Result<Vec<_>>>()?;
    if let Some(server) = &cli.server {
        overrides.push(("server".to_string(), server.clone()));
    }
    if let Some(level) = &cli.log_level {
        overrides.push(("log_level".to_string(), level.clone()));
    }
    config.merge_overrides(overrides)?;

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let target = if cli.classic {
        LogTarget::Stderr
    } else {
        LogTarget::File(config.general.log_file.clone())
    };
    logging::init(&config.general.log_level, target)?;
    info!("Using server {}", config.server.base_url);

    let api = Arc::new(HttpApi::from_config(&config.server)?);
    let transcript = Arc::new(Transcript::with_auto_scroll(config.tui.auto_scroll));
    let documents = Arc::new(DocumentList::new());

    let session = if cli.classic {
        Session::new(Arc::new(EchoLog::new(transcript.clone())), documents.clone())
    } else {
        Session::new(transcript.clone(), documents.clone())
    };
    let controller = Arc::new(SessionController::new(
        api,
        session,
        config.session.resume_conversation,
    ));

    if cli.classic {
        controller.start().await;
        cli::run_classic_cli(controller, documents, &config.server.base_url).await
    } else {
        // The TUI draws right away and picks the list up when it arrives.
        let mut app = App::new(controller, transcript, documents, &config.server.base_url, &config.tui);
        app.spawn_refresh();
        tui::run_tui(app).await
    }
}
