use std::net::SocketAddr;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod handler;
mod history;
mod ollama;
mod segment;
mod server;
mod stream;
mod tui;
mod ui;

use app::App;
use config::Config;
use history::FileStore;
use ollama::OllamaClient;
use server::{run_server, ServerState};

#[derive(Parser)]
#[command(name = "ponder")]
#[command(about = "Chat with local reasoning models, with hideable thinking sections")]
struct Cli {
    /// Backend base URL (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Model to query (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat in the terminal (default)
    Chat,
    /// Run the HTTP intermediary exposing POST /api/ask
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },
    /// List models available on the backend
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_default();
    let backend_url = cli
        .host
        .unwrap_or_else(|| config.backend_url().to_string());
    let model = cli.model.unwrap_or_else(|| config.model().to_string());

    let ollama = OllamaClient::new(&backend_url);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(ollama, model).await,
        Commands::Serve { bind } => {
            init_stderr_logging();
            run_server(
                bind,
                ServerState {
                    ollama,
                    model,
                },
            )
            .await
        }
        Commands::Models => {
            init_stderr_logging();
            list_models(ollama).await
        }
    }
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run_chat(ollama: OllamaClient, model: String) -> Result<()> {
    let app_dir = Config::app_dir()?;
    std::fs::create_dir_all(&app_dir)?;

    // The TUI owns stderr, so chat-mode logs go to a file instead.
    let file_appender = tracing_appender::rolling::never(&app_dir, "ponder.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let store = FileStore::new(app_dir.join("history.json"));
    let mut app = App::new(ollama, model, store);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event).await?,
            None => break,
        }
    }

    tui::restore()
}

async fn list_models(ollama: OllamaClient) -> Result<()> {
    match ollama.list_models().await {
        Ok(models) if models.is_empty() => {
            println!("No models found. Pull one with: ollama pull deepseek-r1");
        }
        Ok(models) => {
            for model in models {
                println!("{model}");
            }
        }
        Err(err) => {
            eprintln!("Error connecting to Ollama: {err}");
            std::process::exit(1);
        }
    }
    Ok(())
}
