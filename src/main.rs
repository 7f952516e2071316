//! chatroute binary
//!
//! `serve` (default) starts the HTTP server, `chat` opens a terminal
//! session, `config` prints a template configuration.

use chatroute::{
    cli::{Cli, Command, generate_config_template},
    config::Config,
    handlers::{self, AppState},
    pipeline::Pipeline,
    repl::ChatSession,
    telemetry,
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = &cli.command {
        let template = generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(path, template)?;
                eprintln!("Configuration template written to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    // Credentials may come from .env; a missing file is fine
    dotenv::dotenv().ok();

    let config = load_config(&cli.config)?;
    telemetry::init(&config.observability);

    match cli.command {
        Some(Command::Chat) => chat(config).await,
        _ => serve(config).await,
    }
}

/// Missing default config file falls back to built-in defaults; an explicit
/// path must exist.
fn load_config(path: &str) -> Result<Config, Box<dyn std::error::Error>> {
    if path == "config.toml" && !Path::new(path).exists() {
        return Ok(Config::default());
    }
    Ok(Config::from_file(path)?)
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(config);
    let state = AppState::new(config.clone())?;

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([127, 0, 0, 1])),
        config.server.port,
    ));

    tracing::info!(
        model = state.pipeline().model(),
        router_prompt = config.routing.prompt.as_str(),
        "Starting chatroute server on {}",
        addr
    );
    tracing::info!("Chat page available at http://{}/", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, handlers::app(state)).await?;

    Ok(())
}

async fn chat(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Pipeline::from_config(&config)?;
    let mut session = ChatSession::new(pipeline);

    println!("chatroute ({})", config.llm.model());
    println!("Type a message and press Enter. Empty line to exit, Ctrl-C to stop a reply.\n");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    session.run(stdin, &mut std::io::stdout()).await?;
    Ok(())
}
