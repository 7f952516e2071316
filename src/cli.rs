//! Command-line interface for chatroute
//!
//! Provides argument parsing and subcommand handling for the chatroute binary.

use clap::{Parser, Subcommand};

/// Chat service that decides per message whether to search the web first
#[derive(Parser)]
#[command(name = "chatroute")]
#[command(version)]
#[command(about = "Chat service with LLM-routed web search")]
#[command(
    long_about = "chatroute answers chat messages with a hosted language model. Before each \
    answer the model itself decides whether the question needs a web search; if so, search \
    results are added to the prompt."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Chat in the terminal
    Chat,
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# chatroute Configuration
# =======================
#
# Every section is optional; the values below are the defaults.
# API keys are never stored here. Put them in the environment or a .env file:
#
#   GROQ_API_KEY=...
#   TAVILY_API_KEY=...

# ─────────────────────────────────────────────────────────────────────────────
# SERVER
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "127.0.0.1"

# Port to listen on
port = 8501

# Upper bound for one buffered POST /chat turn, in seconds (1-300)
request_timeout_seconds = 60

# ─────────────────────────────────────────────────────────────────────────────
# LANGUAGE MODEL
# ─────────────────────────────────────────────────────────────────────────────
#
# Any OpenAI-compatible chat completions API. "/chat/completions" is appended
# to base_url.

[llm]
model = "llama-3.3-70b-versatile"
base_url = "https://api.groq.com/openai/v1"

# Sampling temperature (0.0-2.0)
temperature = 0.7

# Per-call timeout for buffered completions, in seconds (1-300)
timeout_seconds = 60

# Environment variable holding the key, and the placeholder value to reject
api_key_env = "GROQ_API_KEY"
api_key_placeholder = "your_groq_api_key_here"

# ─────────────────────────────────────────────────────────────────────────────
# WEB SEARCH
# ─────────────────────────────────────────────────────────────────────────────

[search]
base_url = "https://api.tavily.com"

# Results added to the prompt when a search runs (1-20)
max_results = 5

# Per-call timeout, in seconds (1-300)
timeout_seconds = 10

api_key_env = "TAVILY_API_KEY"
api_key_placeholder = "your_tavily_api_key_here"

# ─────────────────────────────────────────────────────────────────────────────
# ROUTING
# ─────────────────────────────────────────────────────────────────────────────

[routing]
# Classification prompt sent before every answer:
#   - "detailed": lists when a search helps (current events, live data, ...)
#   - "terse": a one-line question
# Either way, a reply containing "search" routes to web search.
prompt = "detailed"

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error" (RUST_LOG overrides)
log_level = "info"

# Log format: "text" or "json"
log_format = "text"

# Prometheus metrics are always available at /metrics on the server port
"#
}
