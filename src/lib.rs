//! chatroute - chat service with LLM-routed web search
//!
//! Each turn asks the language model whether the latest user message needs
//! a web search, optionally fetches search results, and then answers with the
//! results folded into the system instruction. Replies are returned whole or
//! streamed fragment by fragment.

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod metrics;
pub mod middleware;
pub mod pipeline;
pub mod repl;
pub mod router;
pub mod search;
pub mod telemetry;
