//! Terminal chat session
//!
//! Same streamed turn as `/chat/stream`, rendered to stdout. The session
//! owns the conversation; the searching marker is printed but never stored.

use crate::error::AppResult;
use crate::llm::Message;
use crate::pipeline::{Pipeline, strip_search_indicator};
use futures::StreamExt;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// How a streamed turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Reply stored in history
    Completed(String),
    /// Stopped by Ctrl-C; the user message was dropped from history
    Interrupted,
}

pub struct ChatSession {
    pipeline: Pipeline,
    history: Vec<Message>,
}

impl ChatSession {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Run one turn, writing display text to `out` as it arrives
    ///
    /// `interrupt` resolving stops the stream; the conversation is reset to
    /// before the user message. On error the user message is dropped too.
    pub async fn turn<W, I>(&mut self, input: &str, out: &mut W, interrupt: I) -> AppResult<TurnOutcome>
    where
        W: Write,
        I: std::future::Future<Output = ()>,
    {
        self.history.push(Message::user(input));

        let mut stream = self.pipeline.stream(self.history.clone());
        let cancel = stream.cancel_handle();
        let mut rendered = String::new();
        let mut interrupted = false;

        tokio::pin!(interrupt);

        loop {
            tokio::select! {
                biased;

                _ = &mut interrupt, if !interrupted => {
                    cancel.abort();
                    interrupted = true;
                }
                item = stream.next() => match item {
                    Some(Ok(event)) => {
                        let text = event.display_text();
                        rendered.push_str(text);
                        write_flush(out, text);
                    }
                    Some(Err(e)) => {
                        self.history.pop();
                        return Err(e);
                    }
                    None => break,
                },
            }
        }

        if interrupted {
            self.history.pop();
            return Ok(TurnOutcome::Interrupted);
        }

        let reply = strip_search_indicator(&rendered);
        self.history.push(Message::assistant(reply.clone()));
        Ok(TurnOutcome::Completed(reply))
    }

    /// Read lines from `input` until EOF or an empty line
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> AppResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();

        loop {
            write_flush(out, "You: ");
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read input");
                    break;
                }
            };
            let query = line.trim();
            if query.is_empty() {
                break;
            }

            write_flush(out, "Assistant: ");
            let interrupt = async {
                // A failed signal handler just means Ctrl-C is not intercepted
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            match self.turn(query, out, interrupt).await {
                Ok(TurnOutcome::Completed(_)) => write_flush(out, "\n\n"),
                Ok(TurnOutcome::Interrupted) => {
                    write_flush(out, "\nInterrupted. Resetting to before the last message.\n\n")
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Turn failed");
                    write_flush(out, &format!("\nError: {}\n\n", e));
                }
            }
        }

        write_flush(out, "\nGoodbye!\n");
        Ok(())
    }
}

fn write_flush<W: Write>(out: &mut W, text: &str) {
    if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
        tracing::warn!(error = %e, "Failed to write to terminal");
    }
}
