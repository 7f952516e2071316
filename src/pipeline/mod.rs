//! Turn orchestration
//!
//! A turn walks a fixed graph: `Router -> Search? -> Respond -> End`.
//! [`Node::next`] holds the only branching rule, and both output modes
//! ([`Pipeline::run`] and [`Pipeline::stream`]) drive the same node
//! sequence over a fresh [`AgentState`].

mod responder;
mod stream;

pub use responder::{
    PLAIN_SYSTEM_PROMPT, Responder, build_messages, search_system_prompt, system_instruction,
};
pub use stream::{SEARCHING_INDICATOR, TurnEvent, TurnStream, strip_search_indicator};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::llm::{ChatCompletionsClient, LlmClient, Message};
use crate::router::{QueryRouter, RouterPrompt};
use crate::search::{SearchProvider, TavilyClient, search_context};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Per-turn working state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentState {
    pub messages: Vec<Message>,
    /// Formatted search context, empty when no search ran
    pub search_results: String,
    pub needs_search: bool,
}

impl AgentState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Content of the last user message
    pub fn latest_user_text(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|m| match m {
            Message::User(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// The assistant reply, if the last message is one; empty otherwise
    pub fn reply(&self) -> &str {
        match self.messages.last() {
            Some(Message::Assistant(text)) => text,
            _ => "",
        }
    }
}

/// Graph nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Router,
    Search,
    Respond,
    End,
}

impl Node {
    /// Successor of `self` given the state the node just produced
    pub fn next(self, state: &AgentState) -> Node {
        match self {
            Self::Router if state.needs_search => Self::Search,
            Self::Router => Self::Respond,
            Self::Search => Self::Respond,
            Self::Respond | Self::End => Self::End,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Router => "router",
            Self::Search => "search",
            Self::Respond => "respond",
            Self::End => "end",
        }
    }
}

/// How the reply is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Buffered,
    Streamed,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buffered => "buffered",
            Self::Streamed => "streamed",
        }
    }
}

/// Router, search step and responder wired together
///
/// Cheap to clone; every component sits behind an `Arc`.
#[derive(Clone)]
pub struct Pipeline {
    router: QueryRouter,
    responder: Responder,
    search: Arc<dyn SearchProvider>,
    max_results: usize,
}

impl Pipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchProvider>,
        prompt: RouterPrompt,
        max_results: usize,
    ) -> Self {
        Self {
            router: QueryRouter::new(llm.clone(), prompt),
            responder: Responder::new(llm),
            search,
            max_results,
        }
    }

    /// Build the hosted clients from configuration and the process environment
    ///
    /// Fails with a configuration error when either credential is missing or
    /// still a placeholder. No network call is made.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(config: &Config, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let llm = ChatCompletionsClient::from_lookup(&config.llm, &lookup)?;
        let search = TavilyClient::from_lookup(&config.search, &lookup)?;

        tracing::info!(
            model = config.llm.model(),
            llm_endpoint = llm.endpoint(),
            search_endpoint = search.endpoint(),
            router_prompt = config.routing.prompt.as_str(),
            "Pipeline ready"
        );

        Ok(Self::new(
            Arc::new(llm),
            Arc::new(search),
            config.routing.prompt,
            config.search.max_results(),
        ))
    }

    pub fn model(&self) -> &str {
        self.responder.model()
    }

    /// Drive a full buffered turn
    ///
    /// Returns the final state with the assistant reply appended to `messages`.
    pub async fn run(&self, mut state: AgentState) -> AppResult<AgentState> {
        let query = latest_query(&state)?;
        let mut node = Node::Router;

        while node != Node::End {
            tracing::debug!(node = node.as_str(), "Entering node");
            match node {
                Node::Router => {
                    state.needs_search = self.router.decide(&query).await?.needs_search();
                }
                Node::Search => {
                    state.search_results =
                        search_context(self.search.as_ref(), &query, self.max_results).await;
                }
                Node::Respond => {
                    let reply = self
                        .responder
                        .respond(&state.messages, &state.search_results)
                        .await?;
                    state.messages.push(Message::assistant(reply));
                }
                Node::End => {}
            }
            node = node.next(&state);
        }

        Ok(state)
    }

    /// Buffered turn over a caller-owned conversation; returns the reply text
    pub async fn invoke_chat(&self, messages: &[Message]) -> AppResult<String> {
        let state = self.run(AgentState::new(messages.to_vec())).await?;
        Ok(state.reply().to_string())
    }

    /// Streamed turn
    ///
    /// Emits [`TurnEvent::Searching`] right before the search node runs, then
    /// one [`TurnEvent::Fragment`] per model fragment. The first error ends
    /// the stream.
    pub fn stream(&self, messages: Vec<Message>) -> TurnStream {
        let pipeline = self.clone();

        let events: BoxStream<'static, AppResult<TurnEvent>> = Box::pin(async_stream::stream! {
            let mut state = AgentState::new(messages);
            let query = match latest_query(&state) {
                Ok(query) => query,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let mut node = Node::Router;

            while node != Node::End {
                tracing::debug!(node = node.as_str(), "Entering node");
                match node {
                    Node::Router => match pipeline.router.decide(&query).await {
                        Ok(route) => state.needs_search = route.needs_search(),
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    },
                    Node::Search => {
                        yield Ok(TurnEvent::Searching);
                        state.search_results =
                            search_context(pipeline.search.as_ref(), &query, pipeline.max_results)
                                .await;
                    }
                    Node::Respond => {
                        let mut fragments = match pipeline
                            .responder
                            .respond_stream(&state.messages, &state.search_results)
                            .await
                        {
                            Ok(fragments) => fragments,
                            Err(e) => {
                                yield Err(e);
                                return;
                            }
                        };

                        let mut fragment_count = 0usize;
                        while let Some(item) = fragments.next().await {
                            match item {
                                Ok(text) => {
                                    fragment_count += 1;
                                    yield Ok(TurnEvent::Fragment(text));
                                }
                                Err(e) => {
                                    yield Err(AppError::from(e));
                                    return;
                                }
                            }
                        }
                        tracing::debug!(fragment_count, "Streamed reply finished");
                    }
                    Node::End => {}
                }
                node = node.next(&state);
            }
        });

        TurnStream::new(events)
    }
}

fn latest_query(state: &AgentState) -> AppResult<String> {
    state
        .latest_user_text()
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation("conversation has no user message".to_string()))
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("router", &self.router)
            .field("responder", &self.responder)
            .field("search", &self.search.name())
            .field("max_results", &self.max_results)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedLlm;
    use crate::search::SearchResult;
    use crate::search::mock::StaticSearch;

    fn pipeline(llm: Arc<ScriptedLlm>, search: Arc<StaticSearch>) -> Pipeline {
        Pipeline::new(llm, search, RouterPrompt::Detailed, 5)
    }

    #[test]
    fn test_node_transitions() {
        let mut state = AgentState::default();
        assert_eq!(Node::Router.next(&state), Node::Respond);
        state.needs_search = true;
        assert_eq!(Node::Router.next(&state), Node::Search);
        assert_eq!(Node::Search.next(&state), Node::Respond);
        assert_eq!(Node::Respond.next(&state), Node::End);
        assert_eq!(Node::End.next(&state), Node::End);
    }

    #[test]
    fn test_latest_user_text_skips_trailing_assistant() {
        let state = AgentState::new(vec![
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second"),
            Message::assistant("another"),
        ]);
        assert_eq!(state.latest_user_text(), Some("second"));
    }

    #[test]
    fn test_reply_is_empty_without_assistant_tail() {
        assert_eq!(AgentState::new(vec![Message::user("hi")]).reply(), "");
        assert_eq!(AgentState::default().reply(), "");
    }

    #[tokio::test]
    async fn test_run_direct_skips_search() {
        let llm = Arc::new(ScriptedLlm::new(["direct", "4"]));
        let search = Arc::new(StaticSearch::new(Vec::new()));
        let state = pipeline(llm.clone(), search.clone())
            .run(AgentState::new(vec![Message::user("What is 2+2?")]))
            .await
            .unwrap();

        assert!(!state.needs_search);
        assert_eq!(state.search_results, "");
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.reply(), "4");
        assert!(search.calls().is_empty());
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_run_search_fills_context() {
        let llm = Arc::new(ScriptedLlm::new(["SEARCH", "Sunny."]));
        let search = Arc::new(StaticSearch::new(vec![SearchResult::new(
            "Weather",
            "Sunny",
            "https://w.example",
        )]));
        let state = pipeline(llm, search.clone())
            .run(AgentState::new(vec![Message::user("Weather in Paris today?")]))
            .await
            .unwrap();

        assert!(state.needs_search);
        assert!(state.search_results.starts_with("**Weather**"));
        assert_eq!(search.calls(), vec![("Weather in Paris today?".to_string(), 5)]);
    }

    #[tokio::test]
    async fn test_run_without_user_message_is_validation_error() {
        let llm = Arc::new(ScriptedLlm::default());
        let err = pipeline(llm.clone(), Arc::new(StaticSearch::new(Vec::new())))
            .run(AgentState::new(vec![Message::assistant("hello")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_invoke_chat_returns_reply_text() {
        let llm = Arc::new(ScriptedLlm::new(["direct", "Hello there!"]));
        let reply = pipeline(llm, Arc::new(StaticSearch::new(Vec::new())))
            .invoke_chat(&[Message::user("Hi")])
            .await
            .unwrap();
        assert_eq!(reply, "Hello there!");
    }

    #[tokio::test]
    async fn test_stream_emits_searching_before_fragments() {
        let llm = Arc::new(ScriptedLlm::new(["search", "It is sunny."]));
        let search = Arc::new(StaticSearch::new(Vec::new()));
        let events: Vec<TurnEvent> = pipeline(llm, search)
            .stream(vec![Message::user("Weather now?")])
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(events[0], TurnEvent::Searching);
        let text: String = events.iter().filter_map(TurnEvent::fragment).collect();
        assert_eq!(text, "It is sunny.");
    }

    #[tokio::test]
    async fn test_stream_router_failure_ends_with_error() {
        let llm = Arc::new(ScriptedLlm::default().then_fail("invalid api key"));
        let mut stream =
            pipeline(llm, Arc::new(StaticSearch::new(Vec::new()))).stream(vec![Message::user("Hi")]);

        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(AppError::ModelQuery(_))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let llm = Arc::new(ScriptedLlm::new(["direct", "ok"]));
        let stream = pipeline(llm.clone(), Arc::new(StaticSearch::new(Vec::new())))
            .stream(vec![Message::user("Hi")]);
        tokio::task::yield_now().await;
        assert_eq!(llm.call_count(), 0);
        drop(stream);
        assert_eq!(llm.call_count(), 0);
    }
}
