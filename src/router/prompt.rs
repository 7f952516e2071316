//! Router prompt templates

use serde::{Deserialize, Serialize};

/// Longest query (in characters) embedded in a router prompt
pub const MAX_QUERY_CHARS: usize = 2_000;

/// Which classification prompt to send
///
/// `Detailed` spells out when a search helps; `Terse` is a one-line
/// question. Both ask for a single word and are parsed the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterPrompt {
    #[default]
    Detailed,
    Terse,
}

impl RouterPrompt {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detailed => "detailed",
            Self::Terse => "terse",
        }
    }
}

/// Build the router prompt for `query`
///
/// Long queries are cut on a character boundary so the classification
/// instruction stays within the model's attention.
pub fn build_router_prompt(style: RouterPrompt, query: &str) -> String {
    let query = if query.chars().count() > MAX_QUERY_CHARS {
        let truncated: String = query.chars().take(MAX_QUERY_CHARS).collect();
        format!("{}... [truncated]", truncated)
    } else {
        query.to_string()
    };

    match style {
        RouterPrompt::Detailed => format!(
            "You are a query classifier. Decide whether answering the user's question \
             well requires a real-time web search.\n\n\
             Answer SEARCH if the question involves:\n\
             - current events, news, or anything that happened recently\n\
             - live data such as weather, prices, scores, or schedules\n\
             - specific facts that may have changed after your training data\n\
             - an explicit request to look something up\n\n\
             Answer DIRECT if the question involves:\n\
             - general knowledge, definitions, or explanations\n\
             - math, logic, or programming help\n\
             - creative writing, opinions, or casual conversation\n\n\
             User question:\n{}\n\n\
             Respond with exactly one word: SEARCH or DIRECT.",
            query
        ),
        RouterPrompt::Terse => format!(
            "Does this query need a web search for current information? \
             Reply with only 'search' or 'direct'.\n\nQuery: {}",
            query
        ),
    }
}
