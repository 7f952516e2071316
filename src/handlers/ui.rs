//! Browser chat page
//!
//! A single static page. The page keeps the conversation in memory and posts
//! it in full to `/chat/stream` on every turn.

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// GET /
pub async fn handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}
