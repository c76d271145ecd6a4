//! Everything needed to talk to the upstream platform: session management,
//! rate limiting, redirect sanitization, and the discovery/fetch/post
//! operations the pipeline's stage workers call.

pub mod client;
pub mod mapping;
pub mod rate_limiter;
pub mod redirect;
pub mod session;

pub use client::{discover_articles, fetch_article, post_comment, synthetic_comment_id, ArticleContent, DiscoveredArticle};
pub use session::{Session, SessionRegistry};
