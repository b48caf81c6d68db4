// src/ingest/providers/mod.rs
pub mod news_rss;
pub mod social;
pub mod structured_api;

pub use news_rss::NewsRssProvider;
pub use social::SocialFeedProvider;
pub use structured_api::StructuredApiProvider;
