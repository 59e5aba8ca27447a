//! Crawler module for authenticated page acquisition and run orchestration
//!
//! This module contains the request side of the pipeline, including:
//! - Request pacing and retry backoff
//! - The authenticated session and page fetcher
//! - Per-section page iteration
//! - Post extraction from page markup
//! - Overall run coordination

mod backoff;
mod controller;
mod coordinator;
mod fetcher;
mod parser;
mod rate_limiter;
mod session;

pub use backoff::Backoff;
pub use controller::{crawl, CrawlController, PageRequest};
pub use coordinator::{Coordinator, RunReport, SectionReport};
pub use fetcher::{build_http_client, is_retryable_status, PageFetcher};
pub use parser::{parse_timestamp, PostParser};
pub use rate_limiter::RateLimiter;
pub use session::SessionManager;
