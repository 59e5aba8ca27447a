//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: Tracks one section's page walk and why it ended
//! - `SessionState`: Tracks the authenticated session used for every request

mod crawl_state;
mod session_state;

// Re-export main types
pub use crawl_state::{CrawlState, TerminationReason};
pub use session_state::SessionState;
