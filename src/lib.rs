//! Scraping sync engine for a cookie-authenticated campus LMS.
//!
//! The site exposes no API, so everything goes through HTML: a session
//! layer that logs in and detects expiry, extractors that turn course
//! pages into typed activity candidates, a deadline resolver for detail
//! pages, a reconciler that upserts the results into a pluggable store,
//! and an emulator for the video player's progress-beacon protocol.

pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod resolve;
pub mod services;
pub mod session;
pub mod store;
pub mod summarize;
pub mod vod;

pub use config::LmsConfig;
pub use error::LmsError;
pub use extract::course::ContentExtractor;
pub use services::{SyncReport, SyncService};
pub use session::{Fetcher, LmsSession, SessionState};
pub use store::{MemoryStore, Store, Upsert};
pub use summarize::{NoopSummarizer, Summarizer};
pub use vod::WatchEmulator;
