//! Inbox Unsubscribe
//!
//! Scans a mailbox for newsletters and marketing mail, collects their
//! unsubscribe links, and lets the operator act on them from a terminal.
//!
//! # Overview
//!
//! - **Transport**: IMAP over TLS with a deadline on every call
//! - **Classification**: subject and sender decoding, link extraction from the
//!   `List-Unsubscribe` header and HTML anchors
//! - **Fetching**: newest-first batches until enough unique candidates are found
//! - **State**: a permanent skip list and a per-operator history of resolved senders
//! - **Review**: an interactive command loop that opens links and records decisions
//!
//! # Example Usage
//!
//! ```no_run
//! use inbox_unsubscribe::{
//!     client::ImapTransport, config::Config, links::RegexLinkExtractor,
//!     report::NullReporter, scanner::BatchFetcher, state::{FileState, PersistentState},
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("unsubscribe.toml".as_ref()).await?;
//!     let settings = config.server_for("me@gmail.com")?;
//!
//!     let state = FileState::new(".unsubscribe/skip_list.txt", ".unsubscribe/history.json");
//!     let exclusions = state.exclusions_for("me@gmail.com")?;
//!
//!     let mut transport = ImapTransport::connect(&settings, "me@gmail.com", "app-password").await?;
//!     let extractor = RegexLinkExtractor::new();
//!     let messages = BatchFetcher::new(&mut transport, &extractor, &exclusions, &NullReporter)
//!         .collect(20)
//!         .await?;
//!
//!     for message in &messages {
//!         println!("{} <{}>: {:?}", message.sender_name, message.sender_email, message.links);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`classifier`] - Envelope decoding and message classification
//! - [`cli`] - Command-line interface and session orchestration
//! - [`client`] - Mailbox transport trait and IMAP implementation
//! - [`config`] - Configuration management
//! - [`display`] - Candidate table and diagnostic dump rendering
//! - [`error`] - Error types and result aliases
//! - [`exclusions`] - Skip list and sender exclusion lookups
//! - [`interactive`] - Operator command loop
//! - [`links`] - Unsubscribe link extraction
//! - [`models`] - Core data structures
//! - [`opener`] - Launching links in a browser
//! - [`report`] - Notices and fetch progress
//! - [`scanner`] - Batched candidate fetching
//! - [`state`] - Persisted skip list and resolved history

pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod exclusions;
pub mod interactive;
pub mod links;
pub mod models;
pub mod opener;
pub mod report;
pub mod scanner;
pub mod state;

// Re-export commonly used types for convenience
pub use error::{Result, UnsubError};

// Core data models
pub use models::{ClassifiedMessage, Envelope, Verdict};

// Collaborator traits and their implementations
pub use client::{ImapTransport, MailboxTransport};
pub use display::{Presenter, TerminalPresenter};
pub use interactive::{CommandSource, InquirePrompt, ReviewSession, SessionSummary};
pub use links::{LinkExtractor, RegexLinkExtractor};
pub use opener::{LinkOpener, SystemOpener};
pub use report::{NullReporter, Reporter};
pub use state::{FileState, HistoryMap, MemoryState, PersistentState};

// Fetching
pub use scanner::{BatchFetcher, FetchCursor, FetchPhase};

// Config types
pub use config::{Config, MailboxConfig, ServerSettings, SessionConfig};

// CLI types (for binary usage)
pub use cli::{Cli, ProgressReporter};
