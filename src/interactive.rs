//! Interactive review of the collected candidates
//!
//! The operator picks entries by index from the table:
//!
//! - `<index>` opens the entry's links, or shows the raw message when it has none
//! - `<index>-skip` puts the sender on the permanent skip list
//! - `<index>-done` records the sender as resolved, then opens the links
//! - `exit` ends the session

use std::fmt;
use tracing::{debug, info, warn};

use crate::display::Presenter;
use crate::error::{Result, UnsubError};
use crate::models::ClassifiedMessage;
use crate::opener::LinkOpener;
use crate::report::Reporter;
use crate::state::{HistoryUpdate, PersistentState};

const PROMPT: &str =
    "Select an email index to open the unsubscribe link (or type 'exit' to quit)";

/// One parsed line of operator input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Exit,
    Open(usize),
    Skip(usize),
    Done(usize),
    Invalid,
}

/// Parse a line of input against a list of `len` entries
pub fn parse_command(input: &str, len: usize) -> Command {
    let input = input.trim();
    if input.eq_ignore_ascii_case("exit") {
        return Command::Exit;
    }

    let (index, suffix) = match input.split_once('-') {
        Some((index, suffix)) => (index, Some(suffix)),
        None => (input, None),
    };

    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return Command::Invalid;
    }
    let index = match index.parse::<usize>() {
        Ok(i) if i < len => i,
        _ => return Command::Invalid,
    };

    match suffix {
        None => Command::Open(index),
        Some(s) if s.eq_ignore_ascii_case("skip") => Command::Skip(index),
        Some(s) if s.eq_ignore_ascii_case("done") => Command::Done(index),
        Some(_) => Command::Invalid,
    }
}

/// Source of operator input lines
pub trait CommandSource {
    /// Next line, or `None` once input is closed
    fn next_command(&mut self) -> Result<Option<String>>;
}

/// Reads commands from the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct InquirePrompt;

impl CommandSource for InquirePrompt {
    fn next_command(&mut self) -> Result<Option<String>> {
        match inquire::Text::new(PROMPT).prompt() {
            Ok(line) => Ok(Some(line)),
            Err(inquire::InquireError::OperationCanceled)
            | Err(inquire::InquireError::OperationInterrupted) => Ok(None),
            Err(e) => Err(UnsubError::Unknown(format!("Prompt failed: {}", e))),
        }
    }
}

/// What the operator did during a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub links_opened: usize,
    pub senders_skipped: usize,
    pub senders_resolved: usize,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} link(s) opened, {} sender(s) skipped, {} sender(s) marked done",
            self.links_opened, self.senders_skipped, self.senders_resolved
        )
    }
}

/// Command loop over an accepted result list
pub struct ReviewSession<'a> {
    messages: &'a [ClassifiedMessage],
    operator: &'a str,
    state: &'a dyn PersistentState,
    opener: &'a dyn LinkOpener,
    presenter: &'a dyn Presenter,
    reporter: &'a dyn Reporter,
    summary: SessionSummary,
}

impl<'a> ReviewSession<'a> {
    pub fn new(
        messages: &'a [ClassifiedMessage],
        operator: &'a str,
        state: &'a dyn PersistentState,
        opener: &'a dyn LinkOpener,
        presenter: &'a dyn Presenter,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            messages,
            operator,
            state,
            opener,
            presenter,
            reporter,
            summary: SessionSummary::default(),
        }
    }

    /// Loop until `exit` or until input closes
    pub fn run(&mut self, input: &mut dyn CommandSource) -> Result<SessionSummary> {
        info!("Reviewing {} candidates for {}", self.messages.len(), self.operator);

        loop {
            let Some(line) = input.next_command()? else {
                debug!("Input closed, ending session");
                break;
            };

            match parse_command(&line, self.messages.len()) {
                Command::Exit => break,
                Command::Open(i) => self.open(i),
                Command::Skip(i) => self.skip(i),
                Command::Done(i) => self.done(i),
                Command::Invalid => {
                    debug!("Invalid input {:?}", line);
                    self.reporter.warning("Invalid choice. Try again.");
                }
            }
        }

        self.reporter.notice("Goodbye!");
        Ok(self.summary)
    }

    fn open(&mut self, index: usize) {
        let messages = self.messages;
        let message = &messages[index];
        if !message.has_links() {
            self.reporter
                .warning("No unsubscribe links found for this email.");
            self.presenter.show_raw(message);
            return;
        }
        self.open_links(message);
    }

    fn skip(&mut self, index: usize) {
        let messages = self.messages;
        let address = &messages[index].sender_email;
        match self.state.append_skip(address) {
            Ok(()) => {
                self.summary.senders_skipped += 1;
                self.reporter
                    .notice(&format!("{} added to the skip list", address));
            }
            Err(e) => {
                warn!("Failed to add {} to skip list: {}", address, e);
                self.reporter
                    .warning(&format!("Could not add {} to the skip list: {}", address, e));
            }
        }
    }

    fn done(&mut self, index: usize) {
        let messages = self.messages;
        let message = &messages[index];
        if !message.has_links() {
            self.reporter.warning(&format!(
                "No unsubscribe links found for this email; {} was not marked done",
                message.sender_email
            ));
            return;
        }

        match self.state.add_history(self.operator, &message.sender_email) {
            Ok(HistoryUpdate::Added) => {
                self.summary.senders_resolved += 1;
                self.reporter
                    .notice(&format!("{} marked as done", message.sender_email));
            }
            Ok(HistoryUpdate::AlreadyPresent) => {
                self.reporter
                    .notice(&format!("{} was already marked as done", message.sender_email));
            }
            Err(e) => {
                warn!("Failed to record {} as done: {}", message.sender_email, e);
                self.reporter.warning(&format!(
                    "Could not record {} as done: {}",
                    message.sender_email, e
                ));
            }
        }

        self.open_links(message);
    }

    fn open_links(&mut self, message: &ClassifiedMessage) {
        for link in &message.links {
            self.reporter
                .notice(&format!("Opening unsubscribe link: {}", link));
            match self.opener.open(link) {
                Ok(()) => self.summary.links_opened += 1,
                Err(e) => {
                    warn!("{}", e);
                    self.reporter.warning(&e.to_string());
                }
            }
        }
    }
}
