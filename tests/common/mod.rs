//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use inbox_unsubscribe::client::MailboxTransport;
use inbox_unsubscribe::display::Presenter;
use inbox_unsubscribe::error::{Result, UnsubError};
use inbox_unsubscribe::interactive::CommandSource;
use inbox_unsubscribe::models::ClassifiedMessage;
use inbox_unsubscribe::opener::LinkOpener;
use inbox_unsubscribe::report::Reporter;
use mockall::mock;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Mutex;

/// Build a raw RFC 822 message
///
/// With `html` the message is multipart/alternative with a plain-text and
/// an HTML part; without it, a single plain-text part.
pub fn raw_message(
    from: &str,
    subject: &str,
    list_unsubscribe: Option<&str>,
    html: Option<&str>,
) -> Vec<u8> {
    let mut raw = String::new();
    raw.push_str(&format!("From: {}\r\n", from));
    raw.push_str("To: me@gmail.com\r\n");
    raw.push_str(&format!("Subject: {}\r\n", subject));
    raw.push_str("Date: Mon, 1 Jan 2024 10:00:00 -0800\r\n");
    if let Some(value) = list_unsubscribe {
        raw.push_str(&format!("List-Unsubscribe: {}\r\n", value));
    }
    raw.push_str("MIME-Version: 1.0\r\n");

    match html {
        Some(html) => {
            raw.push_str("Content-Type: multipart/alternative; boundary=\"BOUNDARY\"\r\n\r\n");
            raw.push_str("--BOUNDARY\r\n");
            raw.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
            raw.push_str("Plain text version\r\n");
            raw.push_str("--BOUNDARY\r\n");
            raw.push_str("Content-Type: text/html; charset=utf-8\r\n\r\n");
            raw.push_str(html);
            raw.push_str("\r\n--BOUNDARY--\r\n");
        }
        None => {
            raw.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
            raw.push_str("Hello there\r\n");
        }
    }

    raw.into_bytes()
}

/// A newsletter carrying one unsubscribe link in its header
pub fn newsletter(from: &str, subject: &str, link: &str) -> Vec<u8> {
    raw_message(from, subject, Some(&format!("<{}>", link)), None)
}

/// A message with neither header nor HTML links
pub fn plain_message(from: &str, subject: &str) -> Vec<u8> {
    raw_message(from, subject, None, None)
}

/// Build an accepted entry directly
pub fn classified(index: usize, name: &str, email: &str, links: &[&str]) -> ClassifiedMessage {
    ClassifiedMessage {
        id: index.to_string(),
        subject: format!("Subject {}", index),
        sender_name: name.to_string(),
        sender_email: email.to_string(),
        links: links.iter().map(|l| l.to_string()).collect::<BTreeSet<_>>(),
        raw: plain_message(&format!("{} <{}>", name, email), &format!("Subject {}", index)),
    }
}

/// In-memory mailbox; ids are "1".."n", oldest first
#[derive(Debug, Default)]
pub struct InMemoryMailbox {
    messages: Vec<Vec<u8>>,
    failing: HashSet<String>,
    timing_out: HashSet<String>,
    disconnect_at: Option<String>,
    disconnected: bool,
    pub fetched: Vec<String>,
    pub searches: Vec<String>,
    pub logged_out: bool,
}

impl InMemoryMailbox {
    pub fn new(messages: Vec<Vec<u8>>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// Fetching `id` fails with a per-message error
    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    /// Fetching `id` misses its deadline
    pub fn timing_out(mut self, id: &str) -> Self {
        self.timing_out.insert(id.to_string());
        self
    }

    /// The connection drops when `id` is fetched and stays down
    pub fn disconnecting_at(mut self, id: &str) -> Self {
        self.disconnect_at = Some(id.to_string());
        self
    }
}

#[async_trait]
impl MailboxTransport for InMemoryMailbox {
    async fn search(&mut self, criteria: &str) -> Result<Vec<String>> {
        self.searches.push(criteria.to_string());
        Ok((1..=self.messages.len()).map(|i| i.to_string()).collect())
    }

    async fn fetch(&mut self, id: &str) -> Result<Vec<u8>> {
        self.fetched.push(id.to_string());
        if self.disconnect_at.as_deref() == Some(id) {
            self.disconnected = true;
        }
        if self.disconnected {
            return Err(UnsubError::NetworkError("connection closed".to_string()));
        }
        if self.timing_out.contains(id) {
            return Err(UnsubError::Timeout {
                operation: format!("fetch {}", id),
                secs: 30,
            });
        }
        if self.failing.contains(id) {
            return Err(UnsubError::FetchError {
                id: id.to_string(),
                message: "connection reset".to_string(),
            });
        }
        let index: usize = id
            .parse()
            .map_err(|_| UnsubError::Unknown(format!("bad id {}", id)))?;
        index
            .checked_sub(1)
            .and_then(|i| self.messages.get(i))
            .cloned()
            .ok_or_else(|| UnsubError::FetchError {
                id: id.to_string(),
                message: "no such message".to_string(),
            })
    }

    async fn logout(&mut self) -> Result<()> {
        self.logged_out = true;
        Ok(())
    }
}

/// Reporter that keeps everything it is told
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub notices: Mutex<Vec<String>>,
    pub warnings: Mutex<Vec<String>>,
    pub batches: Mutex<Vec<usize>>,
    pub finished: Mutex<Option<usize>>,
}

impl RecordingReporter {
    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }

    fn warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn batch_started(&self, batch_size: usize) {
        self.batches.lock().unwrap().push(batch_size);
    }

    fn fetch_finished(&self, accepted: usize) {
        *self.finished.lock().unwrap() = Some(accepted);
    }
}

/// Presenter that records which views were requested
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub tables: Mutex<usize>,
    pub raw_shown: Mutex<Vec<String>>,
}

impl RecordingPresenter {
    pub fn raw_shown(&self) -> Vec<String> {
        self.raw_shown.lock().unwrap().clone()
    }
}

impl Presenter for RecordingPresenter {
    fn show_table(&self, _messages: &[ClassifiedMessage]) {
        *self.tables.lock().unwrap() += 1;
    }

    fn show_raw(&self, message: &ClassifiedMessage) {
        self.raw_shown.lock().unwrap().push(message.id.clone());
    }
}

/// Feeds prepared lines, then reports closed input
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl CommandSource for ScriptedInput {
    fn next_command(&mut self) -> Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

// Mock implementation of LinkOpener for testing
mock! {
    pub Opener {}

    impl LinkOpener for Opener {
        fn open(&self, url: &str) -> Result<()>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_message_parses() {
        let raw = raw_message(
            "Shop <news@shop.com>",
            "Deals",
            Some("<https://shop.com/u>"),
            Some("<a href=\"https://shop.com/u2\">Unsubscribe</a>"),
        );
        let parsed = mailparse::parse_mail(&raw).unwrap();
        assert_eq!(parsed.subparts.len(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_mailbox() {
        let mut mailbox = InMemoryMailbox::new(vec![plain_message("a@x.com", "One")]).failing("2");
        assert_eq!(mailbox.search("ALL").await.unwrap(), vec!["1"]);
        assert!(mailbox.fetch("1").await.is_ok());
        assert!(mailbox.fetch("2").await.is_err());
    }

    #[tokio::test]
    async fn test_disconnected_mailbox_stays_down() {
        let mut mailbox = InMemoryMailbox::new(vec![
            plain_message("a@x.com", "One"),
            plain_message("b@x.com", "Two"),
        ])
        .disconnecting_at("2");
        assert!(mailbox.fetch("2").await.is_err());
        assert!(matches!(
            mailbox.fetch("1").await,
            Err(UnsubError::NetworkError(_))
        ));
    }
}
