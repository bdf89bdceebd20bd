//! Batched retrieval of unsubscribe candidates
//!
//! The fetcher walks the mailbox from the newest message backwards, one
//! bounded batch at a time, until it has collected the requested number of
//! unique messages from senders the operator has not dealt with yet, or the
//! mailbox runs out. A failure scoped to one message skips it; losing the
//! mailbox ends the fetch early with the candidates found so far.
//!
//! ```text
//! Idle -> Fetching -> Filtering -> Accumulating -> Done
//!            ^                          |
//!            +--------- continue -------+
//! ```

use std::collections::{BTreeSet, HashSet};
use std::ops::Range;
use tracing::{debug, info, warn};

use crate::classifier::{classify, parse_envelope};
use crate::client::MailboxTransport;
use crate::error::Result;
use crate::exclusions::{ExclusionReason, SenderExclusions};
use crate::links::LinkExtractor;
use crate::models::{ClassifiedMessage, Verdict};
use crate::report::Reporter;

/// Position of the fetch within the message pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchCursor {
    /// Number of messages the search matched
    pub pool_size: usize,
    /// Messages already scanned, counted from the newest
    pub offset: usize,
    /// Unique messages still needed
    pub remaining: usize,
}

impl FetchCursor {
    pub fn new(pool_size: usize, target: usize) -> Self {
        Self {
            pool_size,
            offset: 0,
            remaining: target,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.remaining.min(self.pool_size.saturating_sub(self.offset))
    }

    /// Indices (oldest-first pool order) of the next batch
    ///
    /// The batch sits immediately before the window already scanned.
    pub fn next_window(&self) -> Range<usize> {
        let end = self.pool_size.saturating_sub(self.offset);
        let start = end - self.batch_size();
        start..end
    }

    /// Record a finished batch
    pub fn advance(&mut self, batch_size: usize, accepted: usize, target: usize) {
        self.offset += batch_size;
        self.remaining = target.saturating_sub(accepted);
    }
}

/// Whether the fetch loop has finished
pub fn is_done(accepted: usize, target: usize, offset: usize, pool_size: usize) -> bool {
    accepted >= target || offset >= pool_size
}

/// States of the fetch loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPhase {
    Idle,
    Fetching,
    /// Message ids of the current batch, newest first
    Filtering(Vec<String>),
    /// Size of the batch just filtered
    Accumulating(usize),
    Done,
}

/// Session-scoped deduplication and sender gating
#[derive(Debug)]
pub struct AcceptedSet<'a> {
    exclusions: &'a SenderExclusions,
    subjects: HashSet<String>,
    accepted: Vec<ClassifiedMessage>,
}

impl<'a> AcceptedSet<'a> {
    pub fn new(exclusions: &'a SenderExclusions) -> Self {
        Self {
            exclusions,
            subjects: HashSet::new(),
            accepted: Vec::new(),
        }
    }

    /// Checks that need only the envelope, in order: subject, then sender
    pub fn screen(&self, subject: &str, sender_email: &str) -> Option<Verdict> {
        if self.subjects.contains(subject) {
            return Some(Verdict::DuplicateSubject);
        }
        match self.exclusions.reason(sender_email) {
            Some(ExclusionReason::Skipped) => Some(Verdict::Skipped),
            Some(ExclusionReason::Resolved) => Some(Verdict::Resolved),
            None => None,
        }
    }

    fn has_same_sender_and_links(&self, sender_email: &str, links: &BTreeSet<String>) -> bool {
        self.accepted
            .iter()
            .any(|m| m.sender_email == sender_email && &m.links == links)
    }

    /// Apply every rule and keep the message if it passes
    pub fn offer(&mut self, message: ClassifiedMessage) -> Verdict {
        if let Some(verdict) = self.screen(&message.subject, &message.sender_email) {
            return verdict;
        }
        if self.has_same_sender_and_links(&message.sender_email, &message.links) {
            return Verdict::DuplicateLinks;
        }
        self.subjects.insert(message.subject.clone());
        self.accepted.push(message);
        Verdict::Accepted
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    /// Sorted by sender display name, at most `target` entries
    pub fn into_results(self, target: usize) -> Vec<ClassifiedMessage> {
        let mut results = self.accepted;
        results.sort_by(|a, b| a.sender_name.cmp(&b.sender_name));
        results.truncate(target);
        results
    }
}

/// Drives the batched fetch loop against a mailbox
pub struct BatchFetcher<'a> {
    transport: &'a mut dyn MailboxTransport,
    extractor: &'a dyn LinkExtractor,
    exclusions: &'a SenderExclusions,
    reporter: &'a dyn Reporter,
    criteria: String,
}

impl<'a> BatchFetcher<'a> {
    pub fn new(
        transport: &'a mut dyn MailboxTransport,
        extractor: &'a dyn LinkExtractor,
        exclusions: &'a SenderExclusions,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            transport,
            extractor,
            exclusions,
            reporter,
            criteria: "ALL".to_string(),
        }
    }

    /// Search criteria defining the pool (IMAP syntax for the IMAP transport)
    pub fn with_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.criteria = criteria.into();
        self
    }

    /// Collect up to `target` unique, unresolved messages
    pub async fn collect(&mut self, target: usize) -> Result<Vec<ClassifiedMessage>> {
        let ids = self.transport.search(&self.criteria).await?;
        let mut cursor = FetchCursor::new(ids.len(), target);
        let mut accepted = AcceptedSet::new(self.exclusions);
        let mut phase = FetchPhase::Idle;

        info!(
            "Mailbox holds {} messages, looking for {} candidates",
            ids.len(),
            target
        );

        loop {
            phase = match phase {
                FetchPhase::Idle => {
                    self.reporter.fetch_started(cursor.pool_size, target);
                    if is_done(0, target, cursor.offset, cursor.pool_size) {
                        FetchPhase::Done
                    } else {
                        FetchPhase::Fetching
                    }
                }
                FetchPhase::Fetching => {
                    let window = cursor.next_window();
                    debug!(
                        "Fetching batch of {} (pool offset {}, {} still needed)",
                        window.len(),
                        cursor.offset,
                        cursor.remaining
                    );
                    self.reporter.batch_started(window.len());
                    FetchPhase::Filtering(ids[window].iter().rev().cloned().collect())
                }
                FetchPhase::Filtering(batch) => {
                    let mut next = FetchPhase::Accumulating(batch.len());
                    for (scanned, id) in batch.iter().enumerate() {
                        if let Err(e) = self.process(id, &mut accepted).await {
                            warn!("Stopping fetch at message {}: {}", id, e);
                            self.reporter.warning(&format!(
                                "Mailbox unavailable ({}); keeping the {} candidates found so far",
                                e,
                                accepted.len()
                            ));
                            cursor.advance(scanned, accepted.len(), target);
                            next = FetchPhase::Done;
                            break;
                        }
                        self.reporter.message_processed(accepted.len());
                    }
                    next
                }
                FetchPhase::Accumulating(batch_size) => {
                    cursor.advance(batch_size, accepted.len(), target);
                    if is_done(accepted.len(), target, cursor.offset, cursor.pool_size) {
                        FetchPhase::Done
                    } else {
                        FetchPhase::Fetching
                    }
                }
                FetchPhase::Done => break,
            };
        }

        info!(
            "Collected {} candidates after scanning {} of {} messages",
            accepted.len(),
            cursor.offset,
            cursor.pool_size
        );
        self.reporter.fetch_finished(accepted.len());
        Ok(accepted.into_results(target))
    }

    /// Retrieve and filter one message
    ///
    /// Per-message failures are reported and swallowed; any other error is
    /// returned and ends the fetch.
    async fn process(&mut self, id: &str, accepted: &mut AcceptedSet<'_>) -> Result<()> {
        match self.evaluate(id, accepted).await {
            Ok(verdict) => {
                debug!("Message {}: {:?}", id, verdict);
                Ok(())
            }
            Err(e) if e.is_per_message() => {
                warn!("Skipping message {}: {}", id, e);
                self.reporter
                    .warning(&format!("Could not process message {}: {}", id, e));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn evaluate(&mut self, id: &str, accepted: &mut AcceptedSet<'_>) -> Result<Verdict> {
        let raw = self.transport.fetch(id).await?;
        let parsed = mailparse::parse_mail(&raw)?;
        let envelope = parse_envelope(&parsed)?;

        if let Some(verdict) = accepted.screen(&envelope.subject, &envelope.sender_email) {
            return Ok(verdict);
        }

        let message = classify(id, envelope, &parsed, raw.clone(), self.extractor);
        Ok(accepted.offer(message))
    }
}
