//! Records passed from the fetcher to the review session

use std::collections::BTreeSet;

/// A message accepted by the fetcher, ready for operator review
#[derive(Debug, Clone)]
pub struct ClassifiedMessage {
    /// Transport identifier the message was fetched under
    pub id: String,
    pub subject: String,
    pub sender_name: String,
    pub sender_email: String,
    /// Deduplicated http(s) unsubscribe targets
    pub links: BTreeSet<String>,
    /// Raw RFC 822 bytes, kept for the diagnostic dump
    pub raw: Vec<u8>,
}

impl ClassifiedMessage {
    pub fn has_links(&self) -> bool {
        !self.links.is_empty()
    }
}

/// Decoded header fields of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub subject: String,
    pub sender_name: String,
    pub sender_email: String,
}

impl Envelope {
    pub fn into_classified(
        self,
        id: String,
        links: BTreeSet<String>,
        raw: Vec<u8>,
    ) -> ClassifiedMessage {
        ClassifiedMessage {
            id,
            subject: self.subject,
            sender_name: self.sender_name,
            sender_email: self.sender_email,
            links,
            raw,
        }
    }
}

/// Why a fetched message did or did not make it into the result list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Accepted,
    /// Same subject as an entry accepted earlier this session
    DuplicateSubject,
    /// Sender is on the permanent skip list
    Skipped,
    /// Sender was already resolved by this operator
    Resolved,
    /// Same sender and identical link set as an accepted entry
    DuplicateLinks,
}
