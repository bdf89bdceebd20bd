//! Envelope decoding and message classification

use crate::error::{Result, UnsubError};
use crate::links::LinkExtractor;
use crate::models::{ClassifiedMessage, Envelope};
use mailparse::{MailAddr, MailHeaderMap, ParsedMail};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static ANGLE_ADDR: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([^<>]*)>").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Decode subject and sender from a parsed message
pub fn parse_envelope(message: &ParsedMail<'_>) -> Result<Envelope> {
    let headers = &message.headers;

    let subject = headers
        .get_first_value("Subject")
        .map(|s| normalize_text(&s))
        .unwrap_or_default();

    let from_header = headers
        .get_first_header("From")
        .ok_or_else(|| UnsubError::InvalidMessageFormat("missing From header".to_string()))?;

    let (sender_email, sender_name) = match mailparse::addrparse_header(from_header) {
        Ok(list) => first_mailbox(list.into_inner())
            .unwrap_or_else(|| fallback_sender(&from_header.get_value())),
        Err(_) => fallback_sender(&from_header.get_value()),
    };

    if sender_email.is_empty() {
        return Err(UnsubError::InvalidMessageFormat(
            "empty From header".to_string(),
        ));
    }

    let sender_name = sender_name
        .map(|n| normalize_text(&n))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| sender_email.clone());

    Ok(Envelope {
        subject,
        sender_name,
        sender_email,
    })
}

/// Run the extractor and build the classified record
pub fn classify(
    id: &str,
    envelope: Envelope,
    message: &ParsedMail<'_>,
    raw: Vec<u8>,
    extractor: &dyn LinkExtractor,
) -> ClassifiedMessage {
    let links = extractor.extract(message);
    if links.is_empty() {
        debug!(
            "Message {} from {} has no unsubscribe links",
            id, envelope.sender_email
        );
    }
    envelope.into_classified(id.to_string(), links, raw)
}

fn first_mailbox(addresses: Vec<MailAddr>) -> Option<(String, Option<String>)> {
    addresses.into_iter().find_map(|address| match address {
        MailAddr::Single(single) => Some((single.addr, single.display_name)),
        MailAddr::Group(group) => group
            .addrs
            .into_iter()
            .next()
            .map(|single| (single.addr, single.display_name)),
    })
}

/// Best effort split of a From value the address parser rejected
fn fallback_sender(value: &str) -> (String, Option<String>) {
    match ANGLE_ADDR.captures(value).and_then(|caps| caps.get(1)) {
        Some(addr) => {
            let name = ANGLE_ADDR.replace_all(value, "");
            let name = name.trim().trim_matches('"').trim();
            let name = (!name.is_empty()).then(|| name.to_string());
            (addr.as_str().trim().to_string(), name)
        }
        None => (value.trim().to_string(), None),
    }
}

fn normalize_text(value: &str) -> String {
    WHITESPACE.replace_all(value.trim(), " ").into_owned()
}
