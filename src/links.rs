//! Unsubscribe link extraction
//!
//! Links come from two places: the `List-Unsubscribe` header and anchors in
//! HTML body parts. Both are scanned with regular expressions; the result is
//! best-effort and never fails on malformed markup.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use mailparse::body::Body;
use mailparse::{MailHeaderMap, ParsedMail};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::debug;

/// Bracketed targets in a List-Unsubscribe header
static HEADER_TARGET: Lazy<Regex> = Lazy::new(|| Regex::new(r"<\s*([^<>]+?)\s*>").unwrap());

/// `<a ... href="URL" ...>TEXT</a>`, case-insensitive, non-greedy text
static ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a\s*>"#).unwrap()
});

static HTTP_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^https?://\S+$").unwrap());

/// Anchor text that marks a link as an unsubscribe action
const TEXT_MARKERS: [&str; 2] = ["unsubscribe", "click here"];

/// Finds candidate unsubscribe URLs in a parsed message
pub trait LinkExtractor: Send + Sync {
    fn extract(&self, message: &ParsedMail<'_>) -> BTreeSet<String>;
}

/// Regex-based extractor over the header and HTML parts
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexLinkExtractor;

impl RegexLinkExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl LinkExtractor for RegexLinkExtractor {
    fn extract(&self, message: &ParsedMail<'_>) -> BTreeSet<String> {
        let mut links = BTreeSet::new();

        if let Some(header) = message.headers.get_first_value("List-Unsubscribe") {
            links.extend(links_from_header(&header));
        }

        visit_html_parts(message, &mut |html| links.extend(links_from_html(html)));

        links
    }
}

/// Extract http(s) targets from a List-Unsubscribe header value
pub fn links_from_header(value: &str) -> Vec<String> {
    HEADER_TARGET
        .captures_iter(value)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|url| is_http(url))
        .collect()
}

/// Extract unsubscribe-looking anchors from an HTML document
pub fn links_from_html(html: &str) -> Vec<String> {
    ANCHOR
        .captures_iter(html)
        .filter_map(|caps| {
            let url = normalize_url(caps.get(1)?.as_str());
            let text = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            if is_http(&url) && is_unsubscribe_anchor(&url, text) {
                Some(url)
            } else {
                None
            }
        })
        .collect()
}

fn is_unsubscribe_anchor(url: &str, text: &str) -> bool {
    let text = text.to_lowercase();
    TEXT_MARKERS.iter().any(|marker| text.contains(marker))
        || url.to_lowercase().contains("unsubscribe")
}

pub fn is_http(url: &str) -> bool {
    HTTP_SCHEME.is_match(url)
}

fn normalize_url(url: &str) -> String {
    url.trim().replace("&amp;", "&")
}

/// Walk the part tree and hand every decoded text/html body to `visit`
fn visit_html_parts(part: &ParsedMail<'_>, visit: &mut dyn FnMut(&str)) {
    if part.ctype.mimetype.eq_ignore_ascii_case("text/html") {
        visit(&decode_lossy(part));
    }
    for sub in &part.subparts {
        visit_html_parts(sub, visit);
    }
}

/// Tolerates stray symbols, missing padding and a cut-off final group
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Body as text; undecodable bytes are replaced rather than rejected
pub(crate) fn decode_lossy(part: &ParsedMail<'_>) -> String {
    if let Ok(body) = part.get_body() {
        return body;
    }
    let bytes = match part.get_body_raw() {
        Ok(raw) => raw,
        Err(e) => {
            debug!("Decoding {} part leniently: {}", part.ctype.mimetype, e);
            match part.get_body_encoded() {
                Body::Base64(body) => lenient_base64(body.get_raw()),
                Body::QuotedPrintable(body) => body.get_raw().to_vec(),
                Body::SevenBit(body) | Body::EightBit(body) => body.get_raw().to_vec(),
                Body::Binary(body) => body.get_raw().to_vec(),
            }
        }
    };
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Decode what survives of a damaged base64 body
fn lenient_base64(encoded: &[u8]) -> Vec<u8> {
    let mut symbols: Vec<u8> = encoded
        .iter()
        .copied()
        .filter(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'/')
        .collect();
    // A lone symbol in the last group carries no whole byte
    if symbols.len() % 4 == 1 {
        symbols.pop();
    }
    LENIENT_BASE64.decode(&symbols).unwrap_or_default()
}
