//! Terminal rendering of the candidate table and the diagnostic dump

use crossterm::style::Stylize;
use mailparse::ParsedMail;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::links::decode_lossy;
use crate::models::ClassifiedMessage;

const NO_LINKS: &str = "No links found";
const MAX_SENDER_WIDTH: usize = 30;
const MAX_EMAIL_WIDTH: usize = 40;

/// Pure view over the session's messages
pub trait Presenter: Send + Sync {
    /// The numbered candidate table, indices starting at 0
    fn show_table(&self, messages: &[ClassifiedMessage]);

    /// Headers and body tails of a message that yielded no links
    fn show_raw(&self, message: &ClassifiedMessage);
}

/// Prints to stdout with crossterm colours
#[derive(Debug, Clone)]
pub struct TerminalPresenter {
    dump_tail_chars: usize,
}

impl TerminalPresenter {
    pub fn new(dump_tail_chars: usize) -> Self {
        Self { dump_tail_chars }
    }
}

impl Default for TerminalPresenter {
    fn default() -> Self {
        Self::new(500)
    }
}

impl Presenter for TerminalPresenter {
    fn show_table(&self, messages: &[ClassifiedMessage]) {
        println!();
        println!("{}", format_table(messages, true));
    }

    fn show_raw(&self, message: &ClassifiedMessage) {
        let dump = match RawDump::from_bytes(&message.raw, self.dump_tail_chars) {
            Ok(dump) => dump,
            Err(e) => {
                println!("{}", format!("Message {} cannot be parsed: {}", message.id, e).red());
                return;
            }
        };

        println!("{}", "--- Debugging Information ---".cyan());
        println!("{}", "Headers:".cyan());
        for (key, value) in &dump.headers {
            println!("{}: {}", key.as_str().yellow(), value);
        }
        println!("{}", "Body Content:".cyan());
        for part in &dump.parts {
            println!(
                "{}",
                format!("{} (last {} characters):", part.mimetype, self.dump_tail_chars).green()
            );
            println!("{}", part.tail);
        }
    }
}

/// Title line, e.g. "Emails with Unsubscribe Links (3/4)"
pub fn table_title(messages: &[ClassifiedMessage]) -> String {
    let with_links = messages.iter().filter(|m| m.has_links()).count();
    format!(
        "Emails with Unsubscribe Links ({}/{})",
        with_links,
        messages.len()
    )
}

/// Box-drawn table; one line per link, continuation lines leave the
/// other columns blank
///
/// Columns are sized in terminal cells, so wide characters keep the
/// borders aligned.
pub fn format_table(messages: &[ClassifiedMessage], styled: bool) -> String {
    let headers = ["Index", "Sender", "Email", "Unsubscribe Links"];

    let rows: Vec<[String; 3]> = messages
        .iter()
        .enumerate()
        .map(|(idx, m)| {
            [
                idx.to_string(),
                truncate_str(&m.sender_name, MAX_SENDER_WIDTH),
                truncate_str(&m.sender_email, MAX_EMAIL_WIDTH),
            ]
        })
        .collect();

    let mut widths = headers.map(|h| h.width());
    for (row, message) in rows.iter().zip(messages) {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.width());
        }
        let link_width = message
            .links
            .iter()
            .map(|l| l.width())
            .max()
            .unwrap_or(NO_LINKS.len());
        widths[3] = widths[3].max(link_width);
    }

    let rule = |left: &str, mid: &str, right: &str| {
        let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{}{}{}", left, segments.join(mid), right)
    };
    let pad = |cell: &str, width: usize| {
        format!("{}{}", cell, " ".repeat(width.saturating_sub(cell.width())))
    };

    let mut lines = Vec::new();
    let title = table_title(messages);
    lines.push(if styled {
        title.bold().to_string()
    } else {
        title
    });
    lines.push(rule("┌", "┬", "┐"));
    let header_cells: Vec<String> = headers
        .iter()
        .zip(widths.iter())
        .map(|(h, w)| pad(*h, *w))
        .collect();
    lines.push(format!("│ {} │", header_cells.join(" │ ")));
    lines.push(rule("├", "┼", "┤"));

    for (row, message) in rows.iter().zip(messages) {
        let mut link_cells: Vec<String> = message
            .links
            .iter()
            .map(|link| pad(link.as_str(), widths[3]))
            .collect();
        if link_cells.is_empty() {
            let cell = pad(NO_LINKS, widths[3]);
            link_cells.push(if styled { cell.red().to_string() } else { cell });
        }

        for (n, link_cell) in link_cells.iter().enumerate() {
            let lead: Vec<String> = if n == 0 {
                row.iter().zip(widths.iter()).map(|(c, w)| pad(c.as_str(), *w)).collect()
            } else {
                widths[..3].iter().map(|w| " ".repeat(*w)).collect()
            };
            lines.push(format!("│ {} │ {} │", lead.join(" │ "), link_cell));
        }
    }
    lines.push(rule("└", "┴", "┘"));

    lines.join("\n")
}

/// One text part of the diagnostic dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpPart {
    pub mimetype: String,
    pub tail: String,
}

/// Everything the diagnostic view shows for a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDump {
    pub headers: Vec<(String, String)>,
    pub parts: Vec<DumpPart>,
}

impl RawDump {
    pub fn from_bytes(raw: &[u8], tail_chars: usize) -> Result<Self, mailparse::MailParseError> {
        let parsed = mailparse::parse_mail(raw)?;
        Ok(Self::from_parsed(&parsed, tail_chars))
    }

    pub fn from_parsed(message: &ParsedMail<'_>, tail_chars: usize) -> Self {
        let headers = message
            .headers
            .iter()
            .map(|h| (h.get_key(), h.get_value()))
            .collect();

        let mut parts = Vec::new();
        collect_text_parts(message, tail_chars, &mut parts);
        Self { headers, parts }
    }

    /// Value of the first header named `key`, case-insensitive
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

fn collect_text_parts(part: &ParsedMail<'_>, tail_chars: usize, out: &mut Vec<DumpPart>) {
    let mimetype = part.ctype.mimetype.to_ascii_lowercase();
    if part.subparts.is_empty() {
        if mimetype == "text/plain" || mimetype == "text/html" {
            let body = decode_lossy(part);
            out.push(DumpPart {
                mimetype,
                tail: tail(&body, tail_chars),
            });
        }
        return;
    }
    for sub in &part.subparts {
        collect_text_parts(sub, tail_chars, out);
    }
}

/// Last `n` characters of `s`
pub fn tail(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}

/// Truncate a string to fit within max_width terminal cells
fn truncate_str(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let budget = max_width.saturating_sub(3);
    let mut used = 0;
    let kept: String = s
        .chars()
        .take_while(|ch| {
            used += ch.width().unwrap_or(0);
            used <= budget
        })
        .collect();
    format!("{}...", kept)
}
