//! Field extraction from parsed messages.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use mail_parser::decoders::html::html_to_text;
use mail_parser::{Address, Message, MimeHeaders, PartType};
use regex::Regex;

use crate::mailbox::clean::clean_text;
use crate::mailbox::{Direction, MailCategory, MailRecord};

fn backslash_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\+").expect("static backslash regex"))
}

/// Extract email addresses from an optional address header.
///
/// Returns an empty vec if the header is absent.
pub fn extract_addresses(addr: Option<&Address>) -> Vec<String> {
    let Some(addr) = addr else {
        return Vec::new();
    };
    match addr {
        Address::List(addrs) => addrs
            .iter()
            .filter_map(|a| a.address.as_ref().map(|s| s.to_string()))
            .collect(),
        Address::Group(groups) => groups
            .iter()
            .flat_map(|g| {
                g.addresses
                    .iter()
                    .filter_map(|a| a.address.as_ref().map(|s| s.to_string()))
            })
            .collect(),
    }
}

/// Every From/To/Cc/Bcc address, de-duplicated and sorted, joined by `", "`.
pub fn all_recipients(message: &Message) -> String {
    let addresses: BTreeSet<String> = [message.from(), message.to(), message.cc(), message.bcc()]
        .into_iter()
        .flat_map(extract_addresses)
        .collect();
    addresses.into_iter().collect::<Vec<_>>().join(", ")
}

/// Category from the raw `X-Gmail-Labels` header value.
pub fn categorize(labels: &str) -> MailCategory {
    let labels = labels.to_lowercase();
    if labels.contains("spam") {
        MailCategory::Spam
    } else if labels.contains("category_promotions") {
        MailCategory::Promotions
    } else if labels.contains("category_social") {
        MailCategory::Social
    } else if labels.contains("category_updates") {
        MailCategory::Updates
    } else {
        MailCategory::Inbox
    }
}

/// `Sent` when the raw labels mention it (case-sensitive).
pub fn direction(labels: &str) -> Direction {
    if labels.contains("Sent") {
        Direction::Sent
    } else {
        Direction::Received
    }
}

fn is_plain_or_html(part: &mail_parser::MessagePart) -> bool {
    match part.content_type() {
        None => true,
        Some(ct) => {
            ct.ctype().eq_ignore_ascii_case("text")
                && ct
                    .subtype()
                    .is_none_or(|s| s.eq_ignore_ascii_case("plain") || s.eq_ignore_ascii_case("html"))
        }
    }
}

fn collect_text(message: &Message, out: &mut Vec<String>) {
    let single_part = message.parts.len() == 1;
    for part in &message.parts {
        match &part.body {
            PartType::Text(text) | PartType::Html(text) if single_part || is_plain_or_html(part) => {
                out.push(html_to_text(text));
            }
            PartType::Message(nested) => collect_text(nested, out),
            PartType::Binary(raw) | PartType::InlineBinary(raw) if single_part => {
                out.push(html_to_text(&String::from_utf8_lossy(raw)));
            }
            _ => {}
        }
    }
}

/// Readable body text: every plain/HTML part stripped to text and joined,
/// with backslash runs and whitespace collapsed to single spaces.
pub fn extract_body(message: &Message) -> String {
    let mut parts = Vec::new();
    collect_text(message, &mut parts);
    let joined = parts.join(" ");
    let unslashed = backslash_runs().replace_all(&joined, " ");
    unslashed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// RFC 3339 date, the raw header when it does not parse, empty when absent.
fn message_time(message: &Message) -> String {
    message
        .date()
        .map(|d| d.to_rfc3339())
        .or_else(|| message.header_raw("Date").map(|raw| raw.trim().to_string()))
        .unwrap_or_default()
}

/// Build the cleaned record for one message.
pub fn to_record(message: &Message) -> MailRecord {
    let labels = message.header_raw("X-Gmail-Labels").unwrap_or_default();
    MailRecord {
        time: message_time(message),
        recipients: clean_text(&all_recipients(message)),
        subject: clean_text(message.subject().unwrap_or_default()),
        body: clean_text(&extract_body(message)),
        category: categorize(labels),
        direction: direction(labels),
        prediction: None,
    }
}
