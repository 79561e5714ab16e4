//! Message-file codec.
//!
//! A message is one markdown file whose name encodes chronology and
//! identity (`{YYYYMMDDTHHMMSS}-{sender}-{id}.md`, lexicographic order ==
//! chronological order) and whose content is a flat `key: value` header
//! block between `---` marker lines, a blank line, then the body.
//!
//! The format is the interoperability boundary shared by every client, so
//! both directions must stay bit-exact.  All functions here are pure.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rand::Rng;
use regex::Regex;

use crate::constants::{
    FILENAME_TIMESTAMP_FORMAT, HEADER_DATE_FORMAT, HEADER_DELIMITER, MESSAGE_ID_LEN,
    RESERVED_FILENAMES,
};
use crate::error::CodecError;
use crate::message::Message;
use crate::types::MessageId;

/// The three segments of a message filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameParts {
    /// `YYYYMMDDTHHMMSS`, UTC.
    pub timestamp: String,
    /// Lowercase alphanumeric sender segment.
    pub sender: String,
    /// Lowercase alphanumeric id segment.
    pub id: String,
}

impl FilenameParts {
    /// Reassemble the canonical filename.
    pub fn to_filename(&self) -> String {
        format!("{}-{}-{}.md", self.timestamp, self.sender, self.id)
    }
}

fn filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Extension and the `T` separator are case-insensitive; everything
        // else is strict.
        Regex::new(r"^(\d{8}[Tt]\d{6})-([a-z0-9]+)-([a-z0-9]+)\.(?i:md)$")
            .expect("filename pattern is valid")
    })
}

/// Parse a directory entry name against the message filename grammar.
///
/// Returns `None` for anything that is not a message: dotfiles, the
/// reserved directory documents (`schema.md`, `agent.md`, `readme.md`,
/// case-insensitive), and any name that does not match the grammar.
pub fn parse_filename(filename: &str) -> Option<FilenameParts> {
    if filename.starts_with('.') {
        return None;
    }
    if RESERVED_FILENAMES.contains(&filename.to_ascii_lowercase().as_str()) {
        return None;
    }
    let caps = filename_re().captures(filename)?;
    Some(FilenameParts {
        timestamp: caps[1].to_string(),
        sender: caps[2].to_string(),
        id: caps[3].to_string(),
    })
}

/// True if the entry name denotes a message file.
pub fn is_message_filename(filename: &str) -> bool {
    parse_filename(filename).is_some()
}

const ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Freshly generated lowercase-alphanumeric id segment.  Uniqueness per
/// call is probabilistic; no dedup check is performed.
fn random_id() -> String {
    let mut rng = rand::thread_rng();
    (0..MESSAGE_ID_LEN)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect()
}

/// Encode a new message into its `(filename, document)` pair.
///
/// The sender is lowercased, the timestamp rendered in UTC, and the body
/// trimmed.  Each call draws a fresh random id segment.
///
/// The sender must lowercase to a pure alphanumeric segment; anything
/// else would produce a filename outside the grammar, a file every client
/// silently ignores.  Tags must survive the `tags: [..]` header form.
pub fn encode(
    sender: &str,
    body: &str,
    reply_to: Option<&str>,
    tags: &[String],
    now: DateTime<Utc>,
) -> Result<(String, String), CodecError> {
    let sender = sender.to_lowercase();
    if sender.is_empty() || !sender.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()) {
        return Err(CodecError::InvalidSender(sender));
    }
    for tag in tags {
        if tag.trim().is_empty() || tag.contains(['[', ']', ',', '\n']) {
            return Err(CodecError::InvalidTag(tag.clone()));
        }
    }

    let filename = format!(
        "{}-{}-{}.md",
        now.format(FILENAME_TIMESTAMP_FORMAT),
        sender,
        random_id()
    );
    let document = render_document(&sender, now, reply_to, tags, None, body);
    Ok((filename, document))
}

/// Re-encode an existing message with a new body and an `edited` stamp.
/// The filename (and therefore the id and creation order) is unchanged.
pub fn encode_edited(message: &Message, new_body: &str, edited_at: DateTime<Utc>) -> String {
    render_document(
        &message.sender,
        message.created_at,
        message.reply_to.as_deref(),
        &message.tags,
        Some(edited_at),
        new_body,
    )
}

fn render_document(
    sender: &str,
    created_at: DateTime<Utc>,
    reply_to: Option<&str>,
    tags: &[String],
    edited_at: Option<DateTime<Utc>>,
    body: &str,
) -> String {
    let mut doc = String::new();
    doc.push_str(HEADER_DELIMITER);
    doc.push('\n');
    doc.push_str(&format!("from: {sender}\n"));
    doc.push_str(&format!("date: {}\n", created_at.format(HEADER_DATE_FORMAT)));
    if let Some(reply) = reply_to {
        doc.push_str(&format!("reply_to: {reply}\n"));
    }
    if !tags.is_empty() {
        doc.push_str(&format!("tags: [{}]\n", tags.join(", ")));
    }
    if let Some(edited) = edited_at {
        doc.push_str(&format!("edited: {}\n", edited.format(HEADER_DATE_FORMAT)));
    }
    doc.push_str(HEADER_DELIMITER);
    doc.push('\n');
    doc.push('\n');
    doc.push_str(body.trim());
    doc
}

/// Decode a message file into a [`Message`].
///
/// The `version_token` of the result is `None`; the sync layer fills it in
/// from the remote response that carried the content.
pub fn decode(filename: &str, document: &str) -> Result<Message, CodecError> {
    // The delimiter only counts as a whole marker line; `---` inside a
    // header value never terminates the header.
    let rest = document
        .strip_prefix(HEADER_DELIMITER)
        .and_then(|r| r.strip_prefix('\n'))
        .ok_or(CodecError::MalformedHeader)?;
    let (header, body) = match rest.split_once("\n---\n") {
        Some((header, body)) => (header, body),
        None => (
            rest.strip_suffix("\n---").ok_or(CodecError::MalformedHeader)?,
            "",
        ),
    };

    let fields = parse_header(header);

    let sender = fields
        .get("from")
        .ok_or(CodecError::MissingField("from"))?
        .clone();
    let date_raw = fields.get("date").ok_or(CodecError::MissingField("date"))?;
    let created_at = parse_timestamp(date_raw)?;

    // An unparseable `edited` stamp is dropped rather than failing the
    // whole decode.
    let edited_at = fields
        .get("edited")
        .and_then(|raw| parse_timestamp(raw).ok());

    let reply_to = fields.get("reply_to").cloned();
    let tags = fields.get("tags").map(|raw| parse_tags(raw)).unwrap_or_default();

    Ok(Message {
        id: MessageId(stem(filename).to_string()),
        filename: filename.to_string(),
        sender,
        created_at,
        reply_to,
        tags,
        edited_at,
        body: body.trim().to_string(),
        version_token: None,
    })
}

/// Filename with its extension stripped.
fn stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => filename,
    }
}

/// Deliberately restrictive header parser: one `key: value` per line,
/// `#`-prefixed and blank lines ignored, surrounding quotes stripped from
/// values.  No multi-line or nested values; a field needing such structure
/// is malformed by definition.
fn parse_header(header: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for line in header.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            fields.insert(key.trim().to_string(), unquote(value.trim()).to_string());
        }
    }
    fields
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Parse a header timestamp: ISO-8601 with fractional seconds, then
/// without, then the fixed UTC-only fallback.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CodecError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, HEADER_DATE_FORMAT) {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    Err(CodecError::InvalidDate(raw.to_string()))
}

/// Normalize a `tags` value -- either a bracketed list or a bare
/// comma-separated string -- into an ordered set of trimmed, non-empty
/// strings.
fn parse_tags(raw: &str) -> Vec<String> {
    let inner = raw.trim();
    let inner = inner
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(inner);

    let mut tags: Vec<String> = Vec::new();
    for part in inner.split(',') {
        let tag = part.trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}
