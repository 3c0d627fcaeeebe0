//! Content-type and charset resolution for fetched bodies.
//!
//! Upstream `Content-Type` headers are routinely missing, malformed, or
//! charset-less. Resolution goes header first, then falls back to sniffing
//! the leading bytes of the body; a missing charset is backfilled by a second
//! sniff so the HTML path knows how to decode the document.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentTypeError {
    #[error("malformed content-type MIME type")]
    MalformedMime,
    #[error("couldn't parse provided or detected content-type of document")]
    Unknown,
}

/// Resolved identity of a fetched body: MIME type plus parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDescriptor {
    /// MIME top-level type, lower-cased (e.g. "text").
    pub primary: String,
    /// MIME sub-level type, lower-cased (e.g. "html").
    pub subtype: String,
    /// Extra parameters such as `charset`, keys and values lower-cased.
    pub parameters: HashMap<String, String>,
}

impl ContentDescriptor {
    pub fn is_html(&self) -> bool {
        self.primary == "text" && self.subtype == "html"
    }

    pub fn is_css(&self) -> bool {
        self.primary == "text" && self.subtype == "css"
    }

    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset").map(String::as_str)
    }
}

/// Resolve a descriptor from the header value, falling back to sniffing, and
/// backfill a missing charset from a second sniff.
///
/// A failed charset backfill is non-fatal: the descriptor comes back without
/// one and the caller serves the body unrewritten.
pub fn resolve(header: Option<&str>, body: &[u8]) -> Result<ContentDescriptor, ContentTypeError> {
    let mut descriptor = match header.and_then(|h| parse(h).ok()) {
        Some(descriptor) => descriptor,
        None => sniff(body).ok_or(ContentTypeError::Unknown)?,
    };

    if descriptor.charset().is_none() {
        if let Some(charset) = sniff(body).and_then(|d| d.charset().map(str::to_string)) {
            descriptor.parameters.insert("charset".to_string(), charset);
        } else {
            tracing::debug!("no charset declared or sniffed, body will be served unrewritten");
        }
    }

    Ok(descriptor)
}

/// Parse a MIME header value into a descriptor.
///
/// The value is lower-cased, the MIME type split from its parameters on the
/// first space (or `;` when no space is present), and parameters split on `;`
/// then `=`. Malformed parameter pairs are skipped, not fatal.
pub fn parse(raw: &str) -> Result<ContentDescriptor, ContentTypeError> {
    let lower = raw.to_ascii_lowercase();
    let lower = lower.trim();

    let (mime, params) = match lower.split_once(' ') {
        Some((mime, params)) => (mime.trim_end_matches(';'), Some(params)),
        None => match lower.split_once(';') {
            Some((mime, params)) => (mime, Some(params)),
            None => (lower, None),
        },
    };
    // Header forms like "text/html;charset=x extra" glue parameters onto the
    // MIME token; peel them off.
    let (mime, glued) = match mime.split_once(';') {
        Some((mime, glued)) => (mime, Some(glued)),
        None => (mime, None),
    };

    let (primary, subtype) = mime.split_once('/').ok_or(ContentTypeError::MalformedMime)?;
    if primary.is_empty() || subtype.is_empty() {
        return Err(ContentTypeError::MalformedMime);
    }

    let mut parameters = HashMap::new();
    for part in [glued, params].into_iter().flatten() {
        for pair in part.split(';') {
            if let Some((key, value)) = pair.split_once('=') {
                let (key, value) = (key.trim(), value.trim());
                if !key.is_empty() {
                    parameters.insert(key.to_string(), value.to_string());
                }
            }
        }
    }

    Ok(ContentDescriptor {
        primary: primary.to_string(),
        subtype: subtype.to_string(),
        parameters,
    })
}

/// HTML tag openers checked by the sniffer. Each must be followed by a space
/// or `>` to count as markup.
const HTML_TAGS: &[&str] = &[
    "<!doctype html", "<html", "<head", "<script", "<iframe", "<h1", "<div", "<font", "<table",
    "<a", "<style", "<title", "<b", "<body", "<br", "<p",
];

/// Infer a descriptor from the leading bytes of `body`.
///
/// Distinguishes HTML markup, CSS at-rules, printable text, and binary data.
/// Returns `None` only for an empty body.
pub fn sniff(body: &[u8]) -> Option<ContentDescriptor> {
    if body.is_empty() {
        return None;
    }

    if body.starts_with(&[0xfe, 0xff]) {
        return Some(text_descriptor("plain", "utf-16be"));
    }
    if body.starts_with(&[0xff, 0xfe]) {
        return Some(text_descriptor("plain", "utf-16le"));
    }
    let body = body.strip_prefix(&[0xef, 0xbb, 0xbf]).unwrap_or(body);

    let head = &body[..body.len().min(512)];
    let trimmed = trim_ascii_start(head);

    if let Ok(text) = std::str::from_utf8(trimmed) {
        let lower = text.to_ascii_lowercase();
        for tag in HTML_TAGS {
            if let Some(rest) = lower.strip_prefix(tag) {
                if matches!(rest.as_bytes().first(), Some(b' ') | Some(b'>')) {
                    return Some(text_descriptor("html", "utf-8"));
                }
            }
        }
        if lower.starts_with("<!--") {
            return Some(text_descriptor("html", "utf-8"));
        }
        if lower.starts_with("@charset ") || lower.starts_with("@import ") {
            return Some(ContentDescriptor {
                primary: "text".to_string(),
                subtype: "css".to_string(),
                parameters: HashMap::new(),
            });
        }
    }

    if head.iter().all(|&b| !is_binary_byte(b)) && std::str::from_utf8(head).is_ok() {
        return Some(text_descriptor("plain", "utf-8"));
    }

    Some(ContentDescriptor {
        primary: "application".to_string(),
        subtype: "octet-stream".to_string(),
        parameters: HashMap::new(),
    })
}

fn text_descriptor(subtype: &str, charset: &str) -> ContentDescriptor {
    ContentDescriptor {
        primary: "text".to_string(),
        subtype: subtype.to_string(),
        parameters: HashMap::from([("charset".to_string(), charset.to_string())]),
    }
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// Control bytes that never appear in plain text.
fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f)
}
