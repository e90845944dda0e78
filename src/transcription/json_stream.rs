/*!
 * Incremental JSON object framing over an unframed text stream.
 *
 * The recognition service sends JSON objects as text, but a single object may
 * arrive split across several frames and several objects may arrive in one
 * frame. `JsonStreamBuffer` tracks brace depth (ignoring braces inside string
 * literals) as text is appended and hands back each top-level object as soon
 * as its closing brace arrives.
 */

use log::warn;

use crate::errors::MalformedMessage;

/// Largest single object accepted before the pending text is discarded
pub const DEFAULT_MAX_PENDING_BYTES: usize = 1024 * 1024;

/// One item produced by the scanner
#[derive(Debug, Clone, PartialEq)]
pub enum ScannedItem {
    /// A structurally complete top-level object
    Object(String),
    /// Text that can never become part of an object
    Malformed(MalformedMessage),
}

/// Accumulates text and yields complete top-level JSON objects.
///
/// After every `push` the buffer holds at most one partially received object
/// (or nothing). Text between objects that is not whitespace is reported as
/// malformed and discarded.
#[derive(Debug)]
pub struct JsonStreamBuffer {
    pending: String,
    // Scan state for `pending`; appended text is never rescanned
    depth: usize,
    in_string: bool,
    escaped: bool,
    max_pending: usize,
}

impl JsonStreamBuffer {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_PENDING_BYTES)
    }

    /// Create a buffer that gives up on objects larger than `max_pending` bytes
    pub fn with_limit(max_pending: usize) -> Self {
        Self {
            pending: String::new(),
            depth: 0,
            in_string: false,
            escaped: false,
            max_pending,
        }
    }

    /// True when no partial object is being held
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Text of the partial object currently held
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Drop any partial object
    pub fn clear(&mut self) {
        self.pending.clear();
        self.reset_scan();
    }

    /// Append a fragment and return every item it completes, in order
    pub fn push(&mut self, fragment: &str) -> Vec<ScannedItem> {
        let mut items = Vec::new();
        let mut rest = fragment;

        while !rest.is_empty() {
            if self.depth == 0 {
                // Between objects: skip whitespace, reject anything but '{'
                let trimmed = rest.trim_start();
                if trimmed.is_empty() {
                    break;
                }
                match trimmed.find('{') {
                    Some(0) => rest = trimmed,
                    Some(start) => {
                        items.push(ScannedItem::Malformed(MalformedMessage::new(
                            "text outside of a JSON object",
                            trimmed[..start].trim_end(),
                        )));
                        rest = &trimmed[start..];
                    }
                    None => {
                        items.push(ScannedItem::Malformed(MalformedMessage::new(
                            "text outside of a JSON object",
                            trimmed.trim_end(),
                        )));
                        break;
                    }
                }
            }

            match self.scan(rest) {
                Some(consumed) => {
                    self.pending.push_str(&rest[..consumed]);
                    items.push(ScannedItem::Object(std::mem::take(&mut self.pending)));
                    self.reset_scan();
                    rest = &rest[consumed..];
                }
                None => {
                    self.pending.push_str(rest);
                    break;
                }
            }
        }

        if self.pending.len() > self.max_pending {
            warn!(
                "Pending recognition message exceeded {} bytes; discarding it",
                self.max_pending
            );
            items.push(ScannedItem::Malformed(MalformedMessage::new(
                "object exceeds size limit",
                &self.pending,
            )));
            self.clear();
        }

        items
    }

    /// Advance the scan state over `text`; returns the byte length up to and
    /// including the brace that closes the current object, if present.
    fn scan(&mut self, text: &str) -> Option<usize> {
        for (i, c) in text.char_indices() {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if c == '\\' {
                    self.escaped = true;
                } else if c == '"' {
                    self.in_string = false;
                }
                continue;
            }

            match c {
                '"' => self.in_string = true,
                '{' | '[' => self.depth += 1,
                '}' | ']' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return Some(i + c.len_utf8());
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn reset_scan(&mut self) {
        self.depth = 0;
        self.in_string = false;
        self.escaped = false;
    }
}

impl Default for JsonStreamBuffer {
    fn default() -> Self {
        Self::new()
    }
}
