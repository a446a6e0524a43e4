//! Server-Sent Events framing
//!
//! Each notification becomes one event block:
//!
//! ```text
//! data: {"id":"n1","type":"alert",...}\n
//! \n
//! ```
//!
//! serde_json never emits a raw newline (they are escaped inside strings),
//! so the JSON always fits on a single `data:` line.

use bytes::{BufMut, Bytes, BytesMut};

use crate::bus::Notification;

/// Response headers that open an event stream (names in lowercase wire form)
pub const STREAM_HEADERS: [(&str, &str); 3] = [
    ("content-type", "text/event-stream"),
    ("cache-control", "no-cache"),
    ("connection", "keep-alive"),
];

const DATA_PREFIX: &[u8] = b"data: ";
const TERMINATOR: &[u8] = b"\n\n";

/// Encode one notification as a complete event block
pub fn encode_event(notification: &Notification) -> Result<Bytes, serde_json::Error> {
    let mut buf = BytesMut::with_capacity(128);
    buf.put_slice(DATA_PREFIX);
    serde_json::to_writer((&mut buf).writer(), notification)?;
    buf.put_slice(TERMINATOR);
    Ok(buf.freeze())
}

/// Incremental decoder for the client side of an event stream
///
/// Feed raw bytes with [`push`](Self::push) and pull complete events with
/// [`next_event`](Self::next_event). Comment lines and blocks without a
/// `data:` field are skipped.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buf: BytesMut,
}

impl EventDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes received but not yet part of a complete event
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Decode the next complete event, if one is buffered
    pub fn next_event(&mut self) -> Option<Result<Notification, serde_json::Error>> {
        loop {
            let end = self
                .buf
                .windows(TERMINATOR.len())
                .position(|w| w == TERMINATOR)?;
            let block = self.buf.split_to(end + TERMINATOR.len());

            let mut data = Vec::new();
            for line in block[..end].split(|&b| b == b'\n') {
                if let Some(rest) = line.strip_prefix(b"data:") {
                    if !data.is_empty() {
                        data.push(b'\n');
                    }
                    data.extend_from_slice(rest.strip_prefix(b" ").unwrap_or(rest));
                }
            }

            if !data.is_empty() {
                return Some(serde_json::from_slice(&data));
            }
        }
    }
}
