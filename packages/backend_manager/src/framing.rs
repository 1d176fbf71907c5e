//! Reply framing for the MPD line protocol.
//!
//! A reply is a run of lines terminated by `OK`, `ACK [...]` or, right after
//! connecting, the `OK MPD <version>` greeting. Each complete reply becomes a
//! single message so that one command maps to one inbound item.

/// Accumulates lines until a reply terminator is seen.
#[derive(Debug, Default)]
pub struct ReplyFramer {
    pending: String,
}

impl ReplyFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `line` ends a reply.
    pub fn is_terminator(line: &str) -> bool {
        line == "OK" || line.starts_with("OK MPD ") || line.starts_with("ACK ")
    }

    /// Feed one line (without its trailing newline). Returns the raw reply
    /// text, newline-terminated, once the line completes a reply.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        self.pending.push_str(line);
        self.pending.push('\n');
        if Self::is_terminator(line) {
            Some(std::mem::take(&mut self.pending))
        } else {
            None
        }
    }

    /// Take whatever partial reply is buffered (e.g. when the transport
    /// closes mid-reply).
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

/// Decode one raw line read from the socket, stripping `\n` / `\r\n`.
pub(crate) fn decode_line(raw: &[u8]) -> Result<&str, std::str::Utf8Error> {
    let mut end = raw.len();
    while end > 0 && matches!(raw[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    std::str::from_utf8(&raw[..end])
}
