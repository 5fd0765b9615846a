use std::fmt;

use super::headers;
use super::heartbeat::Heartbeat;
use crate::error::{LinkError, Result};

/// STOMP frame commands (client and server).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "CONNECTED" => Command::Connected,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "ACK" => Command::Ack,
            "NACK" => Command::Nack,
            "DISCONNECT" => Command::Disconnect,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            _ => return None,
        })
    }

    /// CONNECT and CONNECTED headers are never escaped (STOMP 1.2 §Value Encoding).
    /// STOMP is the 1.2 spelling of CONNECT and follows the same rule.
    fn escapes_headers(self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame.
///
/// Headers keep their wire order; when a header repeats, the first
/// occurrence is the one that counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// CONNECT frame carrying the bearer token and the requested heartbeat.
    pub fn connect(host: &str, token: Option<&str>, heartbeat: Heartbeat) -> Self {
        let mut frame = Frame::new(Command::Connect)
            .header(headers::ACCEPT_VERSION, super::ACCEPT_VERSION)
            .header(headers::HOST, host)
            .header(headers::HEART_BEAT, heartbeat.to_header());
        if let Some(token) = token {
            frame = frame.header(headers::AUTHORIZATION, format!("Bearer {}", token));
        }
        frame
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header(headers::ID, id)
            .header(headers::DESTINATION, destination)
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header(headers::ID, id)
    }

    pub fn send(destination: &str, json_body: impl Into<String>) -> Self {
        Frame::new(Command::Send)
            .header(headers::DESTINATION, destination)
            .header(headers::CONTENT_TYPE, "application/json")
            .body(json_body)
    }

    pub fn disconnect() -> Self {
        Frame::new(Command::Disconnect)
    }

    pub fn destination(&self) -> Option<&str> {
        self.get_header(headers::DESTINATION)
    }

    /// Human-readable error text of an ERROR frame.
    pub fn error_message(&self) -> String {
        match self.get_header(headers::MESSAGE) {
            Some(msg) if !self.body.trim().is_empty() => format!("{}: {}", msg, self.body.trim()),
            Some(msg) => msg.to_string(),
            None => self.body.trim().to_string(),
        }
    }

    /// Serialize to wire text, NUL-terminated. A `content-length` header is
    /// added for non-empty bodies unless one is already present.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.get_header(headers::CONTENT_LENGTH).is_none() {
            out.push_str(headers::CONTENT_LENGTH);
            out.push(':');
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(LinkError::ProtocolError(format!(
                    "Invalid header escape sequence '\\{}'",
                    other.map(String::from).unwrap_or_default()
                )))
            },
        }
    }
    Ok(out)
}

/// Largest frame the decoder will buffer, headers and body included.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Streaming decoder for STOMP text received over the WebSocket.
///
/// A WebSocket message may hold a partial frame, one frame, several frames,
/// or only heartbeat EOLs; the decoder buffers until a full frame is present.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Decode the next complete frame, `Ok(None)` if more input is needed.
    ///
    /// Input that cannot become a frame within [`MAX_FRAME_BYTES`] is a
    /// protocol error.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.decode()? {
            None if self.buffer.len() > MAX_FRAME_BYTES => Err(LinkError::ProtocolError(format!(
                "Incomplete frame exceeds {} bytes",
                MAX_FRAME_BYTES
            ))),
            decoded => Ok(decoded),
        }
    }

    fn decode(&mut self) -> Result<Option<Frame>> {
        let skipped = self
            .buffer
            .bytes()
            .take_while(|b| *b == b'\n' || *b == b'\r')
            .count();
        if skipped > 0 {
            self.buffer.drain(..skipped);
        }
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let bytes = self.buffer.as_bytes();
        let mut pos = 0;

        let command_line = match read_line(bytes, &mut pos) {
            Some(line) => line,
            None => return Ok(None),
        };
        let command = Command::parse(command_line).ok_or_else(|| {
            LinkError::ProtocolError(format!("Unknown STOMP command '{}'", command_line))
        })?;

        let mut raw_headers = Vec::new();
        loop {
            let line = match read_line(bytes, &mut pos) {
                Some(line) => line,
                None => return Ok(None),
            };
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                LinkError::ProtocolError(format!("Malformed STOMP header line '{}'", line))
            })?;
            raw_headers.push((name.to_string(), value.to_string()));
        }

        let body_start = pos;
        let content_length = raw_headers
            .iter()
            .find(|(k, _)| k == headers::CONTENT_LENGTH)
            .map(|(_, v)| {
                v.trim().parse::<usize>().map_err(|_| {
                    LinkError::ProtocolError(format!("Invalid content-length '{}'", v))
                })
            })
            .transpose()?;

        let body_end = match content_length {
            Some(len) => {
                let end = body_start
                    .checked_add(len)
                    .filter(|end| *end <= MAX_FRAME_BYTES)
                    .ok_or_else(|| {
                        LinkError::ProtocolError(format!(
                            "content-length {} exceeds the {} byte frame limit",
                            len, MAX_FRAME_BYTES
                        ))
                    })?;
                if bytes.len() <= end {
                    return Ok(None);
                }
                if bytes[end] != 0 {
                    return Err(LinkError::ProtocolError(
                        "Frame body is not terminated by NUL after content-length bytes".to_string(),
                    ));
                }
                end
            },
            None => match bytes[body_start..].iter().position(|b| *b == 0) {
                Some(offset) => body_start + offset,
                None => return Ok(None),
            },
        };

        let body = std::str::from_utf8(&bytes[body_start..body_end])
            .map_err(|e| LinkError::ProtocolError(format!("Frame body is not UTF-8: {}", e)))?
            .to_string();

        let headers = if command.escapes_headers() {
            raw_headers
                .into_iter()
                .map(|(k, v)| Ok((unescape_header(&k)?, unescape_header(&v)?)))
                .collect::<Result<Vec<_>>>()?
        } else {
            raw_headers
        };

        self.buffer.drain(..=body_end);
        Ok(Some(Frame {
            command,
            headers,
            body,
        }))
    }
}

/// Read one line (without `\n` / `\r\n`) starting at `pos`.
fn read_line<'a>(bytes: &'a [u8], pos: &mut usize) -> Option<&'a str> {
    let rest = &bytes[*pos..];
    let newline = rest.iter().position(|b| *b == b'\n')?;
    let mut line = &rest[..newline];
    if line.last() == Some(&b'\r') {
        line = &line[..line.len() - 1];
    }
    *pos += newline + 1;
    // Frames arrive as `&str`, and '\n' / '\r' are ASCII, so the line is valid UTF-8.
    std::str::from_utf8(line).ok()
}
