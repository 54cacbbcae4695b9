//! Line framing and prompt synchronization
//!
//! The instrument answers each command with zero or more data lines followed
//! by a prompt line. Only the `=>` prompt means the command was accepted;
//! `!>` and `?>` are emitted in other states and count as "not in step".

use log::{debug, error};
use std::time::{Duration, Instant};

use crate::transport::InstrumentTransport;
use crate::types::CalError;

/// Prompt glyphs the firmware prints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// `!>`
    Ready,
    /// `=>`, the only one that acknowledges a command
    Ok,
    /// `?>`
    Query,
}

impl Prompt {
    pub fn glyph(&self) -> &'static str {
        match self {
            Prompt::Ready => "!>",
            Prompt::Ok => "=>",
            Prompt::Query => "?>",
        }
    }

    pub fn from_line(line: &str) -> Option<Self> {
        match line {
            "!>" => Some(Prompt::Ready),
            "=>" => Some(Prompt::Ok),
            "?>" => Some(Prompt::Query),
            _ => None,
        }
    }
}

/// Classification of one received line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Prompt(Prompt),
    Data(String),
}

impl LineKind {
    pub fn classify(line: &str) -> Self {
        match Prompt::from_line(line) {
            Some(p) => LineKind::Prompt(p),
            None => LineKind::Data(line.to_string()),
        }
    }
}

/// One line as read off the wire, terminator stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    /// The read ended on the timeout rather than on a newline
    pub timed_out: bool,
}

impl Line {
    /// Timed out with nothing received at all
    pub fn is_silent(&self) -> bool {
        self.timed_out && self.text.is_empty()
    }
}

/// Owns the transport and turns its byte stream into lines.
pub struct PromptSync<T: InstrumentTransport> {
    transport: T,
    pending: Vec<u8>,
    read_timeout: Duration,
    prompt_seen: bool,
    last_prompt: Option<Prompt>,
}

impl<T: InstrumentTransport> PromptSync<T> {
    const CHUNK: usize = 64;
    const RESYNC_MAX_LINES: usize = 16;

    pub fn new(transport: T, read_timeout: Duration) -> Self {
        Self {
            transport,
            pending: Vec::new(),
            read_timeout,
            prompt_seen: false,
            last_prompt: None,
        }
    }

    /// Whether the last prompt check saw `=>`
    pub fn prompt_seen(&self) -> bool {
        self.prompt_seen
    }

    /// Glyph of the line the last prompt check consumed, if it was one
    pub fn last_prompt(&self) -> Option<Prompt> {
        self.last_prompt
    }

    /// Read one line and report whether it was the `=>` prompt.
    ///
    /// Anything else, including the other two glyphs and a timed-out read,
    /// is discarded and yields `false`. Only a transport failure is an error.
    pub fn wait_for_prompt(&mut self) -> Result<bool, CalError> {
        let line = self.read_line()?;
        self.last_prompt = Prompt::from_line(&line.text);
        let ok = self.last_prompt == Some(Prompt::Ok);
        if !ok {
            debug!("Expected prompt, got {:?} (timed out: {})", line.text, line.timed_out);
        }
        self.prompt_seen = ok;
        Ok(ok)
    }

    /// Discard lines until `=>` or until the instrument goes quiet.
    ///
    /// Used after an exchange ended mid-response, so the leftovers of the
    /// previous answer are not taken as the reply to the next command.
    /// Returns the number of lines thrown away.
    pub fn resync(&mut self) -> Result<usize, CalError> {
        let mut discarded = 0;
        while discarded < Self::RESYNC_MAX_LINES {
            let line = self.read_line()?;
            if line.is_silent() {
                break;
            }
            if Prompt::from_line(&line.text) == Some(Prompt::Ok) {
                self.prompt_seen = true;
                self.last_prompt = Some(Prompt::Ok);
                break;
            }
            debug!("Discarding stale line {:?}", line.text);
            discarded += 1;
        }
        Ok(discarded)
    }

    /// Read up to the next `\n` or until the read timeout elapses.
    ///
    /// Bytes past the newline stay buffered for the next call.
    pub fn read_line(&mut self) -> Result<Line, CalError> {
        let deadline = Instant::now() + self.read_timeout;
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = self.pending.drain(..=pos).collect();
                let line = Line {
                    text: strip_terminator(&raw),
                    timed_out: false,
                };
                debug!("Received line: {:?}", line.text);
                return Ok(line);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(self.flush_partial());
            }

            let mut chunk = [0u8; Self::CHUNK];
            let timeout_ms = remaining.as_millis().clamp(1, u32::MAX as u128) as u32;
            let n = self.transport.read(&mut chunk, timeout_ms).map_err(|e| {
                error!("Read error: {:?}", e);
                CalError::Transport(format!("{:?}", e))
            })?;
            if n == 0 {
                return Ok(self.flush_partial());
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }

    /// Write `command` followed by `\n`, retrying short writes
    pub fn send_line(&mut self, command: &str) -> Result<(), CalError> {
        debug!("Sending command: {:?}", command);
        let mut frame = Vec::with_capacity(command.len() + 1);
        frame.extend_from_slice(command.as_bytes());
        frame.push(b'\n');

        let mut sent = 0;
        while sent < frame.len() {
            let n = self.transport.write(&frame[sent..]).map_err(|e| {
                error!("Write error: {:?}", e);
                CalError::Transport(format!("{:?}", e))
            })?;
            if n == 0 {
                return Err(CalError::Transport("transport accepted no bytes".into()));
            }
            sent += n;
        }
        Ok(())
    }

    /// Drop whatever is waiting in the input buffers
    pub fn clear_input(&mut self) -> Result<(), CalError> {
        self.pending.clear();
        self.transport
            .clear_input()
            .map_err(|e| CalError::Transport(format!("{:?}", e)))
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn flush_partial(&mut self) -> Line {
        let raw = std::mem::take(&mut self.pending);
        let line = Line {
            text: strip_terminator(&raw),
            timed_out: true,
        };
        debug!("Read timed out with {:?}", line.text);
        line
    }
}

fn strip_terminator(raw: &[u8]) -> String {
    let end = raw
        .iter()
        .rposition(|&b| b != b'\r' && b != b'\n')
        .map_or(0, |i| i + 1);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
