//! DATA body encoding: dot-stuffing and line ending normalization.

/// Streaming encoder for the DATA phase (RFC 5321 section 4.5.2).
///
/// Bare LF becomes CRLF, a `.` at the start of a line is doubled, and
/// [`DotStuffer::finish`] appends the `.` terminator line. State carries
/// across calls so input may be split anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DotStuffer {
    state: State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// At the beginning of a line.
    LineStart,
    /// Inside a line.
    Text,
    /// Just saw a CR.
    Cr,
}

impl Default for DotStuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DotStuffer {
    /// Creates an encoder positioned at the start of the body.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: State::LineStart,
        }
    }

    /// Encodes `input`, appending the wire bytes to `out`.
    pub fn encode(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.reserve(input.len() + input.len() / 64 + 2);
        for &b in input {
            match (self.state, b) {
                (State::LineStart, b'.') => {
                    out.extend_from_slice(b"..");
                    self.state = State::Text;
                }
                (State::Cr, b'\n') => {
                    out.push(b'\n');
                    self.state = State::LineStart;
                }
                (_, b'\n') => {
                    out.extend_from_slice(b"\r\n");
                    self.state = State::LineStart;
                }
                (_, b'\r') => {
                    out.push(b'\r');
                    self.state = State::Cr;
                }
                (_, other) => {
                    out.push(other);
                    self.state = State::Text;
                }
            }
        }
    }

    /// Terminates the body: completes a partial last line and appends `.\r\n`.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        match self.state {
            State::LineStart => {}
            State::Cr => out.push(b'\n'),
            State::Text => out.extend_from_slice(b"\r\n"),
        }
        out.extend_from_slice(b".\r\n");
        self.state = State::LineStart;
    }
}
