//! Dot-stuffing transparency for message bodies
//!
//! While a body is in transfer a line holding a single `.` ends the message,
//! so senders double the leading dot of any content line that starts with
//! one. Decoding strips exactly one leading dot again.

use std::io::BufRead;

use crate::smtp::error::SmtpError;

/// Read one line, dropping the trailing `\n` or `\r\n`.
///
/// Returns `Ok(false)` once the stream ends. A trailing fragment without a
/// line break counts as end of stream.
pub fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> Result<bool, SmtpError> {
    buf.clear();
    reader.read_until(b'\n', buf)?;
    if buf.pop() != Some(b'\n') {
        return Ok(false);
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(true)
}

/// Remove one leading dot from a body line, if present
pub fn unstuff(line: &[u8]) -> &[u8] {
    line.strip_prefix(b".").unwrap_or(line)
}

/// Read a dot-terminated body from `reader` and return the decoded content
/// with a CRLF after every line.
///
/// Fails with [`SmtpError::TruncatedBody`] if the stream ends before the
/// terminating `.` line.
pub fn decode<R: BufRead>(reader: &mut R) -> Result<Vec<u8>, SmtpError> {
    let mut content = Vec::new();
    let mut line = Vec::new();

    loop {
        if !read_line(reader, &mut line)? {
            return Err(SmtpError::TruncatedBody);
        }
        if line == b"." {
            return Ok(content);
        }
        content.extend_from_slice(unstuff(&line));
        content.extend_from_slice(b"\r\n");
    }
}

/// Stuff `content` for transfer and append the terminating `.` line.
///
/// A missing final line break is added so the terminator sits on its own
/// line.
pub fn encode(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 5);
    if !content.is_empty() {
        let body = content
            .strip_suffix(b"\r\n")
            .or_else(|| content.strip_suffix(b"\n"))
            .unwrap_or(content);
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }
    out.extend_from_slice(b".\r\n");
    out
}
