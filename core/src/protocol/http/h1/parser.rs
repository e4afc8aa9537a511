/*
 * parser.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of mjpegtls, a TLS MJPEG stream client.
 *
 * mjpegtls is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * mjpegtls is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with mjpegtls.  If not, see <http://www.gnu.org/licenses/>.
 */

//! HTTP/1.1 response push parser: status line, headers, body (Content-Length, chunked,
//! or read-until-close).
//!
//! The parser stops in `HeadersComplete` so the caller can inspect the head and choose the
//! body mode with `set_body_mode` before feeding body bytes.

use bytes::{Buf, BytesMut};
use std::io;

/// Callback for HTTP/1.1 response events.
pub trait H1ResponseHandler {
    fn status(&mut self, code: u16, reason: Option<&str>);
    fn header(&mut self, name: &str, value: &str);
    fn body_chunk(&mut self, data: &[u8]);
    /// Body finished (Content-Length reached or last chunk seen). Not called for read-until-close.
    fn end_body(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    StatusLine,
    Headers,
    /// Head done; waiting for `set_body_mode`.
    HeadersComplete,
    /// Body delimited by Content-Length, or by connection close when no length is known.
    Body,
    ChunkSize,
    ChunkData,
    ChunkDataEnd,
    ChunkTrailer,
    /// Response complete.
    Done,
}

/// Push parser for one HTTP/1.1 response. Feed bytes via `receive`; consumed bytes are
/// split off the front of the buffer, partial tokens stay in it.
#[derive(Debug)]
pub struct ResponseParser {
    state: ParseState,
    /// Remaining body bytes when Content-Length is known; None reads until close.
    remaining: Option<u64>,
    chunk_remaining: u64,
    head_bytes: usize,
}

/// Upper bound on status line plus headers.
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            remaining: None,
            chunk_remaining: 0,
            head_bytes: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// True when the body ends only at connection close.
    pub fn reads_until_close(&self) -> bool {
        self.state == ParseState::Body && self.remaining.is_none()
    }

    fn find_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\r\n")
    }

    /// Split one CRLF-terminated line off `buf`, without the CRLF. None if incomplete.
    fn take_line(&mut self, buf: &mut BytesMut, what: &'static str) -> io::Result<Option<String>> {
        let Some(end) = Self::find_crlf(buf) else {
            if self.in_head() && self.head_bytes + buf.len() > MAX_HEAD_SIZE {
                return Err(invalid("response head too large"));
            }
            return Ok(None);
        };
        if self.in_head() {
            self.head_bytes += end + 2;
            if self.head_bytes > MAX_HEAD_SIZE {
                return Err(invalid("response head too large"));
            }
        }
        let line = buf.split_to(end + 2);
        let text = std::str::from_utf8(&line[..end]).map_err(|_| invalid(what))?;
        Ok(Some(text.to_string()))
    }

    fn in_head(&self) -> bool {
        matches!(self.state, ParseState::StatusLine | ParseState::Headers)
    }

    /// Consume and parse as much of `buf` as possible.
    pub fn receive<H: H1ResponseHandler>(&mut self, buf: &mut BytesMut, handler: &mut H) -> io::Result<()> {
        while !buf.is_empty() {
            match self.state {
                ParseState::StatusLine => {
                    let Some(line) = self.take_line(buf, "invalid status line UTF-8")? else {
                        return Ok(());
                    };
                    let (code, reason) = parse_status_line(&line)?;
                    handler.status(code, reason);
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let Some(line) = self.take_line(buf, "invalid header UTF-8")? else {
                        return Ok(());
                    };
                    if line.is_empty() {
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        handler.header(name.trim(), value.trim());
                    }
                }
                ParseState::HeadersComplete | ParseState::Done => return Ok(()),
                ParseState::Body => match self.remaining {
                    Some(remaining) => {
                        let n = (remaining as usize).min(buf.len());
                        let chunk = buf.split_to(n);
                        handler.body_chunk(&chunk);
                        let left = remaining - n as u64;
                        self.remaining = Some(left);
                        if left == 0 {
                            handler.end_body();
                            self.state = ParseState::Done;
                        }
                    }
                    None => {
                        let chunk = buf.split_to(buf.len());
                        handler.body_chunk(&chunk);
                    }
                },
                ParseState::ChunkSize => {
                    let Some(line) = self.take_line(buf, "invalid chunk size")? else {
                        return Ok(());
                    };
                    let hex = line.split(';').next().unwrap_or("").trim();
                    self.chunk_remaining =
                        u64::from_str_radix(hex, 16).map_err(|_| invalid("invalid chunk size"))?;
                    self.state = if self.chunk_remaining == 0 {
                        ParseState::ChunkTrailer
                    } else {
                        ParseState::ChunkData
                    };
                }
                ParseState::ChunkData => {
                    let n = (self.chunk_remaining as usize).min(buf.len());
                    let chunk = buf.split_to(n);
                    handler.body_chunk(&chunk);
                    self.chunk_remaining -= n as u64;
                    if self.chunk_remaining == 0 {
                        self.state = ParseState::ChunkDataEnd;
                    }
                }
                ParseState::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(invalid("missing CRLF after chunk data"));
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    // Trailer fields are read and discarded.
                    let Some(line) = self.take_line(buf, "invalid trailer")? else {
                        return Ok(());
                    };
                    if line.is_empty() {
                        handler.end_body();
                        self.state = ParseState::Done;
                    }
                }
            }
        }
        Ok(())
    }

    /// Choose how the body is delimited. Only valid in `HeadersComplete`.
    pub fn set_body_mode(&mut self, content_length: Option<u64>, chunked: bool) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        if chunked {
            self.state = ParseState::ChunkSize;
        } else if content_length == Some(0) {
            self.state = ParseState::Done;
        } else {
            self.remaining = content_length;
            self.state = ParseState::Body;
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// `HTTP/1.1 200 OK` or `HTTP/1.0 200`. Anything else is an unexpected status line.
fn parse_status_line(line: &str) -> io::Result<(u16, Option<&str>)> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/1.") {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected status line: {}", line),
        ));
    }
    let code = parts
        .next()
        .filter(|c| c.len() == 3)
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, format!("unexpected status line: {}", line))
        })?;
    let reason = parts.next().map(str::trim).filter(|r| !r.is_empty());
    Ok((code, reason))
}
