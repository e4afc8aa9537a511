/*
 * frame.rs
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

//! Frame streams: split a multipart MJPEG body into JPEG frames.
//!
//! Two decoder variants wrap the same `BodyStream`:
//! - `Standard`: finds each JPEG by its SOI marker, takes the part's Content-Length when
//!   one precedes it, otherwise scans to the EOI marker.
//! - `Native`: follows the multipart structure (boundary from Content-Type, or the first
//!   `--` line), slicing each part body by Content-Length or up to the next delimiter.

use std::fmt;
use std::io;
use std::str::FromStr;

use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{MjpegError, Result};
use crate::protocol::http::{BodyStream, ResponseHead};

/// Largest accepted frame.
pub const MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;
/// Largest run of part headers or junk before a frame.
const MAX_PREAMBLE: usize = 64 * 1024;

const SOI: &[u8] = &[0xFF, 0xD8];
const EOI: &[u8] = &[0xFF, 0xD9];

/// Frame decoding strategy, fixed at client construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    #[serde(alias = "default")]
    Standard,
    Native,
}

impl Variant {
    pub fn name(&self) -> &'static str {
        match self {
            Variant::Standard => "standard",
            Variant::Native => "native",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = MjpegError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "default" => Ok(Variant::Standard),
            "native" => Ok(Variant::Native),
            other => Err(MjpegError::invalid(format!("unknown stream variant '{}'", other))),
        }
    }
}

/// One JPEG image from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    sequence: u64,
    data: Bytes,
}

impl Frame {
    /// 1-based position in the stream.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Starts with SOI and ends with EOI.
    pub fn is_jpeg(&self) -> bool {
        self.data.starts_with(SOI) && self.data.ends_with(EOI)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn invalid(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Last Content-Length value in a block of part headers.
fn content_length_hint(headers: &[u8]) -> Option<usize> {
    let text = String::from_utf8_lossy(headers);
    text.lines().rev().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// Body plus the bytes read from it but not yet framed.
struct FrameSource {
    body: BodyStream,
    buf: BytesMut,
    sequence: u64,
}

impl FrameSource {
    fn new(body: BodyStream) -> Self {
        Self {
            body,
            buf: BytesMut::new(),
            sequence: 0,
        }
    }

    /// Append the next body chunk. False at end of body.
    async fn fill(&mut self) -> io::Result<bool> {
        match self.body.next_chunk().await? {
            Some(chunk) => {
                self.buf.extend_from_slice(&chunk);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn emit(&mut self, data: Bytes) -> Frame {
        self.sequence += 1;
        Frame {
            sequence: self.sequence,
            data,
        }
    }
}

/// Marker-scanning decoder.
pub struct StandardFrameStream {
    src: FrameSource,
}

impl StandardFrameStream {
    pub fn new(body: BodyStream) -> Self {
        Self {
            src: FrameSource::new(body),
        }
    }

    pub async fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.try_split()? {
                return Ok(Some(frame));
            }
            if !self.src.fill().await? {
                return Ok(None);
            }
        }
    }

    fn try_split(&mut self) -> io::Result<Option<Frame>> {
        let buf = &self.src.buf;
        let Some(start) = find(buf, SOI) else {
            if buf.len() > MAX_PREAMBLE {
                return Err(invalid("no JPEG start marker in stream"));
            }
            return Ok(None);
        };
        if start > MAX_PREAMBLE {
            return Err(invalid("part headers too large"));
        }
        let available = buf.len() - start;
        let len = match content_length_hint(&buf[..start]).filter(|n| *n >= 4 && *n <= MAX_FRAME_SIZE) {
            Some(n) if available >= n => n,
            Some(_) => return Ok(None),
            None => match find(&buf[start + SOI.len()..], EOI) {
                Some(end) => end + SOI.len() + EOI.len(),
                None if available > MAX_FRAME_SIZE => return Err(invalid("JPEG frame too large")),
                None => return Ok(None),
            },
        };
        self.src.buf.advance(start);
        let data = self.src.buf.split_to(len).freeze();
        Ok(Some(self.src.emit(data)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartState {
    /// Looking for the next `--boundary` line.
    Delimiter,
    Headers,
    /// Part body, with its Content-Length if one was given.
    Body(Option<usize>),
}

/// Multipart-structure decoder.
pub struct NativeFrameStream {
    src: FrameSource,
    /// `--` followed by the boundary, once known.
    delimiter: Option<Vec<u8>>,
    state: PartState,
    finished: bool,
}

impl NativeFrameStream {
    pub fn new(body: BodyStream) -> Self {
        let delimiter = body
            .head()
            .multipart_boundary()
            .map(|b| format!("--{}", b).into_bytes());
        Self {
            src: FrameSource::new(body),
            delimiter,
            state: PartState::Delimiter,
            finished: false,
        }
    }

    pub async fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        loop {
            if !self.finished {
                if let Some(frame) = self.try_split()? {
                    return Ok(Some(frame));
                }
            }
            if self.finished {
                return Ok(None);
            }
            if !self.src.fill().await? {
                return Ok(self.take_last_part());
            }
        }
    }

    /// At end of body, a part without Content-Length ends at the close of the stream.
    fn take_last_part(&mut self) -> Option<Frame> {
        self.finished = true;
        if self.state != PartState::Body(None) {
            return None;
        }
        let mut data = std::mem::take(&mut self.src.buf);
        if data.ends_with(b"\r\n") {
            data.truncate(data.len() - 2);
        }
        if data.is_empty() {
            return None;
        }
        Some(self.src.emit(data.freeze()))
    }

    /// Learn the boundary from the first line that starts with `--`.
    fn detect_delimiter(&mut self) -> io::Result<bool> {
        let buf = &self.src.buf;
        let Some(pos) = find(buf, b"--") else {
            if buf.len() > MAX_PREAMBLE {
                return Err(invalid("no multipart boundary in stream"));
            }
            return Ok(false);
        };
        let Some(eol) = find(&buf[pos..], b"\r\n") else {
            return Ok(false);
        };
        let line = &buf[pos..pos + eol];
        let end = line.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(0, |i| i + 1);
        let trimmed = &line[..end];
        if trimmed.len() <= 2 {
            return Err(invalid("empty multipart boundary"));
        }
        self.delimiter = Some(trimmed.to_vec());
        Ok(true)
    }

    fn try_split(&mut self) -> io::Result<Option<Frame>> {
        loop {
            match self.state {
                PartState::Delimiter => {
                    if self.delimiter.is_none() && !self.detect_delimiter()? {
                        return Ok(None);
                    }
                    let Some(delimiter) = self.delimiter.as_deref() else {
                        return Ok(None);
                    };
                    let buf = &self.src.buf;
                    let Some(pos) = find(buf, delimiter) else {
                        if buf.len() > MAX_PREAMBLE {
                            return Err(invalid("multipart delimiter not found"));
                        }
                        return Ok(None);
                    };
                    let after = pos + delimiter.len();
                    if buf.len() < after + 2 {
                        return Ok(None);
                    }
                    if &buf[after..after + 2] == b"--" {
                        self.finished = true;
                        self.src.buf.clear();
                        return Ok(None);
                    }
                    let Some(eol) = find(&buf[after..], b"\r\n") else {
                        return Ok(None);
                    };
                    self.src.buf.advance(after + eol + 2);
                    self.state = PartState::Headers;
                }
                PartState::Headers => {
                    let buf = &self.src.buf;
                    if buf.len() < 2 {
                        return Ok(None);
                    }
                    if buf.starts_with(b"\r\n") {
                        self.src.buf.advance(2);
                        self.state = PartState::Body(None);
                        continue;
                    }
                    let Some(end) = find(buf, b"\r\n\r\n") else {
                        if buf.len() > MAX_PREAMBLE {
                            return Err(invalid("part headers too large"));
                        }
                        return Ok(None);
                    };
                    let length = content_length_hint(&buf[..end]).filter(|n| *n <= MAX_FRAME_SIZE);
                    self.src.buf.advance(end + 4);
                    self.state = PartState::Body(length);
                }
                PartState::Body(Some(length)) => {
                    if self.src.buf.len() < length {
                        return Ok(None);
                    }
                    let data = self.src.buf.split_to(length).freeze();
                    self.state = PartState::Delimiter;
                    if !data.is_empty() {
                        return Ok(Some(self.src.emit(data)));
                    }
                }
                PartState::Body(None) => {
                    let Some(delimiter) = self.delimiter.as_deref() else {
                        return Ok(None);
                    };
                    let mut next = Vec::with_capacity(delimiter.len() + 2);
                    next.extend_from_slice(b"\r\n");
                    next.extend_from_slice(delimiter);
                    let Some(pos) = find(&self.src.buf, &next) else {
                        if self.src.buf.len() > MAX_FRAME_SIZE {
                            return Err(invalid("JPEG frame too large"));
                        }
                        return Ok(None);
                    };
                    let data = self.src.buf.split_to(pos).freeze();
                    self.state = PartState::Delimiter;
                    if !data.is_empty() {
                        return Ok(Some(self.src.emit(data)));
                    }
                }
            }
        }
    }
}

/// Open sequence of frames over a live transport. Owns the transport exclusively;
/// `close` shuts it down and dropping releases it.
pub enum FrameStream {
    Standard(StandardFrameStream),
    Native(NativeFrameStream),
}

impl FrameStream {
    /// Wrap a response body in the decoder for `variant`.
    pub fn wrap(variant: Variant, body: BodyStream) -> Self {
        match variant {
            Variant::Standard => FrameStream::Standard(StandardFrameStream::new(body)),
            Variant::Native => FrameStream::Native(NativeFrameStream::new(body)),
        }
    }

    pub fn variant(&self) -> Variant {
        match self {
            FrameStream::Standard(_) => Variant::Standard,
            FrameStream::Native(_) => Variant::Native,
        }
    }

    /// Response head the stream was opened with.
    pub fn head(&self) -> &ResponseHead {
        match self {
            FrameStream::Standard(s) => s.src.body.head(),
            FrameStream::Native(s) => s.src.body.head(),
        }
    }

    /// Next frame, or None when the server ends the stream.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = match self {
            FrameStream::Standard(s) => s.next_frame().await?,
            FrameStream::Native(s) => s.next_frame().await?,
        };
        Ok(frame)
    }

    /// Shut down and release the transport.
    pub async fn close(self) -> Result<()> {
        let body = match self {
            FrameStream::Standard(s) => s.src.body,
            FrameStream::Native(s) => s.src.body,
        };
        body.close().await?;
        Ok(())
    }
}

impl fmt::Debug for FrameStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameStream")
            .field("variant", &self.variant())
            .field("status", &self.head().code)
            .finish()
    }
}
