/*
 * connection.rs
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

//! HTTP connection: one transport, one request, one streamed response.
//!
//! `send` writes the request and reads up to the end of the response head. The body is
//! then handed out as a `BodyStream`, which owns the transport from that point on.

use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::net::BoxedTransport;
use crate::protocol::http::h1::{H1ResponseHandler, ParseState, ResponseParser};
use crate::protocol::http::request::Request;

const READ_CHUNK: usize = 16 * 1024;

/// Status line and headers of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    pub code: u16,
    pub reason: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// First value of the named header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.trim().parse().ok())
    }

    pub fn is_chunked(&self) -> bool {
        self.headers.iter().any(|(k, v)| {
            k.eq_ignore_ascii_case("transfer-encoding") && v.to_ascii_lowercase().contains("chunked")
        })
    }

    /// True if any WWW-Authenticate header offers the Basic scheme.
    pub fn has_basic_challenge(&self) -> bool {
        self.headers.iter().any(|(k, v)| {
            k.eq_ignore_ascii_case("www-authenticate")
                && v.split(',').any(|c| {
                    c.trim_start()
                        .get(..5)
                        .map(|s| s.eq_ignore_ascii_case("basic"))
                        .unwrap_or(false)
                })
        })
    }

    /// Multipart boundary from Content-Type, without quotes or a leading `--`.
    pub fn multipart_boundary(&self) -> Option<String> {
        let content_type = self.header("content-type")?;
        content_type.split(';').skip(1).find_map(|param| {
            let (name, value) = param.split_once('=')?;
            if !name.trim().eq_ignore_ascii_case("boundary") {
                return None;
            }
            let value = value.trim().trim_matches('"');
            let value = value.strip_prefix("--").unwrap_or(value);
            (!value.is_empty()).then(|| value.to_string())
        })
    }
}

impl H1ResponseHandler for ResponseHead {
    fn status(&mut self, code: u16, reason: Option<&str>) {
        self.code = code;
        self.reason = reason.map(str::to_string);
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn body_chunk(&mut self, _data: &[u8]) {}

    fn end_body(&mut self) {}
}

/// Collects body bytes produced by one `receive` call.
#[derive(Default)]
struct BodyCollector {
    data: BytesMut,
}

impl H1ResponseHandler for BodyCollector {
    fn status(&mut self, _code: u16, _reason: Option<&str>) {}

    fn header(&mut self, _name: &str, _value: &str) {}

    fn body_chunk(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    fn end_body(&mut self) {}
}

/// One transport driving one request.
pub struct HttpConnection {
    transport: BoxedTransport,
    read_buf: BytesMut,
    parser: ResponseParser,
}

impl HttpConnection {
    pub fn new(transport: BoxedTransport) -> Self {
        Self {
            transport,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            parser: ResponseParser::new(),
        }
    }

    /// Write the request and read the response head. Body bytes already received stay buffered.
    pub async fn send(&mut self, request: &Request, host_header: &str) -> io::Result<ResponseHead> {
        self.transport.write_all(&request.encode(host_header)).await?;
        self.transport.flush().await?;

        let mut head = ResponseHead::default();
        loop {
            self.parser.receive(&mut self.read_buf, &mut head)?;
            if self.parser.state() == ParseState::HeadersComplete {
                break;
            }
            self.read_buf.reserve(READ_CHUNK);
            let n = self.transport.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before response headers",
                ));
            }
        }
        self.parser.set_body_mode(head.content_length(), head.is_chunked());
        Ok(head)
    }

    /// Hand the response body out as a stream. Call after `send`.
    pub fn into_body(self, head: ResponseHead) -> BodyStream {
        BodyStream {
            transport: self.transport,
            read_buf: self.read_buf,
            parser: self.parser,
            head,
        }
    }

    /// Shut the transport down and drop it.
    pub async fn close(mut self) -> io::Result<()> {
        self.transport.shutdown().await
    }
}

/// Response body read from the live transport, with transfer coding removed.
/// Owns the transport exclusively; `close` shuts it down, dropping releases it.
pub struct BodyStream {
    transport: BoxedTransport,
    read_buf: BytesMut,
    parser: ResponseParser,
    head: ResponseHead,
}

impl BodyStream {
    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// Next run of body bytes, or None at end of body.
    pub async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        loop {
            if !self.read_buf.is_empty() {
                let mut collector = BodyCollector::default();
                self.parser.receive(&mut self.read_buf, &mut collector)?;
                if !collector.data.is_empty() {
                    return Ok(Some(collector.data.freeze()));
                }
            }
            if self.parser.state() == ParseState::Done {
                return Ok(None);
            }
            self.read_buf.reserve(READ_CHUNK);
            let n = self.transport.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                if self.parser.reads_until_close() {
                    return Ok(None);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before end of body",
                ));
            }
        }
    }

    /// Shut the transport down and drop it.
    pub async fn close(mut self) -> io::Result<()> {
        self.transport.shutdown().await
    }
}

/// Body of a canned response served over an in-memory transport.
#[cfg(test)]
pub(crate) async fn test_body(raw: Vec<u8>) -> BodyStream {
    let (client, mut server) = tokio::io::duplex(64 * 1024);
    tokio::spawn(async move {
        let _ = server.write_all(&raw).await;
        let mut req = Vec::new();
        let mut buf = [0u8; 1024];
        while !req.windows(4).any(|w| w == b"\r\n\r\n") {
            match server.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => req.extend_from_slice(&buf[..n]),
            }
        }
    });
    let mut conn = HttpConnection::new(Box::new(client));
    let head = conn.send(&Request::get("/"), "cam").await.unwrap();
    conn.into_body(head)
}
