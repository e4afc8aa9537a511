/*
 * support/mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * In-memory connectors standing in for a TLS camera. Each connection is a
 * tokio duplex pipe; the server half reads one request head, records it and
 * writes a scripted response.
 */

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{duplex, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::sync::Notify;
use tokio_rustls::rustls::ClientConfig;

use mjpegtls_core::{BoxedTransport, ConnectFuture, Connector, StreamUrl};

pub const BOUNDARY: &str = "frame";

/// Small JPEG-shaped payload: SOI, filler, EOI.
pub fn jpeg(fill: u8) -> Vec<u8> {
    let mut v = vec![0xFF, 0xD8, 0xFF, 0xE0];
    v.extend(std::iter::repeat(fill).take(16));
    v.extend_from_slice(&[0xFF, 0xD9]);
    v
}

/// 200 response carrying `frames` as multipart/x-mixed-replace parts, then the close delimiter.
pub fn stream_response(frames: &[Vec<u8>]) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary={}\r\n\r\n",
        BOUNDARY
    )
    .into_bytes();
    for frame in frames {
        out.extend_from_slice(
            format!(
                "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
                BOUNDARY,
                frame.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(frame);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    out
}

pub fn basic_challenge() -> Vec<u8> {
    b"HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Basic realm=\"camera\"\r\nContent-Length: 0\r\n\r\n".to_vec()
}

/// Shutdown and drop counts across every transport a connector handed out.
#[derive(Debug, Default)]
pub struct TransportStats {
    pub shutdowns: AtomicUsize,
    pub dropped: AtomicUsize,
}

impl TransportStats {
    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// Client half of a duplex pipe that reports shutdown and drop.
pub struct RecordingTransport {
    inner: DuplexStream,
    stats: Arc<TransportStats>,
}

impl RecordingTransport {
    pub fn new(inner: DuplexStream, stats: Arc<TransportStats>) -> Self {
        Self { inner, stats }
    }
}

impl AsyncRead for RecordingTransport {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for RecordingTransport {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.stats.shutdowns.fetch_add(1, Ordering::SeqCst);
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl Drop for RecordingTransport {
    fn drop(&mut self) {
        self.stats.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

async fn read_head(server: &mut DuplexStream) -> String {
    let mut req = Vec::new();
    let mut buf = [0u8; 1024];
    while !req.windows(4).any(|w| w == b"\r\n\r\n") {
        match server.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => req.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&req).into_owned()
}

/// Camera answering each connection with the next scripted response.
/// Once the script runs out it refuses connections, or with `silent_tail` accepts them
/// and never answers.
#[derive(Debug, Default)]
pub struct MockCamera {
    responses: Mutex<VecDeque<Vec<u8>>>,
    requests: Arc<Mutex<Vec<String>>>,
    hosts: Mutex<Vec<String>>,
    connects: AtomicUsize,
    silent_tail: bool,
    held: Mutex<Vec<DuplexStream>>,
    pub stats: Arc<TransportStats>,
}

impl MockCamera {
    pub fn new(responses: impl IntoIterator<Item = Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn with_silent_tail(responses: impl IntoIterator<Item = Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            silent_tail: true,
            ..Default::default()
        })
    }

    /// Request heads received so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Host the client asked to connect to, per connection.
    pub fn hosts(&self) -> Vec<String> {
        self.hosts.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for MockCamera {
    fn connect<'a>(&'a self, url: &'a StreamUrl, _tls: Arc<ClientConfig>) -> ConnectFuture<'a> {
        Box::pin(async move {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.hosts.lock().unwrap().push(url.host().to_string());
            let next = self.responses.lock().unwrap().pop_front();
            let (client, mut server) = duplex(64 * 1024);
            let response = match next {
                Some(response) => response,
                None if self.silent_tail => {
                    self.held.lock().unwrap().push(server);
                    return Ok(Box::new(RecordingTransport::new(client, self.stats.clone())) as BoxedTransport);
                }
                None => return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "camera offline")),
            };

            let requests = self.requests.clone();
            tokio::spawn(async move {
                let head = read_head(&mut server).await;
                requests.lock().unwrap().push(head);
                let _ = server.write_all(&response).await;
            });
            Ok::<_, io::Error>(Box::new(RecordingTransport::new(client, self.stats.clone())) as BoxedTransport)
        })
    }
}

/// Connector whose server accepts the connection and never answers.
#[derive(Debug, Default)]
pub struct SilentCamera {
    servers: Mutex<Vec<DuplexStream>>,
    pub stats: Arc<TransportStats>,
}

impl Connector for SilentCamera {
    fn connect<'a>(&'a self, _url: &'a StreamUrl, _tls: Arc<ClientConfig>) -> ConnectFuture<'a> {
        Box::pin(async move {
            let (client, server) = duplex(64 * 1024);
            self.servers.lock().unwrap().push(server);
            Ok::<_, io::Error>(Box::new(RecordingTransport::new(client, self.stats.clone())) as BoxedTransport)
        })
    }
}

/// Connector whose connect never completes. Signals when it is entered and when the
/// pending connect is dropped.
#[derive(Debug, Default)]
pub struct HangingConnector {
    pub entered: Arc<Notify>,
    pub released: Arc<Notify>,
}

struct ReleaseGuard(Arc<Notify>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.notify_one();
    }
}

impl Connector for HangingConnector {
    fn connect<'a>(&'a self, _url: &'a StreamUrl, _tls: Arc<ClientConfig>) -> ConnectFuture<'a> {
        let guard = ReleaseGuard(self.released.clone());
        let entered = self.entered.clone();
        Box::pin(async move {
            let _guard = guard;
            entered.notify_one();
            std::future::pending::<io::Result<BoxedTransport>>().await
        })
    }
}

/// Connector that refuses every attempt.
#[derive(Debug, Default)]
pub struct RefusingConnector {
    attempts: AtomicUsize,
}

impl RefusingConnector {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Connector for RefusingConnector {
    fn connect<'a>(&'a self, _url: &'a StreamUrl, _tls: Arc<ClientConfig>) -> ConnectFuture<'a> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err::<BoxedTransport, _>(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused")) })
    }
}
