/*
 * net.rs
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

//! Byte transports and the TCP + TLS 1.2 connector that opens them.
//!
//! A transport is anything readable and writable; the connection layer only ever sees a
//! `BoxedTransport`, so tests can substitute in-memory streams through `Connector`.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::version::TLS12;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::error::{MjpegError, Result};
use crate::trust::{PolicyVerifier, TrustPolicy};
use crate::uri::StreamUrl;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Readable, writable byte stream carrying one HTTP exchange.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

pub type BoxedTransport = Box<dyn Transport>;

pub type ConnectFuture<'a> = Pin<Box<dyn Future<Output = io::Result<BoxedTransport>> + Send + 'a>>;

/// Opens a transport to the URL's host using the given TLS configuration.
pub trait Connector: fmt::Debug + Send + Sync {
    fn connect<'a>(&'a self, url: &'a StreamUrl, tls: Arc<ClientConfig>) -> ConnectFuture<'a>;
}

/// TLS client config pinned to TLS 1.2, trusting peers through `trust`. ALPN offers http/1.1 only.
pub fn stream_client_config(trust: Arc<dyn TrustPolicy>) -> Result<Arc<ClientConfig>> {
    let provider = Arc::new(tokio_rustls::rustls::crypto::ring::default_provider());
    let mut config = ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&TLS12])
        .map_err(|e| MjpegError::SecurityInit(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(PolicyVerifier::new(trust)))
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(Arc::new(config))
}

/// TCP connect with a bounded wait, then TLS handshake.
#[derive(Debug, Clone)]
pub struct TcpTlsConnector {
    connect_timeout: Duration,
}

impl TcpTlsConnector {
    pub fn new() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Bound on the TCP connect alone (DNS + SYN). The TLS handshake is bounded only by the
    /// caller's `open` deadline.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl Default for TcpTlsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for TcpTlsConnector {
    fn connect<'a>(&'a self, url: &'a StreamUrl, tls: Arc<ClientConfig>) -> ConnectFuture<'a> {
        Box::pin(async move {
            let tcp = timeout(self.connect_timeout, TcpStream::connect((url.host(), url.port())))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TCP connect timed out"))??;
            tcp.set_nodelay(true)?;
            let server_name = ServerName::try_from(url.host().to_string())
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid host name"))?;
            let stream = TlsConnector::from(tls).connect(server_name, tcp).await?;
            let (_, conn) = stream.get_ref();
            debug!(
                host = %url.host(),
                version = ?conn.protocol_version(),
                suite = ?conn.negotiated_cipher_suite().map(|s| s.suite()),
                "TLS handshake complete"
            );
            Ok::<_, io::Error>(Box::new(stream) as BoxedTransport)
        })
    }
}
