/*
 * client.rs
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

//! MJPEG stream client: configuration and the `connect` sequence.
//!
//! Configure with chained setters, then call `open` (see `pipeline`) or `connect`.
//! Each `connect` is an independent attempt:
//! 1. parse the URL (https only)
//! 2. build a TLS 1.2 config around the trust policy
//! 3. open the transport through the connector
//! 4. send the shaped GET and read the response head
//! 5. on a Basic challenge with credentials available, repeat once on a fresh transport
//! 6. wrap the body in the client's frame stream variant

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_rustls::rustls::client::ClientConfig;
use tracing::debug;

use crate::error::{MjpegError, Result};
use crate::frame::{FrameStream, Variant};
use crate::net::{stream_client_config, Connector, TcpTlsConnector};
use crate::protocol::http::{HttpConnection, Request};
use crate::session::Session;
use crate::trust::{TrustPolicy, WebPkiTrust};
use crate::uri::StreamUrl;

/// One connection attempt, created per `open` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub url: String,
    pub timeout: Option<Duration>,
    pub variant: Variant,
}

impl ConnectionRequest {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>, variant: Variant) -> Self {
        Self {
            url: url.into(),
            timeout,
            variant,
        }
    }
}

/// MJPEG stream client. Cheap to clone; clones share session, trust policy and connector.
///
/// Configuration is by value, so a client is fully configured before it can be shared
/// with concurrent `open` calls. Cookies and credentials live in the session, which by
/// default is the process-wide `Session::global()`.
#[derive(Debug, Clone)]
pub struct Client {
    variant: Variant,
    send_connection_close: bool,
    session: Arc<Session>,
    trust: Arc<dyn TrustPolicy>,
    connector: Arc<dyn Connector>,
    pub(crate) runtime: Option<Handle>,
}

impl Client {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            send_connection_close: false,
            session: Session::global(),
            trust: Arc::new(WebPkiTrust::new()),
            connector: Arc::new(TcpTlsConnector::new()),
            runtime: None,
        }
    }

    /// Client for a variant given by name (`"standard"`/`"default"`, `"native"`).
    pub fn with_variant_name(name: &str) -> Result<Self> {
        Ok(Self::new(name.parse()?))
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Answer Basic challenges with this pair. Ignored if either part is empty; otherwise
    /// replaces the pair for every client sharing this client's session.
    pub fn with_credentials(self, username: &str, password: &str) -> Self {
        if self.session.set_credentials(username, password) {
            debug!(user = %username, "credentials installed");
        }
        self
    }

    /// Parse a cookie and append it to the session. Empty input is ignored.
    pub fn add_cookie(self, cookie: &str) -> Result<Self> {
        self.session.add_cookie(cookie)?;
        Ok(self)
    }

    /// Send `Connection: close` on every request. Works around servers that answer
    /// persistent connections with a malformed status line.
    pub fn with_connection_close_header(mut self) -> Self {
        self.send_connection_close = true;
        self
    }

    pub fn sends_connection_close(&self) -> bool {
        self.send_connection_close
    }

    /// Use a dedicated session instead of the process-wide one.
    pub fn with_session(mut self, session: Arc<Session>) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn with_trust_policy(mut self, trust: Arc<dyn TrustPolicy>) -> Self {
        self.trust = trust;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Run `open` work on this runtime instead of the ambient or shared one.
    pub fn with_runtime_handle(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Set the stream request headers from client state and the current cookie jar.
    pub fn load_connection_properties(&self, request: &mut Request) {
        request.header("Cache-Control", "no-cache");
        if self.send_connection_close {
            request.header("Connection", "close");
        }
        if let Some(cookies) = self.session.cookie_header() {
            request.header("Cookie", cookies);
        }
    }

    /// Open a stream on the calling task. Nothing happens until awaited; every call is a
    /// fresh attempt.
    pub async fn connect(&self, url: &str) -> Result<FrameStream> {
        self.connect_request(&ConnectionRequest::new(url, None, self.variant))
            .await
    }

    pub(crate) async fn connect_request(&self, request: &ConnectionRequest) -> Result<FrameStream> {
        let url = StreamUrl::parse(&request.url)?;
        let tls = stream_client_config(self.trust.clone())?;
        debug!(url = %url, variant = %request.variant, "connecting");

        let mut http = Request::get(url.request_target());
        self.load_connection_properties(&mut http);

        let mut conn = self.open_transport(&url, &tls).await?;
        let mut head = conn.send(&http, &url.host_header()).await?;

        if head.code == 401 && head.has_basic_challenge() {
            if let Some(credentials) = self.session.credentials().or_else(|| url.credentials()) {
                debug!(url = %url, user = %credentials.username(), "answering Basic challenge");
                if let Err(e) = conn.close().await {
                    debug!(url = %url, error = %e, "shutdown of challenged connection failed");
                }
                http.header("Authorization", credentials.basic_authorization());
                conn = self.open_transport(&url, &tls).await?;
                head = conn.send(&http, &url.host_header()).await?;
            }
        }
        if !head.is_success() {
            return Err(MjpegError::status(head.code, head.reason));
        }
        debug!(url = %url, status = head.code, "stream open");
        Ok(FrameStream::wrap(request.variant, conn.into_body(head)))
    }

    async fn open_transport(&self, url: &StreamUrl, tls: &Arc<ClientConfig>) -> Result<HttpConnection> {
        let transport = self.connector.connect(url, tls.clone()).await?;
        Ok(HttpConnection::new(transport))
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(Variant::Standard)
    }
}
