/*
 * config.rs
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

//! Client configuration loadable from JSON, e.g.
//!
//! ```json
//! { "variant": "native", "send_connection_close": true,
//!   "username": "admin", "password": "secret",
//!   "cookies": ["sid=abc123"], "timeout_secs": 10, "trust": "accept_any" }
//! ```
//!
//! Every field is optional. Applying a config writes credentials and cookies into the
//! client's session.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::Client;
use crate::error::{MjpegError, Result};
use crate::frame::Variant;
use crate::pipeline::OpenHandle;
use crate::session::Cookie;
use crate::trust::{AcceptAnyCertificate, TrustPolicy, WebPkiTrust};

/// Which built-in trust policy to install.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustMode {
    /// Platform and Mozilla roots with hostname verification.
    #[default]
    Standard,
    /// Accept any certificate for any host. For self-signed cameras only.
    AcceptAny,
}

impl TrustMode {
    fn policy(self) -> Arc<dyn TrustPolicy> {
        match self {
            TrustMode::Standard => Arc::new(WebPkiTrust::new()),
            TrustMode::AcceptAny => Arc::new(AcceptAnyCertificate),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub variant: Variant,
    pub send_connection_close: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub cookies: Vec<String>,
    pub timeout_secs: Option<u64>,
    pub trust: TrustMode,
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| MjpegError::invalid(format!("client config: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| MjpegError::invalid(format!("client config: {}", e)))
    }

    /// Deadline for `open`; zero means none.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.filter(|&s| s > 0).map(Duration::from_secs)
    }

    /// Configure `client` (variant aside, which is fixed at construction).
    ///
    /// Every cookie is parsed before anything is changed, so a bad cookie leaves the
    /// client's session untouched. Cookies already in the session are not added again,
    /// so applying the same config repeatedly does not grow the jar.
    pub fn apply(&self, client: Client) -> Result<Client> {
        let cookies = self
            .cookies
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| Cookie::parse(c))
            .collect::<Result<Vec<_>>>()?;

        if self.trust == TrustMode::AcceptAny {
            warn!("certificate verification disabled by configuration");
        }
        let mut client = client.with_trust_policy(self.trust.policy());
        if self.send_connection_close {
            client = client.with_connection_close_header();
        }
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            client = client.with_credentials(user, pass);
        }
        let added = client.session().merge_cookies(cookies);
        debug!(added, "config cookies merged into session");
        Ok(client)
    }

    /// Open `url` with a client built from this config, under its deadline if any.
    pub fn open(&self, url: impl Into<String>) -> Result<OpenHandle> {
        let client = Client::from_config(self)?;
        Ok(match self.timeout() {
            Some(limit) => client.open_timeout(url, limit),
            None => client.open(url),
        })
    }
}

impl Client {
    /// Client built from `config`, sharing the process-wide session.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.apply(Client::new(config.variant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::http::Request;
    use crate::session::Session;

    #[test]
    fn empty_object_is_default() {
        let config = ClientConfig::from_json("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.variant, Variant::Standard);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn full_config_applies_to_client() {
        let config = ClientConfig::from_json(
            r#"{"variant": "native", "send_connection_close": true,
                "username": "admin", "password": "secret",
                "cookies": ["sid=abc123", "lang=en"], "timeout_secs": 10,
                "trust": "accept_any"}"#,
        )
        .unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_secs(10)));

        let session = Arc::new(Session::new());
        let client = config
            .apply(Client::new(config.variant).with_session(session.clone()))
            .unwrap();
        assert_eq!(client.variant(), Variant::Native);
        assert!(client.sends_connection_close());
        assert_eq!(session.credentials().unwrap().username(), "admin");

        let mut request = Request::get("/");
        client.load_connection_properties(&mut request);
        assert_eq!(request.header_value("Cookie"), Some("sid=abc123;lang=en"));
    }

    #[test]
    fn default_alias_and_zero_timeout() {
        let config = ClientConfig::from_json(r#"{"variant": "default", "timeout_secs": 0}"#).unwrap();
        assert_eq!(config.variant, Variant::Standard);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn bad_json_and_bad_cookie_are_invalid_arguments() {
        assert!(ClientConfig::from_json(r#"{"variant": "mystery"}"#)
            .unwrap_err()
            .is_invalid_argument());
        let config = ClientConfig {
            cookies: vec!["not a cookie".into()],
            ..Default::default()
        };
        let client = Client::default().with_session(Arc::new(Session::new()));
        assert!(config.apply(client).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn bad_cookie_leaves_session_untouched() {
        let config = ClientConfig {
            username: Some("admin".into()),
            password: Some("secret".into()),
            cookies: vec!["sid=abc123".into(), "sid=a\r\nX-Injected: 1".into()],
            ..Default::default()
        };
        let session = Arc::new(Session::new());
        let client = Client::default().with_session(session.clone());
        assert!(config.apply(client).unwrap_err().is_invalid_argument());
        assert!(session.cookies().is_empty());
        assert!(session.credentials().is_none());
    }

    #[test]
    fn repeated_apply_does_not_duplicate_cookies() {
        let config = ClientConfig {
            cookies: vec!["reconnect=1".into(), "".into()],
            ..Default::default()
        };
        let session = Arc::new(Session::new());
        for _ in 0..3 {
            config
                .apply(Client::default().with_session(session.clone()))
                .unwrap();
        }
        assert_eq!(session.cookie_header().as_deref(), Some("reconnect=1"));
    }

    #[tokio::test]
    async fn repeated_open_does_not_grow_global_jar() {
        let config = ClientConfig {
            cookies: vec!["config_open_marker=1".into()],
            ..Default::default()
        };
        for _ in 0..3 {
            let err = config.open("http://camera.local/video").unwrap().await.unwrap_err();
            assert!(err.is_invalid_argument());
        }
        let header = Session::global().cookie_header().unwrap_or_default();
        assert_eq!(header.matches("config_open_marker=1").count(), 1);
    }

    #[test]
    fn json_round_trip_keeps_trust_mode() {
        let config = ClientConfig {
            trust: TrustMode::AcceptAny,
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        assert!(json.contains("\"accept_any\""));
        assert_eq!(ClientConfig::from_json(&json).unwrap(), config);
    }
}
