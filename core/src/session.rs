/*
 * session.rs
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

//! Session state shared between connection attempts: an ordered cookie jar and the
//! credential pair answered to Basic challenges.
//!
//! Clients share `Session::global()` unless given their own session. Cookies are not
//! scoped by domain: every cookie in the jar is sent to every host. Credentials are
//! last-write-wins for all clients sharing the session.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::debug;

use crate::error::{MjpegError, Result};

/// One cookie as sent in the Cookie header. Attributes (Path, Domain, Expires...) are not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
}

impl Cookie {
    /// Parse a cookie string such as `sid=abc123; Path=/` or `Set-Cookie: sid=abc123`.
    /// Only the first cookie of a comma-separated list is taken.
    pub fn parse(s: &str) -> Result<Self> {
        let mut s = s.trim();
        for prefix in ["set-cookie2:", "set-cookie:"] {
            if s.get(..prefix.len()).is_some_and(|p| p.eq_ignore_ascii_case(prefix)) {
                s = s[prefix.len()..].trim_start();
                break;
            }
        }
        let first = first_cookie(s);
        let pair = first.split(';').next().unwrap_or("").trim();
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| MjpegError::invalid(format!("malformed cookie (no '='): {}", s)))?;
        let name = name.trim();
        if !is_token(name) || name.starts_with('$') {
            return Err(MjpegError::invalid(format!("malformed cookie name: '{}'", name)));
        }
        let value = value.trim();
        if value.bytes().any(|b| b.is_ascii_control()) {
            return Err(MjpegError::invalid(format!("control character in value of cookie '{}'", name)));
        }
        Ok(Self {
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// First element of a comma-separated cookie list. A comma inside a quoted value or an
/// `Expires=Wed, 09 Jun ...` date does not split.
fn first_cookie(s: &str) -> &str {
    let mut quoted = false;
    for (i, c) in s.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                let before = s[..i].to_ascii_lowercase();
                let in_expires = before
                    .rfind("expires=")
                    .map(|pos| !before[pos..].contains([';', ',']))
                    .unwrap_or(false);
                if !in_expires {
                    return &s[..i];
                }
            }
            _ => {}
        }
    }
    s
}

/// RFC 7230 token: visible ASCII except separators.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"'
                        | b'/' | b'[' | b']' | b'?' | b'=' | b'{' | b'}'
                )
        })
}

/// Username and password answered to a Basic challenge.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// None if either part is empty.
    pub fn new(username: &str, password: &str) -> Option<Self> {
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// `Basic base64(username:password)`.
    pub fn basic_authorization(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", BASE64.encode(raw.as_bytes()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Cookie jar plus credential slot. Cookies are append-only and kept in insertion order.
#[derive(Debug, Default)]
pub struct Session {
    cookies: Mutex<Vec<Cookie>>,
    credentials: RwLock<Option<Credentials>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide session used by clients that were not given their own.
    pub fn global() -> Arc<Session> {
        static GLOBAL: OnceLock<Arc<Session>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Session::new())).clone()
    }

    /// Parse and append a cookie. Empty input is ignored. No deduplication.
    pub fn add_cookie(&self, cookie: &str) -> Result<()> {
        if cookie.trim().is_empty() {
            return Ok(());
        }
        let cookie = Cookie::parse(cookie)?;
        debug!(name = %cookie.name(), "cookie added to session");
        self.cookies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(cookie);
        Ok(())
    }

    /// Snapshot of the jar.
    pub fn cookies(&self) -> Vec<Cookie> {
        self.cookies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Cookies joined with `;`, or None when the jar is empty.
    pub fn cookie_header(&self) -> Option<String> {
        let cookies = self.cookies.lock().unwrap_or_else(|e| e.into_inner());
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(Cookie::to_string)
                .collect::<Vec<_>>()
                .join(";"),
        )
    }

    /// Append each parsed cookie not already in the jar (same name and value).
    /// Returns how many were added.
    pub fn merge_cookies(&self, cookies: impl IntoIterator<Item = Cookie>) -> usize {
        let mut jar = self.cookies.lock().unwrap_or_else(|e| e.into_inner());
        let mut added = 0;
        for cookie in cookies {
            if !jar.contains(&cookie) {
                jar.push(cookie);
                added += 1;
            }
        }
        added
    }

    pub fn clear_cookies(&self) {
        self.cookies.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Install the credential pair, replacing any previous pair. Returns false (and leaves
    /// the session untouched) if either part is empty.
    pub fn set_credentials(&self, username: &str, password: &str) -> bool {
        let Some(credentials) = Credentials::new(username, password) else {
            return false;
        };
        *self.credentials.write().unwrap_or_else(|e| e.into_inner()) = Some(credentials);
        true
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn clear_credentials(&self) {
        *self.credentials.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_attributes_dropped() {
        let c = Cookie::parse("sid=abc123; Path=/; HttpOnly").unwrap();
        assert_eq!(c.to_string(), "sid=abc123");
    }

    #[test]
    fn set_cookie_prefix_and_first_of_list() {
        let c = Cookie::parse("Set-Cookie: a=1; Expires=Wed, 09 Jun 2027 10:18:14 GMT, b=2").unwrap();
        assert_eq!(c.name(), "a");
        assert_eq!(c.value(), "1");
        let c = Cookie::parse("x=\"q,r\", y=2").unwrap();
        assert_eq!(c.value(), "\"q,r\"");
    }

    #[test]
    fn malformed_cookies_rejected() {
        assert!(Cookie::parse("novalue").unwrap_err().is_invalid_argument());
        assert!(Cookie::parse("=abc").is_err());
        assert!(Cookie::parse("bad name=1").is_err());
        assert!(Cookie::parse("$Version=1").is_err());
    }

    #[test]
    fn non_ascii_value_does_not_split_prefix_check() {
        let c = Cookie::parse("a=ééééééééé").unwrap();
        assert_eq!(c.value(), "ééééééééé");
        let c = Cookie::parse("ü=1").unwrap_err();
        assert!(c.is_invalid_argument());
    }

    #[test]
    fn control_characters_in_value_rejected() {
        let s = Session::new();
        let err = s.add_cookie("sid=abc\r\nX-Injected: 1").unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(Cookie::parse("sid=a\tb").is_err());
        assert!(Cookie::parse("sid=a\x7fb").is_err());
        assert!(s.cookies().is_empty());
    }

    #[test]
    fn merge_skips_cookies_already_present() {
        let s = Session::new();
        s.add_cookie("sid=abc123").unwrap();
        let parsed = vec![Cookie::parse("sid=abc123").unwrap(), Cookie::parse("lang=en").unwrap()];
        assert_eq!(s.merge_cookies(parsed.clone()), 1);
        assert_eq!(s.merge_cookies(parsed), 0);
        assert_eq!(s.cookie_header().as_deref(), Some("sid=abc123;lang=en"));
    }

    #[test]
    fn clear_empties_the_jar() {
        let s = Session::new();
        s.add_cookie("sid=abc123").unwrap();
        s.clear_cookies();
        assert!(s.cookies().is_empty());
        assert_eq!(s.cookie_header(), None);
    }

    #[test]
    fn header_joins_in_insertion_order() {
        let s = Session::new();
        assert_eq!(s.cookie_header(), None);
        s.add_cookie("sid=abc123").unwrap();
        s.add_cookie("theme=dark; Path=/").unwrap();
        s.add_cookie("sid=abc123").unwrap();
        assert_eq!(s.cookie_header().as_deref(), Some("sid=abc123;theme=dark;sid=abc123"));
    }

    #[test]
    fn empty_cookie_is_noop() {
        let s = Session::new();
        s.add_cookie("").unwrap();
        s.add_cookie("   ").unwrap();
        assert!(s.cookies().is_empty());
    }

    #[test]
    fn empty_credentials_not_installed() {
        let s = Session::new();
        assert!(!s.set_credentials("", "secret"));
        assert!(!s.set_credentials("admin", ""));
        assert!(s.credentials().is_none());
    }

    #[test]
    fn credentials_last_write_wins() {
        let s = Session::new();
        assert!(s.set_credentials("a", "1"));
        assert!(s.set_credentials("b", "2"));
        assert_eq!(s.credentials().unwrap().username(), "b");
        s.clear_credentials();
        assert!(s.credentials().is_none());
    }

    #[test]
    fn basic_authorization_value() {
        let c = Credentials::new("user", "pass").unwrap();
        assert_eq!(c.basic_authorization(), "Basic dXNlcjpwYXNz");
        assert!(!format!("{:?}", c).contains("pass\""));
    }

    #[test]
    fn global_session_is_shared() {
        assert!(Arc::ptr_eq(&Session::global(), &Session::global()));
    }
}
