/*
 * request.rs
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

//! Stream request: a bodiless GET with ordered headers.

/// GET request for a stream. Headers keep insertion order; setting an existing name
/// (case-insensitive) replaces its value in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            headers: Vec::new(),
        }
    }

    /// Add or replace a header.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serialise request line, Host, and headers.
    pub fn encode(&self, host_header: &str) -> Vec<u8> {
        let mut req = format!("GET {} HTTP/1.1\r\nHost: {}\r\n", self.path, host_header);
        for (k, v) in &self.headers {
            req.push_str(k);
            req.push_str(": ");
            req.push_str(v);
            req.push_str("\r\n");
        }
        req.push_str("\r\n");
        req.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_keeps_header_order() {
        let mut r = Request::get("/video");
        r.header("Cache-Control", "no-cache").header("Cookie", "a=1");
        let wire = String::from_utf8(r.encode("camera.local")).unwrap();
        assert_eq!(
            wire,
            "GET /video HTTP/1.1\r\nHost: camera.local\r\nCache-Control: no-cache\r\nCookie: a=1\r\n\r\n"
        );
    }

    #[test]
    fn header_replaces_case_insensitively() {
        let mut r = Request::get("/");
        r.header("Connection", "keep-alive");
        r.header("connection", "close");
        assert_eq!(r.headers.len(), 1);
        assert_eq!(r.header_value("CONNECTION"), Some("close"));
    }
}
