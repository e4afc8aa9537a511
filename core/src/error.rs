/*
 * error.rs
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

//! Client errors.

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors delivered by client configuration, `connect`, and `open`.
#[derive(Debug, Error)]
pub enum MjpegError {
    /// Bad or missing configuration: unknown variant, malformed cookie, bad URL.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// TLS context or trust manager could not be built.
    #[error("TLS initialisation failed: {0}")]
    SecurityInit(String),

    /// DNS, connect, handshake, I/O, or a non-success HTTP status.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// The timed `open` exceeded its deadline.
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// A state the pipeline should never reach.
    #[error("invariant violation: {0}")]
    InvariantViolation(&'static str),
}

impl MjpegError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Transport error for a response whose status is not 2xx.
    pub fn status(code: u16, reason: Option<String>) -> Self {
        Self::Transport(io::Error::other(HttpStatusError { code, reason }))
    }

    /// HTTP status code when this error came from a non-success response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<HttpStatusError>())
                .map(|s| s.code),
            _ => None,
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Carried inside `MjpegError::Transport` when the server answered with an error status.
#[derive(Debug)]
pub struct HttpStatusError {
    pub code: u16,
    pub reason: Option<String>,
}

impl fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(r) => write!(f, "HTTP {} {}", self.code, r),
            None => write!(f, "HTTP {}", self.code),
        }
    }
}

impl std::error::Error for HttpStatusError {}

pub type Result<T> = std::result::Result<T, MjpegError>;
