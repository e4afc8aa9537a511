/*
 * mod.rs
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

//! HTTP/1.1 client side of a streaming GET.
//!
//! - Request: request line, Host, caller headers; no body.
//! - Response: push-parsed head, then the body handed out as a `BodyStream`.
//! - Buffers: `bytes` crate (BytesMut for the parse buffer, Bytes for body chunks).
//! - Multipart: this layer only delivers the raw body; `frame` splits it into JPEGs.

mod request;

pub mod connection;
pub mod h1;

pub use connection::{BodyStream, HttpConnection, ResponseHead};
pub use request::Request;
