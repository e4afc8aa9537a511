/*
 * lib.rs
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

//! mjpegtls core: open TLS-secured MJPEG streams from IP cameras and embedded servers.
//!
//! A `Client` carries the stream variant, request options, the shared `Session` (cookies and
//! Basic credentials) and a `TrustPolicy`. `Client::open` runs the connection in the
//! background and resolves to a `FrameStream`, from which JPEG frames are pulled:
//!
//! ```no_run
//! # async fn demo() -> mjpegtls_core::Result<()> {
//! use mjpegtls_core::{Client, Variant};
//!
//! let client = Client::new(Variant::Native)
//!     .with_credentials("admin", "secret")
//!     .add_cookie("sid=abc123")?;
//! let mut stream = client.open_with_timeout_secs("https://camera.local/video.mjpg", 10).await?;
//! while let Some(frame) = stream.next_frame().await? {
//!     println!("frame {} ({} bytes)", frame.sequence(), frame.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod frame;
pub mod net;
pub mod pipeline;
pub mod protocol;
pub mod session;
pub mod trust;
pub mod uri;

pub use client::{Client, ConnectionRequest};
pub use config::{ClientConfig, TrustMode};
pub use error::{HttpStatusError, MjpegError, Result};
pub use frame::{Frame, FrameStream, NativeFrameStream, StandardFrameStream, Variant, MAX_FRAME_SIZE};
pub use net::{BoxedTransport, ConnectFuture, Connector, TcpTlsConnector, Transport};
pub use pipeline::{Completion, CompletionContext, CompletionQueue, OpenHandle, QueueContext, Subscription};
pub use session::{Cookie, Credentials, Session};
pub use trust::{AcceptAnyCertificate, PinnedCertificate, PolicyVerifier, TrustPolicy, WebPkiTrust};
pub use uri::StreamUrl;
