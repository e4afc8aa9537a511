/*
 * pipeline.rs
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

//! Background `open`: run `connect` on a worker runtime, optionally under a deadline, and
//! deliver exactly one result.
//!
//! The result is delivered either by awaiting the returned `OpenHandle`, or through
//! `OpenHandle::subscribe`, which runs a callback on a `CompletionContext` (for example a
//! `CompletionQueue` drained by a UI thread). Dropping the handle or cancelling the
//! subscription aborts the attempt; the aborted connect drops whatever transport it had
//! opened.

use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::{Client, ConnectionRequest};
use crate::error::{MjpegError, Result};
use crate::frame::FrameStream;

/// Worker runtime for clients used outside any tokio runtime.
fn shared_runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("mjpeg-io")
            .enable_all()
            .build()
            .expect("failed to create tokio runtime")
    })
}

impl Client {
    /// Open the stream in the background with no deadline.
    pub fn open(&self, url: impl Into<String>) -> OpenHandle {
        self.submit(ConnectionRequest::new(url, None, self.variant()))
    }

    /// Open the stream in the background; `Timeout` is delivered if it is not open
    /// within `timeout`.
    pub fn open_timeout(&self, url: impl Into<String>, timeout: Duration) -> OpenHandle {
        self.submit(ConnectionRequest::new(url, Some(timeout), self.variant()))
    }

    pub fn open_with_timeout_secs(&self, url: impl Into<String>, timeout_secs: u64) -> OpenHandle {
        self.open_timeout(url, Duration::from_secs(timeout_secs))
    }

    fn worker_handle(&self) -> Handle {
        self.runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .unwrap_or_else(|| shared_runtime().handle().clone())
    }

    fn submit(&self, request: ConnectionRequest) -> OpenHandle {
        let runtime = self.worker_handle();
        let client = self.clone();
        let task = runtime.spawn(async move { run(client, request).await });
        OpenHandle { task, runtime }
    }
}

async fn run(client: Client, request: ConnectionRequest) -> Result<FrameStream> {
    let result = match request.timeout {
        Some(limit) => match tokio::time::timeout(limit, client.connect_request(&request)).await {
            Ok(result) => result,
            Err(_) => Err(MjpegError::Timeout(limit)),
        },
        None => client.connect_request(&request).await,
    };
    if let Err(e) = &result {
        warn!(url = %request.url, error = %e, "error during connection");
    }
    result
}

/// Pending `open`. Await it for the result, or `subscribe` to have it delivered elsewhere.
/// Dropping it cancels the attempt.
#[must_use = "dropping an OpenHandle cancels the connection attempt"]
pub struct OpenHandle {
    task: JoinHandle<Result<FrameStream>>,
    runtime: Handle,
}

impl OpenHandle {
    /// Abort the attempt. Any transport it opened is closed.
    pub fn cancel(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Deliver the result by running `callback` on `context`.
    pub fn subscribe<C, F>(self, context: C, callback: F) -> Subscription
    where
        C: CompletionContext + 'static,
        F: FnOnce(Result<FrameStream>) + Send + 'static,
    {
        let runtime = self.runtime.clone();
        let task = runtime.spawn(async move {
            let result = self.await;
            context.dispatch(Box::new(move || callback(result)));
        });
        Subscription { task }
    }
}

impl Future for OpenHandle {
    type Output = Result<FrameStream>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.task).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(e)) if e.is_cancelled() => {
                Poll::Ready(Err(MjpegError::InvariantViolation("connect task cancelled")))
            }
            Poll::Ready(Err(_)) => Poll::Ready(Err(MjpegError::InvariantViolation("connect task panicked"))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for OpenHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Interest in a subscribed `open`. Dropping it does not cancel; call `cancel`.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Abandon interest. If the result has not been dispatched yet, the attempt is
    /// aborted and its transport released.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// True once the result has been handed to the completion context (or cancelled).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Deferred work run on the completion context.
pub type Completion = Box<dyn FnOnce() + Send>;

/// Where subscribed results are delivered.
pub trait CompletionContext: Send + Sync {
    fn dispatch(&self, completion: Completion);
}

/// Run completions as tasks on a tokio runtime.
impl CompletionContext for Handle {
    fn dispatch(&self, completion: Completion) {
        self.spawn(async move { completion() });
    }
}

/// Queue of completions drained by the thread that owns it (e.g. a UI loop).
pub struct CompletionQueue {
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl CompletionQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Context that posts to this queue.
    pub fn context(&self) -> QueueContext {
        QueueContext {
            tx: self.tx.clone(),
        }
    }

    /// Run every completion already queued; returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut n = 0;
        while let Ok(completion) = self.rx.try_recv() {
            completion();
            n += 1;
        }
        n
    }

    /// Wait for the next completion and run it.
    pub async fn run_next(&mut self) {
        if let Some(completion) = self.rx.recv().await {
            completion();
        }
    }
}

impl Default for CompletionQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Sending side of a `CompletionQueue`.
#[derive(Clone)]
pub struct QueueContext {
    tx: mpsc::UnboundedSender<Completion>,
}

impl CompletionContext for QueueContext {
    fn dispatch(&self, completion: Completion) {
        if self.tx.send(completion).is_err() {
            // Queue gone; the result (and its transport) is dropped here.
            debug!("completion queue closed, dropping result");
        }
    }
}
