//! Request/response correlation over a framed byte-stream pair.
//!
//! A [`Connection`] owns one background thread running the read loop for the
//! life of the stream. Callers issue [`Connection::call`] from any thread;
//! each call gets its own request id and result slot, so N callers can have N
//! requests in flight simultaneously. Writes are serialized by a mutex so
//! concurrent calls never interleave their byte streams; responses are
//! dispatched to whichever caller owns the matching id, in whatever order the
//! server answers.

use std::collections::HashMap;
use std::io::{BufReader, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::Result;
use super::error::LspError;
use super::message::{self, Incoming, ResponseError};

/// Callback invoked by the read loop for every server-initiated request and
/// notification, identified by method name.
pub type NotificationHandler = Arc<dyn Fn(&str, Value) + Send + Sync>;

/// Outcome delivered to a pending call's result slot.
enum Reply {
    Result(Value),
    Error(ResponseError),
}

/// Shared state between callers and the read loop.
struct Shared {
    /// In-flight requests: id -> single-slot result channel.
    pending: Mutex<HashMap<i64, mpsc::Sender<Reply>>>,
    /// Monotonically increasing request id source.
    next_id: AtomicI64,
    /// Set once the connection is closed or the read loop died.
    closed: AtomicBool,
    /// Fatal read-loop error, observable by the owner after the fact.
    fatal: Mutex<Option<LspError>>,
}

impl Shared {
    /// Fail every pending call so no caller hangs forever.
    ///
    /// Dropping the senders makes each blocked receiver observe
    /// disconnection, which `call` maps to [`LspError::Closed`].
    fn fail_all_pending(&self) {
        let mut pending = lock(&self.pending);
        let n = pending.len();
        pending.clear();
        if n > 0 {
            debug!(pending = n, "failed pending calls on connection close");
        }
    }
}

/// Lock a mutex, recovering the guard if a panicking thread poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// JSON-RPC connection with background read loop.
///
/// Created paired with a live byte-stream pair (normally a server process's
/// stdout/stdin) and destroyed when the stream ends or [`Connection::close`]
/// is invoked; either way all pending calls are failed rather than left
/// hanging.
pub struct Connection {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    shared: Arc<Shared>,
    reader: Option<JoinHandle<()>>,
}

impl Connection {
    /// Create a connection over a reader/writer pair and start the read loop.
    ///
    /// `handler` receives every notification and (after acknowledgement)
    /// every server-initiated request.
    pub fn new<R, W>(reader: R, writer: W, handler: NotificationHandler) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let writer: Arc<Mutex<Box<dyn Write + Send>>> = Arc::new(Mutex::new(Box::new(writer)));
        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            closed: AtomicBool::new(false),
            fatal: Mutex::new(None),
        });

        let loop_writer = Arc::clone(&writer);
        let loop_shared = Arc::clone(&shared);
        let reader = thread::Builder::new()
            .name("lsp-read-loop".to_string())
            .spawn(move || read_loop(reader, &loop_writer, &loop_shared, &handler))
            .expect("spawning the read-loop thread cannot fail");

        Self {
            writer,
            shared,
            reader: Some(reader),
        }
    }

    /// Send a request and wait for its response or the deadline.
    ///
    /// The wait races three outcomes: the matching response arriving, the
    /// connection closing, and `timeout` elapsing. On timeout the pending
    /// entry is removed so the map does not leak, and the error kind is
    /// distinct from a protocol error.
    ///
    /// # Errors
    ///
    /// Returns [`LspError::Closed`] when the connection is closed,
    /// [`LspError::Timeout`] when the deadline expires,
    /// [`LspError::ServerError`] when the server answers with a JSON-RPC
    /// error object, or a serialization/I/O error from the write path.
    pub fn call(&self, method: &str, params: &Value, timeout: Duration) -> Result<Value> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(LspError::Closed);
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel();
        lock(&self.shared.pending).insert(id, tx);

        trace!(method, id, "sending LSP request");

        let request = message::request(id, method, params);
        if let Err(e) = self.write(&request) {
            lock(&self.shared.pending).remove(&id);
            return Err(e);
        }

        match rx.recv_timeout(timeout) {
            Ok(Reply::Result(value)) => Ok(value),
            Ok(Reply::Error(err)) => Err(LspError::server_error(err.code, err.message)),
            Err(RecvTimeoutError::Timeout) => {
                lock(&self.shared.pending).remove(&id);
                Err(LspError::timeout(method))
            }
            Err(RecvTimeoutError::Disconnected) => Err(LspError::Closed),
        }
    }

    /// Send a notification; no response is awaited.
    ///
    /// # Errors
    ///
    /// Returns [`LspError::Closed`] on a closed connection, or a
    /// serialization/I/O error from the write path.
    pub fn notify(&self, method: &str, params: &Value) -> Result<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(LspError::Closed);
        }
        trace!(method, "sending LSP notification");
        self.write(&message::notification(method, params))
    }

    /// Mark the connection closed and fail all pending calls.
    ///
    /// The read-loop thread itself unblocks when the underlying stream is
    /// closed by the owner (normally by stopping the server process).
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("closing LSP connection");
        self.shared.fail_all_pending();
    }

    /// Number of requests currently awaiting a response.
    ///
    /// Exposed for diagnostics; the count returns to its baseline once every
    /// call has completed, timed out, or been failed by closure.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        lock(&self.shared.pending).len()
    }

    /// The fatal error that terminated the read loop, if any.
    pub fn take_fatal_error(&self) -> Option<LspError> {
        lock(&self.shared.fatal).take()
    }

    fn write(&self, body: &Value) -> Result<()> {
        let mut writer = lock(&self.writer);
        message::write_frame(writer.as_mut(), body)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
        // The read loop ends when the stream does; detach rather than block
        // a caller that still owns a live server.
        if let Some(handle) = self.reader.take()
            && handle.is_finished()
        {
            let _ = handle.join();
        }
    }
}

/// The background read loop: one framed message at a time, classified and
/// dispatched until the stream ends or framing breaks.
fn read_loop(
    reader: impl Read,
    writer: &Arc<Mutex<Box<dyn Write + Send>>>,
    shared: &Arc<Shared>,
    handler: &NotificationHandler,
) {
    let mut reader = BufReader::new(reader);

    loop {
        let body = match message::read_frame(&mut reader) {
            Ok(Some(body)) => body,
            Ok(None) => {
                debug!("server stream ended");
                break;
            }
            Err(e) => {
                warn!(error = %e, "fatal transport error in read loop");
                *lock(&shared.fatal) = Some(e);
                break;
            }
        };

        // Malformed JSON inside a well-framed body is skipped, not fatal:
        // framing stays aligned because the body length was honored.
        let value: Value = match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "skipping malformed message body");
                continue;
            }
        };

        match message::classify(value) {
            Some(Incoming::Request { id, method, params }) => {
                trace!(method, "acknowledging server request");
                let ack = message::acknowledgement(&id);
                if let Err(e) = message::write_frame(lock(writer).as_mut(), &ack) {
                    warn!(error = %e, "failed to acknowledge server request");
                }
                handler(&method, params);
            }
            Some(Incoming::Notification { method, params }) => {
                handler(&method, params);
            }
            Some(Incoming::Response { id, result, error }) => {
                let slot = lock(&shared.pending).remove(&id);
                match slot {
                    Some(tx) => {
                        let reply = match error {
                            Some(err) => Reply::Error(err),
                            None => Reply::Result(result.unwrap_or(Value::Null)),
                        };
                        // A caller that timed out already dropped its receiver.
                        let _ = tx.send(reply);
                    }
                    None => trace!(id, "discarding response with no pending call"),
                }
            }
            None => trace!("skipping message that matches no wire shape"),
        }
    }

    shared.closed.store(true, Ordering::Release);
    shared.fail_all_pending();
}
