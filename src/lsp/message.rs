//! JSON-RPC wire framing and message classification.
//!
//! Every message is `Content-Length: <N>\r\n\r\n` followed by exactly N bytes
//! of UTF-8 JSON. Received messages come in exactly three shapes, modeled as
//! an exhaustive enum rather than ad hoc field sniffing: server-initiated
//! requests (`id` + `method`), notifications (`method`, no `id`), and
//! responses (`id`, no `method`).

use std::io::{BufRead, Write};

use serde_json::{Value, json};

use super::Result;
use super::error::LspError;

/// A message received from the server, classified by wire shape.
#[derive(Debug)]
pub(crate) enum Incoming {
    /// Server-initiated request; must be acknowledged so the server does not
    /// stall (e.g. `window/workDoneProgress/create`).
    Request {
        /// Request id, echoed back in the acknowledgement.
        id: Value,
        /// Request method name.
        method: String,
        /// Request parameters.
        params: Value,
    },
    /// Unsolicited notification, forwarded to the notification handler.
    Notification {
        /// Notification method name.
        method: String,
        /// Notification parameters.
        params: Value,
    },
    /// Response to one of our requests.
    Response {
        /// The id of the request this answers.
        id: i64,
        /// Successful result, when present.
        result: Option<Value>,
        /// JSON-RPC error object, when present.
        error: Option<ResponseError>,
    },
}

/// The `error` member of a JSON-RPC response.
#[derive(Debug)]
pub(crate) struct ResponseError {
    pub code: i64,
    pub message: String,
}

/// Build a framed request body.
pub(crate) fn request(id: i64, method: &str, params: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Build a framed notification body.
pub(crate) fn notification(method: &str, params: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
    })
}

/// Build an acknowledgement for a server-initiated request.
pub(crate) fn acknowledgement(id: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": null,
    })
}

/// Write one framed message.
pub(crate) fn write_frame(writer: &mut dyn Write, message: &Value) -> Result<()> {
    let body = serde_json::to_string(message).map_err(LspError::Serialize)?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());

    writer.write_all(header.as_bytes())?;
    writer.write_all(body.as_bytes())?;
    writer.flush()?;

    Ok(())
}

/// Read one framed message body.
///
/// Returns `Ok(None)` on clean end-of-stream before any header byte. A
/// missing or unparsable `Content-Length`, or a short body read, is a fatal
/// frame error.
pub(crate) fn read_frame(reader: &mut dyn BufRead) -> Result<Option<Vec<u8>>> {
    let mut content_length: Option<usize> = None;
    let mut first_line = true;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line)?;

        if bytes_read == 0 {
            if first_line {
                return Ok(None);
            }
            return Err(LspError::Frame(
                "stream ended mid-header".to_string(),
            ));
        }
        first_line = false;

        // Empty line signals end of headers
        if line == "\r\n" || line == "\n" {
            break;
        }

        if let Some(value) = line.strip_prefix("Content-Length:") {
            let parsed = value.trim().parse().map_err(|_| {
                LspError::Frame(format!("invalid Content-Length: {}", value.trim()))
            })?;
            content_length = Some(parsed);
        }
    }

    let Some(content_length) = content_length else {
        return Err(LspError::Frame(
            "missing Content-Length header".to_string(),
        ));
    };

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;
    Ok(Some(body))
}

/// Classify a decoded message by wire shape.
///
/// Returns `None` for bodies that fit none of the three shapes (e.g. a
/// response whose id is not an integer); such messages are skipped, not
/// fatal.
pub(crate) fn classify(message: Value) -> Option<Incoming> {
    let method = message
        .get("method")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    let id = message.get("id").cloned();

    match (method, id) {
        (Some(method), Some(id)) => Some(Incoming::Request {
            id,
            method,
            params: message.get("params").cloned().unwrap_or(Value::Null),
        }),
        (Some(method), None) => Some(Incoming::Notification {
            method,
            params: message.get("params").cloned().unwrap_or(Value::Null),
        }),
        (None, Some(id)) => {
            let id = id.as_i64()?;
            let error = message.get("error").map(|e| ResponseError {
                code: e.get("code").and_then(Value::as_i64).unwrap_or(-1),
                message: e
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
            Some(Incoming::Response {
                id,
                result: message.get("result").cloned(),
                error,
            })
        }
        (None, None) => None,
    }
}
