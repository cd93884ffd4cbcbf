//! Response construction and wire framing.

use crate::{http::types::StatusCode, limits::ConnectionLimits};
use chrono::{DateTime, Utc};
use std::io::Write;

/// `Server` header value sent with every response.
pub(crate) const SERVER_NAME: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// One response, built by a handler and framed by [`Response::encode`].
///
/// The framing headers (`Date`, `Server`, `Content-Length`, `Connection`)
/// are emitted by `encode` and never set by callers; handlers only
/// contribute the status, the content type, handler-specific headers, and
/// the body. `keep_alive` is decided by the connection worker after the
/// handler runs.
#[derive(Debug, Clone)]
pub(crate) struct Response {
    status: StatusCode,
    content_type: Option<&'static str>,
    headers: Vec<(&'static str, String)>,
    body: Vec<u8>,
    pub(crate) keep_alive: bool,
}

impl Response {
    #[inline]
    pub(crate) fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_type: None,
            headers: Vec::new(),
            body: Vec::new(),
            keep_alive: true,
        }
    }

    #[inline]
    pub(crate) fn content_type(mut self, value: &'static str) -> Self {
        self.content_type = Some(value);
        self
    }

    #[inline]
    pub(crate) fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    #[inline]
    pub(crate) fn body(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.body = bytes.into();
        self
    }

    #[inline]
    pub(crate) const fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub(crate) fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Serialises the full response.
    ///
    /// Header order: `Date`, `Server`, `Content-Type`, `Content-Length`,
    /// `Connection`, `Keep-Alive` (when applicable), handler-specific
    /// headers. `Content-Length` is always present and exact, empty bodies
    /// included.
    pub(crate) fn encode(&self, limits: &ConnectionLimits) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.body.len());

        // Writes to a Vec cannot fail.
        out.extend_from_slice(self.status.status_line());
        let _ = write!(out, "Date: {}\r\n", imf_fixdate(Utc::now()));
        let _ = write!(out, "Server: {SERVER_NAME}\r\n");
        if let Some(content_type) = self.content_type {
            let _ = write!(out, "Content-Type: {content_type}\r\n");
        }
        let _ = write!(out, "Content-Length: {}\r\n", self.body.len());

        if self.keep_alive {
            out.extend_from_slice(b"Connection: keep-alive\r\n");
            let _ = write!(
                out,
                "Keep-Alive: timeout={}, max={}\r\n",
                limits.idle_timeout.as_secs(),
                limits.max_requests
            );
        } else {
            out.extend_from_slice(b"Connection: close\r\n");
        }

        for (name, value) in &self.headers {
            let _ = write!(out, "{name}: {value}\r\n");
        }

        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

/// RFC 7231 IMF-fixdate, e.g. `Sun, 02 Aug 2026 14:05:00 GMT`.
pub(crate) fn imf_fixdate(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
