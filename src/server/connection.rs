//! Per-connection request loop and keep-alive state machine.

use crate::{
    config::ServerContext,
    errors::ErrorKind,
    http::{
        request::{Parser, Request},
        response::Response,
        types::{StatusCode, Version},
    },
    limits::ConnectionLimits,
    server::{gate, handlers},
};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

/// One worker's connection state, reused across the connections it serves.
pub(crate) struct HttpConnection {
    tag: String,
    parser: Parser,
    served: usize,
}

impl HttpConnection {
    #[inline]
    pub(crate) fn new(tag: String) -> Self {
        Self {
            tag,
            parser: Parser::new(),
            served: 0,
        }
    }

    #[inline]
    pub(crate) fn tag(&self) -> &str {
        &self.tag
    }

    #[inline]
    fn reset(&mut self) {
        self.parser.reset();
        self.served = 0;
    }

    /// Drives one accepted connection until it closes.
    ///
    /// Each cycle reads a request under the idle deadline, screens it,
    /// dispatches, writes the full response, and then decides whether the
    /// connection survives. The response for request N is fully written
    /// before request N+1 is read. `stopping` is checked between requests so
    /// shutdown lets in-flight work finish.
    pub(crate) async fn run<S>(
        &mut self,
        stream: &mut S,
        ctx: &ServerContext,
        stopping: &AtomicBool,
    ) where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.reset();
        let limits = &ctx.config.limits;

        while self.served < limits.connection.max_requests && !stopping.load(Ordering::Relaxed) {
            let request = match self
                .parser
                .read_request(stream, &limits.request, limits.connection.idle_timeout)
                .await
            {
                Ok(Some(request)) => request,
                Ok(None) => break,
                Err(ErrorKind::Timeout) => {
                    info!(tag = %self.tag, "Connection timeout");
                    break;
                }
                Err(ErrorKind::Closed) => {
                    info!(tag = %self.tag, "Client disconnected");
                    break;
                }
                Err(ErrorKind::Io(err)) => {
                    warn!(tag = %self.tag, "Socket error: {err}");
                    break;
                }
                Err(err) => {
                    // Protocol violations get a response; all of them close.
                    let mut response = err.into_response();
                    response.keep_alive = false;
                    let _ = writer::write_response(stream, &response, &limits.connection).await;
                    break;
                }
            };

            info!(
                tag = %self.tag,
                "Request: {} {} {}",
                request.method().as_str(),
                request.target().escape_debug(),
                request.version().as_str(),
            );

            let mut response = match gate::screen(&request, ctx) {
                Ok(action) => handlers::dispatch(action, &request, ctx, &self.tag)
                    .await
                    .unwrap_or_else(ErrorKind::into_response),
                Err(err) => {
                    self.log_refusal(&err, &request);
                    err.into_response()
                }
            };

            let served_now = self.served + 1;
            response.keep_alive =
                keep_alive(&request, response.status(), served_now, &limits.connection);

            if let Err(err) = writer::write_response(stream, &response, &limits.connection).await {
                warn!(tag = %self.tag, "Failed to write response: {err}");
                break;
            }

            info!(
                tag = %self.tag,
                "Response: {} {} ({} bytes)",
                response.status().code(),
                response.status().reason(),
                response.body_len(),
            );

            self.served = served_now;
            if !response.keep_alive {
                break;
            }
        }

        let _ = stream.shutdown().await;
        info!(tag = %self.tag, "Connection closed ({} requests served)", self.served);
    }

    fn log_refusal(&self, err: &ErrorKind, request: &Request) {
        match err {
            ErrorKind::MissingHost => {
                warn!(tag = %self.tag, "Security violation: missing Host header");
            }
            ErrorKind::HostNotAllowed => {
                let host = request.header("host").unwrap_or("");
                warn!(
                    tag = %self.tag,
                    "Security violation: invalid Host header: {}",
                    host.escape_debug(),
                );
            }
            ErrorKind::PathOutsideRoot => {
                warn!(
                    tag = %self.tag,
                    "Security violation: path traversal attempt: {}",
                    request.target().escape_debug(),
                );
            }
            _ => {}
        }
    }
}

/// Decides whether the connection survives the request just answered.
///
/// Rules, in order: any error other than 404 closes; HTTP/1.0 stays open
/// only on an explicit `Connection: keep-alive`; HTTP/1.1 closes only on an
/// explicit `Connection: close`; the per-connection request cap closes (and
/// the capped response already carries `Connection: close`).
pub(crate) fn keep_alive(
    request: &Request,
    status: StatusCode,
    served: usize,
    limits: &ConnectionLimits,
) -> bool {
    if status.code() >= 400 && status != StatusCode::NotFound {
        return false;
    }

    let connection = request
        .header("connection")
        .map(|value| value.trim().to_ascii_lowercase());

    let wanted = match request.version() {
        Version::Http10 => connection.as_deref() == Some("keep-alive"),
        Version::Http11 => connection.as_deref() != Some("close"),
    };

    wanted && served < limits.max_requests
}

pub(crate) mod writer {
    use super::*;
    use std::io;
    use tokio::time::timeout;

    /// Frames and writes one full response, bounded by the write timeout.
    pub(crate) async fn write_response<S>(
        stream: &mut S,
        response: &Response,
        limits: &ConnectionLimits,
    ) -> io::Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        let bytes = response.encode(limits);

        match timeout(limits.write_timeout, stream.write_all(&bytes)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "response write timed out",
            )),
        }
    }
}
