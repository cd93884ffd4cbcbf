use crate::{
    errors::ErrorKind,
    http::types::{self, HeaderMap, Method, Version},
    limits::RequestLimits,
};
use memchr::{memchr, memmem, memrchr};
use std::{str, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    time::{timeout_at, Instant},
};

/// One decoded HTTP request.
///
/// The target is kept exactly as received on the wire; URL decoding and path
/// canonicalisation happen later in the security gate.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    target: String,
    version: Version,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Request {
    #[inline]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[inline]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Returns a header value by lowercase name, duplicates already
    /// concatenated (per [RFC 7230](https://tools.ietf.org/html/rfc7230#section-3.2)).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[cfg(test)]
    pub(crate) fn for_tests(
        method: Method,
        target: &str,
        version: Version,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Self {
        let mut map = HeaderMap::default();
        for (name, value) in headers {
            map.append(name.to_ascii_lowercase(), value);
        }

        Self {
            method,
            target: target.to_owned(),
            version,
            headers: map,
            body: body.to_vec(),
        }
    }
}

/// Incremental request reader bound to one connection.
///
/// Bytes read past the end of a request (a client that pipelines) stay in
/// the buffer and are consumed by the next [`Parser::read_request`] call, so
/// the stream never desynchronises.
#[derive(Debug, Default)]
pub(crate) struct Parser {
    buffer: Vec<u8>,
}

impl Parser {
    #[inline]
    pub(crate) fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Drops any residual bytes. Called when the parser is reused for a new
    /// connection.
    #[inline]
    pub(crate) fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Reads and decodes the next request.
    ///
    /// Returns `Ok(None)` when the peer closed the connection before sending
    /// any bytes. The `idle` duration bounds the entire read, head and body;
    /// expiry surfaces as [`ErrorKind::Timeout`].
    pub(crate) async fn read_request<R>(
        &mut self,
        stream: &mut R,
        limits: &RequestLimits,
        idle: Duration,
    ) -> Result<Option<Request>, ErrorKind>
    where
        R: AsyncRead + Unpin,
    {
        let deadline = Instant::now() + idle;

        let head_len = loop {
            if let Some(position) = memmem::find(&self.buffer, b"\r\n\r\n") {
                let head_len = position + 4;
                if head_len > limits.header_block_size {
                    return Err(ErrorKind::HeadTooLarge);
                }
                break head_len;
            }

            // Any terminator found from here on would end past the cap.
            if self.buffer.len() >= limits.header_block_size {
                return Err(ErrorKind::HeadTooLarge);
            }

            if self.read_some(stream, deadline).await? == 0 {
                return match self.buffer.is_empty() {
                    true => Ok(None),
                    false => Err(ErrorKind::Closed),
                };
            }
        };

        let mut request = parse_head(&self.buffer[..head_len])?;

        if request.header("transfer-encoding").is_some() {
            return Err(ErrorKind::ChunkedBody);
        }

        let body_len = match request.header("content-length") {
            Some(value) => types::parse_decimal(value.as_bytes())
                .ok_or(ErrorKind::InvalidContentLength)?,
            None => 0,
        };
        if body_len > limits.body_size {
            return Err(ErrorKind::BodyTooLarge);
        }

        while self.buffer.len() < head_len + body_len {
            if self.read_some(stream, deadline).await? == 0 {
                return Err(ErrorKind::Closed);
            }
        }

        request.body = self.buffer[head_len..head_len + body_len].to_vec();
        self.buffer.drain(..head_len + body_len);

        Ok(Some(request))
    }

    async fn read_some<R>(&mut self, stream: &mut R, deadline: Instant) -> Result<usize, ErrorKind>
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = [0u8; 8 * 1024];

        let read = timeout_at(deadline, stream.read(&mut chunk))
            .await
            .map_err(|_| ErrorKind::Timeout)??;

        self.buffer.extend_from_slice(&chunk[..read]);
        Ok(read)
    }
}

/// Decodes the request line and header block. `head` includes the
/// terminating blank line.
fn parse_head(head: &[u8]) -> Result<Request, ErrorKind> {
    let head = head
        .strip_suffix(b"\r\n\r\n")
        .ok_or(ErrorKind::MalformedRequest)?;

    let line_end = memmem::find(head, b"\r\n").unwrap_or(head.len());
    let request_line = &head[..line_end];

    // Three tokens; the target is everything between the first and the last
    // space, so a target containing spaces still round-trips.
    let first = memchr(b' ', request_line).ok_or(ErrorKind::MalformedRequest)?;
    let last = memrchr(b' ', request_line).ok_or(ErrorKind::MalformedRequest)?;
    if first == last {
        return Err(ErrorKind::MalformedRequest);
    }

    let method = Method::from_token(&request_line[..first])?;
    let target = str::from_utf8(&request_line[first + 1..last])
        .map_err(|_| ErrorKind::MalformedRequest)?;
    if target.is_empty() {
        return Err(ErrorKind::MalformedRequest);
    }
    let version = Version::from_bytes(&request_line[last + 1..])?;

    let mut headers = HeaderMap::default();
    let mut rest = &head[(line_end + 2).min(head.len())..];

    while !rest.is_empty() {
        let end = memmem::find(rest, b"\r\n").unwrap_or(rest.len());
        let line = &rest[..end];
        rest = &rest[(end + 2).min(rest.len())..];

        let colon = memchr(b':', line).ok_or(ErrorKind::MalformedRequest)?;
        let name = &line[..colon];
        if name.is_empty() || !name.iter().all(|b| types::is_tchar(*b)) {
            return Err(ErrorKind::MalformedRequest);
        }

        let value = str::from_utf8(&line[colon + 1..])
            .map_err(|_| ErrorKind::MalformedRequest)?
            .trim();

        // Names are ASCII at this point; lowercasing is infallible.
        let name = str::from_utf8(name)
            .map_err(|_| ErrorKind::MalformedRequest)?
            .to_ascii_lowercase();
        headers.append(name, value);
    }

    Ok(Request {
        method,
        target: target.to_owned(),
        version,
        headers,
        body: Vec::new(),
    })
}

#[cfg(test)]
mod parse_tests {
    use super::*;

    async fn parse(input: &[u8]) -> Result<Option<Request>, ErrorKind> {
        let mut input = input;
        Parser::new()
            .read_request(&mut input, &RequestLimits::default(), Duration::from_secs(5))
            .await
    }

    #[tokio::test]
    async fn simple_get() {
        let request = parse(b"GET /index.html HTTP/1.1\r\nHost: localhost:8080\r\n\r\n")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.target(), "/index.html");
        assert_eq!(request.version(), Version::Http11);
        assert_eq!(request.header("host"), Some("localhost:8080"));
        assert_eq!(request.body(), b"");
    }

    #[tokio::test]
    async fn header_names_case_insensitive() {
        let request = parse(b"GET / HTTP/1.1\r\nHOST: a\r\nConTent-TyPe:  text/plain \r\n\r\n")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(request.header("host"), Some("a"));
        assert_eq!(request.header("content-type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn duplicate_headers_concatenate() {
        let request = parse(b"GET / HTTP/1.1\r\nAccept: a\r\nAccept: b\r\n\r\n")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(request.header("accept"), Some("a, b"));
    }

    #[tokio::test]
    async fn post_with_body() {
        let request = parse(
            b"POST /upload HTTP/1.1\r\nHost: x\r\nContent-Length: 11\r\n\r\nhello world",
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(request.method(), Method::Post);
        assert_eq!(request.body(), b"hello world");
    }

    #[tokio::test]
    async fn http10_parses() {
        let request = parse(b"GET / HTTP/1.0\r\n\r\n").await.unwrap().unwrap();
        assert_eq!(request.version(), Version::Http10);
    }

    #[tokio::test]
    async fn eof_before_bytes_is_none() {
        assert!(parse(b"").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_mid_request_is_closed() {
        assert!(matches!(
            parse(b"GET / HTTP/1.1\r\nHos").await,
            Err(ErrorKind::Closed)
        ));
    }

    #[tokio::test]
    async fn malformed_request_lines() {
        let cases: [&[u8]; 5] = [
            b"GET/ HTTP/1.1\r\n\r\n",
            b"GET /\r\n\r\n",
            b"GET  HTTP/1.1\r\n\r\n",
            b"\r\n\r\n",
            b"GET / HTTP/1.1\r\nno-colon-here\r\n\r\n",
        ];

        for case in cases {
            assert!(
                matches!(parse(case).await, Err(ErrorKind::MalformedRequest)),
                "{:?}",
                String::from_utf8_lossy(case)
            );
        }
    }

    #[tokio::test]
    async fn unsupported_versions() {
        assert!(matches!(
            parse(b"GET / HTTP/2.0\r\n\r\n").await,
            Err(ErrorKind::UnsupportedVersion)
        ));
    }

    #[tokio::test]
    async fn chunked_rejected() {
        assert!(matches!(
            parse(b"POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n").await,
            Err(ErrorKind::ChunkedBody)
        ));
    }

    #[tokio::test]
    async fn invalid_content_length() {
        assert!(matches!(
            parse(b"POST / HTTP/1.1\r\nContent-Length: abc\r\n\r\n").await,
            Err(ErrorKind::InvalidContentLength)
        ));
    }

    #[tokio::test]
    async fn pipelined_requests_stay_buffered() {
        let mut input: &[u8] = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
        let mut parser = Parser::new();
        let limits = RequestLimits::default();

        let first = parser
            .read_request(&mut input, &limits, Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        let second = parser
            .read_request(&mut input, &limits, Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.target(), "/a");
        assert_eq!(second.target(), "/b");
    }
}
