use crate::http::{response::Response, types::StatusCode};
use std::{error, fmt, io};

/// Everything that can go wrong while serving one request.
///
/// The first three variants are transport conditions: the connection worker
/// closes the socket without writing a response. Every other variant maps to
/// a concrete HTTP error response via [`ErrorKind::into_response`].
#[derive(Debug)]
pub(crate) enum ErrorKind {
    // Transport conditions - no response is written.
    Timeout,
    Closed,
    Io(io::Error),

    // Protocol violations detected by the codec.
    MalformedRequest,
    HeadTooLarge,
    UnsupportedVersion,
    InvalidContentLength,
    BodyTooLarge,
    ChunkedBody,

    // Refusals from the security gate.
    MissingHost,
    HostNotAllowed,
    PathOutsideRoot,
    MethodNotAllowed,
    UnsupportedMedia,

    // Handler outcomes.
    NotFound,
    InvalidJson,
    Internal,

    // Admission control.
    Overloaded,
}

macro_rules! http_errors {
    ($( $name:ident => $status:ident, $code:literal, $message:literal; )*) => {
        impl ErrorKind {
            pub(crate) fn status(&self) -> StatusCode {
                match self {
                    $( Self::$name { .. } => StatusCode::$status, )*
                    Self::Timeout | Self::Closed | Self::Io { .. } => {
                        StatusCode::InternalServerError
                    }
                }
            }

            pub(crate) fn body(&self) -> &'static str {
                match self {
                    $( Self::$name { .. } => concat!(
                        r#"{"error":""#, $message, r#"","code":""#, $code, r#""}"#
                    ), )*
                    Self::Timeout | Self::Closed | Self::Io { .. } => "",
                }
            }
        }
    };
}

http_errors! {
    MalformedRequest => BadRequest, "MALFORMED_REQUEST", "Malformed request";
    HeadTooLarge => BadRequest, "HEADERS_TOO_LARGE", "Request header block too large";
    UnsupportedVersion => BadRequest, "UNSUPPORTED_VERSION", "Unsupported HTTP version";
    InvalidContentLength => BadRequest, "INVALID_CONTENT_LENGTH", "Invalid Content-Length";
    BodyTooLarge => BadRequest, "BODY_TOO_LARGE", "Request body too large";
    ChunkedBody => BadRequest, "CHUNKED_UNSUPPORTED", "Transfer-Encoding is not supported";
    MissingHost => BadRequest, "MISSING_HOST", "Missing Host header";
    InvalidJson => BadRequest, "INVALID_JSON", "Invalid JSON data";

    HostNotAllowed => Forbidden, "INVALID_HOST", "Invalid Host header";
    PathOutsideRoot => Forbidden, "ACCESS_DENIED", "Access denied";

    NotFound => NotFound, "NOT_FOUND", "File not found";
    MethodNotAllowed => MethodNotAllowed, "METHOD_NOT_ALLOWED", "Method not allowed";
    UnsupportedMedia => UnsupportedMediaType, "UNSUPPORTED_MEDIA_TYPE", "Unsupported media type";

    Internal => InternalServerError, "INTERNAL_ERROR", "Internal server error";
    Overloaded => ServiceUnavailable, "SERVICE_UNAVAILABLE", "Service temporarily unavailable";
}

impl ErrorKind {
    /// Builds the fully-framed error response. Error bodies are short JSON
    /// with a stable machine-readable code; they never echo client input or
    /// filesystem paths.
    pub(crate) fn into_response(self) -> Response {
        let status = self.status();
        let response = Response::new(status)
            .content_type("application/json")
            .body(self.body());

        match status {
            StatusCode::MethodNotAllowed => response.header("Allow", "GET, POST"),
            StatusCode::ServiceUnavailable => response.header("Retry-After", "5"),
            _ => response,
        }
    }
}

impl error::Error for ErrorKind {}
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => ErrorKind::Closed,
            io::ErrorKind::TimedOut => ErrorKind::Timeout,
            _ => ErrorKind::Io(err),
        }
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;
    use crate::limits::ConnectionLimits;

    #[test]
    fn status_mapping() {
        let cases = [
            (ErrorKind::MalformedRequest, 400),
            (ErrorKind::HeadTooLarge, 400),
            (ErrorKind::BodyTooLarge, 400),
            (ErrorKind::MissingHost, 400),
            (ErrorKind::InvalidJson, 400),
            (ErrorKind::HostNotAllowed, 403),
            (ErrorKind::PathOutsideRoot, 403),
            (ErrorKind::NotFound, 404),
            (ErrorKind::MethodNotAllowed, 405),
            (ErrorKind::UnsupportedMedia, 415),
            (ErrorKind::Internal, 500),
            (ErrorKind::Overloaded, 503),
        ];

        for (err, code) in cases {
            assert_eq!(err.status().code(), code, "{err}");
        }
    }

    #[test]
    fn bodies_are_json() {
        let body = ErrorKind::PathOutsideRoot.body();
        let value: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(value["code"], "ACCESS_DENIED");
    }

    #[test]
    fn method_not_allowed_lists_methods() {
        let wire = ErrorKind::MethodNotAllowed
            .into_response()
            .encode(&ConnectionLimits::default());
        let text = String::from_utf8(wire).unwrap();
        assert!(text.contains("Allow: GET, POST\r\n"));
    }

    #[test]
    fn overloaded_carries_retry_after() {
        let wire = ErrorKind::Overloaded
            .into_response()
            .encode(&ConnectionLimits::default());
        let text = String::from_utf8(wire).unwrap();
        assert!(text.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
        assert!(text.contains("Retry-After: 5\r\n"));
    }
}
