//! Core HTTP protocol types shared by the parser, the framer, and the
//! request handlers.

use crate::errors::ErrorKind;

// METHOD

/// HTTP request methods.
///
/// Only `GET` and `POST` are dispatchable; every other syntactically valid
/// token parses as [`Method::Other`] and is refused by the security gate
/// with `405 Method Not Allowed`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET method - fetch a file from the content root
    /// [[RFC7231, Section 4.3.1](https://tools.ietf.org/html/rfc7231#section-4.3.1)]
    Get,
    /// POST method - submit a JSON document for persistence
    /// [[RFC7231, Section 4.3.3](https://tools.ietf.org/html/rfc7231#section-4.3.3)]
    Post,
    /// Any other valid token (PUT, DELETE, HEAD, ...). Parsed, never served.
    Other,
}

impl Method {
    #[inline]
    pub(crate) fn from_token(token: &[u8]) -> Result<Self, ErrorKind> {
        match token {
            b"GET" => Ok(Method::Get),
            b"POST" => Ok(Method::Post),
            t if !t.is_empty() && t.iter().all(|b| is_tchar(*b)) => Ok(Method::Other),
            _ => Err(ErrorKind::MalformedRequest),
        }
    }

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Other => "OTHER",
        }
    }
}

// `tchar` per RFC 7230 section 3.2.6.
#[inline(always)]
pub(crate) fn is_tchar(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}

// VERSION

/// HTTP protocol version.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    /// HTTP/1.0 - connections close by default
    /// [RFC 1945](https://tools.ietf.org/html/rfc1945)
    Http10,

    /// HTTP/1.1 - persistent connections by default
    /// [RFC 7230](https://tools.ietf.org/html/rfc7230) and related
    Http11,
}

impl Version {
    #[inline]
    pub(crate) const fn from_bytes(src: &[u8]) -> Result<Self, ErrorKind> {
        match src {
            b"HTTP/1.1" => Ok(Self::Http11),
            b"HTTP/1.0" => Ok(Self::Http10),
            _ => Err(ErrorKind::UnsupportedVersion),
        }
    }

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

// STATUS_CODE

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])+
        $name:ident = ($num:expr, $str:expr);
    )+) => {
        /// HTTP status codes emitted by the server.
        ///
        /// Restricted to the codes this server actually produces; reason
        /// phrases are the IANA defaults.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])+
            $name = $num,
        )+ }

        impl StatusCode {
            // Responses are always framed as HTTP/1.1 regardless of the
            // request version.
            #[inline]
            pub(crate) const fn status_line(self) -> &'static [u8] {
                match self { $(
                    StatusCode::$name => {
                        concat!("HTTP/1.1 ", $num, " ", $str, "\r\n").as_bytes()
                    },
                )+ }
            }

            #[inline]
            pub const fn code(self) -> u16 {
                self as u16
            }

            #[inline]
            pub const fn reason(self) -> &'static str {
                match self { $(
                    StatusCode::$name => $str,
                )+ }
            }
        }
    }
}

set_status_codes! {
    /// [[RFC9110, Section 15.3.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.1)]
    Ok = (200, "OK");
    /// [[RFC9110, Section 15.3.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.2)]
    Created = (201, "Created");

    /// [[RFC9110, Section 15.5.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.1)]
    BadRequest = (400, "Bad Request");
    /// [[RFC9110, Section 15.5.4](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.4)]
    Forbidden = (403, "Forbidden");
    /// [[RFC9110, Section 15.5.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.5)]
    NotFound = (404, "Not Found");
    /// [[RFC9110, Section 15.5.6](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.6)]
    MethodNotAllowed = (405, "Method Not Allowed");
    /// [[RFC9110, Section 15.5.16](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.16)]
    UnsupportedMediaType = (415, "Unsupported Media Type");

    /// [[RFC9110, Section 15.6.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.1)]
    InternalServerError = (500, "Internal Server Error");
    /// [[RFC9110, Section 15.6.4](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.4)]
    ServiceUnavailable = (503, "Service Unavailable");
}

// HEADERS

/// Case-insensitive header multimap.
///
/// Names are stored lowercased; the first occurrence fixes the position and
/// later duplicates are concatenated with `", "` per RFC 7230 section 3.2.2.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    #[inline]
    pub(crate) fn append(&mut self, name: String, value: &str) {
        debug_assert!(name.chars().all(|c| !c.is_ascii_uppercase()));

        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => self.entries.push((name, value.to_owned())),
        }
    }

    /// Lookup by lowercase name. Linear search; header counts are bounded by
    /// the 8 KiB head cap.
    #[inline]
    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[inline]
pub(crate) fn parse_decimal(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }

    let mut result: usize = 0;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }

        result = result
            .checked_mul(10)?
            .checked_add((byte - b'0') as usize)?;
    }

    Some(result)
}

#[cfg(test)]
mod method_tests {
    use super::*;

    #[test]
    fn known_tokens() {
        assert_eq!(Method::from_token(b"GET").unwrap(), Method::Get);
        assert_eq!(Method::from_token(b"POST").unwrap(), Method::Post);
        assert_eq!(Method::from_token(b"PUT").unwrap(), Method::Other);
        assert_eq!(Method::from_token(b"DELETE").unwrap(), Method::Other);
    }

    #[test]
    fn rejects_non_tokens() {
        assert!(Method::from_token(b"").is_err());
        assert!(Method::from_token(b"GE T").is_err());
        assert!(Method::from_token("G\u{c9}T".as_bytes()).is_err());
    }

    #[test]
    fn case_sensitive() {
        // "get" is a valid token but not the GET method
        assert_eq!(Method::from_token(b"get").unwrap(), Method::Other);
    }
}



#[cfg(test)]
mod header_map_tests {
    use super::*;

    #[test]
    fn duplicate_values_concatenate() {
        let mut headers = HeaderMap::default();
        headers.append("accept".into(), "text/html");
        headers.append("host".into(), "localhost");
        headers.append("accept".into(), "text/plain");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("accept"), Some("text/html, text/plain"));
        assert_eq!(headers.get("host"), Some("localhost"));
        assert_eq!(headers.get("content-length"), None);
    }
}
