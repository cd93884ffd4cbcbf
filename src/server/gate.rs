//! Security gate: pure predicates applied to every parsed request before a
//! handler runs.
//!
//! Checks run in a fixed order - host allow-list, method, path
//! canonicalisation, media type - and the first failure becomes the
//! response. The declared Content-Length cap is enforced earlier, by the
//! codec, while the body is read.

use crate::{
    config::ServerContext,
    errors::ErrorKind,
    http::{request::Request, types::Method},
};
use std::path::{Path, PathBuf};

/// What the worker should do with a screened request.
#[derive(Debug, PartialEq)]
pub(crate) enum Action {
    /// Serve the file at this canonical path under the content root.
    Fetch(PathBuf),
    /// Persist the request body as a JSON upload.
    Store,
}

pub(crate) fn screen(request: &Request, ctx: &ServerContext) -> Result<Action, ErrorKind> {
    check_host(request, ctx)?;

    match request.method() {
        Method::Get => {
            let relative = canonical_relative(request.target())?;
            Ok(Action::Fetch(ctx.root.join(relative)))
        }
        Method::Post => {
            let relative = canonical_relative(request.target())?;
            check_content_type(request)?;

            match relative.as_path() == Path::new("upload") {
                true => Ok(Action::Store),
                false => Err(ErrorKind::NotFound),
            }
        }
        Method::Other => Err(ErrorKind::MethodNotAllowed),
    }
}

/// `Host` is mandatory on HTTP/1.1 and, when present on either version, must
/// name this server.
fn check_host(request: &Request, ctx: &ServerContext) -> Result<(), ErrorKind> {
    use crate::http::types::Version;

    match request.header("host") {
        None => match request.version() {
            Version::Http11 => Err(ErrorKind::MissingHost),
            Version::Http10 => Ok(()),
        },
        Some(value) => {
            let value = value.trim();
            match ctx.allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(value)) {
                true => Ok(()),
                false => Err(ErrorKind::HostNotAllowed),
            }
        }
    }
}

/// POST bodies must be declared `application/json`; parameters after `;` are
/// ignored.
fn check_content_type(request: &Request) -> Result<(), ErrorKind> {
    let media = request
        .header("content-type")
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim();

    match media.eq_ignore_ascii_case("application/json") {
        true => Ok(()),
        false => Err(ErrorKind::UnsupportedMedia),
    }
}

/// Reduces a request target to a canonical path relative to the content
/// root.
///
/// URL-decodes, splits off the query string, and normalises `.`/`..`
/// segments; any form that would escape the root - traversal below the top,
/// absolute or scheme-qualified targets, null bytes, backslashes - is
/// rejected outright. The result is root-contained by construction. An empty
/// path maps to `index.html`.
pub(crate) fn canonical_relative(target: &str) -> Result<PathBuf, ErrorKind> {
    let decoded = urlencoding::decode(target).map_err(|_| ErrorKind::PathOutsideRoot)?;
    let path = decoded.split('?').next().unwrap_or_default();

    if path.contains('\0') || path.contains('\\') {
        return Err(ErrorKind::PathOutsideRoot);
    }
    if path.starts_with("//") || path.contains("://") {
        return Err(ErrorKind::PathOutsideRoot);
    }

    let trimmed = path.strip_prefix('/').unwrap_or(path);

    let mut segments: Vec<&str> = Vec::new();
    for segment in trimmed.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(ErrorKind::PathOutsideRoot);
                }
            }
            name => segments.push(name),
        }
    }

    if segments.is_empty() {
        return Ok(PathBuf::from("index.html"));
    }

    Ok(segments.iter().copied().collect())
}


#[cfg(test)]
mod screen_tests {
    use super::*;
    use crate::{
        config::ServerConfig,
        http::types::{Method, Version},
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_ctx() -> ServerContext {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let root = std::env::temp_dir().join(format!(
            "tidehttp-gate-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let config = ServerConfig {
            content_root: root,
            ..ServerConfig::default()
        };
        ServerContext::new(config, 8080).unwrap()
    }

    fn get(target: &str, headers: &[(&str, &str)]) -> Request {
        Request::for_tests(Method::Get, target, Version::Http11, headers, b"")
    }

    #[test]
    fn host_allow_list() {
        let ctx = test_ctx();

        for host in ["localhost:8080", "localhost", "127.0.0.1:8080", "LOCALHOST:8080"] {
            assert!(screen(&get("/", &[("Host", host)]), &ctx).is_ok(), "{host}");
        }

        for host in ["evil.com", "localhost:9999", "127.0.0.2:8080"] {
            assert!(
                matches!(
                    screen(&get("/", &[("Host", host)]), &ctx),
                    Err(ErrorKind::HostNotAllowed)
                ),
                "{host}"
            );
        }
    }

    #[test]
    fn missing_host_rules() {
        let ctx = test_ctx();

        assert!(matches!(
            screen(&get("/", &[]), &ctx),
            Err(ErrorKind::MissingHost)
        ));

        // HTTP/1.0 predates the Host requirement.
        let old = Request::for_tests(Method::Get, "/", Version::Http10, &[], b"");
        assert!(screen(&old, &ctx).is_ok());
    }

    #[test]
    fn method_gate() {
        let ctx = test_ctx();
        let put = Request::for_tests(
            Method::Other,
            "/",
            Version::Http11,
            &[("Host", "localhost:8080")],
            b"",
        );

        assert!(matches!(
            screen(&put, &ctx),
            Err(ErrorKind::MethodNotAllowed)
        ));
    }

    #[test]
    fn get_resolves_under_root() {
        let ctx = test_ctx();

        match screen(&get("/sample.txt", &[("Host", "localhost:8080")]), &ctx).unwrap() {
            Action::Fetch(path) => assert_eq!(path, ctx.root.join("sample.txt")),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn traversal_refused_before_dispatch() {
        let ctx = test_ctx();
        assert!(matches!(
            screen(&get("/../etc/passwd", &[("Host", "localhost:8080")]), &ctx),
            Err(ErrorKind::PathOutsideRoot)
        ));
    }

    #[test]
    fn post_routing() {
        let ctx = test_ctx();
        let post = |target: &str, content_type: &str| {
            Request::for_tests(
                Method::Post,
                target,
                Version::Http11,
                &[("Host", "localhost:8080"), ("Content-Type", content_type)],
                b"{}",
            )
        };

        assert_eq!(
            screen(&post("/upload", "application/json"), &ctx).unwrap(),
            Action::Store
        );
        assert_eq!(
            screen(&post("/upload", "application/json; charset=utf-8"), &ctx).unwrap(),
            Action::Store
        );
        assert!(matches!(
            screen(&post("/other", "application/json"), &ctx),
            Err(ErrorKind::NotFound)
        ));
        assert!(matches!(
            screen(&post("/upload", "text/plain"), &ctx),
            Err(ErrorKind::UnsupportedMedia)
        ));
        assert!(matches!(
            screen(&post("/upload", ""), &ctx),
            Err(ErrorKind::UnsupportedMedia)
        ));
    }
}
