//! Resource handlers: file serving (GET) and JSON upload persistence (POST).

use crate::{
    config::ServerContext,
    errors::ErrorKind,
    http::{
        request::Request,
        response::Response,
        types::StatusCode,
    },
    server::gate::Action,
};
use chrono::Utc;
use std::{io, path::Path};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

// Bounded retries against upload filename collisions.
const UPLOAD_NAME_ATTEMPTS: usize = 8;

pub(crate) async fn dispatch(
    action: Action,
    request: &Request,
    ctx: &ServerContext,
    tag: &str,
) -> Result<Response, ErrorKind> {
    match action {
        Action::Fetch(path) => serve_file(&path, ctx, tag).await,
        Action::Store => save_upload(request, ctx, tag).await,
    }
}

/// How a file is presented, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ResourceKind {
    Html,
    Binary,
    Unsupported,
}

impl ResourceKind {
    fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("html") => ResourceKind::Html,
            Some("txt" | "png" | "jpg" | "jpeg") => ResourceKind::Binary,
            _ => ResourceKind::Unsupported,
        }
    }
}

/// Serves one file from the content root, whole-file reads only.
///
/// `path` is already lexically root-contained by the gate; resolving it here
/// additionally keeps symlinked files inside the resolved root.
async fn serve_file(path: &Path, ctx: &ServerContext, tag: &str) -> Result<Response, ErrorKind> {
    let resolved = match tokio::fs::canonicalize(path).await {
        Ok(resolved) => resolved,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(ErrorKind::NotFound),
        Err(err) => {
            error!(tag = %tag, "Failed to resolve requested file: {err}");
            return Err(ErrorKind::Internal);
        }
    };
    if !resolved.starts_with(&ctx.canonical_root) {
        return Err(ErrorKind::PathOutsideRoot);
    }

    let metadata = match tokio::fs::metadata(&resolved).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(ErrorKind::NotFound),
        Err(err) => {
            error!(tag = %tag, "Failed to stat requested file: {err}");
            return Err(ErrorKind::Internal);
        }
    };
    if !metadata.is_file() {
        return Err(ErrorKind::NotFound);
    }

    let kind = ResourceKind::from_path(path);
    if kind == ResourceKind::Unsupported {
        return Err(ErrorKind::UnsupportedMedia);
    }

    let content = match tokio::fs::read(&resolved).await {
        Ok(content) => content,
        Err(err) => {
            error!(tag = %tag, "Failed to read requested file: {err}");
            return Err(ErrorKind::Internal);
        }
    };

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download");

    if kind == ResourceKind::Html {
        info!(tag = %tag, "Served HTML file: {name} ({} bytes)", content.len());
        Ok(Response::new(StatusCode::Ok)
            .content_type("text/html; charset=utf-8")
            .body(content))
    } else {
        info!(tag = %tag, "Sending binary file: {name} ({} bytes)", content.len());
        Ok(Response::new(StatusCode::Ok)
            .content_type("application/octet-stream")
            .header(
                "Content-Disposition",
                format!("attachment; filename=\"{name}\""),
            )
            .body(content))
    }
}

/// Persists a JSON request body under `<root>/uploads/` and reports the
/// created path.
async fn save_upload(
    request: &Request,
    ctx: &ServerContext,
    tag: &str,
) -> Result<Response, ErrorKind> {
    if serde_json::from_slice::<serde_json::Value>(request.body()).is_err() {
        return Err(ErrorKind::InvalidJson);
    }

    let uploads = ctx.root.join("uploads");
    if let Err(err) = tokio::fs::create_dir_all(&uploads).await {
        error!(tag = %tag, "Failed to create uploads directory: {err}");
        return Err(ErrorKind::Internal);
    }

    for _ in 0..UPLOAD_NAME_ATTEMPTS {
        let filename = format!(
            "upload_{}_{:04x}.json",
            Utc::now().format("%Y%m%d_%H%M%S"),
            rand::random::<u16>()
        );

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(uploads.join(&filename))
            .await
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                error!(tag = %tag, "Failed to create upload file: {err}");
                return Err(ErrorKind::Internal);
            }
        };

        // The received bytes go to disk verbatim.
        if let Err(err) = file.write_all(request.body()).await {
            error!(tag = %tag, "Failed to write upload file: {err}");
            return Err(ErrorKind::Internal);
        }
        if let Err(err) = file.flush().await {
            error!(tag = %tag, "Failed to flush upload file: {err}");
            return Err(ErrorKind::Internal);
        }

        info!(tag = %tag, "JSON file created: {filename}");

        let body = format!(
            r#"{{"status":"success","message":"File created successfully","filepath":"/uploads/{filename}"}}"#
        );
        return Ok(Response::new(StatusCode::Created)
            .content_type("application/json")
            .body(body));
    }

    error!(tag = %tag, "Upload filename collisions exhausted");
    Err(ErrorKind::Internal)
}

#[cfg(test)]
mod file_tests {
    use super::*;
    use crate::{config::ServerConfig, limits::ConnectionLimits};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_ctx() -> ServerContext {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let root = std::env::temp_dir().join(format!(
            "tidehttp-handlers-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&root).unwrap();

        let config = ServerConfig {
            content_root: root,
            ..ServerConfig::default()
        };
        ServerContext::new(config, 8080).unwrap()
    }

    fn wire(response: &Response) -> String {
        String::from_utf8(response.encode(&ConnectionLimits::default())).unwrap()
    }

    #[tokio::test]
    async fn html_served_inline() {
        let ctx = test_ctx();
        let page = "<html><body>welcome</body></html>";
        std::fs::write(ctx.root.join("index.html"), page).unwrap();

        let response = serve_file(&ctx.root.join("index.html"), &ctx, "Thread-1")
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::Ok);
        let text = wire(&response);
        assert!(text.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(!text.contains("Content-Disposition"));
        assert!(text.ends_with(page));
    }

    #[tokio::test]
    async fn binary_served_as_attachment() {
        let ctx = test_ctx();
        std::fs::write(ctx.root.join("sample.txt"), b"plain bytes").unwrap();

        let response = serve_file(&ctx.root.join("sample.txt"), &ctx, "Thread-1")
            .await
            .unwrap();

        let text = wire(&response);
        assert!(text.contains("Content-Type: application/octet-stream\r\n"));
        assert!(text.contains("Content-Disposition: attachment; filename=\"sample.txt\"\r\n"));
        assert!(text.ends_with("plain bytes"));
    }

    #[tokio::test]
    async fn served_bytes_match_disk() {
        let ctx = test_ctx();
        let payload: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
        std::fs::write(ctx.root.join("blob.png"), &payload).unwrap();

        let response = serve_file(&ctx.root.join("blob.png"), &ctx, "Thread-1")
            .await
            .unwrap();

        let encoded = response.encode(&ConnectionLimits::default());
        assert!(encoded.ends_with(&payload));
        assert_eq!(response.body_len(), payload.len());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let ctx = test_ctx();
        assert!(matches!(
            serve_file(&ctx.root.join("absent.html"), &ctx, "Thread-1").await,
            Err(ErrorKind::NotFound)
        ));
    }

    #[tokio::test]
    async fn directory_is_not_found() {
        let ctx = test_ctx();
        assert!(matches!(
            serve_file(&ctx.root.join("uploads"), &ctx, "Thread-1").await,
            Err(ErrorKind::NotFound)
        ));
    }

    #[tokio::test]
    async fn unknown_extension_is_unsupported() {
        let ctx = test_ctx();
        std::fs::write(ctx.root.join("notes.pdf"), b"%PDF").unwrap();

        assert!(matches!(
            serve_file(&ctx.root.join("notes.pdf"), &ctx, "Thread-1").await,
            Err(ErrorKind::UnsupportedMedia)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_escaping_root_is_forbidden() {
        let ctx = test_ctx();
        let outside = std::env::temp_dir().join(format!(
            "tidehttp-outside-{}.txt",
            std::process::id()
        ));
        std::fs::write(&outside, b"secret").unwrap();
        std::os::unix::fs::symlink(&outside, ctx.root.join("leak.txt")).unwrap();

        assert!(matches!(
            serve_file(&ctx.root.join("leak.txt"), &ctx, "Thread-1").await,
            Err(ErrorKind::PathOutsideRoot)
        ));
    }

    #[test]
    fn extension_kinds() {
        let cases = [
            ("index.html", ResourceKind::Html),
            ("INDEX.HTML", ResourceKind::Html),
            ("a.txt", ResourceKind::Binary),
            ("a.png", ResourceKind::Binary),
            ("a.jpg", ResourceKind::Binary),
            ("a.JPEG", ResourceKind::Binary),
            ("a.pdf", ResourceKind::Unsupported),
            ("no-extension", ResourceKind::Unsupported),
        ];

        for (name, kind) in cases {
            assert_eq!(ResourceKind::from_path(Path::new(name)), kind, "{name}");
        }
    }
}
