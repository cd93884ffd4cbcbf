//! tidehttp - a multi-threaded HTTP/1.1 origin server on raw stream sockets.
//!
//! A self-contained, correctness-oriented implementation of the HTTP/1.1
//! wire protocol, connection lifecycle, and request dispatch. The server
//! hands each accepted connection to a fixed pool of workers through a
//! bounded queue, serves a small set of file types from a rooted content
//! directory, and persists JSON uploads as timestamped files.
//!
//! # Protocol Support
//!
//! - **HTTP/1.1**: persistent connections with a 30-second idle timeout and
//!   a 100-request cap per connection
//! - **HTTP/1.0**: compatibility mode, keep-alive on explicit request
//!
//! # Request pipeline
//!
//! ```text
//! accept -> bounded queue -> worker -> parse -> gate -> handler -> frame -> write
//!                |                      |        |
//!                +-> 503 when full      |        +-> 4xx refusals (host,
//!                                       |            method, path, media)
//!                                       +-> 400 on malformed bytes
//! ```
//!
//! - **GET** serves `.html` inline and `.txt`/`.png`/`.jpg`/`.jpeg` as
//!   attachments, whole files read into memory, after URL decoding and
//!   root-containment checks.
//! - **POST `/upload`** validates the body as JSON and stores it verbatim
//!   under `<root>/uploads/` with a timestamped, collision-checked name.
//!
//! # Quick Start
//!
//! ```no_run
//! use tidehttp::{logging, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     logging::init();
//!
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await
//! }
//! ```
//!
//! Or from the command line:
//!
//! ```bash
//! tidehttp 8080 127.0.0.1 10 --root resources
//! ```

pub(crate) mod http {
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod dispatch;
    pub(crate) mod gate;
    pub(crate) mod handlers;
}
pub(crate) mod errors;
pub mod config;
pub mod limits;
pub mod logging;

pub use crate::{
    config::{ServerConfig, ServerContext},
    http::{
        request::Request,
        types::{Method, StatusCode, Version},
    },
    server::dispatch::{Server, ShutdownHandle},
};
