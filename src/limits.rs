//! Server limits and timeouts.
//!
//! Defaults encode the protocol contract rather than tuning knobs: the
//! header-block and body caps bound per-connection memory, the idle timeout
//! cleans up stalled clients (slowloris), and the per-connection request cap
//! bounds how long a single keep-alive connection can monopolise a worker.
//!
//! # Examples
//!
//! ```
//! use tidehttp::limits::Limits;
//!
//! let limits = Limits::default();
//! assert_eq!(limits.request.header_block_size, 8 * 1024);
//! assert_eq!(limits.connection.max_requests, 100);
//! ```

use std::time::Duration;

/// Aggregate of all limit groups, one instance per server.
#[derive(Debug, Clone, Default)]
pub struct Limits {
    pub server: ServerLimits,
    pub connection: ConnectionLimits,
    pub request: RequestLimits,
}

/// Listener and worker-pool behaviour.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Listen backlog handed to the kernel (default: `50`).
    ///
    /// Connections beyond the backlog are refused by the OS before the
    /// dispatcher ever sees them; the admission queue bound (the worker-pool
    /// size) governs the 503 path instead.
    pub backlog: u32,

    /// Strategy for worker waiting behaviour when the admission queue is
    /// empty (default: `Sleep(50us)`).
    pub wait_strategy: WaitStrategy,
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            backlog: 50,
            wait_strategy: WaitStrategy::Sleep(Duration::from_micros(50)),
        }
    }
}

/// Strategy for worker waiting when no connections are queued.
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    /// While waiting, uses [`tokio::task::yield_now()`]. Lowest latency,
    /// near-100% CPU; only sensible for benchmarks.
    Yield,

    /// While waiting, uses [`tokio::time::sleep()`] with the given pause.
    Sleep(Duration),
}

/// Connection-level limits and timeouts.
#[derive(Debug, Clone)]
pub struct ConnectionLimits {
    /// Maximum idle time while waiting for the next request on a keep-alive
    /// connection (default: `30 seconds`).
    ///
    /// The deadline also bounds the read of a single request (head and
    /// body); expiry closes the connection without a response. Advertised to
    /// clients in the `Keep-Alive` response header.
    pub idle_timeout: Duration,

    /// Maximum duration for writing one complete response (default:
    /// `30 seconds`). A client that stops draining its socket is cut off.
    pub write_timeout: Duration,

    /// Maximum number of requests served per connection (default: `100`).
    ///
    /// The response to the final request carries `Connection: close`.
    pub max_requests: usize,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            max_requests: 100,
        }
    }
}

/// Request parsing caps.
#[derive(Debug, Clone)]
pub struct RequestLimits {
    /// Maximum size of the head (request line + headers + terminating blank
    /// line) in bytes (default: `8192`). A head of exactly this size is
    /// accepted; one byte more is rejected with `400`.
    pub header_block_size: usize,

    /// Maximum declared `Content-Length` in bytes (default: `1048576`).
    pub body_size: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            header_block_size: 8 * 1024,
            body_size: 1024 * 1024,
        }
    }
}
