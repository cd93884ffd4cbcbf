//! Listener, bounded admission queue, worker pool, and graceful shutdown.

use crate::{
    config::{ServerConfig, ServerContext},
    errors::ErrorKind,
    limits::WaitStrategy,
    server::connection::{writer, HttpConnection},
};
use crossbeam::queue::SegQueue;
use std::{
    io,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpSocket, TcpStream},
    signal,
    sync::broadcast,
    task::{yield_now, JoinHandle},
    time::sleep,
};
use tracing::{info, warn};

type ConnQueue = Arc<SegQueue<(TcpStream, SocketAddr)>>;

/// The HTTP server: a listening socket plus a fixed pool of worker tasks
/// draining a bounded connection queue.
///
/// # Examples
///
/// ```no_run
/// use tidehttp::{Server, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> std::io::Result<()> {
///     let server = Server::bind(ServerConfig::default()).await?;
///     server.run().await
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    queue: ConnQueue,
    stopping: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    workers: Vec<JoinHandle<()>>,
}

impl Server {
    /// Binds the listener, prepares the content root, and starts the worker
    /// pool. Fails on unresolvable hosts, bind errors, and unusable content
    /// roots.
    pub async fn bind(config: ServerConfig) -> io::Result<Server> {
        let addr = config.socket_addr()?;

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(config.limits.server.backlog)?;

        let local = listener.local_addr()?;
        let ctx = Arc::new(ServerContext::new(config, local.port())?);

        let queue: ConnQueue = Arc::new(SegQueue::new());
        let stopping = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, _) = broadcast::channel(1);

        let workers = (1..=ctx.config.workers)
            .map(|n| spawn_worker(n, queue.clone(), ctx.clone(), stopping.clone()))
            .collect();

        info!(
            "HTTP Server started on http://{}:{}",
            ctx.config.host, ctx.port
        );
        info!("Thread pool size: {}", ctx.config.workers);
        info!("Serving files from '{}'", ctx.root.display());

        Ok(Server {
            listener,
            ctx,
            queue,
            stopping,
            shutdown_tx,
            workers,
        })
    }

    /// The address actually bound; useful when the configured port was `0`.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// A handle that triggers the same graceful shutdown as an interrupt
    /// signal.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Accepts connections until an interrupt signal (or a
    /// [`ShutdownHandle`]) stops the server, then drains the workers.
    ///
    /// Admission policy: the queue holds at most one connection per worker;
    /// beyond that the dispatcher answers `503` with `Retry-After` directly
    /// on the accepted socket and closes it.
    pub async fn run(self) -> io::Result<()> {
        let Server {
            listener,
            ctx,
            queue,
            stopping,
            shutdown_tx,
            workers,
        } = self;

        let mut shutdown_rx = shutdown_tx.subscribe();
        let interrupt = signal::ctrl_c();
        tokio::pin!(interrupt);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => admit(stream, peer, &queue, &ctx),
                    Err(err) => warn!("Accept error: {err}"),
                },
                _ = &mut interrupt => {
                    info!("Server shutdown requested");
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Server shutdown requested");
                    break;
                }
            }
        }

        // Closing the listener stops new admissions; workers drain the
        // queue, finish in-flight requests, and exit on the flag.
        drop(listener);
        stopping.store(true, Ordering::Relaxed);
        for worker in workers {
            let _ = worker.await;
        }

        info!("Server stopped");
        Ok(())
    }
}

/// Triggers graceful shutdown of the [`Server`] that produced it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

fn admit(stream: TcpStream, peer: SocketAddr, queue: &ConnQueue, ctx: &Arc<ServerContext>) {
    if queue.len() < ctx.config.workers {
        queue.push((stream, peer));
        return;
    }

    warn!("Thread pool saturated, rejecting connection from {peer}");
    let limits = ctx.config.limits.connection.clone();

    tokio::spawn(async move {
        let mut stream = stream;
        let mut response = ErrorKind::Overloaded.into_response();
        response.keep_alive = false;

        let _ = writer::write_response(&mut stream, &response, &limits).await;
        let _ = stream.shutdown().await;
    });
}

fn spawn_worker(
    n: usize,
    queue: ConnQueue,
    ctx: Arc<ServerContext>,
    stopping: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut connection = HttpConnection::new(format!("Thread-{n}"));

        loop {
            match queue.pop() {
                Some((mut stream, peer)) => {
                    info!(tag = %connection.tag(), "Connection from {peer}");
                    connection.run(&mut stream, &ctx, &stopping).await;
                }
                None => {
                    if stopping.load(Ordering::Relaxed) {
                        break;
                    }

                    match ctx.config.limits.server.wait_strategy {
                        WaitStrategy::Yield => yield_now().await,
                        WaitStrategy::Sleep(pause) => sleep(pause).await,
                    }
                }
            }
        }
    })
}
