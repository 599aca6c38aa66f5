use std::{future::Future, net::SocketAddr};

use async_trait::async_trait;
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinSet,
};

use crate::error::Error;

/// A source of incoming connections
#[async_trait]
pub trait Acceptor: Send {
    type Stream: Send + 'static;

    async fn accept(&mut self) -> tokio::io::Result<(Self::Stream, SocketAddr)>;

    fn local_addr(&self) -> tokio::io::Result<SocketAddr>;
}

#[async_trait]
impl Acceptor for TcpListener {
    type Stream = TcpStream;

    async fn accept(&mut self) -> tokio::io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> tokio::io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

// Bind a new listener to an address
pub async fn bind(addr: &str) -> Result<TcpListener, Error> {
    TcpListener::bind(addr).await.map_err(|source| Error::Bind {
        addr: addr.to_owned(),
        source,
    })
}

/// What happened during the lifetime of a listener loop
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub accepted: u64,
    pub accept_errors: u64,
    /// sessions that were still alive at shutdown
    pub aborted: usize,
}

/// Accepts connections until `shutdown` resolves, running `handler`
/// as a separate task for every one of them.
///
/// A failed accept is logged and the loop goes on. Once `shutdown`
/// resolves, every session that is still alive is aborted.
pub async fn run<A, H, F, S>(mut acceptor: A, handler: H, shutdown: S) -> Stats
where
    A: Acceptor,
    H: Fn(A::Stream, SocketAddr) -> F,
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    S: Future,
{
    let local_addr = acceptor
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "<unknown>".to_owned());

    let mut sessions = JoinSet::new();
    let mut stats = Stats::default();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                if let Err(err) = joined {
                    if err.is_panic() {
                        tracing::error!("session panicked: {}", err);
                    }
                }
            }
            accepted = acceptor.accept() => match accepted {
                Ok((conn, peer)) => {
                    stats.accepted += 1;
                    tracing::debug!("accepted connection from {}", peer);
                    sessions.spawn(handler(conn, peer));
                }
                Err(err) => {
                    stats.accept_errors += 1;
                    tracing::error!("{}", err);
                }
            },
        }
    }

    tracing::info!("Server on {} is shutting down", local_addr);

    // sessions that already finished report their output, the rest are cancelled
    sessions.abort_all();
    while let Some(joined) = sessions.join_next().await {
        match joined {
            Ok(_) => {}
            Err(err) if err.is_cancelled() => stats.aborted += 1,
            Err(err) => tracing::error!("session panicked: {}", err),
        }
    }
    tracing::info!("aborted {} live session(s)", stats.aborted);

    stats
}

/// Runs a server for the handler on a random local port,
/// for as long as the test runtime lives.
#[cfg(test)]
pub(crate) async fn spawn_local<H, F>(handler: H) -> SocketAddr
where
    H: Fn(TcpStream, SocketAddr) -> F + Send + 'static,
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let listener = bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(run(listener, handler, std::future::pending::<()>()));

    addr
}
