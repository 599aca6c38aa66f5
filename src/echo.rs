use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::reader;

/// Writes every chunk read from the connection straight back to it.
///
/// Stops on EOF, or on the first read/write error.
pub async fn handle<S>(mut conn: S, peer: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let chunk = match reader::read_chunk(&mut conn).await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break, // reached eof
            Err(err) => {
                tracing::error!("{}: {}", peer, err);
                break;
            }
        };

        if let Err(err) = conn.write_all(&chunk).await {
            tracing::error!("{}: {}", peer, err);
            break;
        }
    }

    tracing::debug!("echo session with {} has ended", peer);
}
