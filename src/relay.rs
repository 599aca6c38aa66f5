use std::{net::SocketAddr, sync::Arc};

use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
    task::JoinHandle,
};

use crate::{error::Error, reader};

// readers hand over one chunk at a time
const CHANNEL_SIZE: usize = 1;

/// Bridges an inbound connection with a new connection to `destination`.
///
/// Every direction is pumped on its own, and an EOF on one side is passed
/// on as a write shutdown to the other. The session lasts until both
/// directions reach EOF, or until either of them fails, at which point
/// both connections are closed and the readers are cancelled.
pub async fn handle(
    inbound: TcpStream,
    peer: SocketAddr,
    destination: Arc<str>,
) -> Result<(), Error> {
    let local_addr = inbound
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "<unknown>".to_owned());
    tracing::info!("New connection from {} to {}", peer, local_addr);

    // dropping the inbound connection on failure closes it
    let outbound = match TcpStream::connect(&*destination).await {
        Ok(outbound) => outbound,
        Err(source) => {
            let err = Error::Dial {
                addr: destination.to_string(),
                source,
            };
            tracing::error!("{}", err);
            return Err(err);
        }
    };

    let (inbound_reader, inbound_writer) = inbound.into_split();
    let (outbound_reader, outbound_writer) = outbound.into_split();

    // connect the client with the destination & the destination with the client
    let client_to_destination = pump(inbound_reader, outbound_writer);
    let destination_to_client = pump(outbound_reader, inbound_writer);

    // the first failure drops the other direction, closing both connections
    if let Err(err) = tokio::try_join!(client_to_destination, destination_to_client) {
        tracing::debug!("session between {} and {} failed: {}", peer, destination, err);
    }

    tracing::info!("Connection from {} to {} closed", peer, destination);
    Ok(())
}

// aborts the reader along with the direction that owns it
struct ReaderTask(JoinHandle<tokio::io::Result<()>>);

impl Drop for ReaderTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Forwards everything the reader task reads from `source` into `writer`.
///
/// Returns once `source` reaches EOF, after shutting `writer` down,
/// or on the first read/write error.
async fn pump<R, W>(source: R, mut writer: W) -> tokio::io::Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let (sender, mut chunks) = mpsc::channel(CHANNEL_SIZE);
    let mut reader = ReaderTask(tokio::spawn(reader::read_loop(source, sender)));

    while let Some(chunk) = chunks.recv().await {
        if let Err(err) = writer.write_all(&chunk).await {
            tracing::debug!("write failed: {}", err);
            return Err(err);
        }
    }

    // the channel closes once the reader is done, find out how it ended
    (&mut reader.0)
        .await
        .map_err(|err| tokio::io::Error::new(tokio::io::ErrorKind::Other, err))??;

    // pass the eof on
    writer.shutdown().await
}
