use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    sync::mpsc,
};

/// The capacity of a single read
pub const CHUNK_SIZE: usize = 4096;

/// The bytes produced by a single read from a connection.
///
/// Only the part that was actually filled by the read is kept,
/// so a short read never carries trailing zeroes.
pub type Chunk = Bytes;

/// reads a single chunk from the reader into a fresh buffer.
///
/// returns None once the reader reaches EOF.
pub async fn read_chunk<R>(reader: &mut R) -> tokio::io::Result<Option<Chunk>>
where
    R: AsyncRead + Unpin,
{
    let mut block = vec![0u8; CHUNK_SIZE];
    let rcount = reader.read(&mut block).await?;
    if rcount == 0 {
        return Ok(None);
    }

    block.truncate(rcount);
    Ok(Some(block.into()))
}

/// Pumps chunks from the reader into the channel until EOF or a read error.
///
/// The reader is only dropped, never shut down, closing the
/// connection is up to whoever owns the other half.
/// Read errors are logged and handed back to the caller.
pub async fn read_loop<R>(mut reader: R, sender: mpsc::Sender<Chunk>) -> tokio::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        let chunk = match read_chunk(&mut reader).await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return Ok(()), // reached eof
            Err(err) => {
                tracing::error!("{}", err);
                return Err(err);
            }
        };

        tracing::debug!("read {} bytes", chunk.len());
        if sender.send(chunk).await.is_err() {
            // the relay has stopped listening
            return Ok(());
        }
    }
}
