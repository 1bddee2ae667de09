// This module contains the definition of `Connection`.
mod connection;

// Re-exports.
pub use connection::Connection;

use crate::error::SessionError;
use bytes::{Bytes, BytesMut};
use futures::sink::{Sink, SinkExt};
use futures::stream::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite, BufStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Delimits frames using a length header. Each frame carries one
/// bincode-encoded value.
#[derive(Debug)]
pub struct Rw<S> {
    rw: Framed<BufStream<S>, LengthDelimitedCodec>,
}

impl<S> Rw<S>
where
    S: AsyncWrite + AsyncRead + Unpin,
{
    pub fn from(reader_capacity: usize, writer_capacity: usize, rw: S) -> Self {
        // buffer rw
        let rw = BufStream::with_capacity(reader_capacity, writer_capacity, rw);
        // frame rw
        let rw = Framed::new(rw, LengthDelimitedCodec::new());
        Self { rw }
    }

    /// Receives the next value. Returns `Ok(None)` if the stream was closed
    /// by the other end.
    pub async fn recv<V>(&mut self) -> Result<Option<V>, SessionError>
    where
        V: DeserializeOwned,
    {
        match self.rw.next().await {
            Some(Ok(bytes)) => {
                // if it is, and not an error, deserialize it
                let value = deserialize(bytes)?;
                Ok(Some(value))
            }
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Writes `value` and flushes it (along with anything written before).
    pub async fn send<V>(&mut self, value: &V) -> Result<(), SessionError>
    where
        V: Serialize,
    {
        let bytes = serialize(value)?;
        SinkExt::<Bytes>::send(&mut self.rw, bytes).await?;
        Ok(())
    }

    /// Writes `value` without flushing it.
    pub async fn write<V>(&mut self, value: &V) -> Result<(), SessionError>
    where
        V: Serialize,
    {
        let bytes = serialize(value)?;
        futures::future::poll_fn(|cx| {
            Sink::<Bytes>::poll_ready(Pin::new(&mut self.rw), cx)
        })
        .await?;
        Sink::<Bytes>::start_send(Pin::new(&mut self.rw), bytes)?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), SessionError> {
        futures::future::poll_fn(|cx| {
            Sink::<Bytes>::poll_flush(Pin::new(&mut self.rw), cx)
        })
        .await?;
        Ok(())
    }
}

fn deserialize<V>(bytes: BytesMut) -> Result<V, bincode::Error>
where
    V: DeserializeOwned,
{
    bincode::deserialize(&bytes)
}

fn serialize<V>(value: &V) -> Result<Bytes, SessionError>
where
    V: Serialize,
{
    let bytes = bincode::serialize(value).map_err(SessionError::Encode)?;
    Ok(Bytes::from(bytes))
}
