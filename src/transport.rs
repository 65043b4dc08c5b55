use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};

/// Length prefix: 4 bytes, big endian.
const HEADER_SIZE: usize = 4;

/// Default maximum payload size: 8 MiB.
pub const DEFAULT_MAX_FRAME: usize = 8 * 1024 * 1024;

/// Errors on the framing layer. A clean peer close is not one of them; it
/// surfaces as `Ok(None)` from [`Transport::receive`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The payload exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An I/O failure, including a peer close in the middle of a frame.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Length-prefixed frame codec over a raw byte stream.
struct FrameCodec {
    max_frame: usize,
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, TransportError> {
        if src.len() < HEADER_SIZE {
            return Ok(None); // need more data
        }

        let len = u32::from_be_bytes(src[..HEADER_SIZE].try_into().unwrap()) as usize;
        if len > self.max_frame {
            return Err(TransportError::FrameTooLarge {
                size: len,
                max: self.max_frame,
            });
        }

        if src.len() < HEADER_SIZE + len {
            src.reserve(HEADER_SIZE + len - src.len());
            return Ok(None); // need more data
        }

        src.advance(HEADER_SIZE);
        Ok(Some(src.split_to(len)))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = TransportError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<(), TransportError> {
        if payload.len() > self.max_frame {
            return Err(TransportError::FrameTooLarge {
                size: payload.len(),
                max: self.max_frame,
            });
        }
        dst.reserve(HEADER_SIZE + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.put_slice(&payload);
        Ok(())
    }
}

/// Whole-payload send/receive over a raw byte stream.
///
/// TCP has no message boundaries; this wrapper delimits them with a length
/// prefix so each [`send`](Self::send) is recovered by exactly one
/// [`receive`](Self::receive) on the other end.
pub struct Transport<S> {
    framed: Framed<S, FrameCodec>,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self::with_max_frame(stream, DEFAULT_MAX_FRAME)
    }

    pub fn with_max_frame(stream: S, max_frame: usize) -> Self {
        Self {
            framed: Framed::new(stream, FrameCodec { max_frame }),
        }
    }

    /// Write one complete payload and flush it.
    pub async fn send(&mut self, payload: impl Into<Bytes>) -> Result<(), TransportError> {
        self.framed.send(payload.into()).await
    }

    /// The next complete payload, or `None` when the peer closed cleanly.
    ///
    /// A close in the middle of a frame is reported as an error.
    pub async fn receive(&mut self) -> Result<Option<BytesMut>, TransportError> {
        self.framed.next().await.transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt};

    #[tokio::test]
    async fn send_receive_round_trip() {
        let (a, b) = duplex(1024);
        let mut tx = Transport::new(a);
        let mut rx = Transport::new(b);

        tx.send(&b"hello, callwire"[..]).await.unwrap();
        let payload = rx.receive().await.unwrap().unwrap();
        assert_eq!(&payload[..], b"hello, callwire");
    }

    #[tokio::test]
    async fn back_to_back_frames_stay_distinct() {
        let (a, b) = duplex(1024);
        let mut tx = Transport::new(a);
        let mut rx = Transport::new(b);

        tx.send(&b"first"[..]).await.unwrap();
        tx.send(&b"second"[..]).await.unwrap();

        assert_eq!(&rx.receive().await.unwrap().unwrap()[..], b"first");
        assert_eq!(&rx.receive().await.unwrap().unwrap()[..], b"second");
    }

    #[tokio::test]
    async fn reassembles_fragmented_frames() {
        // A tiny pipe buffer forces the payload through in small pieces.
        let (a, b) = duplex(16);
        let mut tx = Transport::new(a);
        let mut rx = Transport::new(b);

        let payload = vec![0xABu8; 600];
        let expected = payload.clone();
        let writer = tokio::spawn(async move {
            tx.send(payload).await.unwrap();
        });

        let got = rx.receive().await.unwrap().unwrap();
        assert_eq!(&got[..], &expected[..]);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn clean_close_is_end_of_stream() {
        let (a, b) = duplex(64);
        drop(a);
        let mut rx = Transport::new(b);
        assert!(rx.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_mid_frame_is_an_error() {
        let (mut a, b) = duplex(64);
        // Header promises 100 bytes, then the stream ends.
        a.write_all(&100u32.to_be_bytes()).await.unwrap();
        a.write_all(b"short").await.unwrap();
        drop(a);

        let mut rx = Transport::new(b);
        assert!(matches!(
            rx.receive().await,
            Err(TransportError::Io(_))
        ));
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_on_receive() {
        let (mut a, b) = duplex(64);
        a.write_all(&(64u32 * 1024).to_be_bytes()).await.unwrap();

        let mut rx = Transport::with_max_frame(b, 1024);
        assert!(matches!(
            rx.receive().await,
            Err(TransportError::FrameTooLarge { size, max: 1024 }) if size == 64 * 1024
        ));
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_on_send() {
        let (a, _b) = duplex(64);
        let mut tx = Transport::with_max_frame(a, 8);
        assert!(matches!(
            tx.send(vec![0u8; 9]).await,
            Err(TransportError::FrameTooLarge { size: 9, max: 8 })
        ));
    }
}
