use std::io;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

/// A non-blocking, bidirectional byte stream the engine can run on.
///
/// Implemented for every tokio stream that can move to another task:
/// `TcpStream`, `UnixStream`, TLS streams, `DuplexStream`.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + 'static {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Send + 'static {}

/// Split `io` into a buffered reader and a writer.
pub fn split<T: ByteStream>(
    io: T,
    read_capacity: usize,
) -> (StreamReader<ReadHalf<T>>, StreamWriter<WriteHalf<T>>) {
    let (read_half, write_half) = tokio::io::split(io);
    (
        StreamReader::new(read_half, read_capacity),
        StreamWriter::new(write_half),
    )
}

/// Buffered read side of a byte stream.
///
/// All reads are cancel-safe: bytes already received stay buffered and
/// nothing is consumed until the requested amount is available.
#[derive(Debug)]
pub struct StreamReader<R> {
    io: R,
    buf: BytesMut,
    read_capacity: usize,
}

impl<R> StreamReader<R> {
    /// Wrap `io` with a buffer of `read_capacity` bytes.
    pub fn new(io: R, read_capacity: usize) -> Self {
        let read_capacity = read_capacity.max(64);
        Self {
            io,
            buf: BytesMut::with_capacity(read_capacity),
            read_capacity,
        }
    }

    /// Bytes received but not consumed yet.
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Consume `n` buffered bytes. Panics if fewer are buffered, so callers
    /// pair it with [`read_at_least`](Self::read_at_least).
    pub fn consume(&mut self, n: usize) -> BytesMut {
        self.buf.split_to(n)
    }

    /// Recover the inner stream, dropping buffered bytes.
    pub fn into_inner(self) -> R {
        self.io
    }
}

impl<R: AsyncRead + Unpin> StreamReader<R> {
    /// Wait until at least `n` bytes are buffered.
    ///
    /// # Errors
    ///
    /// `UnexpectedEof` if the stream ends first, or the underlying read error.
    pub async fn read_at_least(&mut self, n: usize) -> io::Result<()> {
        while self.buf.len() < n {
            self.fill().await?;
        }
        Ok(())
    }

    /// Read exactly `n` bytes.
    ///
    /// # Errors
    ///
    /// See [`read_at_least`](Self::read_at_least).
    pub async fn read_exact(&mut self, n: usize) -> io::Result<BytesMut> {
        self.read_at_least(n).await?;
        Ok(self.buf.split_to(n))
    }

    /// Read up to and including the first occurrence of `delimiter`.
    ///
    /// # Errors
    ///
    /// `UnexpectedEof` if the stream ends before the delimiter, or the
    /// underlying read error.
    pub async fn read_until(&mut self, delimiter: &[u8]) -> io::Result<BytesMut> {
        if delimiter.is_empty() {
            return Ok(BytesMut::new());
        }

        let mut searched = 0;
        loop {
            if let Some(pos) = self.buf[searched..]
                .windows(delimiter.len())
                .position(|window| window == delimiter)
            {
                return Ok(self.buf.split_to(searched + pos + delimiter.len()));
            }
            // A match may straddle the old end of the buffer.
            searched = self.buf.len().saturating_sub(delimiter.len() - 1);
            self.fill().await?;
        }
    }

    async fn fill(&mut self) -> io::Result<()> {
        self.buf.reserve(self.read_capacity);
        let n = self.io.read_buf(&mut self.buf).await?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(())
    }
}

/// Write side of a byte stream.
#[derive(Debug)]
pub struct StreamWriter<W> {
    io: W,
}

impl<W> StreamWriter<W> {
    /// Wrap `io`.
    pub fn new(io: W) -> Self {
        Self { io }
    }

    /// Recover the inner stream.
    pub fn into_inner(self) -> W {
        self.io
    }
}

impl<W: AsyncWrite + Unpin> StreamWriter<W> {
    /// Write every byte of a buffer chain (for example a frame header
    /// chained with its payload) and flush.
    ///
    /// # Errors
    ///
    /// The underlying write or flush error.
    pub async fn write_chain<B: Buf>(&mut self, mut chain: B) -> io::Result<()> {
        self.io.write_all_buf(&mut chain).await?;
        self.io.flush().await
    }

    /// Gracefully shut down the write direction.
    ///
    /// # Errors
    ///
    /// The underlying shutdown error.
    pub async fn close(&mut self) -> io::Result<()> {
        self.io.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Serves its data in chunks of at most `chunk` bytes.
    struct MockStream {
        read_data: Cursor<Vec<u8>>,
        chunk: usize,
        write_data: Vec<u8>,
        shut_down: bool,
    }

    impl MockStream {
        fn new(data: Vec<u8>, chunk: usize) -> Self {
            Self {
                read_data: Cursor::new(data),
                chunk,
                write_data: Vec::new(),
                shut_down: false,
            }
        }
    }

    impl AsyncRead for MockStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let pos = self.read_data.position() as usize;
            let data = self.read_data.get_ref();
            if pos >= data.len() {
                return Poll::Ready(Ok(()));
            }
            let remaining = &data[pos..];
            let to_copy = remaining.len().min(buf.remaining()).min(self.chunk);
            buf.put_slice(&remaining[..to_copy]);
            self.read_data.set_position((pos + to_copy) as u64);
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for MockStream {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            self.write_data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.shut_down = true;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_read_at_least_across_chunks() {
        let mut reader = StreamReader::new(MockStream::new(b"hello world".to_vec(), 3), 64);
        reader.read_at_least(5).await.unwrap();
        assert!(reader.buffered().len() >= 5);
        assert_eq!(&reader.consume(5)[..], b"hello");
    }

    #[tokio::test]
    async fn test_read_exact_sequence() {
        let mut reader = StreamReader::new(MockStream::new(vec![1, 2, 3, 4, 5, 6], 1), 64);
        assert_eq!(&reader.read_exact(2).await.unwrap()[..], &[1, 2]);
        assert_eq!(&reader.read_exact(4).await.unwrap()[..], &[3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_read_at_least_eof() {
        let mut reader = StreamReader::new(MockStream::new(vec![1, 2], 8), 64);
        let err = reader.read_at_least(3).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(reader.buffered(), &[1, 2]);
    }

    #[tokio::test]
    async fn test_read_until() {
        let data = b"GET / HTTP/1.1\r\nHost: x\r\n\r\nrest".to_vec();
        let mut reader = StreamReader::new(MockStream::new(data, 4), 64);
        let head = reader.read_until(b"\r\n\r\n").await.unwrap();
        assert_eq!(&head[..], b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(&reader.read_exact(4).await.unwrap()[..], b"rest");
    }

    #[tokio::test]
    async fn test_read_until_missing_delimiter() {
        let mut reader = StreamReader::new(MockStream::new(b"abc".to_vec(), 2), 64);
        let err = reader.read_until(b"\n").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_write_chain_and_close() {
        let mut writer = StreamWriter::new(MockStream::new(Vec::new(), 1));
        let chain = Bytes::from_static(&[0x81, 0x02]).chain(Bytes::from_static(b"Hi"));
        writer.write_chain(chain).await.unwrap();
        writer.close().await.unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.write_data, vec![0x81, 0x02, b'H', b'i']);
        assert!(inner.shut_down);
    }

    #[tokio::test]
    async fn test_split_over_duplex() {
        let (local, mut remote) = tokio::io::duplex(64);
        let (mut reader, mut writer) = split(local, 16);

        writer.write_chain(Bytes::from_static(b"ping")).await.unwrap();
        let mut echoed = [0u8; 4];
        remote.read_exact(&mut echoed).await.unwrap();
        assert_eq!(&echoed, b"ping");

        remote.write_all(b"pong").await.unwrap();
        assert_eq!(&reader.read_exact(4).await.unwrap()[..], b"pong");
    }
}
