//! Stream wrapper that records how writes reach the transport.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Counters shared between a [`CountingStream`] and the test.
#[derive(Debug, Default)]
pub struct WriteStats {
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: AtomicUsize,
    pending: AtomicUsize,
}

impl WriteStats {
    /// Most `poll_write` calls ever in progress at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Number of `poll_write` calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of `poll_write` calls that returned `Pending`.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// Passes reads through and counts overlapping `poll_write` activity.
pub struct CountingStream<S> {
    inner: S,
    stats: Arc<WriteStats>,
}

impl<S> CountingStream<S> {
    pub fn new(inner: S) -> (Self, Arc<WriteStats>) {
        let stats = Arc::new(WriteStats::default());
        let stream = Self {
            inner,
            stats: Arc::clone(&stats),
        };
        (stream, stats)
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for CountingStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for CountingStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let stats = Arc::clone(&self.stats);
        stats.calls.fetch_add(1, Ordering::SeqCst);
        let active = stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        stats.max_active.fetch_max(active, Ordering::SeqCst);

        let result = Pin::new(&mut self.inner).poll_write(cx, buf);

        stats.active.fetch_sub(1, Ordering::SeqCst);
        if result.is_pending() {
            stats.pending.fetch_add(1, Ordering::SeqCst);
        }
        result
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
