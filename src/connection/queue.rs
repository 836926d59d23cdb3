//! Outbound write queue.
//!
//! Jobs wait in one of two FIFOs: control (ping, pong) and data (message
//! fragments, close). The control FIFO is served first, so a pong can
//! overtake queued data, but frames are always written whole. A close frame
//! goes through the data FIFO and therefore follows every message queued
//! before it. Once a close is queued nothing else is accepted.
//!
//! A streamed message reserves the data FIFO from its first chunk to its
//! last. Other messages, other streams and the close frame submitted in the
//! meantime are held back and released in order when the stream finishes.
//! Queueing a close while a stream is open ends that stream with an empty
//! final continuation frame.

use std::collections::VecDeque;

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::protocol::{Frame, OpCode};

/// Kind of an outbound job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// One frame of a data message.
    Data,
    /// Ping frame.
    Ping,
    /// Pong reply.
    Pong,
    /// Close frame.
    Close,
}

/// Sending half of a [`WriteCompletion`].
pub(crate) type CompletionTx = oneshot::Sender<Result<()>>;

/// One frame waiting to be written.
#[derive(Debug)]
pub struct WriteJob {
    pub(crate) kind: JobKind,
    pub(crate) frame: Frame,
    pub(crate) completion: Option<CompletionTx>,
}

impl WriteJob {
    pub(crate) fn new(kind: JobKind, frame: Frame, completion: Option<CompletionTx>) -> Self {
        Self {
            kind,
            frame,
            completion,
        }
    }

    /// Kind of this job.
    #[must_use]
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Frame to write.
    #[must_use]
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Resolve the job's completion handle, if any.
    pub(crate) fn complete(self, result: Result<()>) {
        resolve(self.completion, result);
    }
}

pub(crate) fn resolve(completion: Option<CompletionTx>, result: Result<()>) {
    if let Some(tx) = completion {
        // The application may have dropped its completion future.
        let _ = tx.send(result);
    }
}

/// Future resolving once a queued frame is on the wire, or with the reason
/// it never got there.
///
/// Dropping it does not cancel the write.
#[derive(Debug)]
#[must_use = "a WriteCompletion does nothing unless awaited, but dropping it does not cancel the write"]
pub struct WriteCompletion {
    rx: oneshot::Receiver<Result<()>>,
}

impl WriteCompletion {
    pub(crate) fn channel() -> (CompletionTx, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }
}

impl Future for WriteCompletion {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // Sender dropped: the connection went away with the job queued.
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::WriteAborted)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Data jobs waiting for a stream reservation to end.
#[derive(Debug)]
struct Held {
    /// `None` for a whole message or the close frame.
    stream: Option<u64>,
    jobs: Vec<WriteJob>,
    last: bool,
}

/// Control and data FIFOs.
#[derive(Debug, Default)]
pub struct WriteQueue {
    control: VecDeque<WriteJob>,
    data: VecDeque<WriteJob>,
    /// Stream that owns the data FIFO until its last chunk.
    reserved: Option<u64>,
    held: VecDeque<Held>,
    close_queued: bool,
}

impl WriteQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue all frames of one data message back to back. The completion
    /// resolves after the last frame is written.
    ///
    /// Refused with `Error::ConnectionClosed` once a close is queued.
    pub(crate) fn push_message(
        &mut self,
        frames: impl IntoIterator<Item = Frame>,
        completion: Option<CompletionTx>,
    ) {
        if self.close_queued {
            resolve(completion, Err(Error::ConnectionClosed));
            return;
        }
        let jobs = data_jobs(frames, completion);
        self.admit(Held {
            stream: None,
            jobs,
            last: true,
        });
    }

    /// Queue the frames of one chunk of streamed message `stream`. The first
    /// chunk reserves the data FIFO; the chunk with `last` set releases it.
    ///
    /// Refused with `Error::ConnectionClosed` once a close is queued.
    pub(crate) fn push_chunk(
        &mut self,
        stream: u64,
        frames: impl IntoIterator<Item = Frame>,
        completion: Option<CompletionTx>,
        last: bool,
    ) {
        if self.close_queued {
            resolve(completion, Err(Error::ConnectionClosed));
            return;
        }
        let jobs = data_jobs(frames, completion);
        self.admit(Held {
            stream: Some(stream),
            jobs,
            last,
        });
    }

    /// Queue a ping or pong ahead of pending data.
    ///
    /// Refused with `Error::ConnectionClosed` once a close is queued.
    pub(crate) fn push_control(
        &mut self,
        kind: JobKind,
        frame: Frame,
        completion: Option<CompletionTx>,
    ) {
        if self.close_queued {
            resolve(completion, Err(Error::ConnectionClosed));
            return;
        }
        self.control.push_back(WriteJob::new(kind, frame, completion));
    }

    /// Queue a close frame behind pending data. Only the first close is
    /// accepted.
    pub(crate) fn push_close(&mut self, frame: Frame, completion: Option<CompletionTx>) {
        if self.close_queued {
            resolve(completion, Err(Error::ConnectionClosed));
            return;
        }
        self.close_queued = true;

        while self.reserved.take().is_some() {
            let end = Frame::new(true, OpCode::Continuation, Bytes::new());
            self.data.push_back(WriteJob::new(JobKind::Data, end, None));
            self.release();
        }
        self.data
            .push_back(WriteJob::new(JobKind::Close, frame, completion));
    }

    fn admit(&mut self, item: Held) {
        if self.reserved.is_none_or(|id| item.stream == Some(id)) {
            self.append(item);
            self.release();
        } else {
            self.held.push_back(item);
        }
    }

    fn append(&mut self, item: Held) {
        self.data.extend(item.jobs);
        if let Some(id) = item.stream {
            self.reserved = (!item.last).then_some(id);
        }
    }

    /// Move held items into the data FIFO while the reservation allows.
    fn release(&mut self) {
        loop {
            let next = match self.reserved {
                None if self.held.is_empty() => None,
                None => Some(0),
                Some(id) => self.held.iter().position(|item| item.stream == Some(id)),
            };
            let Some(item) = next.and_then(|index| self.held.remove(index)) else {
                return;
            };
            self.append(item);
        }
    }

    /// Next job to write: control first, then data.
    pub fn pop(&mut self) -> Option<WriteJob> {
        self.control.pop_front().or_else(|| self.data.pop_front())
    }

    /// Whether a close frame has been queued (it may already be written).
    #[must_use]
    pub const fn is_close_queued(&self) -> bool {
        self.close_queued
    }

    /// Whether a streamed message currently owns the data FIFO.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        self.reserved.is_some()
    }

    /// Number of queued jobs, held ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        let held: usize = self.held.iter().map(|item| item.jobs.len()).sum();
        self.control.len() + self.data.len() + held
    }

    /// Whether no job is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve every queued job with `error` and empty the queue.
    pub(crate) fn abort_all(&mut self, error: &Error) {
        self.reserved = None;
        let held = self.held.drain(..).flat_map(|item| item.jobs);
        for job in self.control.drain(..).chain(self.data.drain(..)).chain(held) {
            job.complete(Err(error.clone()));
        }
    }
}

/// Data jobs for `frames`, with the completion on the last one. Resolves
/// the completion at once when there is nothing to write.
fn data_jobs(
    frames: impl IntoIterator<Item = Frame>,
    completion: Option<CompletionTx>,
) -> Vec<WriteJob> {
    let mut jobs: Vec<_> = frames
        .into_iter()
        .map(|frame| WriteJob::new(JobKind::Data, frame, None))
        .collect();
    match jobs.last_mut() {
        Some(last) => last.completion = completion,
        None => resolve(completion, Ok(())),
    }
    jobs
}
