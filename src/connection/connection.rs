use std::future::{Future, pending};
use std::io;
use std::pin::Pin;

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::time::{Sleep, sleep};
use tracing::{Instrument, debug, debug_span, trace, warn};

use crate::config::Config;
use crate::connection::fragmenter::MessageFragmenter;
use crate::connection::handle::Command;
use crate::connection::queue::{CompletionTx, JobKind, WriteQueue, resolve};
use crate::connection::{ConnectionState, Handler, Role, WebSocket};
use crate::error::{Error, ErrorKind, Result};
use crate::message::{CloseCode, CloseFrame, Control};
use crate::protocol::close::{encode_close_payload, parse_close_payload, validate_close_code};
use crate::protocol::{Frame, FrameParser, FrameValidator, MaskGenerator, MessageAssembler, OpCode};
use crate::stream::{self, ByteStream, StreamReader, StreamWriter};

type Writer<T> = StreamWriter<WriteHalf<T>>;
type WriteFuture<T> = Pin<Box<dyn Future<Output = (Writer<T>, io::Result<()>)> + Send>>;

/// The frame currently being written. The writer travels with the future
/// and comes back when the write finishes.
struct InFlight<T> {
    kind: JobKind,
    completion: Option<CompletionTx>,
    write: WriteFuture<T>,
}

/// One WebSocket connection over an already upgraded byte stream.
///
/// `Connection` owns the stream and runs the protocol on a single task:
/// it parses incoming frames incrementally, reassembles messages, answers
/// pings, writes queued frames one at a time and drives the close
/// handshake. Events reach the application through a [`Handler`]; writes
/// go through [`WebSocket`] handles.
///
/// ## Example
///
/// ```rust,ignore
/// use wsloop::{Config, Connection, Handler, Message, Role, WebSocket};
///
/// struct Echo;
///
/// impl Handler for Echo {
///     fn on_message(&mut self, ws: &WebSocket, message: Message) {
///         let _ = ws.send(message);
///     }
/// }
///
/// let stream = listener.accept().await?.0;
/// Connection::new(stream, Role::Server, Config::default(), Echo).run().await?;
/// ```
pub struct Connection<T, H> {
    reader: StreamReader<ReadHalf<T>>,
    writer: Option<Writer<T>>,
    in_flight: Option<InFlight<T>>,
    queue: WriteQueue,
    parser: FrameParser,
    assembler: MessageAssembler,
    masks: MaskGenerator,
    role: Role,
    config: Config,
    state: ConnectionState,
    close_written: bool,
    close_received: bool,
    failing: bool,
    close_timer: Option<Pin<Box<Sleep>>>,
    commands: mpsc::UnboundedReceiver<Command>,
    handle: WebSocket,
    handler: H,
    error: Option<Error>,
}

impl<T: ByteStream, H: Handler> Connection<T, H> {
    /// Create a connection. Nothing happens until [`run`](Self::run) is
    /// awaited.
    ///
    /// ## Arguments
    ///
    /// - `io`: The upgraded byte stream
    /// - `role`: Client connections mask outgoing frames and expect unmasked
    ///   ones; servers the reverse
    /// - `config`: Limits, fragmentation and timeouts
    /// - `handler`: Receives connection events
    pub fn new(io: T, role: Role, config: Config, handler: H) -> Self {
        let (reader, writer) = stream::split(io, config.read_buffer_size);
        let validator = FrameValidator::new(role, config.limits.clone())
            .with_accept_unmasked(config.accept_unmasked_frames);
        let (tx, commands) = mpsc::unbounded_channel();

        Self {
            reader,
            writer: Some(writer),
            in_flight: None,
            queue: WriteQueue::new(),
            parser: FrameParser::new(validator),
            assembler: MessageAssembler::new(config.limits.clone()),
            masks: MaskGenerator::new(),
            role,
            config,
            state: ConnectionState::Open,
            close_written: false,
            close_received: false,
            failing: false,
            close_timer: None,
            commands,
            handle: WebSocket::new(tx, role),
            handler,
            error: None,
        }
    }

    /// A write handle, usable before and while the connection runs.
    #[must_use]
    pub fn handle(&self) -> WebSocket {
        self.handle.clone()
    }

    /// Connection role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current close handshake state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Drive the connection until it is closed.
    ///
    /// Calls `on_connect` first and `on_close` last. Returns `Ok(())` after
    /// a clean close handshake, otherwise the first error that failed the
    /// connection (the same one passed to `on_error`).
    ///
    /// # Errors
    ///
    /// - Protocol violations by the peer, after a close frame with the
    ///   matching status code has been sent
    /// - I/O errors and unexpected end of stream
    /// - `Error::CloseTimeout` if the peer never completed the handshake
    pub async fn run(self) -> Result<()> {
        let span = debug_span!("websocket", role = %self.role);
        self.drive().instrument(span).await
    }

    async fn drive(mut self) -> Result<()> {
        debug!("connection open");
        self.handler.on_connect(&self.handle);

        while !self.state.is_closed() {
            self.start_next_write();

            let reading = self.is_reading();
            tokio::select! {
                biased;

                () = wait_timer(&mut self.close_timer) => self.on_close_timeout(),
                (writer, result) = wait_write(&mut self.in_flight) => {
                    self.on_write_done(writer, result);
                }
                Some(command) = self.commands.recv() => self.on_command(command),
                result = read_frame(&mut self.reader, &mut self.parser), if reading => {
                    match result {
                        Ok(frame) => self.on_frame(frame),
                        Err(err) if err.kind() == ErrorKind::Io => self.on_io_error(err),
                        Err(err) => self.fail(err),
                    }
                }
            }
        }

        self.shutdown().await
    }

    fn is_reading(&self) -> bool {
        !self.close_received && !self.failing && !self.state.is_closed()
    }

    fn start_next_write(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        let Some(mut writer) = self.writer.take() else {
            return;
        };
        let Some(job) = self.queue.pop() else {
            self.writer = Some(writer);
            return;
        };

        let mask = self.role.must_mask().then(|| self.masks.next_mask());
        let (head, body) = job.frame.to_wire(mask);
        trace!(
            kind = ?job.kind,
            opcode = %job.frame.opcode,
            fin = job.frame.fin,
            len = body.len(),
            "writing frame"
        );

        let write: WriteFuture<T> = Box::pin(async move {
            let result = writer.write_chain(head.chain(body)).await;
            (writer, result)
        });
        self.in_flight = Some(InFlight {
            kind: job.kind,
            completion: job.completion,
            write,
        });
    }

    fn on_write_done(&mut self, writer: Writer<T>, result: io::Result<()>) {
        self.writer = Some(writer);
        let Some(InFlight {
            kind, completion, ..
        }) = self.in_flight.take()
        else {
            return;
        };

        match result {
            Ok(()) => {
                resolve(completion, Ok(()));
                if kind == JobKind::Close {
                    debug!(state = %self.state, "close frame written");
                    self.close_written = true;
                    self.update_closed();
                }
            }
            Err(err) => {
                let err = Error::from(err);
                resolve(completion, Err(err.clone()));
                self.on_io_error(err);
            }
        }
    }

    fn on_command(&mut self, command: Command) {
        if !self.state.can_send() {
            trace!(state = %self.state, "write refused");
            command.refuse();
            return;
        }

        match command {
            Command::Send {
                message,
                completion,
            } => {
                let opcode = message.opcode();
                let payload = Bytes::from(message.into_payload());
                let frames = MessageFragmenter::new(payload, opcode, self.config.fragment_size);
                self.queue.push_message(frames, Some(completion));
            }
            Command::Chunk {
                stream,
                opcode,
                payload,
                last,
                completion,
            } => {
                let frames = MessageFragmenter::new(payload, opcode, self.config.fragment_size)
                    .with_fin(last);
                self.queue.push_chunk(stream, frames, completion, last);
            }
            Command::Control {
                kind,
                frame,
                completion,
            } => self.queue.push_control(kind, frame, Some(completion)),
            Command::Close { frame, completion } => {
                debug!("close requested by application");
                self.queue.push_close(frame, Some(completion));
                self.enter_closing(ConnectionState::ClosingSent);
            }
        }
    }

    fn on_frame(&mut self, frame: Frame) {
        trace!(
            opcode = %frame.opcode,
            fin = frame.fin,
            len = frame.payload.len(),
            "frame received"
        );

        match frame.opcode {
            OpCode::Ping => {
                if self.state == ConnectionState::Open {
                    self.queue
                        .push_control(JobKind::Pong, Frame::pong(frame.payload.clone()), None);
                }
                let control = Control::Ping(frame.payload.to_vec());
                self.handler.on_control(&self.handle, &control);
            }
            OpCode::Pong => {
                let control = Control::Pong(frame.payload.to_vec());
                self.handler.on_control(&self.handle, &control);
            }
            OpCode::Close => self.on_peer_close(&frame.payload),
            _ if self.state.delivers_data() => match self.assembler.push(frame) {
                Ok(Some(message)) => self.handler.on_message(&self.handle, message),
                Ok(None) => {}
                Err(err) => self.fail(err),
            },
            _ => trace!(state = %self.state, "discarding data frame"),
        }
    }

    fn on_peer_close(&mut self, payload: &[u8]) {
        let close = match parse_close_payload(payload) {
            Ok(close) => close,
            Err(err) => return self.fail(err),
        };
        debug!(
            code = close.as_ref().map(|c| c.code.as_u16()),
            state = %self.state,
            "close frame received"
        );

        self.close_received = true;

        // A close carrying a code that must not be sent is a protocol
        // error, not a close event.
        let code_error = close
            .as_ref()
            .and_then(|c| validate_close_code(c.code).err());
        match &code_error {
            Some(err) => warn!(error = %err, "peer sent a close code that must not be sent"),
            None => self
                .handler
                .on_control(&self.handle, &Control::Close(close.clone())),
        }

        match self.state {
            ConnectionState::Open => {
                let echo = match (&close, code_error) {
                    (None, _) => Frame::new(true, OpCode::Close, Bytes::new()),
                    (Some(close), None) => close_frame(close.code),
                    (Some(_), Some(err)) => {
                        self.report(err);
                        close_frame(CloseCode::ProtocolError)
                    }
                };
                self.queue.push_close(echo, None);
                self.enter_closing(ConnectionState::ClosingReceived);
            }
            _ => {
                if let Some(err) = code_error {
                    self.report(err);
                }
                self.update_closed();
            }
        }
    }

    /// Fail the connection after a protocol violation: drop queued writes,
    /// send a close frame with the matching status and stop reading.
    fn fail(&mut self, err: Error) {
        let code = err.close_code();
        warn!(error = %err, code = %code, "protocol error");
        self.report(err);
        self.failing = true;
        self.parser.reset();
        self.assembler.reset();

        if self.state == ConnectionState::Open {
            self.queue.abort_all(&Error::WriteAborted);
            self.queue.push_close(close_frame(code), None);
            self.enter_closing(ConnectionState::ClosingSent);
        } else {
            self.update_closed();
        }
    }

    fn on_io_error(&mut self, err: Error) {
        warn!(error = %err, state = %self.state, "stream failed");
        self.report(err);
        self.abort();
    }

    fn on_close_timeout(&mut self) {
        warn!(timeout = ?self.config.close_timeout, state = %self.state, "close handshake timed out");
        self.report(Error::CloseTimeout);
        self.abort();
    }

    /// Pass the first error to the handler and remember it.
    fn report(&mut self, err: Error) {
        if self.error.is_none() {
            self.handler.on_error(&self.handle, &err);
            self.error = Some(err);
        }
    }

    fn enter_closing(&mut self, next: ConnectionState) {
        debug!(from = %self.state, to = %next, "closing");
        self.state = next;
        if self.close_timer.is_none() {
            self.close_timer = Some(Box::pin(sleep(self.config.close_timeout)));
        }
    }

    fn update_closed(&mut self) {
        if self.close_written && (self.close_received || self.failing) {
            self.enter_closed();
        }
    }

    fn enter_closed(&mut self) {
        if !self.state.is_closed() {
            debug!(from = %self.state, "connection closed");
            self.state = ConnectionState::Closed;
            self.close_timer = None;
        }
    }

    /// Hard teardown: abandon the in-flight write and skip the graceful
    /// shutdown of the stream.
    fn abort(&mut self) {
        self.in_flight = None;
        self.writer = None;
        self.queue.abort_all(&Error::WriteAborted);
        self.enter_closed();
    }

    async fn shutdown(mut self) -> Result<()> {
        self.close_timer = None;
        self.in_flight = None;
        self.queue.abort_all(&Error::WriteAborted);

        if let Some(mut writer) = self.writer.take() {
            if let Err(err) = writer.close().await {
                debug!(error = %err, "stream shutdown failed");
            }
        }

        debug!(error = ?self.error, "connection finished");
        self.handler.on_close();
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn close_frame(code: CloseCode) -> Frame {
    let payload = encode_close_payload(Some(&CloseFrame::new(code, ""))).unwrap_or_default();
    Frame::new(true, OpCode::Close, payload)
}

/// Read one complete frame. Cancel-safe: bytes are only consumed once the
/// parser's next stage is fully buffered.
async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut StreamReader<R>,
    parser: &mut FrameParser,
) -> Result<Frame> {
    loop {
        let needed = parser.bytes_needed();
        reader.read_at_least(needed).await?;
        if let Some(frame) = parser.feed(reader.consume(needed))? {
            return Ok(frame);
        }
    }
}

async fn wait_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

async fn wait_write<T>(in_flight: &mut Option<InFlight<T>>) -> (Writer<T>, io::Result<()>) {
    match in_flight {
        Some(job) => job.write.as_mut().await,
        None => pending().await,
    }
}
