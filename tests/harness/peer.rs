//! Raw frame-level peer.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use wsloop::protocol::{Frame, FrameHeader};
use wsloop::{CloseCode, CloseFrame};

/// The far end of a connection under test.
pub struct Peer {
    io: DuplexStream,
    buf: BytesMut,
    mask: Option<[u8; 4]>,
}

impl Peer {
    /// Peer acting as a client: masks what it sends.
    pub fn client(io: DuplexStream) -> Self {
        Self {
            io,
            buf: BytesMut::new(),
            mask: Some([0x37, 0xfa, 0x21, 0x3d]),
        }
    }

    /// Peer acting as a server: sends unmasked frames.
    pub fn server(io: DuplexStream) -> Self {
        Self {
            io,
            buf: BytesMut::new(),
            mask: None,
        }
    }

    /// Use `mask` for subsequent frames, `None` to send unmasked.
    pub fn set_mask(&mut self, mask: Option<[u8; 4]>) {
        self.mask = mask;
    }

    /// Encode `frame` with this peer's masking.
    pub fn encode(&self, frame: &Frame) -> Vec<u8> {
        let mut out = BytesMut::new();
        frame.encode(self.mask, &mut out);
        out.to_vec()
    }

    pub async fn send(&mut self, frame: &Frame) {
        let bytes = self.encode(frame);
        self.send_raw(&bytes).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.io.write_all(bytes).await.unwrap();
    }

    pub async fn send_close(&mut self, code: CloseCode, reason: &str) {
        self.send(&Frame::close(Some(&CloseFrame::new(code, reason))).unwrap())
            .await;
    }

    /// Send a close frame with a raw status code, bypassing code validation.
    pub async fn send_close_code(&mut self, code: u16) {
        let frame = Frame::new(true, wsloop::OpCode::Close, code.to_be_bytes().to_vec());
        self.send(&frame).await;
    }

    /// Next frame with the header it arrived with, or `None` once the
    /// stream has ended.
    pub async fn recv_with_header(&mut self) -> Option<(FrameHeader, Frame)> {
        loop {
            if let Some((header, _)) = FrameHeader::decode(&self.buf).unwrap() {
                if let Some((frame, consumed)) = Frame::parse(&self.buf).unwrap() {
                    self.buf.advance(consumed);
                    return Some((header, frame));
                }
            }
            let n = self.io.read_buf(&mut self.buf).await.unwrap();
            if n == 0 {
                assert!(self.buf.is_empty(), "stream ended inside a frame");
                return None;
            }
        }
    }

    pub async fn recv(&mut self) -> Option<Frame> {
        self.recv_with_header().await.map(|(_, frame)| frame)
    }

    /// Next frame, which must exist.
    pub async fn expect_frame(&mut self) -> Frame {
        self.recv().await.expect("stream ended before a frame arrived")
    }

    /// Read frames until the stream ends.
    pub async fn drain(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.recv().await {
            frames.push(frame);
        }
        frames
    }

    /// Close the write direction of the stream.
    pub async fn shutdown(&mut self) {
        self.io.shutdown().await.unwrap();
    }
}
