//! Close handshake state machine (RFC 6455 Section 7).

/// WebSocket connection state.
///
/// ```text
///          app close / engine error          peer close
///   Open ---------------------------> ClosingSent      ClosingReceived <--- Open
///                                         |                  |
///             peer close + own close sent |                  | echo sent
///                                         v                  v
///                                       Closed <-------------+
/// ```
///
/// Either closing state arms the close timer; its expiry forces `Closed`.
/// There is no way back to `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ConnectionState {
    /// Connection is open and ready for data transfer.
    #[default]
    Open,
    /// We queued a close frame and wait for the peer's echo.
    ClosingSent,
    /// The peer sent a close frame; our echo is queued.
    ClosingReceived,
    /// Connection is fully closed.
    Closed,
}

impl ConnectionState {
    /// Whether application data may be sent.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Whether incoming data frames are delivered. Late data frames in a
    /// closing state are discarded.
    #[must_use]
    #[inline]
    pub const fn delivers_data(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Whether a close handshake is in progress.
    #[must_use]
    #[inline]
    pub const fn is_closing(&self) -> bool {
        matches!(
            self,
            ConnectionState::ClosingSent | ConnectionState::ClosingReceived
        )
    }

    /// Whether the connection is fully closed.
    #[must_use]
    #[inline]
    pub const fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::ClosingSent => write!(f, "ClosingSent"),
            ConnectionState::ClosingReceived => write!(f, "ClosingReceived"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}
