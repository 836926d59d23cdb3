//! Endpoint role.

/// Which end of the connection this endpoint is.
///
/// Decides masking per RFC 6455 Section 5.3: clients mask every frame they
/// send and reject masked input, servers do the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Initiated the connection.
    Client,
    /// Accepted the connection.
    Server,
}

impl Role {
    /// Whether outgoing frames get a masking key.
    #[inline]
    #[must_use]
    pub const fn must_mask(&self) -> bool {
        matches!(self, Role::Client)
    }

    /// Lowercase name, as used in log fields.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Server => "server",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
