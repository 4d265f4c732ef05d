//! Authenticated session state for a REST + WebSocket pair.

/// The authenticated state captured from a successful sign-in handshake.
///
/// The cookie and the nonce are always presented together on authenticated
/// requests; neither is valid alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session nonce returned by the connect step; sent as `X-Auth-Nonce`.
    pub nonce: String,
    /// Cookie bundle captured from `Set-Cookie`; sent as `Cookie`.
    pub cookie: String,
}

impl Session {
    pub fn new(nonce: String, cookie: String) -> Self {
        Self { nonce, cookie }
    }
}
