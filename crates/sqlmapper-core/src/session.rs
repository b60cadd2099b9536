//! Sessions, session providers and scoped session ownership.
//!
//! A [`Session`] is opened for exactly one façade call and closed on every
//! exit path. [`SessionGuard`] owns the session for that call: the happy
//! path closes it with [`SessionGuard::release`] so the close error can be
//! reported, and `Drop` closes it on early return or unwind.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ConnectionError, ConnectionErrorKind, Error, Result};

/// Process-unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate the next identifier.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// A unit of database work bound to one data source.
pub trait Session: Send {
    fn session_id(&self) -> SessionId;

    /// Data source key this session was opened against.
    fn data_source(&self) -> &str;
}

/// Opens and closes sessions per data source.
pub trait SessionProvider: Send + Sync {
    type Session: Session;

    /// Open a new session for `data_source`.
    #[allow(clippy::result_large_err)]
    fn open_session(&self, data_source: &str) -> Result<Self::Session>;

    /// Close a session opened by this provider.
    #[allow(clippy::result_large_err)]
    fn close_session(&self, session: Self::Session) -> Result<()>;
}

/// Owns one open session and guarantees it is closed exactly once.
pub struct SessionGuard<'p, P: SessionProvider> {
    provider: &'p P,
    session: Option<P::Session>,
}

impl<'p, P: SessionProvider> SessionGuard<'p, P> {
    /// Open a session for `data_source` under a guard.
    #[allow(clippy::result_large_err)]
    pub fn open(provider: &'p P, data_source: &str) -> Result<Self> {
        let session = provider.open_session(data_source)?;
        tracing::debug!(
            session = %session.session_id(),
            data_source = data_source,
            "Opened session"
        );
        Ok(Self {
            provider,
            session: Some(session),
        })
    }

    /// Borrow the guarded session.
    #[allow(clippy::result_large_err)]
    pub fn session_mut(&mut self) -> Result<&mut P::Session> {
        self.session.as_mut().ok_or_else(|| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Disconnected,
                message: "session already released".to_string(),
                source: None,
            })
        })
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(Session::session_id)
    }

    /// Close the session now, returning the close error if there is one.
    #[allow(clippy::result_large_err)]
    pub fn release(mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => {
                let id = session.session_id();
                let result = self.provider.close_session(session);
                tracing::debug!(session = %id, ok = result.is_ok(), "Closed session");
                result
            }
            None => Ok(()),
        }
    }
}

impl<P: SessionProvider> Drop for SessionGuard<'_, P> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            let id = session.session_id();
            match self.provider.close_session(session) {
                Ok(()) => tracing::debug!(session = %id, "Closed session on early exit"),
                Err(e) => tracing::warn!(session = %id, error = %e, "Failed to close session"),
            }
        }
    }
}

impl<P: SessionProvider> fmt::Debug for SessionGuard<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("session", &self.session_id())
            .finish()
    }
}
