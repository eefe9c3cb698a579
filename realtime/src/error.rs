//! Error types for the `realtime` crate.
//!
//! Follows the same pattern as the other layers: a root Error struct holding an
//! error kind tree and an optional source for error chaining.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in the real-time layer.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Auth(AuthErrorKind),
    Transport(TransportErrorKind),
    Serialization,
}

/// Reasons a connection attempt is refused before registration.
#[derive(Debug, PartialEq)]
pub enum AuthErrorKind {
    InvalidClientType,
    OriginNotAllowed,
    InvalidToken,
    ExpiredToken,
    /// Token decoded but lacks the id for the tenant it claims to be.
    InvalidClaims,
    /// Requested channel does not match the tenant the token resolves to.
    TenantMismatch,
    AdminRoleRequired,
    PlatformNotAllowed,
}

/// Errors from an individual socket.
#[derive(Debug, PartialEq)]
pub enum TransportErrorKind {
    /// The connection's writer has gone away; nothing more can be sent.
    ConnectionClosed,
    /// Inbound frame was not valid JSON text.
    MalformedFrame,
}

impl Error {
    pub fn auth(kind: AuthErrorKind) -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::Auth(kind),
        }
    }

    pub fn transport(kind: TransportErrorKind) -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::Transport(kind),
        }
    }

    /// Human readable reason sent in the close frame of a refused connection.
    pub fn close_reason(&self) -> &'static str {
        match &self.error_kind {
            ErrorKind::Auth(kind) => match kind {
                AuthErrorKind::InvalidClientType => "Invalid client type",
                AuthErrorKind::OriginNotAllowed => "Origin not allowed",
                AuthErrorKind::InvalidToken => "Invalid token",
                AuthErrorKind::ExpiredToken => "Token expired",
                AuthErrorKind::InvalidClaims => "Invalid token payload",
                AuthErrorKind::TenantMismatch => "Invalid client type",
                AuthErrorKind::AdminRoleRequired => "Admin role required",
                AuthErrorKind::PlatformNotAllowed => "Platform not allowed",
            },
            ErrorKind::Transport(_) | ErrorKind::Serialization => "Authentication failed",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Auth(kind) => write!(f, "Authentication error: {kind:?}"),
            ErrorKind::Transport(kind) => write!(f, "Transport error: {kind:?}"),
            ErrorKind::Serialization => write!(f, "Serialization error"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        let kind = match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthErrorKind::ExpiredToken,
            _ => AuthErrorKind::InvalidToken,
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Auth(kind),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Serialization,
        }
    }
}
