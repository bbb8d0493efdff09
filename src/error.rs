use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::time::Duration;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A boxed alias of [`std::error::Error`] used to accept unknown
/// error types as sources.
pub type BoxStdError = Box<dyn StdError + Send + Sync>;

/// Represents all the ways a method can fail within marlin.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A caller-supplied value was rejected before anything was sent
    /// to the server: an empty query, a missing `:name` parameter, a
    /// parameter-count mismatch, or a failed typed row conversion.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The connection was not in a state that permits the requested
    /// operation.
    #[error("unexpected connection state: {0}")]
    UnexpectedState(String),

    /// A packet arrived whose kind or framing does not fit the
    /// current protocol phase.
    #[error("unexpected packet: {0}")]
    UnexpectedPacket(String),

    /// A packet of the expected kind carried a malformed payload.
    #[error("unexpected payload: {0}")]
    UnexpectedPayload(String),

    /// The server requested a protocol feature this client does not
    /// implement.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An operation did not complete within the configured duration.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The connection was closed by an earlier call to `close` or by
    /// a prior fatal error.
    #[error("connection is closed")]
    ClosedConnection,

    /// The underlying transport failed mid-operation. The connection
    /// is unusable afterwards.
    #[error("connection is broken")]
    BrokenConnection(#[source] Option<BoxStdError>),

    /// An ERR packet from the server. The connection remains usable.
    #[error(transparent)]
    Server(Box<ServerError>),
}

impl Error {
    /// `true` for the error kinds the pool transparently retries by
    /// discarding the connection and acquiring a fresh one.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ClosedConnection | Error::BrokenConnection(_))
    }

    /// `true` for errors that leave the connection in an undefined
    /// protocol state. The connection is torn down when one occurs.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::UnexpectedPacket(_)
                | Error::UnexpectedPayload(_)
                | Error::Unsupported(_)
                | Error::Timeout(_)
                | Error::BrokenConnection(_)
        )
    }

    /// `true` for every kind except [`Error::Server`]. A client error
    /// marks a pooled connection as non-reusable.
    pub(crate) fn is_client_error(&self) -> bool {
        !matches!(self, Error::Server(_))
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::BrokenConnection(Some(error.into()))
    }
}

impl From<ServerError> for Error {
    fn from(error: ServerError) -> Self {
        Error::Server(Box::new(error))
    }
}

/// An error returned by the MySQL server as an ERR packet.
#[derive(Debug)]
pub struct ServerError {
    pub(crate) code: u16,
    pub(crate) sql_state: Option<String>,
    pub(crate) message: String,

    // the query that provoked the error, when one is known
    pub(crate) query: Option<String>,
}

impl ServerError {
    /// Returns a human-readable error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the error code.
    ///
    /// All possible error codes are documented in the
    /// [Server Error Message Reference](https://dev.mysql.com/doc/mysql-errors/8.0/en/server-error-reference.html).
    #[must_use]
    pub const fn code(&self) -> u16 {
        self.code
    }

    /// Returns the [SQLSTATE](https://en.wikipedia.org/wiki/SQLSTATE)
    /// error code, when the server sent one.
    #[must_use]
    pub fn sql_state(&self) -> Option<&str> {
        self.sql_state.as_deref()
    }

    /// Returns the query that provoked this error, when one is known.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.sql_state {
            Some(state) => write!(f, "{} ({}): {}", self.code, state, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl StdError for ServerError {}

impl Error {
    /// Attaches the originating query to a server error for
    /// diagnostics. Every other kind passes through unchanged.
    pub(crate) fn with_query(self, query: &str) -> Self {
        match self {
            Error::Server(mut server) => {
                server.query = Some(query.to_owned());
                Error::Server(server)
            }
            other => other,
        }
    }
}

macro_rules! err_packet {
    ($($args:tt)*) => {
        $crate::error::Error::UnexpectedPacket(format!($($args)*))
    };
}

macro_rules! err_payload {
    ($($args:tt)*) => {
        $crate::error::Error::UnexpectedPayload(format!($($args)*))
    };
}

pub(crate) use {err_packet, err_payload};
