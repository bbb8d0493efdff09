use std::fmt::{self, Debug, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod parse;

/// The default charset byte sent in the handshake response:
/// `utf8_general_ci`.
pub(crate) const DEFAULT_CHARSET: u8 = 33;

/// Options which can be used to configure how a MySQL connection is
/// opened.
///
/// Either build one up from [`ConnectOptions::new`] or parse a URL:
///
/// ```text
/// mysql://[user[:password]@]host[:port][/database][?socket=..&require-tls=true]
/// ```
#[derive(Clone, PartialEq)]
pub struct ConnectOptions {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) socket: Option<PathBuf>,
    pub(crate) username: String,
    pub(crate) password: Option<String>,
    pub(crate) database: Option<String>,
    pub(crate) require_tls: bool,
    pub(crate) charset: u8,
    pub(crate) collation: String,
    pub(crate) connect_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 3306,
            socket: None,
            username: "root".to_owned(),
            password: None,
            database: None,
            require_tls: false,
            charset: DEFAULT_CHARSET,
            collation: "utf8_general_ci".to_owned(),
            connect_timeout: Duration::from_secs(15),
        }
    }
}

impl ConnectOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hostname to connect to. Defaults to `localhost`.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port. Defaults to `3306`.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Connects over a UNIX domain socket instead of TCP. The host
    /// and port are ignored when set.
    #[must_use]
    pub fn socket(mut self, path: impl AsRef<Path>) -> Self {
        self.socket = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the account to authenticate as. Defaults to `root`.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Selects a default database during the handshake.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Requires the transport to be upgraded to TLS before
    /// credentials are sent. Connecting to a server without TLS
    /// support then fails instead of degrading.
    #[must_use]
    pub fn require_tls(mut self, require_tls: bool) -> Self {
        self.require_tls = require_tls;
        self
    }

    /// Sets the charset byte sent in the handshake response.
    /// Defaults to `33` (`utf8_general_ci`).
    #[must_use]
    pub fn charset(mut self, charset: u8) -> Self {
        self.charset = charset;
        self
    }

    /// Sets the collation installed with `SET @@collation_connection`
    /// right after the connection is established. Defaults to
    /// `utf8_general_ci`.
    #[must_use]
    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = collation.into();
        self
    }

    /// Bounds the whole connection attempt, from the TCP connect
    /// through the end of authentication. Defaults to 15 seconds.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Debug for ConnectOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("socket", &self.socket)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("require_tls", &self.require_tls)
            .field("charset", &self.charset)
            .field("collation", &self.collation)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
