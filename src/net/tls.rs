use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::Error;
use crate::net::Socket;

use self::Inner::{NotTls, Tls, Upgrading};

/// A transport that starts as a plain socket and may be upgraded to
/// TLS in place after the SSL request has been written.
pub(crate) struct MaybeTlsStream {
    inner: Inner,
}

enum Inner {
    NotTls(Socket),
    Tls(Box<tokio_native_tls::TlsStream<Socket>>),

    // transient state while the TLS handshake runs; reachable
    // afterwards only if the upgrade failed
    Upgrading,
}

impl MaybeTlsStream {
    pub(crate) fn new(socket: Socket) -> Self {
        Self {
            inner: NotTls(socket),
        }
    }

    pub(crate) fn is_tls(&self) -> bool {
        matches!(self.inner, Tls(_))
    }

    /// Swap the plain socket for a TLS session over the same bytes.
    ///
    /// The caller must have stopped reading first: any plaintext
    /// still buffered from the old stream would be silently
    /// misattributed to the TLS session.
    ///
    /// Certificate and hostname verification are intentionally off;
    /// trust decisions belong to the deployment, not this library.
    pub(crate) async fn upgrade(&mut self, host: &str) -> Result<(), Error> {
        let socket = match std::mem::replace(&mut self.inner, Upgrading) {
            NotTls(socket) => socket,
            Tls(_) => {
                return Err(Error::UnexpectedState(
                    "transport is already encrypted".into(),
                ));
            }
            Upgrading => {
                return Err(Error::UnexpectedState(
                    "a previous TLS upgrade failed".into(),
                ));
            }
        };

        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| Error::BrokenConnection(Some(e.into())))?;

        let stream = tokio_native_tls::TlsConnector::from(connector)
            .connect(host, socket)
            .await
            .map_err(|e| Error::BrokenConnection(Some(e.into())))?;

        self.inner = Tls(Box::new(stream));

        Ok(())
    }
}

macro_rules! forward_pin {
    ($self:ident.$method:ident($($arg:ident),*)) => {
        match &mut $self.inner {
            NotTls(s) => Pin::new(s).$method($($arg),*),
            Tls(s) => Pin::new(s.as_mut()).$method($($arg),*),
            Upgrading => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "TLS upgrade failed",
            ))),
        }
    };
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        forward_pin!(self.poll_read(cx, buf))
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        forward_pin!(self.poll_write(cx, buf))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        forward_pin!(self.poll_flush(cx))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        forward_pin!(self.poll_shutdown(cx))
    }
}
