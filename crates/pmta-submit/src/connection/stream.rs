//! Plain and TLS streams to the submission server.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::config::{Config, Security};
use crate::error::{Error, Result, Stage};

/// A stream that can be either plaintext or TLS.
#[derive(Debug)]
pub enum MailStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl MailStream {
    /// Upgrades a plaintext stream to TLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already TLS, the host is not a
    /// valid server name, or the handshake fails.
    pub async fn upgrade_to_tls(self, host: &str) -> Result<Self> {
        let tcp = match self {
            Self::Plain(tcp) => tcp,
            Self::Tls(_) => return Err(Error::Protocol("Stream is already TLS".into())),
        };

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| Error::invalid(format!("invalid TLS server name: {host}")))?;
        let tls = create_tls_connector()
            .connect(server_name, tcp)
            .await
            .map_err(handshake_error)?;
        Ok(Self::Tls(Box::new(tls)))
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for MailStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MailStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Opens the stream described by `config`, bounded by its connect timeout.
///
/// # Errors
///
/// Returns [`Error::ConnectionRefused`] if nothing listens on the endpoint,
/// [`Error::Timeout`] if the connect (or implicit TLS handshake) does not
/// finish in time, and other I/O or TLS errors as they occur.
pub async fn connect(config: &Config) -> Result<MailStream> {
    let tcp = match timeout(
        config.connect_timeout,
        TcpStream::connect((config.host.as_str(), config.port)),
    )
    .await
    {
        Err(_) => return Err(Error::Timeout(Stage::Connect)),
        Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
            return Err(Error::ConnectionRefused {
                host: config.host.clone(),
                port: config.port,
            });
        }
        Ok(Err(e)) => return Err(e.into()),
        Ok(Ok(tcp)) => tcp,
    };

    let stream = MailStream::Plain(tcp);
    match config.security {
        Security::Implicit => timeout(config.connect_timeout, stream.upgrade_to_tls(&config.host))
            .await
            .map_err(|_| Error::Timeout(Stage::Connect))?,
        Security::None | Security::StartTls => Ok(stream),
    }
}

/// Surfaces the rustls error wrapped inside a failed handshake.
fn handshake_error(e: io::Error) -> Error {
    match e
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        Some(tls) => Error::Tls(tls.clone()),
        None => Error::Io(e),
    }
}

/// Creates a TLS connector with the webpki root certificates.
fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_plain() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = connect(&Config::new("127.0.0.1", port)).await.unwrap();
        assert!(!stream.is_tls());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect(&Config::new("127.0.0.1", port)).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionRefused { port: p, .. } if p == port));
    }

    #[tokio::test]
    async fn test_upgrade_rejects_invalid_server_name() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let stream = connect(&Config::new("127.0.0.1", port)).await.unwrap();

        let err = stream.upgrade_to_tls("not a host name").await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_silent_tls_handshake_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let hold = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            drop(socket);
        });

        let config = Config::builder("127.0.0.1")
            .port(port)
            .security(Security::Implicit)
            .connect_timeout(std::time::Duration::from_millis(200))
            .build();
        let err = connect(&config).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(Stage::Connect)));
        hold.abort();
    }
}
