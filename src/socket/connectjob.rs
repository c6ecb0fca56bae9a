use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::socket::client::SocketType;
use crate::socket::tls::TlsConfig;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Budget for DNS plus TCP connect. The TLS handshake has its own share of
    /// the request timeout.
    pub connect_timeout: Duration,
    pub tls: TlsConfig,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(20),
            tls: TlsConfig::default(),
        }
    }
}

/// DNS -> TCP -> TLS for one request.
pub struct ConnectJob;

impl ConnectJob {
    pub async fn connect(url: &Url, options: &ConnectOptions) -> Result<SocketType, NetError> {
        let secure = match url.scheme() {
            "https" => true,
            "http" => false,
            _ => return Err(NetError::DisallowedUrlScheme),
        };
        let host = url.host_str().ok_or(NetError::InvalidUrl)?;
        let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;
        let bare_host = host.trim_start_matches('[').trim_end_matches(']');

        let stream = tokio::time::timeout(options.connect_timeout, connect_tcp(bare_host, port))
            .await
            .map_err(|_| {
                debug!(host = %host, port, "connect timed out");
                NetError::ConnectionTimedOut
            })??;

        if !secure {
            return Ok(SocketType::Tcp(stream));
        }

        let connector = options.tls.build_connector()?;
        let mut config = connector
            .configure()
            .map_err(|_| NetError::SslProtocolError)?;
        config.set_use_server_name_indication(TlsConfig::should_set_sni(bare_host));
        if !options.tls.verify_peer {
            config.set_verify_hostname(false);
        }

        let tls_stream = tokio_boring::connect(config, bare_host, stream)
            .await
            .map_err(|e| {
                debug!(host = %host, error = ?e, "TLS handshake failed");
                NetError::SslProtocolError
            })?;
        Ok(SocketType::Ssl(tls_stream))
    }
}

async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream, NetError> {
    let addrs = tokio::net::lookup_host((host, port)).await.dns_context(host)?;

    let mut last_error = NetError::NameNotResolved;
    for addr in addrs {
        match TcpStream::connect(addr).await.connection_context(host, port) {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(error = %e, "failed to set TCP_NODELAY");
                }
                return Ok(stream);
            }
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}
