//! Opens and handshakes connections for every configured transport.

use super::RpcChannel;
use super::client::McpConnection;
use async_trait::async_trait;
use conductor_application::{ServerConnection, TransportConnector, TransportError};
use conductor_domain::{ServerConfig, SessionCookie, TransportSpec};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// [`TransportConnector`] for stdio, TCP and (with the `http` feature)
/// streamable HTTP servers.
pub struct McpConnector {
    client_name: String,
    client_version: String,
    handshake_timeout: Duration,
    #[cfg(feature = "http")]
    http_client: reqwest::Client,
}

impl McpConnector {
    pub fn new(client_name: impl Into<String>, client_version: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            client_version: client_version.into(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            #[cfg(feature = "http")]
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    async fn open_channel(
        &self,
        config: &ServerConfig,
    ) -> Result<Box<dyn RpcChannel>, TransportError> {
        match &config.transport {
            TransportSpec::Stdio { command, args, env } => Ok(Box::new(super::stdio::spawn(
                &config.name,
                command,
                args,
                env,
            )?)),
            TransportSpec::Tcp { address } => {
                Ok(Box::new(super::tcp::connect(&config.name, address).await?))
            }
            #[cfg(feature = "http")]
            TransportSpec::Http { url, headers } => Ok(Box::new(super::http::HttpChannel::new(
                &config.name,
                self.http_client.clone(),
                url,
                headers.clone(),
            ))),
            #[cfg(not(feature = "http"))]
            TransportSpec::Http { .. } => Err(TransportError::Unsupported(
                "http (built without the `http` feature)".into(),
            )),
        }
    }
}

#[async_trait]
impl TransportConnector for McpConnector {
    async fn connect(
        &self,
        config: &ServerConfig,
        cookie: Option<SessionCookie>,
    ) -> Result<Arc<dyn ServerConnection>, TransportError> {
        debug!(
            server = %config.name,
            transport = %config.transport.kind(),
            resume = cookie.is_some(),
            "Opening connection"
        );

        let handshake = async {
            let channel = self.open_channel(config).await?;
            McpConnection::initialize(
                &config.name,
                channel,
                cookie,
                &self.client_name,
                &self.client_version,
            )
            .await
        };
        let connection = tokio::time::timeout(self.handshake_timeout, handshake)
            .await
            .map_err(|_| TransportError::Timeout)??;

        info!(server = %config.name, "Connected");
        Ok(Arc::new(connection))
    }
}
