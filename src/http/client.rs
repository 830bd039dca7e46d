//! Outbound HTTP convenience operations.
//!
//! # Responsibilities
//! - Turn URL text into a connection (with retries) and one exchange
//! - GET a body as text, POST text and read the reply, GET into a file
//! - Report connector attempts at debug level
//!
//! # Design Decisions
//! - One connection per call, always disconnected before returning
//! - `get_content` and `get_file` swallow failures into `None`; `post`
//!   surfaces connect/send/receive failures and only maps non-2xx to `None`

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::{ClientConfig, SoapwireConfig};
use crate::http::exchange::{ExchangeError, MessageExchange};
use crate::http::request::Request;
use crate::http::response::ResponseHeader;
use crate::net::{
    Connection, ConnectError, Endpoint, EndpointError, RetryDelay, TlsError, TlsTrust,
    TransportConnector,
};
use crate::observability::metrics;

/// Attempts at synthesizing a download name before giving up.
const UNIQUE_NAME_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("failed to send request to {url}: {source}")]
    Send {
        url: String,
        #[source]
        source: ExchangeError,
    },

    #[error("failed to receive response from {url}: {source}")]
    Receive {
        url: String,
        #[source]
        source: ExchangeError,
    },
}

/// Where an exchange failed.
enum Stage {
    Send(ExchangeError),
    Receive(ExchangeError),
}

impl Stage {
    fn into_client_error(self, url: &str) -> ClientError {
        match self {
            Stage::Send(source) => ClientError::Send {
                url: url.to_string(),
                source,
            },
            Stage::Receive(source) => ClientError::Receive {
                url: url.to_string(),
                source,
            },
        }
    }
}

/// Outbound HTTP client. Every call opens and closes its own connection.
#[derive(Debug, Clone)]
pub struct HttpClient {
    connector: TransportConnector,
    config: ClientConfig,
}

impl HttpClient {
    pub fn new(connector: TransportConnector, config: ClientConfig) -> Self {
        Self { connector, config }
    }

    /// Build the connector from the `tls` and `client` sections.
    pub fn from_config(config: &SoapwireConfig) -> Result<Self, TlsError> {
        let trust = TlsTrust::from_config(&config.tls)?;
        let connector = TransportConnector::new(trust)?.with_retry_delay(RetryDelay {
            base_ms: config.client.retry_delay_ms,
            max_ms: config.client.max_retry_delay_ms,
        });
        Ok(Self::new(connector, config.client.clone()))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.config.connect_timeout_ms)
    }

    /// Open a connection to the endpoint named by `url`.
    pub async fn connect(&self, url: &str, retries: u32) -> Result<Connection, ClientError> {
        let endpoint = Endpoint::parse(url)?;
        Ok(self.connect_endpoint(&endpoint, retries).await?)
    }

    async fn connect_endpoint(
        &self,
        endpoint: &Endpoint,
        retries: u32,
    ) -> Result<Connection, ConnectError> {
        tracing::debug!(endpoint = %endpoint, retries, "Connecting");
        match self
            .connector
            .connect(endpoint, self.connect_timeout(), retries, None)
            .await
        {
            Ok(connection) => {
                tracing::debug!(
                    endpoint = %endpoint,
                    connection_id = %connection.id(),
                    remote_addr = %connection.remote_addr(),
                    "Connected"
                );
                Ok(connection)
            }
            Err(e) => {
                tracing::debug!(endpoint = %endpoint, attempt = e.attempts(), error = %e, "Connect failed");
                Err(e)
            }
        }
    }

    /// Send a request's header and then its body.
    pub async fn send_request(
        exchange: &mut MessageExchange<'_>,
        request: Request,
    ) -> Result<(), ExchangeError> {
        exchange.send_header(&request.header).await?;
        if !request.body.is_empty() {
            exchange.send_body(&request.header.fields, request.body).await?;
        }
        Ok(())
    }

    /// The final response header, with informational responses drained.
    pub async fn receive_response_header(
        exchange: &mut MessageExchange<'_>,
    ) -> Result<ResponseHeader, ExchangeError> {
        let response = exchange.receive_response_header().await?;
        metrics::record_exchange("client", response.status);
        tracing::debug!(
            status = response.status,
            informational = exchange.informational_drained(),
            "Response received"
        );
        Ok(response)
    }

    /// GET `path` from `url` with the configured GET retries.
    pub async fn get_content(&self, url: &str, path: &str) -> Result<Option<String>, EndpointError> {
        self.get_content_with_retries(url, path, self.config.get_retries)
            .await
    }

    /// GET `path` from `url`. Connection or exchange failures and non-2xx
    /// responses all yield `None`; only a malformed URL is an error.
    pub async fn get_content_with_retries(
        &self,
        url: &str,
        path: &str,
        retries: u32,
    ) -> Result<Option<String>, EndpointError> {
        let endpoint = Endpoint::parse(url)?;
        let Ok(mut connection) = self.connect_endpoint(&endpoint, retries).await else {
            return Ok(None);
        };

        let request = Request::get(path, &host_field(&endpoint), &self.config.user_agent);
        let content = exchange_text(&mut connection, request).await;
        connection.disconnect().await;

        match content {
            Ok(content) => Ok(content),
            Err(Stage::Send(e) | Stage::Receive(e)) => {
                tracing::debug!(url, path, error = %e, "GET failed");
                Ok(None)
            }
        }
    }

    /// POST `content` as `text/xml` to `url` with the configured POST retries.
    pub async fn post(&self, url: &str, content: &str) -> Result<Option<String>, ClientError> {
        self.post_with_retries(url, content, "text/xml; charset=utf-8", self.config.post_retries)
            .await
    }

    /// POST `content` to `url`, returning the reply body for a 2xx response
    /// and `None` otherwise.
    pub async fn post_with_retries(
        &self,
        url: &str,
        content: &str,
        content_type: &str,
        retries: u32,
    ) -> Result<Option<String>, ClientError> {
        let parsed = url::Url::parse(url).map_err(|source| EndpointError::Malformed {
            url: url.to_string(),
            source,
        })?;
        let endpoint = Endpoint::from_url(&parsed)?;
        let mut connection = self.connect_endpoint(&endpoint, retries).await?;

        let request = Request::post(
            &path_and_query(&parsed),
            &host_field(&endpoint),
            &self.config.user_agent,
            content_type,
            content.as_bytes(),
        );
        let content = exchange_text(&mut connection, request).await;
        connection.disconnect().await;

        content.map_err(|stage| stage.into_client_error(url))
    }

    /// GET `path` from `url` into `directory` with the configured GET retries.
    pub async fn get_file(
        &self,
        url: &str,
        path: &str,
        directory: &Path,
    ) -> Result<Option<PathBuf>, EndpointError> {
        self.get_file_with_retries(url, path, directory, self.config.get_retries)
            .await
    }

    /// GET `path` from `url` and save the body inside `directory`, named by
    /// the response's `Content-Disposition` filename when present.
    pub async fn get_file_with_retries(
        &self,
        url: &str,
        path: &str,
        directory: &Path,
        retries: u32,
    ) -> Result<Option<PathBuf>, EndpointError> {
        let endpoint = Endpoint::parse(url)?;
        let Ok(mut connection) = self.connect_endpoint(&endpoint, retries).await else {
            return Ok(None);
        };

        let request = Request::get(path, &host_field(&endpoint), &self.config.user_agent);
        let saved = download(&mut connection, request, directory).await;
        connection.disconnect().await;

        match saved {
            Ok(saved) => Ok(saved),
            Err(e) => {
                tracing::debug!(url, path, error = %e, "File retrieval failed");
                Ok(None)
            }
        }
    }
}

/// Send `request`; read the reply as text when the status is 2xx.
async fn exchange_text(
    connection: &mut Connection,
    request: Request,
) -> Result<Option<String>, Stage> {
    let mut exchange = MessageExchange::new(connection);
    HttpClient::send_request(&mut exchange, request)
        .await
        .map_err(Stage::Send)?;
    let response = HttpClient::receive_response_header(&mut exchange)
        .await
        .map_err(Stage::Receive)?;
    if !response.is_success() {
        return Ok(None);
    }
    exchange
        .receive_body_string(&response.fields)
        .await
        .map(Some)
        .map_err(Stage::Receive)
}

#[derive(Debug, Error)]
enum DownloadError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("could not create {path}: {source}")]
    Create { path: PathBuf, source: io::Error },
}

async fn download(
    connection: &mut Connection,
    request: Request,
    directory: &Path,
) -> Result<Option<PathBuf>, DownloadError> {
    let mut exchange = MessageExchange::new(connection);
    HttpClient::send_request(&mut exchange, request).await?;
    let response = HttpClient::receive_response_header(&mut exchange).await?;
    if !response.is_success() {
        return Ok(None);
    }

    let named = response
        .fields
        .content_disposition_param("filename")
        .and_then(|name| sanitize_filename(&name));
    let (path, mut file) = match named {
        Some(name) => {
            let path = directory.join(name);
            let file = File::create(&path).await.map_err(|source| DownloadError::Create {
                path: path.clone(),
                source,
            })?;
            (path, file)
        }
        None => create_unique(directory).await?,
    };

    let received = match exchange.receive_body(&response.fields, &mut file).await {
        Ok(_) => file.flush().await.map_err(ExchangeError::from),
        Err(e) => Err(e),
    };
    if let Err(e) = received {
        drop(file);
        let _ = tokio::fs::remove_file(&path).await;
        return Err(e.into());
    }
    tracing::debug!(path = %path.display(), "File saved");
    Ok(Some(path))
}

/// The final path component of a suggested filename, if it is usable.
fn sanitize_filename(name: &str) -> Option<String> {
    let last = name.rsplit(|c: char| c == '/' || c == '\\').next()?.trim();
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(last.to_string())
}

/// Create `download-<uuid>.tmp` in `directory` without overwriting anything.
async fn create_unique(directory: &Path) -> Result<(PathBuf, File), DownloadError> {
    let mut last_error = None;
    for _ in 0..UNIQUE_NAME_ATTEMPTS {
        let path = directory.join(format!("download-{}.tmp", Uuid::new_v4()));
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => last_error = Some(e),
            Err(source) => return Err(DownloadError::Create { path, source }),
        }
    }
    Err(DownloadError::Create {
        path: directory.to_path_buf(),
        source: last_error.unwrap_or_else(|| io::Error::from(io::ErrorKind::AlreadyExists)),
    })
}

/// `Host` field value: the port is included only when it is not the default.
fn host_field(endpoint: &Endpoint) -> String {
    if endpoint.port() == endpoint.scheme().default_port() {
        let authority = endpoint.authority();
        match authority.rsplit_once(':') {
            Some((host, _)) => host.to_string(),
            None => authority,
        }
    } else {
        endpoint.authority()
    }
}

fn path_and_query(url: &url::Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}
