//! Blocking REST client for the remote time-series service.

use crate::{ConnectionSettings, DataPoint, RemoteConnector, RemoteEndpoint, RemoteError, RemoteResult};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpEndpointConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for HttpEndpointConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("stream-logger/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Endpoint speaking the service's REST API.
///
/// Streams live under the device the credential belongs to, so the device
/// path is resolved by a ping when the endpoint is created.
pub struct HttpEndpoint {
    client: Client,
    base: Url,
    credential: String,
    device: String,
}

impl HttpEndpoint {
    /// Build a client and ping the service to resolve the device path.
    pub fn connect(settings: &ConnectionSettings, config: &HttpEndpointConfig) -> RemoteResult<Self> {
        let base = Url::parse(&settings.endpoint_url)?;
        if base.cannot_be_a_base() {
            return Err(RemoteError::Config(format!(
                "endpoint URL cannot be a base: {}",
                settings.endpoint_url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        let mut endpoint = Self {
            client,
            base,
            credential: settings.credential.clone(),
            device: String::new(),
        };
        endpoint.device = endpoint.ping()?;
        debug!(device = %endpoint.device, url = %endpoint.base, "Connected to remote endpoint");
        Ok(endpoint)
    }

    /// The device path the credential resolved to.
    pub fn device(&self) -> &str {
        &self.device
    }

    fn url(&self, segments: &[&str]) -> RemoteResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Config(format!("endpoint URL cannot be a base: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn stream_url(&self, name: &str, suffix: Option<&str>) -> RemoteResult<Url> {
        let mut segments = vec!["api", "v1", "crud"];
        segments.extend(self.device.split('/').filter(|s| !s.is_empty()));
        segments.push(name);
        segments.extend(suffix);
        self.url(&segments)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth("", Some(&self.credential))
    }
}

impl RemoteEndpoint for HttpEndpoint {
    fn ping(&self) -> RemoteResult<String> {
        let mut url = self.url(&["api", "v1", ""])?;
        url.query_pairs_mut().append_pair("q", "this");

        let response = check_status(self.authed(self.client.get(url)).send()?)?;
        Ok(response.text()?.trim().to_string())
    }

    fn stream_exists(&self, name: &str) -> RemoteResult<bool> {
        let url = self.stream_url(name, None)?;
        let response = self.authed(self.client.get(url)).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response)?;
        Ok(true)
    }

    fn create_stream(&self, name: &str, schema: &Value) -> RemoteResult<()> {
        let url = self.stream_url(name, None)?;
        let response = self.authed(self.client.post(url)).json(schema).send()?;
        if response.status() == StatusCode::BAD_REQUEST {
            return Err(RemoteError::Schema(response.text().unwrap_or_default()));
        }
        check_status(response)?;
        debug!(stream = %name, "Created remote stream");
        Ok(())
    }

    fn fetch_schema(&self, name: &str) -> RemoteResult<Option<Value>> {
        let url = self.stream_url(name, None)?;
        let response = check_status(self.authed(self.client.get(url)).send()?)?;
        let metadata: Value = response.json()?;
        parse_stream_schema(&metadata)
    }

    fn append_data_points(&self, name: &str, points: &[DataPoint]) -> RemoteResult<()> {
        let url = self.stream_url(name, Some("data"))?;
        let response = self.authed(self.client.post(url)).json(points).send()?;
        check_status(response)?;
        Ok(())
    }
}

/// Connector that builds [`HttpEndpoint`]s.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    config: HttpEndpointConfig,
}

impl HttpConnector {
    pub fn new(config: HttpEndpointConfig) -> Self {
        Self { config }
    }
}

impl RemoteConnector for HttpConnector {
    fn connect(&self, settings: &ConnectionSettings) -> RemoteResult<Arc<dyn RemoteEndpoint>> {
        Ok(Arc::new(HttpEndpoint::connect(settings, &self.config)?))
    }
}

fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::Auth(message)),
        _ => Err(RemoteError::Status {
            status: status.as_u16(),
            message,
        }),
    }
}

/// Stream metadata carries its schema as a JSON document encoded in the
/// `type` string field.
fn parse_stream_schema(metadata: &Value) -> RemoteResult<Option<Value>> {
    match metadata.get("type").and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => Ok(Some(serde_json::from_str(text)?)),
        _ => Ok(None),
    }
}
